//! Value-level constraint detection.
//!
//! Given the samples of one scalar partition, derives length bounds, a named
//! format, numeric bounds and divisibility, and a frequency table of
//! generalized string shapes.

use std::collections::BTreeMap;

use indexmap::IndexSet;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use schema_config::PatternConfig;

use crate::node::{TypeConstraints, gcd};

/// Named formats in priority order: when several qualify, the first wins.
static FORMATS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    [
        (
            "uuid",
            r"(?i)^[0-9a-f]{8}-[0-9a-f]{4}-[1-5][0-9a-f]{3}-[89ab][0-9a-f]{3}-[0-9a-f]{12}$",
        ),
        ("email", r"^[^\s@]+@[^\s@]+\.[^\s@]+$"),
        ("url", r"^https?://[^\s/$.?#].[^\s]*$"),
        (
            "timestamp",
            r"^\d{4}-\d{2}-\d{2}[T ]\d{2}:\d{2}:\d{2}(\.\d+)?(Z|[+-]\d{2}:?\d{2})?$",
        ),
        ("date_iso", r"^\d{4}-\d{2}-\d{2}$"),
        ("credit_card", r"^\d{4}[- ]?\d{4}[- ]?\d{4}[- ]?\d{4}$"),
        ("zip_code", r"^\d{5}(-\d{4})?$"),
        ("phone", r"^\+?[1-9]\d{1,14}$"),
    ]
    .into_iter()
    .filter_map(|(name, src)| Regex::new(src).ok().map(|re| (name, re)))
    .collect()
});

/// Regex behind a named format.
pub fn format_regex(name: &str) -> Option<&'static Regex> {
    FORMATS.iter().find(|(n, _)| *n == name).map(|(_, re)| re)
}

/// Names of all recognized formats, in priority order.
pub fn format_names() -> impl Iterator<Item = &'static str> {
    FORMATS.iter().map(|(name, _)| *name)
}

/// Derives [`TypeConstraints`] from homogeneous samples.
#[derive(Debug, Clone, Default)]
pub struct PatternDetector {
    config: PatternConfig,
}

impl PatternDetector {
    pub fn new(config: PatternConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PatternConfig {
        &self.config
    }

    /// Detect constraints for samples of one runtime type.
    ///
    /// Dispatches on the first sample; booleans, nulls and arrays have no
    /// value-level constraints.
    pub fn detect_constraints(&self, samples: &[&Value]) -> TypeConstraints {
        match samples.first() {
            Some(Value::String(_)) => {
                let strings: Vec<&str> =
                    samples.iter().filter_map(|v| v.as_str()).collect();
                self.string_constraints(&strings)
            }
            Some(Value::Number(_)) => {
                let numbers: Vec<f64> =
                    samples.iter().filter_map(|v| v.as_f64()).collect();
                number_constraints(&numbers)
            }
            Some(Value::Object(_)) => {
                let counts: Vec<usize> = samples
                    .iter()
                    .filter_map(|v| v.as_object().map(|m| m.len()))
                    .collect();
                object_constraints(&counts)
            }
            _ => TypeConstraints::default(),
        }
    }

    fn string_constraints(&self, samples: &[&str]) -> TypeConstraints {
        let mut constraints = TypeConstraints::default();
        if samples.is_empty() {
            return constraints;
        }

        let lengths = samples.iter().map(|s| s.chars().count());
        constraints.min_length = lengths.clone().min();
        constraints.max_length = lengths.max();
        constraints.format = self.detect_format(samples).map(str::to_string);

        if self.config.enum_detection {
            let distinct: IndexSet<&str> = samples.iter().copied().collect();
            if distinct.len() <= self.config.enum_max_cardinality
                && distinct.len() * 2 <= samples.len()
            {
                constraints.enum_values =
                    Some(distinct.into_iter().map(str::to_string).collect());
            }
        }

        if self.config.custom_patterns {
            let mut shapes: BTreeMap<String, usize> = BTreeMap::new();
            for sample in samples {
                *shapes.entry(generalize(sample)).or_default() += 1;
            }
            if !shapes.is_empty() {
                constraints.custom_patterns = Some(shapes);
            }
        }

        constraints
    }

    /// First format, in priority order, matched by more than
    /// `format_threshold` of the samples.
    pub fn detect_format(&self, samples: &[&str]) -> Option<&'static str> {
        if samples.is_empty() {
            return None;
        }
        let total = samples.len() as f64;
        FORMATS.iter().find_map(|(name, re)| {
            let matches = samples.iter().filter(|s| re.is_match(s)).count();
            (matches as f64 / total > self.config.format_threshold)
                .then_some(*name)
        })
    }

    /// Account for a further sample group in constraints detected earlier.
    ///
    /// `other` was detected on a group observed after the one behind
    /// `into`; `samples` is the size of both groups together. The enum is
    /// kept only while it still meets the cardinality limits.
    pub fn fold(
        &self,
        into: &mut TypeConstraints,
        other: &TypeConstraints,
        samples: usize,
    ) {
        // a sequential run only continues if the new group starts right
        // after the old one ended
        let continues = into.is_sequential == Some(true)
            && other.is_sequential == Some(true)
            && matches!(
                (into.maximum, other.minimum),
                (Some(last), Some(first)) if first == last + 1.0
            );
        let shapes = match (into.custom_patterns.take(), &other.custom_patterns) {
            (Some(mut shapes), Some(more)) => {
                for (shape, count) in more {
                    *shapes.entry(shape.clone()).or_default() += count;
                }
                Some(shapes)
            }
            (mine, theirs) => mine.or_else(|| theirs.clone()),
        };

        into.join(other);
        if into.is_sequential.is_some() {
            into.is_sequential = Some(continues);
        }
        into.custom_patterns = shapes;
        if let Some(values) = &into.enum_values
            && (values.len() > self.config.enum_max_cardinality
                || values.len() * 2 > samples)
        {
            into.enum_values = None;
        }
    }
}

/// Detect constraints with the default configuration.
pub fn detect_constraints(samples: &[Value]) -> TypeConstraints {
    let refs: Vec<&Value> = samples.iter().collect();
    PatternDetector::default().detect_constraints(&refs)
}

/// Abstract a string into its shape: runs of uppercase letters become `A`,
/// lowercase runs `a`, digit runs `9`; anything else is regex-escaped.
pub fn generalize(sample: &str) -> String {
    let mut out = String::with_capacity(sample.len());
    let mut run: Option<char> = None;
    let mut buf = [0u8; 4];

    for ch in sample.chars() {
        let class = if ch.is_ascii_uppercase() {
            Some('A')
        } else if ch.is_ascii_lowercase() {
            Some('a')
        } else if ch.is_ascii_digit() {
            Some('9')
        } else {
            None
        };

        match class {
            Some(marker) => {
                if run != Some(marker) {
                    out.push(marker);
                }
                run = Some(marker);
            }
            None => {
                out.push_str(&regex::escape(ch.encode_utf8(&mut buf)));
                run = None;
            }
        }
    }
    out
}

fn number_constraints(samples: &[f64]) -> TypeConstraints {
    let mut constraints = TypeConstraints::default();
    let Some(&first) = samples.first() else {
        return constraints;
    };

    constraints.minimum = Some(samples.iter().copied().fold(first, f64::min));
    constraints.maximum = Some(samples.iter().copied().fold(first, f64::max));

    let is_integer = samples.iter().all(|n| n.fract() == 0.0);
    constraints.is_integer = Some(is_integer);

    if is_integer {
        let divisor = samples
            .iter()
            .map(|n| n.abs() as u64)
            .fold(0u64, gcd);
        if divisor > 1 {
            constraints.multiple_of = Some(divisor);
        }
    }

    constraints.is_sequential =
        Some(samples.windows(2).all(|w| w[1] == w[0] + 1.0));

    constraints
}

fn object_constraints(key_counts: &[usize]) -> TypeConstraints {
    TypeConstraints {
        min_properties: key_counts.iter().copied().min(),
        max_properties: key_counts.iter().copied().max(),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn detect(values: Vec<Value>) -> TypeConstraints {
        detect_constraints(&values)
    }

    #[test]
    fn test_empty_samples() {
        assert_eq!(detect(vec![]), TypeConstraints::default());
    }

    #[test]
    fn test_email_format_vote() {
        let c = detect(vec![json!("test@example.com"), json!("user@domain.com")]);
        assert_eq!(c.format.as_deref(), Some("email"));
        assert_eq!(c.min_length, Some(15));
        assert_eq!(c.max_length, Some(16));
    }

    #[test]
    fn test_format_needs_more_than_threshold() {
        // 4 of 5 is exactly 80%, not above it
        let c = detect(vec![
            json!("a@b.io"),
            json!("c@d.io"),
            json!("e@f.io"),
            json!("g@h.io"),
            json!("nope"),
        ]);
        assert_eq!(c.format, None);
    }

    #[test]
    fn test_format_priority_prefers_zip_over_phone() {
        // five-digit strings match both zip_code and phone
        let c = detect(vec![json!("12345"), json!("90210")]);
        assert_eq!(c.format.as_deref(), Some("zip_code"));
    }

    #[test]
    fn test_uuid_and_timestamp() {
        let c = detect(vec![
            json!("550e8400-e29b-41d4-a716-446655440000"),
            json!("6ba7b810-9dad-11d1-80b4-00c04fd430c8"),
        ]);
        assert_eq!(c.format.as_deref(), Some("uuid"));

        let c = detect(vec![
            json!("2024-01-15T10:30:00Z"),
            json!("2024-02-01T08:00:00.123+02:00"),
        ]);
        assert_eq!(c.format.as_deref(), Some("timestamp"));

        let c = detect(vec![json!("2024-01-15"), json!("2023-12-31")]);
        assert_eq!(c.format.as_deref(), Some("date_iso"));
    }

    #[test]
    fn test_numeric_constraints() {
        let c = detect(vec![json!(1), json!(2), json!(3), json!(4), json!(5)]);
        assert_eq!(c.minimum, Some(1.0));
        assert_eq!(c.maximum, Some(5.0));
        assert_eq!(c.is_integer, Some(true));
        assert_eq!(c.is_sequential, Some(true));
        assert_eq!(c.multiple_of, None);
    }

    #[test]
    fn test_multiple_of_gcd() {
        let c = detect(vec![json!(10), json!(25), json!(-15)]);
        assert_eq!(c.multiple_of, Some(5));
        assert_eq!(c.is_sequential, Some(false));
        assert_eq!(c.minimum, Some(-15.0));
    }

    #[test]
    fn test_all_zero_has_no_multiple_of() {
        let c = detect(vec![json!(0), json!(0)]);
        assert_eq!(c.multiple_of, None);
        assert_eq!(c.is_integer, Some(true));
    }

    #[test]
    fn test_single_number() {
        let c = detect(vec![json!(7.5)]);
        assert_eq!(c.minimum, Some(7.5));
        assert_eq!(c.maximum, Some(7.5));
        assert_eq!(c.is_integer, Some(false));
        assert_eq!(c.multiple_of, None);
        assert_eq!(c.is_sequential, Some(true));
    }

    #[test]
    fn test_object_property_counts() {
        let c = detect(vec![json!({"a": 1}), json!({"a": 1, "b": 2, "c": 3})]);
        assert_eq!(c.min_properties, Some(1));
        assert_eq!(c.max_properties, Some(3));
    }

    #[test]
    fn test_other_types_have_no_constraints() {
        assert!(detect(vec![json!(true), json!(false)]).is_empty());
        assert!(detect(vec![json!(null)]).is_empty());
        assert!(detect(vec![json!([1, 2])]).is_empty());
    }

    #[test]
    fn test_fold_widens_numeric_bounds() {
        let detector = PatternDetector::default();
        let mut c = detect(vec![json!(1), json!(2), json!(3)]);
        detector.fold(&mut c, &detect(vec![json!(4), json!(5)]), 5);
        assert_eq!(c.minimum, Some(1.0));
        assert_eq!(c.maximum, Some(5.0));
        assert_eq!(c.is_sequential, Some(true));

        let mut c = detect(vec![json!(10), json!(20)]);
        detector.fold(&mut c, &detect(vec![json!(15)]), 3);
        assert_eq!(c.multiple_of, Some(5));
        assert_eq!(c.is_sequential, Some(false));
        assert_eq!((c.minimum, c.maximum), (Some(10.0), Some(20.0)));

        let mut c = detect(vec![json!(0), json!(0)]);
        detector.fold(&mut c, &detect(vec![json!(6), json!(9)]), 4);
        assert_eq!(c.multiple_of, Some(3));
    }

    #[test]
    fn test_fold_merges_enums_and_shapes() {
        let detector = PatternDetector::default();
        let mut c = detect(vec![json!("on"), json!("off"), json!("on"), json!("off")]);
        let roles = detect(vec![json!("admin"), json!("user"), json!("user"), json!("admin")]);
        detector.fold(&mut c, &roles, 8);
        assert_eq!(
            c.enum_values,
            Some(vec!["on".into(), "off".into(), "admin".into(), "user".into()])
        );
        assert_eq!((c.min_length, c.max_length), (Some(2), Some(5)));
        assert_eq!(c.custom_patterns.as_ref().unwrap()["a"], 8);

        // a group too small to list an enum drops it
        detector.fold(&mut c, &detect(vec![json!("x")]), 9);
        assert_eq!(c.enum_values, None);
    }

    #[test]
    fn test_generalize_shapes() {
        assert_eq!(generalize("ABC-123"), "A\\-9");
        assert_eq!(generalize("Hello World"), "Aa Aa");
        assert_eq!(generalize("order_42.json"), "a_9\\.a");
        assert_eq!(generalize(""), "");
    }

    #[test]
    fn test_custom_pattern_frequency() {
        let c = detect(vec![json!("AB-12"), json!("CD-34"), json!("x")]);
        let shapes = c.custom_patterns.unwrap();
        assert_eq!(shapes.get("A\\-9"), Some(&2));
        assert_eq!(shapes.get("a"), Some(&1));
    }

    #[test]
    fn test_enum_detection() {
        let c = detect(vec![
            json!("active"),
            json!("inactive"),
            json!("active"),
            json!("active"),
        ]);
        assert_eq!(
            c.enum_values,
            Some(vec!["active".to_string(), "inactive".to_string()])
        );

        let unique = detect(vec![json!("a"), json!("b"), json!("c")]);
        assert_eq!(unique.enum_values, None);
    }

    #[test]
    fn test_disabled_enum_and_patterns() {
        let detector = PatternDetector::new(PatternConfig {
            enum_detection: false,
            custom_patterns: false,
            ..Default::default()
        });
        let a = json!("x");
        let c = detector.detect_constraints(&[&a, &a, &a]);
        assert_eq!(c.enum_values, None);
        assert_eq!(c.custom_patterns, None);
        assert_eq!(c.min_length, Some(1));
    }

    #[test]
    fn test_format_registry() {
        let names: Vec<_> = format_names().collect();
        assert_eq!(names.len(), 8);
        assert_eq!(names[0], "uuid");
        assert!(format_regex("phone").is_some());
        assert!(format_regex("nope").is_none());
    }
}
