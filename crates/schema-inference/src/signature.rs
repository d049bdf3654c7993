//! Structural signatures.
//!
//! A signature is a Merkle-style SHA-256 over the structural shape of a node:
//! its type, its optional flag and the signatures of its children. Scalars
//! also hash their detected format and integer flag, which change what the
//! exported schema accepts. Sample counts, examples, the remaining
//! statistics and timestamps are not part of it, so two nodes inferred from
//! isomorphic sample groups hash identically.
//!
//! Property order does not matter (keys are hashed sorted). Union members
//! are hashed as a sorted multiset, so member order does not matter but
//! member count does.

use std::fmt;

use sha2::{Digest, Sha256};

use crate::node::{
    NodeDraft, NodeId, NodeKind, SchemaNode, SchemaType, TypeConstraints,
};

/// SHA-256 digest of a node's canonical structure.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SchemaSignature([u8; 32]);

impl SchemaSignature {
    /// Signature of a node shape whose children are resolved by `child`.
    ///
    /// A child the resolver cannot produce is hashed as a `missing` sentinel
    /// carrying its id, so dangling references never alias real nodes.
    pub fn compute<F>(
        optional: bool,
        constraints: Option<&TypeConstraints>,
        kind: &NodeKind,
        mut child: F,
    ) -> Self
    where
        F: FnMut(&NodeId) -> Option<SchemaSignature>,
    {
        let mut hasher = Sha256::new();
        hasher.update(b"opt");
        hasher.update([optional as u8]);

        let mut child_digest = |hasher: &mut Sha256, id: &NodeId| match child(id)
        {
            Some(sig) => hasher.update(sig.0),
            None => {
                hasher.update(b"missing:");
                update_str(hasher, id.as_str());
            }
        };

        match kind {
            NodeKind::Scalar { scalar_type, .. } => {
                hasher.update(b"scalar:");
                let tag: SchemaType = (*scalar_type).into();
                update_str(&mut hasher, tag.as_str());
                let format = constraints.and_then(|c| c.format.as_deref());
                update_str(&mut hasher, format.unwrap_or(""));
                let integer = constraints.and_then(|c| c.is_integer);
                hasher.update([integer.map_or(0u8, |i| 1 + i as u8)]);
            }
            NodeKind::Object { properties } => {
                hasher.update(b"object{");
                let mut keys: Vec<(&String, &NodeId)> =
                    properties.iter().collect();
                keys.sort_by(|a, b| a.0.cmp(b.0));
                for (key, id) in keys {
                    update_str(&mut hasher, key);
                    child_digest(&mut hasher, id);
                }
                hasher.update(b"}");
            }
            NodeKind::Array { item_type } => {
                hasher.update(b"array[");
                child_digest(&mut hasher, item_type);
                hasher.update(b"]");
            }
            NodeKind::Union { types } => {
                hasher.update(b"union(");
                let mut members: Vec<Vec<u8>> = types
                    .iter()
                    .map(|id| {
                        let mut h = Sha256::new();
                        child_digest(&mut h, id);
                        h.finalize().to_vec()
                    })
                    .collect();
                members.sort();
                hasher.update((members.len() as u64).to_le_bytes());
                for member in members {
                    hasher.update(member);
                }
                hasher.update(b")");
            }
        }

        SchemaSignature(hasher.finalize().into())
    }

    pub fn of_draft<F>(draft: &NodeDraft, child: F) -> Self
    where
        F: FnMut(&NodeId) -> Option<SchemaSignature>,
    {
        Self::compute(
            draft.optional,
            draft.constraints.as_ref(),
            &draft.kind,
            child,
        )
    }

    pub fn of_node<F>(node: &SchemaNode, child: F) -> Self
    where
        F: FnMut(&NodeId) -> Option<SchemaSignature>,
    {
        Self::compute(
            node.optional,
            node.constraints.as_ref(),
            &node.kind,
            child,
        )
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Short form: first 8 bytes as 16 hex chars.
    pub fn fingerprint(&self) -> String {
        hex::encode(&self.0[..8])
    }
}

/// Length-prefixed so adjacent strings cannot run together.
fn update_str(hasher: &mut Sha256, s: &str) {
    hasher.update((s.len() as u64).to_le_bytes());
    hasher.update(s.as_bytes());
}

impl fmt::Display for SchemaSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for SchemaSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SchemaSignature({})", self.fingerprint())
    }
}
