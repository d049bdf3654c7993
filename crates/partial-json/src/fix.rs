//! Single-pass repair of truncated JSON.
//!
//! The scanner keeps a stack of open syntactic contexts and the byte offset
//! up to which the input is a valid JSON prefix. The repaired text is that
//! prefix followed by closers for every context still open.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Root,
    Finish,
    InsideString,
    InsideStringEscape,
    /// Hex digits still expected by a `\u` escape
    InsideStringUnicode(u8),
    InsideLiteral,
    InsideNumber,
    ObjectStart,
    ObjectKey,
    ObjectAfterKey,
    ObjectBeforeValue,
    ObjectAfterValue,
    ObjectAfterComma,
    ArrayStart,
    ArrayAfterValue,
    ArrayAfterComma,
}

const LITERALS: [&str; 3] = ["true", "false", "null"];

struct Scanner<'a> {
    input: &'a str,
    stack: Vec<State>,
    /// End (exclusive) of the longest valid prefix
    valid_end: usize,
    literal_start: usize,
}

impl<'a> Scanner<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            stack: vec![State::Root],
            valid_end: 0,
            literal_start: 0,
        }
    }

    fn top(&self) -> Option<State> {
        self.stack.last().copied()
    }

    fn replace_top(&mut self, state: State) {
        self.stack.pop();
        self.stack.push(state);
    }

    fn mark(&mut self, i: usize, ch: char) {
        self.valid_end = i + ch.len_utf8();
    }

    /// A value starts at `ch`; once it ends the enclosing context becomes
    /// `after`.
    fn value_start(&mut self, i: usize, ch: char, after: State) {
        match ch {
            '"' => {
                self.mark(i, ch);
                self.replace_top(after);
                self.stack.push(State::InsideString);
            }
            'f' | 't' | 'n' => {
                self.mark(i, ch);
                self.literal_start = i;
                self.replace_top(after);
                self.stack.push(State::InsideLiteral);
            }
            '-' => {
                self.replace_top(after);
                self.stack.push(State::InsideNumber);
            }
            '0'..='9' => {
                self.mark(i, ch);
                self.replace_top(after);
                self.stack.push(State::InsideNumber);
            }
            '{' => {
                self.mark(i, ch);
                self.replace_top(after);
                self.stack.push(State::ObjectStart);
            }
            '[' => {
                self.mark(i, ch);
                self.replace_top(after);
                self.stack.push(State::ArrayStart);
            }
            _ => {}
        }
    }

    fn after_object_value(&mut self, i: usize, ch: char) {
        match ch {
            ',' => self.replace_top(State::ObjectAfterComma),
            '}' => {
                self.mark(i, ch);
                self.stack.pop();
            }
            _ => {}
        }
    }

    fn after_array_value(&mut self, i: usize, ch: char) {
        match ch {
            ',' => self.replace_top(State::ArrayAfterComma),
            ']' => {
                self.mark(i, ch);
                self.stack.pop();
            }
            _ => {}
        }
    }

    /// Hand `ch` to the container a scalar just ended in.
    fn close_scalar(&mut self, i: usize, ch: char) {
        self.stack.pop();
        match self.top() {
            Some(State::ObjectAfterValue) => self.after_object_value(i, ch),
            Some(State::ArrayAfterValue) => self.after_array_value(i, ch),
            _ => {}
        }
    }

    fn step(&mut self, i: usize, ch: char) {
        let Some(state) = self.top() else {
            return;
        };

        match state {
            State::Root => self.value_start(i, ch, State::Finish),
            State::Finish => {}

            State::ObjectStart => match ch {
                '"' => self.replace_top(State::ObjectKey),
                '}' => {
                    self.mark(i, ch);
                    self.stack.pop();
                }
                _ => {}
            },
            State::ObjectAfterComma => {
                if ch == '"' {
                    self.replace_top(State::ObjectKey);
                }
            }
            State::ObjectKey => {
                if ch == '"' {
                    self.replace_top(State::ObjectAfterKey);
                }
            }
            State::ObjectAfterKey => {
                if ch == ':' {
                    self.replace_top(State::ObjectBeforeValue);
                }
            }
            State::ObjectBeforeValue => {
                self.value_start(i, ch, State::ObjectAfterValue)
            }
            State::ObjectAfterValue => self.after_object_value(i, ch),

            State::InsideString => match ch {
                '"' => {
                    self.stack.pop();
                    self.mark(i, ch);
                }
                '\\' => self.stack.push(State::InsideStringEscape),
                _ => self.mark(i, ch),
            },
            State::InsideStringEscape => {
                if ch == 'u' {
                    self.replace_top(State::InsideStringUnicode(4));
                } else {
                    self.stack.pop();
                    self.mark(i, ch);
                }
            }
            State::InsideStringUnicode(remaining) => {
                if !ch.is_ascii_hexdigit() {
                    // malformed escape, resume the string without it
                    self.stack.pop();
                } else if remaining <= 1 {
                    self.stack.pop();
                    self.mark(i, ch);
                } else {
                    self.replace_top(State::InsideStringUnicode(remaining - 1));
                }
            }

            State::ArrayStart => {
                if ch == ']' {
                    self.mark(i, ch);
                    self.stack.pop();
                } else {
                    self.value_start(i, ch, State::ArrayAfterValue);
                }
            }
            State::ArrayAfterValue => match ch {
                ',' => self.replace_top(State::ArrayAfterComma),
                ']' => {
                    self.mark(i, ch);
                    self.stack.pop();
                }
                _ => self.mark(i, ch),
            },
            State::ArrayAfterComma => {
                self.value_start(i, ch, State::ArrayAfterValue)
            }

            State::InsideNumber => match ch {
                '0'..='9' => self.mark(i, ch),
                'e' | 'E' | '-' | '+' | '.' => {}
                ',' | '}' | ']' => self.close_scalar(i, ch),
                _ => {
                    self.stack.pop();
                }
            },

            State::InsideLiteral => {
                let end = i + ch.len_utf8();
                let partial = &self.input[self.literal_start..end];
                if LITERALS.iter().any(|lit| lit.starts_with(partial)) {
                    self.mark(i, ch);
                } else {
                    self.close_scalar(i, ch);
                }
            }
        }
    }

    fn finish(self) -> String {
        let mut out = self.input[..self.valid_end].to_string();
        for state in self.stack.iter().rev() {
            match state {
                State::InsideString => out.push('"'),
                State::ObjectStart
                | State::ObjectKey
                | State::ObjectAfterKey
                | State::ObjectBeforeValue
                | State::ObjectAfterValue
                | State::ObjectAfterComma => out.push('}'),
                State::ArrayStart
                | State::ArrayAfterValue
                | State::ArrayAfterComma => out.push(']'),
                State::InsideLiteral => {
                    let partial = &self.input[self.literal_start..];
                    if let Some(lit) =
                        LITERALS.iter().find(|lit| lit.starts_with(partial))
                    {
                        out.push_str(&lit[partial.len()..]);
                    }
                }
                // the string below closes itself
                State::InsideStringEscape | State::InsideStringUnicode(_) => {}
                State::Root | State::Finish | State::InsideNumber => {}
            }
        }
        out
    }
}

/// Complete a possibly truncated JSON document.
///
/// Open strings, objects and arrays are closed, partial `true`/`false`/
/// `null` literals are spelled out, dangling number fragments and incomplete
/// escapes are dropped. Anything after a complete top-level value is
/// discarded. Valid complete input comes back unchanged apart from trailing
/// content.
pub fn fix_json(input: &str) -> String {
    let mut scanner = Scanner::new(input);
    for (i, ch) in input.char_indices() {
        scanner.step(i, ch);
    }
    scanner.finish()
}
