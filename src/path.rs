//! Path algebra for addressing values in the tree.
//!
//! A path is an ordered list of string segments. Strings are split on `.`,
//! and three tokens navigate relatively before the path is used:
//!
//! - `~` re-roots the path
//! - `..` goes up one level (no-op at the root)
//! - `.` stays on the current level

use std::fmt;

use crate::tree::Value;

const ROOT: &str = "~";
const PARENT: &str = "..";
const CURRENT: &str = ".";

/// Ordered sequence of key segments.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Path(Vec<String>);

impl Path {
    /// The empty path, addressing the whole tree.
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Parse a dotted string. The empty string is the root path.
    pub fn parse(raw: &str) -> Self {
        if raw.is_empty() {
            return Self::root();
        }
        Self(raw.split('.').map(str::to_string).collect())
    }

    /// Build a path from already segmented values.
    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    /// Read a path out of a payload value (`"a.b"` or `["a", "b"]`).
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(raw) => Some(Self::parse(raw)),
            Value::List(items) => items
                .iter()
                .map(|item| match item {
                    Value::String(s) => Some(s.to_string()),
                    Value::Int(i) => Some(i.to_string()),
                    _ => None,
                })
                .collect::<Option<Vec<_>>>()
                .map(Self),
            _ => None,
        }
    }

    /// Payload representation of this path (a list of strings).
    pub fn to_value(&self) -> Value {
        Value::from(
            self.0
                .iter()
                .map(|s| Value::from(s.as_str()))
                .collect::<Vec<_>>(),
        )
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Concatenate two paths without resolving them.
    pub fn join(&self, other: &Path) -> Path {
        let mut segments = self.0.clone();
        segments.extend(other.0.iter().cloned());
        Path(segments)
    }

    /// Evaluate the relative tokens and return the absolute key path.
    pub fn resolve(&self) -> Path {
        let mut stack: Vec<String> = Vec::with_capacity(self.0.len());
        for segment in &self.0 {
            match segment.as_str() {
                ROOT => stack.clear(),
                PARENT => {
                    stack.pop();
                }
                CURRENT => {}
                _ => stack.push(segment.clone()),
            }
        }
        Path(stack)
    }

    /// Segment-wise prefix test. `users` is not a prefix of `usersettings`.
    pub fn starts_with(&self, prefix: &Path) -> bool {
        self.0.len() >= prefix.0.len() && self.0.iter().zip(&prefix.0).all(|(a, b)| a == b)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("."))
    }
}

impl From<&str> for Path {
    fn from(raw: &str) -> Self {
        Path::parse(raw)
    }
}

impl From<String> for Path {
    fn from(raw: String) -> Self {
        Path::parse(&raw)
    }
}

impl From<&String> for Path {
    fn from(raw: &String) -> Self {
        Path::parse(raw)
    }
}

impl From<Vec<String>> for Path {
    fn from(segments: Vec<String>) -> Self {
        Path(segments)
    }
}

impl From<Vec<&str>> for Path {
    fn from(segments: Vec<&str>) -> Self {
        Path::from_segments(segments)
    }
}

impl From<&[&str]> for Path {
    fn from(segments: &[&str]) -> Self {
        Path::from_segments(segments.iter().copied())
    }
}

impl<const N: usize> From<[&str; N]> for Path {
    fn from(segments: [&str; N]) -> Self {
        Path::from_segments(segments)
    }
}

impl From<&Path> for Path {
    fn from(path: &Path) -> Self {
        path.clone()
    }
}

/// Split a dotted string into segments; segmented input is kept as is.
pub fn ensure_array(path: impl Into<Path>) -> Path {
    path.into()
}

/// `ensure_array(a) ++ ensure_array(b)`.
pub fn combine_paths(a: impl Into<Path>, b: impl Into<Path>) -> Path {
    a.into().join(&b.into())
}

/// Resolve `.`, `..` and `~` into an absolute key path.
pub fn resolve_path(path: impl Into<Path>) -> Path {
    path.into().resolve()
}
