//! Actions: the only way the tree changes.
//!
//! Built-in verbs are a closed set of variants; anything else travels as
//! [`Action::Custom`] with a free-form type name and payload.

mod parse;

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use crate::path::Path;
use crate::tree::Value;

/// Operation carried by an `@@apply` action.
pub type ApplyFn = Arc<dyn Fn(Option<&Value>) -> Value + Send + Sync>;

/// Comparator carried by an `@@list-sort` action.
pub type CompareFn = Arc<dyn Fn(&Value, &Value) -> Ordering + Send + Sync>;

/// Predicate carried by an `@@list-filter` action: `(item, index, list)`.
pub type PredicateFn = Arc<dyn Fn(&Value, usize, &[Value]) -> bool + Send + Sync>;

/// Built-in mutation verbs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    Set,
    SetIn,
    Patch,
    Apply,
    Delete,
    ListPush,
    ListPop,
    ListShift,
    ListUnshift,
    ListSplice,
    ListSort,
    ListFilter,
}

impl Verb {
    /// Every built-in verb, in the order their processors are installed.
    pub const ALL: [Verb; 12] = [
        Verb::Set,
        Verb::SetIn,
        Verb::Patch,
        Verb::Apply,
        Verb::Delete,
        Verb::ListFilter,
        Verb::ListPop,
        Verb::ListPush,
        Verb::ListShift,
        Verb::ListSplice,
        Verb::ListUnshift,
        Verb::ListSort,
    ];

    pub fn type_name(self) -> &'static str {
        match self {
            Verb::Set => "@@set",
            Verb::SetIn => "@@set-in",
            Verb::Patch => "@@patch",
            Verb::Apply => "@@apply",
            Verb::Delete => "@@delete",
            Verb::ListPush => "@@list-push",
            Verb::ListPop => "@@list-pop",
            Verb::ListShift => "@@list-shift",
            Verb::ListUnshift => "@@list-unshift",
            Verb::ListSplice => "@@list-splice",
            Verb::ListSort => "@@list-sort",
            Verb::ListFilter => "@@list-filter",
        }
    }

    pub fn from_type_name(name: &str) -> Option<Verb> {
        Verb::ALL.into_iter().find(|verb| verb.type_name() == name)
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

/// Stage of an async run, appended to the registered type as a suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lifecycle {
    Start,
    Next,
    Error,
    Complete,
}

impl Lifecycle {
    pub fn suffix(self) -> &'static str {
        match self {
            Lifecycle::Start => "::START",
            Lifecycle::Next => "::NEXT",
            Lifecycle::Error => "::ERROR",
            Lifecycle::Complete => "::COMPLETE",
        }
    }

    /// `"fetch"` + `Next` = `"fetch::NEXT"`.
    pub fn type_for(self, base: &str) -> String {
        format!("{base}{}", self.suffix())
    }
}

/// Which action types a reducer or a stream listens to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeFilter {
    /// `*`: every action.
    Any,
    Exact(String),
}

impl TypeFilter {
    pub fn matches(&self, action_type: &str) -> bool {
        match self {
            TypeFilter::Any => true,
            TypeFilter::Exact(expected) => expected == action_type,
        }
    }
}

impl From<&str> for TypeFilter {
    fn from(raw: &str) -> Self {
        if raw == "*" {
            TypeFilter::Any
        } else {
            TypeFilter::Exact(raw.to_string())
        }
    }
}

impl From<String> for TypeFilter {
    fn from(raw: String) -> Self {
        if raw == "*" {
            TypeFilter::Any
        } else {
            TypeFilter::Exact(raw)
        }
    }
}

impl From<&String> for TypeFilter {
    fn from(raw: &String) -> Self {
        TypeFilter::from(raw.as_str())
    }
}

impl From<Verb> for TypeFilter {
    fn from(verb: Verb) -> Self {
        TypeFilter::Exact(verb.type_name().to_string())
    }
}

impl fmt::Display for TypeFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeFilter::Any => f.write_str("*"),
            TypeFilter::Exact(name) => f.write_str(name),
        }
    }
}

/// A typed instruction entering the pipeline.
#[derive(Clone)]
pub enum Action {
    Set {
        value: Value,
    },
    SetIn {
        path: Path,
        value: Value,
    },
    Patch {
        path: Path,
        value: Value,
    },
    Apply {
        path: Path,
        operation: ApplyFn,
    },
    Delete {
        path: Path,
        key: String,
    },
    ListPush {
        path: Path,
        items: Vec<Value>,
    },
    ListPop {
        path: Path,
    },
    ListShift {
        path: Path,
    },
    ListUnshift {
        path: Path,
        items: Vec<Value>,
    },
    ListSplice {
        path: Path,
        /// Negative values count from the end of the list.
        index: i64,
        delete_count: usize,
        items: Vec<Value>,
    },
    ListSort {
        path: Path,
        compare: Option<CompareFn>,
    },
    ListFilter {
        path: Path,
        predicate: PredicateFn,
    },
    Custom {
        action_type: String,
        payload: Value,
    },
}

impl Action {
    pub fn set(value: impl Into<Value>) -> Self {
        Action::Set {
            value: value.into(),
        }
    }

    pub fn set_in(path: impl Into<Path>, value: impl Into<Value>) -> Self {
        Action::SetIn {
            path: path.into(),
            value: value.into(),
        }
    }

    pub fn patch(path: impl Into<Path>, value: impl Into<Value>) -> Self {
        Action::Patch {
            path: path.into(),
            value: value.into(),
        }
    }

    pub fn apply<F>(path: impl Into<Path>, operation: F) -> Self
    where
        F: Fn(Option<&Value>) -> Value + Send + Sync + 'static,
    {
        Action::Apply {
            path: path.into(),
            operation: Arc::new(operation),
        }
    }

    pub fn delete(path: impl Into<Path>, key: impl Into<String>) -> Self {
        Action::Delete {
            path: path.into(),
            key: key.into(),
        }
    }

    pub fn list_push(path: impl Into<Path>, items: Vec<Value>) -> Self {
        Action::ListPush {
            path: path.into(),
            items,
        }
    }

    pub fn list_pop(path: impl Into<Path>) -> Self {
        Action::ListPop { path: path.into() }
    }

    pub fn list_shift(path: impl Into<Path>) -> Self {
        Action::ListShift { path: path.into() }
    }

    pub fn list_unshift(path: impl Into<Path>, items: Vec<Value>) -> Self {
        Action::ListUnshift {
            path: path.into(),
            items,
        }
    }

    pub fn list_splice(
        path: impl Into<Path>,
        index: i64,
        delete_count: usize,
        items: Vec<Value>,
    ) -> Self {
        Action::ListSplice {
            path: path.into(),
            index,
            delete_count,
            items,
        }
    }

    pub fn list_sort(path: impl Into<Path>) -> Self {
        Action::ListSort {
            path: path.into(),
            compare: None,
        }
    }

    pub fn list_sort_by<F>(path: impl Into<Path>, compare: F) -> Self
    where
        F: Fn(&Value, &Value) -> Ordering + Send + Sync + 'static,
    {
        Action::ListSort {
            path: path.into(),
            compare: Some(Arc::new(compare)),
        }
    }

    pub fn list_filter<F>(path: impl Into<Path>, predicate: F) -> Self
    where
        F: Fn(&Value, usize, &[Value]) -> bool + Send + Sync + 'static,
    {
        Action::ListFilter {
            path: path.into(),
            predicate: Arc::new(predicate),
        }
    }

    pub fn custom(action_type: impl Into<String>, payload: impl Into<Value>) -> Self {
        Action::Custom {
            action_type: action_type.into(),
            payload: payload.into(),
        }
    }

    /// The built-in verb, or `None` for custom actions.
    pub fn verb(&self) -> Option<Verb> {
        Some(match self {
            Action::Set { .. } => Verb::Set,
            Action::SetIn { .. } => Verb::SetIn,
            Action::Patch { .. } => Verb::Patch,
            Action::Apply { .. } => Verb::Apply,
            Action::Delete { .. } => Verb::Delete,
            Action::ListPush { .. } => Verb::ListPush,
            Action::ListPop { .. } => Verb::ListPop,
            Action::ListShift { .. } => Verb::ListShift,
            Action::ListUnshift { .. } => Verb::ListUnshift,
            Action::ListSplice { .. } => Verb::ListSplice,
            Action::ListSort { .. } => Verb::ListSort,
            Action::ListFilter { .. } => Verb::ListFilter,
            Action::Custom { .. } => return None,
        })
    }

    pub fn type_name(&self) -> &str {
        match self {
            Action::Custom { action_type, .. } => action_type,
            _ => self.verb().map(Verb::type_name).unwrap_or_default(),
        }
    }

    /// Target path as written, before relative tokens are resolved.
    ///
    /// `Set` addresses the whole tree and has no path; custom actions
    /// expose the `path` entry of a map payload when there is one.
    pub fn path(&self) -> Option<Path> {
        match self {
            Action::Set { .. } => None,
            Action::SetIn { path, .. }
            | Action::Patch { path, .. }
            | Action::Apply { path, .. }
            | Action::Delete { path, .. }
            | Action::ListPush { path, .. }
            | Action::ListPop { path }
            | Action::ListShift { path }
            | Action::ListUnshift { path, .. }
            | Action::ListSplice { path, .. }
            | Action::ListSort { path, .. }
            | Action::ListFilter { path, .. } => Some(path.clone()),
            Action::Custom { payload, .. } => payload.get("path").and_then(Path::from_value),
        }
    }

    /// Data view of the payload. Closures are omitted.
    pub fn payload(&self) -> Value {
        let mut fields = std::collections::BTreeMap::new();
        match self {
            Action::Custom { payload, .. } => return payload.clone(),
            Action::Set { value } => {
                fields.insert("value".to_string(), value.clone());
            }
            Action::SetIn { path, value } | Action::Patch { path, value } => {
                fields.insert("path".to_string(), path.to_value());
                fields.insert("value".to_string(), value.clone());
            }
            Action::Delete { path, key } => {
                fields.insert("path".to_string(), path.to_value());
                fields.insert("key".to_string(), Value::from(key.as_str()));
            }
            Action::ListPush { path, items } | Action::ListUnshift { path, items } => {
                fields.insert("path".to_string(), path.to_value());
                fields.insert("items".to_string(), Value::from(items.clone()));
            }
            Action::ListSplice {
                path,
                index,
                delete_count,
                items,
            } => {
                fields.insert("path".to_string(), path.to_value());
                fields.insert("index".to_string(), Value::from(*index));
                fields.insert(
                    "deleteCount".to_string(),
                    Value::from(i64::try_from(*delete_count).unwrap_or(i64::MAX)),
                );
                fields.insert("items".to_string(), Value::from(items.clone()));
            }
            Action::Apply { path, .. }
            | Action::ListPop { path }
            | Action::ListShift { path }
            | Action::ListSort { path, .. }
            | Action::ListFilter { path, .. } => {
                fields.insert("path".to_string(), path.to_value());
            }
        }
        Value::from(fields)
    }

    /// Re-root the action under `base`.
    ///
    /// `Set` becomes `SetIn` at the base so it only replaces the subtree;
    /// custom actions with a map payload get `base ++ path` as their path.
    pub fn with_base(self, base: &Path) -> Action {
        match self {
            Action::Set { value } => Action::SetIn {
                path: base.clone(),
                value,
            },
            Action::SetIn { path, value } => Action::SetIn {
                path: base.join(&path),
                value,
            },
            Action::Patch { path, value } => Action::Patch {
                path: base.join(&path),
                value,
            },
            Action::Apply { path, operation } => Action::Apply {
                path: base.join(&path),
                operation,
            },
            Action::Delete { path, key } => Action::Delete {
                path: base.join(&path),
                key,
            },
            Action::ListPush { path, items } => Action::ListPush {
                path: base.join(&path),
                items,
            },
            Action::ListPop { path } => Action::ListPop {
                path: base.join(&path),
            },
            Action::ListShift { path } => Action::ListShift {
                path: base.join(&path),
            },
            Action::ListUnshift { path, items } => Action::ListUnshift {
                path: base.join(&path),
                items,
            },
            Action::ListSplice {
                path,
                index,
                delete_count,
                items,
            } => Action::ListSplice {
                path: base.join(&path),
                index,
                delete_count,
                items,
            },
            Action::ListSort { path, compare } => Action::ListSort {
                path: base.join(&path),
                compare,
            },
            Action::ListFilter { path, predicate } => Action::ListFilter {
                path: base.join(&path),
                predicate,
            },
            Action::Custom {
                action_type,
                payload: Value::Map(mut fields),
            } => {
                let relative = fields
                    .get("path")
                    .and_then(Path::from_value)
                    .unwrap_or_default();
                Arc::make_mut(&mut fields).insert("path".to_string(), base.join(&relative).to_value());
                Action::Custom {
                    action_type,
                    payload: Value::Map(fields),
                }
            }
            custom @ Action::Custom { .. } => custom,
        }
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action")
            .field("type", &self.type_name())
            .field("payload", &self.payload())
            .finish()
    }
}
