//! Building actions from plain data (`{"type": ..., "payload": ...}`).
//!
//! Only data-carrying verbs can be expressed this way; `@@apply` and
//! `@@list-filter` need a closure and are rejected.

use super::{Action, Verb};
use crate::error::StoreError;
use crate::path::Path;
use crate::tree::Value;

impl Action {
    /// Interpret `payload` for the given action type. Unknown types become
    /// [`Action::Custom`].
    pub fn from_parts(action_type: &str, payload: Value) -> Result<Action, StoreError> {
        let Some(verb) = Verb::from_type_name(action_type) else {
            return Ok(Action::Custom {
                action_type: action_type.to_string(),
                payload,
            });
        };

        let fields = Fields {
            verb,
            payload: &payload,
        };
        Ok(match verb {
            Verb::Set => Action::Set {
                value: fields.value(),
            },
            Verb::SetIn => Action::SetIn {
                path: fields.path()?,
                value: fields.value(),
            },
            Verb::Patch => Action::Patch {
                path: fields.path()?,
                value: fields.value(),
            },
            Verb::Delete => Action::Delete {
                path: fields.path()?,
                key: fields.key()?,
            },
            Verb::ListPush => Action::ListPush {
                path: fields.path()?,
                items: fields.items()?,
            },
            Verb::ListUnshift => Action::ListUnshift {
                path: fields.path()?,
                items: fields.items()?,
            },
            Verb::ListPop => Action::ListPop {
                path: fields.path()?,
            },
            Verb::ListShift => Action::ListShift {
                path: fields.path()?,
            },
            Verb::ListSplice => Action::ListSplice {
                path: fields.path()?,
                index: fields.int("index")?.unwrap_or(0),
                delete_count: match fields.int("deleteCount")? {
                    Some(count) => usize::try_from(count)
                        .map_err(|_| fields.invalid("deleteCount must not be negative"))?,
                    None => 0,
                },
                items: fields.items()?,
            },
            Verb::ListSort => Action::ListSort {
                path: fields.path()?,
                compare: None,
            },
            Verb::Apply | Verb::ListFilter => {
                return Err(fields.invalid("this verb carries a closure and cannot be built from data"))
            }
        })
    }

    /// Parse `{"type": "...", "payload": ...}`. A missing payload is null.
    pub fn from_json(json: &serde_json::Value) -> Result<Action, StoreError> {
        let action_type = json
            .get("type")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| StoreError::InvalidPayload {
                action_type: String::new(),
                reason: "missing string field 'type'".to_string(),
            })?;
        let payload = json.get("payload").map(Value::from).unwrap_or_default();
        Action::from_parts(action_type, payload)
    }
}

struct Fields<'a> {
    verb: Verb,
    payload: &'a Value,
}

impl Fields<'_> {
    fn invalid(&self, reason: &str) -> StoreError {
        StoreError::InvalidPayload {
            action_type: self.verb.type_name().to_string(),
            reason: reason.to_string(),
        }
    }

    fn path(&self) -> Result<Path, StoreError> {
        match self.payload.get("path") {
            None | Some(Value::Null) => Ok(Path::root()),
            Some(raw) => {
                Path::from_value(raw).ok_or_else(|| self.invalid("path must be a string or a list of keys"))
            }
        }
    }

    fn value(&self) -> Value {
        self.payload.get("value").cloned().unwrap_or_default()
    }

    fn key(&self) -> Result<String, StoreError> {
        self.payload
            .get("key")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| self.invalid("key must be a string"))
    }

    fn items(&self) -> Result<Vec<Value>, StoreError> {
        match self.payload.get("items") {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(Value::List(items)) => Ok(items.as_ref().clone()),
            Some(_) => Err(self.invalid("items must be a list")),
        }
    }

    fn int(&self, name: &str) -> Result<Option<i64>, StoreError> {
        match self.payload.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Int(i)) => Ok(Some(*i)),
            Some(_) => Err(self.invalid(&format!("{name} must be an integer"))),
        }
    }
}
