//! List responses arrive in one of a few known envelopes. Anything outside
//! that set is reported instead of silently rendering an empty list.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::error::{AppError, ErrorKind};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EnvelopeError {
    #[error("unrecognized list envelope: {found}")]
    UnrecognizedShape { found: String },

    #[error("item {index} could not be decoded: {reason}")]
    InvalidItem { index: usize, reason: String },
}

impl From<EnvelopeError> for AppError {
    fn from(e: EnvelopeError) -> Self {
        let kind = match e {
            EnvelopeError::UnrecognizedShape { .. } => ErrorKind::UnexpectedShape,
            EnvelopeError::InvalidItem { .. } => ErrorKind::Deserialization,
        };
        AppError::new(kind, e.to_string())
    }
}

/// Which envelope a list came in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvelopeShape {
    Bare,
    Paginated {
        count: Option<u64>,
        next: Option<String>,
    },
    Named(&'static str),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListPage<T> {
    pub items: Vec<T>,
    pub shape: EnvelopeShape,
}

impl<T> ListPage<T> {
    pub fn has_more(&self) -> bool {
        matches!(&self.shape, EnvelopeShape::Paginated { next: Some(_), .. })
    }
}

/// Parses `[..]`, `{"results": [..]}` or `{"<named_key>": [..]}`.
pub fn parse_list<T: DeserializeOwned>(
    value: Value,
    named_key: &'static str,
) -> Result<ListPage<T>, EnvelopeError> {
    let (raw_items, shape) = match value {
        Value::Array(items) => (items, EnvelopeShape::Bare),
        Value::Object(mut object) => match object.remove("results") {
            Some(Value::Array(items)) => {
                let shape = EnvelopeShape::Paginated {
                    count: object.get("count").and_then(Value::as_u64),
                    next: object.get("next").and_then(Value::as_str).map(String::from),
                };
                (items, shape)
            }
            Some(other) => {
                return Err(EnvelopeError::UnrecognizedShape {
                    found: format!("'results' holding {}", describe(&other)),
                })
            }
            None => match object.remove(named_key) {
                Some(Value::Array(items)) => (items, EnvelopeShape::Named(named_key)),
                Some(other) => {
                    return Err(EnvelopeError::UnrecognizedShape {
                        found: format!("'{named_key}' holding {}", describe(&other)),
                    })
                }
                None => {
                    return Err(EnvelopeError::UnrecognizedShape {
                        found: describe_keys(&object),
                    })
                }
            },
        },
        other => {
            return Err(EnvelopeError::UnrecognizedShape {
                found: describe(&other),
            })
        }
    };

    let items = raw_items
        .into_iter()
        .enumerate()
        .map(|(index, raw)| {
            serde_json::from_value(raw).map_err(|e| EnvelopeError::InvalidItem {
                index,
                reason: e.to_string(),
            })
        })
        .collect::<Result<Vec<T>, _>>()?;

    Ok(ListPage { items, shape })
}

fn describe(value: &Value) -> String {
    match value {
        Value::Null => "null".into(),
        Value::Bool(_) => "a boolean".into(),
        Value::Number(_) => "a number".into(),
        Value::String(_) => "a string".into(),
        Value::Array(_) => "an array".into(),
        Value::Object(object) => describe_keys(object),
    }
}

fn describe_keys(object: &Map<String, Value>) -> String {
    let keys: Vec<&str> = object.keys().map(String::as_str).take(5).collect();
    format!("an object with keys [{}]", keys.join(", "))
}
