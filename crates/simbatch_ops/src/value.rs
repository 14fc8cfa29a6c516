//! Values passed between batch operations.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A scalar or a list of values.
///
/// A batch-shaped value is a [`Value::List`] with one entry per batch item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Integer scalar.
    Int(i64),
    /// Floating point scalar.
    Float(f64),
    /// Text.
    Text(String),
    /// Ordered list of values.
    List(Vec<Value>),
}

impl Value {
    /// Name of this value's kind, for error messages.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
            Self::List(_) => "list",
        }
    }

    /// Returns the integer held by this value.
    ///
    /// # Errors
    ///
    /// Returns a type mismatch if the value is not an integer.
    pub fn as_int(&self) -> Result<i64> {
        match self {
            Self::Int(n) => Ok(*n),
            other => Err(other.mismatch("int")),
        }
    }

    /// Returns this value as a float, widening integers.
    ///
    /// # Errors
    ///
    /// Returns a type mismatch if the value is not numeric.
    #[allow(clippy::cast_precision_loss)]
    pub fn as_float(&self) -> Result<f64> {
        match self {
            Self::Int(n) => Ok(*n as f64),
            Self::Float(x) => Ok(*x),
            other => Err(other.mismatch("float")),
        }
    }

    /// Returns the text held by this value.
    ///
    /// # Errors
    ///
    /// Returns a type mismatch if the value is not text.
    pub fn as_text(&self) -> Result<&str> {
        match self {
            Self::Text(s) => Ok(s),
            other => Err(other.mismatch("text")),
        }
    }

    /// Returns the items of a list.
    ///
    /// # Errors
    ///
    /// Returns a type mismatch if the value is not a list.
    pub fn as_list(&self) -> Result<&[Self]> {
        match self {
            Self::List(items) => Ok(items),
            other => Err(other.mismatch("list")),
        }
    }

    /// Number of items if this is a list.
    #[must_use]
    pub fn len(&self) -> Option<usize> {
        match self {
            Self::List(items) => Some(items.len()),
            _ => None,
        }
    }

    /// Returns true for an empty list.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == Some(0)
    }

    /// Entry `index` of every item of a list of lists.
    ///
    /// Useful for reading one field out of a stacked batch result.
    ///
    /// # Errors
    ///
    /// Returns an error if this is not a list of lists, or an item is
    /// too short.
    pub fn column(&self, index: usize) -> Result<Vec<Self>> {
        self.as_list()?
            .iter()
            .map(|row| {
                let row = row.as_list()?;
                row.get(index).cloned().ok_or(Error::TypeMismatch {
                    expected: "list with enough entries",
                    found: "shorter list",
                })
            })
            .collect()
    }

    fn mismatch(&self, expected: &'static str) -> Error {
        Error::TypeMismatch {
            expected,
            found: self.kind(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(n) => write!(f, "{n}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Text(s) => f.write_str(s),
            Self::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{item}")?;
                }
                Ok(())
            }
        }
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::Int(i64::from(n))
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Self::Int(i64::from(n))
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Self::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl<T: Into<Self>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Self::List(items.into_iter().map(Into::into).collect())
    }
}

impl FromIterator<Self> for Value {
    fn from_iter<I: IntoIterator<Item = Self>>(iter: I) -> Self {
        Self::List(iter.into_iter().collect())
    }
}
