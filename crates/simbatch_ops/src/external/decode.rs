//! Decoding of captured command output.

use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Declared element type of an external command's output.
///
/// Numeric types read output as whitespace-separated tokens and decode it into
/// a list. [`ResultType::Text`] keeps the output verbatim. Commands without a
/// declared type decode as [`ResultType::Float64`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultType {
    /// 32-bit signed integers.
    Int32,
    /// 64-bit signed integers.
    Int64,
    /// 32-bit unsigned integers.
    Uint32,
    /// 32-bit floats.
    Float32,
    /// 64-bit floats.
    #[default]
    Float64,
    /// Unparsed output as a single string.
    Text,
}

impl ResultType {
    /// Name used in templates and configuration files.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::Uint32 => "uint32",
            Self::Float32 => "float32",
            Self::Float64 => "float64",
            Self::Text => "text",
        }
    }

    /// Decodes captured output into a list of scalars, or a string for
    /// [`ResultType::Text`].
    ///
    /// # Errors
    ///
    /// Returns a description of the first token that does not parse.
    pub fn decode(self, output: &str) -> Result<Value, String> {
        if self == Self::Text {
            return Ok(Value::Text(output.to_string()));
        }
        output
            .split_whitespace()
            .enumerate()
            .map(|(i, token)| {
                self.decode_token(token)
                    .ok_or_else(|| format!("token {i} ('{token}') is not a valid {self}"))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Value::List)
    }

    fn decode_token(self, token: &str) -> Option<Value> {
        match self {
            Self::Int32 => token.parse::<i32>().ok().map(Value::from),
            Self::Int64 => token.parse::<i64>().ok().map(Value::Int),
            Self::Uint32 => token.parse::<u32>().ok().map(Value::from),
            Self::Float32 => token.parse::<f32>().ok().map(|x| Value::Float(f64::from(x))),
            Self::Float64 => token.parse::<f64>().ok().map(Value::Float),
            Self::Text => Some(Value::Text(token.to_string())),
        }
    }
}

impl fmt::Display for ResultType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResultType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "int32" => Ok(Self::Int32),
            "int64" => Ok(Self::Int64),
            "uint32" => Ok(Self::Uint32),
            "float32" => Ok(Self::Float32),
            "float64" => Ok(Self::Float64),
            "text" => Ok(Self::Text),
            other => Err(format!("unknown result type: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_whitespace_separated_integers() {
        let value = ResultType::Int32.decode("1 123 4\t5\n6\n").unwrap();
        assert_eq!(value, Value::from(vec![1, 123, 4, 5, 6]));
    }

    #[test]
    fn out_of_range_integers_fail() {
        assert!(ResultType::Int32.decode("3000000000").is_err());
        assert_eq!(
            ResultType::Int64.decode("3000000000").unwrap(),
            Value::from(vec![3_000_000_000i64])
        );
        assert!(ResultType::Uint32.decode("-1").is_err());
    }

    #[test]
    fn decodes_floats() {
        assert_eq!(
            ResultType::Float64.decode("0.5 -2").unwrap(),
            Value::from(vec![0.5, -2.0])
        );
        assert_eq!(
            ResultType::Float32.decode("0.25").unwrap(),
            Value::from(vec![0.25])
        );
    }

    #[test]
    fn reports_offending_token() {
        let err = ResultType::Int32.decode("1 two 3").unwrap_err();
        assert!(err.contains("token 1"), "{err}");
        assert!(err.contains("int32"), "{err}");
    }

    #[test]
    fn empty_output_is_an_empty_list() {
        assert_eq!(ResultType::Float64.decode("  \n").unwrap(), Value::List(Vec::new()));
    }

    #[test]
    fn text_keeps_output_verbatim() {
        assert_eq!(
            ResultType::Text.decode("1 2\n").unwrap(),
            Value::Text("1 2\n".to_string())
        );
    }

    #[test]
    fn default_is_float64() {
        assert_eq!(ResultType::default(), ResultType::Float64);
        assert_eq!(
            ResultType::default().decode("1 123").unwrap(),
            Value::from(vec![1.0, 123.0])
        );
    }

    #[test]
    fn names_round_trip() {
        for ty in [
            ResultType::Int32,
            ResultType::Int64,
            ResultType::Uint32,
            ResultType::Float32,
            ResultType::Float64,
            ResultType::Text,
        ] {
            assert_eq!(ty.as_str().parse::<ResultType>().unwrap(), ty);
        }
        assert!("complex".parse::<ResultType>().is_err());
    }
}
