use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use clap::ValueEnum;
use serde_json::Value as JsonValue;

use crate::error::SqlError;

/// Values that can be stored in a database row or used as query parameters.
///
/// ```rust
/// use sql_local_auth::prelude::*;
///
/// let params = vec![
///     RowValues::Int(1),
///     RowValues::Text("alice".into()),
///     RowValues::Bool(true),
/// ];
/// # let _ = params;
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum RowValues {
    /// Integer value (64-bit)
    Int(i64),
    /// Floating point value (64-bit)
    Float(f64),
    /// Text/string value
    Text(String),
    /// Boolean value
    Bool(bool),
    /// Timestamp value
    Timestamp(NaiveDateTime),
    /// NULL value
    Null,
    /// JSON value
    JSON(JsonValue),
    /// Binary data
    Blob(Vec<u8>),
}

impl RowValues {
    /// Check if this value is NULL
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn as_int(&self) -> Option<&i64> {
        if let RowValues::Int(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        if let RowValues::Text(value) = self {
            Some(value)
        } else {
            None
        }
    }

    /// Short name of the value's kind, safe to put in error messages.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            RowValues::Int(_) => "integer",
            RowValues::Float(_) => "float",
            RowValues::Text(_) => "text",
            RowValues::Bool(_) => "boolean",
            RowValues::Timestamp(_) => "timestamp",
            RowValues::Null => "null",
            RowValues::JSON(_) => "json",
            RowValues::Blob(_) => "binary",
        }
    }

    /// JSON rendering used when rows are merged into profile data.
    #[must_use]
    pub fn to_json(&self) -> JsonValue {
        match self {
            RowValues::Int(i) => JsonValue::from(*i),
            RowValues::Float(f) => JsonValue::from(*f),
            RowValues::Text(s) => JsonValue::from(s.as_str()),
            RowValues::Bool(b) => JsonValue::from(*b),
            RowValues::Timestamp(dt) => JsonValue::from(dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string()),
            RowValues::Null => JsonValue::Null,
            RowValues::JSON(v) => v.clone(),
            RowValues::Blob(bytes) => JsonValue::from(bytes.clone()),
        }
    }
}

/// How a statement is submitted to the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, ValueEnum)]
pub enum ExecMode {
    /// Run the SQL text as-is.
    #[default]
    Direct,
    /// Treat the SQL text as a procedure name and pass bindings as named arguments.
    StoredProcedure,
}

impl fmt::Display for ExecMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecMode::Direct => f.write_str("direct"),
            ExecMode::StoredProcedure => f.write_str("stored-procedure"),
        }
    }
}

/// Declared SQL Server type of a bound parameter.
///
/// Names parse case-insensitively (`"VarChar"`, `"varchar"`, `"NVarChar"`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
#[value(rename_all = "verbatim")]
pub enum SqlType {
    VarChar,
    NVarChar,
    Char,
    NChar,
    Text,
    NText,
    TinyInt,
    SmallInt,
    Int,
    BigInt,
    Bit,
    Float,
    Real,
    Decimal,
    DateTime,
    DateTime2,
    Date,
    VarBinary,
    UniqueIdentifier,
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_possible_value() {
            Some(value) => f.write_str(value.get_name()),
            None => write!(f, "{self:?}"),
        }
    }
}

impl FromStr for SqlType {
    type Err = SqlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <SqlType as ValueEnum>::from_str(s, true)
            .map_err(|_| SqlError::BindingError(format!("unsupported SQL type '{s}'")))
    }
}

/// A parameter value already checked against its declared type.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
    Text(String),
    U8(u8),
    I16(i16),
    I32(i32),
    I64(i64),
    Bit(bool),
    F32(f32),
    F64(f64),
    DateTime(NaiveDateTime),
    Date(NaiveDate),
    Binary(Vec<u8>),
    /// NULL carrying the declared type so the driver can send a typed null.
    Null(SqlType),
}

impl SqlType {
    /// Check `value` against this declared type.
    ///
    /// Integers must fit the declared width; NULL is accepted for every type. The returned message
    /// never contains the value itself.
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    pub fn coerce(self, value: &RowValues) -> Result<TypedValue, String> {
        let mismatch = || format!("{} value cannot be bound as {self}", value.kind());
        let narrow = || format!("integer is out of range for {self}");

        if value.is_null() {
            return Ok(TypedValue::Null(self));
        }

        match self {
            SqlType::VarChar
            | SqlType::NVarChar
            | SqlType::Char
            | SqlType::NChar
            | SqlType::Text
            | SqlType::NText
            | SqlType::UniqueIdentifier => match value {
                RowValues::Text(s) => Ok(TypedValue::Text(s.clone())),
                RowValues::JSON(v) => Ok(TypedValue::Text(v.to_string())),
                _ => Err(mismatch()),
            },
            SqlType::TinyInt => match value {
                RowValues::Int(i) => u8::try_from(*i).map(TypedValue::U8).map_err(|_| narrow()),
                _ => Err(mismatch()),
            },
            SqlType::SmallInt => match value {
                RowValues::Int(i) => i16::try_from(*i).map(TypedValue::I16).map_err(|_| narrow()),
                _ => Err(mismatch()),
            },
            SqlType::Int => match value {
                RowValues::Int(i) => i32::try_from(*i).map(TypedValue::I32).map_err(|_| narrow()),
                _ => Err(mismatch()),
            },
            SqlType::BigInt => match value {
                RowValues::Int(i) => Ok(TypedValue::I64(*i)),
                _ => Err(mismatch()),
            },
            SqlType::Bit => match value {
                RowValues::Bool(b) => Ok(TypedValue::Bit(*b)),
                RowValues::Int(0) => Ok(TypedValue::Bit(false)),
                RowValues::Int(1) => Ok(TypedValue::Bit(true)),
                _ => Err(mismatch()),
            },
            SqlType::Float | SqlType::Decimal => match value {
                RowValues::Float(f) => Ok(TypedValue::F64(*f)),
                RowValues::Int(i) => Ok(TypedValue::F64(*i as f64)),
                _ => Err(mismatch()),
            },
            SqlType::Real => match value {
                RowValues::Float(f) => Ok(TypedValue::F32(*f as f32)),
                RowValues::Int(i) => Ok(TypedValue::F32(*i as f32)),
                _ => Err(mismatch()),
            },
            SqlType::DateTime | SqlType::DateTime2 => match value {
                RowValues::Timestamp(dt) => Ok(TypedValue::DateTime(*dt)),
                _ => Err(mismatch()),
            },
            SqlType::Date => match value {
                RowValues::Timestamp(dt) => Ok(TypedValue::Date(dt.date())),
                _ => Err(mismatch()),
            },
            SqlType::VarBinary => match value {
                RowValues::Blob(bytes) => Ok(TypedValue::Binary(bytes.clone())),
                _ => Err(mismatch()),
            },
        }
    }
}

/// A named, typed query parameter (`@name` in the SQL text).
#[derive(Clone, PartialEq)]
pub struct ParameterBinding {
    pub name: String,
    pub sql_type: SqlType,
    pub value: RowValues,
}

impl ParameterBinding {
    /// Create a binding; a leading `@` on `name` is ignored.
    pub fn new(name: impl Into<String>, sql_type: SqlType, value: RowValues) -> Self {
        let name = name.into();
        let name = match name.strip_prefix('@') {
            Some(stripped) => stripped.to_string(),
            None => name,
        };
        Self {
            name,
            sql_type,
            value,
        }
    }

    /// Create a binding from a declared type name such as `"VarChar"`.
    ///
    /// # Errors
    ///
    /// Returns `SqlError::BindingError` if the type name is unknown.
    pub fn typed(
        name: impl Into<String>,
        type_name: &str,
        value: RowValues,
    ) -> Result<Self, SqlError> {
        Ok(Self::new(name, type_name.parse()?, value))
    }

    #[must_use]
    pub fn varchar(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(name, SqlType::VarChar, RowValues::Text(value.into()))
    }

    #[must_use]
    pub fn int(name: impl Into<String>, value: i64) -> Self {
        Self::new(name, SqlType::Int, RowValues::Int(value))
    }
}

// Parameter values are frequently credentials; keep them out of logs.
impl fmt::Debug for ParameterBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParameterBinding")
            .field("name", &self.name)
            .field("sql_type", &self.sql_type)
            .field("value", &self.value.kind())
            .finish()
    }
}
