//! Dynamic value normalization and wire type inference.
//!
//! Caller data arrives loosely typed: either as nodes of a parsed JSON
//! document ([`serde_json::Value`]) or as host-native primitives. Both are
//! resolved once, at the boundary, into the closed [`FieldValue`] variant so
//! the statement builders only ever see a fixed set of types.
//!
//! Each `FieldValue` also carries a [`WireType`] hint. Parameters are bound
//! with that type declared explicitly, so a JSON number compared against an
//! integer column is sent as an integer and not silently as text.

use bytes::BytesMut;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use std::error::Error;
use tokio_postgres::types::{IsNull, ToSql, Type};

/// A normalized, bindable parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Int(i32),
    BigInt(i64),
    Real(f32),
    Double(f64),
    Decimal(Decimal),
    Bool(bool),
    Text(String),
    Bytes(Vec<u8>),
    Timestamp(NaiveDateTime),
    TimestampTz(DateTime<Utc>),
    Date(NaiveDate),
    /// A JSON object or array kept as its canonical text. Stored as opaque text.
    Json(String),
}

/// Parameter type hint sent alongside a bound value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WireType {
    Integer,
    Long,
    Float,
    Double,
    Decimal,
    Boolean,
    Text,
    Timestamp,
    TimestampTz,
    Date,
    Binary,
    /// No usable hint; the engine resolves the type from context.
    Unknown,
}

impl WireType {
    /// The Postgres type declared for a parameter carrying this hint.
    pub fn pg_type(self) -> Type {
        match self {
            WireType::Integer => Type::INT4,
            WireType::Long => Type::INT8,
            WireType::Float => Type::FLOAT4,
            WireType::Double => Type::FLOAT8,
            WireType::Decimal => Type::NUMERIC,
            WireType::Boolean => Type::BOOL,
            WireType::Text => Type::TEXT,
            WireType::Timestamp => Type::TIMESTAMP,
            WireType::TimestampTz => Type::TIMESTAMPTZ,
            WireType::Date => Type::DATE,
            WireType::Binary => Type::BYTEA,
            WireType::Unknown => Type::UNKNOWN,
        }
    }
}

/// Normalize any supported input into a [`FieldValue`].
///
/// Already-normalized values pass through unchanged, so
/// `normalize(normalize(x)) == normalize(x)`.
pub fn normalize(value: impl Into<FieldValue>) -> FieldValue {
    value.into()
}

impl FieldValue {
    /// Infer the parameter type hint for this value.
    pub fn wire_type(&self) -> WireType {
        match self {
            FieldValue::Null => WireType::Unknown,
            FieldValue::Int(_) => WireType::Integer,
            FieldValue::BigInt(_) => WireType::Long,
            FieldValue::Real(_) => WireType::Float,
            FieldValue::Double(_) => WireType::Double,
            FieldValue::Decimal(_) => WireType::Decimal,
            FieldValue::Bool(_) => WireType::Boolean,
            FieldValue::Text(_) | FieldValue::Json(_) => WireType::Text,
            FieldValue::Bytes(_) => WireType::Binary,
            FieldValue::Timestamp(_) => WireType::Timestamp,
            FieldValue::TimestampTz(_) => WireType::TimestampTz,
            FieldValue::Date(_) => WireType::Date,
        }
    }

    /// Whether this value binds as SQL NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    fn from_json_number(n: &serde_json::Number) -> Self {
        if let Some(v) = n.as_i64() {
            return match i32::try_from(v) {
                Ok(small) => FieldValue::Int(small),
                Err(_) => FieldValue::BigInt(v),
            };
        }
        if let Some(v) = n.as_f64() {
            return FieldValue::Double(v);
        }
        FieldValue::Text(n.to_string())
    }
}

impl From<serde_json::Value> for FieldValue {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => FieldValue::Null,
            Value::Bool(b) => FieldValue::Bool(b),
            Value::Number(n) => FieldValue::from_json_number(&n),
            Value::String(s) => FieldValue::Text(s),
            v @ (Value::Array(_) | Value::Object(_)) => FieldValue::Json(v.to_string()),
        }
    }
}

impl From<&serde_json::Value> for FieldValue {
    fn from(value: &serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => FieldValue::Null,
            Value::Bool(b) => FieldValue::Bool(*b),
            Value::Number(n) => FieldValue::from_json_number(n),
            Value::String(s) => FieldValue::Text(s.clone()),
            Value::Array(_) | Value::Object(_) => FieldValue::Json(value.to_string()),
        }
    }
}

macro_rules! field_value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for FieldValue {
                fn from(v: $ty) -> Self {
                    FieldValue::$variant(v.into())
                }
            }
        )*
    };
}

field_value_from! {
    i16 => Int,
    i32 => Int,
    i64 => BigInt,
    f32 => Real,
    f64 => Double,
    Decimal => Decimal,
    bool => Bool,
    String => Text,
    &str => Text,
    Vec<u8> => Bytes,
    &[u8] => Bytes,
    NaiveDateTime => Timestamp,
    DateTime<Utc> => TimestampTz,
    NaiveDate => Date,
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(FieldValue::Null, Into::into)
    }
}

impl ToSql for FieldValue {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
        match self {
            FieldValue::Null => Ok(IsNull::Yes),
            FieldValue::Int(v) => v.to_sql(ty, out),
            FieldValue::BigInt(v) => v.to_sql(ty, out),
            FieldValue::Real(v) => v.to_sql(ty, out),
            FieldValue::Double(v) => v.to_sql(ty, out),
            FieldValue::Decimal(v) => v.to_sql(ty, out),
            FieldValue::Bool(v) => v.to_sql(ty, out),
            FieldValue::Text(v) | FieldValue::Json(v) => v.to_sql(ty, out),
            FieldValue::Bytes(v) => v.to_sql(ty, out),
            FieldValue::Timestamp(v) => v.to_sql(ty, out),
            FieldValue::TimestampTz(v) => v.to_sql(ty, out),
            FieldValue::Date(v) => v.to_sql(ty, out),
        }
    }

    // The declared type always comes from `wire_type()`, so any type is accepted here.
    fn accepts(_: &Type) -> bool {
        true
    }

    tokio_postgres::types::to_sql_checked!();
}

/// An ordered column → value map, unique by column name.
///
/// Re-inserting an existing column replaces its value in place, so the
/// generated column order stays the first-seen order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnValues {
    entries: Vec<(String, FieldValue)>,
}

impl ColumnValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a column value.
    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<FieldValue>) {
        let column = column.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(name, _)| *name == column) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((column, value)),
        }
    }

    /// Builder-style [`ColumnValues::insert`].
    pub fn with(mut self, column: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.insert(column, value);
        self
    }

    pub fn get(&self, column: &str) -> Option<&FieldValue> {
        self.entries
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Build from a JSON object, keeping its key order.
    pub fn from_json_object(object: serde_json::Map<String, serde_json::Value>) -> Self {
        object.into_iter().collect()
    }

    /// Build from an arbitrary JSON value; anything but an object is rejected.
    pub fn from_json(value: serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Object(object) => Some(Self::from_json_object(object)),
            _ => None,
        }
    }
}

impl<K, V> FromIterator<(K, V)> for ColumnValues
where
    K: Into<String>,
    V: Into<FieldValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut values = ColumnValues::new();
        for (k, v) in iter {
            values.insert(k, v);
        }
        values
    }
}
