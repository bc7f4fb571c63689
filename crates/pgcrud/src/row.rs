//! Result row mapping.
//!
//! Every column is rendered into a display-oriented [`serde_json::Value`]
//! keyed by column name, in engine column order. SQL NULL becomes the empty
//! string; temporal values become ISO-8601 text; numbers stay numbers.

use crate::error::{CrudError, CrudResult};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde_json::{Map, Number, Value};
use std::error::Error;
use std::fmt::Write as _;
use tokio_postgres::Row;
use tokio_postgres::types::{FromSql, Kind, Type};

type BoxError = Box<dyn Error + Sync + Send>;

/// One mapped row: column name → display value.
///
/// Column order follows the statement. A repeated column name keeps its
/// first position and the last value written.
pub type ResultRow = Map<String, Value>;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";
const TIMESTAMPTZ_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Map every row of a result set.
pub fn map_rows(rows: &[Row]) -> CrudResult<Vec<ResultRow>> {
    rows.iter().map(map_row).collect()
}

/// Map a single row.
pub fn map_row(row: &Row) -> CrudResult<ResultRow> {
    let mut out = ResultRow::new();
    for (idx, column) in row.columns().iter().enumerate() {
        let raw: RawValue<'_> = row
            .try_get(idx)
            .map_err(|e| CrudError::decode(column.name(), e.to_string()))?;
        let value = decode_value(column.type_(), raw.0)
            .map_err(|e| CrudError::decode(column.name(), e.to_string()))?;
        out.insert(column.name().to_string(), value);
    }
    Ok(out)
}

/// Render one binary-format column value. `None` is SQL NULL.
pub fn decode_value(ty: &Type, raw: Option<&[u8]>) -> Result<Value, BoxError> {
    match raw {
        Some(raw) => decode_non_null(ty, raw),
        None => Ok(Value::String(String::new())),
    }
}

/// Borrowed wire bytes of any column type.
struct RawValue<'a>(Option<&'a [u8]>);

impl<'a> FromSql<'a> for RawValue<'a> {
    fn from_sql(_: &Type, raw: &'a [u8]) -> Result<Self, BoxError> {
        Ok(RawValue(Some(raw)))
    }

    fn from_sql_null(_: &Type) -> Result<Self, BoxError> {
        Ok(RawValue(None))
    }

    fn accepts(_: &Type) -> bool {
        true
    }
}

fn decode_non_null(ty: &Type, raw: &[u8]) -> Result<Value, BoxError> {
    let value = match *ty {
        Type::BOOL => Value::Bool(bool::from_sql(ty, raw)?),
        Type::INT2 => Value::from(i16::from_sql(ty, raw)?),
        Type::INT4 => Value::from(i32::from_sql(ty, raw)?),
        Type::INT8 => Value::from(i64::from_sql(ty, raw)?),
        Type::OID => Value::from(u32::from_sql(ty, raw)?),
        Type::FLOAT4 => float_value(shortest_f64(f32::from_sql(ty, raw)?)),
        Type::FLOAT8 => float_value(f64::from_sql(ty, raw)?),
        Type::NUMERIC => Value::String(numeric_text(raw)?),
        Type::CHAR => Value::String(char::from(i8::from_sql(ty, raw)? as u8).to_string()),
        Type::TIMESTAMP => Value::String(match infinite_i64(raw) {
            Some(text) => text.to_string(),
            None => NaiveDateTime::from_sql(ty, raw)?
                .format(TIMESTAMP_FORMAT)
                .to_string(),
        }),
        Type::TIMESTAMPTZ => Value::String(match infinite_i64(raw) {
            Some(text) => text.to_string(),
            None => DateTime::<Utc>::from_sql(ty, raw)?
                .format(TIMESTAMPTZ_FORMAT)
                .to_string(),
        }),
        Type::DATE => Value::String(match infinite_i32(raw) {
            Some(text) => text.to_string(),
            None => NaiveDate::from_sql(ty, raw)?.format(DATE_FORMAT).to_string(),
        }),
        Type::TIME => Value::String(NaiveTime::from_sql(ty, raw)?.to_string()),
        Type::UUID => Value::String(uuid::Uuid::from_sql(ty, raw)?.to_string()),
        Type::JSON | Type::JSONB => Value::String(Value::from_sql(ty, raw)?.to_string()),
        Type::BYTEA => Value::String(hex(raw)),
        Type::INET => {
            let inet = cidr::IpInet::from_sql(ty, raw)?;
            Value::String(if inet.is_host_address() {
                inet.address().to_string()
            } else {
                format!("{}/{}", inet.address(), inet.network_length())
            })
        }
        Type::CIDR => {
            let net = cidr::IpCidr::from_sql(ty, raw)?;
            Value::String(format!("{}/{}", net.first_address(), net.network_length()))
        }
        _ if <&str as FromSql>::accepts(ty) => {
            Value::String(<&str as FromSql>::from_sql(ty, raw)?.to_string())
        }
        _ => match ty.kind() {
            Kind::Enum(_) => Value::String(std::str::from_utf8(raw)?.to_string()),
            Kind::Domain(inner) => return decode_non_null(inner, raw),
            Kind::Array(_) => array_value(ty, raw)?,
            _ => Value::String(hex(raw)),
        },
    };
    Ok(value)
}

/// One-dimensional arrays become textual JSON; anything deeper falls back to hex.
fn array_value(ty: &Type, raw: &[u8]) -> Result<Value, BoxError> {
    let Kind::Array(member) = ty.kind() else {
        return Ok(Value::String(hex(raw)));
    };
    let Ok(elements) = Vec::<RawValue<'_>>::from_sql(ty, raw) else {
        return Ok(Value::String(hex(raw)));
    };
    let items = elements
        .into_iter()
        .map(|element| match element.0 {
            Some(bytes) => decode_non_null(member, bytes),
            None => Ok(Value::Null),
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Value::String(Value::Array(items).to_string()))
}

fn float_value(v: f64) -> Value {
    match Number::from_f64(v) {
        Some(n) => Value::Number(n),
        None if v.is_nan() => Value::String("NaN".to_string()),
        None if v > 0.0 => Value::String("Infinity".to_string()),
        None => Value::String("-Infinity".to_string()),
    }
}

/// Widen an `f32` keeping its shortest decimal form (`1.1`, not `1.100000023841858`).
fn shortest_f64(v: f32) -> f64 {
    if !v.is_finite() {
        return f64::from(v);
    }
    v.to_string().parse().unwrap_or(f64::from(v))
}

fn infinite_i64(raw: &[u8]) -> Option<&'static str> {
    match <[u8; 8]>::try_from(raw).map(i64::from_be_bytes) {
        Ok(i64::MAX) => Some("infinity"),
        Ok(i64::MIN) => Some("-infinity"),
        _ => None,
    }
}

fn infinite_i32(raw: &[u8]) -> Option<&'static str> {
    match <[u8; 4]>::try_from(raw).map(i32::from_be_bytes) {
        Ok(i32::MAX) => Some("infinity"),
        Ok(i32::MIN) => Some("-infinity"),
        _ => None,
    }
}

/// Exact text of a binary `numeric`, honoring its display scale.
fn numeric_text(raw: &[u8]) -> Result<String, BoxError> {
    if raw.len() < 8 {
        return Err("invalid numeric header".into());
    }
    let word = |i: usize| u16::from_be_bytes([raw[i], raw[i + 1]]);
    let ndigits = usize::from(word(0));
    let weight = i32::from(word(2) as i16);
    let sign = word(4);
    let dscale = usize::from(word(6));

    match sign {
        0xC000 => return Ok("NaN".to_string()),
        0xD000 => return Ok("Infinity".to_string()),
        0xF000 => return Ok("-Infinity".to_string()),
        0x0000 | 0x4000 => {}
        _ => return Err("invalid numeric sign".into()),
    }
    if raw.len() != 8 + ndigits * 2 {
        return Err("invalid numeric length".into());
    }

    // Base-10000 digit groups; group 0 has weight `weight`.
    let digit = |i: i32| -> u16 {
        match usize::try_from(i) {
            Ok(i) if i < ndigits => word(8 + 2 * i),
            _ => 0,
        }
    };

    let mut out = String::new();
    if sign == 0x4000 {
        out.push('-');
    }
    if weight < 0 {
        out.push('0');
    } else {
        for i in 0..=weight {
            if i == 0 {
                let _ = write!(out, "{}", digit(i));
            } else {
                let _ = write!(out, "{:04}", digit(i));
            }
        }
    }
    if dscale > 0 {
        let mut frac = String::with_capacity(dscale + 4);
        let mut i = weight + 1;
        while frac.len() < dscale {
            let _ = write!(frac, "{:04}", digit(i));
            i += 1;
        }
        frac.truncate(dscale);
        out.push('.');
        out.push_str(&frac);
    }
    Ok(out)
}

fn hex(raw: &[u8]) -> String {
    let mut out = String::with_capacity(2 + raw.len() * 2);
    out.push_str("\\x");
    for b in raw {
        let _ = write!(out, "{b:02x}");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;
    use rust_decimal::Decimal;
    use std::str::FromStr;
    use tokio_postgres::types::ToSql;

    fn encode<T: ToSql>(value: T, ty: &Type) -> Vec<u8> {
        let mut buf = BytesMut::new();
        value.to_sql(ty, &mut buf).unwrap();
        buf.to_vec()
    }

    fn decode<T: ToSql>(value: T, ty: Type) -> Value {
        let raw = encode(value, &ty);
        decode_value(&ty, Some(&raw)).unwrap()
    }

    #[test]
    fn null_is_empty_string() {
        assert_eq!(decode_value(&Type::INT4, None).unwrap(), Value::String(String::new()));
    }

    #[test]
    fn numbers_stay_numbers() {
        assert_eq!(decode(7i16, Type::INT2), Value::from(7));
        assert_eq!(decode(42i32, Type::INT4), Value::from(42));
        assert_eq!(decode(9_000_000_000i64, Type::INT8), Value::from(9_000_000_000i64));
        assert_eq!(decode(1.1f32, Type::FLOAT4), Value::from(1.1));
        assert_eq!(decode(2.5f64, Type::FLOAT8), Value::from(2.5));
        assert_eq!(decode(true, Type::BOOL), Value::Bool(true));
    }

    #[test]
    fn non_finite_floats_are_text() {
        assert_eq!(decode(f64::NAN, Type::FLOAT8), Value::from("NaN"));
        assert_eq!(decode(f64::INFINITY, Type::FLOAT8), Value::from("Infinity"));
        assert_eq!(decode(f32::NEG_INFINITY, Type::FLOAT4), Value::from("-Infinity"));
    }

    #[test]
    fn numeric_keeps_exact_digits() {
        for text in ["123.4500", "0.0005", "-12345678.9", "10000", "0"] {
            let d = Decimal::from_str(text).unwrap();
            assert_eq!(decode(d, Type::NUMERIC), Value::from(text), "{text}");
        }
    }

    #[test]
    fn numeric_special_values() {
        let nan = [0u8, 0, 0, 0, 0xC0, 0, 0, 0];
        assert_eq!(decode_value(&Type::NUMERIC, Some(&nan)).unwrap(), Value::from("NaN"));
        assert!(decode_value(&Type::NUMERIC, Some(&[0u8, 1])).is_err());
    }

    #[test]
    fn timestamps_render_iso_with_micros() {
        let ts = NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_micro_opt(10, 30, 0, 123_456)
            .unwrap();
        assert_eq!(decode(ts, Type::TIMESTAMP), Value::from("2024-01-15T10:30:00.123456"));

        let whole = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap().and_hms_opt(8, 0, 0).unwrap();
        assert_eq!(decode(whole, Type::TIMESTAMP), Value::from("2024-01-15T08:00:00.000000"));
        assert_eq!(
            decode(whole.and_utc(), Type::TIMESTAMPTZ),
            Value::from("2024-01-15T08:00:00.000000Z")
        );
    }

    #[test]
    fn dates_and_infinity() {
        let date = NaiveDate::from_ymd_opt(1999, 12, 31).unwrap();
        assert_eq!(decode(date, Type::DATE), Value::from("1999-12-31"));

        let inf = i64::MAX.to_be_bytes();
        assert_eq!(decode_value(&Type::TIMESTAMP, Some(&inf)).unwrap(), Value::from("infinity"));
        let neg = i32::MIN.to_be_bytes();
        assert_eq!(decode_value(&Type::DATE, Some(&neg)).unwrap(), Value::from("-infinity"));
    }

    #[test]
    fn text_like_uuid_and_json() {
        assert_eq!(decode("hello", Type::TEXT), Value::from("hello"));
        assert_eq!(decode("abc", Type::VARCHAR), Value::from("abc"));

        let id = uuid::Uuid::from_str("67e55044-10b1-426f-9247-bb680e5fe0c8").unwrap();
        assert_eq!(decode(id, Type::UUID), Value::from("67e55044-10b1-426f-9247-bb680e5fe0c8"));

        let doc = serde_json::json!({"a": 1, "b": [true]});
        assert_eq!(decode(doc.clone(), Type::JSONB), Value::from(r#"{"a":1,"b":[true]}"#));
        assert_eq!(decode(doc, Type::JSON), Value::from(r#"{"a":1,"b":[true]}"#));
    }

    #[test]
    fn bytea_is_hex() {
        assert_eq!(decode(vec![0xdeu8, 0xad, 0x01], Type::BYTEA), Value::from("\\xdead01"));
        assert_eq!(decode(Vec::<u8>::new(), Type::BYTEA), Value::from("\\x"));
    }

    #[test]
    fn inet_with_and_without_mask() {
        let host = [2u8, 32, 0, 4, 10, 0, 0, 1];
        assert_eq!(decode_value(&Type::INET, Some(&host)).unwrap(), Value::from("10.0.0.1"));
        let net = [2u8, 8, 1, 4, 10, 0, 0, 0];
        assert_eq!(decode_value(&Type::CIDR, Some(&net)).unwrap(), Value::from("10.0.0.0/8"));
        let masked_host = [2u8, 24, 0, 4, 192, 168, 1, 7];
        assert_eq!(
            decode_value(&Type::INET, Some(&masked_host)).unwrap(),
            Value::from("192.168.1.7/24")
        );
        let single = [2u8, 32, 1, 4, 10, 0, 0, 1];
        assert_eq!(decode_value(&Type::CIDR, Some(&single)).unwrap(), Value::from("10.0.0.1/32"));
    }

    #[test]
    fn ipv6_addresses() {
        let mut loopback = vec![3u8, 128, 0, 16];
        loopback.extend_from_slice(&[0; 15]);
        loopback.push(1);
        assert_eq!(decode_value(&Type::INET, Some(&loopback)).unwrap(), Value::from("::1"));

        let mut net = vec![3u8, 32, 1, 16, 0x20, 0x01, 0x0d, 0xb8];
        net.extend_from_slice(&[0; 12]);
        assert_eq!(decode_value(&Type::CIDR, Some(&net)).unwrap(), Value::from("2001:db8::/32"));
    }

    #[test]
    fn malformed_inet_is_an_error() {
        assert!(decode_value(&Type::INET, Some(&[2u8, 32, 0, 4, 10])).is_err());
        assert!(decode_value(&Type::INET, Some(&[2u8, 32, 0, 5, 10, 0, 0, 1, 1])).is_err());
    }

    #[test]
    fn one_dimensional_arrays_are_json_text() {
        let ints = vec![Some(1i32), None, Some(3)];
        assert_eq!(decode(ints, Type::INT4_ARRAY), Value::from("[1,null,3]"));
        assert_eq!(decode(vec!["a", "b"], Type::TEXT_ARRAY), Value::from(r#"["a","b"]"#));
        assert_eq!(decode(vec![true], Type::BOOL_ARRAY), Value::from("[true]"));
    }

    #[test]
    fn enums_render_as_label() {
        let mood = Type::new(
            "mood".to_string(),
            90_001,
            Kind::Enum(vec!["happy".to_string(), "sad".to_string()]),
            "public".to_string(),
        );
        assert_eq!(decode_value(&mood, Some(b"happy")).unwrap(), Value::from("happy"));
    }

    #[test]
    fn unknown_types_fall_back_to_hex() {
        let point = [0u8, 1, 2];
        assert_eq!(decode_value(&Type::POINT, Some(&point)).unwrap(), Value::from("\\x000102"));
    }

    #[test]
    fn repeated_column_keeps_last_value() {
        let mut row = ResultRow::new();
        row.insert("id".to_string(), Value::from(1));
        row.insert("name".to_string(), Value::from("a"));
        row.insert("id".to_string(), Value::from(2));
        let keys: Vec<_> = row.keys().cloned().collect();
        assert_eq!(keys, ["id", "name"]);
        assert_eq!(row["id"], Value::from(2));
    }
}
