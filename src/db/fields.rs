//! Serialization of `named_exec` arguments.
//!
//! Arguments are serialized into a [`Field`] tree rather than JSON so that
//! byte buffers stay byte buffers and integers keep their exact value.
//! `Vec<u8>` serializes element by element; a non-empty sequence made only of
//! `u8` elements is bound as a blob.

use crate::error::{DbError, DbResult};
use crate::models::QueryParam;
use serde::ser::{self, Serialize};
use serde_json::{Map as JsonMap, Number, Value as JsonValue};
use std::fmt;
use thiserror::Error;

/// A serialized argument.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Field {
    Value(QueryParam),
    Byte(u8),
    Seq(Vec<Field>),
    Map(Vec<(String, Field)>),
}

impl Field {
    /// Resolve a dotted path. Numeric segments index into sequences.
    pub(crate) fn lookup(&self, path: &str) -> Option<&Field> {
        path.split('.').try_fold(self, |current, key| match current {
            Field::Map(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            Field::Seq(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
    }

    /// The positional parameter bound for this field.
    pub(crate) fn to_param(&self) -> QueryParam {
        match self {
            Field::Value(param) => param.clone(),
            Field::Byte(b) => QueryParam::Int(i64::from(*b)),
            Field::Seq(items) if is_bytes(items) => {
                QueryParam::Bytes(items.iter().filter_map(Field::as_byte).collect())
            }
            other => QueryParam::Json(other.to_json()),
        }
    }

    fn as_byte(&self) -> Option<u8> {
        match self {
            Field::Byte(b) => Some(*b),
            _ => None,
        }
    }

    fn to_json(&self) -> JsonValue {
        match self {
            Field::Value(param) => param_to_json(param),
            Field::Byte(b) => JsonValue::from(*b),
            Field::Seq(items) => JsonValue::Array(items.iter().map(Field::to_json).collect()),
            Field::Map(entries) => JsonValue::Object(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect::<JsonMap<_, _>>(),
            ),
        }
    }
}

fn is_bytes(items: &[Field]) -> bool {
    !items.is_empty() && items.iter().all(|f| matches!(f, Field::Byte(_)))
}

fn param_to_json(param: &QueryParam) -> JsonValue {
    match param {
        QueryParam::Null => JsonValue::Null,
        QueryParam::Bool(b) => JsonValue::Bool(*b),
        QueryParam::Int(i) => JsonValue::from(*i),
        QueryParam::Float(f) => Number::from_f64(*f).map_or(JsonValue::Null, JsonValue::Number),
        QueryParam::String(s) => JsonValue::String(s.clone()),
        QueryParam::Bytes(bytes) => JsonValue::Array(bytes.iter().map(|b| (*b).into()).collect()),
        QueryParam::Json(v) => v.clone(),
    }
}

/// Serialize `arg` into a field tree.
pub(crate) fn to_field<A: Serialize + ?Sized>(arg: &A) -> DbResult<Field> {
    arg.serialize(FieldSerializer)
        .map_err(|e| DbError::invalid_input(format!("Failed to serialize argument: {}", e)))
}

#[derive(Debug, Error)]
#[error("{0}")]
pub(crate) struct FieldError(String);

impl ser::Error for FieldError {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        FieldError(msg.to_string())
    }
}

fn out_of_range(value: impl fmt::Display) -> FieldError {
    FieldError(format!("integer {} does not fit a 64-bit signed column", value))
}

fn value(param: QueryParam) -> Result<Field, FieldError> {
    Ok(Field::Value(param))
}

struct FieldSerializer;

impl ser::Serializer for FieldSerializer {
    type Ok = Field;
    type Error = FieldError;
    type SerializeSeq = SeqBuilder;
    type SerializeTuple = SeqBuilder;
    type SerializeTupleStruct = SeqBuilder;
    type SerializeTupleVariant = VariantBuilder<SeqBuilder>;
    type SerializeMap = MapBuilder;
    type SerializeStruct = MapBuilder;
    type SerializeStructVariant = VariantBuilder<MapBuilder>;

    fn serialize_bool(self, v: bool) -> Result<Field, FieldError> {
        value(QueryParam::Bool(v))
    }

    fn serialize_i8(self, v: i8) -> Result<Field, FieldError> {
        value(QueryParam::Int(i64::from(v)))
    }

    fn serialize_i16(self, v: i16) -> Result<Field, FieldError> {
        value(QueryParam::Int(i64::from(v)))
    }

    fn serialize_i32(self, v: i32) -> Result<Field, FieldError> {
        value(QueryParam::Int(i64::from(v)))
    }

    fn serialize_i64(self, v: i64) -> Result<Field, FieldError> {
        value(QueryParam::Int(v))
    }

    fn serialize_i128(self, v: i128) -> Result<Field, FieldError> {
        let v = i64::try_from(v).map_err(|_| out_of_range(v))?;
        value(QueryParam::Int(v))
    }

    fn serialize_u8(self, v: u8) -> Result<Field, FieldError> {
        Ok(Field::Byte(v))
    }

    fn serialize_u16(self, v: u16) -> Result<Field, FieldError> {
        value(QueryParam::Int(i64::from(v)))
    }

    fn serialize_u32(self, v: u32) -> Result<Field, FieldError> {
        value(QueryParam::Int(i64::from(v)))
    }

    fn serialize_u64(self, v: u64) -> Result<Field, FieldError> {
        let v = i64::try_from(v).map_err(|_| out_of_range(v))?;
        value(QueryParam::Int(v))
    }

    fn serialize_u128(self, v: u128) -> Result<Field, FieldError> {
        let v = i64::try_from(v).map_err(|_| out_of_range(v))?;
        value(QueryParam::Int(v))
    }

    fn serialize_f32(self, v: f32) -> Result<Field, FieldError> {
        value(QueryParam::Float(f64::from(v)))
    }

    fn serialize_f64(self, v: f64) -> Result<Field, FieldError> {
        value(QueryParam::Float(v))
    }

    fn serialize_char(self, v: char) -> Result<Field, FieldError> {
        value(QueryParam::String(v.to_string()))
    }

    fn serialize_str(self, v: &str) -> Result<Field, FieldError> {
        value(QueryParam::String(v.to_string()))
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<Field, FieldError> {
        value(QueryParam::Bytes(v.to_vec()))
    }

    fn serialize_none(self) -> Result<Field, FieldError> {
        value(QueryParam::Null)
    }

    fn serialize_some<T: Serialize + ?Sized>(self, v: &T) -> Result<Field, FieldError> {
        v.serialize(self)
    }

    fn serialize_unit(self) -> Result<Field, FieldError> {
        value(QueryParam::Null)
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<Field, FieldError> {
        value(QueryParam::Null)
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
    ) -> Result<Field, FieldError> {
        value(QueryParam::String(variant.to_string()))
    }

    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        v: &T,
    ) -> Result<Field, FieldError> {
        v.serialize(self)
    }

    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
        v: &T,
    ) -> Result<Field, FieldError> {
        Ok(Field::Map(vec![(variant.to_string(), v.serialize(self)?)]))
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<SeqBuilder, FieldError> {
        Ok(SeqBuilder(Vec::with_capacity(len.unwrap_or(0))))
    }

    fn serialize_tuple(self, len: usize) -> Result<SeqBuilder, FieldError> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        len: usize,
    ) -> Result<SeqBuilder, FieldError> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<VariantBuilder<SeqBuilder>, FieldError> {
        Ok(VariantBuilder {
            variant,
            inner: SeqBuilder(Vec::with_capacity(len)),
        })
    }

    fn serialize_map(self, len: Option<usize>) -> Result<MapBuilder, FieldError> {
        Ok(MapBuilder {
            entries: Vec::with_capacity(len.unwrap_or(0)),
            key: None,
        })
    }

    fn serialize_struct(self, _name: &'static str, len: usize) -> Result<MapBuilder, FieldError> {
        self.serialize_map(Some(len))
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<VariantBuilder<MapBuilder>, FieldError> {
        Ok(VariantBuilder {
            variant,
            inner: self.serialize_map(Some(len))?,
        })
    }
}

struct SeqBuilder(Vec<Field>);

impl SeqBuilder {
    fn push<T: Serialize + ?Sized>(&mut self, v: &T) -> Result<(), FieldError> {
        self.0.push(v.serialize(FieldSerializer)?);
        Ok(())
    }
}

impl ser::SerializeSeq for SeqBuilder {
    type Ok = Field;
    type Error = FieldError;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, v: &T) -> Result<(), FieldError> {
        self.push(v)
    }

    fn end(self) -> Result<Field, FieldError> {
        Ok(Field::Seq(self.0))
    }
}

impl ser::SerializeTuple for SeqBuilder {
    type Ok = Field;
    type Error = FieldError;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, v: &T) -> Result<(), FieldError> {
        self.push(v)
    }

    fn end(self) -> Result<Field, FieldError> {
        Ok(Field::Seq(self.0))
    }
}

impl ser::SerializeTupleStruct for SeqBuilder {
    type Ok = Field;
    type Error = FieldError;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, v: &T) -> Result<(), FieldError> {
        self.push(v)
    }

    fn end(self) -> Result<Field, FieldError> {
        Ok(Field::Seq(self.0))
    }
}

struct MapBuilder {
    entries: Vec<(String, Field)>,
    key: Option<String>,
}

/// Map keys become path segments, so only scalar keys are accepted.
fn key_to_string(key: Field) -> Result<String, FieldError> {
    match key {
        Field::Value(QueryParam::String(s)) => Ok(s),
        Field::Value(QueryParam::Int(i)) => Ok(i.to_string()),
        Field::Value(QueryParam::Bool(b)) => Ok(b.to_string()),
        Field::Byte(b) => Ok(b.to_string()),
        _ => Err(FieldError("map keys must be strings or integers".to_string())),
    }
}

impl ser::SerializeMap for MapBuilder {
    type Ok = Field;
    type Error = FieldError;

    fn serialize_key<T: Serialize + ?Sized>(&mut self, key: &T) -> Result<(), FieldError> {
        self.key = Some(key_to_string(key.serialize(FieldSerializer)?)?);
        Ok(())
    }

    fn serialize_value<T: Serialize + ?Sized>(&mut self, v: &T) -> Result<(), FieldError> {
        let key = self
            .key
            .take()
            .ok_or_else(|| FieldError("map value without a key".to_string()))?;
        self.entries.push((key, v.serialize(FieldSerializer)?));
        Ok(())
    }

    fn end(self) -> Result<Field, FieldError> {
        Ok(Field::Map(self.entries))
    }
}

impl ser::SerializeStruct for MapBuilder {
    type Ok = Field;
    type Error = FieldError;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        key: &'static str,
        v: &T,
    ) -> Result<(), FieldError> {
        self.entries
            .push((key.to_string(), v.serialize(FieldSerializer)?));
        Ok(())
    }

    fn end(self) -> Result<Field, FieldError> {
        Ok(Field::Map(self.entries))
    }
}

/// Externally tagged enum variant: `{ "Variant": inner }`.
struct VariantBuilder<B> {
    variant: &'static str,
    inner: B,
}

impl ser::SerializeTupleVariant for VariantBuilder<SeqBuilder> {
    type Ok = Field;
    type Error = FieldError;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, v: &T) -> Result<(), FieldError> {
        self.inner.push(v)
    }

    fn end(self) -> Result<Field, FieldError> {
        Ok(Field::Map(vec![(
            self.variant.to_string(),
            Field::Seq(self.inner.0),
        )]))
    }
}

impl ser::SerializeStructVariant for VariantBuilder<MapBuilder> {
    type Ok = Field;
    type Error = FieldError;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        key: &'static str,
        v: &T,
    ) -> Result<(), FieldError> {
        ser::SerializeStruct::serialize_field(&mut self.inner, key, v)
    }

    fn end(self) -> Result<Field, FieldError> {
        Ok(Field::Map(vec![(
            self.variant.to_string(),
            Field::Map(self.inner.entries),
        )]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;
    use serde_json::json;
    use std::collections::BTreeMap;

    #[derive(Serialize)]
    struct Upload {
        name: &'static str,
        data: Vec<u8>,
        size: u64,
        tags: Vec<&'static str>,
    }

    #[test]
    fn test_struct_fields() {
        let field = to_field(&Upload {
            name: "a.bin",
            data: vec![1, 2, 3],
            size: 3,
            tags: vec!["x", "y"],
        })
        .unwrap();

        assert_eq!(
            field.lookup("name").unwrap().to_param(),
            QueryParam::String("a.bin".into())
        );
        assert_eq!(
            field.lookup("data").unwrap().to_param(),
            QueryParam::Bytes(vec![1, 2, 3])
        );
        assert_eq!(field.lookup("size").unwrap().to_param(), QueryParam::Int(3));
        assert_eq!(
            field.lookup("tags").unwrap().to_param(),
            QueryParam::Json(json!(["x", "y"]))
        );
        assert_eq!(
            field.lookup("tags.1").unwrap().to_param(),
            QueryParam::String("y".into())
        );
        assert!(field.lookup("missing").is_none());
    }

    #[test]
    fn test_u64_out_of_range_is_rejected() {
        let ok = to_field(&json!({"n": i64::MAX as u64})).unwrap();
        assert_eq!(ok.lookup("n").unwrap().to_param(), QueryParam::Int(i64::MAX));

        #[derive(Serialize)]
        struct Big {
            n: u64,
        }
        let err = to_field(&Big {
            n: 9_223_372_036_854_775_809,
        })
        .unwrap_err();
        assert!(matches!(err, DbError::InvalidInput { .. }));
        assert!(err.to_string().contains("9223372036854775809"));
    }

    #[test]
    fn test_single_bytes_and_empty_sequences() {
        assert_eq!(to_field(&7u8).unwrap().to_param(), QueryParam::Int(7));
        assert_eq!(
            to_field(&Vec::<u8>::new()).unwrap().to_param(),
            QueryParam::Json(json!([]))
        );
        // Mixed sequences are not byte buffers.
        assert_eq!(
            to_field(&(1u8, 300u16)).unwrap().to_param(),
            QueryParam::Json(json!([1, 300]))
        );
    }

    #[test]
    fn test_options_enums_and_maps() {
        #[derive(Serialize)]
        enum Status {
            Active,
            Suspended { days: u32 },
        }

        assert_eq!(to_field(&None::<i32>).unwrap().to_param(), QueryParam::Null);
        assert_eq!(
            to_field(&Status::Active).unwrap().to_param(),
            QueryParam::String("Active".into())
        );
        assert_eq!(
            to_field(&Status::Suspended { days: 3 }).unwrap().to_param(),
            QueryParam::Json(json!({"Suspended": {"days": 3}}))
        );

        let mut map = BTreeMap::new();
        map.insert(1, "one");
        let field = to_field(&map).unwrap();
        assert_eq!(
            field.lookup("1").unwrap().to_param(),
            QueryParam::String("one".into())
        );
    }
}
