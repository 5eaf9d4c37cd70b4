//! Deserialize data-tree values into user-defined record types via serde.

use std::fmt;

use serde::de::{
    self, DeserializeOwned, Deserializer, IntoDeserializer, MapAccess, SeqAccess, Visitor,
};

use crate::types::value::{Struct, Value, ValueKind};

/// Deserialize a [`Value`] into any [`DeserializeOwned`] type: structs map
/// to maps or derived records, lists to sequences, scalars directly.
///
/// # Errors
///
/// Returns [`DeserializeError`] when the tree does not fit the target type.
pub fn from_value<T: DeserializeOwned>(value: &Value) -> Result<T, DeserializeError> {
    T::deserialize(ValueDeserializer { value })
}

/// The error type for [`from_value`].
#[derive(Debug)]
pub struct DeserializeError {
    message: String,
}

impl fmt::Display for DeserializeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for DeserializeError {}

impl de::Error for DeserializeError {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        DeserializeError {
            message: msg.to_string(),
        }
    }
}

struct ValueDeserializer<'a> {
    value: &'a Value,
}

impl<'de> Deserializer<'de> for ValueDeserializer<'_> {
    type Error = DeserializeError;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        match self.value.kind() {
            ValueKind::Null => visitor.visit_unit(),
            ValueKind::Bool(b) => visitor.visit_bool(*b),
            ValueKind::Int(i) => match i64::try_from(*i) {
                Ok(narrow) => visitor.visit_i64(narrow),
                Err(_) => visitor.visit_i128(*i),
            },
            ValueKind::Decimal(d) => {
                use rust_decimal::prelude::ToPrimitive;
                match d.to_f64() {
                    Some(f) => visitor.visit_f64(f),
                    None => Err(de::Error::custom(format!(
                        "decimal {d} is not representable as f64"
                    ))),
                }
            }
            ValueKind::Float(f) => visitor.visit_f64(*f),
            ValueKind::String(s) | ValueKind::Symbol(s) => visitor.visit_str(s),
            ValueKind::Timestamp(t) => visitor.visit_string(t.to_rfc3339()),
            ValueKind::Blob(bytes) => visitor.visit_bytes(bytes),
            ValueKind::List(elements) => visitor.visit_seq(ListAccess {
                elements: elements.iter(),
            }),
            ValueKind::Struct(s) => visitor.visit_map(StructAccess::new(s)),
        }
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        if self.value.is_null() {
            visitor.visit_none()
        } else {
            visitor.visit_some(self)
        }
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        visitor.visit_newtype_struct(self)
    }

    serde::forward_to_deserialize_any! {
        bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char str string
        bytes byte_buf unit unit_struct seq tuple tuple_struct map struct
        enum identifier ignored_any
    }
}

struct ListAccess<'a> {
    elements: std::slice::Iter<'a, Value>,
}

impl<'de> SeqAccess<'de> for ListAccess<'_> {
    type Error = DeserializeError;

    fn next_element_seed<T>(&mut self, seed: T) -> Result<Option<T::Value>, Self::Error>
    where
        T: de::DeserializeSeed<'de>,
    {
        match self.elements.next() {
            Some(value) => seed.deserialize(ValueDeserializer { value }).map(Some),
            None => Ok(None),
        }
    }
}

struct StructAccess<'a> {
    fields: Vec<(&'a str, &'a Value)>,
    index: usize,
}

impl<'a> StructAccess<'a> {
    fn new(s: &'a Struct) -> Self {
        StructAccess {
            fields: s.iter().collect(),
            index: 0,
        }
    }
}

impl<'de> MapAccess<'de> for StructAccess<'_> {
    type Error = DeserializeError;

    fn next_key_seed<K>(&mut self, seed: K) -> Result<Option<K::Value>, Self::Error>
    where
        K: de::DeserializeSeed<'de>,
    {
        match self.fields.get(self.index) {
            Some((name, _)) => seed.deserialize((*name).into_deserializer()).map(Some),
            None => Ok(None),
        }
    }

    fn next_value_seed<V>(&mut self, seed: V) -> Result<V::Value, Self::Error>
    where
        V: de::DeserializeSeed<'de>,
    {
        let (_, value) = self.fields[self.index];
        self.index += 1;
        seed.deserialize(ValueDeserializer { value })
    }
}
