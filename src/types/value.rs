use std::fmt;

use chrono::{DateTime, FixedOffset, SecondsFormat};
use rust_decimal::Decimal;

/// A node in the self-describing configuration data tree: an ordered list of
/// annotations plus a [`ValueKind`].
///
/// Annotations are plain text labels. The compiler gives them meaning in two
/// places (namespace markers on top-level records and OR'd criteria on structs
/// and list elements); everywhere else they are carried through untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct Value {
    annotations: Vec<String>,
    kind: ValueKind,
}

/// The concrete shape of a [`Value`].
#[derive(Debug, Clone, PartialEq)]
pub enum ValueKind {
    /// An absent value. Typed nulls from the text format all collapse here.
    Null,
    /// A boolean.
    Bool(bool),
    /// A signed integer.
    Int(i128),
    /// An exact decimal number.
    Decimal(Decimal),
    /// A binary floating-point number.
    Float(f64),
    /// A text value written as a string.
    String(String),
    /// A text value written as a symbol. Strings and symbols are equivalent
    /// wherever the engine expects text (field names, annotations, criteria).
    Symbol(String),
    /// A point in time with a UTC offset.
    Timestamp(DateTime<FixedOffset>),
    /// Raw bytes.
    Blob(Vec<u8>),
    /// An ordered sequence of values.
    List(Vec<Value>),
    /// An ordered collection of named fields. Names may repeat.
    Struct(Struct),
}

impl Value {
    /// The null value with no annotations.
    #[must_use]
    pub fn null() -> Self {
        ValueKind::Null.into()
    }

    /// A symbol value. Use the `From<&str>` impl for string values.
    #[must_use]
    pub fn symbol(text: impl Into<String>) -> Self {
        ValueKind::Symbol(text.into()).into()
    }

    /// Attach annotations, replacing any already present.
    #[must_use]
    pub fn with_annotations<I, S>(mut self, annotations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.annotations = annotations.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn annotations(&self) -> &[String] {
        &self.annotations
    }

    #[must_use]
    pub fn first_annotation(&self) -> Option<&str> {
        self.annotations.first().map(String::as_str)
    }

    #[must_use]
    pub fn kind(&self) -> &ValueKind {
        &self.kind
    }

    /// Consume the value, discarding its annotations.
    #[must_use]
    pub fn into_kind(self) -> ValueKind {
        self.kind
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self.kind, ValueKind::Null)
    }

    /// The struct shape, or `None` for every other kind (including null).
    #[must_use]
    pub fn as_struct(&self) -> Option<&Struct> {
        match &self.kind {
            ValueKind::Struct(s) => Some(s),
            _ => None,
        }
    }

    /// The list elements, or `None` for every other kind.
    #[must_use]
    pub fn as_list(&self) -> Option<&[Value]> {
        match &self.kind {
            ValueKind::List(elements) => Some(elements),
            _ => None,
        }
    }

    /// The text content of a string or symbol.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match &self.kind {
            ValueKind::String(s) | ValueKind::Symbol(s) => Some(s),
            _ => None,
        }
    }

    /// A lowercase name for the kind, used in error messages.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match &self.kind {
            ValueKind::Null => "null",
            ValueKind::Bool(_) => "bool",
            ValueKind::Int(_) => "int",
            ValueKind::Decimal(_) => "decimal",
            ValueKind::Float(_) => "float",
            ValueKind::String(_) => "string",
            ValueKind::Symbol(_) => "symbol",
            ValueKind::Timestamp(_) => "timestamp",
            ValueKind::Blob(_) => "blob",
            ValueKind::List(_) => "list",
            ValueKind::Struct(_) => "struct",
        }
    }
}

impl From<ValueKind> for Value {
    fn from(kind: ValueKind) -> Self {
        Value {
            annotations: Vec::new(),
            kind,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        ValueKind::Bool(v).into()
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        ValueKind::Int(v.into()).into()
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        ValueKind::Int(v.into()).into()
    }
}

impl From<i128> for Value {
    fn from(v: i128) -> Self {
        ValueKind::Int(v).into()
    }
}

impl From<Decimal> for Value {
    fn from(v: Decimal) -> Self {
        ValueKind::Decimal(v).into()
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        ValueKind::Float(v).into()
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        ValueKind::String(v.to_owned()).into()
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        ValueKind::String(v).into()
    }
}

impl From<DateTime<FixedOffset>> for Value {
    fn from(v: DateTime<FixedOffset>) -> Self {
        ValueKind::Timestamp(v).into()
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        ValueKind::Blob(v).into()
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        ValueKind::List(v).into()
    }
}

impl From<Struct> for Value {
    fn from(v: Struct) -> Self {
        ValueKind::Struct(v).into()
    }
}

/// An ordered collection of named fields. Field names may repeat, and two
/// structs are equal when they hold the same multiset of fields regardless
/// of order.
#[derive(Debug, Clone, Default)]
pub struct Struct {
    fields: Vec<(String, Value)>,
}

impl Struct {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a field, keeping any existing fields with the same name.
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.fields.push((name.into(), value.into()));
    }

    /// Builder-style [`push`](Self::push).
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(name, value);
        self
    }

    /// The first field with the given name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(field_name, _)| field_name == name)
            .map(|(_, value)| value)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields
            .iter()
            .map(|(name, value)| (name.as_str(), value))
    }
}

impl PartialEq for Struct {
    fn eq(&self, other: &Struct) -> bool {
        if self.fields.len() != other.fields.len() {
            return false;
        }
        self.fields.iter().all(|field| {
            let matching = |candidate: &&(String, Value)| *candidate == field;
            self.fields.iter().filter(matching).count()
                == other.fields.iter().filter(matching).count()
        })
    }
}

impl FromIterator<(String, Value)> for Struct {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Struct {
            fields: iter.into_iter().collect(),
        }
    }
}

// -- Text rendering ---------------------------------------------------------

fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

fn write_symbol(f: &mut fmt::Formatter<'_>, text: &str) -> fmt::Result {
    if is_identifier(text) {
        f.write_str(text)
    } else {
        write!(f, "'{}'", escape(text))
    }
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out
}

const BASE64_ALPHABET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

fn write_base64(f: &mut fmt::Formatter<'_>, bytes: &[u8]) -> fmt::Result {
    for chunk in bytes.chunks(3) {
        let b = [
            chunk[0],
            *chunk.get(1).unwrap_or(&0),
            *chunk.get(2).unwrap_or(&0),
        ];
        let group = (u32::from(b[0]) << 16) | (u32::from(b[1]) << 8) | u32::from(b[2]);
        let symbols = [
            BASE64_ALPHABET[(group >> 18) as usize & 0x3f],
            BASE64_ALPHABET[(group >> 12) as usize & 0x3f],
            BASE64_ALPHABET[(group >> 6) as usize & 0x3f],
            BASE64_ALPHABET[group as usize & 0x3f],
        ];
        let kept = chunk.len() + 1;
        for symbol in &symbols[..kept] {
            write!(f, "{}", *symbol as char)?;
        }
        for _ in kept..4 {
            f.write_str("=")?;
        }
    }
    Ok(())
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for annotation in &self.annotations {
            write_symbol(f, annotation)?;
            f.write_str("::")?;
        }
        match &self.kind {
            ValueKind::Null => f.write_str("null"),
            ValueKind::Bool(v) => write!(f, "{v}"),
            ValueKind::Int(v) => write!(f, "{v}"),
            ValueKind::Decimal(v) => {
                let rendered = v.to_string();
                if rendered.contains('.') {
                    f.write_str(&rendered)
                } else {
                    write!(f, "{rendered}d0")
                }
            }
            ValueKind::Float(v) => {
                if v.is_nan() {
                    f.write_str("nan")
                } else if v.is_infinite() {
                    f.write_str(if *v > 0.0 { "+inf" } else { "-inf" })
                } else {
                    write!(f, "{v:e}")
                }
            }
            ValueKind::String(v) => write!(f, "\"{}\"", escape(v)),
            ValueKind::Symbol(v) => write_symbol(f, v),
            ValueKind::Timestamp(v) => {
                f.write_str(&v.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            }
            ValueKind::Blob(bytes) => {
                f.write_str("{{")?;
                write_base64(f, bytes)?;
                f.write_str("}}")
            }
            ValueKind::List(elements) => {
                f.write_str("[")?;
                for (i, element) in elements.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{element}")?;
                }
                f.write_str("]")
            }
            ValueKind::Struct(s) => {
                f.write_str("{")?;
                for (i, (name, value)) in s.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write_symbol(f, name)?;
                    write!(f, ":{value}")?;
                }
                f.write_str("}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_scalars() {
        assert_eq!(Value::from(42_i64).kind(), &ValueKind::Int(42));
        assert_eq!(Value::from(true).kind(), &ValueKind::Bool(true));
        assert_eq!(
            Value::from("hello").kind(),
            &ValueKind::String("hello".to_owned())
        );
        assert_eq!(
            Value::symbol("hello").kind(),
            &ValueKind::Symbol("hello".to_owned())
        );
        assert!(Value::null().is_null());
    }

    #[test]
    fn string_and_symbol_are_distinct_kinds_but_both_text() {
        let string = Value::from("a");
        let symbol = Value::symbol("a");
        assert_ne!(string, symbol);
        assert_eq!(string.as_text(), Some("a"));
        assert_eq!(symbol.as_text(), Some("a"));
    }

    #[test]
    fn annotations_round_trip() {
        let value = Value::from(1_i64).with_annotations(["a", "b"]);
        assert_eq!(value.annotations(), ["a", "b"]);
        assert_eq!(value.first_annotation(), Some("a"));
        assert_eq!(Value::null().first_annotation(), None);
    }

    #[test]
    fn annotations_participate_in_equality() {
        let plain = Value::from(1_i64);
        let annotated = Value::from(1_i64).with_annotations(["a"]);
        assert_ne!(plain, annotated);
    }

    #[test]
    fn struct_equality_ignores_field_order() {
        let a = Struct::new().field("x", 1_i64).field("y", 2_i64);
        let b = Struct::new().field("y", 2_i64).field("x", 1_i64);
        assert_eq!(a, b);
    }

    #[test]
    fn struct_equality_counts_repeated_fields() {
        let twice = Struct::new().field("x", 1_i64).field("x", 1_i64);
        let once_pair = Struct::new().field("x", 1_i64).field("y", 1_i64);
        assert_ne!(twice, once_pair);

        let twice_reordered = Struct::new().field("x", 1_i64).field("x", 1_i64);
        assert_eq!(twice, twice_reordered);
    }

    #[test]
    fn struct_get_returns_first_match() {
        let s = Struct::new().field("x", 1_i64).field("x", 2_i64);
        assert_eq!(s.get("x"), Some(&Value::from(1_i64)));
        assert_eq!(s.get("missing"), None);
    }

    #[test]
    fn as_struct_rejects_null() {
        assert!(Value::null().as_struct().is_none());
        assert!(Value::from(Struct::new()).as_struct().is_some());
    }

    #[test]
    fn display_scalars() {
        assert_eq!(Value::null().to_string(), "null");
        assert_eq!(Value::from(42_i64).to_string(), "42");
        assert_eq!(Value::from("hi").to_string(), "\"hi\"");
        assert_eq!(Value::symbol("hi").to_string(), "hi");
        assert_eq!(Value::symbol("field1-true").to_string(), "'field1-true'");
        assert_eq!(Value::from(1.5_f64).to_string(), "1.5e0");
    }

    #[test]
    fn display_containers_and_annotations() {
        let value = Value::from(vec![
            Value::from(1_i64),
            Value::from(Struct::new().field("a", "b")).with_annotations(["x-y"]),
        ]);
        assert_eq!(value.to_string(), "[1,'x-y'::{a:\"b\"}]");
    }

    #[test]
    fn display_blob_base64() {
        assert_eq!(Value::from(b"Man".to_vec()).to_string(), "{{TWFu}}");
        assert_eq!(Value::from(b"Ma".to_vec()).to_string(), "{{TWE=}}");
        assert_eq!(Value::from(b"M".to_vec()).to_string(), "{{TQ==}}");
    }

    #[test]
    fn type_names() {
        assert_eq!(Value::null().type_name(), "null");
        assert_eq!(Value::from(Struct::new()).type_name(), "struct");
        assert_eq!(Value::from(Vec::<Value>::new()).type_name(), "list");
    }
}
