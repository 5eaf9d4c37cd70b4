use super::rule::Rule;
use super::value::{Value, ValueKind};

/// A lazily-evaluated value node produced by the compiler.
///
/// `Basic` is a terminal data-tree value; the three dynamic shapes defer to
/// the caller's predicates at evaluation time. The set is closed: every
/// shape is matched exhaustively at materialization.
#[derive(Debug)]
pub(crate) enum Property {
    /// A terminal value, cloned into results as-is.
    Basic(Value),
    /// A struct whose fields cascade from a nested rule vector.
    DynamicStruct(Vec<Rule>),
    /// A list whose elements each contribute zero, one, or many values.
    DynamicList(Vec<Property>),
    /// A conditional list element: at most one of its rules contributes,
    /// either a single `value` or an inline-spliced `values` list.
    DynamicSubField(Vec<Rule>),
}

impl Property {
    /// True when materialization yields a list.
    pub(crate) fn is_list_based(&self) -> bool {
        match self {
            Property::Basic(value) => matches!(value.kind(), ValueKind::List(_)),
            Property::DynamicList(_) => true,
            Property::DynamicStruct(_) | Property::DynamicSubField(_) => false,
        }
    }
}
