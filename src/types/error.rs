use std::path::PathBuf;

use thiserror::Error;

use crate::parse::ParseError;

/// The single fault kind for every construction-time problem, plus the
/// promotion of an absent value by [`Query::get`](crate::Query::get).
///
/// Construction is all-or-nothing: the first error aborts the build.
/// Evaluation itself never fails.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A top-level record was null or not a struct.
    #[error("record {record}: expected a struct at the top level but found {found}")]
    RecordNotAStruct {
        /// The record the value came from.
        record: String,
        /// The kind that was found instead.
        found: String,
    },

    /// A top-level record carried no annotations, so it belongs to no
    /// namespace.
    #[error("record {record}: found config with no namespace annotation")]
    UnnamespacedRecord {
        /// The record the value came from.
        record: String,
    },

    /// A namespace declaration did not have the required shape.
    #[error(
        "record {record}: invalid namespace declaration, expected \
         namespace::<Name>::{{prioritizedCriteria:[/* symbols or strings */]}} but found {found}"
    )]
    NamespaceShape {
        /// The record the declaration came from.
        record: String,
        /// The offending value, rendered in text form.
        found: String,
    },

    /// The same namespace was declared twice.
    #[error("record {record}: namespace {namespace} is declared more than once")]
    DuplicateNamespace {
        /// The record carrying the second declaration.
        record: String,
        /// The namespace name.
        namespace: String,
    },

    /// Content records referenced namespaces that were never declared.
    #[error("found {} undeclared namespace(s): {}", .namespaces.len(), .namespaces.join(", "))]
    UndeclaredNamespaces {
        /// The undeclared namespace names, sorted.
        namespaces: Vec<String>,
    },

    /// A criteria-bearing field or list sub-field held something other than
    /// a non-null struct.
    #[error("record {record}: a criterion field must be a non-null struct but was a {found}")]
    CriterionNotAStruct {
        /// The record the value came from.
        record: String,
        /// The kind that was found instead.
        found: String,
    },

    /// An annotation on a criteria-bearing struct did not parse as a
    /// criterion.
    #[error(
        "record {record}: could not parse OR criterion from {input:?}, \
         expected the format '[!]name-value'"
    )]
    MalformedCriterion {
        /// The record the annotation came from.
        record: String,
        /// The annotation text.
        input: String,
    },

    /// A rule used criteria missing from its namespace's
    /// `prioritizedCriteria`.
    #[error(
        "namespace {namespace} uses criteria missing from its prioritizedCriteria: {}",
        .names.join(", ")
    )]
    UnknownCriteria {
        /// The namespace whose priorities were consulted.
        namespace: String,
        /// The offending criterion names, sorted.
        names: Vec<String>,
    },

    /// A list sub-field violated its shape contract.
    #[error("record {record}: invalid list sub-field: {reason}")]
    SubFieldShape {
        /// The record the sub-field came from.
        record: String,
        /// What was wrong with it.
        reason: String,
    },

    /// A config file could not be read.
    #[error("could not load config file {}", .path.display())]
    Io {
        /// The file that failed to load.
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A config file or document did not parse.
    #[error("record {record}: {source}")]
    Parse {
        /// The record (usually a file name) that failed to parse.
        record: String,
        #[source]
        source: ParseError,
    },

    /// [`Query::get`](crate::Query::get) found no convertible value.
    #[error("no {type_name} value for key {key:?} in namespace {namespace}")]
    ValueNotFound {
        /// The namespace that was queried.
        namespace: String,
        /// The requested key.
        key: String,
        /// The requested Rust type.
        type_name: &'static str,
    },

    /// [`Query::find_as`](crate::Query::find_as) could not deserialize the
    /// value into the requested type.
    #[error("could not deserialize value for key {key:?}: {message}")]
    Deserialize {
        /// The requested key.
        key: String,
        /// The underlying deserialization failure.
        message: String,
    },
}
