mod compile;
mod de;
mod evaluate;
mod parse;
mod query;
mod sort;
mod types;

pub use de::{DeserializeError, from_value};
pub use parse::{ParseError, parse_document};
pub use query::{FromValue, NamespacedConfig, NamespacedConfigBuilder, Query};
pub use types::{
    ConfigEngine, ConfigError, ConfigRecord, CriteriaPredicate, PredicateMap, Struct, Value,
    ValueKind, default_engine,
};
