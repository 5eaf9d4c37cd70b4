pub(crate) mod criterion;
pub(crate) mod engine;
pub(crate) mod error;
pub(crate) mod predicate;
pub(crate) mod property;
pub(crate) mod record;
pub(crate) mod rule;
pub(crate) mod value;

pub use engine::{ConfigEngine, default_engine};
pub use error::ConfigError;
pub use predicate::{CriteriaPredicate, PredicateMap};
pub use record::ConfigRecord;
pub use value::{Struct, Value, ValueKind};
