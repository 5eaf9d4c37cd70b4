use super::value::Value;

/// A named input value in the raw cascading-config format.
///
/// The name is an opaque handle used only in error messages; typical names
/// are file names or database keys.
#[derive(Debug, Clone)]
pub struct ConfigRecord {
    pub name: String,
    pub value: Value,
}

impl ConfigRecord {
    pub fn new(name: impl Into<String>, value: Value) -> Self {
        ConfigRecord {
            name: name.into(),
            value,
        }
    }
}
