//! Error types for store access.
//!
//! Only field access through a [`Store`](crate::reactive::Store) and store
//! construction can fail. Notification itself never returns an error: a
//! listener that panics unwinds through the write that triggered it.

use thiserror::Error;

/// Errors produced while wrapping or accessing a store.
#[derive(Debug, Error)]
pub enum Error {
    /// The plain value did not serialize to a map of named fields.
    #[error("`{type_name}` does not serialize to a map of named fields")]
    NotAStruct { type_name: &'static str },

    /// The field is neither stored nor derived on this store.
    #[error("field `{0}` is not defined on this store")]
    UnknownField(String),

    /// The field is derived and has no storage to assign to.
    #[error("field `{0}` is derived and cannot be assigned")]
    ReadOnlyField(String),

    /// A field value could not be converted to or from the requested type.
    #[error("field `{field}` could not be converted: {source}")]
    Conversion {
        field: String,
        #[source]
        source: serde_json::Error,
    },

    /// Serializing a plain value into a store failed.
    #[error(transparent)]
    Serialize(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn conversion(field: &str, source: serde_json::Error) -> Self {
        Self::Conversion {
            field: field.to_owned(),
            source,
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;
