//! Error types for descriptor building, expression compilation and
//! statement assembly.

/// Errors raised by the pure mapping, compiling and planning layers.
///
/// All of these are detected before any statement reaches a database and
/// none of them are worth retrying.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// An expression references a member with no mapped column.
    #[error(
        "Property '{property}' not found on '{entity}'; known columns: {}",
        .known.join(", ")
    )]
    PropertyNotFound {
        /// The unresolved property name.
        property: String,
        /// The entity the expression was compiled against.
        entity: String,
        /// Every column the entity maps.
        known: Vec<String>,
    },

    /// An expression uses a function or member outside the recognized set.
    #[error("Unsupported construct: {0}")]
    UnsupportedConstruct(String),

    /// A command was requested that the entity shape cannot support.
    #[error("Cannot build {operation} for '{entity}': {reason}")]
    StructuralMisuse {
        /// The command being built (insert, update, ...).
        operation: &'static str,
        /// The entity name.
        entity: String,
        /// What is missing.
        reason: String,
    },

    /// The declarative mapping is inconsistent.
    #[error("Invalid model '{entity}': {reason}")]
    InvalidModel {
        /// The entity name.
        entity: String,
        /// What is inconsistent.
        reason: String,
    },

    /// Call-time arguments do not match the prepared operation's slots.
    #[error("Argument mismatch: {0}")]
    ArgumentMismatch(String),

    /// Introspection produced a descriptor kind this crate does not know.
    #[error("Unknown schema descriptor kind '{0}'")]
    UnknownSchemaKind(String),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, Error>;
