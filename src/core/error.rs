use thiserror::Error;

/// Coarse error classification.
///
/// Every [`EngineError`] variant belongs to exactly one kind; callers that
/// only care about the failure class (configuration problem vs. programming
/// bug vs. bad data) can branch on this instead of the full variant set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Engine is misconfigured (unknown type names, no matching serializer).
    Configuration,
    /// Invalid entity lifecycle transition; a programming-logic bug.
    CacheConsistency,
    /// Encoding or decoding a value failed.
    Serialization,
    /// Misuse of a value object, distinct from missing data.
    IllegalAccess,
    /// Malformed wire envelope or payload.
    Request,
    /// The persistence session reported a failure.
    Persistence,
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Unknown value type: '{0}'")]
    UnknownValueType(String),

    #[error("No serializer can handle value: {0}")]
    NoSerializerFound(String),

    #[error("Unknown serializer: '{0}'")]
    UnknownSerializer(String),

    #[error("Cannot write serialized value for variable '{0}': no object type name provided for non-null value")]
    MissingTypeName(String),

    #[error("Cannot serialize object in variable '{variable}': {cause}")]
    SerializationFailed { variable: String, cause: String },

    #[error("Cannot deserialize object in variable '{variable}': {cause}")]
    DeserializationFailed { variable: String, cause: String },

    #[error("Entity with id '{id}' and type '{entity_type}' is inserted twice")]
    DuplicateInsert { entity_type: String, id: String },

    #[error("Cannot add {incoming} entity with id '{id}' and type '{entity_type}': entity with same id is already {existing}")]
    AlreadyMarked {
        entity_type: String,
        id: String,
        incoming: String,
        existing: String,
    },

    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    #[error("Illegal access: {0}")]
    IllegalAccess(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Persistence error: {0}")]
    PersistenceFailed(String),
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnknownValueType(_) | Self::NoSerializerFound(_) | Self::UnknownSerializer(_) => {
                ErrorKind::Configuration
            }
            Self::DuplicateInsert { .. } | Self::AlreadyMarked { .. } | Self::TypeMismatch(_) => {
                ErrorKind::CacheConsistency
            }
            Self::MissingTypeName(_)
            | Self::SerializationFailed { .. }
            | Self::DeserializationFailed { .. } => ErrorKind::Serialization,
            Self::IllegalAccess(_) => ErrorKind::IllegalAccess,
            Self::InvalidRequest(_) => ErrorKind::Request,
            Self::PersistenceFailed(_) => ErrorKind::Persistence,
        }
    }
}

pub type Result<T, E = EngineError> = std::result::Result<T, E>;
