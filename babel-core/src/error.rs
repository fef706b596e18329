//! Error types for Babel cache operations

use thiserror::Error;

/// Reasons a canonical translation key fails structural validation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum KeyRejection {
    #[error("Resource must be a type name, got a {kind} part")]
    InvalidResourceType { kind: &'static str },

    #[error("Resource name is {len} bytes, limit is {max}")]
    ResourceNameTooLong { len: usize, max: usize },

    #[error("Resource name is not a recognized type name")]
    InvalidResourceName,

    #[error("Resource is not registered with this cache")]
    UnregisteredResource,

    #[error("Field name is {len} bytes, limit is {max}")]
    FieldNameTooLong { len: usize, max: usize },

    #[error("Field name must be a text part")]
    InvalidFieldName,

    #[error("Locale is {len} bytes, limit is {max}")]
    LocaleTooLong { len: usize, max: usize },

    #[error("Locale does not match the <lang> or <lang>_<REGION> format")]
    InvalidLocaleFormat,

    #[error("Record id renders to {len} bytes, limit is {max}")]
    RecordIdTooLong { len: usize, max: usize },

    #[error("Record id must be text or an integer, got a {kind} part")]
    InvalidRecordId { kind: &'static str },
}

impl KeyRejection {
    /// Stable machine-readable code for audit events and metrics labels.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidResourceType { .. } => "invalid_resource_type",
            Self::ResourceNameTooLong { .. } => "resource_name_too_long",
            Self::InvalidResourceName => "invalid_resource_name",
            Self::UnregisteredResource => "unregistered_resource",
            Self::FieldNameTooLong { .. } => "field_name_too_long",
            Self::InvalidFieldName => "invalid_field_name",
            Self::LocaleTooLong { .. } => "locale_too_long",
            Self::InvalidLocaleFormat => "invalid_locale_format",
            Self::RecordIdTooLong { .. } => "record_id_too_long",
            Self::InvalidRecordId { .. } => "invalid_record_id",
        }
    }
}

/// Payload signing and verification errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("Signing failed: {reason}")]
    SigningFailed { reason: String },

    #[error("Integrity tag does not match payload")]
    SignatureInvalid,

    #[error("Verification failed: {reason}")]
    VerificationFailed { reason: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Cache operation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("Invalid cache key ({code}): {0}", code = .0.code())]
    KeyInvalid(#[from] KeyRejection),

    #[error(transparent)]
    Signature(#[from] SignatureError),

    #[error("Invalid pattern: {reason}")]
    InvalidPattern { reason: String },

    #[error("No async runtime available to host the cache owner")]
    RuntimeUnavailable,
}

/// Master error type for all Babel errors.
#[derive(Debug, Clone, Error)]
pub enum BabelError {
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl From<KeyRejection> for BabelError {
    fn from(err: KeyRejection) -> Self {
        Self::Cache(CacheError::KeyInvalid(err))
    }
}

impl From<SignatureError> for BabelError {
    fn from(err: SignatureError) -> Self {
        Self::Cache(CacheError::Signature(err))
    }
}

/// Result type alias for Babel operations.
pub type BabelResult<T> = Result<T, BabelError>;

// =============================================================================
// TESTS
// =============================================================================
