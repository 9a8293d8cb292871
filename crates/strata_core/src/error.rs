use thiserror::Error;

#[derive(Debug, Error)]
pub enum StrataError {
    #[error("store not initialized: {message}")]
    NotInitialized { message: String },
    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },
    #[error("value too large: {message}")]
    ValueTooLarge { message: String },
    #[error("unsupported type: {message}")]
    UnsupportedType { message: String },
    #[error("unknown type: {message}")]
    UnknownType { message: String },
    #[error("structural conflict: {message}")]
    StructuralConflict { message: String },
    #[error("confirmation required: {message}")]
    ConfirmationRequired { message: String },
    #[error("backend error: {message}")]
    Backend { message: String },
}

impl StrataError {
    pub fn not_initialized(message: impl Into<String>) -> Self {
        Self::NotInitialized {
            message: message.into(),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    pub fn too_large(message: impl Into<String>) -> Self {
        Self::ValueTooLarge {
            message: message.into(),
        }
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::UnsupportedType {
            message: message.into(),
        }
    }

    pub fn unknown_type(message: impl Into<String>) -> Self {
        Self::UnknownType {
            message: message.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::StructuralConflict {
            message: message.into(),
        }
    }

    pub fn confirmation(message: impl Into<String>) -> Self {
        Self::ConfirmationRequired {
            message: message.into(),
        }
    }

    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }
}

pub type StrataResult<T> = Result<T, StrataError>;

impl From<sea_orm::DbErr> for StrataError {
    fn from(value: sea_orm::DbErr) -> Self {
        StrataError::backend(value.to_string())
    }
}
