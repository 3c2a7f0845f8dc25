use std::fmt::{Display, Formatter};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MessagingErrorCode {
    Unsupported,
    RegistrationFailed,
    RegistrationTimeout,
    TokenFetchFailed,
    ProfileWriteFailed,
    InvalidPayload,
    Internal,
}

impl MessagingErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessagingErrorCode::Unsupported => "push/unsupported-platform",
            MessagingErrorCode::RegistrationFailed => "push/registration-failed",
            MessagingErrorCode::RegistrationTimeout => "push/registration-timeout",
            MessagingErrorCode::TokenFetchFailed => "push/token-fetch-failed",
            MessagingErrorCode::ProfileWriteFailed => "push/profile-write-failed",
            MessagingErrorCode::InvalidPayload => "push/invalid-payload",
            MessagingErrorCode::Internal => "push/internal",
        }
    }
}

#[derive(Clone, Debug)]
pub struct MessagingError {
    pub code: MessagingErrorCode,
    message: String,
}

impl MessagingError {
    pub fn new(code: MessagingErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn code_str(&self) -> &'static str {
        self.code.as_str()
    }
}

impl Display for MessagingError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code_str())
    }
}

impl std::error::Error for MessagingError {}

pub type MessagingResult<T> = Result<T, MessagingError>;

pub fn unsupported_platform(message: impl Into<String>) -> MessagingError {
    MessagingError::new(MessagingErrorCode::Unsupported, message)
}

pub fn registration_failed(message: impl Into<String>) -> MessagingError {
    MessagingError::new(MessagingErrorCode::RegistrationFailed, message)
}

pub fn registration_timeout(message: impl Into<String>) -> MessagingError {
    MessagingError::new(MessagingErrorCode::RegistrationTimeout, message)
}

pub fn token_fetch_failed(message: impl Into<String>) -> MessagingError {
    MessagingError::new(MessagingErrorCode::TokenFetchFailed, message)
}

pub fn profile_write_failed(message: impl Into<String>) -> MessagingError {
    MessagingError::new(MessagingErrorCode::ProfileWriteFailed, message)
}

pub fn invalid_payload(message: impl Into<String>) -> MessagingError {
    MessagingError::new(MessagingErrorCode::InvalidPayload, message)
}

pub fn internal_error(message: impl Into<String>) -> MessagingError {
    MessagingError::new(MessagingErrorCode::Internal, message)
}
