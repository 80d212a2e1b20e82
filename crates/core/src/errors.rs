use std::fmt;

use chrono::NaiveDate;
use thiserror::Error;

use crate::domain::resource::ResourceKind;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProviderErrorKind {
    Throttled,
    Transient,
    Unauthorized,
    NotFound,
    InvalidRequest,
    Other,
}

impl fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Throttled => "throttled",
            Self::Transient => "transient",
            Self::Unauthorized => "unauthorized",
            Self::NotFound => "not found",
            Self::InvalidRequest => "invalid request",
            Self::Other => "error",
        };
        f.write_str(label)
    }
}

/// A failed call against the cloud or cost API.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{service}:{operation} {kind}: {message}")]
pub struct ProviderError {
    pub service: String,
    pub operation: String,
    pub kind: ProviderErrorKind,
    pub message: String,
}

impl ProviderError {
    pub fn new(
        service: impl Into<String>,
        operation: impl Into<String>,
        kind: ProviderErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            service: service.into(),
            operation: operation.into(),
            kind,
            message: message.into(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self.kind, ProviderErrorKind::Throttled | ProviderErrorKind::Transient)
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ScanError {
    #[error("{kind} listing failed: {source}")]
    ListingFailed {
        kind: ResourceKind,
        #[source]
        source: ProviderError,
    },
}

impl ScanError {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::ListingFailed { kind, .. } => *kind,
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CostError {
    #[error("cost history starts at {earliest}; requested start {start} is outside the retention window")]
    OutOfRetention { start: NaiveDate, earliest: NaiveDate },
    #[error("invalid cost range: start {start} must be before end {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

impl CostError {
    /// True for errors raised by local validation, before any call went out.
    pub fn is_rejected_request(&self) -> bool {
        matches!(self, Self::OutOfRetention { .. } | Self::InvalidRange { .. })
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum AuditError {
    #[error("audit storage failure: {0}")]
    Storage(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Scan(#[from] ScanError),
    #[error(transparent)]
    Cost(#[from] CostError),
    #[error("generative backend failure: {0}")]
    Backend(String),
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "The request could not be processed. Check inputs and try again."
            }
            Self::ServiceUnavailable { .. } => {
                "The service is temporarily unavailable. Please retry shortly."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        let correlation_id = "unassigned".to_owned();
        match value {
            ApplicationError::Cost(error) if error.is_rejected_request() => {
                Self::BadRequest { message: error.to_string(), correlation_id }
            }
            ApplicationError::Cost(error) => {
                Self::ServiceUnavailable { message: error.to_string(), correlation_id }
            }
            ApplicationError::Scan(error) => {
                Self::ServiceUnavailable { message: error.to_string(), correlation_id }
            }
            ApplicationError::Backend(message) | ApplicationError::Persistence(message) => {
                Self::ServiceUnavailable { message, correlation_id }
            }
            ApplicationError::Configuration(message) => Self::Internal { message, correlation_id },
        }
    }
}
