use std::error::Error;
use std::fmt::Debug;

use aws_sdk_ec2::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use cloudscope_core::errors::{ProviderError, ProviderErrorKind};

/// Convert an SDK failure into the provider-neutral error type.
pub(crate) fn provider_error<E, R>(
    service: &'static str,
    operation: &'static str,
    error: SdkError<E, R>,
) -> ProviderError
where
    E: ProvideErrorMetadata + Error + 'static,
    R: Debug,
{
    let kind = classify(&error);
    let message = DisplayErrorContext(&error).to_string();
    ProviderError::new(service, operation, kind, message)
}

/// Service error code of an SDK failure, when the service returned one.
pub(crate) fn error_code<E, R>(error: &SdkError<E, R>) -> Option<&str>
where
    E: ProvideErrorMetadata,
{
    error.as_service_error().and_then(|service_error| service_error.code())
}

fn classify<E, R>(error: &SdkError<E, R>) -> ProviderErrorKind
where
    E: ProvideErrorMetadata,
{
    match error {
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) | SdkError::ResponseError(_) => {
            ProviderErrorKind::Transient
        }
        SdkError::ConstructionFailure(_) => ProviderErrorKind::InvalidRequest,
        SdkError::ServiceError(_) => classify_code(error_code(error)),
        _ => ProviderErrorKind::Other,
    }
}

pub(crate) fn classify_code(code: Option<&str>) -> ProviderErrorKind {
    let Some(code) = code else {
        return ProviderErrorKind::Other;
    };
    match code {
        "Throttling" | "ThrottlingException" | "RequestLimitExceeded"
        | "TooManyRequestsException" | "SlowDown" | "LimitExceededException" => {
            ProviderErrorKind::Throttled
        }
        "AccessDenied" | "AccessDeniedException" | "UnauthorizedOperation" | "AuthFailure"
        | "InvalidClientTokenId" | "ExpiredToken" | "ExpiredTokenException"
        | "UnrecognizedClientException" | "SignatureDoesNotMatch" => {
            ProviderErrorKind::Unauthorized
        }
        "InternalError" | "InternalFailure" | "InternalServerError" | "ServiceUnavailable"
        | "ServiceUnavailableException" | "RequestTimeout" => ProviderErrorKind::Transient,
        "ValidationException" | "ValidationError" | "DataUnavailableException" => {
            ProviderErrorKind::InvalidRequest
        }
        other if other.starts_with("NoSuch") || other.contains("NotFound") => {
            ProviderErrorKind::NotFound
        }
        other if other.starts_with("Invalid") => ProviderErrorKind::InvalidRequest,
        _ => ProviderErrorKind::Other,
    }
}
