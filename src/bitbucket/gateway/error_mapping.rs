//! Error mapping helpers for the HTTP gateways.

use http::StatusCode;

use crate::bitbucket::error::BitbucketError;
use crate::bitbucket::models::cloud::CloudErrorBody;
use crate::bitbucket::models::server::ServerErrorBody;

const MAX_RAW_MESSAGE_LEN: usize = 200;

/// Checks if a status indicates rejected credentials.
pub(super) const fn is_auth_failure(status: StatusCode) -> bool {
    matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN)
}

/// Checks if a status indicates a rejected request body.
pub(super) const fn is_validation_failure(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::BAD_REQUEST | StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY
    )
}

pub(super) fn map_http_error(
    operation: &str,
    status: StatusCode,
    maybe_message: Option<String>,
) -> BitbucketError {
    let message = maybe_message.unwrap_or_else(|| "unknown error".to_owned());
    if is_auth_failure(status) {
        BitbucketError::Authentication {
            message: format!("{operation} failed: Bitbucket returned {status} {message}"),
        }
    } else if is_validation_failure(status) {
        BitbucketError::Validation {
            message: format!("{operation} failed: {message}"),
        }
    } else {
        BitbucketError::Api {
            status: status.as_u16(),
            message: format!("{operation} failed: {message}"),
        }
    }
}

pub(super) fn map_reqwest_error(operation: &str, error: &reqwest::Error) -> BitbucketError {
    if error.is_decode() {
        return BitbucketError::Mapping {
            message: format!("{operation}: {error}"),
        };
    }
    BitbucketError::Network {
        message: format!("{operation} failed: {error}"),
    }
}

pub(super) fn map_decode_error(operation: &str, error: &serde_json::Error) -> BitbucketError {
    BitbucketError::Mapping {
        message: format!("{operation}: {error}"),
    }
}

/// Pulls a human readable message out of an error body in either dialect,
/// falling back to short plain-text bodies.
pub(super) fn extract_message(body: &[u8]) -> Option<String> {
    if let Ok(cloud) = serde_json::from_slice::<CloudErrorBody>(body)
        && let Some(message) = cloud.message()
    {
        return Some(message);
    }
    if let Ok(server) = serde_json::from_slice::<ServerErrorBody>(body)
        && let Some(message) = server.message()
    {
        return Some(message);
    }
    let text = String::from_utf8_lossy(body);
    let trimmed = text.trim();
    (!trimmed.is_empty() && trimmed.len() <= MAX_RAW_MESSAGE_LEN && !trimmed.starts_with('<'))
        .then(|| trimmed.to_owned())
}
