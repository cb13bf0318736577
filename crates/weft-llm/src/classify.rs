//! Provider error classification.
//!
//! Vendors report failures with wildly different shapes; downstream code
//! only ever sees a stable [`ProviderErrorKind`] code plus the original
//! message.

use weft_core::error::{ProviderErrorKind, WeftError};

/// Classify a provider failure from an optional HTTP status and the raw
/// message.
pub fn classify(status: Option<u16>, message: &str) -> ProviderErrorKind {
    if let Some(code) = status {
        match code {
            401 | 403 => return ProviderErrorKind::InvalidCredentials,
            429 => return ProviderErrorKind::QuotaExceeded,
            400 | 422 => return classify_message_or(message, ProviderErrorKind::MalformedRequest),
            500..=599 => return ProviderErrorKind::ServerError,
            _ => {}
        }
    }
    classify_message_or(message, ProviderErrorKind::ServerError)
}

fn classify_message_or(message: &str, fallback: ProviderErrorKind) -> ProviderErrorKind {
    let lower = message.to_lowercase();
    if lower.contains("safety") || lower.contains("content_filter") || lower.contains("blocked") {
        ProviderErrorKind::ContentFiltered
    } else if lower.contains("api key") || lower.contains("unauthorized") {
        ProviderErrorKind::InvalidCredentials
    } else if lower.contains("quota") || lower.contains("rate limit") {
        ProviderErrorKind::QuotaExceeded
    } else {
        fallback
    }
}

/// Build a [`WeftError::Provider`] with a classified kind.
pub fn provider_error(status: Option<u16>, message: impl Into<String>) -> WeftError {
    let message = message.into();
    WeftError::Provider {
        kind: classify(status, &message),
        message,
    }
}
