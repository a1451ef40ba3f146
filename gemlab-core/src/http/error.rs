//! HTTP error mapping utilities

use crate::providers::error::ProviderError;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::StatusCode;
use serde_json::Value;
use std::time::Duration;
use uuid::Uuid;

/// Map HTTP status code, headers and response body to a ProviderError
pub fn map_http_error(
    status: StatusCode,
    headers: Option<&HeaderMap>,
    body: Option<String>,
    request_id: Uuid,
) -> ProviderError {
    let error_details = body
        .as_ref()
        .and_then(|b| serde_json::from_str::<Value>(b).ok())
        .and_then(|v| extract_error_details(&v));

    let error_message = error_details
        .as_ref()
        .map(|d| d.message.clone())
        .or_else(|| body.clone().filter(|b| !b.trim().is_empty()))
        .unwrap_or_else(|| format!("HTTP error {}", status.as_u16()));

    let message_with_id = format!("{} [request_id: {}]", error_message, request_id);

    let google_status = error_details
        .as_ref()
        .and_then(|d| d.status.as_deref())
        .unwrap_or("");

    // Invalid keys come back as 400 INVALID_ARGUMENT
    if google_status == "UNAUTHENTICATED"
        || google_status == "PERMISSION_DENIED"
        || error_message.contains("API key not valid")
    {
        return ProviderError::Authentication {
            message: message_with_id,
        };
    }

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ProviderError::Authentication {
            message: message_with_id,
        },

        StatusCode::TOO_MANY_REQUESTS => {
            let retry_after = headers
                .and_then(|h| h.get(RETRY_AFTER))
                .and_then(|v| v.to_str().ok())
                .and_then(parse_retry_after)
                .or_else(|| error_details.as_ref().and_then(|d| d.retry_delay));

            ProviderError::RateLimit { retry_after }
        }

        StatusCode::BAD_REQUEST => ProviderError::InvalidRequest {
            message: message_with_id,
        },

        StatusCode::NOT_FOUND => ProviderError::ModelNotAvailable {
            model: extract_model_from_error(&error_message).unwrap_or_else(|| "unknown".to_string()),
        },

        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => ProviderError::Timeout,

        status if status.is_server_error() => ProviderError::ServerError {
            status_code: status.as_u16(),
            message: message_with_id,
        },

        status if status.is_client_error() => ProviderError::InvalidRequest {
            message: message_with_id,
        },

        _ => ProviderError::Custom {
            code: format!("HTTP_{}", status.as_u16()),
            message: message_with_id,
        },
    }
}

/// Error details extracted from response body
struct ErrorDetails {
    message: String,
    status: Option<String>,
    retry_delay: Option<Duration>,
}

/// Extract error details from a JSON error body
fn extract_error_details(json: &Value) -> Option<ErrorDetails> {
    // Google format: { "error": { "code": 429, "message": "...", "status": "RESOURCE_EXHAUSTED",
    //                  "details": [{ "@type": "...RetryInfo", "retryDelay": "37s" }] } }
    if let Some(error) = json.get("error") {
        if let Some(message) = error.get("message").and_then(|v| v.as_str()) {
            let retry_delay = error
                .get("details")
                .and_then(|d| d.as_array())
                .and_then(|details| {
                    details
                        .iter()
                        .filter_map(|d| d.get("retryDelay").and_then(|v| v.as_str()))
                        .find_map(parse_retry_after)
                });
            return Some(ErrorDetails {
                message: message.to_string(),
                status: error
                    .get("status")
                    .and_then(|v| v.as_str())
                    .map(str::to_string),
                retry_delay,
            });
        }

        if let Some(message) = error.as_str() {
            return Some(ErrorDetails {
                message: message.to_string(),
                status: None,
                retry_delay: None,
            });
        }
    }

    // Generic format: { "message": "...", "code": "..." } (Dify and friends)
    if let Some(message) = json.get("message").and_then(|v| v.as_str()) {
        return Some(ErrorDetails {
            message: message.to_string(),
            status: json.get("code").and_then(|v| v.as_str()).map(str::to_string),
            retry_delay: None,
        });
    }

    None
}

/// Try to extract model name from error message
fn extract_model_from_error(message: &str) -> Option<String> {
    // "models/gemini-9 is not found for API version v1beta"
    if let Some(start) = message.find("models/") {
        let rest = &message[start + 7..];
        let end = rest
            .find(|c: char| c.is_whitespace() || c == ',' || c == '\'' || c == '"')
            .unwrap_or(rest.len());
        if end > 0 {
            return Some(rest[..end].to_string());
        }
    }

    if let Some(start) = message.find("model '") {
        let start = start + 7;
        if let Some(end) = message[start..].find('\'') {
            return Some(message[start..start + end].to_string());
        }
    }

    None
}

/// Parse a retry delay: plain seconds (`"30"`) or a protobuf duration (`"37s"`, `"1.5s"`)
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    let value = value.trim();
    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }

    value
        .strip_suffix('s')
        .and_then(|s| s.parse::<f64>().ok())
        .and_then(|s| Duration::try_from_secs_f64(s).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_key_is_authentication() {
        let body = r#"{"error":{"code":400,"message":"API key not valid. Please pass a valid API key.","status":"INVALID_ARGUMENT"}}"#;
        let err = map_http_error(
            StatusCode::BAD_REQUEST,
            None,
            Some(body.to_string()),
            Uuid::new_v4(),
        );
        assert!(matches!(err, ProviderError::Authentication { .. }));
    }

    #[test]
    fn test_rate_limit_reads_retry_info() {
        let body = r#"{"error":{"code":429,"message":"quota","status":"RESOURCE_EXHAUSTED","details":[{"@type":"type.googleapis.com/google.rpc.RetryInfo","retryDelay":"37s"}]}}"#;
        let err = map_http_error(
            StatusCode::TOO_MANY_REQUESTS,
            None,
            Some(body.to_string()),
            Uuid::new_v4(),
        );
        match err {
            ProviderError::RateLimit { retry_after } => {
                assert_eq!(retry_after, Some(Duration::from_secs(37)))
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_not_found_extracts_model() {
        let body = r#"{"error":{"code":404,"message":"models/gemini-9 is not found for API version v1beta","status":"NOT_FOUND"}}"#;
        let err = map_http_error(
            StatusCode::NOT_FOUND,
            None,
            Some(body.to_string()),
            Uuid::new_v4(),
        );
        match err {
            ProviderError::ModelNotAvailable { model } => assert_eq!(model, "gemini-9"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_parse_retry_after_formats() {
        assert_eq!(parse_retry_after("30"), Some(Duration::from_secs(30)));
        assert_eq!(parse_retry_after("1.5s"), Some(Duration::from_millis(1500)));
        assert_eq!(parse_retry_after("soon"), None);
        assert_eq!(parse_retry_after("-2s"), None);
        assert_eq!(parse_retry_after("NaNs"), None);
        assert_eq!(parse_retry_after("1e30s"), None);
    }

    #[test]
    fn test_oversized_retry_delay_is_dropped() {
        let body = r#"{"error":{"code":429,"message":"quota","status":"RESOURCE_EXHAUSTED","details":[{"@type":"type.googleapis.com/google.rpc.RetryInfo","retryDelay":"1e30s"}]}}"#;
        let err = map_http_error(
            StatusCode::TOO_MANY_REQUESTS,
            None,
            Some(body.to_string()),
            Uuid::new_v4(),
        );
        assert!(matches!(err, ProviderError::RateLimit { retry_after: None }));
    }
}
