use std::time::Duration;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::Status;
use thiserror::Error;

use crate::discover::Operation;

/// Boxed error produced by a [`Transport`](crate::transport::Transport).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors surfaced by discovery, the registry and the request builder.
#[derive(Debug, Error)]
pub enum Error {
    /// The transport failed before a response was produced.
    #[error("transport request failed")]
    Transport(#[source] BoxError),

    /// A JSON body was announced but could not be decoded.
    #[error("failed to decode response body")]
    Decode(#[source] serde_json::Error),

    #[error("failed to encode request body")]
    Encode(#[source] serde_json::Error),

    /// The server answered with a failure `Status` envelope.
    #[error("api request failed: {}", status_summary(.0))]
    Api(Box<Status>),

    #[error("{kind} does not support the {operation} operation")]
    UnsupportedOperation { kind: String, operation: Operation },

    #[error("{kind} cannot be listed across all namespaces")]
    AllNamespacesUnsupported { kind: String },

    #[error("unknown label selector operator {operator:?} for key {key:?}")]
    UnknownSelectorOperator { key: String, operator: String },

    #[error("label selector operator {operator} for key {key:?} requires values")]
    MissingSelectorValues { key: String, operator: String },

    #[error("invalid API version {0:?}")]
    InvalidVersion(String),

    #[error("failed to build request")]
    InvalidRequest(#[source] http::Error),

    /// A path or path segment that would change which route is addressed.
    #[error("invalid request path {0:?}")]
    InvalidPath(String),

    #[error("resource {0:?} is not known to the registry")]
    UnknownResource(String),

    #[error("{kind} is not served by {group}/{version}")]
    UnknownGroupVersion {
        kind: String,
        group: String,
        version: String,
    },

    /// A discovery fetch failed; the whole discovery is aborted.
    #[error("discovery of {path} failed")]
    Discovery {
        path: String,
        #[source]
        source: Box<Error>,
    },

    #[error("expected a list response, got kind {kind:?}")]
    NotAList { kind: String },

    /// The server handed back the cursor that was just sent.
    #[error("list did not advance past continue token {token:?}")]
    RepeatedContinueToken { token: String },

    #[error("invalid capability document")]
    Document(#[source] serde_json::Error),
}

impl Error {
    /// Returns the failure status when the server rejected the call.
    pub fn status(&self) -> Option<&Status> {
        match self {
            Error::Api(status) => Some(status),
            Error::Discovery { source, .. } => source.status(),
            _ => None,
        }
    }

    /// Returns true for errors raised before any network call was made.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Error::UnsupportedOperation { .. }
                | Error::AllNamespacesUnsupported { .. }
                | Error::UnknownSelectorOperator { .. }
                | Error::MissingSelectorValues { .. }
                | Error::InvalidVersion(_)
                | Error::InvalidRequest(_)
                | Error::InvalidPath(_)
                | Error::UnknownResource(_)
                | Error::UnknownGroupVersion { .. }
        )
    }

    /// Returns true when repeating the same call may succeed: transport
    /// failures, throttling, timeouts and server-side errors.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Transport(_) => true,
            Error::Api(status) => {
                matches!(status.code, Some(408 | 429 | 500..=599))
                    || matches!(
                        status.reason.as_deref(),
                        Some("ServerTimeout" | "Timeout" | "TooManyRequests")
                    )
            }
            Error::Discovery { source, .. } => source.is_transient(),
            _ => false,
        }
    }

    /// Returns true when a list cursor was rejected as too old
    /// (`410 Gone` / `Expired`) and listing has to start over.
    pub fn is_expired_cursor(&self) -> bool {
        self.status().is_some_and(|status| {
            status.code == Some(410) || status.reason.as_deref() == Some("Expired")
        })
    }

    /// Server-requested delay from `details.retryAfterSeconds`.
    pub fn retry_after(&self) -> Option<Duration> {
        let seconds = self.status()?.details.as_ref()?.retry_after_seconds?;
        u64::try_from(seconds).ok().map(Duration::from_secs)
    }
}

fn status_summary(status: &Status) -> String {
    let code = status.code.unwrap_or_default();
    let reason = status.reason.as_deref().unwrap_or("Unknown");
    match status.message.as_deref() {
        Some(message) if !message.is_empty() => format!("{reason} ({code}): {message}"),
        _ => format!("{reason} ({code})"),
    }
}

#[cfg(test)]
mod tests {
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::StatusDetails;

    use super::*;

    #[test]
    fn api_error_displays_reason_and_message() {
        let err = Error::Api(Box::new(Status {
            code: Some(404),
            reason: Some("NotFound".into()),
            message: Some("deployments.apps \"web\" not found".into()),
            status: Some("Failure".into()),
            ..Default::default()
        }));
        assert_eq!(
            err.to_string(),
            "api request failed: NotFound (404): deployments.apps \"web\" not found"
        );
        assert_eq!(err.status().and_then(|s| s.code), Some(404));
        assert!(!err.is_caller_error());
    }

    fn status(code: i32, reason: &str) -> Error {
        Error::Api(Box::new(Status {
            code: Some(code),
            reason: Some(reason.into()),
            status: Some("Failure".into()),
            ..Default::default()
        }))
    }

    #[test]
    fn transient_errors() {
        for code in [408, 429, 500, 503, 599] {
            assert!(status(code, "InternalError").is_transient(), "{code}");
        }
        for code in [400, 401, 403, 404, 409, 410, 422] {
            assert!(!status(code, "Invalid").is_transient(), "{code}");
        }
        // some proxies drop the code but keep the reason
        assert!(status(0, "ServerTimeout").is_transient());
        assert!(Error::Transport("connection reset".into()).is_transient());
        assert!(
            Error::Discovery {
                path: "/apis/apps/v1".into(),
                source: Box::new(status(502, "BadGateway")),
            }
            .is_transient()
        );
        assert!(!Error::UnknownResource("Widget".into()).is_transient());
        assert!(!Error::RepeatedContinueToken { token: "t1".into() }.is_transient());
    }

    #[test]
    fn expired_cursor_and_retry_after() {
        assert!(status(410, "Expired").is_expired_cursor());
        assert!(!status(404, "NotFound").is_expired_cursor());

        let throttled = Error::Api(Box::new(Status {
            code: Some(429),
            details: Some(StatusDetails {
                retry_after_seconds: Some(3),
                ..Default::default()
            }),
            ..Default::default()
        }));
        assert_eq!(throttled.retry_after(), Some(Duration::from_secs(3)));
        assert_eq!(status(429, "TooManyRequests").retry_after(), None);
    }

    #[test]
    fn path_errors_are_caller_errors() {
        assert!(Error::InvalidPath("web/exec".into()).is_caller_error());
    }

    #[test]
    fn discovery_error_exposes_inner_status() {
        let err = Error::Discovery {
            path: "/apis/apps/v1".into(),
            source: Box::new(Error::Api(Box::new(Status {
                code: Some(503),
                ..Default::default()
            }))),
        };
        assert_eq!(err.status().and_then(|s| s.code), Some(503));
    }
}
