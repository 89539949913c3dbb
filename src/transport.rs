//! The outbound HTTP seam.
//!
//! Everything in this crate talks to the API server through [`Transport`].
//! TLS, authentication, connection pooling and gzip decoding are the
//! transport's business; [`kube::Client`] provides all of them.

use std::future::Future;

use http::{
    HeaderValue, Method, Request, Response, StatusCode,
    header::{ACCEPT, ACCEPT_ENCODING, CONTENT_TYPE},
};
use http_body_util::BodyExt;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Status;
use kube::client::Body;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{Error, Result};

pub const JSON: &str = "application/json";
pub const STRATEGIC_MERGE_PATCH: &str = "application/strategic-merge-patch+json";

/// Sends fully built requests and returns fully buffered responses.
pub trait Transport: Clone + Send + Sync + 'static {
    type Error: std::error::Error + Send + Sync + 'static;

    fn call(
        &self,
        request: Request<Vec<u8>>,
    ) -> impl Future<Output = Result<Response<Vec<u8>>, Self::Error>> + Send;
}

impl Transport for kube::Client {
    type Error = kube::Error;

    async fn call(&self, request: Request<Vec<u8>>) -> Result<Response<Vec<u8>>, kube::Error> {
        let response = kube::Client::send(self, request.map(Body::from)).await?;
        let (parts, body) = response.into_parts();
        let bytes = body
            .collect()
            .await
            .map_err(|err| kube::Error::Service(err.into()))?
            .to_bytes();
        Ok(Response::from_parts(parts, bytes.to_vec()))
    }
}

/// Start a request carrying the default `accept` headers.
pub(crate) fn request(method: Method, uri: &str) -> http::request::Builder {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(ACCEPT, HeaderValue::from_static(JSON))
        .header(ACCEPT_ENCODING, HeaderValue::from_static("gzip"))
}

/// Send `request` and decode the response body.
#[tracing::instrument(level = "debug", skip_all, fields(method = %request.method(), uri = %request.uri()))]
pub(crate) async fn send<T: Transport>(transport: &T, request: Request<Vec<u8>>) -> Result<Value> {
    let response = transport
        .call(request)
        .await
        .map_err(|err| Error::Transport(Box::new(err)))?;
    tracing::debug!(status = %response.status(), "received response");
    read_response(response)
}

/// `GET` a path and decode the body into `R`.
pub(crate) async fn get_json<T, R>(transport: &T, path: &str) -> Result<R>
where
    T: Transport,
    R: DeserializeOwned,
{
    let request = request(Method::GET, path)
        .body(Vec::new())
        .map_err(Error::InvalidRequest)?;
    let body = send(transport, request).await?;
    serde_json::from_value(body).map_err(Error::Decode)
}

fn is_json(response: &Response<Vec<u8>>) -> bool {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .is_some_and(|essence| essence.trim().eq_ignore_ascii_case(JSON))
}

fn is_failure_status(body: &Value) -> bool {
    body.get("kind").and_then(Value::as_str) == Some("Status")
        && body.get("status").and_then(Value::as_str) == Some("Failure")
}

/// Decode a buffered response.
///
/// JSON bodies are parsed; a `Status` with `status: Failure` becomes
/// [`Error::Api`] even when the HTTP exchange itself succeeded. Other bodies
/// are returned as a JSON string.
pub(crate) fn read_response(response: Response<Vec<u8>>) -> Result<Value> {
    let status = response.status();
    let json = is_json(&response);
    let body = response.into_body();

    let value = if json {
        if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice::<Value>(&body).map_err(Error::Decode)?
        }
    } else {
        Value::String(String::from_utf8_lossy(&body).into_owned())
    };

    if is_failure_status(&value) {
        let status = serde_json::from_value::<Status>(value).map_err(Error::Decode)?;
        return Err(Error::Api(Box::new(status)));
    }

    if !status.is_success() {
        return Err(Error::Api(Box::new(synthesized_status(status, &value))));
    }

    Ok(value)
}

fn synthesized_status(code: StatusCode, body: &Value) -> Status {
    let message = match body {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    };
    Status {
        code: Some(i32::from(code.as_u16())),
        message: Some(message),
        reason: code.canonical_reason().map(str::to_string),
        status: Some("Failure".to_string()),
        ..Default::default()
    }
}
