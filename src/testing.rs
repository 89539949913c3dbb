//! In-memory transport used by the unit tests.

use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex},
};

use http::{
    Request, Response,
    header::{ACCEPT_ENCODING, CONTENT_TYPE},
};

use crate::transport::{JSON, Transport};

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub(crate) struct FakeError(String);

#[derive(Debug, Clone)]
enum Canned {
    Respond {
        status: u16,
        content_type: String,
        body: Vec<u8>,
    },
    Fail(String),
}

#[derive(Debug, Clone)]
pub(crate) struct Recorded {
    pub method: String,
    pub uri: String,
    pub content_type: Option<String>,
    pub accept_encoding: Option<String>,
    pub body: Vec<u8>,
}

impl Recorded {
    pub fn json_body(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).expect("json request body")
    }
}

#[derive(Debug, Default)]
struct State {
    routes: HashMap<String, Canned>,
    /// Served before `routes`, one entry per call.
    once: HashMap<String, VecDeque<Canned>>,
    requests: Vec<Recorded>,
}

/// Replays canned responses keyed by method and full request URI, and
/// records every request it receives.
#[derive(Debug, Clone, Default)]
pub(crate) struct FakeTransport {
    state: Arc<Mutex<State>>,
}

fn route(method: &str, uri: &str) -> String {
    format!("{method} {uri}")
}

impl FakeTransport {
    pub fn respond_json(&self, method: &str, uri: &str, status: u16, body: serde_json::Value) {
        self.respond(method, uri, status, JSON, body.to_string().into_bytes());
    }

    pub fn respond(&self, method: &str, uri: &str, status: u16, content_type: &str, body: Vec<u8>) {
        self.state.lock().unwrap().routes.insert(
            route(method, uri),
            Canned::Respond {
                status,
                content_type: content_type.to_string(),
                body,
            },
        );
    }

    pub fn fail(&self, method: &str, uri: &str, message: &str) {
        self.state
            .lock()
            .unwrap()
            .routes
            .insert(route(method, uri), Canned::Fail(message.to_string()));
    }

    /// Fail the next call to `uri` only; later calls fall through to the
    /// regular route.
    pub fn fail_once(&self, method: &str, uri: &str, message: &str) {
        self.state
            .lock()
            .unwrap()
            .once
            .entry(route(method, uri))
            .or_default()
            .push_back(Canned::Fail(message.to_string()));
    }

    pub fn respond_json_once(&self, method: &str, uri: &str, status: u16, body: serde_json::Value) {
        self.state
            .lock()
            .unwrap()
            .once
            .entry(route(method, uri))
            .or_default()
            .push_back(Canned::Respond {
                status,
                content_type: JSON.to_string(),
                body: body.to_string().into_bytes(),
            });
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.state.lock().unwrap().requests.clone()
    }

    pub fn call_count(&self) -> usize {
        self.state.lock().unwrap().requests.len()
    }
}

impl Transport for FakeTransport {
    type Error = FakeError;

    async fn call(&self, request: Request<Vec<u8>>) -> Result<Response<Vec<u8>>, FakeError> {
        let method = request.method().to_string();
        let uri = request.uri().to_string();
        let canned = {
            let mut state = self.state.lock().unwrap();
            state.requests.push(Recorded {
                method: method.clone(),
                uri: uri.clone(),
                content_type: header(&request, CONTENT_TYPE),
                accept_encoding: header(&request, ACCEPT_ENCODING),
                body: request.body().clone(),
            });
            let key = route(&method, &uri);
            match state.once.get_mut(&key).and_then(VecDeque::pop_front) {
                Some(canned) => Some(canned),
                None => state.routes.get(&key).cloned(),
            }
        };

        match canned {
            Some(Canned::Respond {
                status,
                content_type,
                body,
            }) => Ok(Response::builder()
                .status(status)
                .header(CONTENT_TYPE, content_type)
                .body(body)
                .expect("valid canned response")),
            Some(Canned::Fail(message)) => Err(FakeError(message)),
            None => Err(FakeError(format!("no route for {method} {uri}"))),
        }
    }
}

fn header(request: &Request<Vec<u8>>, name: http::header::HeaderName) -> Option<String> {
    request
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}
