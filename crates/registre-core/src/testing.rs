//! Deterministic doubles for the transport and sleep seams

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use reqwest::header::{HeaderName, HeaderValue};

use crate::http::{ApiRequest, ApiResponse, Transport, TransportError};
use crate::retry::Sleep;

/// Replays canned responses in order and records every request it receives.
///
/// Running out of script yields a connection error, so an unexpected extra
/// call shows up as a failure rather than a hang.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Result<ApiResponse, TransportError>>>,
    requests: Mutex<Vec<ApiRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, result: Result<ApiResponse, TransportError>) -> &Self {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(result);
        self
    }

    /// Queue a response with the given status and body
    pub fn respond(&self, status: u16, body: impl Into<Vec<u8>>) -> &Self {
        self.push(Ok(ApiResponse::new(status, body)))
    }

    /// Queue a JSON response
    pub fn respond_json(&self, status: u16, value: serde_json::Value) -> &Self {
        self.respond(status, value.to_string())
    }

    /// Queue a response carrying extra headers
    pub fn respond_with_headers(
        &self,
        status: u16,
        body: impl Into<Vec<u8>>,
        headers: &[(&'static str, &str)],
    ) -> &Self {
        let mut resp = ApiResponse::new(status, body);
        for (name, value) in headers {
            if let Ok(v) = HeaderValue::from_str(value) {
                resp.headers.insert(HeaderName::from_static(name), v);
            }
        }
        self.push(Ok(resp))
    }

    pub fn fail_connect(&self) -> &Self {
        self.push(Err(TransportError::Connect("connection refused".into())))
    }

    /// All requests sent so far
    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Responses not consumed yet
    pub fn remaining(&self) -> usize {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Transport for ScriptedTransport {
    fn send(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Connect("script exhausted".into())))
    }
}

/// Records requested pauses instead of sleeping
#[derive(Debug, Default)]
pub struct RecordingSleep {
    slept: Mutex<Vec<Duration>>,
}

impl RecordingSleep {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn recorded(&self) -> Vec<Duration> {
        self.slept
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn count(&self) -> usize {
        self.slept
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Sleep for RecordingSleep {
    fn sleep(&self, duration: Duration) {
        self.slept
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(duration);
    }
}
