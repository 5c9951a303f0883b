//! Scripted in-memory transport for tests

use crate::error::TransportError;
use crate::transport::traits::{PlatformResponse, PlatformTransport};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Platform acknowledgement body
pub fn ack_response() -> PlatformResponse {
    PlatformResponse::new(
        200,
        r#"{"data":{"status":"ACKNOWLEDGED","result":{"accepted":true}}}"#,
    )
}

/// Replies from a script, then falls back to a fixed behaviour
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Result<PlatformResponse, TransportError>>>,
    fallback_status: u16,
    calls: Mutex<Vec<(String, Bytes)>>,
}

impl ScriptedTransport {
    /// Accept every request once the script runs out
    pub fn accepting() -> Self {
        Self::with_fallback(200)
    }

    /// Fail every request with `status` once the script runs out
    pub fn failing(status: u16) -> Self {
        Self::with_fallback(status)
    }

    fn with_fallback(fallback_status: u16) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback_status,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Queue a reply
    pub fn then(self, reply: Result<PlatformResponse, TransportError>) -> Self {
        self.script.lock().unwrap().push_back(reply);
        self
    }

    /// Queue `n` connection failures
    pub fn then_fail_times(mut self, n: usize) -> Self {
        for _ in 0..n {
            self = self.then(Err(TransportError::Request("connection refused".into())));
        }
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Every request seen so far
    pub fn calls(&self) -> Vec<(String, Bytes)> {
        self.calls.lock().unwrap().clone()
    }

    /// Last body posted to `path`, decoded as JSON
    pub fn last_body(&self, path: &str) -> Option<serde_json::Value> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(p, _)| p == path)
            .and_then(|(_, body)| serde_json::from_slice(body).ok())
    }
}

#[async_trait]
impl PlatformTransport for ScriptedTransport {
    async fn post(&self, path: &str, body: Bytes) -> Result<PlatformResponse, TransportError> {
        self.calls.lock().unwrap().push((path.to_string(), body));

        if let Some(reply) = self.script.lock().unwrap().pop_front() {
            return reply;
        }

        if self.fallback_status == 200 {
            Ok(ack_response())
        } else {
            Ok(PlatformResponse::new(self.fallback_status, "unavailable"))
        }
    }

    fn name(&self) -> &'static str {
        "Scripted"
    }
}
