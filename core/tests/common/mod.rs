//! Shared test fixtures
//!
//! `ScriptedTransport` answers every call through a responder closure, records
//! the requests it saw, and can hold calls open until the test releases them.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use argus_core::{ApiEnvelope, ApiRequest, ArgusError, Result, Transport};
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{Mutex, Semaphore};

type Responder = Box<dyn Fn(&ApiRequest) -> Result<ApiEnvelope> + Send + Sync>;

pub struct ScriptedTransport {
    responder: Responder,
    requests: Mutex<Vec<ApiRequest>>,
    calls: AtomicUsize,
    gate: Option<Semaphore>,
}

impl ScriptedTransport {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&ApiRequest) -> Result<ApiEnvelope> + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            requests: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            gate: None,
        }
    }

    /// Always answer `ok` with `payload`
    pub fn ok(payload: Value) -> Self {
        Self::new(move |_| Ok(ApiEnvelope::ok(payload.clone())))
    }

    /// Echo the POST body back as the payload
    pub fn echo() -> Self {
        Self::new(|req| Ok(ApiEnvelope::ok(req.body.clone().unwrap_or(Value::Null))))
    }

    pub fn failing() -> Self {
        Self::new(|_| Err(ArgusError::Transport("connection refused".into())))
    }

    /// Hold every call until `release` hands out permits
    pub fn gated(mut self) -> Self {
        self.gate = Some(Semaphore::new(0));
        self
    }

    pub fn release(&self, n: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(n);
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub async fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().await.clone()
    }

    pub async fn last_request(&self) -> Option<ApiRequest> {
        self.requests.lock().await.last().cloned()
    }

    /// Yield until at least `n` calls have started
    pub async fn wait_for_calls(&self, n: usize) {
        while self.call_count() < n {
            tokio::task::yield_now().await;
        }
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn call(&self, request: ApiRequest) -> Result<ApiEnvelope> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().await.push(request.clone());
        if let Some(gate) = &self.gate {
            gate.acquire()
                .await
                .map_err(|e| ArgusError::Transport(e.to_string()))?
                .forget();
        }
        (self.responder)(&request)
    }
}

pub fn transport(t: ScriptedTransport) -> Arc<ScriptedTransport> {
    Arc::new(t)
}
