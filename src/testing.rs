//! In-memory REST endpoint for tests.
//!
//! `ScriptedTransport` answers requests from queues keyed by
//! [`ApiRequest::key`] and records every request it sees.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use anyhow::{Result, anyhow};

use crate::transport::{ApiRequest, ApiResponse, Transport};

#[derive(Default)]
pub struct ScriptedTransport {
    routes: Mutex<HashMap<String, VecDeque<ApiResponse>>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `response` for `key`. Once a queue is down to its last entry,
    /// that entry answers every further request.
    pub fn respond(&self, key: impl Into<String>, response: ApiResponse) -> &Self {
        self.routes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(key.into())
            .or_default()
            .push_back(response);
        self
    }

    /// Every request key seen so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn call_count(&self, key: &str) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|k| k.as_str() == key)
            .count()
    }
}

impl Transport for ScriptedTransport {
    async fn get(&self, request: &ApiRequest) -> Result<ApiResponse> {
        let key = request.key();
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(key.clone());

        let mut routes = self.routes.lock().unwrap_or_else(|e| e.into_inner());
        let queue = routes
            .get_mut(&key)
            .ok_or_else(|| anyhow!("no scripted response for {key}"))?;

        let response = if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        };
        response.ok_or_else(|| anyhow!("no scripted response for {key}"))
    }
}
