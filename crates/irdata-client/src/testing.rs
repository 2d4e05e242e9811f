//! Scripted in-memory transport for unit tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use url::Url;

use irdata_core::error::TransportError;
use irdata_core::{Headers, Result, Transport, TransportResponse};

/// One request seen by the transport.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Seen {
    Get(String),
    Post(String, Value),
}

enum Reply {
    Response(TransportResponse),
    Timeout,
}

/// Replays queued responses in order and records every request.
///
/// POSTs and GETs draw from separate queues so tests can script the auth
/// endpoint independently of the data endpoints.
#[derive(Default)]
pub(crate) struct ScriptedTransport {
    posts: Mutex<VecDeque<Reply>>,
    gets: Mutex<VecDeque<Reply>>,
    seen: Mutex<Vec<Seen>>,
    get_delay: Duration,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_post(self, status: u16, body: &str) -> Self {
        self.on_post_with(status, Headers::new(), body)
    }

    pub fn on_post_with(self, status: u16, headers: Headers, body: &str) -> Self {
        self.posts
            .lock()
            .unwrap()
            .push_back(Reply::Response(TransportResponse::new(status, headers, body)));
        self
    }

    /// Make every GET take `delay` to answer, so concurrent callers overlap.
    pub fn with_get_delay(mut self, delay: Duration) -> Self {
        self.get_delay = delay;
        self
    }

    pub fn post_timeout(self) -> Self {
        self.posts.lock().unwrap().push_back(Reply::Timeout);
        self
    }

    pub fn on_get(self, status: u16, body: &str) -> Self {
        self.on_get_with(status, Headers::new(), body)
    }

    pub fn on_get_with(self, status: u16, headers: Headers, body: &str) -> Self {
        self.gets
            .lock()
            .unwrap()
            .push_back(Reply::Response(TransportResponse::new(status, headers, body)));
        self
    }

    /// Queue the same GET response `n` times.
    pub fn on_get_repeat(mut self, n: usize, status: u16, body: &str) -> Self {
        for _ in 0..n {
            self = self.on_get(status, body);
        }
        self
    }

    /// Queue the same POST response `n` times.
    pub fn on_post_repeat(mut self, n: usize, status: u16, body: &str) -> Self {
        for _ in 0..n {
            self = self.on_post(status, body);
        }
        self
    }

    pub fn seen(&self) -> Vec<Seen> {
        self.seen.lock().unwrap().clone()
    }

    pub fn post_count(&self) -> usize {
        self.seen()
            .iter()
            .filter(|s| matches!(s, Seen::Post(..)))
            .count()
    }

    pub fn get_count(&self) -> usize {
        self.seen()
            .iter()
            .filter(|s| matches!(s, Seen::Get(..)))
            .count()
    }

    fn next(queue: &Mutex<VecDeque<Reply>>, url: &Url) -> Result<TransportResponse> {
        match queue.lock().unwrap().pop_front() {
            Some(Reply::Response(response)) => Ok(response),
            Some(Reply::Timeout) => Err(TransportError::Timeout {
                message: url.to_string(),
            }
            .into()),
            None => panic!("no scripted response left for {}", url),
        }
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn get(&self, url: &Url) -> Result<TransportResponse> {
        self.seen.lock().unwrap().push(Seen::Get(url.to_string()));
        let reply = Self::next(&self.gets, url);
        if !self.get_delay.is_zero() {
            tokio::time::sleep(self.get_delay).await;
        }
        reply
    }

    async fn post_json(&self, url: &Url, body: &Value) -> Result<TransportResponse> {
        self.seen
            .lock()
            .unwrap()
            .push(Seen::Post(url.to_string(), body.clone()));
        Self::next(&self.posts, url)
    }
}

/// A 2xx login body carrying the auth marker.
pub(crate) const LOGIN_OK: &str = r#"{"authcode": "abc123", "autoLoginSeries": null}"#;
