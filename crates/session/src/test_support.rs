// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scriptable Identity API served on a local port.
//!
//! Depends only on third-party crates so integration tests can mount it
//! with `#[path]`.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::net::TcpListener;

pub const LOGIN: &str = "/auth/login";
pub const REFRESH: &str = "/auth/refresh";
pub const PROFILE: &str = "/users/profile";

/// One request observed by the mock.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub method: String,
    pub path: String,
    pub authorization: Option<String>,
    pub body: Value,
}

#[derive(Default)]
struct Routes {
    /// Per-path response queue. The last entry repeats once the rest are used.
    responses: HashMap<String, VecDeque<(u16, Value)>>,
    delays: HashMap<String, Duration>,
    calls: Vec<RecordedCall>,
}

pub struct MockIdentity {
    addr: SocketAddr,
    routes: Arc<Mutex<Routes>>,
}

impl MockIdentity {
    pub async fn start() -> anyhow::Result<Self> {
        let routes = Arc::new(Mutex::new(Routes::default()));
        let app = Router::new().fallback(handle).with_state(Arc::clone(&routes));

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        Ok(Self { addr, routes })
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Queue a response for `path` after the ones already queued.
    pub fn respond(&self, path: &str, status: u16, body: Value) -> &Self {
        self.routes.lock().responses.entry(path.to_owned()).or_default().push_back((status, body));
        self
    }

    /// Make `status`/`body` the only response for `path`.
    pub fn set(&self, path: &str, status: u16, body: Value) -> &Self {
        self.routes.lock().responses.insert(path.to_owned(), VecDeque::from([(status, body)]));
        self
    }

    /// Hold every response for `path` by `delay`.
    pub fn delay(&self, path: &str, delay: Duration) -> &Self {
        self.routes.lock().delays.insert(path.to_owned(), delay);
        self
    }

    pub fn login_ok(&self, access: &str, refresh: &str) -> &Self {
        self.set(LOGIN, 200, json!({ "access_token": access, "refresh_token": refresh }))
    }

    pub fn refresh_ok(&self, access: &str) -> &Self {
        self.set(REFRESH, 200, json!({ "access_token": access }))
    }

    pub fn profile_ok(&self, profile: Value) -> &Self {
        self.set(PROFILE, 200, profile)
    }

    pub fn reject(&self, path: &str, status: u16) -> &Self {
        self.set(path, status, json!({ "detail": "rejected" }))
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.routes.lock().calls.clone()
    }

    pub fn calls_to(&self, path: &str) -> Vec<RecordedCall> {
        self.routes.lock().calls.iter().filter(|c| c.path == path).cloned().collect()
    }

    pub fn call_count(&self) -> usize {
        self.routes.lock().calls.len()
    }

    /// `Authorization` header of the most recent call to `path`.
    pub fn last_authorization(&self, path: &str) -> Option<String> {
        self.calls_to(path).last().and_then(|c| c.authorization.clone())
    }
}

async fn handle(
    State(routes): State<Arc<Mutex<Routes>>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Json<Value>) {
    let path = uri.path().to_owned();
    let authorization =
        headers.get("authorization").and_then(|v| v.to_str().ok()).map(str::to_owned);
    let body = serde_json::from_slice(&body).unwrap_or(Value::Null);

    let (delay, response) = {
        let mut routes = routes.lock();
        routes.calls.push(RecordedCall {
            method: method.to_string(),
            path: path.clone(),
            authorization,
            body,
        });
        let delay = routes.delays.get(&path).copied();
        let response = match routes.responses.get_mut(&path) {
            Some(queue) if queue.len() > 1 => queue.pop_front(),
            Some(queue) => queue.front().cloned(),
            None => None,
        };
        (delay, response)
    };

    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }

    let (status, body) = response.unwrap_or((404, json!({ "detail": "no route" })));
    (StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR), Json(body))
}

/// Assert that an expression evaluates to `Err` whose Display output
/// contains the given substring.
#[macro_export]
macro_rules! assert_err_contains {
    ($expr:expr, $substr:expr) => {{
        let result = $expr;
        let err = result.expect_err(concat!("expected Err for: ", stringify!($expr)));
        let msg = format!("{err:#}");
        assert!(msg.contains($substr), "expected error containing {:?}, got: {msg:?}", $substr);
    }};
}
