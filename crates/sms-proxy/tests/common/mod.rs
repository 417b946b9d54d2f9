//! Shared helpers for the integration suites.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, Response},
};
use proxy_store::MemoryStore;
use sms_client::{MessageSender, SmsError};
use sms_proxy::{api::AppState, SessionManager};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

pub const T1: &str = "+12223334444";
pub const T2: &str = "+12223335555";
pub const P1: &str = "+13334445555";
pub const P2: &str = "+14445556666";
pub const P3: &str = "+15556667777";
pub const P4: &str = "+16667778888";

/// Records outbound messages instead of sending them.
#[derive(Default)]
pub struct RecordingSender {
    sent: Mutex<Vec<(String, String, String)>>,
    fail: AtomicBool,
}

impl RecordingSender {
    pub fn sent(&self) -> Vec<(String, String, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn fail_sends(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl MessageSender for RecordingSender {
    async fn send(&self, from: &str, to: &str, body: &str) -> Result<(), SmsError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(SmsError::SendFailed("503 - carrier unavailable".into()));
        }
        self.sent
            .lock()
            .unwrap()
            .push((from.to_string(), to.to_string(), body.to_string()));
        Ok(())
    }
}

/// App state over a memory store whose pool holds `numbers`.
pub async fn create_test_state(numbers: &[&str]) -> (AppState, Arc<RecordingSender>) {
    let sender = Arc::new(RecordingSender::default());
    let sessions = Arc::new(SessionManager::new(Arc::new(MemoryStore::new()), sender.clone()));
    for number in numbers {
        sessions.pool().add(number).await.unwrap();
    }
    (AppState::new(sessions), sender)
}

pub fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn empty_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}
