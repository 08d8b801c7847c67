use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;

use super::{
    Method, SyncRequest, SyncResponse, SyncTransport, TransportError, AUTH_KEY_HEADER, AUTH_PATH,
    AUTH_USER_HEADER, PROGRESS_PATH,
};
use crate::models::{ProgressPayload, RemoteProgress};

/// Scripted outcome for the next request
#[derive(Debug, Clone)]
enum Injected {
    Response(SyncResponse),
    Error(TransportError),
}

#[derive(Debug, Default)]
struct MemoryState {
    /// username -> auth key
    users: HashMap<String, String>,
    /// (username, document) -> latest record
    progress: HashMap<(String, String), RemoteProgress>,
    injected: VecDeque<Injected>,
    requests: Vec<SyncRequest>,
}

/// In-process emulation of the sync service
///
/// Authenticates against registered users, keeps the latest record per
/// user and document (last write wins) and logs every request it sees.
/// Responses and transport failures can be injected ahead of time.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    state: Mutex<MemoryState>,
    latency: Option<Duration>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an account (auth key is the hex MD5 of the password)
    pub fn with_user(self, username: impl Into<String>, auth_key: impl Into<String>) -> Self {
        self.lock().users.insert(username.into(), auth_key.into());
        self
    }

    /// Delay every response, giving concurrent callers a chance to interleave
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Seed a record as if another device had pushed it
    pub fn insert_progress(&self, username: &str, progress: RemoteProgress) {
        self.lock()
            .progress
            .insert((username.to_string(), progress.document.clone()), progress);
    }

    /// Stored record for a user and document
    pub fn progress(&self, username: &str, document: &str) -> Option<RemoteProgress> {
        self.lock()
            .progress
            .get(&(username.to_string(), document.to_string()))
            .cloned()
    }

    /// Answer the next request with a fixed status and body
    pub fn respond_next(&self, status: u16, body: impl Into<String>) {
        self.lock()
            .injected
            .push_back(Injected::Response(SyncResponse::new(status, body)));
    }

    /// Fail the next request below the HTTP layer
    pub fn fail_next(&self, error: TransportError) {
        self.lock().injected.push_back(Injected::Error(error));
    }

    /// Every request received so far
    pub fn requests(&self) -> Vec<SyncRequest> {
        self.lock().requests.clone()
    }

    /// Number of `PUT` requests received so far
    pub fn put_count(&self) -> usize {
        self.lock()
            .requests
            .iter()
            .filter(|r| r.method == Method::Put)
            .count()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn handle(&self, request: &SyncRequest) -> Result<SyncResponse, TransportError> {
        let mut state = self.lock();
        state.requests.push(request.clone());

        match state.injected.pop_front() {
            Some(Injected::Response(response)) => return Ok(response),
            Some(Injected::Error(error)) => return Err(error),
            None => {}
        }

        let Some(username) = authenticate(&state, request) else {
            return Ok(SyncResponse::new(401, r#"{"message":"Unauthorized"}"#));
        };

        let document_prefix = format!("{}/", PROGRESS_PATH);
        match (request.method, request.path.as_str()) {
            (Method::Get, AUTH_PATH) => Ok(SyncResponse::new(200, r#"{"authorized":"OK"}"#)),
            (Method::Get, path) if path.starts_with(&document_prefix) => {
                let document = &path[document_prefix.len()..];
                match state.progress.get(&(username, document.to_string())) {
                    Some(record) => Ok(SyncResponse::new(200, to_json(record)?)),
                    None => Ok(SyncResponse::new(404, r#"{"message":"Not found"}"#)),
                }
            }
            (Method::Put, PROGRESS_PATH) => {
                let payload = request
                    .body
                    .as_deref()
                    .and_then(|body| serde_json::from_str::<ProgressPayload>(body).ok())
                    .filter(|p| !p.document.is_empty());
                let Some(payload) = payload else {
                    return Ok(SyncResponse::new(400, r#"{"message":"Invalid request"}"#));
                };

                let timestamp = Utc::now().timestamp();
                let record = RemoteProgress {
                    document: payload.document.clone(),
                    progress: payload.progress,
                    percentage: payload.percentage,
                    device_id: payload.device_id,
                    device: payload.device,
                    timestamp,
                };
                state
                    .progress
                    .insert((username, payload.document.clone()), record);

                let body = json!({ "document": payload.document, "timestamp": timestamp });
                Ok(SyncResponse::new(200, body.to_string()))
            }
            _ => Ok(SyncResponse::new(404, r#"{"message":"Not found"}"#)),
        }
    }
}

fn authenticate(state: &MemoryState, request: &SyncRequest) -> Option<String> {
    let username = request.header(AUTH_USER_HEADER)?;
    let key = request.header(AUTH_KEY_HEADER)?;
    match state.users.get(username) {
        Some(expected) if expected == key => Some(username.to_string()),
        _ => None,
    }
}

fn to_json(record: &RemoteProgress) -> Result<String, TransportError> {
    serde_json::to_string(record).map_err(|e| TransportError::InvalidRequest(e.to_string()))
}

#[async_trait]
impl SyncTransport for MemoryTransport {
    async fn send(&self, request: SyncRequest) -> Result<SyncResponse, TransportError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        self.handle(&request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn authed(request: SyncRequest) -> SyncRequest {
        request
            .with_header(AUTH_USER_HEADER, "reader")
            .with_header(AUTH_KEY_HEADER, "key")
    }

    #[tokio::test]
    async fn test_rejects_unknown_user() {
        let transport = MemoryTransport::new().with_user("reader", "key");
        let response = transport
            .send(SyncRequest::get(AUTH_PATH).with_header(AUTH_USER_HEADER, "reader"))
            .await
            .unwrap();
        assert_eq!(response.status, 401);
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let transport = MemoryTransport::new().with_user("reader", "key");
        let body = r#"{"progress":"3","percentage":0.5,"device_id":"D","document":"doc","device":"R"}"#;

        let put = transport
            .send(authed(SyncRequest::put(PROGRESS_PATH, body.to_string())))
            .await
            .unwrap();
        assert_eq!(put.status, 200);

        let get = transport
            .send(authed(SyncRequest::get("/syncs/progress/doc")))
            .await
            .unwrap();
        assert_eq!(get.status, 200);
        let record: RemoteProgress = serde_json::from_str(&get.body).unwrap();
        assert_eq!(record.progress, "3");

        let missing = transport
            .send(authed(SyncRequest::get("/syncs/progress/other")))
            .await
            .unwrap();
        assert_eq!(missing.status, 404);
        assert_eq!(transport.put_count(), 1);
    }

    #[tokio::test]
    async fn test_rejects_malformed_payload() {
        let transport = MemoryTransport::new().with_user("reader", "key");
        let response = transport
            .send(authed(SyncRequest::put(PROGRESS_PATH, "not json".to_string())))
            .await
            .unwrap();
        assert_eq!(response.status, 400);
    }

    #[tokio::test]
    async fn test_injected_outcomes_are_consumed_in_order() {
        let transport = MemoryTransport::new().with_user("reader", "key");
        transport.respond_next(503, "maintenance");
        transport.fail_next(TransportError::Timeout);

        let first = transport.send(authed(SyncRequest::get(AUTH_PATH))).await;
        assert_eq!(first.unwrap().status, 503);

        let second = transport.send(authed(SyncRequest::get(AUTH_PATH))).await;
        assert_eq!(second, Err(TransportError::Timeout));

        let third = transport.send(authed(SyncRequest::get(AUTH_PATH))).await;
        assert_eq!(third.unwrap().status, 200);
        assert_eq!(transport.requests().len(), 3);
    }
}
