//! Sync engine
//!
//! Ties identity resolution, the local progress cache, the debounce gate and
//! the conflict resolver to a transport.
//!
//! ## Failure handling
//!
//! - A rejected login (401) always surfaces as `SyncError::Auth`.
//! - Failures to read a book file surface as `SyncError::IdentityResolution`.
//! - Everything else (5xx, 400, network errors, garbage bodies) is logged
//!   and degrades: fetches return `None`, pushes return `false`.
//!
//! ## Usage
//!
//! ```ignore
//! let transport = HttpTransport::new(&config.server_url, config.request_timeout())?;
//! let engine = SyncEngine::new(transport, credentials, config.engine_config())
//!     .with_device_id(device_id);
//!
//! let outcome = engine.sync_with_conflict("/books/dune.epub", 42, 300).await?;
//! println!("open page {}", outcome.resolved_page);
//! ```

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::EngineConfig;
use crate::conflict::{ConflictResolver, DecisionReason, LocalPosition};
use crate::device::{Credentials, Device};
use crate::error::{SyncError, SyncResult};
use crate::identity::{self, DocumentId};
use crate::locks::DocumentLocks;
use crate::models::{LocalProgressRecord, ProgressPayload, RemoteProgress};
use crate::store::ProgressStore;
use crate::transport::{
    SyncRequest, SyncResponse, SyncTransport, ACCEPT_HEADER, AUTH_KEY_HEADER, AUTH_PATH,
    AUTH_USER_HEADER, PROGRESS_PATH,
};

/// Result of a conflict-aware sync
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyncOutcome {
    /// Page the reader should display
    pub resolved_page: i64,
    pub reason: DecisionReason,
    /// Whether a push was sent and accepted
    pub pushed: bool,
}

/// Progress sync client for one account on one device
pub struct SyncEngine<T: SyncTransport> {
    transport: T,
    credentials: Credentials,
    device: Device,
    config: EngineConfig,
    store: ProgressStore,
    locks: DocumentLocks,
    clock: Arc<dyn Clock>,
    resolver: ConflictResolver,
}

impl<T: SyncTransport> SyncEngine<T> {
    /// Create an engine with a freshly generated device id and the system clock
    pub fn new(transport: T, credentials: Credentials, config: EngineConfig) -> Self {
        let device = Device::generate(config.device_name.clone());
        let resolver = ConflictResolver::new(config.adopt_remote_threshold);

        Self {
            transport,
            credentials,
            device,
            config,
            store: ProgressStore::new(),
            locks: DocumentLocks::new(),
            clock: Arc::new(SystemClock),
            resolver,
        }
    }

    /// Use a persisted device id instead of the generated one
    pub fn with_device_id(mut self, id: impl Into<String>) -> Self {
        self.device.id = id.into();
        self
    }

    /// Replace the time source
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Document key for a file under the configured strategy
    pub fn document_id(&self, path: impl AsRef<Path>) -> SyncResult<DocumentId> {
        identity::resolve(path, self.config.identity_strategy)
    }

    /// Last accepted push for a document, if any
    pub fn local_record(&self, document: &DocumentId) -> Option<LocalProgressRecord> {
        self.store.get(document)
    }

    /// All local records, ordered by document key
    pub fn local_records(&self) -> Vec<LocalProgressRecord> {
        self.store.snapshot()
    }

    /// Check the credentials against the service
    ///
    /// Any status other than 200 means "not authorized". Network failures
    /// are returned as errors so callers can tell them apart.
    pub async fn test_auth(&self) -> SyncResult<bool> {
        let response = self.send(SyncRequest::get(AUTH_PATH)).await?;
        debug!(status = response.status, "auth response");
        Ok(response.is_success())
    }

    /// Fetch the remote record for a file
    ///
    /// Returns `Ok(None)` when the service has no record, and also when the
    /// request fails for any reason other than rejected credentials.
    pub async fn get_progress(&self, path: impl AsRef<Path>) -> SyncResult<Option<RemoteProgress>> {
        let document = self.document_id(path)?;
        self.get_document_progress(&document).await
    }

    /// Fetch the remote record for an already resolved document key
    pub async fn get_document_progress(
        &self,
        document: &DocumentId,
    ) -> SyncResult<Option<RemoteProgress>> {
        self.fetch(document).await
    }

    /// Push a position unconditionally
    ///
    /// Returns `Ok(true)` once the service accepted the record and the local
    /// cache was updated.
    pub async fn put_progress(
        &self,
        path: impl AsRef<Path>,
        page: i64,
        total_pages: i64,
    ) -> SyncResult<bool> {
        let document = self.document_id(path)?;
        let _guard = self.locks.acquire(&document).await;
        self.push_locked(&document, page, total_pages).await
    }

    /// Push a position if the debounce gate allows it
    ///
    /// Returns `Ok(false)` both when the gate holds the push back and when
    /// the push fails.
    pub async fn debounced_put(
        &self,
        path: impl AsRef<Path>,
        page: i64,
        total_pages: i64,
        force: bool,
    ) -> SyncResult<bool> {
        let document = self.document_id(path)?;
        let _guard = self.locks.acquire(&document).await;

        let record = self.store.get(&document);
        let now = self.clock.now();
        if !self
            .config
            .debounce
            .should_push(record.as_ref(), now, page, force)
        {
            debug!(document = %document, page, "push held back by debounce");
            return Ok(false);
        }

        self.push_locked(&document, page, total_pages).await
    }

    /// Reconcile the local position with the remote one
    ///
    /// Adopts the remote page when it is meaningfully ahead, otherwise pushes
    /// the local page.
    pub async fn sync_with_conflict(
        &self,
        path: impl AsRef<Path>,
        page: i64,
        total_pages: i64,
    ) -> SyncResult<SyncOutcome> {
        let document = self.document_id(path)?;
        self.sync_document(&document, page, total_pages).await
    }

    /// Reconcile against the remote record of an already resolved document key
    pub async fn sync_document(
        &self,
        document: &DocumentId,
        page: i64,
        total_pages: i64,
    ) -> SyncResult<SyncOutcome> {
        let remote = self.fetch(document).await?;

        let local = LocalPosition::new(page, total_pages);
        let decision = self.resolver.resolve(local, remote.as_ref());

        match decision.reason {
            DecisionReason::AdoptRemote => info!(
                document = %document,
                local = local.percentage(),
                remote_page = decision.resolved_page,
                delta = decision.delta,
                "adopting remote progress"
            ),
            reason => debug!(
                document = %document,
                reason = reason.as_str(),
                delta = decision.delta,
                "keeping local progress"
            ),
        }

        let pushed = if decision.push {
            let _guard = self.locks.acquire(document).await;
            self.push_locked(document, page, total_pages).await?
        } else {
            false
        };

        Ok(SyncOutcome {
            resolved_page: decision.resolved_page,
            reason: decision.reason,
            pushed,
        })
    }

    async fn fetch(&self, document: &DocumentId) -> SyncResult<Option<RemoteProgress>> {
        let path = format!("{}/{}", PROGRESS_PATH, document);
        let response = match self.send(SyncRequest::get(path)).await {
            Ok(response) => response,
            Err(e) => {
                warn!(document = %document, error = %e, "failed to fetch progress");
                return Ok(None);
            }
        };

        match response.status {
            200 => Ok(self.decode_progress(document, &response)),
            404 => Ok(None),
            401 => Err(SyncError::Auth),
            status => {
                warn!(document = %document, status, body = %response.body, "unexpected status fetching progress");
                Ok(None)
            }
        }
    }

    fn decode_progress(&self, document: &DocumentId, response: &SyncResponse) -> Option<RemoteProgress> {
        // The reference server answers 200 with an empty object when it has no record
        if response.body.trim() == "{}" {
            return None;
        }

        match serde_json::from_str::<RemoteProgress>(&response.body) {
            Ok(progress) => Some(progress),
            Err(e) => {
                error!(document = %document, error = %e, body = %response.body, "failed to parse progress");
                None
            }
        }
    }

    /// Send a record and update the cache; the caller holds the document lock
    async fn push_locked(
        &self,
        document: &DocumentId,
        page: i64,
        total_pages: i64,
    ) -> SyncResult<bool> {
        let payload = ProgressPayload::for_page(
            document,
            page,
            total_pages,
            &self.device.id,
            &self.device.name,
        );
        let body = serde_json::to_string(&payload)?;

        let response = match self.send(SyncRequest::put(PROGRESS_PATH, body)).await {
            Ok(response) => response,
            Err(e) => {
                warn!(document = %document, error = %e, "failed to push progress");
                return Ok(false);
            }
        };

        match response.status {
            200 => {
                self.store
                    .record_push(document, page, total_pages, self.clock.now());
                info!(
                    document = %document,
                    page,
                    percentage = payload.percentage,
                    "progress pushed"
                );
                Ok(true)
            }
            401 => Err(SyncError::Auth),
            status => {
                let err = SyncError::from_status(status, response.body);
                warn!(document = %document, error = %err, "push rejected");
                Ok(false)
            }
        }
    }

    async fn send(&self, request: SyncRequest) -> SyncResult<SyncResponse> {
        let request = request
            .with_header("Accept", ACCEPT_HEADER)
            .with_header(AUTH_USER_HEADER, self.credentials.username.clone())
            .with_header(AUTH_KEY_HEADER, self.credentials.auth_key.clone());

        Ok(self.transport.send(request).await?)
    }
}
