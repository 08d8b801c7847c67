//! kosync Core Library
//!
//! This crate provides the core functionality for kosync, a client for the
//! KOReader progress sync service. It keeps a reader's position in a book
//! in step across devices.
//!
//! # Architecture
//!
//! - **Identity**: a book file maps to a stable document key (MD5 of the
//!   file name, or of sparse samples of its content)
//! - **Engine**: fetches and pushes positions, debounces pushes and resolves
//!   conflicts between the local and remote position
//! - **Transport**: moves requests to the service (`reqwest` or in-memory)
//!
//! Positions are plain page numbers; completion is `page / total_pages`.
//!
//! # Quick Start
//!
//! ```text
//! let config = Config::load()?;
//! let transport = HttpTransport::new(&config.server_url, config.request_timeout())?;
//! let engine = SyncEngine::new(transport, credentials, config.engine_config());
//!
//! // Push while reading (at most every 25 seconds)
//! engine.debounced_put("/books/dune.epub", 42, 300, false).await?;
//!
//! // Reconcile when a book is opened
//! let outcome = engine.sync_with_conflict("/books/dune.epub", 42, 300).await?;
//! ```
//!
//! # Modules
//!
//! - `engine`: Sync orchestration (main entry point)
//! - `identity`: Document keys derived from book files
//! - `models`: Progress records and the completion ratio
//! - `store`: Last accepted push per document
//! - `debounce`: Push throttling
//! - `conflict`: Local versus remote resolution
//! - `transport`: Service endpoints and transports
//! - `config`: Application configuration

pub mod clock;
pub mod config;
pub mod conflict;
pub mod debounce;
pub mod device;
pub mod engine;
pub mod error;
pub mod identity;
pub mod locks;
pub mod models;
pub mod store;
pub mod transport;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{Config, EngineConfig};
pub use conflict::{ConflictResolver, DecisionReason, LocalPosition, SyncDecision};
pub use debounce::DebouncePolicy;
pub use device::{Credentials, Device};
pub use engine::{SyncEngine, SyncOutcome};
pub use error::{SyncError, SyncResult};
pub use identity::{DocumentId, IdentityStrategy};
pub use models::{percentage, LocalProgressRecord, ProgressPayload, RemoteProgress};
pub use store::ProgressStore;
pub use transport::{HttpTransport, MemoryTransport, SyncTransport, TransportError};
