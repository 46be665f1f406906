//! Artisan Harness - self-test protocol for rendered artifacts
//!
//! The host-side half of the contract every generated artifact follows:
//!
//! - [`SelfTestHarness`] invokes `runSelfTest`, normalizes the outcome and
//!   publishes it on the host bus and on the artifact's own bus
//! - [`DebugSurface`] shows and persists the latest result per artifact
//! - [`ErrorTracker`] keeps the error state fed by `artifact-error` events
//! - [`RuntimeRegistry`] maps artifact ids to live runtimes
//!
//! # Example
//!
//! ```rust
//! use artisan_artifact::ArtifactId;
//! use artisan_harness::{EventBus, MemoryResultStore, SelfTestHarness};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! let harness = SelfTestHarness::new(
//!     Arc::new(EventBus::new("host")),
//!     Arc::new(MemoryResultStore::new()),
//! );
//! let id = ArtifactId::new();
//! harness.handle_message(id, &json!({"type": "artifact-error", "message": "boom"}));
//! assert!(harness.error_state(&id).unwrap().has_error);
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod bus;
pub mod debug_surface;
pub mod error;
pub mod error_state;
pub mod harness;
pub mod registry;
pub mod reporting;
pub mod runtime;
pub mod store;
pub mod trigger;

pub use bus::{ArtifactEvent, EventBus, EventSubscriber, SubscriptionId, Topic};
pub use debug_surface::DebugSurface;
pub use error::{HarnessError, RegistryError};
pub use error_state::{ErrorRecord, ErrorState, ErrorTracker, ERROR_HISTORY_LIMIT};
pub use harness::{ArtifactScope, SelfTestHarness};
pub use registry::RuntimeRegistry;
pub use reporting::{ReportingSink, TracingSink};
pub use runtime::{ArtifactRuntime, SelfCheckOutcome};
pub use store::{result_key, MemoryResultStore, ResultStore, RESULT_KEY_PREFIX};
pub use trigger::{parse_artifact_message, ArtifactMessage, SELF_TEST_TRIGGER_JS, TRIGGER_ROUTINE};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
