//! Artisan Guard
//!
//! Everything that vets or rewrites generated code, with no I/O:
//!
//! - [`evaluate`]: the safe arithmetic evaluator
//! - [`inject`]: rewrites dynamic evaluation call sites to the evaluator helper
//! - [`scanner`]: rule-table static security scan over the three surfaces
//! - [`reconcile`]: placeholder elements for ids the markup never defined
//! - [`stubs`]: fallback self-check and error forwarding
//! - [`postprocess`]: the two passes the code adapter applies to each bundle
//!
//! # Example
//!
//! ```rust
//! use artisan_artifact::CodeBundle;
//! use artisan_guard::{post_process, scan};
//!
//! let draft = CodeBundle::new("<input id=\"e\">", "", "out = eval(e.value);");
//! assert!(scan(&draft).critical);
//!
//! let (fixed, summary) = post_process(&draft);
//! assert_eq!(summary.replaced_calls, 1);
//! assert!(!scan(&fixed).critical);
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod evaluator;
pub mod inject;
pub mod postprocess;
pub mod reconcile;
pub mod scanner;
pub mod stubs;

pub use evaluator::{evaluate, EvaluationError};
pub use inject::{inject_safe_evaluator, Injection, SAFE_EVALUATOR_JS, SAFE_EVALUATOR_NAME};
pub use postprocess::{finalize, post_process, PostProcessSummary};
pub use reconcile::{reconcile_elements, Reconciliation};
pub use scanner::{scan, ScanReport, ScanRule, StaticScanner};
pub use stubs::{StubsAppended, ARTIFACT_ERROR_EVENT, SELF_TEST_ROUTINE};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
