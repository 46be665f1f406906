//! Artisan Artifact Model
//!
//! Types shared by every stage of the generation pipeline and the self-test
//! harness.
//!
//! # Core Concepts
//!
//! - [`CodeBundle`]: markup, style and behavior surfaces plus metadata
//! - [`ScanIssue`]: one static-scan finding on one [`Surface`]
//! - [`SelfTestResult`]: normalized outcome of an artifact's self-check
//! - [`ArtifactId`]: identity of a rendered artifact
//! - [`ContentHash`]: Blake3 fingerprint of a bundle's code
//!
//! # Example
//!
//! ```rust
//! use artisan_artifact::{CodeBundle, Surface};
//!
//! let bundle = CodeBundle::new("<button id=\"go\">Go</button>", "", "")
//!     .with_title("Button");
//! assert!(bundle.surface(Surface::Markup).contains("id=\"go\""));
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod bundle;
mod hash;
mod id;

pub use bundle::{CodeBundle, ScanIssue, Severity, Surface};
pub use hash::ContentHash;
pub use id::ArtifactId;
pub use self_test::SelfTestResult;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
