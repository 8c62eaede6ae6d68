//! forge
//!
//! Abstraction over the remote hosting service.
//!
//! # Architecture
//!
//! The [`RemoteRepository`] trait is the only way the update and publish
//! workflows touch a remote. They receive it as `Arc<dyn RemoteRepository>`
//! and never name a concrete implementation.
//!
//! # Modules
//!
//! - `traits`: Core `RemoteRepository` trait and request types
//! - [`github`]: GitHub implementation using the REST API
//! - [`mock`]: In-memory object graph for deterministic testing
//!
//! # Example
//!
//! ```ignore
//! use repobump::forge::{RemoteRepository, CreatePrRequest};
//!
//! let pr = remote.create_pull_request("owner/repo", CreatePrRequest {
//!     head: "bump-abcde".to_string(),
//!     base: "main".to_string(),
//!     title: "Bump image".to_string(),
//!     body: String::new(),
//! }).await?;
//!
//! println!("Created PR #{}: {}", pr.number, pr.url);
//! ```

pub mod github;
pub mod mock;
mod traits;

pub use traits::*;
