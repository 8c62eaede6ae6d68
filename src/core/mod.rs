//! core
//!
//! Shared domain types, error classification, naming and configuration.
//!
//! # Modules
//!
//! - [`types`] - Value types: RepoReference, FileSnapshot, TreeEntry, PullRequest
//! - [`errors`] - Step and error-kind classification for workflow failures
//! - [`naming`] - Branch name generation
//! - [`config`] - Configuration schema and loading
//!
//! # Design Principles
//!
//! - Everything here is a value object; the remote owns all durable state
//! - Schemas are strict and self-describing

pub mod config;
pub mod errors;
pub mod naming;
pub mod types;
