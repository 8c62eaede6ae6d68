//! repobump - publish file updates to remote Git repositories
//!
//! repobump mutates a repository through its hosting API on behalf of
//! automation such as GitOps image bumps. It never clones; every read and
//! write is a remote call.
//!
//! # Architecture
//!
//! - [`updater`] - Single-file workflow: read, transform, branch, write, propose
//! - [`uploader`] - Multi-file atomic commit: blob, tree, commit, ref
//! - [`forge`] - The remote repository contract, GitHub client and mock
//! - [`core`] - Value types, error classification, naming and configuration
//! - [`cli`] - Command-line interface layer
//!
//! # Failure Model
//!
//! 1. Every error names the step that failed
//! 2. Nothing is retried automatically
//! 3. Nothing already applied on the remote is rolled back

pub mod cli;
pub mod core;
pub mod forge;
pub mod updater;
pub mod uploader;
