//! core::naming
//!
//! Branch name generation.
//!
//! # Design
//!
//! Generated names are the caller's prefix followed by a short random
//! alphabetic suffix, bounded by a maximum length. The random source is
//! injected: production uses an OS-seeded CSPRNG, tests pass a seeded one.
//!
//! Collisions are improbable, not impossible. Callers that need a guarantee
//! rely on the remote's `AlreadyExists` answer when creating the branch.
//!
//! # Example
//!
//! ```
//! use rand::rngs::StdRng;
//! use rand::SeedableRng;
//! use repobump::core::naming::{NameGenerator, RandomNameGenerator};
//!
//! let names = RandomNameGenerator::with_rng(StdRng::seed_from_u64(7));
//! let name = names.prefixed_name("update-image-");
//! assert!(name.starts_with("update-image-"));
//! assert_eq!(name.len(), "update-image-".len() + 5);
//! ```

use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};

/// Maximum length of a generated branch name.
pub const BRANCH_MAX_LENGTH: usize = 100;

/// Default length of the random suffix.
pub const DEFAULT_SUFFIX_LEN: usize = 5;

const CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Produces branch names from a prefix.
pub trait NameGenerator: Send + Sync {
    /// Generate a name starting with (a possibly truncated) `prefix`.
    fn prefixed_name(&self, prefix: &str) -> String;
}

impl<F> NameGenerator for F
where
    F: Fn(&str) -> String + Send + Sync,
{
    fn prefixed_name(&self, prefix: &str) -> String {
        self(prefix)
    }
}

/// Generates `prefix` + random `[a-zA-Z]` suffix.
///
/// If prefix and suffix together exceed `max_length`, the prefix is trimmed
/// to make room. A trailing `-` on the prefix survives the trim. A suffix
/// longer than `max_length` is cut to `max_length`, so no name ever exceeds
/// the limit.
#[derive(Debug)]
pub struct RandomNameGenerator<R = StdRng> {
    rng: Mutex<R>,
    max_length: usize,
    suffix_len: usize,
}

impl RandomNameGenerator<StdRng> {
    /// Create a generator seeded from the operating system.
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_os_rng())
    }
}

impl Default for RandomNameGenerator<StdRng> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: RngCore + Send> RandomNameGenerator<R> {
    /// Create a generator drawing from the given random source.
    pub fn with_rng(rng: R) -> Self {
        Self {
            rng: Mutex::new(rng),
            max_length: BRANCH_MAX_LENGTH,
            suffix_len: DEFAULT_SUFFIX_LEN,
        }
    }

    /// Override the maximum name length. Zero restores the default.
    pub fn max_length(mut self, max_length: usize) -> Self {
        self.max_length = if max_length == 0 {
            BRANCH_MAX_LENGTH
        } else {
            max_length
        };
        self
    }

    /// Override the suffix length. Zero restores the default.
    pub fn suffix_len(mut self, suffix_len: usize) -> Self {
        self.suffix_len = if suffix_len == 0 {
            DEFAULT_SUFFIX_LEN
        } else {
            suffix_len
        };
        self
    }

    /// Suffix length actually used: never more than `max_length`.
    fn effective_suffix_len(&self) -> usize {
        self.suffix_len.min(self.max_length)
    }

    fn random_suffix(&self) -> String {
        // A poisoned lock still holds a usable RNG.
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        (0..self.effective_suffix_len())
            .map(|_| CHARSET[rng.random_range(0..CHARSET.len())] as char)
            .collect()
    }
}

impl<R: RngCore + Send> NameGenerator for RandomNameGenerator<R> {
    fn prefixed_name(&self, prefix: &str) -> String {
        let suffix = self.random_suffix();
        let (head, separator) = trim_prefix(prefix, self.max_length, self.effective_suffix_len());
        format!("{}{}{}", head, separator, suffix)
    }
}

/// Trim `prefix` so that it plus a suffix of `suffix_len` fits in `max_length`.
///
/// Returns the kept part of the prefix and the separator to re-append.
fn trim_prefix(prefix: &str, max_length: usize, suffix_len: usize) -> (&str, &'static str) {
    if prefix.len() + suffix_len <= max_length {
        return (prefix, "");
    }

    let mut trim_point = max_length.saturating_sub(suffix_len);
    let mut separator = "";
    if prefix.ends_with('-') && trim_point > 0 {
        separator = "-";
        trim_point -= 1;
    }

    let mut cut = trim_point.min(prefix.len());
    while !prefix.is_char_boundary(cut) {
        cut -= 1;
    }
    (&prefix[..cut], separator)
}
