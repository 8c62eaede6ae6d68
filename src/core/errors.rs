//! core::errors
//!
//! Failure classification shared by the update and publish workflows.
//!
//! Every workflow error reports the [`Step`] that failed and an
//! [`ErrorKind`], so automation can decide between retrying the whole
//! operation, skipping, or alerting without matching on message text.

use std::fmt;

/// A step of the update or publish workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    /// Reading the current file
    Read,
    /// Running the caller-supplied content transform
    Transform,
    /// Resolving a branch's head revision
    BranchHead,
    /// Creating the isolated branch (update workflow)
    BranchCreate,
    /// Writing the transformed file
    Write,
    /// Opening the pull request
    Propose,
    /// Reserving the destination ref (publish workflow)
    RefCreate,
    /// Creating a blob object
    BlobCreate,
    /// Creating the tree object
    TreeCreate,
    /// Creating the commit object
    CommitCreate,
    /// Moving the branch ref to the new commit
    RefUpdate,
}

impl Step {
    /// Stable kebab-case name, suitable for logs and metrics labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            Step::Read => "read",
            Step::Transform => "transform",
            Step::BranchHead => "branch-head",
            Step::BranchCreate => "branch-create",
            Step::Write => "write",
            Step::Propose => "propose",
            Step::RefCreate => "ref-create",
            Step::BlobCreate => "blob-create",
            Step::TreeCreate => "tree-create",
            Step::CommitCreate => "commit-create",
            Step::RefUpdate => "ref-update",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What went wrong, independent of where.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// File or branch absent
    NotFound,
    /// Optimistic-concurrency precondition failed
    Conflict,
    /// Branch name collision
    AlreadyExists,
    /// Any other transport or API failure
    RemoteFailure,
    /// The content transform rejected its input
    TransformFailure,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::NotFound => write!(f, "not found"),
            ErrorKind::Conflict => write!(f, "conflict"),
            ErrorKind::AlreadyExists => write!(f, "already exists"),
            ErrorKind::RemoteFailure => write!(f, "remote failure"),
            ErrorKind::TransformFailure => write!(f, "transform failure"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_names_are_kebab_case() {
        assert_eq!(Step::BranchCreate.to_string(), "branch-create");
        assert_eq!(Step::RefUpdate.to_string(), "ref-update");
        assert_eq!(Step::Propose.to_string(), "propose");
    }

    #[test]
    fn error_kind_display() {
        assert_eq!(ErrorKind::Conflict.to_string(), "conflict");
        assert_eq!(ErrorKind::RemoteFailure.to_string(), "remote failure");
    }
}
