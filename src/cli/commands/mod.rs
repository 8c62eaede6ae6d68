//! cli::commands
//!
//! Command dispatch and handlers.
//!
//! # Async Commands
//!
//! `update` and `publish` talk to the remote and are async. The dispatch
//! function runs them on a tokio runtime created per invocation.

mod completion;
mod publish;
mod update;

pub use completion::completion;
pub use publish::publish;
pub use update::update;

use std::sync::Arc;

use anyhow::{Context as _, Result};

use super::args::{Command, TargetArgs};
use crate::core::config::Config;
use crate::core::naming::{NameGenerator, RandomNameGenerator};
use crate::forge::github::GitHubClient;
use crate::forge::RemoteRepository;

/// Execution context shared by command handlers.
#[derive(Debug)]
pub struct Context {
    /// Loaded configuration
    pub config: Config,
    /// Print results as JSON
    pub json: bool,
}

impl Context {
    /// Build the GitHub client from configuration.
    ///
    /// # Errors
    ///
    /// Fails if the token variable is unset or the client cannot be built.
    pub fn remote(&self) -> Result<Arc<dyn RemoteRepository>> {
        let token = self.config.token()?;
        let client = GitHubClient::new(token, self.config.api_base(), self.config.timeout())
            .context("failed to create GitHub client")?;
        Ok(Arc::new(client))
    }

    /// Branch name generator honoring the configured bounds.
    pub fn names(&self) -> Arc<dyn NameGenerator> {
        Arc::new(
            RandomNameGenerator::new()
                .max_length(self.config.branch_max_length())
                .suffix_len(self.config.branch_suffix_len()),
        )
    }

    /// The branch prefix to use: the flag if given, else the configured default.
    pub fn branch_prefix(&self, target: &TargetArgs) -> Option<String> {
        target
            .branch_prefix
            .clone()
            .or_else(|| self.config.default_prefix().map(str::to_string))
            .filter(|prefix| !prefix.is_empty())
    }
}

/// Dispatch a parsed command to its handler.
pub fn dispatch(command: Command, ctx: &Context) -> Result<()> {
    match command {
        Command::Update {
            target,
            file,
            set,
            from_file,
            title,
            body,
        } => {
            let args = update::UpdateArgs {
                target,
                file,
                set,
                from_file,
                title,
                body,
            };
            block_on(update(ctx, args))
        }
        Command::Publish { target, files } => block_on(publish(ctx, target, files)),
        Command::Completion { shell } => completion(shell),
    }
}

fn block_on<F: std::future::Future<Output = Result<()>>>(future: F) -> Result<()> {
    let rt = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
    rt.block_on(future)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{BranchConfig, FileConfig};

    fn target(prefix: Option<&str>) -> TargetArgs {
        TargetArgs {
            repo: "o/r".into(),
            branch: "main".into(),
            branch_prefix: prefix.map(str::to_string),
            message: "m".into(),
        }
    }

    fn ctx_with_default(prefix: Option<&str>) -> Context {
        let mut config = Config::default();
        config.file = FileConfig {
            branch: Some(BranchConfig {
                default_prefix: prefix.map(str::to_string),
                ..Default::default()
            }),
            ..Default::default()
        };
        Context {
            config,
            json: false,
        }
    }

    #[test]
    fn flag_overrides_configured_prefix() {
        let ctx = ctx_with_default(Some("cfg-"));
        assert_eq!(ctx.branch_prefix(&target(Some("flag-"))), Some("flag-".into()));
        assert_eq!(ctx.branch_prefix(&target(None)), Some("cfg-".into()));
    }

    #[test]
    fn empty_flag_disables_configured_prefix() {
        let ctx = ctx_with_default(Some("cfg-"));
        assert_eq!(ctx.branch_prefix(&target(Some(""))), None);
    }

    #[test]
    fn no_prefix_anywhere() {
        let ctx = ctx_with_default(None);
        assert_eq!(ctx.branch_prefix(&target(None)), None);
    }

    #[test]
    fn names_respect_configured_suffix() {
        let mut ctx = ctx_with_default(None);
        ctx.config.file.branch = Some(BranchConfig {
            suffix_len: Some(8),
            ..Default::default()
        });
        assert_eq!(ctx.names().prefixed_name("x-").len(), 10);
    }
}
