//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! # Global Flags
//!
//! These flags are available on all commands:
//! - `--help` / `-h`: Show help
//! - `--version`: Show version
//! - `--debug`: Enable debug logging
//! - `--config <path>`: Use this config file instead of the default locations
//! - `--json`: Print results as JSON

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// repobump - Publish file updates to remote Git repositories
#[derive(Parser, Debug)]
#[command(name = "repobump")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Config file to use instead of the default locations
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Parser::parse()
    }
}

/// Options shared by every command that writes to a repository.
#[derive(Args, Debug, Clone)]
pub struct TargetArgs {
    /// Repository full name, e.g. my-org/my-repo
    #[arg(long, value_name = "OWNER/REPO")]
    pub repo: String,

    /// Branch to read from and propose onto
    #[arg(long, default_value = "main")]
    pub branch: String,

    /// Publish on a new branch named from this prefix. An empty value
    /// writes directly to --branch. Defaults to branch.default_prefix.
    #[arg(long, value_name = "PREFIX")]
    pub branch_prefix: Option<String>,

    /// Commit message
    #[arg(short, long)]
    pub message: String,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Update one file and optionally open a pull request
    #[command(after_help = "\
EXAMPLES:
    # Bump an image tag on a new branch and open a pull request
    repobump update --repo my-org/deploy --file env/prod.yaml \\
        --set image.tag=v1.2.3 --branch-prefix update-image- -m 'Bump image'

    # Replace a file directly on main
    repobump update --repo my-org/deploy --file VERSION --from-file ./VERSION \\
        --branch-prefix '' -m 'Release'")]
    Update {
        #[command(flatten)]
        target: TargetArgs,

        /// Path of the file within the repository
        #[arg(long, value_name = "PATH")]
        file: String,

        /// Set a dotted YAML key path (repeatable)
        #[arg(
            long = "set",
            value_name = "KEY=VALUE",
            value_parser = parse_key_value,
            required_unless_present = "from_file",
            conflicts_with = "from_file"
        )]
        set: Vec<(String, String)>,

        /// Replace the whole file with this local file
        #[arg(long, value_name = "LOCAL_PATH")]
        from_file: Option<PathBuf>,

        /// Pull request title (defaults to the commit message)
        #[arg(long)]
        title: Option<String>,

        /// Pull request body
        #[arg(long, default_value = "")]
        body: String,
    },

    /// Publish several files as a single commit
    #[command(after_help = "\
EXAMPLES:
    # Update two manifests atomically on a new branch
    repobump publish --repo my-org/deploy --branch-prefix sync- -m 'Sync' \\
        apps/a.yaml=./out/a.yaml apps/b.yaml=./out/b.yaml")]
    Publish {
        #[command(flatten)]
        target: TargetArgs,

        /// Files to publish
        #[arg(value_name = "REPO_PATH=LOCAL_PATH", value_parser = parse_file_mapping)]
        files: Vec<(String, PathBuf)>,
    },

    /// Generate shell completion scripts
    Completion {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Supported shells for completion.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{}'", s)),
    }
}

fn parse_file_mapping(s: &str) -> Result<(String, PathBuf), String> {
    match s.split_once('=') {
        Some((repo_path, local)) if !repo_path.is_empty() && !local.is_empty() => {
            Ok((repo_path.trim_start_matches('/').to_string(), PathBuf::from(local)))
        }
        _ => Err(format!("expected REPO_PATH=LOCAL_PATH, got '{}'", s)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn key_value_splits_on_first_equals() {
        assert_eq!(
            parse_key_value("image.tag=a=b").unwrap(),
            ("image.tag".to_string(), "a=b".to_string())
        );
        assert_eq!(
            parse_key_value("image.tag=").unwrap(),
            ("image.tag".to_string(), String::new())
        );
        assert!(parse_key_value("=v").is_err());
        assert!(parse_key_value("novalue").is_err());
    }

    #[test]
    fn file_mapping_strips_leading_slash() {
        assert_eq!(
            parse_file_mapping("/apps/a.yaml=./a.yaml").unwrap(),
            ("apps/a.yaml".to_string(), PathBuf::from("./a.yaml"))
        );
        assert!(parse_file_mapping("apps/a.yaml").is_err());
        assert!(parse_file_mapping("apps/a.yaml=").is_err());
    }

    #[test]
    fn update_requires_a_transform() {
        let result = Cli::try_parse_from([
            "repobump", "update", "--repo", "o/r", "--file", "f", "-m", "msg",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn update_parses_sets() {
        let cli = Cli::try_parse_from([
            "repobump",
            "update",
            "--repo",
            "o/r",
            "--file",
            "values.yaml",
            "-m",
            "bump",
            "--set",
            "image.tag=v2",
            "--set",
            "replicas=3",
        ])
        .unwrap();

        match cli.command {
            Command::Update { target, set, .. } => {
                assert_eq!(target.branch, "main");
                assert!(target.branch_prefix.is_none());
                assert_eq!(set.len(), 2);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
