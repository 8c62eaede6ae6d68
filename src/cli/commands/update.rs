//! cli::commands::update
//!
//! Update one file, optionally on a new branch with a pull request.
//!
//! # Example
//!
//! ```bash
//! repobump update --repo my-org/deploy --file env/prod.yaml \
//!     --set image.tag=v1.2.3 --branch-prefix update-image- -m "Bump image"
//! ```

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use serde::Serialize;

use super::Context;
use crate::cli::args::TargetArgs;
use crate::updater::transform::{self, ContentUpdater, TransformError};
use crate::updater::{CommitInput, Updater};

/// Arguments of the `update` command.
#[derive(Debug)]
pub struct UpdateArgs {
    pub target: TargetArgs,
    pub file: String,
    pub set: Vec<(String, String)>,
    pub from_file: Option<PathBuf>,
    pub title: Option<String>,
    pub body: String,
}

#[derive(Serialize)]
struct UpdateReport<'a> {
    repo: &'a str,
    file: &'a str,
    branch: &'a str,
    pull_request: Option<PullRequestReport<'a>>,
}

#[derive(Serialize)]
struct PullRequestReport<'a> {
    number: u64,
    url: &'a str,
}

/// Run the update workflow.
pub async fn update(ctx: &Context, args: UpdateArgs) -> Result<()> {
    let mut input = CommitInput::new(
        &args.target.repo,
        &args.target.branch,
        &args.file,
        &args.target.message,
    )
    .pull_request(args.title.clone().unwrap_or_default(), args.body.clone());
    if let Some(prefix) = ctx.branch_prefix(&args.target) {
        input = input.branch_generate_name(prefix);
    }

    let transform = build_transform(&args)?;
    let updater = Updater::new(ctx.remote()?).with_name_generator(ctx.names());

    let outcome = updater
        .apply_update_to_file(&input, transform.as_ref())
        .await
        .with_context(|| format!("failed to update {} in {}", args.file, args.target.repo))?;

    if ctx.json {
        let report = UpdateReport {
            repo: &args.target.repo,
            file: &args.file,
            branch: &outcome.branch,
            pull_request: outcome.pull_request.as_ref().map(|pr| PullRequestReport {
                number: pr.number,
                url: &pr.url,
            }),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Updated {} on {}", args.file, outcome.branch);
        if let Some(pr) = &outcome.pull_request {
            println!("Opened pull request #{}: {}", pr.number, pr.url);
        }
    }
    Ok(())
}

/// Turn `--from-file` or the `--set` pairs into a single transform.
fn build_transform(args: &UpdateArgs) -> Result<Box<dyn ContentUpdater>> {
    if let Some(path) = &args.from_file {
        let body =
            std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
        return Ok(Box::new(transform::replace_contents(body)));
    }

    let steps: Vec<Box<dyn ContentUpdater>> = args
        .set
        .iter()
        .map(|(key, value)| -> Box<dyn ContentUpdater> {
            Box::new(transform::update_yaml(key.clone(), value.clone()))
        })
        .collect();

    Ok(Box::new(move |current: &[u8]| -> Result<Vec<u8>, TransformError> {
        steps
            .iter()
            .try_fold(current.to_vec(), |body, step| step.update(&body))
    }))
}
