//! cli::commands::publish
//!
//! Publish local files as one commit.

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use serde::Serialize;

use super::Context;
use crate::cli::args::TargetArgs;
use crate::core::types::{Files, RepoReference};
use crate::uploader::{PublishInput, Uploader};

#[derive(Serialize)]
struct PublishReport<'a> {
    repo: &'a str,
    branch: Option<&'a str>,
    commit: Option<&'a str>,
    files: usize,
}

/// Run the publish workflow.
pub async fn publish(
    ctx: &Context,
    target: TargetArgs,
    mappings: Vec<(String, PathBuf)>,
) -> Result<()> {
    let source = RepoReference::parse(&target.repo, target.branch.as_str())?;
    let files = read_files(&mappings)?;

    let mut input = PublishInput::new(source, target.message.as_str());
    if let Some(prefix) = ctx.branch_prefix(&target) {
        input = input.branch_generate_name(prefix);
    }

    let uploader = Uploader::new(ctx.remote()?).with_name_generator(ctx.names());
    let count = files.len();
    let outcome = uploader
        .publish_files(&input, files)
        .await
        .with_context(|| format!("failed to publish to {}", input.source))?;

    if ctx.json {
        let report = PublishReport {
            repo: &target.repo,
            branch: outcome.as_ref().map(|o| o.branch.branch.as_str()),
            commit: outcome.as_ref().map(|o| o.commit.as_str()),
            files: count,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        match &outcome {
            Some(outcome) => println!(
                "Published {} file(s) to {} at {}",
                count, outcome.branch, outcome.commit
            ),
            None => println!("No files to publish"),
        }
    }
    Ok(())
}

/// Read each local file; a repository path given twice keeps the last one.
fn read_files(mappings: &[(String, PathBuf)]) -> Result<Files> {
    let mut files = Files::new();
    for (repo_path, local) in mappings {
        let body =
            std::fs::read(local).with_context(|| format!("failed to read {}", local.display()))?;
        files.insert(repo_path.clone(), body);
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_all_mappings() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.yaml");
        let b = dir.path().join("b.yaml");
        std::fs::write(&a, "a: 1\n").unwrap();
        std::fs::write(&b, "b: 1\n").unwrap();

        let files = read_files(&[
            ("apps/a.yaml".to_string(), a),
            ("apps/b.yaml".to_string(), b),
        ])
        .unwrap();

        assert_eq!(files.len(), 2);
        assert_eq!(files["apps/a.yaml"], b"a: 1\n");
    }

    #[test]
    fn later_mapping_wins() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("first");
        let second = dir.path().join("second");
        std::fs::write(&first, "1").unwrap();
        std::fs::write(&second, "2").unwrap();

        let files = read_files(&[("x".to_string(), first), ("x".to_string(), second)]).unwrap();
        assert_eq!(files["x"], b"2");
    }

    #[test]
    fn missing_file_names_path() {
        let err = read_files(&[("x".to_string(), PathBuf::from("/nonexistent/file"))])
            .unwrap_err();
        assert!(format!("{:#}", err).contains("/nonexistent/file"));
    }
}
