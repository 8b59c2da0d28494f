//! CI and git metadata attached to a trigger.
//!
//! Detected from the environment of the CI provider running the command.
//! Outside a recognised provider no metadata is sent.

use synthetics_protocol::{CiMetadata, CiPipeline, CiProvider, GitCommit, GitMetadata, Metadata};

/// Maximum length (in characters) of the commit message sent to the backend
pub const GIT_COMMIT_MESSAGE_MAX_LENGTH: usize = 500;

fn truncate_chars(value: String, max: usize) -> String {
    match value.char_indices().nth(max) {
        Some((index, _)) => value[..index].to_string(),
        None => value,
    }
}

fn branch_from_ref(git_ref: &str) -> String {
    git_ref
        .strip_prefix("refs/heads/")
        .unwrap_or(git_ref)
        .to_string()
}

fn github<F>(lookup: &F) -> Option<Metadata>
where
    F: Fn(&str) -> Option<String>,
{
    if lookup("GITHUB_ACTIONS").as_deref() != Some("true") {
        return None;
    }

    let server = lookup("GITHUB_SERVER_URL").unwrap_or_else(|| "https://github.com".to_string());
    let repository = lookup("GITHUB_REPOSITORY");
    let run_id = lookup("GITHUB_RUN_ID");

    let pipeline_url = match (&repository, &run_id) {
        (Some(repository), Some(run_id)) => Some(format!(
            "{}/{}/actions/runs/{}",
            server, repository, run_id
        )),
        _ => None,
    };
    let branch = lookup("GITHUB_HEAD_REF")
        .filter(|b| !b.is_empty())
        .or_else(|| lookup("GITHUB_REF").map(|r| branch_from_ref(&r)));

    Some(Metadata {
        ci: CiMetadata {
            pipeline: CiPipeline {
                id: run_id,
                url: pipeline_url,
            },
            provider: CiProvider {
                name: "github".to_string(),
            },
        },
        git: GitMetadata {
            branch,
            commit: GitCommit {
                sha: lookup("GITHUB_SHA"),
                message: None,
            },
            repository_url: repository.map(|r| format!("{}/{}.git", server, r)),
        },
    })
}

fn gitlab<F>(lookup: &F) -> Option<Metadata>
where
    F: Fn(&str) -> Option<String>,
{
    lookup("GITLAB_CI")?;

    Some(Metadata {
        ci: CiMetadata {
            pipeline: CiPipeline {
                id: lookup("CI_PIPELINE_ID"),
                url: lookup("CI_PIPELINE_URL"),
            },
            provider: CiProvider {
                name: "gitlab".to_string(),
            },
        },
        git: GitMetadata {
            branch: lookup("CI_COMMIT_BRANCH").or_else(|| lookup("CI_COMMIT_REF_NAME")),
            commit: GitCommit {
                sha: lookup("CI_COMMIT_SHA"),
                message: lookup("CI_COMMIT_MESSAGE"),
            },
            repository_url: lookup("CI_REPOSITORY_URL"),
        },
    })
}

/// Metadata of the CI provider described by `lookup`, if any
pub fn get_ci_metadata<F>(lookup: F) -> Option<Metadata>
where
    F: Fn(&str) -> Option<String>,
{
    let mut metadata = github(&lookup).or_else(|| gitlab(&lookup))?;

    metadata.git.commit.message = metadata
        .git
        .commit
        .message
        .take()
        .map(|m| truncate_chars(m, GIT_COMMIT_MESSAGE_MAX_LENGTH));

    Some(metadata)
}

/// Metadata detected from the process environment
pub fn ci_metadata_from_env() -> Option<Metadata> {
    get_ci_metadata(|name| std::env::var(name).ok())
}
