//! Commit resolution through `git ls-remote`.

use crate::task::{
    domain::{BranchName, CommitId},
    ports::{CommitResolutionError, CommitResolver},
};
use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

/// Resolves branches by asking the remote repository directly.
#[derive(Debug, Clone)]
pub struct GitCommitResolver {
    clone_url: String,
    git_program: String,
}

impl GitCommitResolver {
    /// Creates a resolver for the repository at `clone_url` using the `git`
    /// found on `PATH`.
    #[must_use]
    pub fn new(clone_url: impl Into<String>) -> Self {
        Self {
            clone_url: clone_url.into(),
            git_program: "git".to_owned(),
        }
    }

    /// Uses a specific `git` executable.
    #[must_use]
    pub fn with_git_program(mut self, program: impl Into<String>) -> Self {
        self.git_program = program.into();
        self
    }
}

#[async_trait]
impl CommitResolver for GitCommitResolver {
    async fn resolve(&self, branch: &BranchName) -> Result<CommitId, CommitResolutionError> {
        let output = Command::new(&self.git_program)
            .arg("ls-remote")
            .arg(&self.clone_url)
            .arg(branch.as_str())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(CommitResolutionError::lookup)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CommitResolutionError::lookup(std::io::Error::other(
                stderr.trim().to_owned(),
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let commit = parse_ls_remote(&stdout, branch)?;
        debug!(branch = %branch, commit = %commit, "branch resolved");
        Ok(commit)
    }
}

/// Suffix `git ls-remote` adds to the entry naming the commit an annotated
/// tag points at.
const PEELED_SUFFIX: &str = "^{}";

/// Picks the commit for `branch` out of `git ls-remote` output.
///
/// Each line is `<hash>\t<ref>`. An exact `refs/heads/<branch>` match wins,
/// then `refs/tags/<branch>`, then the first listed ref. When the chosen ref
/// also has a peeled `<ref>^{}` line, that line's hash is the commit;
/// otherwise an annotated tag would resolve to the tag object.
pub(crate) fn parse_ls_remote(
    output: &str,
    branch: &BranchName,
) -> Result<CommitId, CommitResolutionError> {
    let head_ref = format!("refs/heads/{branch}");
    let tag_ref = format!("refs/tags/{branch}");
    let refs: Vec<(&str, &str)> = output
        .lines()
        .filter_map(|line| line.split_once('\t'))
        .map(|(hash, name)| (hash.trim(), name.trim()))
        .collect();

    let (hash, name) = refs
        .iter()
        .find(|(_, name)| *name == head_ref)
        .or_else(|| refs.iter().find(|(_, name)| *name == tag_ref))
        .or_else(|| refs.iter().find(|(_, name)| !name.ends_with(PEELED_SUFFIX)))
        .or_else(|| refs.first())
        .copied()
        .ok_or_else(|| CommitResolutionError::BranchNotFound(branch.clone()))?;

    let peeled_ref = format!("{name}{PEELED_SUFFIX}");
    let chosen = refs
        .iter()
        .find(|(_, candidate)| *candidate == peeled_ref)
        .map_or(hash, |(peeled, _)| *peeled);

    CommitId::new(chosen).map_err(|_| CommitResolutionError::InvalidOutput(chosen.to_owned()))
}
