//! Best-effort version control metadata for the build context

use std::path::Path;

use tokio::process::Command;

/// Commit and origin of the build context, empty when unknown
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VcsInfo {
    /// Commit hash of `HEAD`
    pub revision: String,
    /// URL of the `origin` remote
    pub source: String,
}

impl VcsInfo {
    /// Query git in `dir`. Never fails: anything git can't tell us stays empty.
    pub async fn detect(dir: &Path) -> Self {
        let revision = git(dir, &["rev-parse", "HEAD"]).await;
        let source = git(dir, &["config", "--get", "remote.origin.url"]).await;
        Self { revision, source }
    }
}

async fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .kill_on_drop(true)
        .output()
        .await;

    match output {
        Ok(out) if out.status.success() => String::from_utf8_lossy(&out.stdout).trim().to_string(),
        Ok(out) => {
            tracing::debug!(
                "git {} failed in {}: {}",
                args.join(" "),
                dir.display(),
                String::from_utf8_lossy(&out.stderr).trim()
            );
            String::new()
        }
        Err(e) => {
            tracing::debug!("git unavailable: {}", e);
            String::new()
        }
    }
}
