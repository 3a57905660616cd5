//! Build description: context directory, Dockerfile and the frontend options derived from them

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

use crate::error::{Error, Result};
use crate::vcs::VcsInfo;

/// Frontend that turns a Dockerfile into the engine's build graph
pub const DOCKERFILE_FRONTEND: &str = "dockerfile.v0";

/// Local mount name of the build context
pub const CONTEXT_MOUNT: &str = "context";

/// Local mount name of the directory holding the Dockerfile
pub const DOCKERFILE_MOUNT: &str = "dockerfile";

/// Image resolution restricted to the local cache: no registry access and no
/// tag to digest resolution
pub const IMAGE_RESOLVE_MODE_LOCAL: &str = "local";

/// Build configuration
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Path to the context directory
    pub context_path: PathBuf,
    /// Path to the Dockerfile (relative to the context, or absolute inside it)
    pub dockerfile_path: PathBuf,
}

impl BuildConfig {
    /// Create a new build configuration for a local context using `Dockerfile`
    pub fn local(context_path: impl Into<PathBuf>) -> Self {
        Self {
            context_path: context_path.into(),
            dockerfile_path: PathBuf::from("Dockerfile"),
        }
    }

    /// Set Dockerfile path
    pub fn dockerfile(mut self, path: impl Into<PathBuf>) -> Self {
        self.dockerfile_path = path.into();
        self
    }

    /// Dockerfile path relative to the context root, `/`-separated
    pub fn relative_dockerfile(&self) -> Result<String> {
        let relative = if self.dockerfile_path.is_absolute() {
            match self.dockerfile_path.strip_prefix(&self.context_path) {
                Ok(rel) => rel.to_path_buf(),
                Err(_) => {
                    let context = std::fs::canonicalize(&self.context_path)?;
                    let dockerfile = std::fs::canonicalize(&self.dockerfile_path)?;
                    dockerfile
                        .strip_prefix(&context)
                        .map(Path::to_path_buf)
                        .map_err(|_| {
                            Error::InvalidContext(format!(
                                "Dockerfile {} is outside the build context {}",
                                self.dockerfile_path.display(),
                                self.context_path.display()
                            ))
                        })?
                }
            }
        } else {
            self.dockerfile_path.clone()
        };

        let normalized = slash_path(&relative)?;
        if normalized.is_empty() || normalized == "." {
            return Err(Error::InvalidContext(format!(
                "Dockerfile path {} does not name a file",
                self.dockerfile_path.display()
            )));
        }
        Ok(normalized)
    }

    /// Local mounts for the frontend, each relative to the context root
    pub fn local_mounts(&self) -> Result<HashMap<String, String>> {
        let dockerfile = self.relative_dockerfile()?;
        let dockerfile_dir = match dockerfile.rsplit_once('/') {
            Some((dir, _)) => dir.to_string(),
            None => ".".to_string(),
        };

        let mut mounts = HashMap::new();
        mounts.insert(CONTEXT_MOUNT.to_string(), ".".to_string());
        mounts.insert(DOCKERFILE_MOUNT.to_string(), dockerfile_dir);
        Ok(mounts)
    }

    /// Frontend options for the gateway solve
    pub fn frontend_options(&self, vcs: &VcsInfo) -> Result<HashMap<String, String>> {
        let mut opts = HashMap::new();
        opts.insert("filename".to_string(), self.relative_dockerfile()?);
        opts.insert(
            "image-resolve-mode".to_string(),
            IMAGE_RESOLVE_MODE_LOCAL.to_string(),
        );
        opts.insert("vcs:revision".to_string(), vcs.revision.clone());
        opts.insert("vcs:source".to_string(), vcs.source.clone());
        for (name, path) in self.local_mounts()? {
            opts.insert(format!("local-mount:{name}"), path);
        }
        Ok(opts)
    }

    /// Check that the context is an existing directory
    pub fn validate(&self) -> Result<()> {
        if !self.context_path.exists() {
            return Err(Error::InvalidContext(format!(
                "Context path does not exist: {}",
                self.context_path.display()
            )));
        }
        if !self.context_path.is_dir() {
            return Err(Error::InvalidContext(format!(
                "Context path is not a directory: {}",
                self.context_path.display()
            )));
        }
        Ok(())
    }
}

/// Render a relative path with `/` separators, resolving `.` and `..` lexically
fn slash_path(path: &Path) -> Result<String> {
    let mut parts: Vec<String> = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
            Component::CurDir => {}
            Component::ParentDir => {
                if parts.pop().is_none() {
                    return Err(Error::InvalidContext(format!(
                        "Dockerfile path {} escapes the build context",
                        path.display()
                    )));
                }
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(Error::InvalidContext(format!(
                    "expected a relative path, got {}",
                    path.display()
                )))
            }
        }
    }
    if parts.is_empty() {
        return Ok(".".to_string());
    }
    Ok(parts.join("/"))
}
