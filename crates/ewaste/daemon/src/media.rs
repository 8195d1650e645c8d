//! Filesystem-backed photo store

use async_trait::async_trait;
use ewaste_workflow::{MediaError, MediaStore};
use std::path::{Component, Path, PathBuf};

/// Photos stored as files beneath one root directory.
///
/// Item photo references are paths relative to the root; a leading `/` is
/// tolerated. References that would escape the root are refused.
#[derive(Debug, Clone)]
pub struct LocalMediaStore {
    root: PathBuf,
}

impl LocalMediaStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, reference: &str) -> Result<PathBuf, MediaError> {
        let relative = Path::new(reference.trim().trim_start_matches('/'));
        if relative.as_os_str().is_empty() {
            return Err(MediaError::InvalidReference(reference.to_string()));
        }
        for component in relative.components() {
            match component {
                Component::Normal(_) | Component::CurDir => {}
                _ => return Err(MediaError::InvalidReference(reference.to_string())),
            }
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl MediaStore for LocalMediaStore {
    async fn remove(&self, reference: &str) -> Result<(), MediaError> {
        let path = self.resolve(reference)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                tracing::debug!(path = %path.display(), "photo removed");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(MediaError::Io(format!("{}: {e}", path.display()))),
        }
    }
}
