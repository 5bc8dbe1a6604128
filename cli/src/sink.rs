use std::fs;
use std::path::{Path, PathBuf};

use brine_cddl_compiler::{error::CddlError, ArtifactSink, Artifacts};
use tracing::debug;

/// Writes artifacts below a directory, creating it and any missing parents.
pub struct DirectorySink {
    root: PathBuf,
}

impl DirectorySink {
    pub fn new(root: impl Into<PathBuf>) -> DirectorySink {
        DirectorySink { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ArtifactSink for DirectorySink {
    fn commit(&mut self, artifacts: &Artifacts) -> Result<(), CddlError> {
        for artifact in &artifacts.files {
            let path = artifact.path.split('/').fold(self.root.clone(), |path, part| path.join(part));
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&path, &artifact.contents)?;
            debug!(path = %path.display(), bytes = artifact.contents.len(), "wrote artifact");
        }
        Ok(())
    }
}
