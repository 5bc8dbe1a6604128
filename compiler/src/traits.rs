use crate::{compiler::Artifacts, error::CddlError};

/// Destination of a generation run. `commit` receives the complete set of
/// artifacts once every backend has succeeded, so an implementation never
/// sees a partial run.
pub trait ArtifactSink {
    fn commit(&mut self, artifacts: &Artifacts) -> Result<(), CddlError>;
}

/// Keeps committed artifacts in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub committed: Option<Artifacts>,
}

impl ArtifactSink for MemorySink {
    fn commit(&mut self, artifacts: &Artifacts) -> Result<(), CddlError> {
        self.committed = Some(artifacts.clone());
        Ok(())
    }
}
