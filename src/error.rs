//! Typed failures of a single run.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RunError {
    #[error("failed to write script to {}", path.display())]
    ScriptWrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to open capture file {}", path.display())]
    OutputFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to launch `{program}`")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to wait for run #{run_id}")]
    Wait {
        run_id: u64,
        #[source]
        source: io::Error,
    },
}

impl RunError {
    /// One-line reason including the underlying OS error, for the status line.
    pub fn reason(&self) -> String {
        let source = match self {
            RunError::ScriptWrite { source, .. }
            | RunError::OutputFile { source, .. }
            | RunError::Spawn { source, .. }
            | RunError::Wait { source, .. } => source,
        };
        format!("{self}: {source}")
    }
}
