use crate::model::EdgeEnd;
use std::process::ExitStatus;
use thiserror::Error;

/// The analysis facts could not be turned into a graph. Nothing partial is
/// returned.
#[derive(Error, Debug)]
pub enum InputError {
    #[error("no file produced a usable symbol")]
    NoUsableSymbols,
    #[error("failed to access {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid snapshot: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("analysis failed: {0}")]
    Analysis(String),
}

/// A graph could not be turned into a document or image. The graph itself
/// stays valid.
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("duplicate table id {0}")]
    DuplicateTable(u32),
    #[error("edge {from} -> {to} references a missing node")]
    DanglingEdge { from: EdgeEnd, to: EdgeEnd },
    #[error("cluster {cluster} references missing table {table}")]
    DanglingMember { cluster: String, table: u32 },
    #[error("failed to start layout engine `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("layout engine I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("layout engine exited with {status}: {stderr}")]
    LayoutFailed { status: ExitStatus, stderr: String },
    #[error("layout engine produced no output")]
    EmptyOutput,
}

#[derive(Error, Debug)]
pub enum DiagramError {
    #[error(transparent)]
    Input(#[from] InputError),
    #[error(transparent)]
    Render(#[from] RenderError),
}

pub type Result<T, E = DiagramError> = std::result::Result<T, E>;
