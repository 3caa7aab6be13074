//! What a session is asked to run, and what it hands back.

use crate::types::Track;
use serde::Serialize;

/// How the result of an invocation is interpreted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestKind {
    /// `inspect:xml` run; output parses into tracks
    Inspect,
    /// Filter chain writing to `output_path` in the virtual filesystem
    Process { output_path: String },
    /// Anything else; captured lines are returned as-is
    Raw,
}

/// One engine invocation. Consumed by [`ExecutionSession`](super::ExecutionSession).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionRequest {
    /// Arguments after the program name
    pub args: Vec<String>,
    pub kind: RequestKind,
}

impl ExecutionRequest {
    /// `-i <input_path> inspect:xml`
    pub fn inspect(input_path: impl Into<String>) -> Self {
        Self {
            args: vec!["-i".to_string(), input_path.into(), "inspect:xml".to_string()],
            kind: RequestKind::Inspect,
        }
    }

    pub fn process(args: Vec<String>, output_path: impl Into<String>) -> Self {
        Self {
            args,
            kind: RequestKind::Process {
                output_path: output_path.into(),
            },
        }
    }

    pub fn raw<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            args: args.into_iter().map(Into::into).collect(),
            kind: RequestKind::Raw,
        }
    }
}

/// Result of an invocation that exited with code 0.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExecutionOutput {
    Tracks { tracks: Vec<Track> },
    Processed {
        output_path: String,
        bytes: Vec<u8>,
        log: Vec<String>,
    },
    Log {
        lines: Vec<String>,
        diagnostics: Vec<String>,
        /// Untrimmed printed text, for callers that parse layout
        transcript: String,
    },
}

impl ExecutionOutput {
    /// Variant name, matching the serialized `kind` tag
    pub fn kind_name(&self) -> &'static str {
        match self {
            ExecutionOutput::Tracks { .. } => "tracks",
            ExecutionOutput::Processed { .. } => "processed",
            ExecutionOutput::Log { .. } => "log",
        }
    }

    pub fn tracks(&self) -> Option<&[Track]> {
        match self {
            ExecutionOutput::Tracks { tracks } => Some(tracks),
            _ => None,
        }
    }

    /// Captured print lines, if the output kept them
    pub fn log(&self) -> &[String] {
        match self {
            ExecutionOutput::Tracks { .. } => &[],
            ExecutionOutput::Processed { log, .. } => log,
            ExecutionOutput::Log { lines, .. } => lines,
        }
    }
}
