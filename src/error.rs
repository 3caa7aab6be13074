//! Error handling for FilterFlow-RS
//!
//! Each layer has its own error enum (`BridgeError`, `ParseError`,
//! `ValidationError`, `CompileError`, `CatalogError`). `FilterFlowError`
//! wraps all of them for callers that cross layers, such as the CLI.

use crate::graph::NodeId;
use thiserror::Error;

/// Errors surfaced by the execution bridge.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// Another invocation is in flight
    #[error("Engine is busy with another invocation")]
    Busy,

    /// Encoded arguments do not fit the scratch region
    #[error("Argument encoding needs {required} bytes but only {available} are available")]
    MarshalOverflow { required: usize, available: usize },

    /// An argument cannot be encoded as a C string
    #[error("Argument {index} contains an interior NUL byte")]
    InvalidArgument { index: usize },

    /// The engine terminated with a nonzero exit code
    #[error("Engine exited with code {code}")]
    EngineFailure { code: i32 },

    /// The engine succeeded but its diagnostic output was unusable
    #[error("Result unavailable: {0}")]
    Parse(#[from] ParseError),

    /// Unexpected trap or host failure while talking to the engine
    #[error("Engine fault: {0}")]
    EngineFault(String),

    /// A second engine context was requested while one is live
    #[error("An engine context is already live in this process")]
    ContextAlreadyLive,

    /// The virtual filesystem has not been mounted yet
    #[error("Virtual filesystem is not mounted")]
    NotMounted,

    /// A guest path escapes the mounted root
    #[error("Path '{0}' is outside the mounted root")]
    PathOutsideRoot(String),

    /// Unrecognized file open mode
    #[error("Unknown write mode '{0}'")]
    InvalidMode(String),

    /// Host filesystem failure
    #[error("Filesystem error: {0}")]
    Filesystem(#[from] std::io::Error),
}

impl From<crate::engine::EngineFault> for BridgeError {
    fn from(fault: crate::engine::EngineFault) -> Self {
        BridgeError::EngineFault(fault.0)
    }
}

/// Errors raised while turning diagnostic text into tracks.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("No diagnostic output was produced")]
    Empty,

    #[error("Malformed diagnostic output: {0}")]
    Malformed(String),

    #[error("Entry {index} is missing the '{attribute}' attribute")]
    MissingAttribute { index: usize, attribute: &'static str },

    #[error("Entry {index} has an invalid PID '{value}'")]
    InvalidPid { index: usize, value: String },

    #[error("PID {0} appears more than once")]
    DuplicatePid(u32),
}

/// Reasons a proposed edge is rejected at edit time.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Node {0} does not exist")]
    UnknownNode(NodeId),

    #[error("Node {0} cannot connect to itself")]
    SelfLoop(NodeId),

    #[error("An identical edge already exists")]
    DuplicateEdge,

    #[error("Incompatible connection: {0}")]
    Incompatible(String),

    #[error("Unsupported topology: {0}")]
    Unsupported(String),
}

/// Failures while linearizing a graph into engine arguments.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    #[error("Cycle detected among filters {nodes:?}")]
    Cycle { nodes: Vec<NodeId> },

    #[error("Graph has no media input")]
    NoInput,

    #[error("Edge references missing node {0}")]
    DanglingEdge(NodeId),
}

/// Errors loading or building the filter catalog.
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Catalog JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Filter '{filter}' option '{option}' has unknown type '{type_name}'")]
    UnknownOptionType {
        filter: String,
        option: String,
        type_name: String,
    },

    #[error("Filter '{0}' is listed more than once")]
    DuplicateFilter(String),

    #[error("Filter '{filter}' has no option '{option}'")]
    UnknownOption { filter: String, option: String },

    #[error("Invalid value for option '{option}': {message}")]
    InvalidValue { option: String, message: String },

    #[error("Unexpected help output: {0}")]
    HelpFormat(String),
}

/// Main error type for FilterFlow-RS operations
#[derive(Error, Debug)]
pub enum FilterFlowError {
    #[error(transparent)]
    Bridge(#[from] BridgeError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// Errors related to configuration loading/saving
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<FilterFlowError>,
    },
}

impl FilterFlowError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        FilterFlowError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }
}

/// Result type alias for FilterFlow-RS operations
pub type Result<T> = std::result::Result<T, FilterFlowError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<FilterFlowError>,
{
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.into().with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.into().with_context(f()))
    }
}
