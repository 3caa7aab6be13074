//! Backend thread hosting the engine.
//!
//! The engine is single-threaded, so it lives on one dedicated thread that
//! owns the [`ExecutionSession`](crate::bridge::ExecutionSession). The editor
//! talks to it over crossbeam channels:
//!
//! - [`EngineCommand`] - Messages sent from the editor to the worker
//! - [`EngineMessage`] - Messages sent from the worker back to the editor
//! - [`EditorBridge`] - Editor-side handle for sending commands and draining messages
//! - [`EngineWorker`] - Worker loop that runs commands one at a time
//!
//! # Example
//!
//! ```ignore
//! use filterflow_rs::backend::{EngineMessage, EngineWorker};
//!
//! let (bridge, worker) = EngineWorker::spawn(session)?;
//! bridge.inspect(1, std::fs::read("clip.mp4")?);
//!
//! for msg in bridge.drain() {
//!     if let EngineMessage::TracksReady { tracks, .. } = msg {
//!         // Add one handle per track to the source node
//!     }
//! }
//! ```

pub mod worker;

pub use worker::EngineWorker;

use crate::bridge::{ExecutionRequest, SessionStats};
use crate::graph::CompiledPlan;
use crate::types::Track;
use crossbeam_channel::{bounded, Receiver, Sender};

/// Caller-chosen tag echoed back in the reply
pub type RequestId = u64;

/// Channel capacity for commands (editor → worker).
const CMD_CHANNEL_CAPACITY: usize = 64;
/// Channel capacity for messages (worker → editor).
const MSG_CHANNEL_CAPACITY: usize = 256;

/// Message sent from the editor to the worker
#[derive(Debug, Clone)]
pub enum EngineCommand {
    /// Stage media in the input slot and inspect it
    Inspect { request_id: RequestId, bytes: Vec<u8> },
    /// Run a compiled filter graph
    Run {
        request_id: RequestId,
        plan: CompiledPlan,
    },
    /// Run an arbitrary request
    Execute {
        request_id: RequestId,
        request: ExecutionRequest,
    },
    /// Request current statistics
    Stats,
    /// Stop the worker
    Shutdown,
}

/// Message sent from the worker to the editor
#[derive(Debug, Clone)]
pub enum EngineMessage {
    /// Inspection finished; one entry per discovered stream
    TracksReady {
        request_id: RequestId,
        tracks: Vec<Track>,
    },
    /// Processing run finished and its output was read back
    RunComplete {
        request_id: RequestId,
        output_path: String,
        bytes: Vec<u8>,
        log: Vec<String>,
    },
    /// Raw request finished
    LogReady {
        request_id: RequestId,
        lines: Vec<String>,
        diagnostics: Vec<String>,
    },
    /// The engine exited with a nonzero code
    ExecutionFailed { request_id: RequestId, code: i32 },
    /// The engine succeeded but its output could not be used
    ResultUnavailable {
        request_id: RequestId,
        reason: String,
    },
    /// The request never ran (busy, marshaling, filesystem, fault)
    Rejected {
        request_id: RequestId,
        reason: String,
    },
    Stats(SessionStats),
    /// Worker is shutting down
    Shutdown,
}

impl EngineMessage {
    pub fn request_id(&self) -> Option<RequestId> {
        match self {
            EngineMessage::TracksReady { request_id, .. }
            | EngineMessage::RunComplete { request_id, .. }
            | EngineMessage::LogReady { request_id, .. }
            | EngineMessage::ExecutionFailed { request_id, .. }
            | EngineMessage::ResultUnavailable { request_id, .. }
            | EngineMessage::Rejected { request_id, .. } => Some(*request_id),
            EngineMessage::Stats(_) | EngineMessage::Shutdown => None,
        }
    }
}

/// Editor-side handle for communicating with the engine worker.
pub struct EditorBridge {
    pub cmd_tx: Sender<EngineCommand>,
    pub msg_rx: Receiver<EngineMessage>,
}

impl EditorBridge {
    /// Create a new bridge pair: `(bridge_for_editor, cmd_rx, msg_tx)`.
    ///
    /// The worker thread owns `cmd_rx` and `msg_tx`.
    pub fn new() -> (Self, Receiver<EngineCommand>, Sender<EngineMessage>) {
        let (cmd_tx, cmd_rx) = bounded(CMD_CHANNEL_CAPACITY);
        let (msg_tx, msg_rx) = bounded(MSG_CHANNEL_CAPACITY);
        (Self { cmd_tx, msg_rx }, cmd_rx, msg_tx)
    }

    /// Drain all pending messages.
    pub fn drain(&self) -> Vec<EngineMessage> {
        let mut msgs = Vec::new();
        while let Ok(msg) = self.msg_rx.try_recv() {
            msgs.push(msg);
        }
        msgs
    }

    /// Try to receive a single message without blocking.
    pub fn try_recv(&self) -> Option<EngineMessage> {
        self.msg_rx.try_recv().ok()
    }

    /// Block until the next message arrives
    pub fn recv(&self) -> Option<EngineMessage> {
        self.msg_rx.recv().ok()
    }

    pub fn send_command(&self, cmd: EngineCommand) -> bool {
        self.cmd_tx.send(cmd).is_ok()
    }

    pub fn inspect(&self, request_id: RequestId, bytes: Vec<u8>) {
        let _ = self
            .cmd_tx
            .send(EngineCommand::Inspect { request_id, bytes });
    }

    pub fn run(&self, request_id: RequestId, plan: CompiledPlan) {
        let _ = self.cmd_tx.send(EngineCommand::Run { request_id, plan });
    }

    pub fn execute(&self, request_id: RequestId, request: ExecutionRequest) {
        let _ = self
            .cmd_tx
            .send(EngineCommand::Execute { request_id, request });
    }

    pub fn request_stats(&self) {
        let _ = self.cmd_tx.send(EngineCommand::Stats);
    }

    pub fn shutdown(&self) {
        let _ = self.cmd_tx.send(EngineCommand::Shutdown);
    }
}
