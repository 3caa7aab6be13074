//! Engine worker thread.
//!
//! Owns the [`ExecutionSession`] and runs one command at a time, so the
//! engine is only ever touched from this thread. Every command produces
//! exactly one reply; nothing is dropped silently.

use super::{EditorBridge, EngineCommand, EngineMessage, RequestId};
use crate::bridge::{ExecutionOutput, ExecutionRequest, ExecutionSession};
use crate::error::BridgeError;
use crossbeam_channel::{Receiver, Sender, TryRecvError};
use std::thread::JoinHandle;

pub struct EngineWorker {
    session: ExecutionSession,
    command_rx: Receiver<EngineCommand>,
    message_tx: Sender<EngineMessage>,
    running: bool,
}

impl EngineWorker {
    pub fn new(
        session: ExecutionSession,
        command_rx: Receiver<EngineCommand>,
        message_tx: Sender<EngineMessage>,
    ) -> Self {
        Self {
            session,
            command_rx,
            message_tx,
            running: true,
        }
    }

    /// Start a worker thread for `session`.
    ///
    /// Joining the handle returns the session once the worker stops.
    pub fn spawn(session: ExecutionSession) -> std::io::Result<(EditorBridge, JoinHandle<ExecutionSession>)> {
        let (bridge, cmd_rx, msg_tx) = EditorBridge::new();
        let worker = Self::new(session, cmd_rx, msg_tx);
        let handle = std::thread::Builder::new()
            .name("engine-worker".into())
            .spawn(move || worker.run())?;
        Ok((bridge, handle))
    }

    /// Run until shutdown or until the editor side goes away
    pub fn run(mut self) -> ExecutionSession {
        tracing::info!("Engine worker started");

        while self.running {
            match self.command_rx.recv() {
                Ok(cmd) => self.handle_command(cmd),
                Err(_) => self.running = false,
            }
        }

        let _ = self.message_tx.send(EngineMessage::Shutdown);
        tracing::info!("Engine worker stopped");
        self.session
    }

    /// Handle every queued command without blocking
    pub fn process_commands(&mut self) {
        loop {
            match self.command_rx.try_recv() {
                Ok(cmd) => self.handle_command(cmd),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.running = false;
                    break;
                }
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    fn handle_command(&mut self, cmd: EngineCommand) {
        match cmd {
            EngineCommand::Inspect { request_id, bytes } => {
                if let Err(e) = self.session.stage_input(&bytes) {
                    self.reply(rejection(request_id, e));
                    return;
                }
                let request = ExecutionRequest::inspect(self.session.input_slot());
                self.execute(request_id, request);
            }
            EngineCommand::Run { request_id, plan } => {
                tracing::debug!(
                    "Running plan with {} filters",
                    plan.filter_order.len()
                );
                self.execute(request_id, plan.into_request());
            }
            EngineCommand::Execute {
                request_id,
                request,
            } => {
                self.execute(request_id, request);
            }
            EngineCommand::Stats => {
                self.reply(EngineMessage::Stats(self.session.stats()));
            }
            EngineCommand::Shutdown => {
                self.running = false;
            }
        }
    }

    fn execute(&mut self, request_id: RequestId, request: ExecutionRequest) {
        let mut reply = None;
        let outcome = self.session.execute_with(request, |result| {
            reply = Some(match result {
                Ok(output) => completion(request_id, output),
                Err(e) => failure(request_id, e),
            });
        });
        match (outcome, reply) {
            (Err(e), _) => self.reply(rejection(request_id, e)),
            (Ok(()), Some(msg)) => self.reply(msg),
            (Ok(()), None) => self.reply(EngineMessage::Rejected {
                request_id,
                reason: "no completion delivered".into(),
            }),
        }
    }

    fn reply(&self, msg: EngineMessage) {
        if self.message_tx.send(msg).is_err() {
            tracing::warn!("Editor side closed; dropping reply");
        }
    }
}

fn completion(request_id: RequestId, output: ExecutionOutput) -> EngineMessage {
    match output {
        ExecutionOutput::Tracks { tracks } => EngineMessage::TracksReady { request_id, tracks },
        ExecutionOutput::Processed {
            output_path,
            bytes,
            log,
        } => EngineMessage::RunComplete {
            request_id,
            output_path,
            bytes,
            log,
        },
        ExecutionOutput::Log {
            lines, diagnostics, ..
        } => EngineMessage::LogReady {
            request_id,
            lines,
            diagnostics,
        },
    }
}

fn failure(request_id: RequestId, error: BridgeError) -> EngineMessage {
    match error {
        BridgeError::EngineFailure { code } => EngineMessage::ExecutionFailed { request_id, code },
        other => EngineMessage::ResultUnavailable {
            request_id,
            reason: other.to_string(),
        },
    }
}

fn rejection(request_id: RequestId, error: BridgeError) -> EngineMessage {
    tracing::warn!("Request {} rejected: {}", request_id, error);
    EngineMessage::Rejected {
        request_id,
        reason: error.to_string(),
    }
}
