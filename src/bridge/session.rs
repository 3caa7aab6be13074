//! Single-flight execution against the engine.
//!
//! # State machine
//!
//! ```text
//! Idle -> Marshaling -> Running -> Completed -> Idle
//! ```
//!
//! The transition out of `Idle` is a compare-and-swap: a request arriving
//! while any other state is current is rejected with [`BridgeError::Busy`]
//! and touches nothing. The completion callback runs while the state is
//! still `Completed`, so an `execute` issued from inside it is rejected too.

use super::marshal::ArgumentMarshaler;
use super::output::OutputCollector;
use super::request::{ExecutionOutput, ExecutionRequest, RequestKind};
use super::vfs::{VirtualFilesystem, WriteMode};
use crate::config::{AppConfig, FilesystemSettings};
use crate::engine::{EngineContext, EngineModule, Termination};
use crate::error::BridgeError;
use crate::types::Track;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionState {
    Idle = 0,
    Marshaling = 1,
    Running = 2,
    Completed = 3,
}

impl SessionState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => SessionState::Marshaling,
            2 => SessionState::Running,
            3 => SessionState::Completed,
            _ => SessionState::Idle,
        }
    }
}

/// Counters over the life of a session
#[derive(Debug, Clone, Default, Serialize)]
pub struct SessionStats {
    pub invocations: u64,
    pub successes: u64,
    /// Nonzero exit codes
    pub failures: u64,
    pub parse_errors: u64,
    pub faults: u64,
    pub busy_rejections: u64,
    pub last_exit_code: Option<i32>,
    pub last_elapsed: Option<Duration>,
    pub last_run: Option<DateTime<Utc>>,
}

impl SessionStats {
    /// Fraction of invocations that exited with code 0
    pub fn success_rate(&self) -> f64 {
        if self.invocations == 0 {
            0.0
        } else {
            self.successes as f64 / self.invocations as f64
        }
    }
}

struct SessionInner {
    context: EngineContext,
    collector: OutputCollector,
    stats: SessionStats,
}

/// Returns the session to `Idle` however `execute_with` is left
struct IdleOnDrop<'a>(&'a AtomicU8);

impl Drop for IdleOnDrop<'_> {
    fn drop(&mut self) {
        self.0.store(SessionState::Idle as u8, Ordering::Release);
    }
}

pub struct ExecutionSession {
    state: AtomicU8,
    busy_rejections: AtomicU64,
    inner: Mutex<SessionInner>,
    vfs: VirtualFilesystem,
    program_name: String,
    filesystem: FilesystemSettings,
}

impl ExecutionSession {
    pub fn new(
        context: EngineContext,
        vfs: VirtualFilesystem,
        program_name: impl Into<String>,
        filesystem: FilesystemSettings,
    ) -> Self {
        Self {
            state: AtomicU8::new(SessionState::Idle as u8),
            busy_rejections: AtomicU64::new(0),
            inner: Mutex::new(SessionInner {
                context,
                collector: OutputCollector::new(),
                stats: SessionStats::default(),
            }),
            vfs,
            program_name: program_name.into(),
            filesystem,
        }
    }

    /// Mount the configured filesystem and take the engine context.
    ///
    /// `host_root` overrides the configured root directory.
    pub fn open(
        module: Box<dyn EngineModule>,
        config: &AppConfig,
        host_root: Option<std::path::PathBuf>,
    ) -> Result<Self, BridgeError> {
        let root = host_root
            .or_else(|| config.filesystem.resolved_root())
            .ok_or_else(|| {
                BridgeError::Filesystem(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "no data directory for the engine filesystem",
                ))
            })?;
        let vfs = VirtualFilesystem::new(root, config.filesystem.guest_root.clone());
        vfs.mount()?;
        let context = EngineContext::new(module)?;
        Ok(Self::new(
            context,
            vfs,
            config.engine.program_name.clone(),
            config.filesystem.clone(),
        ))
    }

    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn filesystem(&self) -> &VirtualFilesystem {
        &self.vfs
    }

    pub fn program_name(&self) -> &str {
        &self.program_name
    }

    pub fn input_slot(&self) -> &str {
        &self.filesystem.input_slot
    }

    pub fn output_slot(&self) -> &str {
        &self.filesystem.output_slot
    }

    fn lock_inner(&self) -> MutexGuard<'_, SessionInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: SessionState) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// Run one request.
    ///
    /// Rejections that happen before the engine ran (busy, marshaling,
    /// missing mount, engine faults) are returned and `on_done` is never
    /// called. Otherwise `on_done` receives the output for exit code 0, or
    /// [`BridgeError::EngineFailure`] / [`BridgeError::Parse`].
    pub fn execute_with<F>(&self, request: ExecutionRequest, on_done: F) -> Result<(), BridgeError>
    where
        F: FnOnce(Result<ExecutionOutput, BridgeError>),
    {
        if self
            .state
            .compare_exchange(
                SessionState::Idle as u8,
                SessionState::Marshaling as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_err()
        {
            tracing::debug!("Rejected request while {:?}", self.state());
            self.busy_rejections.fetch_add(1, Ordering::Relaxed);
            return Err(BridgeError::Busy);
        }
        let _idle = IdleOnDrop(&self.state);

        let span = tracing::info_span!("execute", argc = request.args.len() + 1);
        let _enter = span.enter();

        let mut inner = self.lock_inner();
        let result = self.run(&mut inner, &request);
        drop(inner);
        on_done(result?);
        Ok(())
    }

    /// Run one request and wait for its result
    pub fn execute(&self, request: ExecutionRequest) -> Result<ExecutionOutput, BridgeError> {
        let mut delivered = None;
        self.execute_with(request, |result| delivered = Some(result))?;
        delivered.unwrap_or_else(|| Err(BridgeError::EngineFault("no completion delivered".into())))
    }

    /// Stage `bytes` in the input slot and inspect them
    pub fn inspect(&self, bytes: &[u8]) -> Result<Vec<Track>, BridgeError> {
        self.stage_input(bytes)?;
        let output = self.execute(ExecutionRequest::inspect(self.filesystem.input_slot.clone()))?;
        into_tracks(output)
    }

    /// Write `bytes` to the input slot. Only allowed while idle.
    pub fn stage_input(&self, bytes: &[u8]) -> Result<(), BridgeError> {
        if self.state() != SessionState::Idle {
            return Err(BridgeError::Busy);
        }
        self.vfs
            .write_file(&self.filesystem.input_slot, bytes, WriteMode::default())
    }

    pub fn read_output(&self, path: &str) -> Result<Vec<u8>, BridgeError> {
        self.vfs.read_file(path)
    }

    pub fn stats(&self) -> SessionStats {
        let mut stats = self.lock_inner().stats.clone();
        stats.busy_rejections = self.busy_rejections.load(Ordering::Relaxed);
        stats
    }

    /// Tear the session down and hand the engine context back
    pub fn into_context(self) -> EngineContext {
        self.inner
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
            .context
    }

    /// Outer error: rejected or faulted before completion. Inner: completion.
    fn run(
        &self,
        inner: &mut SessionInner,
        request: &ExecutionRequest,
    ) -> Result<Result<ExecutionOutput, BridgeError>, BridgeError> {
        if request.kind != RequestKind::Raw && !self.vfs.is_mounted() {
            return Err(BridgeError::NotMounted);
        }

        let SessionInner {
            context,
            collector,
            stats,
        } = inner;
        collector.begin();
        let module = context.module();
        module.begin_invocation()?;

        tracing::debug!("argv: {} {:?}", self.program_name, request.args);
        let started = Instant::now();
        let mut frame = ArgumentMarshaler::marshal(module, &self.program_name, &request.args)?;
        let argv = frame.argv();
        self.set_state(SessionState::Running);
        stats.invocations += 1;
        let termination = frame.call_main(argv.argc, argv.ptr);
        drop(frame);
        let elapsed = started.elapsed();
        stats.last_elapsed = Some(elapsed);
        stats.last_run = Some(Utc::now());

        let termination = match termination {
            Ok(t) => t,
            Err(fault) => {
                tracing::error!("Engine faulted after {:?}: {}", elapsed, fault);
                stats.faults += 1;
                let output = module.take_output();
                collector.push_output(&output);
                return Err(fault.into());
            }
        };

        let completion = module.take_completion();
        let code = completion.unwrap_or_else(|| termination.code());
        if let Termination::Halted(halt) = termination {
            tracing::debug!("Engine halted with {}", halt);
        }
        collector.push_output(&module.take_output());
        self.set_state(SessionState::Completed);
        stats.last_exit_code = Some(code);
        tracing::info!("Engine exited with code {} in {:?}", code, elapsed);

        if code != 0 {
            stats.failures += 1;
            return Ok(Err(BridgeError::EngineFailure { code }));
        }
        stats.successes += 1;

        let output = match &request.kind {
            RequestKind::Inspect => match collector.finish() {
                Ok(tracks) => Ok(ExecutionOutput::Tracks { tracks }),
                Err(e) => {
                    tracing::warn!("Inspection output unusable: {}", e);
                    stats.parse_errors += 1;
                    Err(BridgeError::Parse(e))
                }
            },
            RequestKind::Process { output_path } => {
                self.vfs
                    .read_file(output_path)
                    .map(|bytes| ExecutionOutput::Processed {
                        output_path: output_path.clone(),
                        bytes,
                        log: collector.take_lines(),
                    })
            }
            RequestKind::Raw => Ok(ExecutionOutput::Log {
                lines: collector.take_lines(),
                diagnostics: collector.diagnostics().to_vec(),
                transcript: collector.transcript().to_string(),
            }),
        };
        Ok(output)
    }
}

/// Tracks of an inspection. Any other output kind is a bridge bug.
fn into_tracks(output: ExecutionOutput) -> Result<Vec<Track>, BridgeError> {
    match output {
        ExecutionOutput::Tracks { tracks } => Ok(tracks),
        other => Err(BridgeError::EngineFault(format!(
            "inspection produced {} output instead of tracks",
            other.kind_name()
        ))),
    }
}

impl std::fmt::Debug for ExecutionSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionSession")
            .field("state", &self.state())
            .field("program_name", &self.program_name)
            .field("vfs", &self.vfs)
            .finish_non_exhaustive()
    }
}
