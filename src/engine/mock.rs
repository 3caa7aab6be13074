//! In-memory engine for tests and development without a compiled module.
//!
//! Emulates the parts of the real engine the bridge depends on: a linear
//! memory with a downward-growing, 16-byte aligned stack, argv decoding,
//! a completion hook, halt signals, and captured output. What the "program"
//! does is supplied as a script closure.

use super::{EngineFault, EngineModule, EngineOutput, Termination};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

/// Default linear memory size (1 MiB)
const DEFAULT_MEMORY_SIZE: usize = 1024 * 1024;

/// Default stack size (64 KiB)
const DEFAULT_STACK_SIZE: u32 = 64 * 1024;

const STACK_ALIGN: u32 = 16;

/// How a scripted invocation ends
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockExit {
    /// `main` returns normally
    Return(i32),
    /// The engine raises its halt signal
    Halt(i32),
    /// Unexpected trap
    Fault(String),
}

/// What a script can do while "running"
pub struct MockIo<'a> {
    stdout: &'a mut Vec<u8>,
    stderr: &'a mut Vec<u8>,
    completion: &'a mut Option<i32>,
    fs: Option<(&'a Path, &'a str)>,
}

impl MockIo<'_> {
    /// Print one line on the output channel
    pub fn print(&mut self, line: &str) {
        self.stdout.extend_from_slice(line.as_bytes());
        self.stdout.push(b'\n');
    }

    /// Print one line on the error channel
    pub fn eprint(&mut self, line: &str) {
        self.stderr.extend_from_slice(line.as_bytes());
        self.stderr.push(b'\n');
    }

    /// Fire the completion hook
    pub fn done(&mut self, code: i32) {
        *self.completion = Some(code);
    }

    fn host_path(&self, guest: &str) -> std::io::Result<PathBuf> {
        let (root, guest_root) = self.fs.ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotFound, "no filesystem attached")
        })?;
        let relative = guest
            .strip_prefix(guest_root)
            .unwrap_or(guest)
            .trim_start_matches('/');
        Ok(root.join(relative))
    }

    pub fn read_file(&self, guest: &str) -> std::io::Result<Vec<u8>> {
        std::fs::read(self.host_path(guest)?)
    }

    pub fn write_file(&self, guest: &str, bytes: &[u8]) -> std::io::Result<()> {
        std::fs::write(self.host_path(guest)?, bytes)
    }
}

type Script = Box<dyn FnMut(&[String], &mut MockIo<'_>) -> MockExit + Send>;

/// Observable engine state
#[derive(Debug, Clone, Default)]
pub struct MockState {
    /// Decoded argv of every invocation, program name included
    pub invocations: Vec<Vec<String>>,
    pub stack_pointer: u32,
    pub stack_top: u32,
    pub restores: usize,
    /// Lowest stack pointer ever reached
    pub low_water: u32,
}

/// Shared view of a [`MockEngine`]'s state, usable after the engine moved
#[derive(Debug, Clone)]
pub struct MockHandle(Arc<Mutex<MockState>>);

impl MockHandle {
    fn with<R>(&self, f: impl FnOnce(&mut MockState) -> R) -> R {
        let mut state = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut state)
    }

    pub fn invocations(&self) -> Vec<Vec<String>> {
        self.with(|s| s.invocations.clone())
    }

    pub fn last_args(&self) -> Option<Vec<String>> {
        self.with(|s| s.invocations.last().cloned())
    }

    pub fn invocation_count(&self) -> usize {
        self.with(|s| s.invocations.len())
    }

    pub fn stack_pointer(&self) -> u32 {
        self.with(|s| s.stack_pointer)
    }

    /// Whether the stack is back at its initial position
    pub fn stack_balanced(&self) -> bool {
        self.with(|s| s.stack_pointer == s.stack_top)
    }

    pub fn restore_count(&self) -> usize {
        self.with(|s| s.restores)
    }

    pub fn low_water(&self) -> u32 {
        self.with(|s| s.low_water)
    }
}

pub struct MockEngine {
    memory: Vec<u8>,
    stack_top: u32,
    stack_end: u32,
    sp: u32,
    completion: Option<i32>,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
    fs_root: Option<(PathBuf, String)>,
    script: Script,
    handle: MockHandle,
}

impl MockEngine {
    /// Engine whose program completes with code 0 and prints nothing
    pub fn new() -> Self {
        Self::with_script(|_, io| {
            io.done(0);
            MockExit::Return(0)
        })
    }

    pub fn with_script<F>(script: F) -> Self
    where
        F: FnMut(&[String], &mut MockIo<'_>) -> MockExit + Send + 'static,
    {
        let stack_top = DEFAULT_MEMORY_SIZE as u32;
        let handle = MockHandle(Arc::new(Mutex::new(MockState {
            stack_pointer: stack_top,
            stack_top,
            low_water: stack_top,
            ..Default::default()
        })));
        Self {
            memory: vec![0; DEFAULT_MEMORY_SIZE],
            stack_top,
            stack_end: stack_top - DEFAULT_STACK_SIZE,
            sp: stack_top,
            completion: None,
            stdout: Vec::new(),
            stderr: Vec::new(),
            fs_root: None,
            script: Box::new(script),
            handle,
        }
    }

    /// Engine that answers `inspect:xml` with one `PIDConfigure` per track.
    ///
    /// Each track is a list of attributes, emitted in order. Other
    /// invocations complete with code 0 and no output.
    pub fn inspector(tracks: Vec<Vec<(&'static str, &'static str)>>) -> Self {
        Self::with_script(move |args, io| {
            if args.iter().any(|a| a == "inspect:xml") {
                io.print("<?xml version=\"1.0\" encoding=\"UTF-8\" ?>");
                io.print("<GPACInspect>");
                for attrs in &tracks {
                    let rendered: Vec<String> = attrs
                        .iter()
                        .map(|(k, v)| format!("{}=\"{}\"", k, v))
                        .collect();
                    io.print(&format!("  <PIDConfigure {}/>", rendered.join(" ")));
                }
                io.print("</GPACInspect>");
            }
            io.done(0);
            MockExit::Halt(0)
        })
    }

    /// Limit the stack (scratch region) size
    pub fn with_stack_size(mut self, size: u32) -> Self {
        self.stack_end = self.stack_top.saturating_sub(size);
        self
    }

    /// Give scripts file access: `guest_root` maps onto the host `root`
    pub fn with_filesystem(mut self, root: impl Into<PathBuf>, guest_root: &str) -> Self {
        self.fs_root = Some((root.into(), guest_root.to_string()));
        self
    }

    pub fn handle(&self) -> MockHandle {
        self.handle.clone()
    }

    fn sync_handle(&self) {
        let sp = self.sp;
        self.handle.with(|s| {
            s.stack_pointer = sp;
            s.low_water = s.low_water.min(sp);
        });
    }

    fn check_range(&self, addr: u32, len: usize) -> Result<std::ops::Range<usize>, EngineFault> {
        let start = addr as usize;
        let end = start
            .checked_add(len)
            .filter(|&end| end <= self.memory.len())
            .ok_or_else(|| EngineFault::new(format!("memory access out of bounds at {:#x}", addr)))?;
        Ok(start..end)
    }

    fn read_u32(&self, addr: u32) -> Result<u32, EngineFault> {
        let range = self.check_range(addr, 4)?;
        let mut word = [0u8; 4];
        word.copy_from_slice(&self.memory[range]);
        Ok(u32::from_le_bytes(word))
    }

    fn read_cstr(&self, addr: u32) -> Result<String, EngineFault> {
        let start = self.check_range(addr, 0)?.start;
        let len = self.memory[start..]
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| EngineFault::new("unterminated string"))?;
        Ok(String::from_utf8_lossy(&self.memory[start..start + len]).into_owned())
    }

    fn decode_argv(&self, argc: i32, argv: u32) -> Result<Vec<String>, EngineFault> {
        let mut args = Vec::with_capacity(argc.max(0) as usize);
        for i in 0..argc.max(0) as u32 {
            let ptr = self.read_u32(argv + i * 4)?;
            args.push(self.read_cstr(ptr)?);
        }
        if self.read_u32(argv + argc.max(0) as u32 * 4)? != 0 {
            return Err(EngineFault::new("argv is not null-terminated"));
        }
        Ok(args)
    }
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineModule for MockEngine {
    fn begin_invocation(&mut self) -> Result<(), EngineFault> {
        self.completion = None;
        self.stdout.clear();
        self.stderr.clear();
        Ok(())
    }

    fn stack_save(&mut self) -> Result<u32, EngineFault> {
        Ok(self.sp)
    }

    fn stack_alloc(&mut self, size: u32) -> Result<u32, EngineFault> {
        let sp = self
            .sp
            .checked_sub(size)
            .map(|sp| sp & !(STACK_ALIGN - 1))
            .filter(|&sp| sp >= self.stack_end)
            .ok_or_else(|| EngineFault::new("stack overflow"))?;
        self.sp = sp;
        self.sync_handle();
        Ok(sp)
    }

    fn stack_restore(&mut self, mark: u32) -> Result<(), EngineFault> {
        if mark < self.stack_end || mark > self.stack_top {
            return Err(EngineFault::new(format!("invalid stack mark {:#x}", mark)));
        }
        self.sp = mark;
        self.sync_handle();
        self.handle.with(|s| s.restores += 1);
        Ok(())
    }

    fn scratch_available(&mut self) -> Result<usize, EngineFault> {
        Ok((self.sp - self.stack_end) as usize)
    }

    fn write_memory(&mut self, addr: u32, bytes: &[u8]) -> Result<(), EngineFault> {
        let range = self.check_range(addr, bytes.len())?;
        self.memory[range].copy_from_slice(bytes);
        Ok(())
    }

    fn read_memory(&mut self, addr: u32, len: u32) -> Result<Vec<u8>, EngineFault> {
        let range = self.check_range(addr, len as usize)?;
        Ok(self.memory[range].to_vec())
    }

    fn call_main(&mut self, argc: i32, argv: u32) -> Result<Termination, EngineFault> {
        let args = self.decode_argv(argc, argv)?;
        self.handle.with(|s| s.invocations.push(args.clone()));

        let mut io = MockIo {
            stdout: &mut self.stdout,
            stderr: &mut self.stderr,
            completion: &mut self.completion,
            fs: self
                .fs_root
                .as_ref()
                .map(|(root, guest)| (root.as_path(), guest.as_str())),
        };
        match (self.script)(&args, &mut io) {
            MockExit::Return(code) => Ok(Termination::Returned(code)),
            MockExit::Halt(code) => Ok(Termination::Halted(code)),
            MockExit::Fault(message) => Err(EngineFault(message)),
        }
    }

    fn take_completion(&mut self) -> Option<i32> {
        self.completion.take()
    }

    fn take_output(&mut self) -> EngineOutput {
        EngineOutput {
            stdout: std::mem::take(&mut self.stdout),
            stderr: std::mem::take(&mut self.stderr),
        }
    }
}
