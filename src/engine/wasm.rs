//! Engine hosted with Wasmtime.
//!
//! The engine is a WASI (preview1) build of the multimedia tool. It sees the
//! mounted filesystem root as a preopened directory, writes diagnostics to
//! stdout/stderr (captured in memory per invocation), and reports its exit
//! code through an imported completion function. A WASI `proc_exit` is the
//! engine's halt signal.

use super::{EngineFault, EngineModule, EngineOutput, Termination};
use crate::config::EngineSettings;
use std::path::{Path, PathBuf};
use wasmtime::{
    Caller, Config, Engine, Instance, Linker, Memory, Module, Store, StoreLimits,
    StoreLimitsBuilder, TypedFunc, WasmParams, WasmResults,
};
use wasmtime_wasi::pipe::MemoryOutputPipe;
use wasmtime_wasi::preview1::{self, WasiP1Ctx};
use wasmtime_wasi::{DirPerms, FilePerms, I32Exit, WasiCtxBuilder};

/// Bytes per WebAssembly page.
const WASM_PAGE_SIZE: usize = 64 * 1024;

/// Store data visible to host functions.
pub struct HostState {
    wasi: WasiP1Ctx,
    /// Exit code delivered by the completion import
    completion: Option<i32>,
    limits: StoreLimits,
}

/// Everything needed to rebuild the WASI context for an invocation.
#[derive(Debug, Clone)]
struct WasiTemplate {
    host_root: PathBuf,
    guest_root: String,
    program_name: String,
    capture_capacity: usize,
}

impl WasiTemplate {
    fn build(&self) -> Result<(WasiP1Ctx, MemoryOutputPipe, MemoryOutputPipe), EngineFault> {
        let stdout = MemoryOutputPipe::new(self.capture_capacity);
        let stderr = MemoryOutputPipe::new(self.capture_capacity);

        let mut builder = WasiCtxBuilder::new();
        builder
            .args(&[self.program_name.as_str()])
            .stdout(stdout.clone())
            .stderr(stderr.clone())
            .preopened_dir(
                &self.host_root,
                &self.guest_root,
                DirPerms::all(),
                FilePerms::all(),
            )
            .map_err(|e| {
                EngineFault::new(format!(
                    "failed to preopen {} as {}: {}",
                    self.host_root.display(),
                    self.guest_root,
                    e
                ))
            })?;

        Ok((builder.build_p1(), stdout, stderr))
    }
}

pub struct WasmEngine {
    store: Store<HostState>,
    memory: Memory,
    main: TypedFunc<(i32, i32), i32>,
    stack_save: TypedFunc<(), i32>,
    stack_alloc: TypedFunc<i32, i32>,
    stack_restore: TypedFunc<i32, ()>,
    stack_end: Option<TypedFunc<(), i32>>,
    /// Stack pointer right after instantiation
    initial_sp: u32,
    scratch_capacity: u32,
    template: WasiTemplate,
    stdout: MemoryOutputPipe,
    stderr: MemoryOutputPipe,
}

fn fault(context: &str) -> impl Fn(anyhow::Error) -> EngineFault + '_ {
    move |e| EngineFault::new(format!("{}: {:#}", context, e))
}

/// First export among `names` with the expected signature.
fn find_typed<P, R>(
    instance: &Instance,
    store: &mut Store<HostState>,
    names: &[String],
) -> Option<TypedFunc<P, R>>
where
    P: WasmParams,
    R: WasmResults,
{
    names
        .iter()
        .find_map(|name| instance.get_typed_func::<P, R>(&mut *store, name).ok())
}

fn require_typed<P, R>(
    instance: &Instance,
    store: &mut Store<HostState>,
    names: &[String],
) -> Result<TypedFunc<P, R>, EngineFault>
where
    P: WasmParams,
    R: WasmResults,
{
    find_typed(instance, store, names)
        .ok_or_else(|| EngineFault::new(format!("engine exports none of {:?}", names)))
}

impl WasmEngine {
    /// Compile and instantiate the configured module.
    pub fn load(
        settings: &EngineSettings,
        host_root: &Path,
        guest_root: &str,
    ) -> Result<Self, EngineFault> {
        let path = settings
            .module_path
            .as_ref()
            .ok_or_else(|| EngineFault::new("no engine module configured"))?;
        let bytes = std::fs::read(path).map_err(|e| {
            EngineFault::new(format!("failed to read {}: {}", path.display(), e))
        })?;
        tracing::info!("Compiling engine module {} ({} bytes)", path.display(), bytes.len());
        Self::from_bytes(settings, &bytes, host_root, guest_root)
    }

    /// Load on a blocking thread; compilation is the one-time await before first use.
    pub async fn load_async(
        settings: EngineSettings,
        host_root: PathBuf,
        guest_root: String,
    ) -> Result<Self, EngineFault> {
        tokio::task::spawn_blocking(move || Self::load(&settings, &host_root, &guest_root))
            .await
            .map_err(|e| EngineFault::new(format!("engine loader failed: {}", e)))?
    }

    /// Instantiate from module bytes (binary or text format).
    pub fn from_bytes(
        settings: &EngineSettings,
        bytes: &[u8],
        host_root: &Path,
        guest_root: &str,
    ) -> Result<Self, EngineFault> {
        let start_time = std::time::Instant::now();

        let mut config = Config::new();
        config.strategy(wasmtime::Strategy::Cranelift);
        let engine = Engine::new(&config).map_err(fault("engine configuration"))?;
        let module = Module::new(&engine, bytes).map_err(fault("module compilation"))?;

        let template = WasiTemplate {
            host_root: host_root.to_path_buf(),
            guest_root: guest_root.to_string(),
            program_name: settings.program_name.clone(),
            capture_capacity: settings.capture_capacity,
        };
        let (wasi, stdout, stderr) = template.build()?;

        let limits = StoreLimitsBuilder::new()
            .memory_size(settings.max_memory_pages as usize * WASM_PAGE_SIZE)
            .build();
        let mut store = Store::new(
            &engine,
            HostState {
                wasi,
                completion: None,
                limits,
            },
        );
        store.limiter(|state| &mut state.limits);

        let mut linker: Linker<HostState> = Linker::new(&engine);
        preview1::add_to_linker_sync(&mut linker, |state: &mut HostState| &mut state.wasi)
            .map_err(fault("WASI linking"))?;
        linker
            .func_wrap(
                &settings.completion_module,
                &settings.completion_import,
                |mut caller: Caller<'_, HostState>, code: i32| {
                    tracing::debug!("Engine completion hook fired with {}", code);
                    caller.data_mut().completion = Some(code);
                },
            )
            .map_err(fault("completion hook linking"))?;
        linker
            .define_unknown_imports_as_traps(&module)
            .map_err(fault("import stubbing"))?;

        let instance = linker
            .instantiate(&mut store, &module)
            .map_err(fault("instantiation"))?;

        // Reactor-style builds need their constructors run once.
        if let Ok(init) = instance.get_typed_func::<(), ()>(&mut store, "_initialize") {
            init.call(&mut store, ()).map_err(fault("_initialize"))?;
        }

        let memory = instance
            .get_memory(&mut store, "memory")
            .ok_or_else(|| EngineFault::new("engine does not export its memory"))?;
        let main = require_typed(&instance, &mut store, &settings.entry_points)?;
        let stack_save = require_typed(&instance, &mut store, &settings.stack.save)?;
        let stack_alloc = require_typed(&instance, &mut store, &settings.stack.alloc)?;
        let stack_restore = require_typed(&instance, &mut store, &settings.stack.restore)?;
        let stack_end = find_typed(&instance, &mut store, &settings.stack.end);

        let initial_sp = stack_save
            .call(&mut store, ())
            .map_err(fault("stack_save"))? as u32;

        tracing::info!(
            "Engine ready in {} ms (stack at {:#x})",
            start_time.elapsed().as_millis(),
            initial_sp
        );

        Ok(Self {
            store,
            memory,
            main,
            stack_save,
            stack_alloc,
            stack_restore,
            stack_end,
            initial_sp,
            scratch_capacity: settings.scratch_capacity,
            template,
            stdout,
            stderr,
        })
    }
}

impl EngineModule for WasmEngine {
    fn begin_invocation(&mut self) -> Result<(), EngineFault> {
        let (wasi, stdout, stderr) = self.template.build()?;
        let state = self.store.data_mut();
        state.wasi = wasi;
        state.completion = None;
        self.stdout = stdout;
        self.stderr = stderr;
        Ok(())
    }

    fn stack_save(&mut self) -> Result<u32, EngineFault> {
        let sp = self
            .stack_save
            .call(&mut self.store, ())
            .map_err(fault("stack_save"))?;
        Ok(sp as u32)
    }

    fn stack_alloc(&mut self, size: u32) -> Result<u32, EngineFault> {
        let ptr = self
            .stack_alloc
            .call(&mut self.store, size as i32)
            .map_err(fault("stack_alloc"))?;
        Ok(ptr as u32)
    }

    fn stack_restore(&mut self, mark: u32) -> Result<(), EngineFault> {
        self.stack_restore
            .call(&mut self.store, mark as i32)
            .map_err(fault("stack_restore"))
    }

    fn scratch_available(&mut self) -> Result<usize, EngineFault> {
        let sp = self.stack_save()?;
        match &self.stack_end {
            Some(end) => {
                let end = end
                    .call(&mut self.store, ())
                    .map_err(fault("stack_end"))? as u32;
                Ok(sp.saturating_sub(end) as usize)
            }
            None => {
                let used = self.initial_sp.saturating_sub(sp);
                Ok(self.scratch_capacity.saturating_sub(used) as usize)
            }
        }
    }

    fn write_memory(&mut self, addr: u32, bytes: &[u8]) -> Result<(), EngineFault> {
        self.memory
            .write(&mut self.store, addr as usize, bytes)
            .map_err(|e| EngineFault::new(format!("memory write at {:#x}: {}", addr, e)))
    }

    fn read_memory(&mut self, addr: u32, len: u32) -> Result<Vec<u8>, EngineFault> {
        let mut buf = vec![0u8; len as usize];
        self.memory
            .read(&self.store, addr as usize, &mut buf)
            .map_err(|e| EngineFault::new(format!("memory read at {:#x}: {}", addr, e)))?;
        Ok(buf)
    }

    fn call_main(&mut self, argc: i32, argv: u32) -> Result<Termination, EngineFault> {
        match self.main.call(&mut self.store, (argc, argv as i32)) {
            Ok(code) => Ok(Termination::Returned(code)),
            Err(err) => match err.downcast_ref::<I32Exit>() {
                Some(exit) => Ok(Termination::Halted(exit.0)),
                None => Err(EngineFault::new(format!("{:#}", err))),
            },
        }
    }

    fn take_completion(&mut self) -> Option<i32> {
        self.store.data_mut().completion.take()
    }

    fn take_output(&mut self) -> EngineOutput {
        EngineOutput {
            stdout: self.stdout.contents().to_vec(),
            stderr: self.stderr.contents().to_vec(),
        }
    }
}
