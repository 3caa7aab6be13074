//! Settings sections of [`AppConfig`](super::AppConfig)
//!
//! # Main Types
//!
//! - [`EngineSettings`] - Where the engine module lives and which exports drive it
//! - [`FilesystemSettings`] - Host directory backing the engine's filesystem, and the fixed slots
//! - [`LoggingSettings`] - Log filter and optional rolling log file

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Fallback scratch size when the module does not export its stack end (64 KiB)
pub const DEFAULT_SCRATCH_CAPACITY: u32 = 64 * 1024;

/// Per-invocation capture limit for each output stream (16 MiB)
pub const DEFAULT_CAPTURE_CAPACITY: usize = 16 * 1024 * 1024;

/// Default maximum linear memory (64 KiB pages, 1 GiB total)
pub const DEFAULT_MAX_MEMORY_PAGES: u32 = 16 * 1024;

/// Names the engine module exports for driving its stack.
///
/// Older toolchains export `stackSave`/`stackAlloc`/`stackRestore`; newer
/// ones use the `emscripten_stack_*` family. The first export found wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackExports {
    #[serde(default = "default_save_exports")]
    pub save: Vec<String>,
    #[serde(default = "default_alloc_exports")]
    pub alloc: Vec<String>,
    #[serde(default = "default_restore_exports")]
    pub restore: Vec<String>,
    #[serde(default = "default_end_exports")]
    pub end: Vec<String>,
}

fn default_save_exports() -> Vec<String> {
    vec!["stackSave".into(), "emscripten_stack_get_current".into()]
}

fn default_alloc_exports() -> Vec<String> {
    vec!["stackAlloc".into(), "_emscripten_stack_alloc".into()]
}

fn default_restore_exports() -> Vec<String> {
    vec!["stackRestore".into(), "_emscripten_stack_restore".into()]
}

fn default_end_exports() -> Vec<String> {
    vec!["emscripten_stack_get_end".into()]
}

impl Default for StackExports {
    fn default() -> Self {
        Self {
            save: default_save_exports(),
            alloc: default_alloc_exports(),
            restore: default_restore_exports(),
            end: default_end_exports(),
        }
    }
}

/// Engine module settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Compiled engine module (`.wasm`)
    #[serde(default)]
    pub module_path: Option<PathBuf>,

    /// argv[0] prepended to every invocation
    #[serde(default = "default_program_name")]
    pub program_name: String,

    /// Entry point candidates taking `(argc, argv)`
    #[serde(default = "default_entry_points")]
    pub entry_points: Vec<String>,

    #[serde(default)]
    pub stack: StackExports,

    /// Import module of the completion hook
    #[serde(default = "default_completion_module")]
    pub completion_module: String,

    /// Import name of the completion hook
    #[serde(default = "default_completion_import")]
    pub completion_import: String,

    #[serde(default = "default_scratch_capacity")]
    pub scratch_capacity: u32,

    #[serde(default = "default_capture_capacity")]
    pub capture_capacity: usize,

    #[serde(default = "default_max_memory_pages")]
    pub max_memory_pages: u32,
}

fn default_program_name() -> String {
    "gpac".to_string()
}

fn default_entry_points() -> Vec<String> {
    vec!["__main_argc_argv".into(), "main".into()]
}

fn default_completion_module() -> String {
    "env".to_string()
}

fn default_completion_import() -> String {
    "gpac_done".to_string()
}

fn default_scratch_capacity() -> u32 {
    DEFAULT_SCRATCH_CAPACITY
}

fn default_capture_capacity() -> usize {
    DEFAULT_CAPTURE_CAPACITY
}

fn default_max_memory_pages() -> u32 {
    DEFAULT_MAX_MEMORY_PAGES
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            module_path: None,
            program_name: default_program_name(),
            entry_points: default_entry_points(),
            stack: StackExports::default(),
            completion_module: default_completion_module(),
            completion_import: default_completion_import(),
            scratch_capacity: DEFAULT_SCRATCH_CAPACITY,
            capture_capacity: DEFAULT_CAPTURE_CAPACITY,
            max_memory_pages: DEFAULT_MAX_MEMORY_PAGES,
        }
    }
}

/// Virtual filesystem settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilesystemSettings {
    /// Host directory mounted as the engine's root; defaults to `<app data>/fs`
    #[serde(default)]
    pub root_dir: Option<PathBuf>,

    /// Guest path the root is mounted at
    #[serde(default = "default_guest_root")]
    pub guest_root: String,

    /// Fixed input slot for staged media
    #[serde(default = "default_input_slot")]
    pub input_slot: String,

    /// Fixed output slot for processing runs
    #[serde(default = "default_output_slot")]
    pub output_slot: String,
}

fn default_guest_root() -> String {
    "/root".to_string()
}

fn default_input_slot() -> String {
    "/root/video.mp4".to_string()
}

fn default_output_slot() -> String {
    "/root/output.mp4".to_string()
}

impl Default for FilesystemSettings {
    fn default() -> Self {
        Self {
            root_dir: None,
            guest_root: default_guest_root(),
            input_slot: default_input_slot(),
            output_slot: default_output_slot(),
        }
    }
}

impl FilesystemSettings {
    /// Host directory backing the engine root
    pub fn resolved_root(&self) -> Option<PathBuf> {
        self.root_dir
            .clone()
            .or_else(|| super::app_data_dir().map(|p| p.join("fs")))
    }
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Filter used when `RUST_LOG` is unset
    #[serde(default = "default_log_filter")]
    pub filter: String,

    /// Also write a daily rolling log under `<app data>/logs`
    #[serde(default)]
    pub file_logging: bool,
}

fn default_log_filter() -> String {
    "info,filterflow_rs=debug".to_string()
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
            file_logging: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stack_exports_prefer_legacy_names() {
        let exports = StackExports::default();
        assert_eq!(exports.save[0], "stackSave");
        assert_eq!(exports.alloc[0], "stackAlloc");
        assert_eq!(exports.restore[0], "stackRestore");
    }

    #[test]
    fn test_explicit_root_dir_wins() {
        let settings = FilesystemSettings {
            root_dir: Some(PathBuf::from("/tmp/ff")),
            ..Default::default()
        };
        assert_eq!(settings.resolved_root(), Some(PathBuf::from("/tmp/ff")));
    }
}
