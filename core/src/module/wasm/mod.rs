//! WASM simulation modules loaded from a file that the build keeps rewriting
//!
//! The file is read fully into memory before compiling, so it is never held
//! open and the build can replace it at any time.

mod engine;
mod instance;
#[cfg(test)]
mod tests;

pub use engine::WasmEngine;
pub use instance::WasmSimulation;

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use super::{ModuleHandle, ModuleLoader, Simulation};

/// Loads a `.wasm` file and reloads it when its modification time moves forward
pub struct WasmModuleLoader {
    engine: WasmEngine,
    path: PathBuf,
    /// Source timestamp of the last failed load, so each broken build is tried once
    last_failure: Option<Option<SystemTime>>,
}

impl WasmModuleLoader {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        Ok(Self {
            engine: WasmEngine::new()?,
            path: path.into(),
            last_failure: None,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Modification time of the file on disk, if it exists
    pub fn source_time(&self) -> Option<SystemTime> {
        std::fs::metadata(&self.path)
            .and_then(|meta| meta.modified())
            .ok()
    }

    fn try_load(&self) -> Result<WasmSimulation> {
        let bytes = std::fs::read(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        let module = self.engine.load_module(&bytes)?;
        WasmSimulation::new(&self.engine, &module)
    }
}

impl ModuleLoader for WasmModuleLoader {
    fn load(&mut self) -> ModuleHandle {
        // Taken before reading so a write during the read triggers another reload
        let source_time = self.source_time();

        match self.try_load() {
            Ok(simulation) => {
                info!(
                    "Loaded simulation module {} ({:?})",
                    self.path.display(),
                    simulation.entry_points()
                );
                self.last_failure = None;
                ModuleHandle::new(Box::new(simulation), source_time)
            }
            Err(e) => {
                if self.last_failure == Some(source_time) {
                    debug!("Simulation module still failing: {:#}", e);
                } else {
                    warn!(
                        "Failed to load simulation module {}: {:#}",
                        self.path.display(),
                        e
                    );
                    self.last_failure = Some(source_time);
                }
                ModuleHandle::absent()
            }
        }
    }

    fn should_reload(&self, handle: &ModuleHandle) -> bool {
        let on_disk = self.source_time();
        // A build that already failed is not recompiled until it is rewritten
        if self.last_failure == Some(on_disk) {
            return false;
        }
        match (on_disk, handle.source_time()) {
            (Some(on_disk), Some(loaded)) => on_disk > loaded,
            (Some(_), None) => true,
            (None, _) => false,
        }
    }

    fn unload(&mut self, handle: ModuleHandle) {
        debug!("Unloading simulation module {}", self.path.display());
        drop(handle);
    }
}
