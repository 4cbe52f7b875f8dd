//! WASM engine wrapper for compiling simulation modules

use anyhow::{Context, Result, bail};
use wasmtime::{Engine, ExternType, Module};

/// Shared WASM engine (one per loader)
pub struct WasmEngine {
    engine: Engine,
}

impl WasmEngine {
    /// Create a new WASM engine with default configuration
    pub fn new() -> Result<Self> {
        let engine = Engine::default();
        Ok(Self { engine })
    }

    /// Get a reference to the underlying wasmtime engine
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Compile a module and check it exports linear memory
    pub fn load_module(&self, bytes: &[u8]) -> Result<Module> {
        let module = Module::new(&self.engine, bytes).context("Failed to compile WASM module")?;
        Self::validate_exports(&module)?;
        Ok(module)
    }

    /// The host stages the arena in guest memory, so `memory` is mandatory.
    /// Entry points are optional.
    pub fn validate_exports(module: &Module) -> Result<()> {
        let has_memory = module
            .exports()
            .any(|export| export.name() == "memory" && matches!(export.ty(), ExternType::Memory(_)));
        if !has_memory {
            bail!("Module does not export linear memory as 'memory'");
        }
        Ok(())
    }
}
