//! Browser spawner backed by the JS microtask queue.

use futures_util::task::{LocalFutureObj, LocalSpawn, SpawnError};

/// Spawns sequencer tasks with `wasm_bindgen_futures::spawn_local`.
#[derive(Debug, Clone, Copy, Default)]
pub struct WasmSpawner;

impl LocalSpawn for WasmSpawner {
    fn spawn_local_obj(&self, future: LocalFutureObj<'static, ()>) -> Result<(), SpawnError> {
        wasm_bindgen_futures::spawn_local(future);
        Ok(())
    }
}
