//! Process-wide engine lifecycle.
//!
//! At most one [`Engine`] exists at a time. [`Engine::initialize`] fails with
//! [`Error::AlreadyInitialized`] while another is alive; dropping the engine
//! (or calling [`Engine::shutdown`]) tears it down and allows a fresh
//! initialization. Gas media are loaded through a live engine.

use std::env;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::gas::Gas;

/// Environment variable naming the directory relative gas paths resolve in.
pub const GAS_DIR_ENV: &str = "GASDRIFT_GAS_DIR";

static ACTIVE: AtomicBool = AtomicBool::new(false);

#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    pub gas_dir: Option<PathBuf>,
}

impl EngineConfig {
    pub fn from_env() -> Self {
        EngineConfig {
            gas_dir: env::var_os(GAS_DIR_ENV).map(PathBuf::from),
        }
    }

    /// `GASDRIFT_GAS_DIR` if set, otherwise `fallback`.
    pub fn gas_dir_or(fallback: impl Into<PathBuf>) -> PathBuf {
        Self::from_env().gas_dir.unwrap_or_else(|| fallback.into())
    }

    pub fn with_gas_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.gas_dir = Some(dir.into());
        self
    }
}

#[derive(Debug)]
pub struct Engine {
    config: EngineConfig,
    loaded: AtomicUsize,
}

impl Engine {
    pub fn initialize(config: EngineConfig) -> Result<Engine> {
        if ACTIVE
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(Error::AlreadyInitialized);
        }
        match &config.gas_dir {
            Some(dir) => info!("engine initialized, gas dir {:?}", dir),
            None => info!("engine initialized"),
        }
        Ok(Engine {
            config,
            loaded: AtomicUsize::new(0),
        })
    }

    /// Whether an engine is alive in this process.
    pub fn is_active() -> bool {
        ACTIVE.load(Ordering::Acquire)
    }

    /// Resolve a relative gas path against the configured gas directory.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        match &self.config.gas_dir {
            Some(dir) if path.is_relative() => dir.join(path),
            _ => path.to_path_buf(),
        }
    }

    pub fn load_gas(&self, path: impl AsRef<Path>) -> Result<Gas> {
        let path = self.resolve(path.as_ref());
        let gas = Gas::load(&path)?;
        self.loaded.fetch_add(1, Ordering::Relaxed);
        debug!("loaded {gas}");
        Ok(gas)
    }

    /// Number of media loaded through this engine.
    pub fn loaded(&self) -> usize {
        self.loaded.load(Ordering::Relaxed)
    }

    /// Tear the engine down now rather than at end of scope.
    pub fn shutdown(self) {}
}

impl Drop for Engine {
    fn drop(&mut self) {
        ACTIVE.store(false, Ordering::Release);
        info!("engine shut down after loading {} media", self.loaded());
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::{Mutex, MutexGuard};

    static LOCK: Mutex<()> = Mutex::new(());

    /// Serializes tests that initialize the process-wide engine.
    pub fn engine_lock() -> MutexGuard<'static, ()> {
        LOCK.lock().unwrap_or_else(|e| e.into_inner())
    }
}
