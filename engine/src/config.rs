//! Host configuration: push threshold, ring buffer capacity, artificial
//! latency jitter. Persisted as TOML next to the journal directory,
//! one registry entry per directory so repeated opens share state.

use lazy_static::lazy_static;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

lazy_static! {
    static ref CONFIG_REGISTRY: Mutex<BTreeMap<PathBuf, Arc<Mutex<Config>>>> =
        Mutex::new(BTreeMap::new());
}

#[derive(Debug, Clone)]
pub struct ConfigRegistry;

impl ConfigRegistry {
    pub fn new() -> Self {
        Self
    }

    pub fn get<P: AsRef<Path>>(&self, dir: P) -> Arc<Mutex<Config>> {
        let dir = dir.as_ref().to_path_buf();
        let mut map = CONFIG_REGISTRY.lock().unwrap();
        if let Some(existing) = map.get(&dir) {
            return Arc::clone(existing);
        }
        let mut config = Config::new(dir.clone());
        config.read().ok();
        let entry = Arc::new(Mutex::new(config));
        map.insert(dir, Arc::clone(&entry));
        entry
    }
}

impl Default for ConfigRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Config {
    #[serde(skip)]
    path: PathBuf,
    /// Journal bytes between snapshot-cache pushes (spec.md §4.2).
    pub push_threshold: u64,
    /// Ring buffer capacity for the journal's in-memory tail, rounded
    /// up to a power of two by the journal itself.
    pub ring_capacity: usize,
    /// Whether to fsync after every journal append.
    pub sync_on_append: bool,
}

impl Config {
    pub fn new(dir: PathBuf) -> Self {
        Self {
            path: dir.join("host.toml"),
            push_threshold: 1_000_000,
            ring_capacity: 1 << 20,
            sync_on_append: false,
        }
    }

    pub fn read(&mut self) -> Result<(), crate::Error> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };
        let loaded: Config =
            toml::from_str(&text).map_err(|e| crate::Error::Config(e.to_string()))?;
        self.push_threshold = loaded.push_threshold;
        self.ring_capacity = loaded.ring_capacity;
        self.sync_on_append = loaded.sync_on_append;
        Ok(())
    }

    pub fn write(&self) -> Result<(), crate::Error> {
        let text = toml::to_string(self).map_err(|e| crate::Error::Config(e.to_string()))?;
        std::fs::write(&self.path, text)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_directory_shares_one_entry() {
        let dir = tempfile::tempdir().unwrap();
        let registry = ConfigRegistry::new();
        let a = registry.get(dir.path());
        let b = registry.get(dir.path());
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        {
            let registry = ConfigRegistry::new();
            let config = registry.get(dir.path());
            let mut config = config.lock().unwrap();
            config.push_threshold = 42;
            config.write().unwrap();
        }
        let mut fresh = Config::new(dir.path().to_path_buf());
        fresh.read().unwrap();
        assert_eq!(fresh.push_threshold, 42);
    }
}
