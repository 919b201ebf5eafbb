//! Polling file watcher with debounced reload batches.
//!
//! The watcher thread only fingerprints files and reports change batches
//! over a channel; it never touches a Lua state. Reloads happen on the
//! caller's thread via [`Engine::run_reload_loop`].

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender, TryRecvError, channel};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, SystemTime};

use tracing::{debug, warn};

use crate::consts::{DEFAULT_DEBOUNCE, DEFAULT_POLL_INTERVAL};
use crate::engine::Engine;
use crate::error::{Error, Result};

/// Options for [`Watcher::new`].
#[derive(Debug, Clone)]
pub struct WatcherOptions {
    /// Files to watch. More can be added later with [`Watcher::add_path`].
    pub paths: Vec<PathBuf>,
    /// Interval between fingerprint scans.
    pub poll_interval: Duration,
    /// Settle window: changes arriving within it coalesce into one batch.
    pub debounce: Duration,
}

impl Default for WatcherOptions {
    fn default() -> Self {
        Self {
            paths: Vec::new(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            debounce: DEFAULT_DEBOUNCE,
        }
    }
}

/// Modification-time plus length; `None` while the file is absent.
type Fingerprint = Option<(SystemTime, u64)>;

fn fingerprint(path: &Path) -> Fingerprint {
    let meta = std::fs::metadata(path).ok()?;
    let mtime = meta.modified().ok()?;
    Some((mtime, meta.len()))
}

type PathSet = Arc<Mutex<BTreeMap<PathBuf, Fingerprint>>>;

/// Watches files for changes by polling.
#[derive(Debug)]
pub struct Watcher {
    paths: PathSet,
    stop: Arc<AtomicBool>,
    changes: Receiver<Vec<PathBuf>>,
    handle: Option<JoinHandle<()>>,
}

impl Watcher {
    /// Start watching. Every path must exist; paths are canonicalized.
    pub fn new(options: WatcherOptions) -> Result<Self> {
        let paths: PathSet = Arc::new(Mutex::new(BTreeMap::new()));
        let stop = Arc::new(AtomicBool::new(false));
        let (tx, rx) = channel();

        let mut watcher = Self {
            paths,
            stop,
            changes: rx,
            handle: None,
        };

        for path in &options.paths {
            watcher.add_path(path)?;
        }

        let paths = watcher.paths.clone();
        let stop = watcher.stop.clone();
        let poll_interval = options.poll_interval;
        let debounce = options.debounce;
        let handle = std::thread::Builder::new()
            .name("lualink-watcher".to_string())
            .spawn(move || poll_loop(paths, stop, tx, poll_interval, debounce))
            .map_err(|e| Error::Watch(format!("failed to spawn watcher thread: {}", e)))?;
        watcher.handle = Some(handle);

        Ok(watcher)
    }

    /// Add a file to the watch set. Errors when the file does not exist.
    pub fn add_path(&self, path: impl AsRef<Path>) -> Result<()> {
        let canonical = dunce::canonicalize(path.as_ref())
            .map_err(|_| Error::NotFound(path.as_ref().display().to_string()))?;
        let print = fingerprint(&canonical);
        self.paths.lock().unwrap().insert(canonical, print);
        Ok(())
    }

    /// Stop watching a file. Unknown paths are a no-op.
    pub fn remove_path(&self, path: impl AsRef<Path>) -> Result<()> {
        let canonical = dunce::canonicalize(path.as_ref())
            .unwrap_or_else(|_| path.as_ref().to_path_buf());
        self.paths.lock().unwrap().remove(&canonical);
        Ok(())
    }

    /// Changed paths delivered since the last call, without blocking.
    pub fn try_changes(&self) -> Option<Vec<PathBuf>> {
        match self.changes.try_recv() {
            Ok(batch) => Some(batch),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Block up to `timeout` for the next change batch. Returns `None` on
    /// timeout or after the watcher closed and drained.
    pub fn wait_changes(&self, timeout: Duration) -> Option<Vec<PathBuf>> {
        match self.changes.recv_timeout(timeout) {
            Ok(batch) => Some(batch),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Block for the next change batch; `None` once the watcher is closed and
    /// all pending batches were drained.
    pub fn recv_changes(&self) -> Option<Vec<PathBuf>> {
        self.changes.recv().ok()
    }

    /// Stop the polling thread. Idempotent; also runs on drop.
    pub fn close(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Watcher {
    fn drop(&mut self) {
        self.close();
    }
}

fn poll_loop(
    paths: PathSet,
    stop: Arc<AtomicBool>,
    tx: Sender<Vec<PathBuf>>,
    poll_interval: Duration,
    debounce: Duration,
) {
    // Sleep in short slices so close() is prompt even with long intervals.
    let slice = Duration::from_millis(25).min(poll_interval.max(Duration::from_millis(1)));

    'outer: loop {
        let mut slept = Duration::ZERO;
        while slept < poll_interval {
            if stop.load(Ordering::Relaxed) {
                break 'outer;
            }
            std::thread::sleep(slice);
            slept += slice;
        }

        let mut changed = scan(&paths);
        if changed.is_empty() {
            continue;
        }

        // Let rapid successive writes settle into a single batch.
        if debounce > Duration::ZERO {
            std::thread::sleep(debounce);
            for path in scan(&paths) {
                if !changed.contains(&path) {
                    changed.push(path);
                }
            }
        }

        debug!(count = changed.len(), "config files changed");
        if tx.send(changed).is_err() {
            // Receiver gone; nothing left to report to.
            break;
        }
    }
}

/// Re-fingerprint all watched paths, returning those that changed.
fn scan(paths: &PathSet) -> Vec<PathBuf> {
    let mut changed = Vec::new();
    let mut set = paths.lock().unwrap();
    for (path, known) in set.iter_mut() {
        let current = fingerprint(path);
        if current != *known {
            changed.push(path.clone());
            *known = current;
        }
    }
    changed
}

impl Engine {
    /// Drain change batches from `watcher`, reloading each changed file on
    /// this thread and reporting the outcome to `on_reload`. Returns when the
    /// watcher is closed and drained.
    pub fn run_reload_loop<F>(&self, watcher: &Watcher, mut on_reload: F)
    where
        F: FnMut(&[PathBuf], Option<&Error>),
    {
        while let Some(batch) = watcher.recv_changes() {
            let result = batch.iter().try_for_each(|path| {
                if path.exists() {
                    self.load_file(path)
                } else {
                    warn!(path = %path.display(), "watched file disappeared");
                    Ok(())
                }
            });
            match &result {
                Ok(()) => debug!(count = batch.len(), "reloaded config files"),
                Err(e) => warn!(error = %e, "config reload failed"),
            }
            on_reload(&batch, result.as_ref().err());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;
    use tracing_test::traced_test;

    fn fast_options(paths: Vec<PathBuf>) -> WatcherOptions {
        WatcherOptions {
            paths,
            poll_interval: Duration::from_millis(20),
            debounce: Duration::from_millis(10),
        }
    }

    #[test]
    fn reports_modified_files() {
        let dir = TempDir::new().unwrap();
        let config = dir.path().join("config.lua");
        fs::write(&config, "x = 1").unwrap();

        let watcher = Watcher::new(fast_options(vec![config.clone()])).unwrap();
        fs::write(&config, "x = 2 -- changed").unwrap();

        let batch = watcher
            .wait_changes(Duration::from_secs(5))
            .expect("expected a change batch");
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].file_name(), config.file_name());
    }

    #[test]
    fn missing_path_is_rejected() {
        let dir = TempDir::new().unwrap();
        let err = Watcher::new(fast_options(vec![dir.path().join("absent.lua")])).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn removed_path_stops_reporting() {
        let dir = TempDir::new().unwrap();
        let config = dir.path().join("config.lua");
        fs::write(&config, "x = 1").unwrap();

        let watcher = Watcher::new(fast_options(vec![config.clone()])).unwrap();
        watcher.remove_path(&config).unwrap();
        fs::write(&config, "x = 2 -- changed").unwrap();

        assert!(watcher.wait_changes(Duration::from_millis(300)).is_none());
    }

    #[test]
    fn close_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let config = dir.path().join("config.lua");
        fs::write(&config, "x = 1").unwrap();

        let mut watcher = Watcher::new(fast_options(vec![config])).unwrap();
        watcher.close();
        watcher.close();
    }

    #[test]
    fn disappearing_file_fires_once() {
        let dir = TempDir::new().unwrap();
        let config = dir.path().join("config.lua");
        fs::write(&config, "x = 1").unwrap();

        let watcher = Watcher::new(fast_options(vec![config.clone()])).unwrap();
        fs::remove_file(&config).unwrap();

        assert!(watcher.wait_changes(Duration::from_secs(5)).is_some());
        assert!(watcher.wait_changes(Duration::from_millis(200)).is_none());
    }

    #[test]
    #[traced_test]
    fn reload_loop_reloads_changed_files() {
        let dir = TempDir::new().unwrap();
        let config = dir.path().join("config.lua");
        fs::write(&config, "answer = 1").unwrap();

        let engine = Engine::sandboxed().unwrap();
        engine.load_file(&config).unwrap();

        let mut watcher = Watcher::new(fast_options(vec![config.clone()])).unwrap();
        fs::write(&config, "answer = 42 -- updated").unwrap();

        // Give the poller time to buffer the batch, then close so the loop
        // terminates after draining it.
        std::thread::sleep(Duration::from_millis(500));
        watcher.close();

        let mut reloads = 0;
        engine.run_reload_loop(&watcher, |batch, err| {
            assert!(err.is_none());
            assert!(!batch.is_empty());
            reloads += 1;
        });
        assert!(reloads >= 1);

        let answer: i64 = engine.get("answer").unwrap();
        assert_eq!(answer, 42);
        assert!(logs_contain("loading config file"));
    }

    #[test]
    fn reload_loop_reports_bad_config() {
        let dir = TempDir::new().unwrap();
        let config = dir.path().join("config.lua");
        fs::write(&config, "x = 1").unwrap();

        let engine = Engine::sandboxed().unwrap();
        let mut watcher = Watcher::new(fast_options(vec![config.clone()])).unwrap();

        fs::write(&config, "this is not lua").unwrap();
        std::thread::sleep(Duration::from_millis(500));
        watcher.close();

        let mut saw_error = false;
        engine.run_reload_loop(&watcher, |_, err| {
            saw_error = saw_error || err.is_some();
        });
        assert!(saw_error);
    }
}
