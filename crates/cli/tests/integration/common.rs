//! Shared test helpers for CLI integration tests.

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use tempfile::TempDir;

/// A temp working directory plus a command builder for the binary.
pub struct TestEnv {
    pub dir: TempDir,
}

impl TestEnv {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("failed to create temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write a file under the temp dir and return its path.
    pub fn write_file(&self, name: &str, content: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        fs::write(&path, content).expect("failed to write file");
        path
    }

    /// A `lualink` command running in the temp dir.
    pub fn lualink_cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("lualink").expect("binary not built");
        cmd.current_dir(self.dir.path());
        cmd
    }
}
