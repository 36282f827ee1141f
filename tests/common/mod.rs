#![allow(dead_code)]

use assert_cmd::Command;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub fn gpsfix_command() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("gpsfix"))
}

/// A scratch directory the command runs in, so no stray gpsfix.toml is picked up
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn file(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    pub fn read(&self, name: &str) -> String {
        fs::read_to_string(self.dir.path().join(name)).unwrap()
    }

    pub fn command(&self) -> Command {
        let mut cmd = gpsfix_command();
        cmd.current_dir(self.dir.path()).env_remove("RUST_LOG");
        cmd
    }
}
