//! Shared test utilities for ragent-cli integration tests.

#![allow(dead_code)]

use std::path::PathBuf;

use assert_cmd::Command;
use tempfile::TempDir;

/// Get a Command for the ragent binary, isolated from the user's
/// environment.
#[allow(deprecated)]
pub fn ragent_cmd() -> Command {
    let mut cmd = Command::cargo_bin("ragent").expect("ragent binary should exist");
    for var in [
        "RAGENT_CONFIG",
        "RAGENT_VERBOSE",
        "RUST_LOG",
        "GROQ_API_KEY",
        "OPENAI_API_KEY",
        "GEMINI_API_KEY",
    ] {
        cmd.env_remove(var);
    }
    cmd.env("NO_COLOR", "1");
    cmd
}

/// Temp workspace with a config whose index and sessions live inside it and
/// whose only provider is an unreachable local endpoint.
pub struct Sandbox {
    pub dir: TempDir,
    pub config: PathBuf,
}

impl Sandbox {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let index_dir = dir.path().join("index");
        let sessions = dir.path().join("sessions.json");
        let config = dir.path().join("config.yaml");
        std::fs::write(
            &config,
            format!(
                "indexDir: {}\n\
                 memory:\n  persistPath: {}\n\
                 generation:\n  defaultProvider: local\n  probeTimeoutSecs: 1\n\
                 providers:\n  local:\n    baseUrl: http://127.0.0.1:9/v1\n\
                 embedding:\n  baseUrl: http://127.0.0.1:9/v1\n",
                index_dir.display(),
                sessions.display()
            ),
        )
        .unwrap();
        Self { dir, config }
    }

    /// Command with `--config` pointing at this sandbox.
    pub fn cmd(&self) -> Command {
        let mut cmd = ragent_cmd();
        cmd.arg("--config").arg(&self.config);
        cmd
    }

    pub fn write(&self, name: &str, content: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }
}
