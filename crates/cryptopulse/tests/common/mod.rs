//! Common test utilities for CryptoPulse integration tests
#![allow(dead_code)]

use assert_cmd::Command;
use std::path::PathBuf;
use tempfile::{tempdir, TempDir};

/// Path to the pulse binary
pub fn bin_path() -> PathBuf {
    env!("CARGO_BIN_EXE_pulse").into()
}

/// Test environment with an isolated home directory so commands never
/// touch the real ~/.cryptopulse.
pub struct TestEnv {
    pub temp_dir: TempDir,
    pub config_dir: PathBuf,
}

impl TestEnv {
    pub fn new() -> anyhow::Result<Self> {
        let temp_dir = tempdir()?;
        let config_dir = temp_dir.path().join(".cryptopulse");

        Ok(Self {
            temp_dir,
            config_dir,
        })
    }

    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join("config.json")
    }

    /// Command with HOME pointed at the temp directory
    pub fn command(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_pulse"));
        cmd.env("HOME", self.temp_dir.path());
        cmd
    }

    /// Write a config with a fake API key
    pub fn create_config(&self) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.config_dir)?;
        let config = r#"{
  "providers": {
    "openrouter": {
      "api_key": "sk-or-test-key"
    }
  },
  "agent": {
    "model": "test/model",
    "max_steps": 10,
    "timeout_secs": 10
  },
  "server": {
    "host": "127.0.0.1",
    "port": 8787
  }
}"#;
        std::fs::write(self.config_file(), config)?;
        Ok(())
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new().expect("Failed to create test environment")
    }
}
