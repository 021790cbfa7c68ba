use anyhow::Result;
use assert_fs::fixture::ChildPath;
use assert_fs::prelude::*;
use assert_fs::TempDir;
use secshell::config::{Config, StorageConfig};
use secshell::permissions::PermissionManager;
use secshell::persistence::SessionIndex;
use secshell::session::SessionManager;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Test utilities for integration tests
pub struct TestEnvironment {
    pub temp_dir: TempDir,
    pub storage: StorageConfig,
    pub config_path: PathBuf,
}

impl TestEnvironment {
    /// Fresh storage directories and a config file pointing at them
    pub fn new() -> Result<Self> {
        let temp_dir = TempDir::new()?;
        let storage = StorageConfig::default().rooted_at(temp_dir.path());
        let config_path = temp_dir.path().join("config.toml");

        let config = Config {
            storage: storage.clone(),
            ..Config::default()
        };
        config.save_to(&config_path)?;

        Ok(Self {
            temp_dir,
            storage,
            config_path,
        })
    }

    pub fn index(&self) -> SessionIndex {
        self.storage.index()
    }

    pub fn manager(&self) -> SessionManager {
        SessionManager::new(self.storage.clone(), Box::new(PermissionManager::default()))
    }

    pub fn logs(&self) -> ChildPath {
        self.temp_dir.child("logs")
    }

    pub fn memory(&self) -> ChildPath {
        self.temp_dir.child("memory")
    }

    /// Write a raw session log, one JSON document per entry
    pub fn write_log(&self, file_name: &str, lines: &[&str]) -> Result<ChildPath> {
        let file = self.logs().child(file_name);
        let mut content = lines.join("\n");
        content.push('\n');
        file.write_str(&content)?;
        Ok(file)
    }

    /// A minimal well-formed log whose last user message is `request`
    pub fn write_session(&self, id: &str, stamp: &str, user: &str, request: &str) -> Result<ChildPath> {
        let start = format!(
            r#"{{"event":"session_start","timestamp":"2024-01-01T00:00:00","session_id":"{}","user":"{}"}}"#,
            id, user
        );
        let ask = serde_json::json!({
            "event": "user_message",
            "timestamp": "2024-01-01T00:00:01",
            "content": request,
        })
        .to_string();
        let answer =
            r#"{"event":"assistant_message","timestamp":"2024-01-01T00:00:02","content":"ok"}"#;
        self.write_log(
            &format!("cai_{}_{}_{}.jsonl", id, stamp, user),
            &[&start, &ask, answer],
        )
    }

    /// Run the binary against this environment's config, feeding `stdin`
    pub async fn run_secshell(&self, args: &[&str], stdin: &str) -> Result<std::process::Output> {
        let mut child = Command::new(env!("CARGO_BIN_EXE_secshell"))
            .arg("--config")
            .arg(&self.config_path)
            .args(args)
            .current_dir(self.temp_dir.path())
            .env("RUST_LOG", "secshell=warn")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        if let Some(mut input) = child.stdin.take() {
            input.write_all(stdin.as_bytes()).await?;
        }

        child
            .wait_with_output()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to run secshell: {}", e))
    }
}
