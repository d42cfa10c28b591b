//! Shared testing utilities for propsync integration tests.

use assert_cmd::Command;
use serde_json::{Value, json};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Isolated directory holding a config file and a proposal database.
#[allow(dead_code)]
pub struct TestContext {
    root: TempDir,
}

#[allow(dead_code)]
impl TestContext {
    pub fn new() -> Self {
        let root = TempDir::new().expect("Failed to create temp directory for tests");
        Self { root }
    }

    pub fn root(&self) -> &Path {
        self.root.path()
    }

    pub fn database_path(&self) -> PathBuf {
        self.root.path().join("proposals.db")
    }

    pub fn config_path(&self) -> PathBuf {
        self.root.path().join("propsync.toml")
    }

    /// Write a config pointing at `api_url` and the context database.
    pub fn write_config(&self, api_url: &str) -> PathBuf {
        let content = format!(
            r#"log_level = "warn"

[portal]
api_url = "{}"
timeout_secs = 2

[storage]
database_path = "{}"
"#,
            api_url,
            self.database_path().display()
        );
        fs::write(self.config_path(), content).expect("Failed to write config");
        self.config_path()
    }

    /// Build a command for invoking the compiled `propsync` binary.
    pub fn cli(&self) -> Command {
        let mut cmd = Command::cargo_bin("propsync").expect("Failed to locate propsync binary");
        cmd.current_dir(self.root()).env_remove("RUST_LOG");
        cmd
    }
}

/// Portal payload for one proposal with no votes yet.
#[allow(dead_code)]
pub fn proposal_json(id: u64, status: &str) -> Value {
    json!({
        "proposalId": id,
        "proposalKey": format!("key-{}", id),
        "title": format!("Proposal {}", id),
        "url": format!("https://vote.example/proposal/{}", id),
        "summary": "Fund the thing",
        "owner": "alice",
        "amountSmart": 100000.0,
        "amountUSD": 1500.0,
        "installment": 1,
        "createdDate": "2018-01-01T10:00:00",
        "votingDeadline": "2099-01-01T00:00:00",
        "status": status,
        "voteYes": "NaN",
        "voteNo": "NaN",
        "voteAbstain": "NaN",
        "percentYes": "NaN",
        "percentNo": "NaN",
        "percentAbstain": "NaN",
        "currentStatus": "pending",
        "categoryTitle": "Development"
    })
}

#[allow(dead_code)]
pub fn open_list_body(proposals: &[Value]) -> String {
    json!({"status": "OK", "result": proposals}).to_string()
}

#[allow(dead_code)]
pub fn detail_body(proposal: Value) -> String {
    json!({"status": "OK", "result": {"proposal": proposal}}).to_string()
}

/// Base API URL served by a mockito server.
#[allow(dead_code)]
pub fn api_url(server: &mockito::Server) -> String {
    format!("{}/api/v1/", server.url())
}
