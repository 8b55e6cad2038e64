//! Package metadata through the local `npm view` command
//!
//! Going through the npm CLI picks up the user's registry configuration and
//! credentials from `.npmrc`, which the plain HTTP client does not know about.

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::Context;
use serde::Deserialize;
use tokio::process::Command;

use super::npm::parse_publish_time;
use super::{PackageInfo, Registry};

/// Fields requested from `npm view`
const VIEW_FIELDS: [&str; 5] = ["description", "dist-tags.latest", "homepage", "version", "time"];

/// Runs `npm view --json` for package lookups
#[derive(Debug, Clone)]
pub struct NpmCli {
    command: PathBuf,
    cwd: Option<PathBuf>,
}

impl NpmCli {
    pub fn new(command: PathBuf, cwd: Option<PathBuf>) -> Self {
        Self { command, cwd }
    }

    fn build_command(&self, package_name: &str) -> Command {
        let mut command = Command::new(&self.command);
        command
            .args(["view", "--json", "--", package_name])
            .args(VIEW_FIELDS)
            // keep corepack from pinning or rejecting the project's package manager
            .env("COREPACK_ENABLE_AUTO_PIN", "0")
            .env("COREPACK_ENABLE_PROJECT_SPEC", "0")
            .kill_on_drop(true);
        if let Some(cwd) = &self.cwd {
            command.current_dir(cwd);
        }
        command
    }
}

#[derive(Debug, Deserialize)]
struct ViewOutput {
    description: Option<String>,
    #[serde(rename = "dist-tags.latest")]
    latest: Option<String>,
    homepage: Option<String>,
    version: Option<String>,
    #[serde(default)]
    time: HashMap<String, serde_json::Value>,
}

/// Parse the JSON printed by `npm view --json <pkg> <fields...>`
fn parse_view_output(stdout: &str) -> anyhow::Result<PackageInfo> {
    let view: ViewOutput = serde_json::from_str(stdout).context("Invalid npm view output")?;

    let version = view
        .latest
        .or(view.version)
        .context("npm view returned no version")?;
    let time = view
        .time
        .get(&version)
        .and_then(serde_json::Value::as_str)
        .and_then(parse_publish_time);

    Ok(PackageInfo {
        description: view.description.filter(|d| !d.is_empty()),
        version,
        time,
        homepage: view.homepage.filter(|h| !h.is_empty()),
    })
}

impl Registry for NpmCli {
    async fn get_package_info(&self, package_name: &str) -> anyhow::Result<PackageInfo> {
        let output = self
            .build_command(package_name)
            .output()
            .await
            .with_context(|| format!("Failed to execute {}", self.command.display()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("npm view failed for {package_name}: {}", stderr.trim());
        }

        parse_view_output(&String::from_utf8_lossy(&output.stdout))
    }
}
