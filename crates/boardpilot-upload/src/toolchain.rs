//! Wrapper around the arduino-cli toolchain.
//!
//! The toolchain is a black box invoked as a subprocess: each operation
//! returns (exit status, combined output text) and nothing here depends on
//! an output schema beyond what the resolver's best-effort extraction pulls
//! out. Locating the executable happens once, at construction; a missing
//! toolchain is the only fatal detection error in the system.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use boardpilot_core::{BoardProfileId, BoardpilotError, ProgressSink};
use tracing::{debug, info};

use crate::invoker::{CliInvoker, InvokeError, ToolInvoker, ToolOutput};

/// Quick local queries (version check, board listing). Detection must stay
/// in single-digit seconds so a hung query degrades instead of stalling.
const QUERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Compile can legitimately take minutes on first run of a core.
const COMPILE_TIMEOUT: Duration = Duration::from_secs(300);

const UPLOAD_TIMEOUT: Duration = Duration::from_secs(120);

/// Index updates and core/library installs go to the network.
const NETWORK_TIMEOUT: Duration = Duration::from_secs(600);

/// Handle to a located arduino-cli installation.
pub struct ArduinoCli {
    invoker: Arc<dyn ToolInvoker>,
}

impl ArduinoCli {
    /// Locate arduino-cli by probing `arduino-cli version` on PATH, then
    /// the well-known install locations.
    ///
    /// Returns [`BoardpilotError::DetectionUnavailable`] when nothing
    /// answers; callers must treat that as fatal at startup, not per call.
    pub async fn locate() -> Result<Self, BoardpilotError> {
        for candidate in candidate_programs() {
            let invoker = CliInvoker::new(&candidate);
            match invoker.run(&["version".to_string()], QUERY_TIMEOUT).await {
                Ok(out) if out.success() => {
                    info!(program = %candidate.display(), "located arduino-cli");
                    return Ok(Self {
                        invoker: Arc::new(invoker),
                    });
                }
                Ok(out) => {
                    debug!(program = %candidate.display(), exit = out.exit_code, "version probe refused");
                }
                Err(e) => {
                    debug!(program = %candidate.display(), "version probe failed: {e}");
                }
            }
        }
        Err(BoardpilotError::DetectionUnavailable(
            "arduino-cli not found on PATH or in any known install location; \
             install it and make sure it is reachable"
                .to_string(),
        ))
    }

    /// Build a handle over an explicit invoker (the seam tests use to
    /// script toolchain behavior).
    pub fn with_invoker(invoker: Arc<dyn ToolInvoker>) -> Self {
        Self { invoker }
    }

    fn args(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    /// `arduino-cli version`
    pub async fn version(&self) -> Result<ToolOutput, InvokeError> {
        self.invoker.run(&Self::args(&["version"]), QUERY_TIMEOUT).await
    }

    /// `arduino-cli board list --format json`
    pub async fn board_list_json(&self) -> Result<ToolOutput, InvokeError> {
        self.invoker
            .run(
                &Self::args(&["board", "list", "--format", "json"]),
                QUERY_TIMEOUT,
            )
            .await
    }

    /// `arduino-cli compile --fqbn <profile> <sketch dir>`
    pub async fn compile(
        &self,
        profile: &BoardProfileId,
        sketch_dir: &std::path::Path,
    ) -> Result<ToolOutput, InvokeError> {
        let args = vec![
            "compile".to_string(),
            "--fqbn".to_string(),
            profile.to_string(),
            sketch_dir.to_string_lossy().to_string(),
        ];
        self.invoker.run(&args, COMPILE_TIMEOUT).await
    }

    /// `arduino-cli upload -p <port> --fqbn <profile> [--programmer <id>] <sketch dir>`
    pub async fn upload(
        &self,
        port_name: &str,
        profile: &BoardProfileId,
        sketch_dir: &std::path::Path,
        programmer_id: Option<&str>,
    ) -> Result<ToolOutput, InvokeError> {
        let mut args = vec![
            "upload".to_string(),
            "-p".to_string(),
            port_name.to_string(),
            "--fqbn".to_string(),
            profile.to_string(),
        ];
        if let Some(id) = programmer_id {
            args.push("--programmer".to_string());
            args.push(id.to_string());
        }
        args.push(sketch_dir.to_string_lossy().to_string());
        self.invoker.run(&args, UPLOAD_TIMEOUT).await
    }

    /// `arduino-cli core update-index`
    pub async fn core_update_index(&self) -> Result<ToolOutput, InvokeError> {
        self.invoker
            .run(&Self::args(&["core", "update-index"]), NETWORK_TIMEOUT)
            .await
    }

    /// `arduino-cli core list`
    pub async fn core_list(&self) -> Result<ToolOutput, InvokeError> {
        self.invoker.run(&Self::args(&["core", "list"]), QUERY_TIMEOUT).await
    }

    /// `arduino-cli core install <vendor:arch>`
    pub async fn core_install(&self, core_id: &str) -> Result<ToolOutput, InvokeError> {
        self.invoker
            .run(&Self::args(&["core", "install", core_id]), NETWORK_TIMEOUT)
            .await
    }

    /// Install the core backing `profile` if `core list` does not already
    /// show it. Reports what it did through the sink.
    pub async fn ensure_core(
        &self,
        profile: &BoardProfileId,
        sink: &ProgressSink,
    ) -> Result<(), InvokeError> {
        let core_id = format!("{}:{}", profile.vendor(), profile.arch());
        let listed = self.core_list().await?;
        if listed.success()
            && listed
                .output
                .to_lowercase()
                .contains(&core_id.to_lowercase())
        {
            return Ok(());
        }

        sink.info(format!("Installing board core '{core_id}'..."));
        let installed = self.core_install(&core_id).await?;
        if installed.success() {
            sink.info(format!("Board core '{core_id}' installed"));
        } else {
            sink.warn(format!(
                "Board core install for '{core_id}' failed: {}",
                installed.output.trim()
            ));
        }
        Ok(())
    }

    /// `arduino-cli lib search <query>`
    pub async fn lib_search(&self, query: &str) -> Result<ToolOutput, InvokeError> {
        self.invoker
            .run(&Self::args(&["lib", "search", query]), NETWORK_TIMEOUT)
            .await
    }

    /// `arduino-cli lib list`
    pub async fn lib_list(&self) -> Result<ToolOutput, InvokeError> {
        self.invoker.run(&Self::args(&["lib", "list"]), QUERY_TIMEOUT).await
    }

    /// `arduino-cli lib install <name>[@version]`
    pub async fn lib_install(
        &self,
        name: &str,
        version: Option<&str>,
    ) -> Result<ToolOutput, InvokeError> {
        let spec = match version {
            Some(v) => format!("{name}@{v}"),
            None => name.to_string(),
        };
        self.invoker
            .run(&Self::args(&["lib", "install", &spec]), NETWORK_TIMEOUT)
            .await
    }

    /// `arduino-cli lib uninstall <name>`
    pub async fn lib_uninstall(&self, name: &str) -> Result<ToolOutput, InvokeError> {
        self.invoker
            .run(&Self::args(&["lib", "uninstall", name]), QUERY_TIMEOUT)
            .await
    }

    /// `arduino-cli lib update <name>`
    pub async fn lib_update(&self, name: &str) -> Result<ToolOutput, InvokeError> {
        self.invoker
            .run(&Self::args(&["lib", "update", name]), NETWORK_TIMEOUT)
            .await
    }

    /// `arduino-cli config init`
    pub async fn config_init(&self) -> Result<ToolOutput, InvokeError> {
        self.invoker
            .run(&Self::args(&["config", "init"]), QUERY_TIMEOUT)
            .await
    }

    /// `arduino-cli config add board_manager.additional_urls <url>`
    pub async fn config_add_board_url(&self, url: &str) -> Result<ToolOutput, InvokeError> {
        self.invoker
            .run(
                &Self::args(&["config", "add", "board_manager.additional_urls", url]),
                QUERY_TIMEOUT,
            )
            .await
    }
}

/// Candidate programs in probe order: PATH first, then the conventional
/// install directories for the platform.
fn candidate_programs() -> Vec<PathBuf> {
    let mut candidates = vec![PathBuf::from("arduino-cli")];

    if cfg!(windows) {
        candidates.push(PathBuf::from(
            r"C:\Program Files\Arduino CLI\arduino-cli.exe",
        ));
        candidates.push(PathBuf::from(
            r"C:\Program Files (x86)\Arduino CLI\arduino-cli.exe",
        ));
    } else {
        candidates.push(PathBuf::from("/usr/local/bin/arduino-cli"));
        candidates.push(PathBuf::from("/usr/bin/arduino-cli"));
        if let Ok(home) = std::env::var("HOME") {
            candidates.push(PathBuf::from(home).join(".local/bin/arduino-cli"));
        }
    }

    candidates
}
