//! The upload state machine.
//!
//! Drives one job forward through detection, gating, staging, compile,
//! port-wait and upload. Phases execute strictly in order, every
//! transition emits at least one progress event, and a gate block halts the
//! job before any compile or upload step can run.
//!
//! `run` is cancel-safe: every suspension point is a plain await, spawned
//! toolchain processes are killed when their future is dropped, and the
//! serial endpoint is only held for the duration of a probe, so a
//! cancelled job always leaves the port released.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use boardpilot_core::compat::{self, CompatibilityRuleSet};
use boardpilot_core::{
    programmer, BoardIdentity, ProgressSink, UploadJob, UploadOutcome, UploadPhase, UploadReport,
};
use tracing::{info, warn};

use crate::detect::IdentityResolver;
use crate::ports::{self, PortEnumerator};
use crate::sketch::SketchStager;
use crate::toolchain::ArduinoCli;

/// Bounded availability probe: attempts at fixed spacing, then the upload
/// proceeds regardless; the toolchain fails cleanly if the port is truly
/// held.
const PORT_WAIT_ATTEMPTS: u32 = 5;
const PORT_WAIT_INTERVAL: Duration = Duration::from_secs(1);

/// Orchestrates upload jobs against the toolchain, one at a time per port.
pub struct UploadOrchestrator {
    cli: Arc<ArduinoCli>,
    resolver: IdentityResolver,
    ports: Arc<dyn PortEnumerator>,
    rules: Arc<CompatibilityRuleSet>,
    stager: SketchStager,
    port_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl UploadOrchestrator {
    pub fn new(
        cli: Arc<ArduinoCli>,
        ports: Arc<dyn PortEnumerator>,
        rules: CompatibilityRuleSet,
        stager: SketchStager,
    ) -> Self {
        let resolver = IdentityResolver::new(Arc::clone(&cli), Arc::clone(&ports));
        Self {
            cli,
            resolver,
            ports,
            rules: Arc::new(rules),
            stager,
            port_locks: Mutex::new(HashMap::new()),
        }
    }

    /// The resolver this orchestrator detects with, for callers that want
    /// standalone detection.
    pub fn resolver(&self) -> &IdentityResolver {
        &self.resolver
    }

    /// Run one job to a terminal phase.
    ///
    /// Jobs targeting the same port serialize; detection for a job may run
    /// while another port's job is mid-flight.
    pub async fn run(&self, job: &mut UploadJob, sink: &ProgressSink) -> UploadReport {
        let port_lock = {
            let mut locks = self.port_locks.lock().unwrap_or_else(|e| e.into_inner());
            Arc::clone(locks.entry(job.port_name.clone()).or_default())
        };
        let _port_guard = port_lock.lock().await;

        let start = Instant::now();
        info!(job_id = %job.id, port = %job.port_name, target = %job.target, "starting upload job");

        // ── Detecting ───────────────────────────────────────────────────
        job.phase = UploadPhase::Detecting;
        sink.info("Detecting connected boards...");
        let identities = self.resolver.resolve_all().await;
        if identities.is_empty() {
            sink.warn("No boards detected on any serial port");
            sink.warn("Check your connections; the upload will proceed but may fail");
        } else {
            sink.info(format!("Found {} connected board(s):", identities.len()));
            for identity in &identities {
                sink.info(format!(
                    "  - {} on {}",
                    identity.display_name, identity.port_name
                ));
                sink.info(format!("    Type: {}", identity.profile));
                sink.info(format!("    Vendor: {}", identity.vendor));
                sink.info(format!("    Product: {}", identity.product));
            }
        }

        // ── Gating ──────────────────────────────────────────────────────
        job.phase = UploadPhase::Gating;
        match identities.iter().find(|i| i.port_name == job.port_name) {
            Some(identity) => {
                let decision = compat::validate(&self.rules, &job.target, &identity.profile);
                if decision.allowed {
                    sink.info(format!("Compatibility check passed: {}", decision.rationale));
                } else {
                    sink.error("Upload blocked: incompatible board detected");
                    sink.error(format!("Selected profile: {}", job.target));
                    sink.error(format!(
                        "Detected board: {} ({})",
                        identity.display_name, identity.profile
                    ));
                    sink.error(decision.rationale.clone());
                    warn!(job_id = %job.id, "gate blocked upload: {}", decision.rationale);
                    return self.finish(
                        job,
                        UploadOutcome::Blocked {
                            rationale: decision.rationale,
                        },
                        identities,
                        start,
                    );
                }
            }
            None => {
                job.phase = UploadPhase::Unverified;
                sink.warn(format!(
                    "No board identity resolved for port {}",
                    job.port_name
                ));
                sink.warn(
                    "This may indicate a connection issue or unsupported hardware; \
                     the upload will proceed but may fail",
                );
            }
        }

        // ── PreparingSources ────────────────────────────────────────────
        job.phase = UploadPhase::PreparingSources;
        sink.info("Preparing sketch sources...");
        let staged = match self.stager.stage(&job.source_text) {
            Ok(staged) => staged,
            Err(e) => {
                sink.error(format!("Setup failure: {e}"));
                return self.finish(
                    job,
                    UploadOutcome::SetupFailed {
                        reason: e.to_string(),
                    },
                    identities,
                    start,
                );
            }
        };

        // ── Compiling ───────────────────────────────────────────────────
        job.phase = UploadPhase::Compiling;
        sink.info(format!("Compiling sketch for {}...", job.target));
        match self.cli.compile(&job.target, &staged.dir).await {
            Ok(out) if out.success() => sink.info("Compilation finished"),
            Ok(out) => {
                sink.error(format!("Compilation failed: {}", out.output.trim()));
                return self.finish(
                    job,
                    UploadOutcome::CompileFailed { output: out.output },
                    identities,
                    start,
                );
            }
            Err(e) => {
                sink.error(format!("Compilation failed: {e}"));
                return self.finish(
                    job,
                    UploadOutcome::CompileFailed {
                        output: e.to_string(),
                    },
                    identities,
                    start,
                );
            }
        }

        // ── WaitingForPort ──────────────────────────────────────────────
        job.phase = UploadPhase::WaitingForPort;
        self.wait_for_port(&job.port_name, sink).await;

        // ── Uploading ───────────────────────────────────────────────────
        job.phase = UploadPhase::Uploading;
        sink.info("Uploading... please wait");
        let programmer_id = self.programmer_argument(job, sink);
        match self
            .cli
            .upload(
                &job.port_name,
                &job.target,
                &staged.dir,
                programmer_id.as_deref(),
            )
            .await
        {
            Ok(out) if out.success() => {
                sink.info("Upload finished");
                self.finish(job, UploadOutcome::Succeeded, identities, start)
            }
            Ok(out) => self.upload_failed(job, sink, out.output, identities, start),
            Err(e) => self.upload_failed(job, sink, e.to_string(), identities, start),
        }
    }

    /// Probe availability up to the bounded attempt count, then proceed
    /// regardless.
    async fn wait_for_port(&self, port_name: &str, sink: &ProgressSink) {
        sink.info(format!("Checking availability of port {port_name}..."));
        for attempt in 1..=PORT_WAIT_ATTEMPTS {
            if ports::probe_endpoint(&self.ports, port_name).await {
                sink.info(format!("Port {port_name} is available"));
                return;
            }
            sink.info(format!(
                "Waiting for port {port_name} to become available... \
                 (attempt {attempt}/{PORT_WAIT_ATTEMPTS})"
            ));
            tokio::time::sleep(PORT_WAIT_INTERVAL).await;
        }
        sink.warn(format!(
            "Port {port_name} still looks busy after {PORT_WAIT_ATTEMPTS} attempts; \
             attempting the upload anyway"
        ));
    }

    /// Resolve the `--programmer` argument for this job, degrading to none
    /// when the label is unmapped.
    fn programmer_argument(&self, job: &UploadJob, sink: &ProgressSink) -> Option<String> {
        if !programmer::family_requires_programmer(&job.target) {
            sink.info("Using the standard serial upload method");
            return None;
        }

        match job.programmer.as_deref() {
            Some(label) => match programmer::resolve(label) {
                Some(id) => {
                    sink.info(format!("Using programmer: {id}"));
                    Some(id.to_string())
                }
                None => {
                    sink.warn(format!(
                        "Unknown programmer '{label}'; trying without a programmer argument"
                    ));
                    None
                }
            },
            None => {
                sink.info("No programmer specified; trying the default upload method");
                None
            }
        }
    }

    fn upload_failed(
        &self,
        job: &mut UploadJob,
        sink: &ProgressSink,
        output: String,
        identities: Vec<BoardIdentity>,
        start: Instant,
    ) -> UploadReport {
        sink.error(format!("Upload failed: {}", output.trim()));

        let guidance: Vec<String> = if programmer::family_requires_programmer(&job.target) {
            programmer::updi_guidance()
                .iter()
                .map(|s| s.to_string())
                .collect()
        } else {
            Vec::new()
        };
        for line in &guidance {
            sink.info(line.clone());
        }

        self.finish(
            job,
            UploadOutcome::UploadFailed { output, guidance },
            identities,
            start,
        )
    }

    fn finish(
        &self,
        job: &mut UploadJob,
        outcome: UploadOutcome,
        identities: Vec<BoardIdentity>,
        start: Instant,
    ) -> UploadReport {
        job.phase = outcome.phase();
        let duration_ms = start.elapsed().as_millis() as u64;
        info!(
            job_id = %job.id,
            phase = ?job.phase,
            duration_ms,
            "upload job finished"
        );
        UploadReport {
            job_id: job.id,
            outcome,
            identities,
            duration_ms,
        }
    }
}
