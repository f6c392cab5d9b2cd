//! Boardpilot Upload - board detection and flashing pipeline
//!
//! Provides the upload orchestrator that:
//! - Resolves connected boards through an ordered strategy chain
//! - Gates every job on board compatibility before anything destructive
//! - Stages sources and drives the toolchain compile/upload invocations
//! - Emits ordered progress events to a caller-owned channel

pub mod detect;
pub mod fakes;
pub mod invoker;
pub mod pipeline;
pub mod ports;
pub mod sketch;
pub mod toolchain;

// Re-export key types
pub use detect::IdentityResolver;
pub use invoker::{CliInvoker, InvokeError, ToolInvoker, ToolOutput};
pub use pipeline::UploadOrchestrator;
pub use ports::{PortEnumerator, SerialEndpoint, SystemPorts};
pub use sketch::{SketchStager, StagedSketch, SKETCH_FILE, SUPPORT_HEADER};
pub use toolchain::ArduinoCli;
