//! Sketch staging: the user's program text plus the fixed support header
//! the toolchain build expects, laid out the way arduino-cli wants a
//! sketch directory.

use std::fs;
use std::path::{Path, PathBuf};

use boardpilot_core::{BoardpilotError, Result};
use tracing::debug;

/// File name the staged program text is written to. arduino-cli requires
/// the primary .ino to match its directory name.
pub const SKETCH_FILE: &str = "sketch.ino";

/// The fixed supporting header staged alongside every sketch.
pub const SUPPORT_HEADER: &str = "headers.h";

/// A staged sketch directory, ready to hand to the toolchain.
#[derive(Debug, Clone)]
pub struct StagedSketch {
    pub dir: PathBuf,
}

/// Stages user sources into a `sketch/` directory under `staging_root`,
/// copying in the support header found by searching upward from
/// `search_root`.
pub struct SketchStager {
    staging_root: PathBuf,
    search_root: PathBuf,
}

impl SketchStager {
    pub fn new(staging_root: impl Into<PathBuf>, search_root: impl Into<PathBuf>) -> Self {
        Self {
            staging_root: staging_root.into(),
            search_root: search_root.into(),
        }
    }

    /// Stager rooted at the process's current directory.
    pub fn from_current_dir() -> Result<Self> {
        let cwd = std::env::current_dir()?;
        Ok(Self::new(cwd.clone(), cwd))
    }

    /// Write `source_text` and the support header into the sketch
    /// directory.
    ///
    /// A missing support header is a fatal setup failure reported before
    /// any external process gets involved.
    pub fn stage(&self, source_text: &str) -> Result<StagedSketch> {
        let header = find_support_header(&self.search_root).ok_or_else(|| {
            BoardpilotError::Setup(format!(
                "required support header '{SUPPORT_HEADER}' not found in '{}' or any parent \
                 directory",
                self.search_root.display()
            ))
        })?;

        let dir = self.staging_root.join("sketch");
        fs::create_dir_all(&dir)?;
        fs::copy(&header, dir.join(SUPPORT_HEADER))?;
        fs::write(dir.join(SKETCH_FILE), source_text)?;
        debug!(dir = %dir.display(), header = %header.display(), "staged sketch");

        Ok(StagedSketch { dir })
    }
}

/// Search upward from `start` for the support header.
pub fn find_support_header(start: &Path) -> Option<PathBuf> {
    let mut dir = Some(start);
    while let Some(d) = dir {
        let candidate = d.join(SUPPORT_HEADER);
        if candidate.is_file() {
            return Some(candidate);
        }
        dir = d.parent();
    }
    None
}
