//! Overlay merge
//!
//! Applies an [`Overlay`] onto an output directory with minimal writes. The
//! merge never deletes anything and never touches paths outside the overlay,
//! so running it twice with the same overlay writes nothing the second time.

use crate::error::MergeError;
use crate::overlay::path::display_relative;
use crate::overlay::target::OutputTarget;
use crate::overlay::tree::{Overlay, OverlayEntry};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, instrument};

/// Suffix appended to no-op decisions in the merge log
pub const SKIPPED_MARKER: &str = "[skipped]";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeAction {
    CreateDirectory,
    SkipDirectory,
    WriteFile,
    SkipFile,
}

impl MergeAction {
    pub fn is_skip(self) -> bool {
        matches!(self, MergeAction::SkipDirectory | MergeAction::SkipFile)
    }
}

/// One create/skip/write decision
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeDecision {
    pub path: PathBuf,
    pub action: MergeAction,
    /// BLAKE3 digest of the overlay content, for file decisions
    pub digest: Option<String>,
}

impl MergeDecision {
    /// Line written to the merge log for this decision.
    pub fn log_line(&self) -> String {
        let path = display_relative(&self.path);
        match self.action {
            MergeAction::CreateDirectory => format!("creating directory {}", path),
            MergeAction::SkipDirectory => {
                format!("creating directory {} {}", path, SKIPPED_MARKER)
            }
            MergeAction::WriteFile => format!("writing {}", path),
            MergeAction::SkipFile => format!("writing {} {}", path, SKIPPED_MARKER),
        }
    }
}

/// Every decision of one merge, in walk order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub decisions: Vec<MergeDecision>,
}

impl MergeReport {
    fn count(&self, action: MergeAction) -> usize {
        self.decisions.iter().filter(|d| d.action == action).count()
    }

    pub fn dirs_created(&self) -> usize {
        self.count(MergeAction::CreateDirectory)
    }

    pub fn dirs_skipped(&self) -> usize {
        self.count(MergeAction::SkipDirectory)
    }

    pub fn files_written(&self) -> usize {
        self.count(MergeAction::WriteFile)
    }

    pub fn files_skipped(&self) -> usize {
        self.count(MergeAction::SkipFile)
    }

    /// True when the merge changed nothing on disk.
    pub fn is_noop(&self) -> bool {
        self.decisions.iter().all(|d| d.action.is_skip())
    }

    pub fn written_paths(&self) -> impl Iterator<Item = &Path> {
        self.decisions
            .iter()
            .filter(|d| d.action == MergeAction::WriteFile)
            .map(|d| d.path.as_path())
    }
}

/// Apply `overlay` onto `target`, logging every decision to `log`.
///
/// Directories are created unless something already exists at their path.
/// Files are written when absent or when their bytes differ. A failure stops
/// the walk; entries committed before it stay on disk.
#[instrument(skip_all, fields(root = %target.root().display(), entries = overlay.len()))]
pub fn apply_overlay(
    overlay: &Overlay,
    target: &dyn OutputTarget,
    log: &mut dyn Write,
) -> Result<MergeReport, MergeError> {
    let start = Instant::now();
    let mut report = MergeReport::default();

    for (path, entry) in overlay.entries() {
        let decision = match entry {
            OverlayEntry::Directory => merge_directory(path, target)?,
            OverlayEntry::File(content) => merge_file(path, content, target)?,
        };

        writeln!(log, "{}", decision.log_line()).map_err(MergeError::Log)?;
        debug!(
            path = %display_relative(&decision.path),
            action = ?decision.action,
            digest = decision.digest.as_deref().unwrap_or("-"),
            "Merge decision"
        );
        report.decisions.push(decision);
    }

    info!(
        dirs_created = report.dirs_created(),
        dirs_skipped = report.dirs_skipped(),
        files_written = report.files_written(),
        files_skipped = report.files_skipped(),
        duration_ms = start.elapsed().as_millis() as u64,
        "Overlay merged"
    );

    Ok(report)
}

fn merge_directory(path: &Path, target: &dyn OutputTarget) -> Result<MergeDecision, MergeError> {
    let action = if target.exists(path) {
        MergeAction::SkipDirectory
    } else {
        target.create_dir_all(path)?;
        MergeAction::CreateDirectory
    };
    Ok(MergeDecision {
        path: path.to_path_buf(),
        action,
        digest: None,
    })
}

fn merge_file(
    path: &Path,
    content: &[u8],
    target: &dyn OutputTarget,
) -> Result<MergeDecision, MergeError> {
    let existing = target.read(path).map_err(|source| MergeError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let needs_write = match existing {
        Some(old) => old != content,
        None => true,
    };

    let action = if needs_write {
        target.write_file(path, content)?;
        MergeAction::WriteFile
    } else {
        MergeAction::SkipFile
    };

    Ok(MergeDecision {
        path: path.to_path_buf(),
        action,
        digest: Some(hex::encode(blake3::hash(content).as_bytes())),
    })
}
