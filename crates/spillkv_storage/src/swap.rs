//! File replacement protocol used by compaction.
//!
//! A compacted segment is written to `<file>.swap` and then promoted in three
//! steps:
//!
//! ```text
//! Written  --rename <file> -> <file>.swap.1-->  Retired
//! Retired  --rename <file>.swap -> <file>-->    Promoted
//! Promoted --delete <file>.swap.1-->            Done
//! ```
//!
//! If a step fails, [`SwapFiles::recover`] puts a data file back under the
//! segment's name, preferring the retired file over the swap file. Recovery is
//! best effort: segments are ephemeral, so nothing here is transactional.

use crate::error::{StorageError, StorageResult};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::warn;

const SWAP_SUFFIX: &str = ".swap";
const RETIRED_SUFFIX: &str = ".swap.1";

/// Progress through the replacement protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum SwapStep {
    /// The swap file is complete; nothing renamed yet.
    Written,
    /// The old file has been moved aside.
    Retired,
    /// The swap file now carries the segment's name.
    Promoted,
    /// The retired file is gone.
    Done,
}

/// A failed step of [`SwapFiles::commit`].
#[derive(Debug)]
pub(crate) struct SwapFailure {
    /// Last step that completed.
    pub reached: SwapStep,
    /// Error raised by the next step.
    pub source: io::Error,
}

/// Which file recovery moved back under the segment's name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Restored {
    /// The pre-compaction file.
    Retired,
    /// The freshly compacted file.
    Swap,
}

/// The set of paths involved in swapping one segment file.
#[derive(Debug, Clone)]
pub(crate) struct SwapFiles {
    current: PathBuf,
    swap: PathBuf,
    retired: PathBuf,
}

impl SwapFiles {
    /// Derives the swap paths for the segment file at `path`.
    pub fn for_segment(path: &Path) -> Self {
        Self {
            current: path.to_path_buf(),
            swap: with_suffix(path, SWAP_SUFFIX),
            retired: with_suffix(path, RETIRED_SUFFIX),
        }
    }

    /// Path the compacted data is written to.
    pub fn swap_path(&self) -> &Path {
        &self.swap
    }

    /// Returns true if an interrupted swap left files behind.
    pub fn has_artifacts(&self) -> bool {
        self.swap.exists() || self.retired.exists()
    }

    /// Runs the protocol from `Written` to `Done`.
    pub fn commit(&self) -> Result<(), SwapFailure> {
        let mut step = SwapStep::Written;
        while step != SwapStep::Done {
            let next = match step {
                SwapStep::Written => fs::rename(&self.current, &self.retired),
                SwapStep::Retired => fs::rename(&self.swap, &self.current),
                SwapStep::Promoted => remove_if_exists(&self.retired),
                SwapStep::Done => Ok(()),
            };
            if let Err(source) = next {
                return Err(SwapFailure {
                    reached: step,
                    source,
                });
            }
            step = match step {
                SwapStep::Written => SwapStep::Retired,
                SwapStep::Retired => SwapStep::Promoted,
                SwapStep::Promoted | SwapStep::Done => SwapStep::Done,
            };
        }
        Ok(())
    }

    /// Restores a data file under the segment's name and deletes leftovers.
    ///
    /// Returns `None` if the segment file was still in place. Leftovers that
    /// cannot be deleted are logged and left for the next [`discard_artifacts`].
    ///
    /// # Errors
    ///
    /// Returns `Compaction` if neither the segment file nor any swap artifact
    /// exists, or an I/O error if a rename fails.
    ///
    /// [`discard_artifacts`]: Self::discard_artifacts
    pub fn recover(&self) -> StorageResult<Option<Restored>> {
        let restored = if self.current.exists() {
            None
        } else if self.retired.exists() {
            warn!(path = ?self.current, "restoring segment file from retired copy");
            fs::rename(&self.retired, &self.current)?;
            Some(Restored::Retired)
        } else if self.swap.exists() {
            warn!(path = ?self.current, "restoring segment file from swap copy");
            fs::rename(&self.swap, &self.current)?;
            Some(Restored::Swap)
        } else {
            return Err(StorageError::compaction(format!(
                "no data file left for segment {}",
                self.current.display()
            )));
        };

        if let Err(e) = self.discard_artifacts() {
            warn!(path = ?self.current, error = %e, "failed to delete swap leftovers");
        }
        Ok(restored)
    }

    /// Deletes the swap and retired files if present.
    pub fn discard_artifacts(&self) -> io::Result<()> {
        remove_if_exists(&self.swap)?;
        remove_if_exists(&self.retired)
    }
}

/// Deletes `path`, treating a missing file as success.
pub(crate) fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}
