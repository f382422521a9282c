//! Buffered append-only segment file.

use crate::backend::{SegmentBackend, SegmentKey};
use crate::descriptor::{PositionDescriptor, SegmentStatus};
use crate::error::{StorageError, StorageResult};
use crate::swap::{remove_if_exists, Restored, SwapFiles, SwapStep};
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// Default segment capacity: 50 MiB.
pub const DEFAULT_CAPACITY: u64 = 50 * 1024 * 1024;

/// Default write buffer size: 64 KiB.
pub const DEFAULT_BUFFER_LIMIT: usize = 64 * 1024;

/// Sizing options for a [`LogSegment`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentOptions {
    /// Target number of live bytes held by the segment.
    pub capacity: u64,
    /// Maximum number of bytes held in the write buffer.
    pub buffer_limit: usize,
    /// Whether to `sync_data` after every write to the file.
    pub sync_on_flush: bool,
}

impl Default for SegmentOptions {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            buffer_limit: DEFAULT_BUFFER_LIMIT,
            sync_on_flush: false,
        }
    }
}

impl SegmentOptions {
    /// Sets the segment capacity.
    #[must_use]
    pub const fn capacity(mut self, bytes: u64) -> Self {
        self.capacity = bytes;
        self
    }

    /// Sets the write buffer limit.
    #[must_use]
    pub const fn buffer_limit(mut self, bytes: usize) -> Self {
        self.buffer_limit = bytes;
        self
    }

    /// Sets whether writes are synced to disk.
    #[must_use]
    pub const fn sync_on_flush(mut self, value: bool) -> Self {
        self.sync_on_flush = value;
        self
    }
}

/// A segment backed by one append-only file and an in-memory write buffer.
///
/// Values are appended at the **write cursor**, the end of the file plus the
/// length of the buffer. The cursor only moves forward, so overwriting a key
/// leaves the stale copy on disk until compaction rewrites the file.
///
/// # Compaction
///
/// After a write, if the cursor reaches 1.8x the capacity and the file holds
/// garbage, live values are copied into `<file>.swap` back to back and the swap
/// file replaces the segment file through a retire, promote, delete sequence.
///
/// # Lifetime
///
/// A segment starts from an empty file: any file already at its path is deleted.
/// Closing the segment deletes the file again.
///
/// # Example
///
/// ```no_run
/// use spillkv_storage::{LogSegment, SegmentBackend, SegmentOptions};
/// use std::path::Path;
///
/// let mut segment: LogSegment<u64> =
///     LogSegment::create(Path::new("/tmp/demo_cache_0.data"), SegmentOptions::default()).unwrap();
/// segment.put(1, b"hello").unwrap();
/// assert_eq!(segment.get(&1).unwrap(), b"hello");
/// segment.close().unwrap();
/// ```
pub struct LogSegment<K: SegmentKey> {
    path: PathBuf,
    options: SegmentOptions,
    file: Option<File>,
    /// Bytes physically in the file.
    file_len: u64,
    buffer: Vec<u8>,
    positions: HashMap<K, PositionDescriptor>,
    live_bytes: u64,
    status: SegmentStatus,
    compactions: u64,
}

impl<K: SegmentKey> LogSegment<K> {
    /// Creates a segment at `path`, replacing anything already there.
    ///
    /// Parent directories are created as needed, and files left behind by an
    /// interrupted swap are recovered and then discarded.
    ///
    /// # Errors
    ///
    /// Returns `CreationFailed` if the file cannot be created.
    pub fn create(path: &Path, options: SegmentOptions) -> StorageResult<Self> {
        let creation_failed = |source| StorageError::CreationFailed {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(creation_failed)?;
        }

        let swap = SwapFiles::for_segment(path);
        if swap.has_artifacts() {
            let restored = swap.recover()?;
            warn!(path = ?path, ?restored, "discarding segment left by an interrupted swap");
        }
        remove_if_exists(path).map_err(creation_failed)?;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .map_err(creation_failed)?;

        debug!(path = ?path, capacity = options.capacity, "created segment");

        Ok(Self {
            path: path.to_path_buf(),
            buffer: Vec::with_capacity(options.buffer_limit),
            options,
            file: Some(file),
            file_len: 0,
            positions: HashMap::new(),
            live_bytes: 0,
            status: SegmentStatus::Normal,
            compactions: 0,
        })
    }

    /// Returns the path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the sizing options.
    #[must_use]
    pub fn options(&self) -> &SegmentOptions {
        &self.options
    }

    /// Offset at which the next appended value begins.
    #[must_use]
    pub fn write_cursor(&self) -> u64 {
        self.file_len + self.buffer.len() as u64
    }

    /// Number of bytes currently held in the write buffer.
    #[must_use]
    pub fn buffered_bytes(&self) -> usize {
        self.buffer.len()
    }

    /// Number of completed compactions.
    #[must_use]
    pub fn compactions(&self) -> u64 {
        self.compactions
    }

    /// Returns the descriptor stored for `key`.
    #[must_use]
    pub fn descriptor(&self, key: &K) -> Option<PositionDescriptor> {
        self.positions.get(key).copied()
    }

    /// Writes the buffer to the end of the file.
    ///
    /// # Errors
    ///
    /// Returns an error if the segment is closed or the write fails.
    pub fn flush(&mut self) -> StorageResult<()> {
        self.ensure_open()?;
        self.flush_buffer()
    }

    fn ensure_open(&self) -> StorageResult<()> {
        if self.status == SegmentStatus::Closed {
            return Err(StorageError::closed(&self.path));
        }
        Ok(())
    }

    fn file_mut(&mut self) -> StorageResult<&mut File> {
        let path = &self.path;
        self.file
            .as_mut()
            .ok_or_else(|| StorageError::closed(path))
    }

    fn flush_buffer(&mut self) -> StorageResult<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let buffer = std::mem::take(&mut self.buffer);
        let result = self.append_to_file(&buffer);
        self.buffer = buffer;
        result?;
        debug!(path = ?self.path, bytes = self.buffer.len(), "flushed write buffer");
        self.buffer.clear();
        Ok(())
    }

    /// Appends `data` at the current end of the file.
    fn append_to_file(&mut self, data: &[u8]) -> StorageResult<()> {
        let at = self.file_len;
        let sync = self.options.sync_on_flush;
        let file = self.file_mut()?;
        file.seek(SeekFrom::Start(at))?;
        file.write_all(data)?;
        if sync {
            file.sync_data()?;
        }
        self.file_len += data.len() as u64;
        Ok(())
    }

    fn read_from_file(&mut self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        let file = self.file_mut()?;
        file.seek(SeekFrom::Start(offset))?;
        let mut data = vec![0u8; len];
        file.read_exact(&mut data)?;
        Ok(data)
    }

    fn needs_compaction(&self) -> bool {
        // cursor >= 1.8 * capacity, and there is garbage to reclaim
        let cursor = self.write_cursor();
        cursor.saturating_mul(5) >= self.options.capacity.saturating_mul(9)
            && cursor > self.live_bytes
    }

    /// Rewrites the live values into a fresh file.
    ///
    /// Runs automatically from [`SegmentBackend::put`]; exposed so callers can
    /// reclaim space eagerly.
    ///
    /// # Errors
    ///
    /// Returns an error if the segment is closed or any file operation fails.
    /// The segment keeps serving the data file that recovery left in place.
    pub fn compact(&mut self) -> StorageResult<()> {
        match self.status {
            SegmentStatus::Closed => return Err(StorageError::closed(&self.path)),
            SegmentStatus::Compacting => {
                return Err(StorageError::compaction("compaction already in progress"))
            }
            SegmentStatus::Normal => self.status = SegmentStatus::Compacting,
        }

        let result = self.rewrite();
        if self.status == SegmentStatus::Compacting {
            self.status = SegmentStatus::Normal;
        }
        result
    }

    fn rewrite(&mut self) -> StorageResult<()> {
        self.flush_buffer()?;
        let disk_before = self.file_len;
        let swap = SwapFiles::for_segment(&self.path);

        let relocated = match self.write_swap_file(swap.swap_path()) {
            Ok(relocated) => relocated,
            Err(e) => {
                let _ = remove_if_exists(swap.swap_path());
                return Err(e);
            }
        };

        // The handle must be released before the file is renamed away.
        self.file = None;
        let committed = swap.commit();
        let rewritten = match &committed {
            Ok(()) => true,
            Err(failure) => {
                warn!(
                    path = ?self.path,
                    reached = ?failure.reached,
                    error = %failure.source,
                    "segment swap failed, recovering"
                );
                self.recover_swap(&swap, failure.reached)?
            }
        };
        self.install(rewritten, relocated)?;

        if let Err(failure) = committed {
            return Err(StorageError::Io(failure.source));
        }

        self.compactions += 1;
        info!(
            path = ?self.path,
            before = disk_before,
            after = self.file_len,
            live = self.live_bytes,
            entries = self.positions.len(),
            "compacted segment"
        );
        Ok(())
    }

    /// Puts a data file back after a failed swap. Returns whether that file is
    /// the rewritten one.
    ///
    /// A segment left without any data file is closed.
    fn recover_swap(&mut self, swap: &SwapFiles, reached: SwapStep) -> StorageResult<bool> {
        match swap.recover() {
            Ok(Some(Restored::Retired)) => Ok(false),
            Ok(Some(Restored::Swap)) => Ok(true),
            Ok(None) => Ok(reached >= SwapStep::Promoted),
            Err(e) => {
                error!(path = ?self.path, error = %e, "segment file lost during compaction");
                if let Err(close_err) = self.close() {
                    warn!(path = ?self.path, error = %close_err, "failed to clean up lost segment");
                }
                Err(e)
            }
        }
    }

    /// Reopens the data file, switching to `relocated` descriptors if it holds
    /// the rewritten values.
    fn install(
        &mut self,
        rewritten: bool,
        relocated: Vec<(K, PositionDescriptor)>,
    ) -> StorageResult<()> {
        self.reopen()?;
        if rewritten {
            for (key, descriptor) in relocated {
                if let Some(slot) = self.positions.get_mut(&key) {
                    *slot = descriptor;
                }
            }
        }
        Ok(())
    }

    /// Streams every live value into `swap_path`, returning the new descriptors.
    fn write_swap_file(&mut self, swap_path: &Path) -> StorageResult<Vec<(K, PositionDescriptor)>> {
        let entries: Vec<(K, PositionDescriptor)> = self
            .positions
            .iter()
            .filter(|(_, pd)| !pd.is_null())
            .map(|(k, pd)| (k.clone(), *pd))
            .collect();

        let mut out = BufWriter::new(File::create(swap_path)?);
        let mut relocated = Vec::with_capacity(entries.len());
        let mut written = 0u64;

        for (key, pd) in entries {
            let data = self.read_from_file(pd.offset, pd.length as usize)?;
            out.write_all(&data)?;
            relocated.push((key, PositionDescriptor::new(written, pd.length)));
            written += u64::from(pd.length);
        }

        let file = out.into_inner().map_err(io::IntoInnerError::into_error)?;
        if self.options.sync_on_flush {
            file.sync_all()?;
        }
        Ok(relocated)
    }

    fn reopen(&mut self) -> StorageResult<()> {
        let file = OpenOptions::new().read(true).write(true).open(&self.path)?;
        self.file_len = file.metadata()?.len();
        self.file = Some(file);
        Ok(())
    }
}

impl<K: SegmentKey> SegmentBackend<K> for LogSegment<K> {
    fn put(&mut self, key: K, data: &[u8]) -> StorageResult<()> {
        self.ensure_open()?;

        if data.is_empty() {
            if let Some(old) = self.positions.insert(key, PositionDescriptor::NULL) {
                self.live_bytes -= u64::from(old.length);
            }
            return Ok(());
        }

        let length =
            u32::try_from(data.len()).map_err(|_| StorageError::ValueTooLarge { len: data.len() })?;

        let offset = if data.len() > self.options.buffer_limit {
            // Too large to buffer: pin the cursor, then write straight through.
            self.flush_buffer()?;
            let offset = self.file_len;
            self.append_to_file(data)?;
            offset
        } else {
            if self.buffer.len() + data.len() > self.options.buffer_limit {
                self.flush_buffer()?;
            }
            let offset = self.write_cursor();
            self.buffer.extend_from_slice(data);
            offset
        };

        let descriptor = PositionDescriptor::new(offset, length);
        if let Some(old) = self.positions.insert(key, descriptor) {
            self.live_bytes -= u64::from(old.length);
        }
        self.live_bytes += u64::from(length);

        if self.needs_compaction() {
            self.compact()?;
        }
        Ok(())
    }

    fn get(&mut self, key: &K) -> StorageResult<Vec<u8>> {
        self.ensure_open()?;

        let pd = self
            .positions
            .get(key)
            .copied()
            .ok_or_else(|| StorageError::not_found(key))?;

        if pd.is_null() {
            return Ok(Vec::new());
        }

        if pd.offset >= self.file_len {
            let start = (pd.offset - self.file_len) as usize;
            let end = start + pd.length as usize;
            return self
                .buffer
                .get(start..end)
                .map(<[u8]>::to_vec)
                .ok_or_else(|| {
                    StorageError::Io(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        format!("descriptor {pd:?} past end of write buffer"),
                    ))
                });
        }

        self.read_from_file(pd.offset, pd.length as usize)
    }

    fn remove(&mut self, key: &K) -> StorageResult<bool> {
        self.ensure_open()?;
        match self.positions.remove(key) {
            Some(old) => {
                self.live_bytes -= u64::from(old.length);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn contains(&self, key: &K) -> bool {
        self.positions.contains_key(key)
    }

    fn keys(&self) -> Vec<K> {
        self.positions.keys().cloned().collect()
    }

    fn len(&self) -> usize {
        self.positions.len()
    }

    fn used_bytes(&self) -> u64 {
        self.live_bytes
    }

    fn disk_bytes(&self) -> u64 {
        self.write_cursor()
    }

    fn status(&self) -> SegmentStatus {
        self.status
    }

    fn close(&mut self) -> StorageResult<()> {
        if self.status == SegmentStatus::Closed {
            return Ok(());
        }
        self.status = SegmentStatus::Closed;
        self.file = None;
        self.buffer = Vec::new();
        self.positions.clear();
        self.live_bytes = 0;
        self.file_len = 0;

        remove_if_exists(&self.path)?;
        SwapFiles::for_segment(&self.path).discard_artifacts()?;
        debug!(path = ?self.path, "closed segment");
        Ok(())
    }
}

impl<K: SegmentKey> Drop for LogSegment<K> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(path = ?self.path, error = %e, "failed to remove segment file on drop");
        }
    }
}

impl<K: SegmentKey> std::fmt::Debug for LogSegment<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogSegment")
            .field("path", &self.path)
            .field("status", &self.status)
            .field("entries", &self.positions.len())
            .field("live_bytes", &self.live_bytes)
            .field("write_cursor", &self.write_cursor())
            .finish_non_exhaustive()
    }
}
