//! The snapshot stream: every timestep's full grid, back to back.
//!
//! A stream holds `iterations` snapshots of `width * height` host-endian
//! `f64` values in row-major order, with no header and no separators, so
//! snapshot `k` starts at byte `k * width * height * 8`.

use std::fs::File;
use std::io::{self, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;

use ndarray::{Array2, ArrayView2};
use thiserror::Error;

const VALUE_BYTES: usize = std::mem::size_of::<f64>();

/// Errors while persisting or replaying snapshots.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("Failed to create snapshot stream {path}: {source}")]
    Create { path: String, source: io::Error },

    #[error("Failed to open snapshot stream {path}: {source}")]
    Open { path: String, source: io::Error },

    #[error("Failed to write snapshot {iteration}: {source}")]
    Write { iteration: usize, source: io::Error },

    #[error("Failed to read snapshot {index}: {source}")]
    Read { index: usize, source: io::Error },

    #[error("Failed to flush snapshot stream: {0}")]
    Flush(#[source] io::Error),

    #[error("Snapshot is {got:?}, stream expects {expected:?}")]
    Shape { expected: (usize, usize), got: (usize, usize) },

    #[error("Stream length {len} bytes is not a whole number of {height}x{width} snapshots")]
    Truncated { len: u64, height: usize, width: usize },

    #[error("Snapshot {index} is out of range (stream holds {count})")]
    OutOfRange { index: usize, count: usize },
}

/// Destination for the grid produced at each iteration.
///
/// Implemented by [`SnapshotWriter`] for the binary stream and by
/// `Vec<Array2<f64>>` for keeping snapshots in memory.
pub trait SnapshotSink {
    /// Persist the full grid after iteration `iteration`.
    fn write_snapshot(&mut self, iteration: usize, grid: ArrayView2<'_, f64>) -> Result<(), SnapshotError>;

    /// Called once after the last snapshot.
    fn finish(&mut self) -> Result<(), SnapshotError> {
        Ok(())
    }
}

impl SnapshotSink for Vec<Array2<f64>> {
    fn write_snapshot(&mut self, _iteration: usize, grid: ArrayView2<'_, f64>) -> Result<(), SnapshotError> {
        self.push(grid.to_owned());
        Ok(())
    }
}

/// Appends snapshots to a byte stream.
pub struct SnapshotWriter<W: Write> {
    inner: W,
    height: usize,
    width: usize,
    written: usize,
}

impl SnapshotWriter<BufWriter<File>> {
    /// Create (or truncate) the stream file at `path`.
    pub fn create(path: &Path, height: usize, width: usize) -> Result<Self, SnapshotError> {
        let file = File::create(path).map_err(|source| SnapshotError::Create {
            path: path.display().to_string(),
            source,
        })?;
        Ok(Self::new(BufWriter::new(file), height, width))
    }

    /// Flush and sync the file, surfacing errors that a plain drop would hide.
    pub fn close(self) -> Result<usize, SnapshotError> {
        let written = self.written;
        let file = self
            .inner
            .into_inner()
            .map_err(|e| SnapshotError::Flush(e.into_error()))?;
        file.sync_all().map_err(SnapshotError::Flush)?;
        log::debug!("snapshot stream closed after {} snapshots", written);
        Ok(written)
    }
}

impl<W: Write> SnapshotWriter<W> {
    pub fn new(inner: W, height: usize, width: usize) -> Self {
        Self {
            inner,
            height,
            width,
            written: 0,
        }
    }

    /// Number of snapshots written so far.
    pub fn written(&self) -> usize {
        self.written
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> SnapshotSink for SnapshotWriter<W> {
    fn write_snapshot(&mut self, iteration: usize, grid: ArrayView2<'_, f64>) -> Result<(), SnapshotError> {
        if grid.dim() != (self.height, self.width) {
            return Err(SnapshotError::Shape {
                expected: (self.height, self.width),
                got: grid.dim(),
            });
        }
        let result = match grid.as_slice() {
            Some(values) => self.inner.write_all(bytemuck::cast_slice(values)),
            None => {
                let values: Vec<f64> = grid.iter().copied().collect();
                self.inner.write_all(bytemuck::cast_slice(values.as_slice()))
            }
        };
        result.map_err(|source| SnapshotError::Write { iteration, source })?;
        self.written += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<(), SnapshotError> {
        self.inner.flush().map_err(SnapshotError::Flush)
    }
}

/// Random access to the snapshots of a stream.
pub struct SnapshotReader<R: Read + Seek> {
    inner: R,
    height: usize,
    width: usize,
    count: usize,
}

impl SnapshotReader<File> {
    /// Open the stream at `path`, holding `height`×`width` snapshots.
    pub fn open(path: &Path, height: usize, width: usize) -> Result<Self, SnapshotError> {
        let open_err = |source| SnapshotError::Open {
            path: path.display().to_string(),
            source,
        };
        let file = File::open(path).map_err(open_err)?;
        let len = file.metadata().map_err(open_err)?.len();
        Self::with_len(file, len, height, width)
    }
}

impl<R: Read + Seek> SnapshotReader<R> {
    /// Wrap a reader whose total length is `len` bytes.
    pub fn with_len(inner: R, len: u64, height: usize, width: usize) -> Result<Self, SnapshotError> {
        let truncated = || SnapshotError::Truncated { len, height, width };
        let snapshot = height
            .checked_mul(width)
            .and_then(|values| values.checked_mul(VALUE_BYTES))
            .and_then(|bytes| u64::try_from(bytes).ok())
            .ok_or_else(truncated)?;
        if snapshot == 0 || len % snapshot != 0 {
            return Err(truncated());
        }
        Ok(Self {
            inner,
            height,
            width,
            count: (len / snapshot) as usize,
        })
    }

    /// Number of snapshots in the stream.
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Read snapshot `index`.
    pub fn read(&mut self, index: usize) -> Result<Array2<f64>, SnapshotError> {
        if index >= self.count {
            return Err(SnapshotError::OutOfRange {
                index,
                count: self.count,
            });
        }
        let values = self.height * self.width;
        let offset = (index * values * VALUE_BYTES) as u64;
        let mut data = vec![0.0_f64; values];
        self.inner
            .seek(SeekFrom::Start(offset))
            .and_then(|_| self.inner.read_exact(bytemuck::cast_slice_mut(data.as_mut_slice())))
            .map_err(|source| SnapshotError::Read { index, source })?;

        Array2::from_shape_vec((self.height, self.width), data).map_err(|_| SnapshotError::Shape {
            expected: (self.height, self.width),
            got: (values, 1),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use std::io::Cursor;

    #[test]
    fn test_stream_layout_is_raw_row_major() {
        let mut writer = SnapshotWriter::new(Vec::new(), 2, 2);
        writer.write_snapshot(0, array![[1.0, 2.0], [3.0, 4.0]].view()).unwrap();
        writer.write_snapshot(1, array![[5.0, 6.0], [7.0, 8.0]].view()).unwrap();
        writer.finish().unwrap();
        assert_eq!(writer.written(), 2);

        let bytes = writer.into_inner();
        assert_eq!(bytes.len(), 2 * 2 * 2 * 8);
        let third = f64::from_ne_bytes(bytes[16..24].try_into().unwrap());
        assert_eq!(third, 3.0);
    }

    #[test]
    fn test_non_contiguous_view_is_written_in_row_order() {
        let grid = array![[1.0, 2.0], [3.0, 4.0]];
        let transposed = grid.t();
        let mut writer = SnapshotWriter::new(Vec::new(), 2, 2);
        writer.write_snapshot(0, transposed).unwrap();
        let bytes = writer.into_inner();
        let second = f64::from_ne_bytes(bytes[8..16].try_into().unwrap());
        assert_eq!(second, 3.0);
    }

    #[test]
    fn test_shape_mismatch_rejected() {
        let mut writer = SnapshotWriter::new(Vec::new(), 3, 3);
        let err = writer
            .write_snapshot(0, Array2::<f64>::zeros((2, 3)).view())
            .unwrap_err();
        assert!(matches!(err, SnapshotError::Shape { .. }));
    }

    #[test]
    fn test_reader_seeks_to_snapshot() {
        let mut writer = SnapshotWriter::new(Vec::new(), 2, 3);
        for k in 0..4 {
            writer
                .write_snapshot(k, Array2::from_elem((2, 3), k as f64).view())
                .unwrap();
        }
        let bytes = writer.into_inner();
        let len = bytes.len() as u64;

        let mut reader = SnapshotReader::with_len(Cursor::new(bytes), len, 2, 3).unwrap();
        assert_eq!(reader.len(), 4);
        assert_eq!(reader.read(2).unwrap(), Array2::from_elem((2, 3), 2.0));
        assert_eq!(reader.read(0).unwrap()[[1, 2]], 0.0);
        assert!(matches!(
            reader.read(4),
            Err(SnapshotError::OutOfRange { index: 4, count: 4 })
        ));
    }

    #[test]
    fn test_reader_rejects_partial_snapshot() {
        let bytes = vec![0u8; 5 * 8];
        let err = SnapshotReader::with_len(Cursor::new(bytes), 40, 2, 2).err().unwrap();
        assert!(matches!(err, SnapshotError::Truncated { len: 40, .. }));
    }

    #[test]
    fn test_reader_rejects_overflowing_shape() {
        let err = SnapshotReader::with_len(Cursor::new(Vec::new()), 64, 1 << 32, 1 << 32)
            .err()
            .unwrap();
        assert!(matches!(err, SnapshotError::Truncated { len: 64, .. }));
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("heat.bin");
        let mut writer = SnapshotWriter::create(&path, 3, 3).unwrap();
        writer
            .write_snapshot(0, Array2::from_elem((3, 3), 1.5).view())
            .unwrap();
        assert_eq!(writer.close().unwrap(), 1);
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 72);

        let mut reader = SnapshotReader::open(&path, 3, 3).unwrap();
        assert_eq!(reader.read(0).unwrap()[[2, 2]], 1.5);
    }

    #[test]
    fn test_create_in_missing_directory_names_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("heat.bin");
        let err = SnapshotWriter::create(&path, 3, 3).err().unwrap();
        assert!(err.to_string().contains("heat.bin"));
    }
}
