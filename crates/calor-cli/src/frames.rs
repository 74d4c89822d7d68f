//! Snapshot sink that renders grids to `itK.ppm` images.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use calor_core::heatmap::{self, Palette};
use calor_core::{SnapshotError, SnapshotSink};
use ndarray::ArrayView2;

/// Writes every `every`-th snapshot as a PPM frame in `dir`.
pub struct FrameSink {
    dir: PathBuf,
    palette: Palette,
    every: usize,
    written: usize,
}

impl FrameSink {
    pub fn new(dir: &Path, palette: Palette, every: usize) -> Self {
        Self {
            dir: dir.to_path_buf(),
            palette,
            every: every.max(1),
            written: 0,
        }
    }

    /// Number of frames written so far.
    pub fn written(&self) -> usize {
        self.written
    }

    pub fn frame_path(&self, iteration: usize) -> PathBuf {
        self.dir.join(format!("it{}.ppm", iteration))
    }
}

impl SnapshotSink for FrameSink {
    fn write_snapshot(&mut self, iteration: usize, grid: ArrayView2<'_, f64>) -> Result<(), SnapshotError> {
        if iteration % self.every != 0 {
            return Ok(());
        }
        let path = self.frame_path(iteration);
        let file = File::create(&path).map_err(|source| SnapshotError::Create {
            path: path.display().to_string(),
            source,
        })?;
        let mut out = BufWriter::new(file);
        heatmap::write_ppm(grid, self.palette, &mut out)
            .and_then(|_| out.flush())
            .map_err(|source| SnapshotError::Write { iteration, source })?;
        self.written += 1;
        Ok(())
    }
}

/// Renders the surface as it stands before each step, the way frames are
/// numbered for grid-file runs: `it0` is the initial grid and the state after
/// the last step is not drawn.
pub struct SurfaceFrames {
    frames: FrameSink,
    iterations: usize,
}

impl SurfaceFrames {
    /// Draw `initial` as frame 0 and wrap `frames` for a run of `iterations` steps.
    pub fn begin(
        mut frames: FrameSink,
        initial: ArrayView2<'_, f64>,
        iterations: usize,
    ) -> Result<Self, SnapshotError> {
        if iterations > 0 {
            frames.write_snapshot(0, initial)?;
        }
        Ok(Self { frames, iterations })
    }
}

impl SnapshotSink for SurfaceFrames {
    fn write_snapshot(&mut self, iteration: usize, grid: ArrayView2<'_, f64>) -> Result<(), SnapshotError> {
        // The state after step k is the surface before step k + 1.
        let next = iteration + 1;
        if next < self.iterations {
            self.frames.write_snapshot(next, grid)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    #[test]
    fn test_writes_selected_frames() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = FrameSink::new(dir.path(), Palette::Five, 2);
        let grid = Array2::from_elem((3, 4), 1.0);
        for k in 0..5 {
            sink.write_snapshot(k, grid.view()).unwrap();
        }
        assert_eq!(sink.written(), 3);
        assert!(dir.path().join("it0.ppm").exists());
        assert!(!dir.path().join("it1.ppm").exists());
        assert!(dir.path().join("it4.ppm").exists());

        let bytes = std::fs::read(dir.path().join("it2.ppm")).unwrap();
        let header = b"P6 4 3 255\n";
        assert!(bytes.starts_with(header));
        assert_eq!(bytes.len(), header.len() + 3 * 4 * 3);
    }

    #[test]
    fn test_surface_frames_start_with_initial_grid() {
        let dir = tempfile::tempdir().unwrap();
        let initial = Array2::from_elem((3, 3), 10.0);
        let sink = FrameSink::new(dir.path(), Palette::Two, 1);
        let mut frames = SurfaceFrames::begin(sink, initial.view(), 3).unwrap();
        for k in 0..3 {
            frames.write_snapshot(k, Array2::zeros((3, 3)).view()).unwrap();
        }
        for k in 0..3 {
            assert!(dir.path().join(format!("it{}.ppm", k)).exists());
        }
        assert!(!dir.path().join("it3.ppm").exists());

        let mut expected = Vec::new();
        heatmap::write_ppm(initial.view(), Palette::Two, &mut expected).unwrap();
        assert_eq!(std::fs::read(dir.path().join("it0.ppm")).unwrap(), expected);
    }

    #[test]
    fn test_no_frames_for_empty_run() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FrameSink::new(dir.path(), Palette::Five, 1);
        SurfaceFrames::begin(sink, Array2::zeros((3, 3)).view(), 0).unwrap();
        assert!(!dir.path().join("it0.ppm").exists());
    }

    #[test]
    fn test_missing_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = FrameSink::new(&dir.path().join("absent"), Palette::Two, 1);
        let err = sink.write_snapshot(0, Array2::zeros((3, 3)).view()).unwrap_err();
        assert!(matches!(err, SnapshotError::Create { .. }));
    }
}
