//! Parser for plain-text initial-condition grids.
//!
//! The format is a PGM-like header followed by the samples:
//! ```text
//! P2 <width> <height> <maxvalue>
//! <width * height whitespace-separated floating-point temperatures>
//! ```
//! Samples may be any floating-point value; `maxvalue` is read but ignored.
//! Comments are not supported, so headers written by image editors must be
//! stripped before use.

use std::path::Path;

use ndarray::Array2;
use thiserror::Error;

/// Magic token of the grid file format.
pub const GRID_MAGIC: &str = "P2";

/// Errors while reading an initial-condition grid.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Failed to read grid file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Parse error at line {line}: {message}")]
    FormatError { line: usize, message: String },

    #[error("Grid dimensions must be non-zero (got {width}x{height})")]
    EmptyGrid { width: usize, height: usize },

    #[error("Grid dimensions {width}x{height} are too large")]
    TooLarge { width: usize, height: usize },
}

/// Read and parse a grid file from disk.
pub fn read_grid(path: &Path) -> Result<Array2<f64>, ParseError> {
    let content = std::fs::read_to_string(path)?;
    let grid = parse_grid(&content)?;
    log::debug!("{}: {}x{} grid", path.display(), grid.ncols(), grid.nrows());
    Ok(grid)
}

/// Parse a grid from a string into a `height`×`width` array.
pub fn parse_grid(content: &str) -> Result<Array2<f64>, ParseError> {
    let mut tokens = content
        .lines()
        .enumerate()
        .flat_map(|(idx, line)| line.split_whitespace().map(move |tok| (idx + 1, tok)));

    let (line, magic) = tokens.next().ok_or_else(|| ParseError::FormatError {
        line: 1,
        message: "Missing magic number".into(),
    })?;
    if magic != GRID_MAGIC {
        return Err(ParseError::FormatError {
            line,
            message: format!("Wrong magic number '{}', expected '{}'", magic, GRID_MAGIC),
        });
    }

    let mut header = |field: &str| -> Result<usize, ParseError> {
        let (line, tok) = tokens.next().ok_or_else(|| ParseError::FormatError {
            line,
            message: format!("Header ends before {}", field),
        })?;
        tok.parse().map_err(|_| ParseError::FormatError {
            line,
            message: format!("Invalid {}: '{}'", field, tok),
        })
    };
    let width = header("width")?;
    let height = header("height")?;
    let _maxvalue = header("maxvalue")?;

    if width == 0 || height == 0 {
        return Err(ParseError::EmptyGrid { width, height });
    }
    let area = width
        .checked_mul(height)
        .filter(|a| a.checked_mul(std::mem::size_of::<f64>()).is_some())
        .ok_or(ParseError::TooLarge { width, height })?;

    // The header is untrusted: grow with the samples actually present.
    let mut samples = Vec::new();
    for index in 0..area {
        let (line, tok) = tokens.next().ok_or_else(|| ParseError::FormatError {
            line: content.lines().count().max(1),
            message: format!("Expected {} samples, found {}", area, index),
        })?;
        let value: f64 = tok.parse().map_err(|_| ParseError::FormatError {
            line,
            message: format!("Invalid sample {}: '{}'", index, tok),
        })?;
        samples.push(value);
    }

    Array2::from_shape_vec((height, width), samples).map_err(|_| ParseError::TooLarge { width, height })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_grid() {
        let content = "P2\n3 2\n255\n10 10 10\n10 0.5 -1e1\n";
        let grid = parse_grid(content).unwrap();
        assert_eq!(grid.dim(), (2, 3));
        assert_eq!(grid[[1, 1]], 0.5);
        assert_eq!(grid[[1, 2]], -10.0);
    }

    #[test]
    fn test_header_on_one_line() {
        let grid = parse_grid("P2 2 2 1 1 2 3 4").unwrap();
        assert_eq!(grid[[1, 0]], 3.0);
    }

    #[test]
    fn test_wrong_magic() {
        let err = parse_grid("P5 2 2 255 0 0 0 0").unwrap_err();
        assert!(err.to_string().contains("magic"));
    }

    #[test]
    fn test_comments_are_rejected() {
        let err = parse_grid("P2\n# CREATOR: GIMP\n2 2 255\n0 0 0 0\n").unwrap_err();
        match err {
            ParseError::FormatError { line, message } => {
                assert_eq!(line, 2);
                assert!(message.contains("width"), "{}", message);
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_missing_samples() {
        let err = parse_grid("P2 2 2 255\n1 2 3\n").unwrap_err();
        assert!(err.to_string().contains("Expected 4 samples, found 3"));
    }

    #[test]
    fn test_bad_sample_reports_line() {
        let err = parse_grid("P2 2 2 255\n1 2\n3 x\n").unwrap_err();
        match err {
            ParseError::FormatError { line, .. } => assert_eq!(line, 3),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_oversized_header_with_few_samples() {
        let err = parse_grid("P2 1000000000 1000000000 255\n1 2 3\n").unwrap_err();
        match err {
            ParseError::FormatError { line, message } => {
                assert_eq!(line, 2);
                assert!(message.contains("found 3"), "{}", message);
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_overflowing_dimensions() {
        let header = format!("P2 {} 2 255\n0\n", usize::MAX);
        assert!(matches!(parse_grid(&header), Err(ParseError::TooLarge { height: 2, .. })));
    }

    #[test]
    fn test_zero_dimensions() {
        assert!(matches!(
            parse_grid("P2 0 3 255"),
            Err(ParseError::EmptyGrid { width: 0, height: 3 })
        ));
    }
}
