//! Validation manifest (`val.txt`) reader.
//!
//! Each non-blank line holds an image filename and its ground-truth class
//! index separated by whitespace. Extra tokens are ignored.

use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::Path;

use crate::error::{MigxError, Result};

/// One `filename label` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValRecord {
    pub filename: String,
    pub label: usize,
}

/// Parse one manifest line. Blank lines yield `None`.
pub fn parse_line(line_no: usize, line: &str) -> Result<Option<ValRecord>> {
    let mut tokens = line.split_whitespace();
    let Some(filename) = tokens.next() else {
        return Ok(None);
    };
    let label = tokens
        .next()
        .ok_or_else(|| MigxError::manifest(line_no, format!("missing label for {}", filename)))?;
    let label = label
        .parse()
        .map_err(|_| MigxError::manifest(line_no, format!("invalid label {:?}", label)))?;
    Ok(Some(ValRecord {
        filename: filename.to_string(),
        label,
    }))
}

/// Streaming reader yielding records in file order.
pub struct Manifest<R> {
    lines: Lines<R>,
    line_no: usize,
}

impl Manifest<BufReader<File>> {
    /// Open a manifest file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(MigxError::FileNotFound(path.to_path_buf()));
        }
        Ok(Self::new(BufReader::new(File::open(path)?)))
    }
}

impl<R: BufRead> Manifest<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_no: 0,
        }
    }
}

impl<R: BufRead> Iterator for Manifest<R> {
    type Item = Result<ValRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => return Some(Err(e.into())),
            };
            self.line_no += 1;
            match parse_line(self.line_no, &line) {
                Ok(Some(record)) => return Some(Ok(record)),
                Ok(None) => continue,
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_reads_records_in_order() {
        let text = "ILSVRC2012_val_00000001.JPEG 65\n\ncat.jpg 283 extra\n   \n";
        let records: Vec<_> = Manifest::new(Cursor::new(text))
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(
            records,
            vec![
                ValRecord {
                    filename: "ILSVRC2012_val_00000001.JPEG".into(),
                    label: 65
                },
                ValRecord {
                    filename: "cat.jpg".into(),
                    label: 283
                },
            ]
        );
    }

    #[test]
    fn test_malformed_lines_report_line_number() {
        let mut manifest = Manifest::new(Cursor::new("a.jpg 1\nb.jpg\n"));
        assert!(manifest.next().unwrap().is_ok());
        match manifest.next().unwrap() {
            Err(MigxError::Manifest { line, .. }) => assert_eq!(line, 2),
            other => panic!("unexpected: {:?}", other),
        }

        assert!(matches!(
            parse_line(7, "c.jpg -3"),
            Err(MigxError::Manifest { line: 7, .. })
        ));
        assert!(matches!(parse_line(1, "  \t "), Ok(None)));
    }

    #[test]
    fn test_open_missing() {
        assert!(matches!(
            Manifest::open("/nonexistent/val.txt"),
            Err(MigxError::FileNotFound(_))
        ));
    }
}
