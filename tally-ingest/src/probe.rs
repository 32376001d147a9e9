//! Bounded read of the top of a file, used for format detection.

use csv::{ReaderBuilder, StringRecord};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use crate::error::{IngestError, Result};

/// How much of a file the detector may look at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeLimits {
    pub lines: usize,
    pub bytes_per_line: usize,
}

impl Default for ProbeLimits {
    fn default() -> Self {
        Self {
            lines: 5,
            bytes_per_line: 9000,
        }
    }
}

/// The first few lines of a file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Probe {
    lines: Vec<String>,
}

impl Probe {
    pub fn read(path: &Path, limits: ProbeLimits) -> Result<Self> {
        let file = File::open(path).map_err(|source| IngestError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_reader(BufReader::new(file), limits).map_err(|source| IngestError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_reader<R: BufRead>(mut reader: R, limits: ProbeLimits) -> std::io::Result<Self> {
        let mut lines = Vec::new();
        let mut buf = Vec::new();

        while lines.len() < limits.lines {
            buf.clear();
            // cap each line; the rest of an overlong line is discarded
            let n = (&mut reader)
                .take(limits.bytes_per_line as u64)
                .read_until(b'\n', &mut buf)?;
            if n == 0 {
                break;
            }
            if buf.last() != Some(&b'\n') && n == limits.bytes_per_line {
                skip_line(&mut reader)?;
            }
            let text = String::from_utf8_lossy(&buf);
            lines.push(text.trim_end_matches(['\r', '\n']).to_string());
        }

        Ok(Self { lines })
    }

    pub fn from_text(text: &str) -> Self {
        Self {
            lines: text.lines().map(str::to_string).collect(),
        }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.iter().all(|l| l.trim().is_empty())
    }

    /// Split the probed lines into records. Blank and unreadable lines are dropped.
    pub fn records(&self, delimiter: u8) -> Vec<StringRecord> {
        let text = self.lines.join("\n");
        ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .delimiter(delimiter)
            .from_reader(text.as_bytes())
            .records()
            .filter_map(|r| r.ok())
            .filter(|r| !(r.len() == 1 && r.get(0).is_some_and(|f| f.trim().is_empty())))
            .collect()
    }
}

fn skip_line<R: BufRead>(reader: &mut R) -> std::io::Result<()> {
    let mut sink = Vec::new();
    reader.read_until(b'\n', &mut sink)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_reads_at_most_n_lines() {
        let text = "a,b\n1,2\n3,4\n5,6\n7,8\n9,10\n";
        let probe = Probe::from_reader(
            Cursor::new(text),
            ProbeLimits { lines: 3, bytes_per_line: 100 },
        )
        .unwrap();
        assert_eq!(probe.lines(), &["a,b", "1,2", "3,4"]);
    }

    #[test]
    fn test_caps_bytes_per_line() {
        let long = "x".repeat(50);
        let text = format!("{long}\nshort\n");
        let probe = Probe::from_reader(
            Cursor::new(text),
            ProbeLimits { lines: 5, bytes_per_line: 10 },
        )
        .unwrap();
        assert_eq!(probe.lines(), &["x".repeat(10), "short".to_string()]);
    }

    #[test]
    fn test_records_skip_blank_lines_and_crlf() {
        let probe = Probe::from_reader(
            Cursor::new("a,b,c\r\n\r\n1,2,3\r\n"),
            ProbeLimits::default(),
        )
        .unwrap();
        let records = probe.records(b',');
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].get(2), Some("3"));
    }

    #[test]
    fn test_empty_probe() {
        let probe = Probe::from_reader(Cursor::new(""), ProbeLimits::default()).unwrap();
        assert!(probe.is_empty());
        assert!(probe.records(b',').is_empty());
    }
}
