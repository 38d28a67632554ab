//! Result packaging and delivery.

use crate::error::Result;
use serde::Serialize;
use std::fs;
use std::path::PathBuf;
use tracing::info;
use vrt_core::{Side, Summary};

pub const CSV_HEADER: &str = "pid,trial#,reactionTime (ms),circle";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrialRow {
    pub trial: usize,
    pub latency_ms: u64,
    pub circle: Side,
}

/// Everything one export writes out.
///
/// `participant_id` is drawn fresh for every export; `rows` and the summaries
/// depend only on the recorded trials.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultSet {
    pub participant_id: u32,
    pub rows: Vec<TrialRow>,
    pub side_a: Summary,
    pub side_b: Summary,
    pub overall: Summary,
}

impl ResultSet {
    /// Header plus one line per trial; no trailing newline.
    pub fn to_csv(&self) -> String {
        let mut lines = Vec::with_capacity(self.rows.len() + 1);
        lines.push(CSV_HEADER.to_string());
        lines.extend(self.rows.iter().map(|row| {
            format!(
                "{},{},{},{}",
                self.participant_id,
                row.trial,
                row.latency_ms,
                row.circle.label()
            )
        }));
        lines.join("\n")
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn summary_lines(&self) -> [String; 3] {
        [
            format_summary("Left Circle", &self.side_a),
            format_summary("Right Circle", &self.side_b),
            format_summary("Overall", &self.overall),
        ]
    }
}

fn format_summary(label: &str, s: &Summary) -> String {
    format!(
        "{label}: Count: {}, Mean: {:.2} ms, SD: {:.2} ms",
        s.count, s.mean, s.standard_deviation
    )
}

/// Destination for finished exports.
pub trait ExportSink {
    fn deliver(&mut self, file_name: &str, mime: &str, contents: &[u8]) -> Result<()>;
}

/// Writes every export as a file inside `dir`.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    pub dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl ExportSink for DirectorySink {
    fn deliver(&mut self, file_name: &str, mime: &str, contents: &[u8]) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(file_name);
        fs::write(&path, contents)?;
        info!("Results saved to {} ({mime})", path.display());
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivered {
    pub file_name: String,
    pub mime: String,
    pub contents: Vec<u8>,
}

/// Keeps exports in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    pub delivered: Vec<Delivered>,
}

impl ExportSink for MemorySink {
    fn deliver(&mut self, file_name: &str, mime: &str, contents: &[u8]) -> Result<()> {
        self.delivered.push(Delivered {
            file_name: file_name.to_string(),
            mime: mime.to_string(),
            contents: contents.to_vec(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::summarize;

    fn sample() -> ResultSet {
        let trials = [(250, Side::A), (300, Side::B), (275, Side::B), (325, Side::A)];
        ResultSet {
            participant_id: 123456,
            rows: trials
                .iter()
                .enumerate()
                .map(|(trial, &(latency_ms, circle))| TrialRow {
                    trial,
                    latency_ms,
                    circle,
                })
                .collect(),
            side_a: summarize(&[250, 325]).unwrap(),
            side_b: summarize(&[300, 275]).unwrap(),
            overall: summarize(&[250, 300, 275, 325]).unwrap(),
        }
    }

    #[test]
    fn csv_has_header_and_one_row_per_trial() {
        let csv = sample().to_csv();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[0], CSV_HEADER);
        assert_eq!(lines[1], "123456,0,250,left");
        assert_eq!(lines[2], "123456,1,300,right");
        assert_eq!(lines[3], "123456,2,275,right");
        assert_eq!(lines[4], "123456,3,325,left");
        assert!(!csv.ends_with('\n'));
    }

    #[test]
    fn json_carries_summaries() {
        let json = sample().to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["participant_id"], 123456);
        assert_eq!(value["overall"]["count"], 4);
        assert_eq!(value["rows"][1]["circle"], "right");
    }

    #[test]
    fn summary_lines_use_two_decimals() {
        let [left, _, overall] = sample().summary_lines();
        assert_eq!(left, "Left Circle: Count: 2, Mean: 287.50 ms, SD: 37.50 ms");
        assert!(overall.starts_with("Overall: Count: 4, Mean: 287.50 ms, SD: 27.95"));
    }

    #[test]
    fn directory_sink_writes_file() {
        let dir = std::env::temp_dir().join(format!("vrt-export-{}", std::process::id()));
        let mut sink = DirectorySink::new(&dir);
        sink.deliver("out.csv", "text/csv", b"a,b").unwrap();
        assert_eq!(fs::read(dir.join("out.csv")).unwrap(), b"a,b");
        fs::remove_dir_all(&dir).unwrap();
    }
}
