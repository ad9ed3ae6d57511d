// src/export.rs
//
// Frame history export.
//
// JSON is the full FrameRecord list. CSV is one row per frame with
// `frame,timestamp,accuracy` followed by one `angle_<joint>` column per
// joint seen anywhere in the session, sorted by name. A joint missing
// from a frame leaves its cell empty.

use crate::pipeline::recorder::FrameRecord;
use anyhow::{bail, Context, Result};
use std::collections::BTreeSet;
use std::fmt;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Csv => "csv",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            _ => bail!("Unsupported export format: {}", s),
        }
    }
}

pub fn write_records<W: Write>(
    records: &[FrameRecord],
    format: ExportFormat,
    writer: W,
) -> Result<()> {
    if records.is_empty() {
        bail!("No analysis data available to export");
    }
    match format {
        ExportFormat::Json => write_json(records, writer),
        ExportFormat::Csv => write_csv(records, writer),
    }
}

fn write_json<W: Write>(records: &[FrameRecord], mut writer: W) -> Result<()> {
    serde_json::to_writer_pretty(&mut writer, records)?;
    writer.flush()?;
    Ok(())
}

fn write_csv<W: Write>(records: &[FrameRecord], writer: W) -> Result<()> {
    let joints: BTreeSet<&str> = records
        .iter()
        .flat_map(|r| r.joint_angles.keys().map(String::as_str))
        .collect();

    let mut wtr = csv::Writer::from_writer(writer);

    let mut header = vec![
        "frame".to_string(),
        "timestamp".to_string(),
        "accuracy".to_string(),
    ];
    header.extend(joints.iter().map(|j| format!("angle_{}", j)));
    wtr.write_record(&header)?;

    for record in records {
        let mut row = vec![
            record.frame.to_string(),
            record.timestamp.to_string(),
            record.accuracy.to_string(),
        ];
        row.extend(joints.iter().map(|j| {
            record
                .joint_angles
                .get(*j)
                .map(|v| v.to_string())
                .unwrap_or_default()
        }));
        wtr.write_record(&row)?;
    }

    wtr.flush()?;
    Ok(())
}

/// Write `pose_analysis_<YYYYmmdd_HHMMSS>.<ext>` into `dir`, creating it if needed.
pub fn export_to_dir<P: AsRef<Path>>(
    records: &[FrameRecord],
    dir: P,
    format: ExportFormat,
) -> Result<PathBuf> {
    if records.is_empty() {
        bail!("No analysis data available to export");
    }

    let dir = dir.as_ref();
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create export directory {}", dir.display()))?;

    let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S");
    let path = dir.join(format!("pose_analysis_{}.{}", timestamp, format.extension()));

    let file = File::create(&path)
        .with_context(|| format!("Failed to create export file {}", path.display()))?;
    write_records(records, format, BufWriter::new(file))?;

    info!("💾 Exported {} frame(s) to {}", records.len(), path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feedback::FeedbackItem;

    fn record(frame: u64, timestamp: f64, angles: &[(&str, f64)]) -> FrameRecord {
        FrameRecord {
            frame,
            timestamp,
            joint_angles: angles.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
            accuracy: 87.5,
            feedback: vec![FeedbackItem {
                message: "Good form".to_string(),
                timestamp,
            }],
        }
    }

    fn three_records() -> Vec<FrameRecord> {
        (1..=3)
            .map(|i| record(i, i as f64 * 0.5, &[("left_elbow", 90.0)]))
            .collect()
    }

    #[test]
    fn test_parse_format() {
        assert_eq!("json".parse::<ExportFormat>().unwrap(), ExportFormat::Json);
        assert_eq!("CSV".parse::<ExportFormat>().unwrap(), ExportFormat::Csv);

        let err = "xml".parse::<ExportFormat>().unwrap_err();
        assert_eq!(err.to_string(), "Unsupported export format: xml");
    }

    #[test]
    fn test_empty_history_is_an_error() {
        let err = write_records(&[], ExportFormat::Json, Vec::new()).unwrap_err();
        assert_eq!(err.to_string(), "No analysis data available to export");
    }

    #[test]
    fn test_csv_has_angle_column_in_every_row() {
        let mut buf = Vec::new();
        write_records(&three_records(), ExportFormat::Csv, &mut buf).unwrap();

        let mut rdr = csv::Reader::from_reader(buf.as_slice());
        let headers = rdr.headers().unwrap().clone();
        assert_eq!(
            headers.iter().collect::<Vec<_>>(),
            vec!["frame", "timestamp", "accuracy", "angle_left_elbow"]
        );

        let rows: Vec<csv::StringRecord> = rdr.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 3);
        for (i, row) in rows.iter().enumerate() {
            assert_eq!(row[0].parse::<u64>().unwrap(), i as u64 + 1);
            assert_eq!(row[3].parse::<f64>().unwrap(), 90.0);
        }
    }

    #[test]
    fn test_csv_missing_joint_leaves_empty_cell() {
        let records = vec![
            record(1, 0.0, &[("left_knee", 120.0)]),
            record(2, 0.1, &[("left_elbow", 45.0), ("left_knee", 130.0)]),
        ];
        let mut buf = Vec::new();
        write_records(&records, ExportFormat::Csv, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "frame,timestamp,accuracy,angle_left_elbow,angle_left_knee");
        assert_eq!(lines[1], "1,0,87.5,,120");
        assert_eq!(lines[2], "2,0.1,87.5,45,130");
    }

    #[test]
    fn test_json_round_trip() {
        let records = three_records();
        let mut buf = Vec::new();
        write_records(&records, ExportFormat::Json, &mut buf).unwrap();

        let parsed: Vec<FrameRecord> = serde_json::from_slice(&buf).unwrap();
        assert_eq!(parsed, records);
        assert!(parsed.iter().all(|r| r.joint_angles["left_elbow"] == 90.0));
    }

    #[test]
    fn test_export_to_dir_names_file() {
        let dir = tempfile::tempdir().unwrap();
        let path =
            export_to_dir(&three_records(), dir.path().join("out"), ExportFormat::Csv).unwrap();

        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("pose_analysis_"));
        assert!(name.ends_with(".csv"));
        // pose_analysis_ + YYYYmmdd_HHMMSS + .csv
        assert_eq!(name.len(), "pose_analysis_".len() + 15 + 4);
        assert!(path.exists());
    }

    #[test]
    fn test_export_to_dir_refuses_empty_history() {
        let dir = tempfile::tempdir().unwrap();
        assert!(export_to_dir(&[], dir.path(), ExportFormat::Json).is_err());
    }
}
