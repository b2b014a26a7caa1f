//! Labeled email records and JSONL serialization

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;

/// A labeled email example, as produced by the synthetic generator or
/// supplied externally as line-delimited JSON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailRecord {
    /// Email body text
    pub content: String,
    /// Subject line
    pub subject: String,
    /// Class label
    pub is_phishing: bool,
    /// Bullet-point rationale for the label
    pub analysis: String,
}

/// Write records as line-delimited JSON, one object per line
pub fn write_jsonl(records: &[EmailRecord], path: &Path) -> Result<()> {
    let file = std::fs::File::create(path)?;
    let mut writer = std::io::BufWriter::new(file);

    for record in records {
        let line = serde_json::to_string(record)
            .map_err(|e| Error::Serialization(format!("JSONL encoding failed: {e}")))?;
        writeln!(writer, "{line}")?;
    }

    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> EmailRecord {
        EmailRecord {
            content: "Dear user,\n\nVerify your account".to_string(),
            subject: "URGENT: Verify your account".to_string(),
            is_phishing: true,
            analysis: "This is a phishing email because:\n1. ...".to_string(),
        }
    }

    #[test]
    fn test_record_json_round_trip() {
        let record = sample();
        let json = serde_json::to_string(&record).unwrap();
        let back: EmailRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(record, back);
    }

    #[test]
    fn test_write_jsonl() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.jsonl");

        write_jsonl(&[sample(), sample()], &path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);
        for line in content.lines() {
            let parsed: EmailRecord = serde_json::from_str(line).unwrap();
            assert!(parsed.is_phishing);
        }
    }

    #[test]
    fn test_write_jsonl_unwritable_path() {
        let result = write_jsonl(&[sample()], Path::new("/nonexistent/dir/records.jsonl"));
        assert!(result.is_err());
    }
}
