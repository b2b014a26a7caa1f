//! Dataset for phishing-detection fine-tuning
//!
//! Loads labeled JSONL records, renders each into an instruction/response
//! text, tokenizes to a fixed length and masks the prompt span out of the
//! learning signal. Processed examples are cached per source file, keyed
//! by the file's stem; an existing cache entry is trusted without any
//! staleness check against the source.

use super::record::EmailRecord;
use super::tokenizer::LmTokenizer;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

/// Label value excluded from the loss computation
pub const IGNORE_INDEX: i64 = -100;

const INSTRUCTION: &str = "Analyze this email for phishing attempts:";

/// One tokenized training example
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodedExample {
    pub input_ids: Vec<u32>,
    pub attention_mask: Vec<u32>,
    /// Input ids duplicated, with prompt positions replaced by
    /// [`IGNORE_INDEX`]
    pub labels: Vec<i64>,
}

/// Accounting for records dropped during a best-effort load
#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    /// Examples successfully loaded (from source or cache)
    pub loaded: usize,
    /// Records dropped due to parse or encoding failures
    pub dropped: usize,
    /// One message per dropped record
    pub errors: Vec<String>,
}

impl LoadReport {
    fn drop_record(&mut self, message: String) {
        eprintln!("Dropping record: {message}");
        self.dropped += 1;
        self.errors.push(message);
    }
}

/// Render the full training text for a record
fn render_example(record: &EmailRecord) -> String {
    format!(
        "### Instruction: {INSTRUCTION}\n\nSubject: {}\n\n{}\n\n### Response: {}",
        record.subject, record.content, record.analysis
    )
}

/// Render the prompt-only prefix (everything before the analysis)
fn render_prompt(record: &EmailRecord) -> String {
    format!(
        "### Instruction: {INSTRUCTION}\n\nSubject: {}\n\n{}\n\n### Response:",
        record.subject, record.content
    )
}

/// Encode a single record into a fixed-length example
fn encode_record(
    record: &EmailRecord,
    tokenizer: &LmTokenizer,
    max_length: usize,
) -> Result<EncodedExample> {
    let (input_ids, attention_mask) = tokenizer.encode_fixed(&render_example(record), max_length)?;

    let mut labels: Vec<i64> = input_ids.iter().map(|&id| i64::from(id)).collect();

    // Mask the prompt span so the learning signal applies only to the
    // analysis tokens
    let prompt_len = tokenizer.encode(&render_prompt(record))?.len();
    for label in labels.iter_mut().take(prompt_len.min(max_length)) {
        *label = IGNORE_INDEX;
    }

    Ok(EncodedExample {
        input_ids,
        attention_mask,
        labels,
    })
}

/// Ordered collection of encoded examples with integer-indexed access
pub struct PhishingDataset {
    examples: Vec<EncodedExample>,
}

impl PhishingDataset {
    /// Load one or more JSONL files into encoded examples
    ///
    /// Per file: if a cache entry matching the file's stem exists under
    /// `cache_dir`, it is loaded verbatim; otherwise the file is parsed,
    /// encoded and (when a cache dir is configured) persisted before the
    /// next file is touched. Records that fail to parse or encode are
    /// dropped and accounted for in the returned [`LoadReport`].
    pub fn load(
        paths: &[PathBuf],
        tokenizer: &LmTokenizer,
        max_length: usize,
        cache_dir: Option<&Path>,
    ) -> Result<(Self, LoadReport)> {
        let mut examples = Vec::new();
        let mut report = LoadReport::default();

        for path in paths {
            if let Some(cache_dir) = cache_dir {
                let cache_path = cache_path_for(cache_dir, path);
                if cache_path.exists() {
                    let cached = read_cache(&cache_path)?;
                    report.loaded += cached.len();
                    examples.extend(cached);
                    continue;
                }
            }

            let file_examples = process_file(path, tokenizer, max_length, &mut report)?;

            if let Some(cache_dir) = cache_dir {
                write_cache(&cache_path_for(cache_dir, path), &file_examples)?;
            }

            report.loaded += file_examples.len();
            examples.extend(file_examples);
        }

        Ok((Self { examples }, report))
    }

    /// Build a dataset directly from encoded examples
    pub fn from_examples(examples: Vec<EncodedExample>) -> Self {
        Self { examples }
    }

    /// Get an example by index
    pub fn get(&self, idx: usize) -> Option<&EncodedExample> {
        self.examples.get(idx)
    }

    /// All examples in order
    pub fn examples(&self) -> &[EncodedExample] {
        &self.examples
    }

    /// Total example count
    pub fn len(&self) -> usize {
        self.examples.len()
    }

    /// Check if the dataset is empty
    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }
}

fn cache_path_for(cache_dir: &Path, source: &Path) -> PathBuf {
    let stem = source
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("data");
    cache_dir.join(format!("{stem}_processed.json"))
}

fn read_cache(path: &Path) -> Result<Vec<EncodedExample>> {
    let file = std::fs::File::open(path)?;
    serde_json::from_reader(BufReader::new(file))
        .map_err(|e| Error::Serialization(format!("cannot read cache '{}': {e}", path.display())))
}

fn write_cache(path: &Path, examples: &[EncodedExample]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = std::fs::File::create(path)?;
    serde_json::to_writer(std::io::BufWriter::new(file), examples)
        .map_err(|e| Error::Serialization(format!("cannot write cache '{}': {e}", path.display())))
}

fn process_file(
    path: &Path,
    tokenizer: &LmTokenizer,
    max_length: usize,
    report: &mut LoadReport,
) -> Result<Vec<EncodedExample>> {
    let file = std::fs::File::open(path)
        .map_err(|e| Error::Data(format!("cannot open '{}': {e}", path.display())))?;

    let mut examples = Vec::new();
    for (line_no, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let record: EmailRecord = match serde_json::from_str(&line) {
            Ok(record) => record,
            Err(e) => {
                report.drop_record(format!("{}:{}: {e}", path.display(), line_no + 1));
                continue;
            }
        };

        match encode_record(&record, tokenizer, max_length) {
            Ok(example) => examples.push(example),
            Err(e) => report.drop_record(format!("{}:{}: {e}", path.display(), line_no + 1)),
        }
    }

    Ok(examples)
}
