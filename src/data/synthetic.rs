//! Synthetic phishing/legitimate email generation
//!
//! Assembles labeled email records by substituting randomly chosen phrases
//! from fixed categorical pools into fixed templates, together with a
//! deterministic bullet-point rationale for the label.

use super::record::{write_jsonl, EmailRecord};
use crate::Result;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::path::Path;

// Common patterns in phishing emails
const PHISHING_URGENCY: &[&str] = &[
    "Immediate action required",
    "Your account will be suspended",
    "Security alert: Unauthorized access",
    "Payment overdue",
    "Limited time offer",
];

const PHISHING_GREETINGS: &[&str] = &[
    "Dear valued customer",
    "Dear account holder",
    "Dear user",
    "Attention",
    "Important notice",
];

const PHISHING_HOOKS: &[&str] = &[
    "Verify your account",
    "Update your payment information",
    "Confirm your identity",
    "Claim your reward",
    "Reset your password",
];

const PHISHING_THREATS: &[&str] = &[
    "Account access will be restricted",
    "Your account shows suspicious activity",
    "Your account will be terminated",
    "Legal action may be taken",
    "Service will be discontinued",
];

const PHISHING_CALLS_TO_ACTION: &[&str] = &[
    "Click here to verify",
    "Login now",
    "Update immediately",
    "Click the secure link below",
    "Download attachment to verify",
];

const PHISHING_DOMAINS: &[&str] = &[
    "company-secure.net",
    "enterprise-verify.com",
    "secure-business.org",
    "account-verify.net",
    "security-alert.com",
];

// Common patterns in legitimate emails
const LEGITIMATE_GREETINGS: &[&str] = &["Hi", "Hello", "Good morning", "Dear", "Greetings"];

const LEGITIMATE_TOPICS: &[&str] = &[
    "Weekly team update",
    "Meeting summary",
    "Project status",
    "New feature announcement",
    "Company newsletter",
];

const LEGITIMATE_CLOSINGS: &[&str] = &["Best regards", "Thanks", "Sincerely", "Regards", "Cheers"];

const NAMES: &[&str] = &[
    "John", "Emma", "Michael", "Sarah", "David", "Lisa", "James", "Emily", "Robert", "Jessica",
];

/// Summary of a generated dataset split
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitSummary {
    pub train: usize,
    pub val: usize,
    pub test: usize,
}

/// Generator for synthetic labeled email records
pub struct SyntheticGenerator {
    rng: StdRng,
}

impl SyntheticGenerator {
    /// Create a generator seeded from the OS
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
        }
    }

    /// Create a generator with a seed for reproducibility
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    fn pick<'a>(&mut self, pool: &[&'a str]) -> &'a str {
        pool[self.rng.random_range(0..pool.len())]
    }

    /// Generate one synthetic phishing email
    fn phishing_record(&mut self) -> EmailRecord {
        let greeting = self.pick(PHISHING_GREETINGS);
        let hook = self.pick(PHISHING_HOOKS);
        let urgency = self.pick(PHISHING_URGENCY);
        let threat = self.pick(PHISHING_THREATS);
        let cta = self.pick(PHISHING_CALLS_TO_ACTION);
        let sender = format!("security@{}", self.pick(PHISHING_DOMAINS));

        let content = format!(
            "{greeting},\n\n{urgency}\n\n{hook}. {threat}.\n\n{cta}\n\nBest regards,\nAccount Security Team"
        );

        let subject = format!("URGENT: {hook}");

        let analysis = format!(
            "This is a phishing email because:\n\
             1. Uses urgent language (\"{urgency}\")\n\
             2. Generic greeting (\"{greeting}\")\n\
             3. Contains threats (\"{threat}\")\n\
             4. Suspicious sender domain ({sender})\n\
             5. Pressures user to take immediate action (\"{cta}\")\n\
             6. Lacks personalization and specific details\n\
             7. Uses fear tactics to manipulate the recipient"
        );

        EmailRecord {
            content,
            subject,
            is_phishing: true,
            analysis,
        }
    }

    /// Generate one synthetic legitimate business email
    fn legitimate_record(&mut self) -> EmailRecord {
        let name = self.pick(NAMES);
        let greeting_word = self.pick(LEGITIMATE_GREETINGS);
        let greeting = match greeting_word {
            "Hi" | "Hello" | "Dear" => format!("{greeting_word} {name}"),
            other => other.to_string(),
        };
        let topic = self.pick(LEGITIMATE_TOPICS);
        let closing = self.pick(LEGITIMATE_CLOSINGS);
        let signer = self.pick(NAMES);

        let content = format!(
            "{greeting},\n\n\
             I hope this email finds you well. I wanted to share an update regarding our {}.\n\n\
             We've made significant progress and I'd like to schedule a meeting to discuss the details.\n\
             Please let me know what times work best for you this week.\n\n\
             {closing},\n{signer}",
            topic.to_lowercase()
        );

        let subject = format!("Re: {topic}");

        let analysis = "This is a legitimate email because:\n\
             1. Uses personal greeting with recipient's name\n\
             2. Natural and professional language\n\
             3. Legitimate business domain\n\
             4. Clear business context\n\
             5. No urgent calls to action\n\
             6. No suspicious links or attachments\n\
             7. Includes sender's name and proper signature\n\
             8. Requests normal business interaction (meeting)"
            .to_string();

        EmailRecord {
            content,
            subject,
            is_phishing: false,
            analysis,
        }
    }

    /// Generate a shuffled dataset of `count` records
    ///
    /// `floor(count * phishing_ratio)` records are phishing; the remainder
    /// are legitimate. All phishing records are generated first, then all
    /// legitimate, then the full sequence is shuffled once.
    pub fn generate(&mut self, count: usize, phishing_ratio: f64) -> Vec<EmailRecord> {
        let num_phishing = (count as f64 * phishing_ratio) as usize;
        let num_legitimate = count - num_phishing;

        let mut dataset = Vec::with_capacity(count);
        for _ in 0..num_phishing {
            dataset.push(self.phishing_record());
        }
        for _ in 0..num_legitimate {
            dataset.push(self.legitimate_record());
        }

        dataset.shuffle(&mut self.rng);
        dataset
    }
}

impl Default for SyntheticGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Split records 80/10/10 into train/val/test
///
/// Train and val sizes use integer floor; test takes the remainder. For
/// very small inputs a split can come out empty.
pub fn split_dataset(
    records: Vec<EmailRecord>,
) -> (Vec<EmailRecord>, Vec<EmailRecord>, Vec<EmailRecord>) {
    let n = records.len();
    let train_size = n * 8 / 10;
    let val_size = n / 10;

    let mut records = records;
    let test: Vec<EmailRecord> = records.split_off(train_size + val_size);
    let val: Vec<EmailRecord> = records.split_off(train_size);
    let train = records;

    (train, val, test)
}

/// Split records and write one JSONL file per split to `dir`
///
/// Writes `train.jsonl`, `val.jsonl` and `test.jsonl`. Fails with an I/O
/// error if the target is not writable.
pub fn write_splits(records: Vec<EmailRecord>, dir: &Path) -> Result<SplitSummary> {
    std::fs::create_dir_all(dir)?;

    let (train, val, test) = split_dataset(records);

    write_jsonl(&train, &dir.join("train.jsonl"))?;
    write_jsonl(&val, &dir.join("val.jsonl"))?;
    write_jsonl(&test, &dir.join("test.jsonl"))?;

    Ok(SplitSummary {
        train: train.len(),
        val: val.len(),
        test: test.len(),
    })
}
