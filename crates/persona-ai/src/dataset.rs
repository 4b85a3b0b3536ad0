//! Loader for the labelled persona dataset.
//!
//! The file is `;`-separated and Latin-1 encoded, with a header row and
//! columns `bio;posts;persona`. Fields may be double-quoted so the posts column
//! can carry its own `;` separators.

use std::path::Path;

use anyhow::Context;
use persona_core::TrainingExample;
use tracing::{debug, info};

const SEPARATOR: u8 = b';';

/// Load training examples from a dataset file.
pub fn load_examples(path: &Path) -> anyhow::Result<Vec<TrainingExample>> {
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let examples = parse_examples(&decode_latin1(&bytes))
        .with_context(|| format!("parsing {}", path.display()))?;
    info!(count = examples.len(), path = %path.display(), "loaded training examples");
    Ok(examples)
}

/// Parse dataset text (header row included) into examples.
///
/// Blank lines are skipped. Quoted fields keep separators and newlines, and
/// `""` inside quotes is a literal quote.
pub fn parse_examples(content: &str) -> anyhow::Result<Vec<TrainingExample>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(SEPARATOR)
        .has_headers(true)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut examples = Vec::new();
    for record in reader.records() {
        let record = record.context("malformed record")?;
        let line = record.position().map_or(0, |p| p.line());
        let fields: Vec<&str> = record.iter().collect();
        let n = fields.len();
        anyhow::ensure!(
            n >= 3,
            "line {line}: expected 3 columns (bio;posts;persona), found {n}"
        );
        // Unquoted posts containing `;` split into extra columns: the first field
        // is the bio, the last is the persona, everything between is posts.
        if n > 3 {
            debug!(line, fields = n, "re-joining unquoted posts field");
        }
        let example = TrainingExample {
            bio: fields[0].to_string(),
            posts: fields[1..n - 1].join(";"),
            persona: fields[n - 1].trim().to_string(),
        };

        anyhow::ensure!(
            !example.persona.is_empty(),
            "line {line}: empty persona label"
        );
        examples.push(example);
    }

    anyhow::ensure!(!examples.is_empty(), "dataset contains no examples");
    Ok(examples)
}

/// Each byte maps to the Unicode code point of the same value.
fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}
