//! Parser for the line protocol printed by the analysis script.
//!
//! Each line is `|`-delimited. The first field is a one-character tag:
//!
//! | Tag | Fields | Meaning |
//! |-----|--------|---------|
//! | `C` | `names,}}` | Comma-separated collection names, followed by a 2-char terminator |
//! | `P` | (ignored) | The file contains packed textures |
//! | `M` | `object`, `issues}}` | Comma-separated material issues for one object, 2-char terminator |
//!
//! Anything else (Blender's own chatter, unknown tags, short lines) is skipped.

use crate::models::{AnalysisResult, MaterialWarning};

/// Number of trailing characters that terminate a `C` or `M` payload
const PAYLOAD_TERMINATOR_LEN: usize = 2;

/// Decode the analysis script's output. Never fails; malformed lines are skipped.
pub fn parse_analysis_output(output: &str) -> AnalysisResult {
    let mut result = AnalysisResult::default();

    for line in output.lines() {
        let fields: Vec<&str> = line.split('|').collect();
        if fields.len() < 2 {
            continue;
        }

        let mut tag_chars = fields[0].chars();
        let tag = match (tag_chars.next(), tag_chars.next()) {
            (Some(tag), None) => tag,
            _ => {
                tracing::trace!("Skipping untagged line: {}", line);
                continue;
            }
        };

        match tag {
            'C' => {
                let names = strip_terminator(fields[1]);
                for name in names.split(',').filter(|name| !name.is_empty()) {
                    result.collections.insert(name.to_string());
                }
            }
            'P' => result.is_packed = true,
            'M' => {
                let Some(issues) = fields.get(2) else {
                    tracing::trace!("Skipping material line without issues: {}", line);
                    continue;
                };
                let issue = strip_terminator(issues).replace(',', ", ");
                result
                    .material_warnings
                    .push(MaterialWarning::new(fields[1], issue));
            }
            _ => tracing::trace!("Skipping unknown tag '{}'", tag),
        }
    }

    tracing::debug!(
        "Parsed analysis - collections: {}, material warnings: {}, packed: {}",
        result.collections.len(),
        result.material_warnings.len(),
        result.is_packed
    );

    result
}

fn strip_terminator(payload: &str) -> &str {
    match payload.char_indices().rev().nth(PAYLOAD_TERMINATOR_LEN - 1) {
        Some((idx, _)) => &payload[..idx],
        None => "",
    }
}
