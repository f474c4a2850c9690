//! JSON isolation: carve the array of records out of the model response.
//!
//! ## Why a scanner and not a regex?
//!
//! Models wrap their answer in prose ("Here is the extracted data:"),
//! markdown fences, or trailing commentary, and cell values themselves may
//! contain `[`, `]`, and escaped quotes. A single non-greedy regex either
//! over-matches across two arrays or dies on a bracket inside a string.
//! The scanner below walks the text once per `[` candidate, tracking
//! string and escape state, and hands back a *balanced* candidate — the
//! first one that actually parses as a JSON array wins.
//!
//! Isolation and parsing are separate stages on purpose: if every
//! candidate is balanced but none parses, the best candidate is still
//! returned so the normalizer can report the parse error against the real
//! payload (and the debug artifact preserves it verbatim).

use crate::error::Scan2SheetError;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:json)?\n(.*)\n```\s*$").unwrap());

/// Isolate the JSON array substring from a raw model response.
///
/// Returns the isolated substring; parsing it is the normalizer's job.
/// Fails with [`Scan2SheetError::NoJsonArray`] only when no balanced
/// bracket pair containing an object brace exists anywhere in the text.
pub fn isolate_json_array(response: &str) -> Result<String, Scan2SheetError> {
    let text = strip_code_fences(response);

    let mut fallback: Option<&str> = None;
    for (start, _) in text.match_indices('[') {
        let Some(candidate) = balanced_slice(&text[start..]) else {
            continue;
        };
        // First candidate that parses as *some* JSON array wins; whether
        // its elements are flat records is the normalizer's call.
        if serde_json::from_str::<serde_json::Value>(candidate)
            .map(|v| v.is_array())
            .unwrap_or(false)
        {
            debug!("Isolated JSON array: {} bytes", candidate.len());
            return Ok(candidate.to_string());
        }
        if fallback.is_none() && candidate.contains('{') {
            fallback = Some(candidate);
        }
    }

    if let Some(candidate) = fallback {
        debug!(
            "No candidate parsed; passing best-effort slice of {} bytes downstream",
            candidate.len()
        );
        return Ok(candidate.to_string());
    }

    Err(Scan2SheetError::NoJsonArray {
        snippet: snippet(response),
    })
}

/// Strip an outer markdown code fence (models sometimes disobey the
/// "raw JSON only" rule).
fn strip_code_fences(input: &str) -> String {
    if let Some(caps) = RE_OUTER_FENCES.captures(input.trim()) {
        caps[1].to_string()
    } else {
        input.to_string()
    }
}

/// From a slice starting at `[`, return the prefix up to and including the
/// matching `]`, honouring JSON string and escape rules. `None` when the
/// bracket never closes.
fn balanced_slice(text: &str) -> Option<&str> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '[' => depth += 1,
            ']' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[..i + c.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}

/// First line or so of the response, for the error message.
fn snippet(response: &str) -> String {
    let trimmed = response.trim();
    let mut end = trimmed.len().min(120);
    while !trimmed.is_char_boundary(end) {
        end -= 1;
    }
    trimmed[..end].to_string()
}
