use crate::data::Replacements;
use regex::Regex;
use std::sync::OnceLock;
use tracing::debug;

fn file_header_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[ \t>#*_]*FILE:[ \t]*(?P<name>[^\r\n]+?)[ \t]*\r?$").expect("valid regex")
    })
}

fn opening_fence_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[ \t]*```[^`\r\n]*\r?$").expect("valid regex"))
}

fn closing_fence_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[ \t]*```[ \t]*\r?$").expect("valid regex"))
}

/// Extracts `FILE: <name>` + fenced block pairs from a model reply.
///
/// The fence language tag is ignored. A later block for the same label
/// replaces an earlier one. A block whose fence is never closed is dropped,
/// and a new `FILE:` header ends it so the next block still parses. Text
/// outside recognised blocks is ignored, so a reply without any block
/// yields an empty mapping.
pub fn parse_response(reply: &str) -> Replacements {
    let lines: Vec<&str> = reply.lines().collect();
    let mut replacements = Replacements::new();
    let mut at = 0;

    while at < lines.len() {
        let Some((label, fence)) = block_start(&lines, at) else {
            at += 1;
            continue;
        };

        let mut end = fence + 1;
        let mut closed = false;
        while end < lines.len() {
            if closing_fence_re().is_match(lines[end]) {
                closed = true;
                break;
            }
            if block_start(&lines, end).is_some() {
                break;
            }
            end += 1;
        }

        if !closed {
            debug!(file = %label, "dropping block without a closing fence");
            at = end;
            continue;
        }

        let content = trim_blank_lines(&lines[fence + 1..end]);
        if replacements.insert(label.clone(), content).is_some() {
            debug!(file = %label, "later block replaces earlier block for the same file");
        }
        at = end + 1;
    }

    replacements
}

/// A `FILE:` line at `at` followed, after optional blank lines, by an
/// opening fence. Returns the cleaned label and the fence's line index.
fn block_start(lines: &[&str], at: usize) -> Option<(String, usize)> {
    let captures = file_header_re().captures(lines[at])?;
    let label = clean_label(captures.name("name")?.as_str())?;
    let fence = (at + 1..lines.len()).find(|&i| !lines[i].trim().is_empty())?;
    opening_fence_re()
        .is_match(lines[fence])
        .then_some((label, fence))
}

/// Strips markdown decoration from a `FILE:` label and normalizes it to a
/// `/`-separated relative path.
fn clean_label(raw: &str) -> Option<String> {
    let trimmed = raw.trim_matches(|c: char| c.is_whitespace() || matches!(c, '*' | '`' | '"' | '\''));
    let unified = trimmed.replace('\\', "/");
    let mut label = unified.as_str();
    loop {
        if let Some(rest) = label.strip_prefix("./") {
            label = rest;
        } else if let Some(rest) = label.strip_prefix('/') {
            label = rest;
        } else {
            break;
        }
    }

    let label = label.trim();
    if label.is_empty() || label.ends_with('/') {
        None
    } else {
        Some(label.to_string())
    }
}

fn trim_blank_lines(lines: &[&str]) -> String {
    let Some(start) = lines.iter().position(|l| !l.trim().is_empty()) else {
        return String::new();
    };
    let end = lines
        .iter()
        .rposition(|l| !l.trim().is_empty())
        .unwrap_or(start);
    lines[start..=end].join("\n")
}
