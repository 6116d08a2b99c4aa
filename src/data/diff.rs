use serde::Serialize;
use std::ops::Range;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffTag {
    Equal,
    Insert,
    Delete,
    Replace,
}

/// One contiguous line-range operation.
///
/// `old` indexes the original lines, `new` the replacement lines. For
/// `Insert` the `old` range is empty, for `Delete` the `new` range is empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffOp {
    pub tag: DiffTag,
    pub old: Range<usize>,
    pub new: Range<usize>,
    pub old_lines: Vec<String>,
    pub new_lines: Vec<String>,
}

/// Line-level difference between an original and a replacement text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiffResult {
    pub ops: Vec<DiffOp>,
}

impl DiffResult {
    /// True when every op is `Equal` (vacuously true for two empty texts).
    pub fn is_unchanged(&self) -> bool {
        self.ops.iter().all(|op| op.tag == DiffTag::Equal)
    }

    pub fn inserted_lines(&self) -> usize {
        self.ops
            .iter()
            .filter(|op| matches!(op.tag, DiffTag::Insert | DiffTag::Replace))
            .map(|op| op.new.len())
            .sum()
    }

    pub fn deleted_lines(&self) -> usize {
        self.ops
            .iter()
            .filter(|op| matches!(op.tag, DiffTag::Delete | DiffTag::Replace))
            .map(|op| op.old.len())
            .sum()
    }

    /// Rebuilds the replacement from the original lines plus the op sequence.
    pub fn apply_to_original<S: AsRef<str>>(&self, original: &[S]) -> Vec<String> {
        let mut out = Vec::new();
        for op in &self.ops {
            match op.tag {
                DiffTag::Equal => out.extend(
                    original[op.old.clone()]
                        .iter()
                        .map(|l| l.as_ref().to_string()),
                ),
                DiffTag::Insert | DiffTag::Replace => out.extend(op.new_lines.iter().cloned()),
                DiffTag::Delete => {}
            }
        }
        out
    }

    /// Rebuilds the original from the replacement lines plus the op sequence.
    pub fn apply_to_replacement<S: AsRef<str>>(&self, replacement: &[S]) -> Vec<String> {
        let mut out = Vec::new();
        for op in &self.ops {
            match op.tag {
                DiffTag::Equal => out.extend(
                    replacement[op.new.clone()]
                        .iter()
                        .map(|l| l.as_ref().to_string()),
                ),
                DiffTag::Delete | DiffTag::Replace => out.extend(op.old_lines.iter().cloned()),
                DiffTag::Insert => {}
            }
        }
        out
    }
}
