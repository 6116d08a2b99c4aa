use tfharden::data::{DiffOp, DiffResult, DiffTag};
use std::ops::Range;

struct Span<'a> {
    op: &'a DiffOp,
    old: Range<usize>,
    new: Range<usize>,
}

impl Span<'_> {
    fn whole(op: &DiffOp) -> Span<'_> {
        Span {
            op,
            old: op.old.clone(),
            new: op.new.clone(),
        }
    }

    fn old_lines(&self) -> &[String] {
        let base = self.op.old.start;
        &self.op.old_lines[self.old.start - base..self.old.end - base]
    }

    fn new_lines(&self) -> &[String] {
        let base = self.op.new.start;
        &self.op.new_lines[self.new.start - base..self.new.end - base]
    }
}

/// Splits the op sequence into hunks with at most `context` equal lines
/// around each change.
fn grouped(diff: &DiffResult, context: usize) -> Vec<Vec<Span<'_>>> {
    let mut spans: Vec<Span<'_>> = diff.ops.iter().map(Span::whole).collect();
    if spans.is_empty() || diff.is_unchanged() {
        return Vec::new();
    }

    if let Some(first) = spans.first_mut() {
        if first.op.tag == DiffTag::Equal {
            first.old.start = first.old.start.max(first.old.end.saturating_sub(context));
            first.new.start = first.new.start.max(first.new.end.saturating_sub(context));
        }
    }
    if let Some(last) = spans.last_mut() {
        if last.op.tag == DiffTag::Equal {
            last.old.end = last.old.end.min(last.old.start + context);
            last.new.end = last.new.end.min(last.new.start + context);
        }
    }

    let mut groups = Vec::new();
    let mut group = Vec::new();

    for mut span in spans {
        if span.op.tag == DiffTag::Equal && span.old.len() > context * 2 {
            group.push(Span {
                op: span.op,
                old: span.old.start..(span.old.start + context).min(span.old.end),
                new: span.new.start..(span.new.start + context).min(span.new.end),
            });
            groups.push(std::mem::take(&mut group));
            span.old.start = span.old.start.max(span.old.end.saturating_sub(context));
            span.new.start = span.new.start.max(span.new.end.saturating_sub(context));
        }
        group.push(span);
    }

    let only_equal = group.len() == 1 && group[0].op.tag == DiffTag::Equal;
    if !group.is_empty() && !only_equal {
        groups.push(group);
    }

    groups
        .into_iter()
        .filter(|g| g.iter().any(|s| s.op.tag != DiffTag::Equal))
        .collect()
}

fn format_range(range: &Range<usize>) -> String {
    let start = range.start + 1;
    match range.len() {
        0 => format!("{},0", range.start),
        1 => format!("{}", start),
        len => format!("{},{}", start, len),
    }
}

/// Unified diff text. Empty when nothing changed.
pub fn unified(diff: &DiffResult, old_label: &str, new_label: &str, context: usize) -> String {
    let groups = grouped(diff, context);
    if groups.is_empty() {
        return String::new();
    }

    let mut out = format!("--- {}\n+++ {}\n", old_label, new_label);
    for group in groups {
        let (Some(first), Some(last)) = (group.first(), group.last()) else {
            continue;
        };
        let old = first.old.start..last.old.end;
        let new = first.new.start..last.new.end;
        out.push_str(&format!("@@ -{} +{} @@\n", format_range(&old), format_range(&new)));

        for span in &group {
            if span.op.tag == DiffTag::Equal {
                for line in span.old_lines() {
                    out.push_str(&format!(" {}\n", line));
                }
                continue;
            }
            for line in span.old_lines() {
                out.push_str(&format!("-{}\n", line));
            }
            for line in span.new_lines() {
                out.push_str(&format!("+{}\n", line));
            }
        }
    }

    out
}

/// One-line change count, e.g. `+3 -1`.
pub fn summary(diff: &DiffResult) -> String {
    if diff.is_unchanged() {
        "no changes".to_string()
    } else {
        format!("+{} -{}", diff.inserted_lines(), diff.deleted_lines())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tfharden::contexts::diff_texts;

    #[test]
    fn unchanged_renders_nothing() {
        let diff = diff_texts("a\nb", "a\nb");
        assert_eq!(unified(&diff, "a", "b", 3), "");
        assert_eq!(summary(&diff), "no changes");
    }

    #[test]
    fn single_hunk_with_context() {
        let original = "1\n2\n3\n4\n5\n6\n7\n8\n9";
        let updated = "1\n2\n3\n4\nfive\n6\n7\n8\n9";
        let text = unified(&diff_texts(original, updated), "old", "new", 2);
        assert_eq!(
            text,
            "--- old\n+++ new\n@@ -3,5 +3,5 @@\n 3\n 4\n-5\n+five\n 6\n 7\n"
        );
    }

    #[test]
    fn distant_changes_split_into_hunks() {
        let original = (1..=20).map(|n| n.to_string()).collect::<Vec<_>>().join("\n");
        let updated = (1..=20)
            .map(|n| match n {
                2 => "two".to_string(),
                19 => "nineteen".to_string(),
                n => n.to_string(),
            })
            .collect::<Vec<_>>()
            .join("\n");
        let text = unified(&diff_texts(&original, &updated), "old", "new", 1);
        assert_eq!(text.matches("@@ ").count(), 2, "{text}");
        assert!(text.contains("-2\n+two\n"));
        assert!(text.contains("-19\n+nineteen\n"));
    }

    #[test]
    fn insertion_into_empty_file() {
        let text = unified(&diff_texts("", "a\nb"), "old", "new", 3);
        assert_eq!(text, "--- old\n+++ new\n@@ -0,0 +1,2 @@\n+a\n+b\n");
    }
}
