use crate::data::ModuleReference;
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;

fn module_header_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"\bmodule\s+"([^"]+)"\s*\{"#).expect("valid regex"))
}

fn source_attr_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"\bsource\s*=\s*"([^"\r\n]+)""#).expect("valid regex"))
}

/// Finds `module "<name>" { ... source = "<path>" ... }` declarations in `content`.
///
/// This is a lexical scan, not an HCL parser. `#`, `//` and `/* */`
/// comments are blanked out first. Block bodies are delimited by brace
/// counting outside of string literals; an unterminated block runs to the
/// end of the text. A `source` at the block's top level wins over one in a
/// nested block. Declarations without a quoted `source` are skipped.
pub fn extract_module_references(declaring_file: &Path, content: &str) -> Vec<ModuleReference> {
    let code = mask_comments(content);
    let mut references = Vec::new();

    for captures in module_header_re().captures_iter(&code) {
        let (Some(header), Some(name)) = (captures.get(0), captures.get(1)) else {
            continue;
        };
        let body = block_body(&code, header.end());

        if let Some(source) = find_source(body) {
            references.push(ModuleReference {
                declaring_file: declaring_file.to_path_buf(),
                name: name.as_str().to_string(),
                source,
            });
        }
    }

    references
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mask {
    Code,
    String { escaped: bool },
    LineComment,
    BlockComment,
}

/// Copy of `content` with every comment replaced by spaces.
///
/// Byte offsets and line breaks are kept. String literals are copied as is,
/// so `#` or `//` inside a quoted source survives.
fn mask_comments(content: &str) -> String {
    let mut out = String::with_capacity(content.len());
    let mut chars = content.chars().peekable();
    let mut mode = Mask::Code;

    while let Some(c) = chars.next() {
        mode = match mode {
            Mask::Code => match c {
                '"' => {
                    out.push(c);
                    Mask::String { escaped: false }
                }
                '#' => {
                    blank(&mut out, c);
                    Mask::LineComment
                }
                '/' if chars.peek() == Some(&'/') => {
                    blank(&mut out, c);
                    Mask::LineComment
                }
                '/' if chars.peek() == Some(&'*') => {
                    chars.next();
                    out.push_str("  ");
                    Mask::BlockComment
                }
                _ => {
                    out.push(c);
                    Mask::Code
                }
            },
            Mask::String { escaped } => {
                out.push(c);
                match c {
                    '\n' => Mask::Code,
                    _ if escaped => Mask::String { escaped: false },
                    '\\' => Mask::String { escaped: true },
                    '"' => Mask::Code,
                    _ => Mask::String { escaped: false },
                }
            }
            Mask::LineComment => {
                blank(&mut out, c);
                if c == '\n' { Mask::Code } else { Mask::LineComment }
            }
            Mask::BlockComment => {
                if c == '*' && chars.peek() == Some(&'/') {
                    chars.next();
                    out.push_str("  ");
                    Mask::Code
                } else {
                    blank(&mut out, c);
                    Mask::BlockComment
                }
            }
        };
    }

    out
}

fn blank(out: &mut String, c: char) {
    if c == '\n' {
        out.push('\n');
    } else {
        out.extend(std::iter::repeat_n(' ', c.len_utf8()));
    }
}

/// Text between the opening brace (ending at `start`) and its matching close.
fn block_body(content: &str, start: usize) -> &str {
    let rest = &content[start..];
    let mut scan = LexState::default();

    for (offset, c) in rest.char_indices() {
        if scan.feed(c) && scan.depth == 0 {
            return &rest[..offset];
        }
    }

    rest
}

fn find_source(body: &str) -> Option<String> {
    let mut nested = None;

    for captures in source_attr_re().captures_iter(body) {
        let (Some(attr), Some(value)) = (captures.get(0), captures.get(1)) else {
            continue;
        };
        let state = LexState::scan(&body[..attr.start()]);
        if state.in_string {
            continue;
        }
        if state.depth == 1 {
            return Some(value.as_str().to_string());
        }
        if nested.is_none() {
            nested = Some(value.as_str().to_string());
        }
    }

    nested
}

/// Brace depth relative to the block's opening brace, tracking string literals.
/// Strings end at a newline so a stray quote cannot swallow the rest of the file.
struct LexState {
    depth: usize,
    in_string: bool,
    escaped: bool,
}

impl Default for LexState {
    fn default() -> Self {
        Self {
            depth: 1,
            in_string: false,
            escaped: false,
        }
    }
}

impl LexState {
    fn scan(text: &str) -> Self {
        let mut state = Self::default();
        for c in text.chars() {
            state.feed(c);
        }
        state
    }

    /// Consumes one char. Returns `true` when it closed a brace.
    fn feed(&mut self, c: char) -> bool {
        if self.in_string {
            if c == '\n' {
                self.in_string = false;
            } else if self.escaped {
                self.escaped = false;
            } else if c == '\\' {
                self.escaped = true;
            } else if c == '"' {
                self.in_string = false;
            }
            return false;
        }

        match c {
            '"' => self.in_string = true,
            '{' => self.depth += 1,
            '}' => {
                self.depth = self.depth.saturating_sub(1);
                return true;
            }
            _ => {}
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn refs(content: &str) -> Vec<(String, String)> {
        extract_module_references(Path::new("/r/main.tf"), content)
            .into_iter()
            .map(|r| (r.name, r.source))
            .collect()
    }

    #[test]
    fn single_line_block() {
        assert_eq!(
            refs(r#"module "vpc" { source = "../../modules/vpc" }"#),
            vec![("vpc".to_string(), "../../modules/vpc".to_string())]
        );
    }

    #[test]
    fn source_after_other_attributes() {
        let content = r#"
module "vpc" {
  name = "main"
  cidr = "10.0.0.0/16"

  source  = "./modules/vpc"
  azs = ["a", "b"]
}
"#;
        assert_eq!(
            refs(content),
            vec![("vpc".to_string(), "./modules/vpc".to_string())]
        );
    }

    #[test]
    fn multiple_declarations_in_one_file() {
        let content = r#"
module "a" {
  source = "./a"
}

resource "aws_s3_bucket" "b" {
  bucket = "x"
}

module "b" {
  version = "~> 5.0"
  source  = "terraform-aws-modules/vpc/aws"
}
"#;
        assert_eq!(
            refs(content),
            vec![
                ("a".to_string(), "./a".to_string()),
                ("b".to_string(), "terraform-aws-modules/vpc/aws".to_string()),
            ]
        );
    }

    #[test]
    fn nested_blocks_before_source_are_tolerated() {
        let content = r#"
module "sg" {
  tags = {
    Name = "x"
  }
  source = "../modules/sg"
}
"#;
        assert_eq!(refs(content), vec![("sg".to_string(), "../modules/sg".to_string())]);
    }

    #[test]
    fn top_level_source_wins_over_nested() {
        let content = r#"
module "m" {
  settings = { source = "nested" }
  source = "./real"
}
"#;
        assert_eq!(refs(content), vec![("m".to_string(), "./real".to_string())]);
    }

    #[test]
    fn missing_source_is_not_matched() {
        let content = r#"
module "broken" {
  name = "x"
}

module "ok" {
  source = "./ok"
}
"#;
        assert_eq!(refs(content), vec![("ok".to_string(), "./ok".to_string())]);
    }

    #[test]
    fn unterminated_source_string_yields_nothing() {
        let content = "module \"broken\" {\n  source = \"./half\n}\n";
        assert!(refs(content).is_empty());
    }

    #[test]
    fn other_attribute_names_ending_in_source_are_ignored() {
        let content = r#"module "m" { data_source = "./nope" }"#;
        assert!(refs(content).is_empty());
    }

    #[test]
    fn records_declaring_file() {
        let found = extract_module_references(
            Path::new("/r/examples/basic/main.tf"),
            r#"module "vpc" { source = "../../modules/vpc" }"#,
        );
        assert_eq!(found[0].declaring_file, Path::new("/r/examples/basic/main.tf"));
    }

    #[test]
    fn hash_comment_before_real_source() {
        let content = "module \"vpc\" {\n  # source = \"terraform-aws-modules/vpc/aws\"\n  source = \"../../\"\n}\n";
        assert_eq!(refs(content), vec![("vpc".to_string(), "../../".to_string())]);
    }

    #[test]
    fn double_slash_comment_before_real_source() {
        let content = "module \"m\" {\n  // source = \"./old\"\n  source = \"./new\"\n}\n";
        assert_eq!(refs(content), vec![("m".to_string(), "./new".to_string())]);
    }

    #[test]
    fn block_comment_with_braces_is_skipped() {
        let content = "module \"m\" {\n  /* previously:\n  source = \"./old\" }\n  */\n  source = \"./new\"\n}\n";
        assert_eq!(refs(content), vec![("m".to_string(), "./new".to_string())]);
    }

    #[test]
    fn commented_out_module_is_ignored() {
        let content = "# module \"old\" {\n#   source = \"./old\"\n# }\nmodule \"new\" { source = \"./new\" }\n";
        assert_eq!(refs(content), vec![("new".to_string(), "./new".to_string())]);
    }

    #[test]
    fn comment_markers_inside_strings_are_kept() {
        let content = "module \"m\" {\n  source = \"git::https://example.com/repo.git//modules/vpc?ref=v1#x\" # pinned\n}\n";
        assert_eq!(
            refs(content),
            vec![(
                "m".to_string(),
                "git::https://example.com/repo.git//modules/vpc?ref=v1#x".to_string()
            )]
        );
    }

    #[test]
    fn masking_keeps_offsets() {
        let content = "a = 1 # café\nb = \"#\" /* x\ny */ c\n";
        let masked = mask_comments(content);
        assert_eq!(masked.len(), content.len());
        assert_eq!(masked.lines().count(), content.lines().count());
        assert!(masked.starts_with("a = 1 "));
        assert!(masked.contains("b = \"#\""));
        assert!(masked.ends_with(" c\n"));
        assert!(!masked.contains("café"));
    }
}
