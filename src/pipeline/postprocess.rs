//! Deterministic cleanup of model-formatted Markdown.
//!
//! The formatting model is told not to wrap its answer in fences and not to
//! add commentary, but it still does both now and then. These passes undo the
//! mechanical part of that without touching content:
//!
//! 1. CRLF / CR → LF
//! 2. strip one outer ```` ```markdown ```` fence pair
//! 3. trailing whitespace per line, outside code and hard breaks
//! 4. a blank line before every ATX heading
//! 5. runs of blank lines collapse to one
//! 6. zero-width characters, BOM and soft hyphens removed
//! 7. exactly one trailing newline (empty stays empty)
//!
//! Only refined output goes through here. The raw fallback is written as the
//! converter produced it.

use once_cell::sync::Lazy;
use regex::Regex;

static RE_OUTER_FENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)\A```[ \t]*(markdown|md)?[ \t]*\n(.*?)\n?```[ \t]*\z")
        .expect("fence pattern")
});

static RE_BLANK_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").expect("blank-run pattern"));

static RE_HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"^#{1,6}(\s|$)").expect("heading pattern"));

const INVISIBLE: [char; 6] = [
    '\u{200B}', '\u{200C}', '\u{200D}', '\u{2060}', '\u{FEFF}', '\u{00AD}',
];

/// Run every cleanup pass in order.
pub fn tidy_markdown(input: &str) -> String {
    let s = normalise_line_endings(input);
    let s = strip_outer_fence(&s);
    let s = trim_trailing_whitespace(&s);
    let s = space_headings(&s);
    let s = collapse_blank_lines(&s);
    let s = remove_invisible_chars(&s);
    finish_with_newline(&s)
}

/// An untagged opening fence only counts as a wrapper when the body holds
/// no other fence; otherwise it is the first of several code blocks.
fn strip_outer_fence(input: &str) -> String {
    let Some(caps) = RE_OUTER_FENCE.captures(input.trim()) else {
        return input.to_string();
    };
    let body = &caps[2];
    let tagged = caps.get(1).is_some();
    if tagged || !body.lines().any(|l| l.trim_start().starts_with("```")) {
        body.to_string()
    } else {
        input.to_string()
    }
}

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

/// Lines inside fenced code are kept verbatim. Two or more trailing spaces
/// before a non-blank line are a hard break and become exactly two.
fn trim_trailing_whitespace(input: &str) -> String {
    let lines: Vec<&str> = input.lines().collect();
    let mut out = Vec::with_capacity(lines.len());
    let mut in_code = false;
    for (i, line) in lines.iter().enumerate() {
        if line.trim_start().starts_with("```") {
            in_code = !in_code;
            out.push(line.trim_end().to_string());
            continue;
        }
        if in_code {
            out.push(line.to_string());
            continue;
        }
        let trimmed = line.trim_end();
        let hard_break = !trimmed.is_empty()
            && line.ends_with("  ")
            && lines.get(i + 1).is_some_and(|next| !next.trim().is_empty());
        if hard_break {
            out.push(format!("{trimmed}  "));
        } else {
            out.push(trimmed.to_string());
        }
    }
    out.join("\n")
}

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_RUN.replace_all(input, "\n\n").into_owned()
}

/// Headings inside fenced code blocks are left alone.
fn space_headings(input: &str) -> String {
    let mut out: Vec<&str> = Vec::new();
    let mut in_code = false;
    for line in input.lines() {
        if line.trim_start().starts_with("```") {
            in_code = !in_code;
        }
        let heading = !in_code && RE_HEADING.is_match(line);
        if heading && out.last().is_some_and(|prev| !prev.is_empty()) {
            out.push("");
        }
        out.push(line);
    }
    out.join("\n")
}

fn remove_invisible_chars(input: &str) -> String {
    input.replace(&INVISIBLE[..], "")
}

fn finish_with_newline(input: &str) -> String {
    let trimmed = input.trim_end();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{trimmed}\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_markdown_fence() {
        assert_eq!(strip_outer_fence("```markdown\n# A\nb\n```"), "# A\nb");
        assert_eq!(strip_outer_fence("```\n# A\n```\n"), "# A");
    }

    #[test]
    fn inner_code_block_is_kept() {
        let input = "# A\n\n```rust\nfn main() {}\n```\n";
        assert_eq!(strip_outer_fence(input), input);
    }

    #[test]
    fn separate_code_blocks_are_not_a_wrapper() {
        let input = "```\nlet a = 1;\n```\n\nSome prose.\n\n```\nlet b = 2;\n```";
        assert_eq!(strip_outer_fence(input), input);
        assert_eq!(tidy_markdown(input), format!("{input}\n"));
    }

    #[test]
    fn tagged_wrapper_keeps_inner_code() {
        let input = "```markdown\n# A\n\n```rust\nfn f() {}\n```\n```";
        assert_eq!(strip_outer_fence(input), "# A\n\n```rust\nfn f() {}\n```");
    }

    #[test]
    fn code_and_hard_breaks_keep_trailing_spaces() {
        let input = "```text\ncol1    \n```   \nline one   \nline two \nend  \n";
        assert_eq!(
            trim_trailing_whitespace(input),
            "```text\ncol1    \n```\nline one  \nline two\nend"
        );
    }

    #[test]
    fn blank_runs_collapse_to_one() {
        assert_eq!(collapse_blank_lines("a\n\n\n\n\nb"), "a\n\nb");
        assert_eq!(collapse_blank_lines("a\n\nb"), "a\n\nb");
    }

    #[test]
    fn headings_get_a_blank_line_before() {
        assert_eq!(space_headings("text\n## Rules\nmore"), "text\n\n## Rules\nmore");
        assert_eq!(space_headings("# First\nbody"), "# First\nbody");
    }

    #[test]
    fn hashtag_and_code_comments_are_not_headings() {
        assert_eq!(space_headings("see\n#hashtag"), "see\n#hashtag");
        let code = "```sh\necho hi\n# comment\n```";
        assert_eq!(space_headings(code), code);
    }

    #[test]
    fn invisible_chars_removed() {
        assert_eq!(remove_invisible_chars("a\u{200B}b\u{FEFF}c\u{00AD}d"), "abcd");
    }

    #[test]
    fn empty_stays_empty() {
        assert_eq!(tidy_markdown(""), "");
        assert_eq!(tidy_markdown("  \n\n "), "");
    }

    #[test]
    fn full_pass() {
        let input = "```markdown\r\n# Title\r\nIntro   \r\n\r\n\r\n\r\n## Section\r\nBody\u{200B}\r\n```";
        assert_eq!(tidy_markdown(input), "# Title\nIntro\n\n## Section\nBody\n");
    }
}
