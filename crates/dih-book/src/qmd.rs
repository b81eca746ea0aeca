//! Extraction primitives over QMD/markdown source.
//!
//! Most extractors run over [`mask_code`] output: front matter, fenced
//! code blocks and inline code spans are blanked with spaces (newlines
//! kept) so byte offsets and line numbers still match the original.

use once_cell::sync::Lazy;
use regex::Regex;

static FENCE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*(`{3,}|~{3,})").unwrap());
static LINK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(!?)\[[^\]]*\]\(\s*<?([^)\s>]+)>?(?:\s+"[^"]*")?\s*\)"#).unwrap()
});
static SCHEME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*:").unwrap());
static VAR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{<\s*var\s+([A-Za-z0-9_.\-]+)\s*>\}\}").unwrap());
static LABEL_ATTR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{[^}\n]*#((?:sec|fig|tbl|eq)-[\w\-]+)").unwrap());
static CHUNK_LABEL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*#\|\s*label:\s*((?:sec|fig|tbl|eq)-[\w\-]+)").unwrap());
static CROSSREF_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|[^\w@])@((?:sec|fig|tbl|eq)-[\w\-]*\w)").unwrap());
static TITLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?m)^title:\s*["']?(.*?)["']?\s*$"#).unwrap());
static HEADING_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^#\s+(.+?)\s*(?:\{[^}]*\})?\s*$").unwrap());

/// A markdown link or image target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub line: usize,
    /// Target with fragment, query and title removed.
    pub target: String,
    pub is_image: bool,
}

/// A `{{< var name >}}` shortcode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableRef {
    pub line: usize,
    pub name: String,
}

/// A cross-reference label definition or use (`fig-x`, `sec-y`, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Label {
    pub line: usize,
    pub id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MathKind {
    Inline,
    Display,
}

/// A math span. `closed` is false when a `$$` block never ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MathSegment {
    pub kind: MathKind,
    pub line: usize,
    pub content: String,
    pub closed: bool,
}

/// Byte length of the YAML front matter block, 0 if there is none.
fn front_matter_len(text: &str) -> usize {
    let Some(rest) = text.strip_prefix("---") else {
        return 0;
    };
    if !(rest.starts_with('\n') || rest.starts_with("\r\n")) {
        return 0;
    }
    let mut offset = 3;
    for line in rest.split_inclusive('\n').skip(1) {
        offset += line.len();
        let trimmed = line.trim_end();
        if trimmed == "---" || trimmed == "..." {
            let first = rest.find('\n').map(|i| i + 1).unwrap_or(0);
            return offset + first;
        }
    }
    0
}

/// Text after the front matter.
pub fn strip_front_matter(text: &str) -> &str {
    &text[front_matter_len(text)..]
}

/// Document title from front matter, else the first level-1 heading.
pub fn title(text: &str) -> Option<String> {
    let fm = &text[..front_matter_len(text)];
    if let Some(cap) = TITLE_RE.captures(fm) {
        let t = cap[1].trim();
        if !t.is_empty() {
            return Some(t.to_string());
        }
    }
    let body = mask_code(text);
    HEADING_RE
        .captures(&body)
        .map(|cap| cap[1].trim().to_string())
}

/// Blank out front matter, fenced code blocks and inline code spans.
pub fn mask_code(text: &str) -> String {
    let fm = front_matter_len(text);
    let mut out = String::with_capacity(text.len());
    out.push_str(&blank(&text[..fm]));

    let mut fence: Option<(char, usize)> = None;
    for line in text[fm..].split_inclusive('\n') {
        if let Some((ch, len)) = fence {
            out.push_str(&blank(line));
            let trimmed = line.trim();
            if trimmed.len() >= len && trimmed.chars().all(|c| c == ch) {
                fence = None;
            }
            continue;
        }
        if let Some(cap) = FENCE_RE.captures(line) {
            let marker = &cap[1];
            let ch = marker.chars().next().unwrap_or('`');
            fence = Some((ch, marker.len()));
            out.push_str(&blank(line));
            continue;
        }
        out.push_str(&mask_inline_code(line));
    }
    out
}

/// Keep newlines, replace every other byte with a space.
fn blank(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if c == '\n' || c == '\r' {
            out.push(c);
        } else {
            out.extend(std::iter::repeat(' ').take(c.len_utf8()));
        }
    }
    out
}

fn mask_inline_code(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut rest = line;
    while let Some(start) = rest.find('`') {
        let ticks = rest[start..].chars().take_while(|&c| c == '`').count();
        let delim = &rest[start..start + ticks];
        let after = &rest[start + ticks..];
        match after.find(delim) {
            Some(end) => {
                out.push_str(&rest[..start]);
                out.push_str(&blank(&rest[start..start + ticks + end + ticks]));
                rest = &after[end + ticks..];
            }
            None => {
                out.push_str(&rest[..start + ticks]);
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// 1-based line number of byte `offset`.
pub(crate) fn line_at(text: &str, offset: usize) -> usize {
    text[..offset].bytes().filter(|&b| b == b'\n').count() + 1
}

/// Local link and image targets. External schemes (`http:`, `mailto:`,
/// `data:`...), pure `#anchors` and shortcode targets are skipped.
pub fn links(text: &str) -> Vec<Link> {
    let masked = mask_code(text);
    let mut out = Vec::new();
    for cap in LINK_RE.captures_iter(&masked) {
        let raw = cap.get(2).map(|m| m.as_str()).unwrap_or("");
        if raw.starts_with('#') || raw.contains("{{") || SCHEME_RE.is_match(raw) {
            continue;
        }
        let target = raw
            .split(|c| c == '#' || c == '?')
            .next()
            .unwrap_or("")
            .replace("%20", " ");
        if target.is_empty() {
            continue;
        }
        let start = cap.get(0).map(|m| m.start()).unwrap_or(0);
        out.push(Link {
            line: line_at(&masked, start),
            target,
            is_image: &cap[1] == "!",
        });
    }
    out
}

/// `{{< var name >}}` shortcodes outside code.
pub fn variable_refs(text: &str) -> Vec<VariableRef> {
    let masked = mask_code(text);
    VAR_RE
        .captures_iter(&masked)
        .map(|cap| {
            let m = cap.get(1).map(|m| (m.start(), m.as_str())).unwrap_or((0, ""));
            VariableRef {
                line: line_at(&masked, m.0),
                name: m.1.to_string(),
            }
        })
        .collect()
}

/// Label definitions: `{#fig-x}` attributes in prose and `#| label:`
/// options inside code chunks.
pub fn labels(text: &str) -> Vec<Label> {
    let masked = mask_code(text);
    let mut out: Vec<Label> = LABEL_ATTR_RE
        .captures_iter(&masked)
        .filter_map(|cap| cap.get(1))
        .map(|m| Label {
            line: line_at(&masked, m.start()),
            id: m.as_str().to_string(),
        })
        .collect();
    for (idx, line) in text.lines().enumerate() {
        if let Some(cap) = CHUNK_LABEL_RE.captures(line) {
            out.push(Label {
                line: idx + 1,
                id: cap[1].to_string(),
            });
        }
    }
    out.sort_by_key(|l| l.line);
    out
}

/// `@fig-x` style references outside code.
pub fn crossrefs(text: &str) -> Vec<Label> {
    let masked = mask_code(text);
    CROSSREF_RE
        .captures_iter(&masked)
        .filter_map(|cap| cap.get(1))
        .map(|m| Label {
            line: line_at(&masked, m.start()),
            id: m.as_str().to_string(),
        })
        .collect()
}

/// Math spans outside code. A `$` followed by a digit or whitespace is a
/// currency sign, not math; an inline span must close on the same line.
pub fn math_segments(text: &str) -> Vec<MathSegment> {
    let masked = mask_code(text);
    let bytes = masked.as_bytes();
    let mut out = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => {
                i += 2;
                continue;
            }
            b'$' if bytes.get(i + 1) == Some(&b'$') => {
                let body_start = i + 2;
                match find_unescaped(&masked, body_start, "$$") {
                    Some(end) => {
                        out.push(MathSegment {
                            kind: MathKind::Display,
                            line: line_at(&masked, i),
                            content: masked[body_start..end].to_string(),
                            closed: true,
                        });
                        i = end + 2;
                    }
                    None => {
                        out.push(MathSegment {
                            kind: MathKind::Display,
                            line: line_at(&masked, i),
                            content: masked[body_start..].to_string(),
                            closed: false,
                        });
                        break;
                    }
                }
                continue;
            }
            b'$' => {
                let next = bytes.get(i + 1).copied();
                let opens = next.is_some_and(|b| !b.is_ascii_digit() && !b.is_ascii_whitespace());
                if opens {
                    if let Some(end) = find_inline_close(bytes, i + 1) {
                        out.push(MathSegment {
                            kind: MathKind::Inline,
                            line: line_at(&masked, i),
                            content: masked[i + 1..end].to_string(),
                            closed: true,
                        });
                        i = end + 1;
                        continue;
                    }
                }
            }
            _ => {}
        }
        i += 1;
    }
    out
}

fn find_unescaped(text: &str, from: usize, needle: &str) -> Option<usize> {
    let mut search = from;
    while let Some(rel) = text[search..].find(needle) {
        let at = search + rel;
        if at > 0 && text.as_bytes()[at - 1] == b'\\' {
            search = at + needle.len();
            continue;
        }
        return Some(at);
    }
    None
}

/// Closing `$` of an inline span starting at `from`: same line, not
/// preceded by whitespace or `\`, not followed by a digit.
fn find_inline_close(bytes: &[u8], from: usize) -> Option<usize> {
    let mut j = from;
    while j < bytes.len() {
        match bytes[j] {
            b'\n' => return None,
            b'\\' => {
                j += 2;
                continue;
            }
            b'$' => {
                let before = bytes[j - 1];
                let after = bytes.get(j + 1).copied();
                if !before.is_ascii_whitespace() && !after.is_some_and(|b| b.is_ascii_digit()) {
                    return Some(j);
                }
                return None;
            }
            _ => {}
        }
        j += 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = "---\ntitle: \"The Cost of War\"\n---\n\n# Intro {#sec-intro}\n\nSee [chapter](../economics/cost.qmd#top) and ![chart](img/chart.png \"Chart\").\nExternal [site](https://example.org) and [anchor](#sec-intro).\n\n```python\n#| label: fig-spending\nprint(\"[not](a-link.qmd) {{< var hidden >}}\")\n```\n\nSpending is {{< var global_military_spending >}} per year, see @fig-spending.\nInline `[code](x.qmd)` is not a link. Mail me at a@fig-x.com.\n";

    #[test]
    fn test_front_matter_and_title() {
        assert!(strip_front_matter(DOC).starts_with("\n# Intro"));
        assert_eq!(title(DOC).as_deref(), Some("The Cost of War"));
        assert_eq!(title("# Only Heading {#sec-x}\n").as_deref(), Some("Only Heading"));
        assert_eq!(strip_front_matter("no front matter"), "no front matter");
    }

    #[test]
    fn test_mask_preserves_lines() {
        let masked = mask_code(DOC);
        assert_eq!(masked.len(), DOC.len());
        assert_eq!(masked.lines().count(), DOC.lines().count());
        assert!(!masked.contains("hidden"));
    }

    #[test]
    fn test_links() {
        let found = links(DOC);
        assert_eq!(
            found,
            vec![
                Link {
                    line: 7,
                    target: "../economics/cost.qmd".to_string(),
                    is_image: false
                },
                Link {
                    line: 7,
                    target: "img/chart.png".to_string(),
                    is_image: true
                },
            ]
        );
    }

    #[test]
    fn test_variables_labels_crossrefs() {
        let vars = variable_refs(DOC);
        assert_eq!(vars.len(), 1);
        assert_eq!(vars[0].name, "global_military_spending");
        assert_eq!(vars[0].line, 15);

        let ids: Vec<_> = labels(DOC).into_iter().map(|l| l.id).collect();
        assert_eq!(ids, ["sec-intro", "fig-spending"]);

        let refs = crossrefs(DOC);
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].id, "fig-spending");
    }

    #[test]
    fn test_math_segments() {
        let text = "Costs $5 and $10 each.\nInline $x^2$ here.\n\n$$\n\\frac{a}{b}\n$$\n";
        let segs = math_segments(text);
        assert_eq!(segs.len(), 2);
        assert_eq!(segs[0].kind, MathKind::Inline);
        assert_eq!(segs[0].content, "x^2");
        assert_eq!(segs[0].line, 2);
        assert_eq!(segs[1].kind, MathKind::Display);
        assert_eq!(segs[1].line, 4);
        assert!(segs[1].closed);
        assert!(segs[1].content.contains("\\frac{a}{b}"));
    }

    #[test]
    fn test_unclosed_display_math() {
        let segs = math_segments("Text\n$$\nE = mc^2\n");
        assert_eq!(segs.len(), 1);
        assert!(!segs[0].closed);
    }

    #[test]
    fn test_escaped_dollar_is_not_math() {
        assert!(math_segments("Price \\$x and \\$y.").is_empty());
    }
}
