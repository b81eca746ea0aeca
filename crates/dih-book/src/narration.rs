//! Narration-ready text for audiobook synthesis.
//!
//! A chapter is reduced to the prose a narrator would read: markup,
//! code, tables, figures and display math are dropped, variables are
//! resolved to their display values, and the result is split into
//! chunks small enough for a speech engine.

use std::fs;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use dih_core::constants::GENERATED_HEADER;
use dih_core::errors::ExportError;
use dih_params::export::{variables_document, write_if_changed};
use dih_params::ParameterRegistry;

use crate::qmd;
use crate::scanner::SourceFile;

static FENCE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*(`{3,}|~{3,})").unwrap());
static VAR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{<\s*var\s+([A-Za-z0-9_.\-]+)\s*>\}\}").unwrap());
static SHORTCODE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{\{<.*?>\}\}").unwrap());
static INLINE_COMMENT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<!--.*?-->").unwrap());
static IMAGE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"!\[[^\]]*\]\([^)]*\)(\{[^}]*\})?").unwrap());
static CITATION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*\[-?@[^\]]+\]").unwrap());
static FOOTNOTE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[\^[^\]]+\]").unwrap());
static FOOTNOTE_DEF_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\[\^[^\]]+\]:").unwrap());
static LINK_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[([^\]]*)\]\([^)]*\)").unwrap());
static SPAN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[([^\]]*)\]\{[^}]*\}").unwrap());
static ATTR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*\{[#.][^}]*\}").unwrap());
static CROSSREF_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(^|[^\w@])@(sec|fig|tbl|eq)-[\w\-]*\w").unwrap());
static INLINE_MATH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$([^\s$\d](?:[^$\n]*[^\s$\\])?)\$").unwrap());
static LATEX_CMD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\\[A-Za-z]+").unwrap());
static HEADING_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^#{1,6}\s+").unwrap());
static LIST_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(?:[-*+]|\d+[.)])\s+").unwrap());
static SENTENCE_END_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"[.!?]["')\]]*\s+"#).unwrap());

/// Display value for every variable key of `registry`.
pub fn narration_variables(registry: &ParameterRegistry) -> FxHashMap<String, String> {
    variables_document(registry)
        .into_iter()
        .filter_map(|(k, v)| {
            let key = k.as_str()?.to_string();
            let value = match v {
                serde_yaml::Value::String(s) => s,
                serde_yaml::Value::Number(n) => n.to_string(),
                _ => return None,
            };
            Some((key, value))
        })
        .collect()
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Block {
    Prose,
    Code(char, usize),
    Comment,
    DisplayMath,
}

/// Convert one chapter to plain narration text, paragraphs separated by
/// a blank line.
pub fn narration_text(text: &str, variables: &FxHashMap<String, String>) -> String {
    let body = qmd::strip_front_matter(text);
    let mut paragraphs: Vec<String> = Vec::new();
    let mut current: Vec<String> = Vec::new();
    let mut block = Block::Prose;

    for line in body.lines() {
        let trimmed = line.trim();
        match block {
            Block::Code(ch, len) => {
                if trimmed.len() >= len && trimmed.chars().all(|c| c == ch) {
                    block = Block::Prose;
                }
                continue;
            }
            Block::Comment => {
                if trimmed.contains("-->") {
                    block = Block::Prose;
                }
                continue;
            }
            Block::DisplayMath => {
                if trimmed.contains("$$") {
                    block = Block::Prose;
                }
                continue;
            }
            Block::Prose => {}
        }

        if let Some(cap) = FENCE_RE.captures(line) {
            let marker = &cap[1];
            block = Block::Code(marker.chars().next().unwrap_or('`'), marker.len());
            end_paragraph(&mut current, &mut paragraphs);
            continue;
        }
        if trimmed.starts_with("<!--") && !trimmed.contains("-->") {
            block = Block::Comment;
            continue;
        }
        if trimmed.starts_with("$$") {
            end_paragraph(&mut current, &mut paragraphs);
            if trimmed.len() == 2 || !trimmed[2..].contains("$$") {
                block = Block::DisplayMath;
            }
            continue;
        }
        if trimmed.is_empty() {
            end_paragraph(&mut current, &mut paragraphs);
            continue;
        }
        if skip_line(trimmed) {
            continue;
        }

        let is_heading = HEADING_RE.is_match(trimmed);
        let mut spoken = clean_inline(trimmed, variables);
        if spoken.is_empty() {
            continue;
        }
        if is_heading {
            end_paragraph(&mut current, &mut paragraphs);
            if !spoken.ends_with(|c: char| matches!(c, '.' | '!' | '?' | ':')) {
                spoken.push('.');
            }
            paragraphs.push(spoken);
            continue;
        }
        current.push(spoken);
    }
    end_paragraph(&mut current, &mut paragraphs);
    paragraphs.join("\n\n")
}

fn end_paragraph(current: &mut Vec<String>, paragraphs: &mut Vec<String>) {
    if !current.is_empty() {
        paragraphs.push(current.join(" "));
        current.clear();
    }
}

/// Lines with nothing to read aloud.
fn skip_line(trimmed: &str) -> bool {
    trimmed.starts_with(":::")
        || trimmed.starts_with('|')
        || trimmed.starts_with("![")
        || trimmed.starts_with("#|")
        || FOOTNOTE_DEF_RE.is_match(trimmed)
        || (trimmed.starts_with('<') && trimmed.ends_with('>'))
        || (trimmed.starts_with("{{<") && trimmed.ends_with(">}}") && !VAR_RE.is_match(trimmed))
        || trimmed.chars().all(|c| matches!(c, '-' | '=' | '*' | '_' | ' '))
}

fn clean_inline(line: &str, variables: &FxHashMap<String, String>) -> String {
    let line = HEADING_RE.replace(line, "");
    let line = LIST_RE.replace(&line, "");
    let line = line.strip_prefix("> ").unwrap_or(&line).to_string();
    let line = INLINE_COMMENT_RE.replace_all(&line, "");
    let line = VAR_RE.replace_all(&line, |caps: &Captures| match variables.get(&caps[1]) {
        Some(value) => value.clone(),
        None => {
            warn!(variable = &caps[1], "unresolved variable in narration");
            String::new()
        }
    });
    let line = SHORTCODE_RE.replace_all(&line, "");
    let line = IMAGE_RE.replace_all(&line, "");
    let line = CITATION_RE.replace_all(&line, "");
    let line = FOOTNOTE_RE.replace_all(&line, "");
    let line = LINK_RE.replace_all(&line, "$1");
    let line = SPAN_RE.replace_all(&line, "$1");
    let line = ATTR_RE.replace_all(&line, "");
    let line = CROSSREF_RE.replace_all(&line, |caps: &Captures| {
        let noun = match &caps[2] {
            "fig" => "the figure",
            "tbl" => "the table",
            "eq" => "the equation",
            _ => "the section",
        };
        format!("{}{noun}", &caps[1])
    });
    let line = INLINE_MATH_RE.replace_all(&line, |caps: &Captures| spoken_math(&caps[1]));
    let line: String = line
        .chars()
        .filter(|c| !matches!(c, '*' | '`'))
        .collect();
    let line = line.replace("~~", "").replace("\\$", "$");
    line.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Inline math reduced to its readable characters.
fn spoken_math(tex: &str) -> String {
    let text = LATEX_CMD_RE.replace_all(tex, " ");
    let text: String = text
        .chars()
        .filter(|c| !matches!(c, '{' | '}' | '^' | '_' | '\\'))
        .collect();
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Split on paragraph, then sentence, then whitespace boundaries so that
/// no chunk exceeds `max_chars` characters. A single word longer than
/// `max_chars` is split mid-word.
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();

    for paragraph in text.split("\n\n").map(str::trim).filter(|p| !p.is_empty()) {
        if fits(&current, paragraph, "\n\n", max_chars) {
            append(&mut current, paragraph, "\n\n");
            continue;
        }
        flush(&mut current, &mut chunks);
        if char_len(paragraph) <= max_chars {
            current.push_str(paragraph);
            continue;
        }
        for sentence in sentences(paragraph) {
            if fits(&current, sentence, " ", max_chars) {
                append(&mut current, sentence, " ");
                continue;
            }
            flush(&mut current, &mut chunks);
            if char_len(sentence) <= max_chars {
                current.push_str(sentence);
                continue;
            }
            for word in sentence.split_whitespace() {
                if fits(&current, word, " ", max_chars) {
                    append(&mut current, word, " ");
                    continue;
                }
                flush(&mut current, &mut chunks);
                let mut rest = word;
                while char_len(rest) > max_chars {
                    let cut = rest
                        .char_indices()
                        .nth(max_chars)
                        .map(|(i, _)| i)
                        .unwrap_or(rest.len());
                    chunks.push(rest[..cut].to_string());
                    rest = &rest[cut..];
                }
                current.push_str(rest);
            }
        }
    }
    flush(&mut current, &mut chunks);
    chunks
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn fits(current: &str, next: &str, sep: &str, max_chars: usize) -> bool {
    if current.is_empty() {
        return char_len(next) <= max_chars;
    }
    char_len(current) + char_len(sep) + char_len(next) <= max_chars
}

fn append(current: &mut String, next: &str, sep: &str) {
    if !current.is_empty() {
        current.push_str(sep);
    }
    current.push_str(next);
}

fn flush(current: &mut String, chunks: &mut Vec<String>) {
    if !current.is_empty() {
        chunks.push(std::mem::take(current));
    }
}

fn sentences(paragraph: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    for m in SENTENCE_END_RE.find_iter(paragraph) {
        let sentence = paragraph[start..m.end()].trim();
        if !sentence.is_empty() {
            out.push(sentence);
        }
        start = m.end();
    }
    let tail = paragraph[start..].trim();
    if !tail.is_empty() {
        out.push(tail);
    }
    out
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChapterManifest {
    pub index: usize,
    pub source: String,
    pub title: Option<String>,
    pub characters: usize,
    pub chunks: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NarrationManifest {
    pub max_chunk_chars: usize,
    pub total_chunks: usize,
    pub chapters: Vec<ChapterManifest>,
}

const MANIFEST_FILE: &str = "manifest.json";

/// A chapter with prose, numbered by its position among all such chapters.
struct PlannedChapter<'a> {
    index: usize,
    file: &'a SourceFile,
    text: String,
}

/// Book-wide chapter numbering. Generated documents and chapters with
/// no prose take no number.
fn plan_chapters<'a>(
    files: &'a [SourceFile],
    variables: &FxHashMap<String, String>,
) -> Vec<PlannedChapter<'a>> {
    let mut planned = Vec::new();
    for file in files.iter().filter(|f| !f.content.contains(GENERATED_HEADER)) {
        let text = narration_text(&file.content, variables);
        if text.is_empty() {
            debug!(file = %file.rel_path, "no narration text");
            continue;
        }
        planned.push(PlannedChapter {
            index: planned.len() + 1,
            file,
            text,
        });
    }
    planned
}

fn chunk_prefix(index: usize, rel_path: &str) -> String {
    format!("{index:02}-{}-", chapter_stem(rel_path))
}

fn write_chapter(
    chapter: &PlannedChapter<'_>,
    out_dir: &Path,
    max_chars: usize,
) -> Result<ChapterManifest, ExportError> {
    let prefix = chunk_prefix(chapter.index, &chapter.file.rel_path);
    let chunks = chunk_text(&chapter.text, max_chars);
    let mut names = Vec::with_capacity(chunks.len());
    for (i, chunk) in chunks.iter().enumerate() {
        let name = format!("{prefix}{:03}.txt", i + 1);
        write_if_changed(&out_dir.join(&name), &format!("{chunk}\n"))?;
        names.push(name);
    }
    Ok(ChapterManifest {
        index: chapter.index,
        source: chapter.file.rel_path.clone(),
        title: qmd::title(&chapter.file.content),
        characters: char_len(&chapter.text),
        chunks: names,
    })
}

fn create_out_dir(out_dir: &Path) -> Result<(), ExportError> {
    fs::create_dir_all(out_dir).map_err(|source| ExportError::Write {
        path: out_dir.to_path_buf(),
        source,
    })
}

/// Write chunk files `NN-<stem>-MMM.txt` plus `manifest.json` into
/// `out_dir`. Generated documents and chapters with no prose are
/// skipped; stale chunk files from earlier runs are removed.
pub fn prepare_book(
    files: &[SourceFile],
    variables: &FxHashMap<String, String>,
    out_dir: &Path,
    max_chars: usize,
) -> Result<NarrationManifest, ExportError> {
    create_out_dir(out_dir)?;

    let mut chapters = Vec::new();
    for planned in plan_chapters(files, variables) {
        chapters.push(write_chapter(&planned, out_dir, max_chars)?);
    }
    let written: Vec<String> = chapters.iter().flat_map(|c| c.chunks.iter().cloned()).collect();
    remove_stale_chunks(out_dir, |name| !written.iter().any(|w| w == name));

    let manifest = NarrationManifest {
        max_chunk_chars: max_chars,
        total_chunks: written.len(),
        chapters,
    };
    write_manifest(out_dir, &manifest)?;
    info!(
        dir = %out_dir.display(),
        chapters = manifest.chapters.len(),
        chunks = manifest.total_chunks,
        "narration text prepared"
    );
    Ok(manifest)
}

/// Re-narrate the single chapter `rel_path` of `files`.
///
/// The chapter keeps the number it has in a whole-book run. Only its
/// own chunk files are replaced, and its entry is merged into the
/// existing manifest so other chapters stay listed. A chapter with no
/// prose is dropped from the manifest.
pub fn prepare_chapter(
    files: &[SourceFile],
    rel_path: &str,
    variables: &FxHashMap<String, String>,
    out_dir: &Path,
    max_chars: usize,
) -> Result<NarrationManifest, ExportError> {
    create_out_dir(out_dir)?;

    let planned = plan_chapters(files, variables);
    let entry = match planned.iter().find(|c| c.file.rel_path == rel_path) {
        Some(chapter) => Some(write_chapter(chapter, out_dir, max_chars)?),
        None => None,
    };
    let fresh: Vec<&str> = entry.iter().flat_map(|e| e.chunks.iter().map(String::as_str)).collect();
    if let Some(ref e) = entry {
        let prefix = chunk_prefix(e.index, rel_path);
        remove_stale_chunks(out_dir, |name| name.starts_with(&prefix) && !fresh.contains(&name));
    }

    let mut chapters = read_manifest(out_dir).map(|m| m.chapters).unwrap_or_default();
    let previous: Vec<String> = chapters
        .iter()
        .filter(|c| c.source == rel_path)
        .flat_map(|c| c.chunks.iter().cloned())
        .collect();
    remove_stale_chunks(out_dir, |name| previous.iter().any(|p| p == name) && !fresh.contains(&name));

    chapters.retain(|c| c.source != rel_path && entry.as_ref().map_or(true, |e| c.index != e.index));
    chapters.extend(entry);
    chapters.sort_by_key(|c| c.index);

    let manifest = NarrationManifest {
        max_chunk_chars: max_chars,
        total_chunks: chapters.iter().map(|c| c.chunks.len()).sum(),
        chapters,
    };
    write_manifest(out_dir, &manifest)?;
    info!(
        dir = %out_dir.display(),
        chapter = rel_path,
        chapters = manifest.chapters.len(),
        chunks = manifest.total_chunks,
        "chapter narration prepared"
    );
    Ok(manifest)
}

fn read_manifest(out_dir: &Path) -> Option<NarrationManifest> {
    let path = out_dir.join(MANIFEST_FILE);
    let text = fs::read_to_string(&path).ok()?;
    match serde_json::from_str(&text) {
        Ok(manifest) => Some(manifest),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "ignoring unreadable narration manifest");
            None
        }
    }
}

fn write_manifest(out_dir: &Path, manifest: &NarrationManifest) -> Result<(), ExportError> {
    let mut json = serde_json::to_string_pretty(manifest).map_err(|e| ExportError::Serialize {
        what: "narration manifest".to_string(),
        message: e.to_string(),
    })?;
    json.push('\n');
    write_if_changed(&out_dir.join(MANIFEST_FILE), &json)?;
    Ok(())
}

/// `chapters/01-the-cost.qmd` → `01-the-cost`.
fn chapter_stem(rel_path: &str) -> String {
    let stem = Path::new(rel_path)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut slug = String::with_capacity(stem.len());
    for c in stem.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let slug = slug.trim_matches('-').to_string();
    if slug.is_empty() {
        "chapter".to_string()
    } else {
        slug
    }
}

fn remove_stale_chunks(out_dir: &Path, is_stale: impl Fn(&str) -> bool) {
    let Ok(entries) = fs::read_dir(out_dir) else { return };
    for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.ends_with(".txt") && is_stale(&name) {
            match fs::remove_file(entry.path()) {
                Ok(()) => debug!(file = %name, "removed stale chunk"),
                Err(e) => warn!(file = %name, error = %e, "could not remove stale chunk"),
            }
        }
    }
}
