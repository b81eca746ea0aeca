//! End-to-end operations over a small book on disk.

use std::fs;
use std::path::Path;

use dih_book::validation::post_render::{BROKEN_OUTPUT_LINK, RAW_LATEX, UNRESOLVED_CROSSREF, UNRESOLVED_SHORTCODE};
use dih_book::validation::pre_render::{
    BROKEN_LINK, DUPLICATE_LABEL, LATEX_UNBALANCED_BRACES, LATEX_UNBALANCED_DELIMITER,
    LATEX_UNMATCHED_ENVIRONMENT, UNDEFINED_CROSSREF, UNKNOWN_CITATION, UNREGISTERED_VARIABLE,
};
use dih_book::Book;
use dih_core::config::DihConfig;
use dih_params::export::WriteStatus;

const PARAMETERS: &str = r#"
[[parameter]]
name = "MILITARY_SPENDING"
value = 2_718_000_000_000
unit = "USD/year"
source = "sipri-2024"

[[parameter]]
name = "CURE_COST"
value = 1_000_000_000
unit = "USD"
source = "missing-ref"
"#;

const REFERENCES: &str = r#"---
title: "References"
---

<a id="sipri-2024"></a>
SIPRI. *Trends in World Military Expenditure, 2024*. <https://www.sipri.org>
"#;

const INDEX: &str = "# Home {#sec-home}\n\nSee [the war](chapters/war.qmd) and [a lost page](chapters/gone.qmd).\n";

const WAR: &str = r#"# War {#sec-war}

Spending is {{< var military_spending >}} and {{< var unknown_thing >}}.
See @sec-home and @fig-missing.

$$
\frac{a}{b
$$

Inline $\begin{cases} x$ here.

## Again {#sec-home}
"#;

const OPEN: &str = "Text\n\n$$\nx = 1\n";

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

fn book() -> (tempfile::TempDir, Book) {
    let dir = tempfile::TempDir::new().unwrap();
    let root = dir.path();
    write(root, "parameters.toml", PARAMETERS);
    write(root, "references.qmd", REFERENCES);
    write(root, "index.qmd", INDEX);
    write(root, "chapters/war.qmd", WAR);
    write(root, "chapters/open.qmd", OPEN);
    let book = Book::new(root, DihConfig::default());
    (dir, book)
}

#[test]
fn test_pre_render_rules() {
    let (_dir, book) = book();
    let report = book.validate().unwrap();

    let count = |rule: &str| report.by_rule(rule).count();
    assert_eq!(count(BROKEN_LINK), 1);
    assert_eq!(count(UNREGISTERED_VARIABLE), 1);
    assert_eq!(count(UNDEFINED_CROSSREF), 1);
    assert_eq!(count(DUPLICATE_LABEL), 1);
    assert_eq!(count(LATEX_UNBALANCED_BRACES), 1);
    assert_eq!(count(LATEX_UNMATCHED_ENVIRONMENT), 1);
    assert_eq!(count(LATEX_UNBALANCED_DELIMITER), 1);
    assert_eq!(count(UNKNOWN_CITATION), 1);
    assert!(report.has_errors());
    assert_eq!(report.files_checked, 4);

    let broken = report.by_rule(BROKEN_LINK).next().unwrap();
    assert_eq!(broken.file, "index.qmd");
    assert_eq!(broken.line, 3);
    assert!(broken.message.contains("chapters/gone.qmd"));

    let citation = report.by_rule(UNKNOWN_CITATION).next().unwrap();
    assert_eq!(citation.file, "parameters.toml");
    assert!(citation.message.contains("CURE_COST"));

    let open = report.by_rule(LATEX_UNBALANCED_DELIMITER).next().unwrap();
    assert_eq!(open.file, "chapters/open.qmd");
}

#[test]
fn test_clean_book_passes() {
    let dir = tempfile::TempDir::new().unwrap();
    let root = dir.path();
    write(root, "parameters.toml", PARAMETERS);
    write(root, "index.qmd", "# Home {#sec-home}\n\nWe spend {{< var military_spending >}} ({{< var military_spending_raw >}}).\nSee @sec-home.\n");
    let report = Book::new(root, DihConfig::default()).validate().unwrap();
    assert!(report.is_clean(), "{report:?}");
}

#[test]
fn test_variables_and_appendix() {
    let (dir, book) = book();
    let registry = book.load_registry().unwrap();

    assert!(book.variables_stale(&registry).unwrap());
    assert_eq!(book.write_variables(&registry).unwrap(), WriteStatus::Written);
    assert!(!book.variables_stale(&registry).unwrap());
    assert_eq!(book.write_variables(&registry).unwrap(), WriteStatus::Unchanged);

    assert_eq!(book.write_appendix(&registry).unwrap(), WriteStatus::Written);
    let appendix =
        fs::read_to_string(dir.path().join("appendix/parameters-and-calculations.qmd")).unwrap();
    assert!(appendix.contains("[sipri-2024](../references.qmd#sipri-2024)"));
}

#[test]
fn test_generated_appendix_is_skipped_by_audit() {
    let (_dir, book) = book();
    let registry = book.load_registry().unwrap();
    book.write_appendix(&registry).unwrap();

    let audit = book.audit().unwrap();
    assert!(audit.hardcoded.is_empty());
    assert_eq!(audit.unused, ["CURE_COST"]);
    assert_eq!(audit.unknown.len(), 1);
}

#[test]
fn test_references_json() {
    let (dir, book) = book();
    let (refs, status) = book.write_references().unwrap();
    assert_eq!(status, WriteStatus::Written);
    assert_eq!(refs.len(), 1);
    assert_eq!(refs[0].urls, ["https://www.sipri.org"]);
    let json = fs::read_to_string(dir.path().join("references.json")).unwrap();
    assert!(json.contains("\"sipri-2024\""));
}

#[test]
fn test_narrate_single_chapter() {
    let (dir, book) = book();
    let manifest = book.narrate(Some(Path::new("chapters/war.qmd"))).unwrap();
    assert_eq!(manifest.chapters.len(), 1);
    assert_eq!(manifest.chapters[0].source, "chapters/war.qmd");

    let chunk = dir.path().join("_audiobook/text").join(&manifest.chapters[0].chunks[0]);
    let text = fs::read_to_string(chunk).unwrap();
    assert!(text.contains("Spending is $2.72T"));
    assert!(!text.contains("{{<"));

    assert!(book.narrate(Some(Path::new("chapters/nope.qmd"))).is_err());
}

#[test]
fn test_narrate_chapter_after_whole_book() {
    let (dir, book) = book();
    let text_dir = dir.path().join("_audiobook/text");
    let full = book.narrate(None).unwrap();
    assert!(full.chapters.len() >= 2, "{full:?}");
    let war = full.chapters.iter().find(|c| c.source == "chapters/war.qmd").unwrap();

    let single = book.narrate(Some(Path::new("chapters/war.qmd"))).unwrap();
    assert_eq!(single.chapters.len(), full.chapters.len());
    assert_eq!(single.total_chunks, full.total_chunks);
    for (before, after) in full.chapters.iter().zip(&single.chapters) {
        assert_eq!(before.source, after.source);
        assert_eq!(before.index, after.index);
        assert_eq!(before.chunks, after.chunks);
        for chunk in &after.chunks {
            assert!(text_dir.join(chunk).exists(), "{chunk} was removed");
        }
    }
    let renarrated = single.chapters.iter().find(|c| c.source == "chapters/war.qmd").unwrap();
    assert_eq!(renarrated.index, war.index);

    let manifest = fs::read_to_string(text_dir.join("manifest.json")).unwrap();
    for chapter in &full.chapters {
        assert!(manifest.contains(&format!("\"{}\"", chapter.source)));
    }
}

#[test]
fn test_post_render_rules() {
    let (dir, book) = book();
    let out = dir.path().join("_book");
    write(&out, "chapters/war.html", "<html><body><p>ok</p></body></html>\n");
    write(
        &out,
        "index.html",
        r#"<html>
<head><script>var s = "$$";</script></head>
<body>
<a href="chapters/war.html#sec-war">war</a>
<a href="missing.html">missing</a>
<a href="https://example.org">external</a>
<img src="img/chart.png">
<p>{{&lt; var military_spending &gt;}}</p>
<p>See ?@fig-missing.</p>
<p>$$x = 1$$</p>
<span class="math display">\[y\]</span>
</body>
</html>
"#,
    );

    let report = book.validate_output().unwrap();
    let count = |rule: &str| report.by_rule(rule).count();
    assert_eq!(count(BROKEN_OUTPUT_LINK), 2);
    assert_eq!(count(UNRESOLVED_SHORTCODE), 1);
    assert_eq!(count(UNRESOLVED_CROSSREF), 1);
    assert_eq!(count(RAW_LATEX), 1);
    assert_eq!(report.files_checked, 2);

    let raw = report.by_rule(RAW_LATEX).next().unwrap();
    assert_eq!(raw.line, 10);
    assert_eq!(raw.severity, dih_book::Severity::Warning);
}

#[test]
fn test_render_aborts_on_validation_errors() {
    let (_dir, book) = book();
    let mut config = book.config().clone();
    config.render.command = Some("dih-no-such-renderer".to_string());
    let book = Book::new(book.root(), config);

    let result = dih_book::render_book(&book, dih_book::RenderFormat::All, false, None).unwrap();
    assert!(result.aborted_by_validation());
    assert!(result.outcomes.is_empty());
    assert!(result.is_failure());
}

#[test]
fn test_render_cancelled_before_first_build() {
    use dih_core::{Cancellable, CancellationToken};

    let (_dir, book) = book();
    let token = CancellationToken::new();
    token.cancel();
    let err = dih_book::render_book(&book, dih_book::RenderFormat::Html, true, Some(token)).unwrap_err();
    assert!(matches!(err, dih_core::errors::BookError::Cancelled));
}
