//! `dih narrate`.

use std::fmt::Write as _;
use std::path::Path;

use super::Context;

pub(crate) fn run(ctx: &Context, chapter: Option<&Path>) -> anyhow::Result<bool> {
    let manifest = ctx.book.narrate(chapter)?;
    let out_dir = ctx.book.config().narration.effective_output_dir(ctx.book.root());
    ctx.emit(&manifest, || {
        let mut out = String::new();
        for ch in &manifest.chapters {
            let _ = writeln!(
                out,
                "{:>3}  {:<40} {:>7} chars  {:>3} chunk(s)",
                ch.index,
                ch.source,
                ch.characters,
                ch.chunks.len()
            );
        }
        let _ = writeln!(
            out,
            "\n{} chapter(s), {} chunk(s) of at most {} chars in {}",
            manifest.chapters.len(),
            manifest.total_chunks,
            manifest.max_chunk_chars,
            ctx.display(&out_dir)
        );
        out
    })?;
    Ok(true)
}
