//! Generated files: variables, appendix, references JSON.

use serde::Serialize;

use dih_params::export::WriteStatus;

use super::Context;

#[derive(Serialize)]
struct Generated {
    path: String,
    status: &'static str,
    entries: usize,
}

fn status_str(status: WriteStatus) -> &'static str {
    match status {
        WriteStatus::Written => "written",
        WriteStatus::Unchanged => "unchanged",
    }
}

impl Generated {
    fn console(&self, what: &str) -> String {
        format!("{} {what} ({}): {}\n", self.path, self.entries, self.status)
    }
}

pub(crate) fn variables(ctx: &Context, check: bool) -> anyhow::Result<bool> {
    let registry = ctx.book.load_registry()?;
    let path = ctx.book.config().book.effective_variables_file(ctx.book.root());
    let display = ctx.display(&path);

    if check {
        let stale = ctx.book.variables_stale(&registry)?;
        let result = Generated {
            path: display,
            status: if stale { "stale" } else { "current" },
            entries: registry.len(),
        };
        ctx.emit(&result, || {
            if stale {
                format!("{} is out of date; run `dih variables`\n", result.path)
            } else {
                format!("{} is up to date\n", result.path)
            }
        })?;
        return Ok(!stale);
    }

    let status = ctx.book.write_variables(&registry)?;
    let result = Generated {
        path: display,
        status: status_str(status),
        entries: registry.len(),
    };
    ctx.emit(&result, || result.console("parameters"))?;
    Ok(true)
}

pub(crate) fn appendix(ctx: &Context) -> anyhow::Result<bool> {
    let registry = ctx.book.load_registry()?;
    let status = ctx.book.write_appendix(&registry)?;
    let path = ctx.book.config().book.effective_appendix_file(ctx.book.root());
    let result = Generated {
        path: ctx.display(&path),
        status: status_str(status),
        entries: registry.len(),
    };
    ctx.emit(&result, || result.console("parameters"))?;
    Ok(true)
}

pub(crate) fn references(ctx: &Context) -> anyhow::Result<bool> {
    let (refs, status) = ctx.book.write_references()?;
    let path = ctx.book.config().book.effective_references_json(ctx.book.root());
    let result = Generated {
        path: ctx.display(&path),
        status: status_str(status),
        entries: refs.len(),
    };
    ctx.emit(&result, || result.console("references"))?;
    Ok(true)
}
