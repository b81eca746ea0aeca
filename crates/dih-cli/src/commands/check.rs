//! `dih validate` and `dih audit`.

use super::{reported, Context};

pub(crate) fn validate(ctx: &Context, post: bool) -> anyhow::Result<bool> {
    let report = if post {
        ctx.book.validate_output()?
    } else {
        ctx.book.validate()?
    };
    print!("{}", reported(ctx.reporter.validation(&report))?);
    if ctx.is_json() {
        println!();
    }
    Ok(!report.has_errors())
}

pub(crate) fn audit(ctx: &Context) -> anyhow::Result<bool> {
    let audit = ctx.book.audit()?;
    print!("{}", reported(ctx.reporter.audit(&audit))?);
    if ctx.is_json() {
        println!();
    }
    Ok(!audit.has_findings())
}
