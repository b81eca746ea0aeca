//! `dih render`.

use clap::Args;

use dih_book::render::{render_book, RenderFormat};
use dih_core::CliOverrides;

use super::{reported, Context};

#[derive(Args, Debug)]
pub(crate) struct RenderArgs {
    /// html, pdf, epub, docx or all
    #[arg(id = "render_format", value_name = "FORMAT", default_value = "html")]
    pub format: RenderFormat,

    /// Seconds without renderer output before the build is killed
    #[arg(long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout: Option<u64>,

    /// Let renderer warnings pass instead of failing the build
    #[arg(long)]
    pub no_fail_on_warnings: bool,

    /// Render without running pre-render validation first
    #[arg(long)]
    pub skip_validation: bool,

    /// Renderer executable (default: quarto)
    #[arg(long, value_name = "CMD")]
    pub renderer: Option<String>,
}

impl RenderArgs {
    pub fn apply(&self, overrides: &mut CliOverrides) {
        if let Some(secs) = self.timeout {
            overrides.render_timeout_secs = Some(secs);
        }
        if self.no_fail_on_warnings {
            overrides.render_fail_on_warnings = Some(false);
        }
        if let Some(ref cmd) = self.renderer {
            overrides.render_command = Some(cmd.clone());
        }
    }
}

pub(crate) fn run(ctx: &Context, args: &RenderArgs) -> anyhow::Result<bool> {
    let result = render_book(&ctx.book, args.format, args.skip_validation, None)?;
    print!("{}", reported(ctx.reporter.render(&result))?);
    if ctx.is_json() {
        println!();
    }
    Ok(!result.is_failure())
}
