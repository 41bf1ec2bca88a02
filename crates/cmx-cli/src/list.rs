//! # List Subcommand
//!
//! `cmx list` resolves the fact matrix and prints it without compiling
//! anything: one line per entry with the OS id and a short fact
//! fingerprint, or a JSON array with `--json`.

use anyhow::{Context, Result};
use clap::Args;
use serde_json::json;

use cmx_core::OsEntry;

use crate::config::SourceArgs;
use crate::harness::build_provider;

/// Arguments for `cmx list`.
#[derive(Args, Debug, Default)]
pub struct ListArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Print entries, full fingerprints and facts as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Execute `cmx list`.
pub fn run_list(args: &ListArgs) -> Result<u8> {
    let config = args
        .source
        .resolve()
        .context("resolving harness configuration")?;
    let provider = build_provider(&config.matrix, config.allow_empty_matrix)
        .context("cannot resolve fact matrix")?;
    tracing::debug!(provider = %provider.describe(), "resolved matrix");

    print!("{}", render_listing(&provider.entries(), args.json)?);
    Ok(0)
}

/// Render matrix entries for display.
pub fn render_listing(entries: &[OsEntry], as_json: bool) -> Result<String> {
    if as_json {
        let listing: Vec<_> = entries
            .iter()
            .map(|e| {
                json!({
                    "os": e.os,
                    "fingerprint": e.facts.fingerprint(),
                    "facts": e.facts,
                })
            })
            .collect();
        let mut out = serde_json::to_string_pretty(&listing).context("serializing matrix")?;
        out.push('\n');
        return Ok(out);
    }

    let width = entries
        .iter()
        .map(|e| e.os.as_str().len())
        .max()
        .unwrap_or(0);
    Ok(entries
        .iter()
        .map(|e| {
            format!(
                "{:<width$}  {}\n",
                e.os.as_str(),
                e.facts.fingerprint().short()
            )
        })
        .collect())
}
