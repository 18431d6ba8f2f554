//! `sitectl apply`

use clap::Args;
use sitectl_core::bundle::Bundle;
use sitectl_core::errors::Result;
use sitectl_engine::EngineCommand;
use std::path::PathBuf;

#[derive(Debug, Args)]
pub struct ApplyArgs {
    pub website: String,
    pub environment: String,

    /// Directory holding manifest.json and the files it references
    pub bundle_dir: PathBuf,

    /// Validate and classify without writing anything
    #[arg(long)]
    pub dry_run: bool,
}

pub fn to_command(args: ApplyArgs) -> Result<EngineCommand> {
    let bundle = Bundle::from_dir(&args.bundle_dir)
        .map_err(|e| e.context(format!("load bundle {}", args.bundle_dir.display())))?;
    tracing::debug!(files = bundle.file_count(), "bundle loaded");
    Ok(EngineCommand::Apply {
        website: args.website,
        environment: args.environment,
        bundle,
        dry_run: args.dry_run,
    })
}
