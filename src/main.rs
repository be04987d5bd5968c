use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing::debug;

use gqlwire::cli::handlers::{CommandContext, handle_check, handle_serve, handle_types};
use gqlwire::cli::{Cli, Commands};
use gqlwire::logging;

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let ctx = CommandContext::load(cli.config.as_deref())?;

    let verbose = cli.verbose || ctx.config.logging.verbose;
    let log_file = cli.log_file.or_else(|| ctx.config.logging.file.clone());
    let _log_guard = logging::init(verbose, log_file);

    match &ctx.root {
        Some(root) => debug!(root = %root.display(), "Using configuration"),
        None => debug!("No configuration file found, using defaults"),
    }

    match cli.command {
        Commands::Check { sdl, json } => handle_check(&sdl, json),
        Commands::Types { sdl, json } => handle_types(&sdl, json),
        Commands::Serve { schema, host, port } => handle_serve(ctx, schema, host, port),
    }
}
