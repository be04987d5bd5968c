use anyhow::{Context, Result};
use colored::Colorize;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;

use super::CommandContext;
use super::utils::{print_diagnostics, read_sdl};
use crate::demo;
use crate::error::GqlwireError;
use crate::graphql::ResolverRegistry;
use crate::transport::TransportDispatcher;

pub fn handle_serve(
    ctx: CommandContext,
    schema: Option<PathBuf>,
    host: Option<String>,
    port: Option<u16>,
) -> Result<ExitCode> {
    let mut server = ctx.config.server;
    if let Some(host) = host {
        server.host = host;
    }
    if let Some(port) = port {
        server.port = port;
    }

    let (sdl, resolvers) = match schema.or(ctx.config.schema.path) {
        Some(path) => {
            info!("Serving schema from {}", path.display());
            (read_sdl(&path.to_string_lossy())?, ResolverRegistry::new())
        }
        None => {
            info!("No schema configured, serving the greeting demo");
            (demo::DEMO_SDL.to_string(), demo::resolvers())
        }
    };

    let url = format!("http://{}{}", server.address(), server.path);
    let dispatcher = match TransportDispatcher::from_sdl(server, &sdl, resolvers) {
        Ok(dispatcher) => dispatcher,
        Err(GqlwireError::InvalidSchema(diagnostics)) => {
            print_diagnostics(&diagnostics);
            return Ok(ExitCode::FAILURE);
        }
        Err(e) => return Err(e.into()),
    };

    println!("Starting GraphQL server on {}", url.cyan());
    tokio::runtime::Runtime::new()?
        .block_on(dispatcher.serve())
        .context("GraphQL server failed")?;
    Ok(ExitCode::SUCCESS)
}
