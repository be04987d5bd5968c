use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "gqlwire")]
#[command(
    author,
    version,
    about = "Validate GraphQL SDL and serve it over HTTP and graphql-transport-ws"
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to config file (searches upward for gqlwire.toml by default)
    #[arg(long, global = true, env = "GQLWIRE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Also write JSON logs to this file, rotated daily
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Validate an SDL file and report every diagnostic
    Check {
        /// SDL file ('-' reads stdin)
        sdl: String,

        /// Output diagnostics as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the object types of a valid SDL file and their fields
    Types {
        /// SDL file ('-' reads stdin)
        sdl: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Serve a schema over HTTP and WebSocket
    Serve {
        /// SDL file to serve (defaults to the built-in greeting schema)
        #[arg(short, long)]
        schema: Option<PathBuf>,

        /// Address to bind (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["gqlwire", "check", "schema.graphql", "--verbose", "--json"]);
        assert!(cli.verbose);
        assert!(matches!(cli.command, Commands::Check { json: true, .. }));
    }

    #[test]
    fn test_serve_overrides() {
        let cli = Cli::parse_from(["gqlwire", "serve", "--port", "4000"]);
        match cli.command {
            Commands::Serve { schema, host, port } => {
                assert!(schema.is_none());
                assert!(host.is_none());
                assert_eq!(port, Some(4000));
            }
            _ => panic!("expected serve"),
        }
    }
}
