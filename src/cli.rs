use clap::{Parser, Subcommand};

/// Idempotent: single-use tokens guarding mutating routes
#[derive(Parser)]
#[command(name = "idempotent", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server
    Serve {
        /// Port to bind (overrides IDEMPOTENT_PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Manage tokens in the configured store
    Token {
        #[command(subcommand)]
        command: TokenCommands,
    },
}

#[derive(Subcommand)]
pub enum TokenCommands {
    /// Issue a new token and print it
    Issue,
    /// Consume a token so no request can use it
    Revoke {
        /// Token value as issued
        token: String,
    },
}
