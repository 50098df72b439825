//! Auth-script entry point
//!
//! Reads the configuration file named on the command line, answers a single
//! JSON request read from stdin with a single JSON response on stdout.
//! Logs go to stderr.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tokio::io::AsyncBufReadExt;
use tokio::io::AsyncWriteExt;
use tokio::io::BufReader;
use tracing_subscriber::EnvFilter;

use jwks_auth_hook::AuthConfig;
use jwks_auth_hook::Authenticator;

/// Verify a JWT presented to an external authentication hook
#[derive(Parser, Debug)]
#[command(name = "jwks-auth-hook", version, about, long_about = None)]
struct Cli {
    /// Path to the JSON configuration file
    config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout carries the response
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = AuthConfig::from_file(&cli.config)
        .with_context(|| format!("failed to load configuration from {:?}", cli.config))?;
    let authenticator = Authenticator::from_config(&config)
        .await
        .context("failed to initialize key set")?;

    let mut line = String::new();
    BufReader::new(tokio::io::stdin())
        .read_line(&mut line)
        .await
        .context("failed to read request from stdin")?;

    let response = authenticator.handle_line(&line).await;

    let mut message = serde_json::to_vec(&response)?;
    message.push(b'\n');

    let mut stdout = tokio::io::stdout();
    stdout.write_all(&message).await?;
    stdout.flush().await?;

    Ok(())
}
