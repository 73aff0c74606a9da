// rootshell: run scripts from stdin through one persistent interpreter.
//
// Each input line is executed as its own script and its result printed as a
// JSON line.

use anyhow::{Context, Result};
use clap::Parser;
use rootshell::{ShellConfig, ShellSession};
use tokio::io::{AsyncBufReadExt, BufReader};

/// Run each stdin line as a script in one persistent shell session
#[derive(Debug, Parser)]
#[command(name = "rootshell", version, about)]
struct Cli {
    /// Use the privileged entry (`su`) instead of `sh`
    #[arg(long)]
    root: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    log::debug!(target: rootshell::LOG_TARGET, "starting with {cli:?}");

    let session = ShellSession::new(ShellConfig::builder().root(cli.root).build());
    session
        .init()
        .await
        .context("failed to start interpreter")?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        if let Some(result) = session.cmd(line)?.exec().await? {
            println!("{}", serde_json::to_string(&result)?);
        }
    }

    session.close().await?;
    Ok(())
}
