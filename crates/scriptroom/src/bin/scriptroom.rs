//! Run Rhai scripts through a scriptroom session from the command line.
//!
//! The human view is streamed to stdout as markdown while units run; logs go
//! to stderr and are controlled with `RUST_LOG`.
//!
//! Usage:
//!   scriptroom run script.rhai          # run a file
//!   scriptroom run < script.rhai        # run stdin
//!   scriptroom run --transcript x.rhai  # also print the tool result as JSON
//!   scriptroom repl                     # one script per line, shared session
//!   scriptroom tool                     # print the tool definition

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use scriptroom::{ChannelSink, Result, ScriptSession, SessionConfig, schema::run_script_tool};
use tokio::{
    io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader},
    task::JoinHandle,
};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Parser)]
#[command(name = "scriptroom")]
#[command(about = "Run scripts and stream their results as markdown", long_about = None)]
/// CLI options.
struct Cli {
    /// JSON configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Resolution for default-size figures
    #[arg(long, global = true)]
    dpi: Option<f64>,
    /// Length of the code fence
    #[arg(long, global = true)]
    fence_len: Option<usize>,

    #[command(subcommand)]
    /// What to do; defaults to running stdin.
    command: Option<Commands>,
}

#[derive(Subcommand)]
/// Supported modes.
enum Commands {
    /// Run one script from a file, or stdin if no file is given
    Run {
        /// Script file
        file: Option<PathBuf>,
        /// Print the tool result as JSON after the stream
        #[arg(short, long)]
        transcript: bool,
    },
    /// Read scripts line by line, keeping bindings between them
    Repl {
        /// Print each tool result as JSON after its stream
        #[arg(short, long)]
        transcript: bool,
    },
    /// Print the run_script tool definition as JSON
    Tool,
}

impl Cli {
    async fn session_config(&self) -> Result<SessionConfig> {
        let mut config = match &self.config {
            Some(path) => SessionConfig::load(path).await?,
            None => SessionConfig::default(),
        };
        if let Some(dpi) = self.dpi {
            config.script.dpi = dpi;
        }
        if let Some(fence_len) = self.fence_len {
            config.fence_len = fence_len;
        }
        config.validate()?;
        Ok(config)
    }
}

/// Spawn a task copying streamed chunks to stdout.
fn stdout_sink() -> (ChannelSink, JoinHandle<Result<()>>) {
    let (sink, mut rx) = ChannelSink::new(64);
    let printer = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(chunk) = rx.recv().await {
            stdout.write_all(chunk.as_bytes()).await?;
            stdout.flush().await?;
        }
        Ok(())
    });
    (sink, printer)
}

async fn run_one(session: &mut ScriptSession, code: &str, transcript: bool) -> Result<()> {
    let (sink, printer) = stdout_sink();
    let outcome = session.run_script(code, sink).await;
    match printer.await {
        Ok(printed) => printed?,
        Err(err) => warn!(error = %err, "output task failed"),
    }
    let result = outcome?;
    if transcript {
        println!("{}", serde_json::to_string_pretty(&result)?);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.session_config().await?;

    match cli.command.unwrap_or(Commands::Run {
        file: None,
        transcript: false,
    }) {
        Commands::Run { file, transcript } => {
            let code = match file {
                Some(path) => tokio::fs::read_to_string(path).await?,
                None => {
                    let mut code = String::new();
                    tokio::io::stdin().read_to_string(&mut code).await?;
                    code
                }
            };
            let mut session = ScriptSession::new(config)?;
            run_one(&mut session, &code, transcript).await?;
        }
        Commands::Repl { transcript } => {
            let mut session = ScriptSession::new(config)?;
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            info!("reading scripts from stdin");
            while let Some(line) = lines.next_line().await? {
                if line.trim().is_empty() {
                    continue;
                }
                run_one(&mut session, &line, transcript).await?;
                println!();
            }
        }
        Commands::Tool => {
            println!("{}", serde_json::to_string_pretty(&run_script_tool())?);
        }
    }

    Ok(())
}
