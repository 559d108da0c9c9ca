//! rconlink CLI Client
//!
//! Command-line interface for administering a game server over RCON.
//! Runs one command and exits, or reads commands from stdin until
//! `exit`/`quit`/`q` or end of input.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use rconlink::{
    AsyncClient, AuditFormat, AuditLog, AuditSink, Client, Config, RconError, DEFAULT_PORT,
};
use tokio::io::AsyncBufReadExt;
use tracing_subscriber::{fmt, EnvFilter};

/// rconlink CLI
#[derive(Parser, Debug)]
#[command(name = "rconlink-cli")]
#[command(about = "RCON client for game servers")]
#[command(version)]
struct Args {
    /// Server address (hostname, IPv4 or IPv6)
    #[arg(short, long)]
    address: String,

    /// RCON port
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// RCON password
    #[arg(short = 'P', long, env = "RCON_PASSWORD", hide_env_values = true)]
    password: String,

    /// Use the async client
    #[arg(long)]
    async_mode: bool,

    /// Connect and command timeout in milliseconds
    #[arg(short, long, default_value = "10000")]
    timeout_ms: u64,

    /// Audit log path (defaults to the user data directory)
    #[arg(long)]
    audit: Option<PathBuf>,

    /// Audit log format: jsonl or binary
    #[arg(long, default_value = "jsonl")]
    audit_format: AuditFormat,

    /// Do not write an audit log
    #[arg(long)]
    no_audit: bool,

    /// Command to run once; starts a prompt when omitted
    command: Vec<String>,
}

const EXIT_ERROR: i32 = 1;
const EXIT_AUTH: i32 = 2;
const EXIT_UNREACHABLE: i32 = 3;

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,rconlink=info"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    // Everything owned by `run` (clients, audit writer) is dropped before exit
    let code = match run(args) {
        Ok(()) => 0,
        Err(e) if e.is_auth_failure() => {
            eprintln!("Authentication failed: check the RCON password");
            EXIT_AUTH
        }
        Err(e) if e.is_connection_failure() => {
            eprintln!("Server unreachable: {}", e);
            EXIT_UNREACHABLE
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            EXIT_ERROR
        }
    };

    std::process::exit(code);
}

fn run(args: Args) -> Result<(), RconError> {
    let config = Config::builder().timeout_ms(args.timeout_ms).build();
    let audit = open_audit(&args);

    if args.async_mode {
        let runtime = tokio::runtime::Runtime::new()?;
        runtime.block_on(run_async(&args, config, audit))
    } else {
        run_blocking(&args, config, audit)
    }
}

/// Open the audit log, or run without one if that fails
fn open_audit(args: &Args) -> Option<Arc<dyn AuditSink>> {
    if args.no_audit {
        return None;
    }

    let path = args.audit.clone().or_else(|| {
        dirs::data_local_dir().map(|dir| {
            dir.join("rconlink")
                .join(format!("audit.{}", args.audit_format.extension()))
        })
    })?;

    match AuditLog::open(&path, args.audit_format) {
        Ok(log) => Some(Arc::new(log)),
        Err(e) => {
            tracing::warn!("Audit log disabled, cannot open {}: {}", path.display(), e);
            None
        }
    }
}

fn is_exit(line: &str) -> bool {
    matches!(line.to_ascii_lowercase().as_str(), "exit" | "quit" | "q")
}

fn print_response(response: &str) {
    if !response.is_empty() {
        println!("{}", response);
    }
}

fn prompt() {
    print!(">> ");
    let _ = io::stdout().flush();
}

// =============================================================================
// Blocking
// =============================================================================

fn run_blocking(
    args: &Args,
    config: Config,
    audit: Option<Arc<dyn AuditSink>>,
) -> Result<(), RconError> {
    let mut client = Client::open(&args.address, args.port, &args.password, config)?;
    if let Some(sink) = audit {
        client = client.with_audit(sink);
    }

    if !args.command.is_empty() {
        print_response(&client.issue_command(&args.command.join(" "))?);
        return client.close();
    }

    eprintln!("Connected to {}:{} (blocking)", args.address, args.port);
    let stdin = io::stdin();
    prompt();
    for line in stdin.lock().lines() {
        let line = line?;
        let line = line.trim();
        if is_exit(line) {
            break;
        }
        if !line.is_empty() {
            match client.issue_command(line) {
                Ok(response) => print_response(&response),
                Err(e) if client.is_ready() => eprintln!("Error: {}", e),
                Err(e) => return Err(e),
            }
        }
        prompt();
    }

    client.close()
}

// =============================================================================
// Async
// =============================================================================

async fn run_async(
    args: &Args,
    config: Config,
    audit: Option<Arc<dyn AuditSink>>,
) -> Result<(), RconError> {
    let mut client = AsyncClient::open(&args.address, args.port, &args.password, config).await?;
    if let Some(sink) = audit {
        client = client.with_audit(sink);
    }

    if !args.command.is_empty() {
        print_response(&client.issue_command(&args.command.join(" ")).await?);
        return client.close().await;
    }

    eprintln!("Connected to {}:{} (async)", args.address, args.port);
    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    prompt();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if is_exit(line) {
            break;
        }
        if !line.is_empty() {
            match client.issue_command(line).await {
                Ok(response) => print_response(&response),
                Err(e) if client.is_ready() => eprintln!("Error: {}", e),
                Err(e) => return Err(e),
            }
        }
        prompt();
    }

    client.close().await
}
