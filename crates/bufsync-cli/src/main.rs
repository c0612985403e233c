//! Bufsync CLI - drive editor buffers over local JSON-RPC.
//!
//! Connects to a host exposing the bufsync IPC methods and runs one buffer
//! operation. `serve-memory` starts an in-memory host to try it against.

mod commands;

use anyhow::Result;
use bufsync::ipc::IpcServer;
use bufsync::{BufNr, HostDispatch, MemoryHost, RpcSession};
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(name = "bufsync")]
#[command(about = "Buffer content synchronization for editor hosts")]
struct Args {
    /// Host port to connect to (or listen on for serve-memory, 0 = auto-assign)
    #[arg(short, long, global = true, default_value = "0")]
    port: u16,

    /// Host address
    #[arg(long, global = true, default_value = "127.0.0.1")]
    host: String,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Open a buffer by exact name and print its identity
    Open {
        name: String,
        /// edit, split, vsplit or tabedit
        #[arg(long, default_value = "edit")]
        opener: String,
        /// Command modifiers, e.g. "keepalt"
        #[arg(long, default_value = "")]
        mods: String,
    },
    /// Decode a file into a buffer: assign [++enc=ENC] [++ff=FF] FILE
    Assign {
        #[arg(long)]
        bufnr: Option<BufNr>,
        #[arg(trailing_var_arg = true, allow_hyphen_values = true, required = true)]
        args: Vec<String>,
    },
    /// Encode a buffer with its own fileencoding and fileformat
    Dump {
        #[arg(long)]
        bufnr: Option<BufNr>,
        /// Write here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Make a buffer's current content survive :edit
    Concrete {
        #[arg(long)]
        bufnr: Option<BufNr>,
    },
    /// Serve an in-memory host until interrupted
    ServeMemory,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Logs go to stderr; stdout carries command output
    // RUST_LOG, when set, overrides --debug
    let default_level = if args.debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;

    let output = match args.command {
        Command::ServeMemory => return serve_memory(&args.host, args.port).await,
        Command::Open {
            name,
            opener,
            mods,
        } => commands::open(&connect(addr).await?, &name, &opener, &mods).await?,
        Command::Assign { bufnr, args } => {
            commands::assign(&connect(addr).await?, bufnr, &args).await?
        }
        Command::Dump { bufnr, output } => {
            let session = connect(addr).await?;
            if let Some(bytes) = commands::dump(&session, bufnr, output.as_deref()).await? {
                let mut stdout = tokio::io::stdout();
                stdout.write_all(&bytes).await?;
                stdout.flush().await?;
            }
            return Ok(());
        }
        Command::Concrete { bufnr } => commands::concrete(&connect(addr).await?, bufnr).await?,
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn connect(addr: SocketAddr) -> Result<RpcSession> {
    let session = RpcSession::connect(addr).await?;
    info!("Connected to host at {}", session.addr());
    Ok(session)
}

async fn serve_memory(host: &str, port: u16) -> Result<()> {
    let dispatch = Arc::new(HostDispatch::new(Arc::new(MemoryHost::new())));
    let handle = IpcServer::bind(&format!("{}:{}", host, port), dispatch).await?;

    // Print port for clients to read (intentional stdout)
    println!("BUFSYNC_PORT={}", handle.addr().port());

    info!("In-memory host running on {}", handle.addr());

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received, exiting");

    Ok(())
}
