//! vdesk entrypoint: a line-delimited JSON-RPC shell over stdin/stdout
//! driving the session façade.
//!
//! stdout belongs to the transport, so logging goes to a file through a
//! non-blocking appender. Teardown has a single entry point: client
//! disconnect (stdin EOF), SIGINT, and SIGTERM all funnel into
//! `destroy_all` before the process exits.

mod rpc;

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::Once;

use anyhow::Result;
use clap::Parser;
use core_facade::SessionFacade;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::{Mutex, mpsc};
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;

/// Responses queued for the stdout writer task.
const RESPONSE_CHANNEL_CAP: usize = 64;

/// CLI arguments.
#[derive(Parser, Debug)]
#[command(name = "vdesk", version, about = "Offscreen display session control plane")]
struct Args {
    /// Optional configuration file path (overrides discovery of `vdesk.toml`).
    #[arg(long = "config")]
    config: Option<PathBuf>,
    /// Log file path. Defaults to `vdesk.log` in the working directory.
    #[arg(long = "log-file")]
    log_file: Option<PathBuf>,
}

struct AppStartup {
    log_guard: Option<WorkerGuard>,
}

impl AppStartup {
    fn new() -> Self {
        Self { log_guard: None }
    }

    fn configure_logging(&mut self, override_path: Option<&Path>) -> Result<()> {
        let path = override_path.unwrap_or_else(|| Path::new("vdesk.log"));
        let dir = path.parent().filter(|p| !p.as_os_str().is_empty());
        let name = path.file_name().unwrap_or_else(|| OsStr::new("vdesk.log"));

        let file_appender =
            tracing_appender::rolling::never(dir.unwrap_or_else(|| Path::new(".")), name);
        let (nb_writer, guard) = tracing_appender::non_blocking(file_appender);
        match tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_writer(nb_writer)
            .with_ansi(false)
            .try_init()
        {
            Ok(_) => {
                self.log_guard = Some(guard);
            }
            Err(_err) => {
                // Global tracing subscriber already installed; drop guard so
                // the writer shuts down.
            }
        }
        Ok(())
    }

    fn install_panic_hook() {
        static HOOK: Once = Once::new();
        HOOK.call_once(|| {
            let default_panic = std::panic::take_hook();
            std::panic::set_hook(Box::new(move |info| {
                tracing::error!(target: "runtime.panic", ?info, "panic");
                default_panic(info);
            }));
        });
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let mut startup = AppStartup::new();
    startup.configure_logging(args.log_file.as_deref())?;
    AppStartup::install_panic_hook();
    info!(target: "runtime", "startup");

    let config = core_config::load_from(args.config.clone())?;
    let facade = Arc::new(Mutex::new(SessionFacade::new(&config)));
    serve(facade).await
}

/// Read requests line by line, dispatching each in its own task so slow
/// operations (readiness waits, window polls) never block the transport.
/// Exits when stdin closes or a termination signal arrives, destroying
/// every live session first.
async fn serve(facade: Arc<Mutex<SessionFacade>>) -> Result<()> {
    let (out_tx, mut out_rx) = mpsc::channel::<String>(RESPONSE_CHANNEL_CAP);
    let writer = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(line) = out_rx.recv().await {
            if stdout.write_all(line.as_bytes()).await.is_err() {
                break;
            }
            if stdout.write_all(b"\n").await.is_err() {
                break;
            }
            let _ = stdout.flush().await;
        }
    });

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    let reason = loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    let facade = facade.clone();
                    let out_tx = out_tx.clone();
                    tokio::spawn(async move {
                        if let Some(response) = rpc::handle_line(&facade, &line).await {
                            let _ = out_tx.send(response).await;
                        }
                    });
                }
                Ok(None) => break "stdin_closed",
                Err(err) => {
                    error!(target: "rpc", %err, "stdin_read_failed");
                    break "stdin_error";
                }
            },
            _ = sigint.recv() => break "sigint",
            _ = sigterm.recv() => break "sigterm",
        }
    };

    info!(target: "runtime.shutdown", reason, "teardown_begin");
    facade.lock().await.destroy_all().await;
    drop(out_tx);
    let _ = writer.await;
    // Handlers already in flight may have raced the first sweep; every one
    // has drained once the writer exits, so a second sweep catches any
    // session they registered.
    facade.lock().await.destroy_all().await;
    info!(target: "runtime.shutdown", reason, "teardown_complete");
    Ok(())
}
