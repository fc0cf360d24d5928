//! LanShare Daemon
//!
//! Shares one directory with browsers on the local network.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use daemon::config::{default_config_path, Config};
use daemon::files::StorageRoot;
use daemon::http::{router, AppState};
use daemon::ui::{advertised_ip, generate_png_qr, generate_terminal_qr, share_url};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{reload, EnvFilter};

/// LanShare Daemon - share a directory over the local network.
#[derive(Parser, Debug)]
#[command(name = "lanshare")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for the daemon.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Serve the shared directory
    Serve {
        /// Directory to share (overrides the config file)
        #[arg(long, short, value_name = "DIR")]
        root: Option<PathBuf>,

        /// Address to bind
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on
        #[arg(long, short)]
        port: Option<u16>,

        /// Don't print the QR code on startup
        #[arg(long)]
        no_qr: bool,
    },

    /// Show the QR code for the share URL
    Qr {
        /// Output format for the QR code
        #[arg(long, short, value_enum, default_value = "terminal")]
        format: QrFormat,

        /// Output file path for PNG format (defaults to ./lanshare-qr.png)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Write the default configuration file
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Output format for QR codes.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum QrFormat {
    /// Display as text in terminal
    Terminal,
    /// Generate a PNG image
    Png,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing before the config is read so override messages are
    // kept; the filter is narrowed to the configured level afterwards.
    let env_filter = EnvFilter::try_from_default_env().ok();
    let from_env = env_filter.is_some();
    let (filter, filter_handle) =
        reload::Layer::new(env_filter.unwrap_or_else(|| startup_filter(cli.verbose)));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config_path = cli.config.clone().unwrap_or_else(default_config_path);
    tracing::debug!("Using config file: {:?}", config_path);
    let mut config = Config::load(&config_path)?;
    config.apply_env_overrides();

    // RUST_LOG and --verbose win over the configured level
    if !from_env && !cli.verbose {
        filter_handle
            .reload(configured_filter(&config)?)
            .context("Failed to apply configured log level")?;
    }

    match cli.command {
        Commands::Serve {
            root,
            host,
            port,
            no_qr,
        } => {
            if let Some(root) = root {
                config.storage.root = Some(root);
            }
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            config.validate()?;
            serve(config, !no_qr).await?;
        }
        Commands::Qr { format, output } => {
            config.validate()?;
            let url = config_share_url(&config)?;

            match format {
                QrFormat::Terminal => {
                    println!("\nScan this QR code to open the share:\n");
                    println!("{}", generate_terminal_qr(&url)?);
                    println!("URL: {}", url);
                }
                QrFormat::Png => {
                    let output_path = output.unwrap_or_else(|| PathBuf::from("lanshare-qr.png"));
                    generate_png_qr(&url, &output_path)?;
                    println!("QR code saved to: {}", output_path.display());
                    println!("URL: {}", url);
                }
            }
        }
        Commands::InitConfig { force } => {
            if config_path.exists() && !force {
                anyhow::bail!(
                    "Config file already exists at {} (use --force to overwrite)",
                    config_path.display()
                );
            }
            Config::default().save(&config_path)?;
            println!("Configuration written to: {}", config_path.display());
        }
    }

    Ok(())
}

/// Filter used until the configuration has been loaded.
fn startup_filter(verbose: bool) -> EnvFilter {
    EnvFilter::new(if verbose { "debug" } else { "info" })
}

/// Filter for the configured `daemon.log_level`.
fn configured_filter(config: &Config) -> anyhow::Result<EnvFilter> {
    EnvFilter::try_new(&config.daemon.log_level)
        .with_context(|| format!("Invalid log level: {}", config.daemon.log_level))
}

/// Share URL for the configured listener.
fn config_share_url(config: &Config) -> anyhow::Result<String> {
    let addr = config.server.bind_addr()?;
    Ok(share_url(advertised_ip(addr.ip()), addr.port()))
}

/// Bind the listener and serve until SIGINT or SIGTERM.
async fn serve(config: Config, show_qr: bool) -> anyhow::Result<()> {
    let root_path = config
        .storage
        .root
        .clone()
        .context("No directory to share; pass --root or set storage.root in the config file")?;
    let root = StorageRoot::new(&root_path)
        .with_context(|| format!("Cannot share {}", root_path.display()))?;

    let addr: SocketAddr = config.server.bind_addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to address {}", addr))?;

    let url = config_share_url(&config)?;
    let state = AppState::from_config(root, &config, url.clone());

    tracing::info!(
        root = %state.root().path().display(),
        addr = %addr,
        upload_limit = ?config.upload_limit(),
        "LanShare daemon listening"
    );

    println!("\nSharing {} at {}\n", root_path.display(), url);
    if show_qr {
        match generate_terminal_qr(&url) {
            Ok(qr) => println!("{}", qr),
            Err(e) => tracing::warn!("Failed to generate QR code: {}", e),
        }
    }

    axum::serve(listener, router(state))
        .with_graceful_shutdown(wait_for_shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("LanShare daemon stopped");
    Ok(())
}

/// Wait for a shutdown signal (SIGTERM or SIGINT).
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let (mut sigterm, mut sigint) = match (
        signal(SignalKind::terminate()),
        signal(SignalKind::interrupt()),
    ) {
        (Ok(term), Ok(int)) => (term, int),
        (Err(e), _) | (_, Err(e)) => {
            tracing::error!("Failed to register signal handlers: {}", e);
            // Fall back to Ctrl-C only
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
            return;
        }
    };

    tokio::select! {
        _ = sigterm.recv() => {
            tracing::info!("Received SIGTERM");
        }
        _ = sigint.recv() => {
            tracing::info!("Received SIGINT");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;
    use std::sync::{Arc, Mutex};
    use tracing_subscriber::fmt::MakeWriter;

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl CapturedLogs {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    impl Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for CapturedLogs {
        type Writer = CapturedLogs;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[test]
    #[serial]
    fn test_env_override_messages_are_logged_before_level_applies() {
        std::env::set_var("LANSHARE_PORT", "not-a-port");
        std::env::set_var("LANSHARE_LOG_LEVEL", "warn");

        let logs = CapturedLogs::default();
        let (filter, handle) = reload::Layer::new(startup_filter(false));
        let subscriber = tracing_subscriber::registry().with(filter).with(
            tracing_subscriber::fmt::layer()
                .with_writer(logs.clone())
                .with_ansi(false),
        );

        tracing::subscriber::with_default(subscriber, || {
            let mut config = Config::default();
            config.apply_env_overrides();
            handle.reload(configured_filter(&config).unwrap()).unwrap();

            tracing::info!("hidden after reload");
            tracing::warn!("shown after reload");
        });

        std::env::remove_var("LANSHARE_PORT");
        std::env::remove_var("LANSHARE_LOG_LEVEL");

        let output = logs.contents();
        assert!(output.contains("Ignoring invalid LANSHARE_PORT"));
        assert!(output.contains("Overriding log_level from environment: warn"));
        assert!(!output.contains("hidden after reload"));
        assert!(output.contains("shown after reload"));
    }

    #[test]
    fn test_configured_filter_rejects_garbage() {
        let mut config = Config::default();
        config.daemon.log_level = "lanshare=loud".to_string();
        assert!(configured_filter(&config).is_err());
    }
}
