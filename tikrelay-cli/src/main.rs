mod cli;
mod config;
mod output;

use std::process;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
#[cfg(feature = "colored-output")]
use colored::*;
use tiktok_relay::{ConnectionState, RelayClient};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use crate::cli::{Args, Commands, WatchArgs};
use crate::config::AppConfig;
use crate::output::EventPrinter;

const DEFAULT_LOG_DIRECTIVES: &str = "tikrelay=info,tiktok_relay=info";

#[tokio::main]
async fn main() {
    let args = Args::parse();

    if let Err(e) = run(args).await {
        error!("Application error: {e:#}");
        #[cfg(feature = "colored-output")]
        {
            eprintln!("{} {e:#}", "Error:".red().bold());
        }
        #[cfg(not(feature = "colored-output"))]
        {
            eprintln!("Error: {e:#}");
        }
        process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    init_logging(args.verbose, args.quiet, args.log_json)?;

    let mut config = AppConfig::load(args.config.as_deref())?;
    if args.no_color {
        config.display.colored = false;
    }

    match args.command {
        Commands::Watch(watch_args) => watch(config, &watch_args).await,
        Commands::Config { show, path } => {
            if path {
                match args.config.or_else(AppConfig::default_path) {
                    Some(path) => println!("{}", path.display()),
                    None => println!("No configuration directory available"),
                }
            } else if show {
                print!("{}", config.show()?);
            } else {
                println!("Use --show to display the current configuration or --path to locate it");
            }
            Ok(())
        }
    }
}

async fn watch(mut config: AppConfig, args: &WatchArgs) -> Result<()> {
    config.apply_watch_args(args);

    let mut client = RelayClient::new(config.relay.clone()).context("invalid relay settings")?;
    let printer = Arc::new(EventPrinter::new(
        config.display.colored,
        config.display.top_viewers,
    ));
    let cancel = CancellationToken::new();
    subscribe_printers(&mut client, &printer, &cancel);

    client
        .connect()
        .with_context(|| format!("cannot watch '{}'", config.relay.username.trim()))?;
    info!(username = %config.relay.username.trim(), "Watching live stream, press Ctrl-C to stop");

    let stop = cancel.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C");
            return;
        }
        info!("Ctrl-C received, disconnecting");
        stop.cancel();
    });

    client
        .run(Duration::from_millis(config.display.tick_ms), cancel)
        .await;
    Ok(())
}

fn subscribe_printers(
    client: &mut RelayClient,
    printer: &Arc<EventPrinter>,
    cancel: &CancellationToken,
) {
    let bus = client.bus_mut();

    let p = printer.clone();
    bus.chat.subscribe(move |chat| println!("{}", p.chat(chat)));

    let p = printer.clone();
    bus.gift_streak.subscribe(move |event| {
        if let Some(line) = p.gift_streak(event) {
            println!("{line}");
        }
    });

    let p = printer.clone();
    bus.like_milestone
        .subscribe(move |milestone| println!("{}", p.like_milestone(milestone)));

    let p = printer.clone();
    bus.room_user
        .subscribe(move |room| println!("{}", p.room_user(room)));

    let p = printer.clone();
    bus.connection_error
        .subscribe(move |err| eprintln!("{}", p.connection_error(err)));

    let p = printer.clone();
    bus.configuration_error
        .subscribe(move |err| eprintln!("{}", p.configuration_error(err)));

    // Stop once the relay goes away; there is no automatic reconnect.
    let p = printer.clone();
    let stop = cancel.clone();
    bus.state_change.subscribe(move |change| {
        println!("{}", p.state_change(change));
        if change.to == ConnectionState::Disconnected {
            stop.cancel();
        }
    });
}

fn init_logging(verbose: bool, quiet: bool, json: bool) -> Result<()> {
    let filter = if quiet {
        EnvFilter::new("warn")
    } else if verbose {
        EnvFilter::new("tikrelay=debug,tiktok_relay=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_DIRECTIVES))
    };

    let registry = tracing_subscriber::registry().with(filter);
    let result = if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(verbose)
                    .with_writer(std::io::stderr),
            )
            .try_init()
    };
    result.context("failed to initialize logging")
}
