use anyhow::Result;
use clap::Parser;
use radar_client::{
    binder::RadarSubscription,
    cli::Args,
    client::WsConnector,
    config::Config,
    events::create_event_channel,
    formatter::RadarFormatter,
    monitoring::{HealthStatus, setup_metrics},
    tracing_setup::setup_tracing,
    ui::{Command, UIController, UIOptions},
};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    setup_tracing(&args.log_level, args.json_logs)?;

    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        warn!("A rustls crypto provider was already installed");
    }

    info!(
        "Starting market radar client v{}",
        env!("CARGO_PKG_VERSION")
    );

    let config = Config::from_args(&args)?;

    if config.metrics.enabled {
        setup_metrics(config.metrics.port).await?;
        info!("Metrics server started on port {}", config.metrics.port);
    }

    let ui = UIController::new(
        RadarFormatter::new(config.display.format, config.display.colored),
        UIOptions {
            colored: config.display.colored,
            quiet: config.display.quiet,
        },
    );
    ui.print_startup_banner(config.subscription.symbol.as_str());

    let (event_tx, mut event_rx) = create_event_channel();
    let websocket = config.websocket.clone();
    let mut subscription = RadarSubscription::new(
        Arc::new(WsConnector),
        config.channel_settings(),
        move |key| websocket.target_for(key),
    )
    .with_events(event_tx);
    let mut snapshots = subscription.watch();

    subscription.bind(config.subscription.symbol.clone()).await;

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut input_open = config.display.interactive;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down");
                break;
            }
            Some(event) = event_rx.recv() => ui.handle_event(&event),
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = snapshots.borrow_and_update().clone();
                let symbol = subscription.key().map(|k| k.to_string()).unwrap_or_default();
                ui.render(&symbol, &snapshot);
            }
            line = stdin.next_line(), if input_open => match line {
                Ok(Some(line)) => match Command::parse(&line) {
                    Ok(Some(Command::Switch(key))) => subscription.bind(key).await,
                    Ok(Some(Command::Retry)) => {
                        if !subscription.retry().await {
                            warn!("Nothing to retry, no symbol bound");
                        }
                    }
                    Ok(Some(Command::Status)) => {
                        let health = HealthStatus::from_snapshot(
                            subscription.key(),
                            &subscription.snapshot(),
                        );
                        ui.print_health(&health.to_json());
                    }
                    Ok(Some(Command::Help)) => ui.print_help(),
                    Ok(Some(Command::Quit)) => break,
                    Ok(None) => {}
                    Err(e) => ui.print_error("INPUT", &e.to_string()),
                },
                Ok(None) => input_open = false,
                Err(e) => {
                    warn!("Failed to read stdin: {}", e);
                    input_open = false;
                }
            },
        }
    }

    subscription.dispose().await;
    while let Ok(event) = event_rx.try_recv() {
        ui.handle_event(&event);
    }
    info!("Radar client stopped");
    Ok(())
}
