use anyhow::Result;
use lfp_bms::actuators::LoggingActuators;
use lfp_bms::bms::{BmsCommand, BmsController};
use lfp_bms::clock::SystemClock;
use lfp_bms::config::Config;
use lfp_bms::logging::init_logging;
use lfp_bms::persistence::JsonFileStore;
use lfp_bms::sensors::SimulatedPack;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => Config::from_file(&path)?,
        None => Config::load()?,
    };
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;

    init_logging(&config.logging).map_err(|e| anyhow::anyhow!("Logging init failed: {}", e))?;
    info!("LFP-BMS {} starting up", env!("APP_VERSION"));

    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<BmsCommand>();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut controller = BmsController::new(
        config.clone(),
        Arc::new(SystemClock::new()),
        Box::new(SimulatedPack::from_config(&config.sensors)),
        Box::new(LoggingActuators::new()),
        Box::new(JsonFileStore::new(&config.soh.state_file, &config.soh.namespace)),
    );

    let mut tasks: Vec<tokio::task::JoinHandle<()>> = Vec::new();

    #[cfg(feature = "web")]
    if config.web.enabled {
        let state = lfp_bms::web::AppState {
            snapshot_rx: controller.subscribe(),
            commands_tx: cmd_tx.clone(),
        };
        let host = config.web.host.clone();
        let port = config.web.port;
        let shutdown = shutdown_rx.clone();
        tasks.push(tokio::spawn(async move {
            if let Err(e) = lfp_bms::web::serve(state, &host, port, shutdown).await {
                error!("Web server error: {}", e);
            }
        }));
    }

    #[cfg(feature = "console")]
    if config.console.enabled {
        let snapshot_rx = controller.subscribe();
        let commands_tx = cmd_tx.clone();
        let shutdown = shutdown_rx.clone();
        tasks.push(tokio::spawn(async move {
            let stdin = tokio::io::BufReader::new(tokio::io::stdin());
            let stdout = tokio::io::stdout();
            if let Err(e) =
                lfp_bms::console::run_console(stdin, stdout, snapshot_rx, commands_tx, shutdown)
                    .await
            {
                error!("Console error: {}", e);
            }
        }));
    }

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl-C received, shutting down");
        }
        let _ = shutdown_tx.send(true);
    });

    let result = controller.run(cmd_rx, shutdown_rx).await;
    drop(cmd_tx);

    for task in tasks {
        // the console may be parked on a stdin read
        task.abort();
    }

    match result {
        Ok(()) => {
            info!("Shutdown complete");
            Ok(())
        }
        Err(e) => {
            error!("Controller failed with error: {}", e);
            Err(anyhow::anyhow!("Controller error: {}", e))
        }
    }
}
