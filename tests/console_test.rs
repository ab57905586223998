#![cfg(feature = "console")]

use lfp_bms::BmsCommand;
use lfp_bms::console::{ConsoleCommand, parse, run_console};
use lfp_bms::status::StatusSnapshot;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

async fn run(input: &str) -> (String, Vec<BmsCommand>) {
    let (_snapshot_tx, snapshot_rx) = watch::channel(Arc::new(StatusSnapshot::initial()));
    let (commands_tx, mut commands_rx) = mpsc::unbounded_channel();
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);

    let reader = tokio::io::BufReader::new(input.as_bytes());
    let mut out: Vec<u8> = Vec::new();
    run_console(reader, &mut out, snapshot_rx, commands_tx, shutdown_rx)
        .await
        .unwrap();

    let mut commands = Vec::new();
    while let Ok(cmd) = commands_rx.try_recv() {
        commands.push(cmd);
    }
    (String::from_utf8(out).unwrap(), commands)
}

#[tokio::test]
async fn help_lists_commands() {
    let (out, commands) = run("help\n").await;
    assert!(out.contains("cal_soh"));
    assert!(out.contains("stop_balance"));
    assert!(commands.is_empty());
}

#[tokio::test]
async fn control_commands_are_forwarded_in_order() {
    let (out, commands) = run("set_soc 80\nRESET_CYCLES\n\ncal_soh 5.5\nclear\n").await;
    assert_eq!(
        commands,
        vec![
            BmsCommand::ResetSoc(80.0),
            BmsCommand::ResetCycles,
            BmsCommand::CalibrateCapacity(5.5),
            BmsCommand::ClearProtection,
        ]
    );
    assert!(out.contains("SOC set to 80.0%"));
    assert!(out.contains("No protection to clear"));
}

#[tokio::test]
async fn invalid_input_is_reported_not_forwarded() {
    let (out, commands) = run("cal_soh 12\nfrobnicate\nset_soc\n").await;
    assert!(commands.is_empty());
    assert!(out.contains("Invalid capacity (0-10Ah)"));
    assert!(out.contains("Unknown command 'frobnicate'. Type 'help' for list"));
    assert!(out.contains("Missing value"));
}

#[tokio::test]
async fn informational_commands_render_snapshot() {
    let (out, _) = run("sensors\nprotection\njson\n").await;
    assert!(out.contains("Cell 4:"));
    assert!(out.contains("Protection status: NORMAL"));
    assert!(out.contains("\"cellVoltages\""));
}

#[tokio::test]
async fn shutdown_stops_console() {
    let (_snapshot_tx, snapshot_rx) = watch::channel(Arc::new(StatusSnapshot::initial()));
    let (commands_tx, _commands_rx) = mpsc::unbounded_channel();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // A reader that never yields a line
    let (_client, server) = tokio::io::duplex(64);
    let reader = tokio::io::BufReader::new(server);
    let task = tokio::spawn(async move {
        run_console(reader, tokio::io::sink(), snapshot_rx, commands_tx, shutdown_rx).await
    });

    shutdown_tx.send(true).unwrap();
    let result = tokio::time::timeout(std::time::Duration::from_secs(2), task)
        .await
        .unwrap()
        .unwrap();
    assert!(result.is_ok());
}

#[test]
fn parse_maps_monitoring_commands() {
    assert_eq!(parse("status").unwrap(), Some(ConsoleCommand::Status));
    assert_eq!(parse("Balance").unwrap(), Some(ConsoleCommand::Balance));
    assert_eq!(
        parse("stop_balance").unwrap(),
        Some(ConsoleCommand::Control(BmsCommand::StopBalancing))
    );
    assert_eq!(
        parse("reset_soh").unwrap(),
        Some(ConsoleCommand::Control(BmsCommand::ResetSoh))
    );
}
