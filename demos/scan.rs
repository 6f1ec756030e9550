use log::LevelFilter;

#[tokio::main]
async fn main() {
    pretty_env_logger::formatted_builder()
        .filter_level(LevelFilter::Info)
        .init();

    run().await;
}

#[cfg(target_os = "macos")]
async fn run() {
    use rustybeacon::api::radio::ScanFilter;
    use rustybeacon::channel::ScanChannel;
    use rustybeacon::config::SessionConfig;
    use rustybeacon::corebluetooth::central_manager::CoreBluetoothRadio;
    use tokio::sync::mpsc;

    let (radio_tx, radio_rx) = mpsc::channel(256);
    let radio = CoreBluetoothRadio::new(radio_tx);
    let permissions = radio.permissions();

    let (channel, mut events) =
        match ScanChannel::spawn(radio, radio_rx, permissions, SessionConfig::default()) {
            Ok(spawned) => spawned,
            Err(e) => {
                log::error!("Could not start scan session: {}", e);
                return;
            }
        };

    match channel.start_scan(ScanFilter::default()).await {
        Ok(_) => log::info!("Scanning, press ctrl-c to stop"),
        Err(e) => {
            log::error!("Scan failed to start: {} ({})", e, e.code());
            return;
        }
    }

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(event) => handle_updates(event),
                None => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    if let Err(e) = channel.stop_scan().await {
        log::warn!("Stopping scan failed: {}", e);
    }
}

#[cfg(not(target_os = "macos"))]
async fn run() {
    log::error!("No radio backend for this platform");
}

/// Print whatever the session reports
#[cfg(target_os = "macos")]
fn handle_updates(update: rustybeacon::api::radio_event::ScanEvent) {
    use rustybeacon::api::radio_event::ScanEvent;

    match update {
        ScanEvent::DeviceFound { advertisement } => {
            let beacon = advertisement
                .beacon_format()
                .map(|format| format!(" {:?}", format))
                .unwrap_or_default();
            log::info!(
                "{} {:?} rssi {}{}",
                advertisement.id,
                advertisement.display_name,
                advertisement.rssi,
                beacon
            );
        }
        other => log::info!("{}", other.method_name()),
    }
}
