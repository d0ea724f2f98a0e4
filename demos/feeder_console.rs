//! Feeder console example
//!
//! Scans for a HungryCat feeder, connects to the first one found, requests
//! its alarms and clock, and prints everything the feeder reports.
//!
//! Run with: cargo run --example feeder_console
//!
//! To set an alarm after connecting:
//!   cargo run --example feeder_console -- --alarm 1 07:30

use hungry_cat_ble::{
    AlarmSetting, BleTransport, Command, ConnectionState, ConnectionStateMachine, EventPresenter,
    FeederConfig, FeederController, PresentationEvent, Result,
};
use std::time::Duration;

fn parse_alarm(args: &[String]) -> Option<AlarmSetting> {
    let i = args.iter().position(|arg| arg == "--alarm")?;
    let index = args.get(i + 1)?.parse().ok()?;
    let (hour, minute) = args.get(i + 2)?.split_once(':')?;
    AlarmSetting::new(index, hour.parse().ok()?, minute.parse().ok()?, true).ok()
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("hungry_cat_ble=debug".parse().unwrap()),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let alarm = parse_alarm(&args);

    println!("HungryCat Feeder Console");
    println!("========================\n");

    let config = FeederConfig::default();
    let (transport, transport_events) = BleTransport::new().await?;
    let presenter = EventPresenter::new(config.event_capacity);
    let mut events = presenter.subscribe();

    let machine = ConnectionStateMachine::new(transport, presenter, config);
    let feeder = FeederController::spawn(machine, transport_events);

    feeder.start_scan()?;

    let session = async {
        let mut connecting = false;

        while let Ok(event) = events.recv().await {
            match event {
                PresentationEvent::DeviceFound { device, is_feeder } => {
                    println!(
                        "Found: {} ({}) rssi {:?}{}",
                        device.display_name(),
                        device.address,
                        device.rssi,
                        if is_feeder { " <- feeder" } else { "" }
                    );
                    if is_feeder && !connecting {
                        connecting = true;
                        feeder.connect(device.address)?;
                    }
                }
                PresentationEvent::Status(text) => println!("{}", text),
                PresentationEvent::StateChanged(ConnectionState::Ready) => {
                    if let Some(alarm) = alarm {
                        println!("Setting {}", alarm);
                        feeder.send(Command::Alarm(alarm))?;
                    }
                }
                PresentationEvent::StateChanged(_) => {}
                PresentationEvent::AlarmUpdated {
                    index,
                    time,
                    enabled,
                } => println!(
                    "Alarm {}: {} {}",
                    index,
                    time,
                    if enabled { "on" } else { "off" }
                ),
                PresentationEvent::ClockSynced(result) => println!("{}", result),
                PresentationEvent::MessageReceived(text) => println!("< {}", text.trim_end()),
                PresentationEvent::Error(message) => {
                    println!("Error: {}", message);
                    break;
                }
            }
        }

        Ok::<(), hungry_cat_ble::Error>(())
    };

    match tokio::time::timeout(Duration::from_secs(60), session).await {
        Ok(result) => result?,
        Err(_) => println!("\nSession finished."),
    }

    feeder.shutdown().await
}
