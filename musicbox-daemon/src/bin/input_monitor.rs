//! Prints every event the input device delivers until Ctrl+C.
//!
//! Usage: musicbox-input-monitor [device]

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use musicbox_core::event_queue::EventQueue;
use musicbox_core::input::DeviceReader;
use musicbox_core::ReadOutcome;
use musicbox_daemon::logger;

const DEFAULT_DEVICE: &str = "/dev/music_input";

fn main() -> anyhow::Result<()> {
    logger::init()?;

    let device = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DEVICE));

    let queue = EventQueue::default();
    let reader = DeviceReader::open(&device, Duration::from_millis(250))
        .with_context(|| format!("Failed to open {}", device.display()))?;
    let producer = reader.spawn(queue.producer())?;
    let source = queue.into_source();

    let (interrupt_tx, interrupt_rx) = crossbeam_channel::bounded(1);
    ctrlc::set_handler(move || {
        let _ = interrupt_tx.try_send(());
    })
    .context("Failed to install signal handler")?;

    println!("Waiting for events on {} (Ctrl+C to quit)", device.display());
    loop {
        match source.read_blocking(&interrupt_rx) {
            ReadOutcome::Event(code) => println!("{} ({})", code, code.as_byte() as char),
            ReadOutcome::Interrupted => {
                log::info!("Interrupted");
                break;
            }
            ReadOutcome::Closed => {
                log::warn!("Device reader stopped");
                break;
            }
        }
    }

    producer.stop();
    Ok(())
}
