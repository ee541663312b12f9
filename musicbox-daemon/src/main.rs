use std::path::PathBuf;

use anyhow::Context;
use crossbeam_channel::bounded;
use musicbox_core::config::{Config, InputBackend};
use musicbox_core::display::StatusDisplay;
use musicbox_core::event_queue::{self, EventQueue};
use musicbox_core::input::{DeviceReader, InputSubsystem, ProducerHandle, SysfsGpio};
use musicbox_core::mixer::Amixer;
use musicbox_core::player::SystemPlayer;
use musicbox_core::PlaybackSession;
use musicbox_daemon::dispatch::{self, Dispatcher};
use musicbox_daemon::{listener, logger};

fn main() -> anyhow::Result<()> {
    logger::init()?;

    // Optional config path as the only argument
    let config_path = std::env::args_os().nth(1).map(PathBuf::from);
    let config = Config::load(config_path.as_deref()).context("Failed to load configuration")?;
    logger::apply_level(&config.log.level);
    log::info!("Starting musicboxd");
    log::debug!("Effective configuration:\n{}", config.to_toml());

    let queue = EventQueue::new(config.input.queue_capacity);
    let producer = start_input(&config, &queue).context("Failed to open input")?;
    let source = queue.into_source();

    let mixer = Amixer::new(&config.mixer.program, config.mixer.card, &config.mixer.control);
    let player = SystemPlayer::new(config.decoder(), config.fetcher());
    let mut session = PlaybackSession::new(player, mixer, config.catalogs(), config.session_settings());
    session.apply_volume();

    let (connections, remote_port) = listener::start(&config.remote);

    let display = StatusDisplay::open_tty(&config.display.tty, remote_port);
    let mut dispatcher = Dispatcher::new(session, display, config.dispatch.debounce());
    dispatcher.show("Idle");

    let (shutdown_tx, shutdown_rx) = bounded(1);
    ctrlc::set_handler(move || {
        let _ = shutdown_tx.try_send(());
    })
    .context("Failed to install signal handler")?;

    dispatch::run(
        &mut dispatcher,
        source.receiver(),
        &connections,
        &shutdown_rx,
        config.dispatch.tick(),
    );

    log::info!("Stopping {} producer", producer.name());
    producer.stop();
    let unread = event_queue::drain(source.receiver());
    if !unread.is_empty() {
        log::debug!("Discarding {} unread events", unread.len());
    }
    log::info!("musicboxd stopped");
    Ok(())
}

/// Open the configured input and start its producer thread
fn start_input(config: &Config, queue: &EventQueue) -> anyhow::Result<ProducerHandle> {
    let poll_interval = config.input.poll_interval();
    let handle = match config.input.backend {
        InputBackend::Device => {
            DeviceReader::open(&config.input.device, poll_interval)?.spawn(queue.producer())?
        }
        InputBackend::Gpio => {
            let subsystem = InputSubsystem::new(config.input_channels()?, queue.producer());
            SysfsGpio::open(&config.input.gpio_root, subsystem, poll_interval)?.spawn()?
        }
    };
    log::info!("Input producer {} running", handle.name());
    Ok(handle)
}
