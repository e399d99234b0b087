use std::io;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use futures_util::StreamExt;
use tokio::select;
use tokio::sync::mpsc;
use tokio::task::block_in_place;
use tracing::{error, info};

use screenman::api::{Command, Update};
use screenman::clock::MonotonicClock;
use screenman::config::Config;
use screenman::cover::{host_intent, present, to_canonical};
use screenman::feedback::FeedbackScreen;
use screenman::frame::Frame;
use screenman::ports;
use screenman::screen::{Screen, ScreenModel};
use screenman::serial::{SerialPortTransport, Transport};
use screenman::updater::ScreenRef;
use screenman::{Error, Result};

use crate::cli::{Action, Opts};

mod cli;

/// # Screenman
/// Command line control of a single projector screen or lift.
///
/// Screens without feedback start from the position given with `--at` and are
/// followed by estimation until they come to rest; screens with feedback are
/// followed from their own reports. Ctrl+C while moving sends a stop.
#[tokio::main]
async fn main() {
    let opts = Opts::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                let app_name = env!("CARGO_PKG_NAME").replace('-', "_");
                format!("{}={}", app_name, opts.log_level).into()
            }),
        )
        .init();

    if let Err(e) = run(opts).await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run(opts: Opts) -> Result<()> {
    if opts.action == Action::Ports {
        for port in ports::list_ports()? {
            println!("{}", port);
        }
        return Ok(());
    }

    let config = opts.screen_config()?;
    ports::ensure_exists(&config.serial_port)?;
    info!(
        "{} on {}",
        config.device_type,
        ports::serial_by_id(&config.serial_port).display()
    );

    match opts.action {
        Action::Probe => {
            ports::probe(&config.serial_port)?;
            println!("{} is available", config.title());
            Ok(())
        }
        action if config.feedback => run_feedback(&config, action, opts.at).await,
        action => run_timed(&config, action, opts.at).await,
    }
}

fn intent(action: Action) -> Option<Command> {
    match action {
        Action::Open => Some(Command::Open),
        Action::Close => Some(Command::Close),
        Action::Stop => Some(Command::Stop),
        Action::Position { pct } => Some(Command::SetPosition(pct)),
        Action::Ports | Action::Probe | Action::Watch => None,
    }
}

fn interrupts() -> Result<mpsc::UnboundedReceiver<()>> {
    let (tx, rx) = mpsc::unbounded_channel();
    ctrlc::set_handler(move || {
        let _ = tx.send(());
    })
    .map_err(|e| Error::Io(io::Error::new(io::ErrorKind::Other, e)))?;
    Ok(rx)
}

fn report(update: Update, inverted: bool) {
    let cover = present(update, inverted);
    println!(
        "{:3} %  {}{}",
        cover.position,
        update.state,
        if cover.is_closed { " (closed)" } else { "" }
    );
}

async fn run_timed(config: &Config, action: Action, at: f64) -> Result<()> {
    let model = ScreenModel::new(config.open_duration(), config.close_duration())
        .with_position(to_canonical(at, config.inverted));
    let screen = Screen::new(
        model,
        config.address,
        Box::new(SerialPortTransport::new(config.serial_port.clone())),
        Arc::new(MonotonicClock::new()),
    );
    let (screen, mut updates) = ScreenRef::new(screen);

    let command = intent(action).map(|c| host_intent(c, config.inverted));
    if command == Some(Command::Stop) {
        // a fresh process never sees the screen moving, so stop blindly
        let frame = Frame::encode(Command::Stop, config.address);
        let mut transport = SerialPortTransport::new(config.serial_port.clone());
        return block_in_place(|| transport.send(&frame));
    }

    let sent = block_in_place(|| match command {
        Some(Command::Open) => screen.open(),
        Some(Command::Close) => screen.close(),
        Some(Command::SetPosition(p)) => screen.set_position(p),
        Some(Command::Stop) | None => Ok(false),
    })?;
    if !sent {
        report(screen.update(), config.inverted);
        return Ok(());
    }

    let mut interrupts = interrupts()?;
    loop {
        select! {
            Some(update) = updates.next() => {
                report(update, config.inverted);
                if update.state.is_rest() {
                    break;
                }
            }
            Some(_) = interrupts.recv() => {
                info!("received Ctrl+C, stopping");
                block_in_place(|| screen.stop())?;
            }
            else => break,
        }
    }

    Ok(())
}

async fn run_feedback(config: &Config, action: Action, at: f64) -> Result<()> {
    let start = to_canonical(at, config.inverted).round() as u8;
    let screen = FeedbackScreen::connect(&config.serial_port, config.address, start)?;

    let (tx, mut updates) = mpsc::unbounded_channel();
    screen.add_callback(move |update| {
        let _ = tx.send(update);
    });

    let command = intent(action).map(|c| host_intent(c, config.inverted));
    let sent = block_in_place(|| match command {
        Some(Command::Open) => screen.open(),
        Some(Command::Close) => screen.close(),
        Some(Command::Stop) => screen.stop(),
        Some(Command::SetPosition(p)) => screen.set_position(p),
        None => Ok(false),
    })?;
    report(screen.update(), config.inverted);
    if !sent && action != Action::Watch {
        return screen.shutdown();
    }

    let mut interrupts = interrupts()?;
    loop {
        select! {
            Some(update) = updates.recv() => {
                report(update, config.inverted);
                if update.state.is_rest() && action != Action::Watch {
                    break;
                }
            }
            Some(_) = interrupts.recv() => {
                if action == Action::Watch {
                    break;
                }
                info!("received Ctrl+C, stopping");
                block_in_place(|| screen.stop())?;
            }
            _ = tokio::time::sleep(Duration::from_secs(1)) => {}
        }
        if !screen.is_available() {
            error!("lost connection to {}", config.serial_port);
            break;
        }
    }

    screen.shutdown()
}
