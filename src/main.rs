use anyhow::Result;
use clap::{Parser, Subcommand};
use scopedome::{
    card::DomeCard,
    config::DomeConfig,
    console::{apply, OperatorConsole},
    dome::ScopeDome,
    hardware_card::{HardwareCard, DEFAULT_BAUD_RATE},
    inertia::InertiaTable,
    mock_controller::mock_controller::run_mock_controller,
    simulator::SimulatedCard,
};
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::{interval, Duration, MissedTickBehavior};

/// ScopeDome controller: drives the dome card and takes operator commands on stdin.
#[derive(Parser, Debug)]
#[command(name = "scopedome", version)]
struct Cli {
    /// TOML configuration; defaults apply when the file is missing.
    #[arg(long, default_value = "scopedome.toml")]
    config: PathBuf,
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Control a card on a serial port.
    Serial {
        path: String,
        #[arg(long, default_value_t = DEFAULT_BAUD_RATE)]
        baud: u32,
    },
    /// Control a card reached over TCP (e.g. the mock controller).
    Tcp {
        #[arg(default_value = "127.0.0.1")]
        host: String,
        #[arg(default_value_t = 8887)]
        port: u16,
    },
    /// Control the in-process simulated card.
    Simulate,
    /// Serve a simulated card over TCP.
    MockController {
        #[arg(default_value_t = 8887)]
        port: u16,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = DomeConfig::load(&cli.config)?;

    let card = match cli.cmd {
        Cmd::Serial { path, baud } => DomeCard::Hardware(HardwareCard::open_serial(&path, baud)?),
        Cmd::Tcp { host, port } => {
            DomeCard::Hardware(HardwareCard::connect_tcp(&host, port).await?)
        }
        Cmd::Simulate => DomeCard::Simulator(SimulatedCard::default()),
        Cmd::MockController { port } => {
            run_mock_controller(port).await?;
            return Ok(());
        }
    };

    let inertia = match &config.inertia_table {
        Some(path) => InertiaTable::load(path).unwrap_or_else(|error| {
            log::warn!("Ignoring inertia table {}: {error}", path.display());
            InertiaTable::default()
        }),
        None => InertiaTable::default(),
    };

    run_session(card, config, inertia).await
}

async fn run_session(card: DomeCard, config: DomeConfig, inertia: InertiaTable) -> Result<()> {
    let mut ticker = interval(Duration::from_millis(config.poll_interval_ms));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut dome = ScopeDome::connect(card, config, inertia).await?;
    let console = OperatorConsole::new()?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(error) = dome.tick().await {
                    log::error!("Tick failed: {error}");
                }
            }
            line = lines.next_line() => {
                let Some(line) = line? else {
                    log::info!("Console closed; stopping.");
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }
                match apply(&mut dome, console.parse(&line)).await {
                    Ok(reply) => println!("{reply}"),
                    Err(error) => println!("ERROR {}", error.get_error_message()),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                log::info!("Interrupted; stopping dome.");
                dome.abort().await?;
                break;
            }
        }
    }
    Ok(())
}
