use std::env;
use std::io;
use std::process::ExitCode;

use gym_engine::Simulator;
use gym_engine::config::SimConfig;
use gym_engine::csv::{read_operations, write_report};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{error, warn};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::WARN.into())
                .from_env_lossy(),
        )
        .with_writer(io::stderr)
        .init();

    let Some(path) = env::args().nth(1) else {
        eprintln!("usage: gym-sim <operations.csv>");
        return ExitCode::from(2);
    };

    if !path.ends_with(".csv") {
        warn!(path, "input file seems to not be a csv file");
    }

    let config = match SimConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let simulator = match Simulator::new(&config) {
        Ok(simulator) => simulator,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let operations = match read_operations(path) {
        Ok(operations) => operations,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let (op_sender, op_receiver) = tokio::sync::mpsc::channel(16);

    tokio::spawn(async move {
        for result in operations {
            match result {
                Ok(op) => {
                    if op_sender.send(op).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!("{e}");
                }
            }
        }
    });

    simulator.run(ReceiverStream::new(op_receiver)).await;

    let store = simulator.store();
    let report = store
        .sessions()
        .and_then(|sessions| Ok((sessions, store.cards()?, store.ledger()?)));
    let (sessions, cards, ledger) = match report {
        Ok(report) => report,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = write_report(io::stdout().lock(), &sessions, &cards, &ledger) {
        error!("{e}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
