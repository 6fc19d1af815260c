use std::{future::Future, pin::Pin};

use common_net::{metrics::lobby_metrics, shutdown};
use lobby::{LobbyConfig, SessionService};
use relay::MemoryRelay;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::broadcast::error::RecvError,
};
use tracing::{info, warn};

pub mod console;

pub use common_net::BoxError;
pub use console::{Command, Console, Flow};

fn print_lines(lines: &[String]) {
    for line in lines {
        println!("{line}");
    }
}

pub async fn run_with_ctrl_c(config: LobbyConfig) -> Result<(), BoxError> {
    let (shutdown_tx, shutdown_rx) = shutdown::channel();
    let ctrl_c = shutdown::trigger_on_ctrl_c(shutdown_tx, "lobby-cli");

    let result = run(config, shutdown_rx).await;

    ctrl_c.abort();
    result
}

/// Reads commands from stdin and relay events until `quit`, EOF or shutdown.
pub async fn run(config: LobbyConfig, shutdown_rx: shutdown::ShutdownReceiver) -> Result<(), BoxError> {
    lobby_metrics().on_startup();

    let relay = MemoryRelay::new();
    let mut console = Console::new(relay, config);
    let mut events = console.lobby().service().subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    let mut shutdown_future: Pin<Box<dyn Future<Output = ()> + Send>> =
        Box::pin(shutdown::wait(shutdown_rx));

    println!("Welcome. Type 'lobby' to browse sessions or 'help' for commands.");

    loop {
        tokio::select! {
            _ = &mut shutdown_future => {
                info!("lobby-cli: shutdown signal received");
                break;
            }
            line = lines.next_line() => {
                let Some(line) = line.map_err(|err| Box::new(err) as BoxError)? else {
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }
                let command = match line.parse::<Command>() {
                    Ok(command) => command,
                    Err(err) => {
                        println!("{err}");
                        continue;
                    }
                };
                let (flow, out) = console.execute(command).await;
                print_lines(&out);
                if flow == Flow::Quit {
                    break;
                }
            }
            event = events.recv() => match event {
                Ok(event) => print_lines(&console.on_event(event).await),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "lobby-cli: relay events lagged, resyncing");
                    print_lines(&console.resync().await);
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    console.close().await;
    Ok(())
}
