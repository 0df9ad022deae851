#![deny(clippy::all)]

mod capture;
mod cards;
mod error;
mod export;
mod gemini;
mod interpret;
mod session;
mod ui;

use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncBufReadExt;
use tokio::sync::mpsc;
use tracing::info;

/// Application configuration
#[derive(serde::Deserialize)]
struct Config {
    interpreter: gemini::InterpreterConfig,
    session: SessionConfig,
}

#[derive(serde::Deserialize)]
struct SessionConfig {
    reveal_delay_ms: u64,
}

/// Load configuration from embedded config.toml
fn load_config() -> Result<Config, Box<dyn std::error::Error>> {
    const CONFIG_TOML: &str = include_str!("../config.toml");
    let config: Config = toml::from_str(CONFIG_TOML)?;
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing for structured logging
    tracing_subscriber::fmt::init();

    // Pick up GEMINI_API_KEY from a .env file if present
    dotenvy::dotenv().ok();

    let config = load_config()
        .map_err(|e| anyhow::anyhow!("invalid embedded config.toml: {}", e))?;

    // A broken deck is a startup failure, never a draw-time one.
    cards::validate_catalogs().context("card catalogs failed validation")?;

    let api_key = std::env::var("GEMINI_API_KEY").map_err(|_| error::ConfigError::MissingApiKey)?;
    let interpreter = Arc::new(gemini::GeminiClient::new(api_key, &config.interpreter)?);
    info!(model = %config.interpreter.model, "Interpretation client ready");

    let capture = Box::new(capture::MicCapture::new());

    let (outcome_tx, mut outcome_rx) = mpsc::unbounded_channel();
    let mut driver = session::SessionDriver::new(
        interpreter,
        capture,
        Duration::from_millis(config.session.reveal_delay_ms),
        outcome_tx,
    );

    ui::print_welcome();

    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match ui::parse_command(&line) {
                    Some(ui::Command::Intent(intent)) => {
                        driver.dispatch(intent).await;
                        ui::render(driver.state());
                    }
                    Some(ui::Command::Help) => ui::print_help(),
                    Some(ui::Command::Quit) => break,
                    None => {
                        if !line.trim().is_empty() {
                            println!("Unknown command; type 'help'.");
                        }
                    }
                }
            }
            Some(outcome) = outcome_rx.recv() => {
                driver.resolve(outcome).await;
                ui::render(driver.state());
            }
        }
    }

    // Dropping the driver releases the capture device on the way out.
    info!("Shutting down");
    Ok(())
}
