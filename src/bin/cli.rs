//! Sensor Hub CLI
//!
//! Command-line interface for sensor hub operations:
//! - Push a reading (acts as a producer)
//! - Check status
//! - Generate a config file

use clap::{Parser, Subcommand};
use sensor_hub::config::generate_default_config;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "sensor-hub")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Push sensor readings to every connected WebSocket client")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Hub server URL
    #[arg(long, default_value = "http://localhost:8082", global = true)]
    pub api_url: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Broadcast a reading
    Send {
        /// Reading as JSON, e.g. '{"temp": 21.5}'. Plain numbers work too.
        value: String,
    },

    /// Show hub status
    Status,

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    match cli.command {
        Commands::Send { value } => {
            let body: serde_json::Value = match serde_json::from_str(&value) {
                Ok(body) => body,
                Err(e) => {
                    eprintln!("Reading is not valid JSON: {}", e);
                    std::process::exit(1);
                }
            };

            let response = client
                .post(format!("{}/api/v1/readings", cli.api_url))
                .json(&body)
                .send()
                .await?;

            if response.status().is_success() {
                let report: serde_json::Value = response.json().await?;
                println!(
                    "Broadcast at {}: sent to {}, pruned {}",
                    report["time"].as_str().unwrap_or("?"),
                    report["sent"],
                    report["pruned"]
                );
            } else {
                let status = response.status();
                let text = response.text().await.unwrap_or_default();
                eprintln!("Failed ({}): {}", status, text);
                std::process::exit(1);
            }
        }

        Commands::Status => {
            let response = client
                .get(format!("{}/health", cli.api_url))
                .send()
                .await?;

            if !response.status().is_success() {
                eprintln!("Hub unreachable ({})", response.status());
                std::process::exit(1);
            }

            let health: serde_json::Value = response.json().await?;
            println!("Status:      {}", health["status"].as_str().unwrap_or("unknown"));
            println!("Version:     {}", health["version"].as_str().unwrap_or("unknown"));
            println!("Uptime:      {}s", health["uptime_seconds"]);
            println!("Connections: {}", health["connections"]);
        }

        Commands::Config { output } => {
            let content = generate_default_config();
            match output {
                Some(path) => {
                    std::fs::write(&path, content)?;
                    println!("Config written to {}", path.display());
                }
                None => print!("{}", content),
            }
        }
    }

    Ok(())
}
