use clap::{Parser, Subcommand};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "node-cli")]
#[command(about = "Query a running node-daemon over its control API", long_about = None)]
struct Cli {
    /// Base URL of the control API
    #[arg(short, long, default_value = "http://127.0.0.1:5001")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the node's identity and addresses
    Id,
    /// Show the daemon version
    Version,
    /// List swarm listen addresses
    Addrs,
    /// Print the running configuration
    Config,
}

impl Commands {
    fn path(&self) -> &'static str {
        match self {
            Commands::Id => "id",
            Commands::Version => "version",
            Commands::Addrs => "swarm/addrs",
            Commands::Config => "config/show",
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let res = client
        .get(format!("{}/api/v0/{}", cli.url.trim_end_matches('/'), cli.command.path()))
        .send()
        .await?;
    print_response(res).await?;

    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: control API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        std::process::exit(1);
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
