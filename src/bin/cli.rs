//! CLI for cluster operations

use clap::{Parser, Subcommand};
use quorumkv::{status_to_string, ClientConfig, QuorumClient, SdkError};

#[derive(Parser)]
#[command(name = "quorumkv")]
#[command(about = "quorumkv coordination service CLI")]
#[command(version)]
struct Cli {
    /// Cluster members, comma-separated (host:port,host:port,...)
    #[arg(long, default_value = "127.0.0.1:7000")]
    members: String,

    /// Config file (TOML); --members is ignored when set
    #[arg(long)]
    config: Option<std::path::PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a key
    Put {
        key: String,
        value: String,
    },

    /// Read a key
    Get {
        key: String,
    },

    /// Delete a key
    Delete {
        key: String,
    },

    /// List keys in [start, end)
    Scan {
        start: String,
        end: String,
    },

    /// Watch a key and print transitions until interrupted
    Watch {
        key: String,
    },

    /// Acquire a distributed lock and hold it until interrupted
    Lock {
        key: String,
    },

    /// Show member roles and log positions
    Cluster {
        /// Print as JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => ClientConfig::from_file(path)?,
        None => ClientConfig::new(ClientConfig::parse_members(&cli.members)?),
    };
    let client = QuorumClient::connect(config).await?;

    match cli.command {
        Commands::Put { key, value } => {
            client.put(&key, &value).await?;
            println!("OK");
        }

        Commands::Get { key } => match client.get(&key).await {
            Ok(value) => println!("{value}"),
            Err(SdkError::NoSuchKey(_)) => {
                eprintln!("(no such key)");
                std::process::exit(1);
            }
            Err(e) => return Err(e.into()),
        },

        Commands::Delete { key } => {
            client.delete(&key).await?;
            println!("OK");
        }

        Commands::Scan { start, end } => {
            let mut result = client.scan(&start, &end).await;
            while !result.done() {
                if let (Some(key), Some(value)) = (result.key(), result.value()) {
                    println!("{key}\t{value}");
                }
                result.next().await;
            }
            if let Some(e) = result.error() {
                return Err(e.clone().into());
            }
        }

        Commands::Watch { key } => {
            client.watch(
                &key,
                Box::new(|event| match event {
                    Ok(event) => println!(
                        "{}: {} -> {}",
                        event.key,
                        event.old_value.as_deref().unwrap_or("(absent)"),
                        event.new_value.as_deref().unwrap_or("(absent)"),
                    ),
                    Err(e) => eprintln!("watch terminated: {e}"),
                }),
            )?;
            tokio::signal::ctrl_c().await?;
        }

        Commands::Lock { key } => {
            println!("waiting for lock on {key} ...");
            client.lock(&key).await?;
            println!("acquired (session {}), ctrl-c to release", client.session_id());
            tokio::signal::ctrl_c().await?;
        }

        Commands::Cluster { json } => {
            let nodes = client.show_cluster().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&nodes)?);
                client.shutdown().await;
                return Ok(());
            }
            println!(
                "{:<24} {:<10} {:>6} {:>10} {:>10} {:>10}",
                "SERVER", "STATUS", "TERM", "LAST_IDX", "LAST_TERM", "COMMIT"
            );
            for node in nodes {
                println!(
                    "{:<24} {:<10} {:>6} {:>10} {:>10} {:>10}",
                    node.server_id,
                    status_to_string(node.status),
                    node.term,
                    node.last_log_index,
                    node.last_log_term,
                    node.commit_index,
                );
            }
        }
    }

    client.shutdown().await;
    Ok(())
}
