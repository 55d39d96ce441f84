//! Demo CLI for exercising a [`remote_map_client::RemoteMapClient`] against a
//! live remote map server.
//!
//! Configuration layers the same way the library's teacher lineage does:
//! defaults, then `RMC_`-prefixed environment variables, then CLI flags,
//! via `ortho_config`.

#![expect(
    non_snake_case,
    reason = "OrthoConfig/Clap derive macros generate helper modules with uppercase names"
)]
#![expect(
    clippy::print_stdout,
    reason = "this binary's entire purpose is printing operation results to stdout"
)]

use std::net::SocketAddr;

use anyhow::Context;
use clap::{Parser, Subcommand};
use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};
use tracing::info;

use remote_map_client::{RemoteMapClient, RemoteMapConfig, codec::BlobCodec};

#[derive(clap::Args, OrthoConfig, Serialize, Deserialize, Default, Debug, Clone)]
#[ortho_config(prefix = "RMC_")]
struct AppConfig {
    /// Address of the remote map server.
    #[ortho_config(default = "127.0.0.1:9191".to_owned())]
    #[arg(long, default_value_t = String::from("127.0.0.1:9191"))]
    remote_address: String,
    /// Per-operation timeout, in milliseconds.
    #[ortho_config(default = 5_000)]
    #[arg(long, default_value_t = 5_000)]
    timeout_ms: u64,
    /// Map name, used only for logging.
    #[ortho_config(default = "remote-map".to_owned())]
    #[arg(long, default_value_t = String::from("remote-map"))]
    name: String,
    /// Use the fire-and-forget `put` variant.
    #[ortho_config(default = false)]
    #[arg(long)]
    put_returns_null: bool,
    /// Use the fire-and-forget `remove` variant.
    #[ortho_config(default = false)]
    #[arg(long)]
    remove_returns_null: bool,
    /// Initial guess at the largest single entry's encoded size.
    #[ortho_config(default = 256)]
    #[arg(long, default_value_t = 256)]
    entry_size_hint: usize,
}

/// A single map operation to perform against the configured server.
#[derive(Subcommand, Debug, Clone)]
enum Command {
    /// Print the number of entries.
    Size,
    /// Print whether the map has no entries.
    IsEmpty,
    /// Print the value for `key`, or `(absent)`.
    Get {
        /// Key to look up.
        key: String,
    },
    /// Insert `value` for `key`.
    Put {
        /// Key to insert.
        key: String,
        /// Value to insert.
        value: String,
    },
    /// Remove the entry for `key`.
    Remove {
        /// Key to remove.
        key: String,
    },
    /// Remove every entry.
    Clear,
    /// Print every key currently in the map.
    KeySet,
}

#[derive(Parser, Debug)]
struct Cli {
    #[command(flatten)]
    config: AppConfig,
    #[command(subcommand)]
    command: Command,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let remote_address: SocketAddr = cli
        .config
        .remote_address
        .parse()
        .context("invalid --remote-address")?;

    let config = RemoteMapConfig {
        remote_address,
        timeout_ms: cli.config.timeout_ms,
        name: cli.config.name,
        put_returns_null: cli.config.put_returns_null,
        remove_returns_null: cli.config.remove_returns_null,
        entry_size_hint: cli.config.entry_size_hint,
    };
    info!(name = %config.name, %remote_address, "connecting to remote map");
    let client = RemoteMapClient::new(config, BlobCodec, BlobCodec);

    run(&client, cli.command)
}

fn run(
    client: &RemoteMapClient<Vec<u8>, Vec<u8>, BlobCodec, BlobCodec>,
    command: Command,
) -> anyhow::Result<()> {
    match command {
        Command::Size => println!("{}", client.size()?),
        Command::IsEmpty => println!("{}", client.is_empty()?),
        Command::Get { key } => match client.get(&key.into_bytes())? {
            Some(value) => println!("{}", String::from_utf8_lossy(&value)),
            None => println!("(absent)"),
        },
        Command::Put { key, value } => {
            client.put(&key.into_bytes(), &value.into_bytes())?;
        }
        Command::Remove { key } => {
            client.remove(&key.into_bytes())?;
        }
        Command::Clear => client.clear()?,
        Command::KeySet => {
            for key in client.key_set()? {
                println!("{}", String::from_utf8_lossy(&key));
            }
        }
    }
    Ok(())
}
