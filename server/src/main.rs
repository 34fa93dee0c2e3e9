//
// Copyright 2017-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! `varidial` - multi-line telnet chat server
//!
//! Commands:
//! - `start` (default) - run the server until interrupted
//! - `init` - write a starter settings file and user file

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use varidial_server::{Settings, UserFile};
use varidial_service::ChatServer;

#[derive(Parser)]
#[command(name = "varidial")]
#[command(about = "Multi-line telnet chat server")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Settings file path
    #[arg(short, long, default_value = "varidial.toml", global = true)]
    config: PathBuf,

    /// Listen address, overriding the settings file
    #[arg(short, long, global = true)]
    bind: Option<SocketAddr>,

    /// Verbose logging (-v, -vv for more)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the chat server
    Start,
    /// Write a starter settings file and user file
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let (settings, found) = Settings::load_or_default(&cli.config).await?;
    init_logging(&settings, cli.verbose);
    if !found {
        warn!(path = %cli.config.display(), "Settings file not found, using defaults");
    }

    match cli.command.unwrap_or(Commands::Start) {
        Commands::Init => init(&cli.config, &settings).await,
        Commands::Start => run(settings, cli.bind).await,
    }
}

fn init_logging(settings: &Settings, verbosity: u8) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| match verbosity {
        0 => EnvFilter::try_new(&settings.logging.level).unwrap_or_else(|_| EnvFilter::new("info")),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}

async fn init(config_path: &Path, settings: &Settings) -> Result<()> {
    if tokio::fs::try_exists(config_path).await.unwrap_or(false) {
        info!(path = %config_path.display(), "Settings file already exists, leaving it alone");
    } else {
        settings.save(config_path).await?;
        info!(path = %config_path.display(), "Wrote settings file");
    }

    let users = &settings.directory.users;
    if tokio::fs::try_exists(users).await.unwrap_or(false) {
        info!(path = %users.display(), "User file already exists, leaving it alone");
    } else {
        UserFile::sample().save(users).await?;
        info!(path = %users.display(), "Wrote user file with a sysop account on number 1");
    }
    Ok(())
}

async fn run(settings: Settings, bind: Option<SocketAddr>) -> Result<()> {
    let mut config = settings.server_config();
    if let Some(bind) = bind {
        config.bind_address = bind;
    }

    let users = UserFile::load(&settings.directory.users)
        .await
        .context("cannot start without a user directory (try `varidial init`)")?;
    info!(
        path = %settings.directory.users.display(),
        accounts = users.users.len(),
        "User directory loaded"
    );

    let server = ChatServer::new(config, Arc::new(users.into_directory()))
        .await
        .context("failed to start server")?;
    server.start().await?;
    info!(address = %server.bind_address(), "Accepting connections, press Ctrl-C to stop");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;
    info!("Interrupt received");

    server.shutdown().await?;
    Ok(())
}
