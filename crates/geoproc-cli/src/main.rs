/*
 *  Copyright 2025-2026 Colliery Software
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

//! geoproc - operational front end for the geoprocessing queue.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use uuid::Uuid;

mod commands;
mod config;

use commands::Environment;
use config::ConfigLoader;

/// Admission, dispatch and cache maintenance for geoprocessing jobs
#[derive(Parser, Debug)]
#[command(name = "geoproc")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file (defaults to ./geoproc.toml, the user config
    /// directory, /etc/geoproc/config.toml, or GEOPROC_CONFIG)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Database URL (can also be set via DATABASE_URL environment variable)
    #[arg(long, env = "DATABASE_URL", global = true)]
    database_url: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Validate a job and queue it
    Submit {
        /// clip, dissolve, merge, union, intersect, spatial_join, difference, export or import
        operation: String,

        /// Request body as JSON, or @path to read it from a file
        #[arg(long)]
        body: String,

        /// Submitting user
        #[arg(long)]
        user: Uuid,

        /// Submit as an administrator
        #[arg(long)]
        admin: bool,

        /// Role the user acts under
        #[arg(long)]
        role: Option<Uuid>,

        /// Validate only; nothing is queued
        #[arg(long)]
        dry_run: bool,
    },

    /// Show the state of a queued job
    Status {
        message_id: Uuid,
    },

    /// Publish pending notifications and perform pending cache purges
    Dispatch {
        /// Drain the outbox once and exit
        #[arg(long)]
        once: bool,
    },

    /// Print enqueue notifications as they arrive
    Watch {
        /// Queue to watch (defaults to the configured queue)
        #[arg(long)]
        queue: Option<String>,
    },

    /// Tile cache maintenance
    Cache {
        #[command(subcommand)]
        command: CacheCommands,
    },

    /// Apply pending database migrations
    Migrate,
}

#[derive(Subcommand, Debug)]
enum CacheCommands {
    /// Delete cached tiles whose expiry has passed
    PurgeExpired,

    /// Delete every cached tile of a layer now
    Invalidate {
        layer: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = ConfigLoader::new()
        .load_config(cli.config.as_deref())
        .context("Failed to load configuration")?;

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else if let Some(level) = &config.log_level {
        EnvFilter::new(level)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let env = Environment::new(config, cli.database_url);

    match cli.command {
        Commands::Submit {
            operation,
            body,
            user,
            admin,
            role,
            dry_run,
        } => {
            let submitter = commands::submit::submitter(user, admin, role);
            commands::submit::run(&env, &operation, &body, &submitter, dry_run).await?
        }
        Commands::Status { message_id } => commands::status::run(&env, message_id).await?,
        Commands::Dispatch { once } => commands::dispatch::run(&env, once).await?,
        Commands::Watch { queue } => commands::watch::run(&env, queue.as_deref()).await?,
        Commands::Cache { command } => match command {
            CacheCommands::PurgeExpired => commands::cache::purge_expired(&env).await?,
            CacheCommands::Invalidate { layer } => commands::cache::invalidate(&env, &layer).await?,
        },
        Commands::Migrate => commands::migrate::run(&env).await?,
    }

    Ok(())
}
