#![forbid(unsafe_code)]

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use secrecy::ExposeSecret;
use serenity::all::Client;
use tracing::info;

mod bot;
mod cli;
mod config;
mod ranking;
mod sync;
mod topics;
mod utils;

use bot::{ready_barrier, Handler};
use cli::Cli;
use config::{Config, Secrets};
use ranking::RankingClient;
use sync::{MembershipSync, RankingRoleSync};
use topics::DailyTopicSync;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    utils::logging::init_tracing();

    let config = Arc::new(Config::load(&cli.config)?);
    let secrets = Secrets::from_env()?;
    info!("rolekeeper starting up");

    let prefix = cli
        .prefix
        .or_else(|| config.prefix.clone())
        .unwrap_or_else(|| "!".to_string());

    let ranking_client = Arc::new(RankingClient::new(secrets.ranking_key));

    let (barrier, waiter) = ready_barrier();
    let ranking_sync = config
        .ranking_sync
        .as_ref()
        .map(|settings| Arc::new(RankingRoleSync::new(ranking_client.clone(), settings)));

    let handler = Handler::new(config.clone(), prefix, ranking_sync.clone(), barrier);
    let mut client = Client::builder(secrets.bot_token.expose_secret(), bot::gateway_intents())
        .event_handler(handler)
        .await?;

    let cache = client.cache.clone();
    let http = client.http.clone();

    if let Some(sync) = ranking_sync {
        tokio::spawn(sync.run(cache.clone(), http.clone(), waiter.clone()));
    }

    if let Some(settings) = config.member_sync.as_ref() {
        let sync = MembershipSync::new(ranking_client.clone(), settings);
        tokio::spawn(sync.run(cache.clone(), http.clone(), waiter.clone()));
    }

    if !config.daily_channels.is_empty() {
        let sync = DailyTopicSync::new(&config.daily_channels);
        tokio::spawn(sync.run(http.clone(), waiter.clone()));
    }

    client.start().await?;

    info!("rolekeeper shutting down");
    Ok(())
}
