use std::collections::HashSet;
use std::sync::Arc;

use serenity::all::{
    Context, EventHandler, GatewayIntents, GuildMemberUpdateEvent, Member, Message, Ready, RoleId,
};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::config::Config;
use crate::ranking::GATE_ROLE_PREFIX;
use crate::sync::RankingRoleSync;

pub mod checks;
pub mod commands;

pub fn gateway_intents() -> GatewayIntents {
    GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MEMBERS
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT
}

/// One-shot initialization barrier fired from the gateway `ready` event.
/// Every scheduled job awaits it before its first tick.
pub struct ReadyBarrier {
    tx: watch::Sender<bool>,
}

#[derive(Clone)]
pub struct ReadyWaiter {
    rx: watch::Receiver<bool>,
}

pub fn ready_barrier() -> (ReadyBarrier, ReadyWaiter) {
    let (tx, rx) = watch::channel(false);
    (ReadyBarrier { tx }, ReadyWaiter { rx })
}

impl ReadyBarrier {
    pub fn signal(&self) {
        let _ = self.tx.send(true);
    }
}

impl ReadyWaiter {
    pub async fn wait(&mut self) {
        while !*self.rx.borrow() {
            if self.rx.changed().await.is_err() {
                return;
            }
        }
    }
}

pub struct Handler {
    config: Arc<Config>,
    prefix: String,
    ranking_sync: Option<Arc<RankingRoleSync>>,
    barrier: ReadyBarrier,
}

impl Handler {
    pub fn new(
        config: Arc<Config>,
        prefix: String,
        ranking_sync: Option<Arc<RankingRoleSync>>,
        barrier: ReadyBarrier,
    ) -> Self {
        Self {
            config,
            prefix,
            ranking_sync,
            barrier,
        }
    }
}

#[serenity::async_trait]
impl EventHandler for Handler {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        info!("logged in as {} ({})", ready.user.name, ready.user.id);
        self.barrier.signal();
    }

    async fn message(&self, ctx: Context, msg: Message) {
        if msg.author.bot {
            return;
        }

        if self.config.dogs_channels.contains(&msg.channel_id.to_string()) {
            for emoji in ['🐶', '🐕', '🐩'] {
                if let Err(err) = msg.react(&ctx.http, emoji).await {
                    warn!("failed to add dog reaction: {err:#}");
                    break;
                }
            }
            return;
        }

        commands::dispatch(&ctx, &msg, &self.config, &self.prefix).await;
    }

    /// Immediate single-member resync when a member's gate roles change.
    /// Runs on its own task, deliberately unguarded against a concurrent
    /// periodic sweep: both converge to the same state.
    async fn guild_member_update(
        &self,
        ctx: Context,
        old_if_available: Option<Member>,
        _new: Option<Member>,
        event: GuildMemberUpdateEvent,
    ) {
        let Some(sync) = self.ranking_sync.clone() else {
            return;
        };
        if event.guild_id != sync.guild_id() || event.user.bot {
            return;
        }

        let gate_roles: HashSet<RoleId> = {
            let Some(guild) = ctx.cache.guild(event.guild_id) else {
                return;
            };
            guild
                .roles
                .values()
                .filter(|role| role.name.starts_with(GATE_ROLE_PREFIX))
                .map(|role| role.id)
                .collect()
        };

        let after: HashSet<RoleId> = event
            .roles
            .iter()
            .copied()
            .filter(|role| gate_roles.contains(role))
            .collect();

        // Without a cached old member we cannot tell what changed; resync
        // anyway, it is idempotent.
        if let Some(old) = &old_if_available {
            let before: HashSet<RoleId> = old
                .roles
                .iter()
                .copied()
                .filter(|role| gate_roles.contains(role))
                .collect();
            if before == after {
                return;
            }
        }

        let user_id = event.user.id;
        let cache = ctx.cache.clone();
        let http = ctx.http.clone();
        tokio::spawn(async move {
            info!("gate roles changed for {user_id}, resyncing tier roles");
            if let Err(err) = sync.sync_member(&cache, &http, user_id).await {
                warn!("single-member resync for {user_id} failed: {err:#}");
            }
        });
    }
}
