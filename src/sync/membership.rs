use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use serenity::all::{Cache, GuildId, Http, RoleId};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::bot::ReadyWaiter;
use crate::config::MemberSyncConfig;
use crate::ranking::RankingClient;
use crate::sync::{apply_plan, plan::plan_membership, snapshot_guild};

const SWEEP_INTERVAL: Duration = Duration::from_secs(1800);

/// Keeps the site-member opt-in role and per-game opt-in roles converged
/// with the site's member directory.
pub struct MembershipSync {
    client: Arc<RankingClient>,
    endpoint: String,
    guild_id: GuildId,
    member_role: RoleId,
    game_roles: HashMap<String, RoleId>,
}

impl MembershipSync {
    pub fn new(client: Arc<RankingClient>, config: &MemberSyncConfig) -> Self {
        Self {
            client,
            endpoint: config.endpoint.clone(),
            guild_id: GuildId::new(config.guild_id),
            member_role: RoleId::new(config.role_id),
            game_roles: config
                .games
                .iter()
                .map(|(game, role_id)| (game.clone(), RoleId::new(*role_id)))
                .collect(),
        }
    }

    pub async fn run(self, cache: Arc<Cache>, http: Arc<Http>, mut ready: ReadyWaiter) {
        ready.wait().await;
        info!("starting membership sync, interval {:?}", SWEEP_INTERVAL);

        let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(err) = self.sync_all(&cache, &http).await {
                error!("membership sweep failed: {err:#}");
            }
        }
    }

    pub async fn sync_all(&self, cache: &Cache, http: &Http) -> Result<()> {
        let Some(snapshot) = snapshot_guild(cache, self.guild_id) else {
            debug!("guild {} not cached yet, skipping sweep", self.guild_id);
            return Ok(());
        };

        if !snapshot.role_ids.contains(&self.member_role) {
            warn!(role = %self.member_role, "member role missing from guild, skipping sweep");
            return Ok(());
        }

        // Deleted game roles drop out of this pass and come back once the
        // role exists again.
        let game_roles: HashMap<String, RoleId> = self
            .game_roles
            .iter()
            .filter(|(_, role)| snapshot.role_ids.contains(role))
            .map(|(game, role)| (game.clone(), *role))
            .collect();

        let Some(records) = self.client.fetch_directory(&self.endpoint).await else {
            debug!("no directory data, skipping pass");
            return Ok(());
        };

        for member in &snapshot.members {
            let record = records.get(&member.user_id.get());
            let plan = plan_membership(&member.roles, record, self.member_role, &game_roles);
            if let Err(err) =
                apply_plan(http, self.guild_id, member.user_id, &member.name, &plan).await
            {
                warn!(member = %member.name, "failed to apply membership roles: {err:#}");
            }
        }

        Ok(())
    }
}
