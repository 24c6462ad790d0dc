use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use serenity::all::{Cache, GuildId, Http, RoleId, UserId};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::bot::ReadyWaiter;
use crate::config::RankingSyncConfig;
use crate::ranking::{classify, Game, RankingClient, BADGE_PREFIX, GAMES};
use crate::sync::{apply_plan, plan_tier_roles, snapshot_guild, MemberSnapshot, TierOutcome};

const SWEEP_INTERVAL: Duration = Duration::from_secs(300);

/// Badge roles are re-scanned by name on every pass, so renames and
/// deletions are picked up without a restart.
fn badge_roles(roles_by_name: &HashMap<String, RoleId>) -> HashMap<String, RoleId> {
    roles_by_name
        .iter()
        .filter(|(name, _)| name.starts_with(BADGE_PREFIX))
        .map(|(name, role)| (name.clone(), *role))
        .collect()
}

/// Keeps per-game tier roles converged with the external leaderboard.
///
/// Runs as a periodic full sweep over the whole guild, plus an immediate
/// single-member resync when a member's gate roles change. The two may
/// interleave on the same member; both derive the same target state from
/// fresh data, so the last write wins and the next sweep heals any skew.
pub struct RankingRoleSync {
    client: Arc<RankingClient>,
    endpoint: String,
    guild_id: GuildId,
}

impl RankingRoleSync {
    pub fn new(client: Arc<RankingClient>, config: &RankingSyncConfig) -> Self {
        Self {
            client,
            endpoint: config.endpoint.clone(),
            guild_id: GuildId::new(config.guild_id),
        }
    }

    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    /// Periodic full-sweep loop. Ticks cannot overlap: the next tick is
    /// delayed until the current pass finishes, and a failed pass is logged
    /// and retried on the next tick.
    pub async fn run(self: Arc<Self>, cache: Arc<Cache>, http: Arc<Http>, mut ready: ReadyWaiter) {
        ready.wait().await;
        info!("starting tier role sync, interval {:?}", SWEEP_INTERVAL);

        let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(err) = self.sync_all(&cache, &http).await {
                error!("tier role sweep failed: {err:#}");
            }
        }
    }

    /// One full reconciliation pass over every tracked game and every
    /// current guild member.
    pub async fn sync_all(&self, cache: &Cache, http: &Http) -> Result<()> {
        let Some(snapshot) = snapshot_guild(cache, self.guild_id) else {
            debug!("guild {} not cached yet, skipping sweep", self.guild_id);
            return Ok(());
        };

        let badges = badge_roles(&snapshot.roles_by_name);
        for game in GAMES.iter() {
            info!(game = game.name, "syncing tier roles");
            self.sync_game(http, &snapshot.members, &badges, game, None)
                .await;
        }

        Ok(())
    }

    /// Event-triggered resync of one member across all games, independent
    /// of the periodic sweep.
    pub async fn sync_member(&self, cache: &Cache, http: &Http, user_id: UserId) -> Result<()> {
        let Some(snapshot) = snapshot_guild(cache, self.guild_id) else {
            debug!("guild {} not cached yet, skipping resync", self.guild_id);
            return Ok(());
        };

        let members: Vec<MemberSnapshot> = snapshot
            .members
            .into_iter()
            .filter(|member| member.user_id == user_id)
            .collect();
        if members.is_empty() {
            debug!("member {user_id} not in guild cache, skipping resync");
            return Ok(());
        }

        let badges = badge_roles(&snapshot.roles_by_name);
        for game in GAMES.iter() {
            self.sync_game(http, &members, &badges, game, Some(user_id))
                .await;
        }

        Ok(())
    }

    async fn sync_game(
        &self,
        http: &Http,
        members: &[MemberSnapshot],
        roles_by_name: &HashMap<String, RoleId>,
        game: &Game,
        member_filter: Option<UserId>,
    ) {
        let Some(&gate_role) = roles_by_name.get(game.gate_role) else {
            warn!(game = game.name, role = game.gate_role, "gate role missing from guild");
            return;
        };

        let tier_roles: HashSet<RoleId> = game
            .tiers
            .iter()
            .filter_map(|tier| roles_by_name.get(tier.role).copied())
            .collect();

        let Some(rankings) = self
            .client
            .fetch_rankings(&self.endpoint, game.ranking_id, member_filter.map(UserId::get))
            .await
        else {
            debug!(game = game.name, "no ranking data, skipping pass");
            return;
        };

        for member in members {
            let outcome = match rankings.get(&member.user_id.get()) {
                Some(value) if member.roles.contains(&gate_role) => {
                    match classify(value, game) {
                        Some(tier) => match roles_by_name.get(tier.role) {
                            Some(&target) => TierOutcome::Converge(target),
                            None => {
                                warn!(
                                    member = %member.name,
                                    role = tier.role,
                                    "target tier role missing from guild, skipping member"
                                );
                                continue;
                            }
                        },
                        None => {
                            warn!(
                                member = %member.name,
                                game = game.name,
                                ?value,
                                "rank value matches no tier, clearing tier roles"
                            );
                            TierOutcome::Clear
                        }
                    }
                }
                // Not opted in, or no rank data for this member.
                _ => TierOutcome::Clear,
            };

            let plan = plan_tier_roles(&member.roles, outcome, &tier_roles);
            if let Err(err) =
                apply_plan(http, self.guild_id, member.user_id, &member.name, &plan).await
            {
                warn!(member = %member.name, "failed to apply tier roles: {err:#}");
            }
        }
    }
}
