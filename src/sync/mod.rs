use std::collections::{HashMap, HashSet};

use anyhow::Result;
use serenity::all::{Cache, GuildId, Http, RoleId, UserId};
use tracing::info;

pub use self::membership::MembershipSync;
pub use self::plan::{plan_exclusive, plan_multi, plan_tier_roles, RolePlan, TierOutcome};
pub use self::ranking_roles::RankingRoleSync;

pub mod membership;
pub mod plan;
pub mod ranking_roles;

/// Owned copy of one member's identity and role set, taken from the gateway
/// cache so no cache guard is held across an await point.
#[derive(Debug, Clone)]
pub struct MemberSnapshot {
    pub user_id: UserId,
    pub name: String,
    pub roles: HashSet<RoleId>,
}

/// Owned copy of the guild state one reconciliation pass works from.
/// Role names are re-resolved on every pass, so renames and deletions are
/// picked up automatically at the cost of a full scan per tick.
#[derive(Debug, Clone, Default)]
pub struct GuildSnapshot {
    pub members: Vec<MemberSnapshot>,
    pub roles_by_name: HashMap<String, RoleId>,
    pub role_ids: HashSet<RoleId>,
}

pub fn snapshot_guild(cache: &Cache, guild_id: GuildId) -> Option<GuildSnapshot> {
    let guild = cache.guild(guild_id)?;

    let roles_by_name = guild
        .roles
        .values()
        .map(|role| (role.name.clone(), role.id))
        .collect();
    let role_ids = guild.roles.keys().copied().collect();
    let members = guild
        .members
        .values()
        .map(|member| MemberSnapshot {
            user_id: member.user.id,
            name: member.user.name.clone(),
            roles: member.roles.iter().copied().collect(),
        })
        .collect();

    Some(GuildSnapshot {
        members,
        roles_by_name,
        role_ids,
    })
}

/// Issues the plan's mutations: one batched add call, then one batched
/// remove call. Not transactional; a failure between the two leaves the
/// member with extra roles until the next pass re-derives and heals them.
pub async fn apply_plan(
    http: &Http,
    guild_id: GuildId,
    user_id: UserId,
    member_name: &str,
    plan: &RolePlan,
) -> Result<()> {
    if plan.is_empty() {
        return Ok(());
    }

    let member = http.get_member(guild_id, user_id).await?;

    if !plan.add.is_empty() {
        info!(member = member_name, roles = ?plan.add, "adding roles");
        member.add_roles(http, &plan.add).await?;
    }

    if !plan.remove.is_empty() {
        info!(member = member_name, roles = ?plan.remove, "removing roles");
        member.remove_roles(http, &plan.remove).await?;
    }

    Ok(())
}
