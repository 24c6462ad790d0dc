use std::collections::{HashMap, HashSet};

use anyhow::Result;
use serenity::all::{Context, GuildId, Member, Message, RoleId};
use tracing::warn;

use crate::config::Config;
use crate::sync::{plan_exclusive, plan_multi, RolePlan};

use super::checks;

pub const COLOR_PREFIX: &str = "Color: ";
pub const PRONOUNS_PREFIX: &str = "Pronouns: ";

/// Splits `!name arg arg` into a lowercased command name and its raw
/// arguments. Returns `None` for anything that is not a command.
fn parse_command<'a>(content: &'a str, prefix: &str) -> Option<(String, Vec<&'a str>)> {
    let rest = content.strip_prefix(prefix)?;
    let mut parts = rest.split_whitespace();
    let name = parts.next()?.to_lowercase();
    Some((name, parts.collect()))
}

/// Lowercased display name -> role id for guild roles carrying `prefix`,
/// e.g. `Color: Deep Blue` -> `deep blue`.
fn role_family(
    roles_by_name: &HashMap<String, RoleId>,
    prefix: &str,
) -> HashMap<String, RoleId> {
    roles_by_name
        .iter()
        .filter_map(|(name, role)| {
            name.strip_prefix(prefix)
                .map(|rest| (rest.to_lowercase(), *role))
        })
        .collect()
}

fn available_list(kind: &str, family: &HashMap<String, RoleId>) -> String {
    let mut names: Vec<&str> = family.keys().map(String::as_str).collect();
    names.sort_unstable();
    let names: Vec<String> = names.iter().map(|name| format!("`{name}`")).collect();
    format!("Available {kind}: {}", names.join(", "))
}

pub async fn dispatch(ctx: &Context, msg: &Message, config: &Config, prefix: &str) {
    // Commands never run in DMs.
    let Some(guild_id) = msg.guild_id else {
        return;
    };
    let Some((name, args)) = parse_command(&msg.content, prefix) else {
        return;
    };
    if !checks::is_support_channel(config, guild_id, msg.channel_id) {
        return;
    }

    let result = match name.as_str() {
        "color" | "colour" => color(ctx, msg, guild_id, &args).await,
        "pronouns" => pronouns(ctx, msg, guild_id, &args).await,
        _ => return,
    };

    if let Err(err) = result {
        warn!("{name} command failed: {err:#}");
    }
}

fn guild_roles_by_name(ctx: &Context, guild_id: GuildId) -> Option<HashMap<String, RoleId>> {
    let guild = ctx.cache.guild(guild_id)?;
    Some(
        guild
            .roles
            .values()
            .map(|role| (role.name.clone(), role.id))
            .collect(),
    )
}

async fn apply_member_plan(ctx: &Context, member: &Member, plan: &RolePlan) -> Result<()> {
    if !plan.add.is_empty() {
        member.add_roles(&ctx.http, &plan.add).await?;
    }
    if !plan.remove.is_empty() {
        member.remove_roles(&ctx.http, &plan.remove).await?;
    }
    Ok(())
}

/// Set the color of your name: exclusive single select over `Color: `
/// roles. `none` clears it; no arguments lists what is available.
async fn color(ctx: &Context, msg: &Message, guild_id: GuildId, args: &[&str]) -> Result<()> {
    let Some(roles_by_name) = guild_roles_by_name(ctx, guild_id) else {
        return Ok(());
    };
    let colors = role_family(&roles_by_name, COLOR_PREFIX);

    if args.is_empty() {
        msg.channel_id
            .say(&ctx.http, available_list("colors", &colors))
            .await?;
        return Ok(());
    }

    let member = guild_id.member(ctx, msg.author.id).await?;
    let held: HashSet<RoleId> = member.roles.iter().copied().collect();
    let family: HashSet<RoleId> = colors.values().copied().collect();

    let requested = args.join(" ").trim().to_lowercase();
    if requested == "none" {
        let worn: Vec<RoleId> = family.intersection(&held).copied().collect();
        if !worn.is_empty() {
            member.remove_roles(&ctx.http, &worn).await?;
        }
        msg.react(&ctx.http, '👍').await?;
        return Ok(());
    }

    let Some(&target) = colors.get(&requested) else {
        msg.channel_id
            .say(
                &ctx.http,
                format!(
                    "The color `{requested}` isn't available. {}",
                    available_list("colors", &colors)
                ),
            )
            .await?;
        return Ok(());
    };

    // Add before remove so the name never flashes back to the default
    // color while switching.
    let plan = plan_exclusive(&held, target, &family);
    apply_member_plan(ctx, &member, &plan).await?;
    msg.react(&ctx.http, '👍').await?;
    Ok(())
}

/// Set preferred pronouns: multi select over `Pronouns: ` roles. `none`
/// clears them; no arguments lists what is available.
async fn pronouns(ctx: &Context, msg: &Message, guild_id: GuildId, args: &[&str]) -> Result<()> {
    let Some(roles_by_name) = guild_roles_by_name(ctx, guild_id) else {
        return Ok(());
    };
    let available = role_family(&roles_by_name, PRONOUNS_PREFIX);

    if args.is_empty() {
        msg.channel_id
            .say(&ctx.http, available_list("pronouns", &available))
            .await?;
        return Ok(());
    }

    let member = guild_id.member(ctx, msg.author.id).await?;
    let held: HashSet<RoleId> = member.roles.iter().copied().collect();
    let family: HashSet<RoleId> = available.values().copied().collect();

    if args.len() == 1 && args[0].trim().eq_ignore_ascii_case("none") {
        let worn: Vec<RoleId> = family.intersection(&held).copied().collect();
        if !worn.is_empty() {
            member.remove_roles(&ctx.http, &worn).await?;
        }
        msg.react(&ctx.http, '👍').await?;
        return Ok(());
    }

    let mut targets = HashSet::new();
    let mut unknown = Vec::new();
    for arg in args {
        let requested = arg.trim().to_lowercase();
        match available.get(&requested) {
            Some(&role) => {
                targets.insert(role);
            }
            None => unknown.push(requested),
        }
    }

    if !unknown.is_empty() {
        msg.channel_id
            .say(
                &ctx.http,
                format!(
                    "You've specified an unavailable pronoun. If you think it should \
                     exist please message a moderator to get it added. {}",
                    available_list("pronouns", &available)
                ),
            )
            .await?;
        return Ok(());
    }

    let plan = plan_multi(&held, &targets, &family);
    apply_member_plan(ctx, &member, &plan).await?;
    msg.react(&ctx.http, '👍').await?;
    Ok(())
}
