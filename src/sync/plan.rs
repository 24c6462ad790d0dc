use std::collections::{HashMap, HashSet};

use serenity::all::RoleId;

use crate::ranking::MemberRecord;

/// The corrective role mutations for one member, applied as at most one
/// batched add call and one batched remove call. Adds go first so a member
/// changing tiers never flashes back to an unstyled state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RolePlan {
    pub add: Vec<RoleId>,
    pub remove: Vec<RoleId>,
}

impl RolePlan {
    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.remove.is_empty()
    }

    fn sorted(mut self) -> Self {
        self.add.sort_unstable();
        self.remove.sort_unstable();
        self
    }
}

/// Target state for one (member, game) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TierOutcome {
    /// Not opted in, no rank data, or rank matched no tier: the member must
    /// hold zero tier roles for this game.
    Clear,
    /// The member must hold exactly this tier role and no other.
    Converge(RoleId),
}

/// Diffs a member's held roles against the target tier state for one game.
/// Re-planning the result of a previous plan with unchanged input yields an
/// empty plan.
pub fn plan_tier_roles(
    held: &HashSet<RoleId>,
    outcome: TierOutcome,
    tier_roles: &HashSet<RoleId>,
) -> RolePlan {
    let mut plan = RolePlan::default();

    match outcome {
        TierOutcome::Clear => {
            plan.remove = tier_roles.intersection(held).copied().collect();
        }
        TierOutcome::Converge(target) => {
            if !held.contains(&target) {
                plan.add.push(target);
            }
            plan.remove = tier_roles
                .iter()
                .copied()
                .filter(|role| *role != target && held.contains(role))
                .collect();
        }
    }

    plan.sorted()
}

/// Exclusive single-select over a role family (the color command): the
/// member ends holding `target` and nothing else from `family`.
pub fn plan_exclusive(held: &HashSet<RoleId>, target: RoleId, family: &HashSet<RoleId>) -> RolePlan {
    plan_tier_roles(held, TierOutcome::Converge(target), family)
}

/// Multi-select over a role family (the pronouns command): the member ends
/// holding exactly `targets` out of `family`.
pub fn plan_multi(
    held: &HashSet<RoleId>,
    targets: &HashSet<RoleId>,
    family: &HashSet<RoleId>,
) -> RolePlan {
    RolePlan {
        add: targets.difference(held).copied().collect(),
        remove: family
            .iter()
            .copied()
            .filter(|role| !targets.contains(role) && held.contains(role))
            .collect(),
    }
    .sorted()
}

/// Diffs one member against the site's directory: the site-member role
/// tracks record presence, each configured game role tracks that record's
/// opt-in flag.
pub fn plan_membership(
    held: &HashSet<RoleId>,
    record: Option<&MemberRecord>,
    member_role: RoleId,
    game_roles: &HashMap<String, RoleId>,
) -> RolePlan {
    let mut plan = RolePlan::default();

    match record {
        Some(record) => {
            if !held.contains(&member_role) {
                plan.add.push(member_role);
            }
            for (game, role) in game_roles {
                let opted_in = record.games.get(game).copied().unwrap_or(false);
                if opted_in && !held.contains(role) {
                    plan.add.push(*role);
                } else if !opted_in && held.contains(role) {
                    plan.remove.push(*role);
                }
            }
        }
        None => {
            if held.contains(&member_role) {
                plan.remove.push(member_role);
            }
            for role in game_roles.values() {
                if held.contains(role) {
                    plan.remove.push(*role);
                }
            }
        }
    }

    plan.sorted()
}

#[cfg(test)]
mod tests {
    use std::collections::{HashMap, HashSet};

    use serenity::all::RoleId;

    use super::{plan_exclusive, plan_membership, plan_multi, plan_tier_roles, TierOutcome};
    use crate::ranking::{classify, MemberRecord, RankValue, GAMES};

    fn role(id: u64) -> RoleId {
        RoleId::new(id)
    }

    fn roles(ids: &[u64]) -> HashSet<RoleId> {
        ids.iter().copied().map(role).collect()
    }

    fn apply(held: &HashSet<RoleId>, plan: &super::RolePlan) -> HashSet<RoleId> {
        let mut next = held.clone();
        next.extend(plan.add.iter().copied());
        for removed in &plan.remove {
            next.remove(removed);
        }
        next
    }

    #[test]
    fn clear_strips_only_this_games_tier_roles() {
        let held = roles(&[1, 2, 99]);
        let tier_roles = roles(&[1, 2, 3]);

        let plan = plan_tier_roles(&held, TierOutcome::Clear, &tier_roles);

        assert!(plan.add.is_empty());
        assert_eq!(plan.remove, vec![role(1), role(2)]);
        assert!(apply(&held, &plan).contains(&role(99)));
    }

    #[test]
    fn clearing_is_idempotent_regardless_of_prior_state() {
        let tier_roles = roles(&[1, 2, 3]);
        for held in [roles(&[]), roles(&[3]), roles(&[1, 2, 3])] {
            let once = apply(&held, &plan_tier_roles(&held, TierOutcome::Clear, &tier_roles));
            assert!(once.is_disjoint(&tier_roles));

            let again = plan_tier_roles(&once, TierOutcome::Clear, &tier_roles);
            assert!(again.is_empty());
        }
    }

    #[test]
    fn converge_adds_target_and_removes_leftovers() {
        let held = roles(&[1, 3, 99]);
        let tier_roles = roles(&[1, 2, 3]);

        let plan = plan_tier_roles(&held, TierOutcome::Converge(role(2)), &tier_roles);

        assert_eq!(plan.add, vec![role(2)]);
        assert_eq!(plan.remove, vec![role(1), role(3)]);

        let converged = apply(&held, &plan);
        assert_eq!(converged.intersection(&tier_roles).count(), 1);
        assert!(converged.contains(&role(2)));
    }

    #[test]
    fn converged_state_plans_no_further_mutations() {
        let tier_roles = roles(&[1, 2, 3]);
        let held = roles(&[2, 99]);

        let plan = plan_tier_roles(&held, TierOutcome::Converge(role(2)), &tier_roles);

        assert!(plan.is_empty());
    }

    #[test]
    fn tier_round_trip_ends_on_the_original_role() {
        // Rank A-range -> B-range -> A-range across three passes, driven by
        // the real HD point table.
        let game = GAMES.iter().find(|g| g.name == "HD").expect("HD game");
        let mut names_to_ids = HashMap::new();
        for (idx, tier) in game.tiers.iter().enumerate() {
            names_to_ids.insert(tier.role, role(idx as u64 + 1));
        }
        let tier_roles: HashSet<RoleId> = names_to_ids.values().copied().collect();

        let mut held = roles(&[99]);
        for points in [100_000u64, 400_000, 100_000] {
            let tier = classify(&RankValue::Points(points), game).expect("in range");
            let target = names_to_ids[tier.role];
            let plan = plan_tier_roles(&held, TierOutcome::Converge(target), &tier_roles);
            held = apply(&held, &plan);
        }

        assert!(held.contains(&names_to_ids["Badge: HD Mines"]));
        assert_eq!(held.intersection(&tier_roles).count(), 1);
    }

    #[test]
    fn exclusive_select_keeps_unrelated_roles() {
        let held = roles(&[10, 11, 99]);
        let family = roles(&[10, 11, 12]);

        let plan = plan_exclusive(&held, role(12), &family);
        let next = apply(&held, &plan);

        assert_eq!(next, roles(&[12, 99]));
    }

    #[test]
    fn multi_select_converges_to_requested_subset() {
        let held = roles(&[20, 21, 99]);
        let family = roles(&[20, 21, 22, 23]);
        let targets = roles(&[21, 22]);

        let plan = plan_multi(&held, &targets, &family);

        assert_eq!(plan.add, vec![role(22)]);
        assert_eq!(plan.remove, vec![role(20)]);
        assert_eq!(apply(&held, &plan), roles(&[21, 22, 99]));
    }

    fn record(games: &[(&str, bool)]) -> MemberRecord {
        MemberRecord {
            discord_id: 1,
            games: games
                .iter()
                .map(|(name, flag)| (name.to_string(), *flag))
                .collect(),
        }
    }

    #[test]
    fn membership_adds_member_and_opted_game_roles() {
        let game_roles: HashMap<String, RoleId> =
            [("HD".to_string(), role(31)), ("Classic".to_string(), role(32))]
                .into_iter()
                .collect();
        let held = roles(&[32]);

        let plan = plan_membership(
            &held,
            Some(&record(&[("HD", true), ("Classic", false)])),
            role(30),
            &game_roles,
        );

        assert_eq!(plan.add, vec![role(30), role(31)]);
        assert_eq!(plan.remove, vec![role(32)]);
    }

    #[test]
    fn membership_clears_everything_for_unknown_members() {
        let game_roles: HashMap<String, RoleId> =
            [("HD".to_string(), role(31))].into_iter().collect();
        let held = roles(&[30, 31, 99]);

        let plan = plan_membership(&held, None, role(30), &game_roles);

        assert!(plan.add.is_empty());
        assert_eq!(plan.remove, vec![role(30), role(31)]);
    }

    #[test]
    fn membership_is_idempotent() {
        let game_roles: HashMap<String, RoleId> =
            [("HD".to_string(), role(31))].into_iter().collect();
        let rec = record(&[("HD", true)]);
        let held = roles(&[]);

        let first = plan_membership(&held, Some(&rec), role(30), &game_roles);
        let settled = apply(&held, &first);
        let second = plan_membership(&settled, Some(&rec), role(30), &game_roles);

        assert!(second.is_empty());
    }
}
