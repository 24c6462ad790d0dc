use once_cell::sync::Lazy;

use super::RankValue;

/// Every role this bot manages for the tier sync carries this prefix.
pub const BADGE_PREFIX: &str = "Badge: ";

/// Roles that opt a member into one game's tier sync.
pub const GATE_ROLE_PREFIX: &str = "Badge: Rank-Sync ";

/// One tracked game: a ranking id on the external leaderboard, the name of
/// the gate role members hold to opt in, and an ordered tier list.
#[derive(Debug)]
pub struct Game {
    pub name: &'static str,
    pub ranking_id: u32,
    pub gate_role: &'static str,
    pub tiers: Vec<Tier>,
}

#[derive(Debug)]
pub struct Tier {
    pub rule: TierRule,
    pub role: &'static str,
}

#[derive(Debug)]
pub enum TierRule {
    /// Closed interval over integer point totals.
    Points { min: u64, max: u64 },
    /// Case-sensitive substring patterns matched against a rank title.
    Titles(&'static [&'static str]),
}

impl TierRule {
    fn matches(&self, value: &RankValue) -> bool {
        match (self, value) {
            (TierRule::Points { min, max }, RankValue::Points(points)) => {
                (min..=max).contains(&points)
            }
            (TierRule::Titles(needles), RankValue::Title(title)) => {
                needles.iter().any(|needle| title.contains(needle))
            }
            _ => false,
        }
    }
}

/// Returns the first tier whose rule matches `value`.
///
/// First match wins: this linear scan is the contract, so overlapping point
/// ranges resolve to the earlier entry (an authoring bug, not a runtime
/// error). `None` means the member's tier roles for this game must be
/// cleared.
pub fn classify<'a>(value: &RankValue, game: &'a Game) -> Option<&'a Tier> {
    game.tiers.iter().find(|tier| tier.rule.matches(value))
}

fn points(min: u64, max: u64, role: &'static str) -> Tier {
    Tier {
        rule: TierRule::Points { min, max },
        role,
    }
}

fn titles(needles: &'static [&'static str], role: &'static str) -> Tier {
    Tier {
        rule: TierRule::Titles(needles),
        role,
    }
}

/// The hand-authored tier table. Point intervals are authored closed and
/// non-overlapping; title patterns are ordered so broader needles come last.
pub static GAMES: Lazy<Vec<Game>> = Lazy::new(|| {
    vec![
        Game {
            name: "Classic",
            ranking_id: 17,
            gate_role: "Badge: Rank-Sync Classic",
            tiers: vec![
                titles(&["Mines"], "Badge: Classic Mines"),
                titles(&["Jungle"], "Badge: Classic Jungle"),
                titles(&["Ice Caves"], "Badge: Classic Ice Caves"),
                titles(&["Temple"], "Badge: Classic Temple"),
                titles(&["City of Gold", "Grandmaster"], "Badge: Classic City of Gold"),
            ],
        },
        Game {
            name: "HD",
            ranking_id: 1,
            gate_role: "Badge: Rank-Sync HD",
            tiers: vec![
                points(0, 353_999, "Badge: HD Mines"),
                points(354_000, 707_999, "Badge: HD Jungle"),
                points(708_000, 1_061_999, "Badge: HD Worm"),
                points(1_062_000, 1_415_999, "Badge: HD Ice Caves"),
                points(1_416_000, 1_769_999, "Badge: HD Mothership"),
                points(1_770_000, 2_123_999, "Badge: HD Temple"),
                points(2_124_000, 2_477_999, "Badge: HD City of Gold"),
                points(2_478_000, u64::MAX, "Badge: HD Hell"),
            ],
        },
        Game {
            name: "2",
            ranking_id: 20,
            gate_role: "Badge: Rank-Sync 2",
            tiers: vec![
                titles(&["Dwelling"], "Badge: 2 Dwelling"),
                titles(&["Volcana"], "Badge: 2 Volcana"),
                titles(&["Olmec"], "Badge: 2 Olmec's Lair"),
                titles(&["Temple"], "Badge: 2 Temple of Anubis"),
                titles(&["City of Gold"], "Badge: 2 City of Gold"),
                titles(&["Duat"], "Badge: 2 Duat"),
                titles(&["Ice Caves"], "Badge: 2 Ice Caves"),
                titles(&["Neo Babylon"], "Badge: 2 Neo Babylon"),
                titles(&["Sunken City"], "Badge: 2 Sunken City"),
                titles(&["Cosmic Ocean"], "Badge: 2 Cosmic Ocean"),
                titles(&["Cosmos"], "Badge: 2 Cosmos"),
            ],
        },
    ]
});

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::{classify, GAMES};
    use crate::ranking::RankValue;

    fn game(name: &str) -> &'static super::Game {
        GAMES
            .iter()
            .find(|game| game.name == name)
            .expect("game in table")
    }

    #[test_case(0 => "Badge: HD Mines"; "interval start")]
    #[test_case(353_999 => "Badge: HD Mines"; "mines upper bound is inclusive")]
    #[test_case(354_000 => "Badge: HD Jungle"; "jungle lower bound")]
    #[test_case(707_999 => "Badge: HD Jungle"; "jungle upper bound")]
    #[test_case(708_000 => "Badge: HD Worm"; "worm lower bound")]
    #[test_case(2_478_000 => "Badge: HD Hell"; "top tier")]
    #[test_case(u64::MAX => "Badge: HD Hell"; "top tier is unbounded")]
    fn hd_points_classify(points: u64) -> &'static str {
        classify(&RankValue::Points(points), game("HD"))
            .expect("point intervals cover the domain")
            .role
    }

    #[test]
    fn hd_intervals_cover_the_domain_with_exactly_one_match() {
        let game = game("HD");
        // Probe every boundary and its neighbors.
        let mut probes = vec![0, 1, u64::MAX];
        for tier in &game.tiers {
            if let super::TierRule::Points { min, max } = tier.rule {
                probes.extend([min, min.saturating_sub(1), max, max.saturating_add(1)]);
            }
        }

        for probe in probes {
            let matching = game
                .tiers
                .iter()
                .filter(|tier| match tier.rule {
                    super::TierRule::Points { min, max } => (min..=max).contains(&probe),
                    _ => false,
                })
                .count();
            assert_eq!(matching, 1, "points {probe} must match exactly one tier");
        }
    }

    #[test_case("Mines" => "Badge: Classic Mines")]
    #[test_case("Jungle" => "Badge: Classic Jungle")]
    #[test_case("Grandmaster" => "Badge: Classic City of Gold"; "grandmaster maps to top tier")]
    #[test_case("City of Gold" => "Badge: Classic City of Gold")]
    fn classic_title_classify(title: &str) -> &'static str {
        classify(&RankValue::Title(title.to_string()), game("Classic"))
            .expect("title matches a tier")
            .role
    }

    #[test]
    fn title_matching_is_substring_containment() {
        let tier = classify(
            &RankValue::Title("Ice Caves (12:34)".to_string()),
            game("Classic"),
        )
        .expect("substring match");
        assert_eq!(tier.role, "Badge: Classic Ice Caves");
    }

    #[test]
    fn unknown_title_classifies_to_none() {
        assert!(classify(&RankValue::Title("Backyard".to_string()), game("Classic")).is_none());
    }

    #[test]
    fn table_role_names_carry_the_managed_prefixes() {
        for game in GAMES.iter() {
            assert!(game.gate_role.starts_with(super::GATE_ROLE_PREFIX));
            for tier in &game.tiers {
                assert!(tier.role.starts_with(super::BADGE_PREFIX));
                // Tier roles must never collide with the gate-role namespace.
                assert!(!tier.role.starts_with(super::GATE_ROLE_PREFIX));
            }
        }
    }

    #[test]
    fn value_kind_must_match_rule_kind() {
        // A point total against a title-based table never matches.
        assert!(classify(&RankValue::Points(100), game("Classic")).is_none());
        // And a title against a point-based table never matches.
        assert!(classify(&RankValue::Title("Mines".to_string()), game("HD")).is_none());
    }
}
