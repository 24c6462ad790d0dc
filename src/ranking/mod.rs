pub use self::client::{MemberRecord, RankValue, RankingClient};
pub use self::tiers::{classify, Game, Tier, TierRule, BADGE_PREFIX, GAMES, GATE_ROLE_PREFIX};

mod client;
mod tiers;
