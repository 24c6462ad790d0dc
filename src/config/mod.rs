pub use self::parser::{Config, MemberSyncConfig, RankingSyncConfig, Secrets};
pub use self::validator::ConfigError;

mod parser;
mod validator;
