use serenity::all::{ChannelId, GuildId};

use crate::config::Config;

/// Whether self-assignment commands may run in this channel. A guild with
/// no configured list (or an empty one) allows every channel.
pub fn is_support_channel(config: &Config, guild_id: GuildId, channel_id: ChannelId) -> bool {
    match config.support_channels.get(&guild_id.to_string()) {
        Some(channels) if !channels.is_empty() => {
            let channel_id = channel_id.to_string();
            channels.iter().any(|allowed| *allowed == channel_id)
        }
        _ => true,
    }
}
