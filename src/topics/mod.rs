use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context as _, Result};
use chrono::{NaiveDate, NaiveTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serenity::all::{ChannelId, EditChannel, Http};
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

const CHECK_INTERVAL: Duration = Duration::from_secs(60);

static TOPIC_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(.*)( \d{4}-\d{2}-\d{2} started <t:\d+:R>\.)(.*)$").expect("topic pattern")
});

/// Rewrites a channel topic so it carries today's date and a relative
/// Discord timestamp for midnight UTC. An existing stamp is replaced in
/// place; otherwise the stamp is appended.
pub fn stamped_topic(original: &str, date: NaiveDate) -> String {
    let date_str = date.format("%Y-%m-%d");
    let unix = date.and_time(NaiveTime::MIN).and_utc().timestamp();

    match TOPIC_RE.captures(original) {
        Some(caps) => format!("{} {} started <t:{}:R>.{}", &caps[1], date_str, unix, &caps[3]),
        None => format!("{} {} started <t:{}:R>.", original, date_str, unix),
    }
}

/// Stamps configured channel topics once per UTC day.
///
/// The date cursor lives in process memory only and resets on restart; the
/// first tick after startup always stamps. The cursor advances only after a
/// fully successful pass, so a failed pass is retried on the next tick.
pub struct DailyTopicSync {
    channels: Vec<ChannelId>,
    last_known_date: Option<NaiveDate>,
}

impl DailyTopicSync {
    pub fn new(channels: &[String]) -> Self {
        let channels = channels
            .iter()
            .filter_map(|raw| match raw.parse::<u64>() {
                Ok(id) if id != 0 => Some(ChannelId::new(id)),
                _ => {
                    warn!("ignoring invalid daily channel id {raw:?}");
                    None
                }
            })
            .collect();

        Self {
            channels,
            last_known_date: None,
        }
    }

    pub async fn run(mut self, http: Arc<Http>, mut ready: crate::bot::ReadyWaiter) {
        ready.wait().await;
        info!("starting daily topic sync, interval {:?}", CHECK_INTERVAL);

        let mut ticker = tokio::time::interval(CHECK_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;

            let today = Utc::now().date_naive();
            if self.last_known_date == Some(today) {
                continue;
            }

            match self.stamp_all(&http, today).await {
                Ok(()) => self.last_known_date = Some(today),
                Err(err) => error!("failed to stamp daily channels: {err:#}"),
            }
        }
    }

    async fn stamp_all(&self, http: &Http, today: NaiveDate) -> Result<()> {
        info!("stamping daily channels for {today}");

        for channel_id in &self.channels {
            let channel = http
                .get_channel(*channel_id)
                .await?
                .guild()
                .with_context(|| format!("channel {channel_id} is not a guild channel"))?;

            let topic = stamped_topic(channel.topic.as_deref().unwrap_or(""), today);
            channel_id
                .edit(http, EditChannel::new().topic(&topic))
                .await?;
            info!(channel = %channel.name, topic = %topic, "updated channel topic");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::stamped_topic;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn stamp_is_appended_to_an_unstamped_topic() {
        let topic = stamped_topic("Daily challenge discussion.", date(2024, 3, 5));
        assert_eq!(
            topic,
            "Daily challenge discussion. 2024-03-05 started <t:1709596800:R>."
        );
    }

    #[test]
    fn existing_stamp_is_replaced_in_place() {
        let stamped = stamped_topic("Daily challenge discussion.", date(2024, 3, 5));
        let restamped = stamped_topic(&stamped, date(2024, 3, 6));

        assert_eq!(
            restamped,
            "Daily challenge discussion. 2024-03-06 started <t:1709683200:R>."
        );
        // Stamping twice for the same day is a no-op on the text.
        assert_eq!(stamped_topic(&restamped, date(2024, 3, 6)), restamped);
    }

    #[test]
    fn trailing_text_after_the_stamp_survives() {
        let topic = "Rules first. 2024-03-05 started <t:1709596800:R>. Be kind.";
        let restamped = stamped_topic(topic, date(2024, 3, 6));

        assert_eq!(
            restamped,
            "Rules first. 2024-03-06 started <t:1709683200:R>. Be kind."
        );
    }

    #[test]
    fn empty_topic_gets_a_stamp() {
        let topic = stamped_topic("", date(2024, 3, 5));
        assert_eq!(topic, " 2024-03-05 started <t:1709596800:R>.");
    }
}
