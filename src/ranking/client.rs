use std::collections::HashMap;

use anyhow::{bail, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

/// A member's raw rank for one game, exactly as the leaderboard returns it:
/// an integer point total or a textual rank title.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum RankValue {
    Points(u64),
    Title(String),
}

/// One row of the site's member directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberRecord {
    pub discord_id: u64,
    /// Game name -> whether the member opted into that game on the site.
    pub games: HashMap<String, bool>,
}

static GAME_KEY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^games\[([A-Za-z0-9 ]+)\]$").expect("game key pattern"));

/// Thin client for the third-party leaderboard API, authenticated with a
/// static key.
///
/// Fetches never propagate an error past this boundary: any non-200 status,
/// empty or unparseable body comes back as `None`, and the caller skips the
/// pass. The fixed polling interval is the retry mechanism.
pub struct RankingClient {
    http: reqwest::Client,
    key: SecretString,
}

impl RankingClient {
    pub fn new(key: SecretString) -> Self {
        Self {
            http: reqwest::Client::new(),
            key,
        }
    }

    /// Fetches per-member rank values for one game, optionally filtered to
    /// a single member. The response body is a JSON object keyed by Discord
    /// member id (as a string).
    pub async fn fetch_rankings(
        &self,
        endpoint: &str,
        ranking_id: u32,
        member: Option<u64>,
    ) -> Option<HashMap<u64, RankValue>> {
        let mut params = vec![
            ("key".to_string(), self.key.expose_secret().to_string()),
            ("id_ranking".to_string(), ranking_id.to_string()),
        ];
        if let Some(discord_id) = member {
            params.push(("discord_id".to_string(), discord_id.to_string()));
        }

        let raw: HashMap<String, RankValue> = match self.get_json(endpoint, &params).await {
            Ok(body) => body,
            Err(err) => {
                warn!("ranking fetch for id_ranking={ranking_id} failed: {err:#}");
                return None;
            }
        };

        let rankings = parse_rankings(raw);
        if rankings.is_empty() {
            debug!("ranking fetch for id_ranking={ranking_id} returned no data");
            return None;
        }
        Some(rankings)
    }

    /// Fetches the site's member directory: a JSON array of flat objects
    /// with `discord[id]` and `games[<name>]` keys.
    pub async fn fetch_directory(&self, endpoint: &str) -> Option<HashMap<u64, MemberRecord>> {
        let params = [("key".to_string(), self.key.expose_secret().to_string())];

        let raw: Vec<serde_json::Map<String, Value>> =
            match self.get_json(endpoint, &params).await {
                Ok(body) => body,
                Err(err) => {
                    warn!("member directory fetch failed: {err:#}");
                    return None;
                }
            };

        let records = parse_directory(&raw);
        if records.is_empty() {
            debug!("member directory fetch returned no data");
            return None;
        }
        Some(records)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(String, String)],
    ) -> Result<T> {
        let response = self.http.get(endpoint).query(params).send().await?;
        if !response.status().is_success() {
            bail!("unexpected status {}", response.status());
        }
        Ok(response.json().await?)
    }
}

fn parse_rankings(raw: HashMap<String, RankValue>) -> HashMap<u64, RankValue> {
    raw.into_iter()
        .filter_map(|(key, value)| match key.parse::<u64>() {
            Ok(discord_id) => Some((discord_id, value)),
            Err(_) => {
                warn!("ignoring ranking entry with non-numeric member id {key:?}");
                None
            }
        })
        .collect()
}

fn parse_directory(rows: &[serde_json::Map<String, Value>]) -> HashMap<u64, MemberRecord> {
    rows.iter()
        .filter_map(record_from_map)
        .map(|record| (record.discord_id, record))
        .collect()
}

/// Rows without a usable Discord id are dropped; members the site knows but
/// never linked to Discord cannot be synced.
fn record_from_map(data: &serde_json::Map<String, Value>) -> Option<MemberRecord> {
    let discord_id = data.get("discord[id]").and_then(value_as_u64)?;
    if discord_id == 0 {
        return None;
    }

    let games = data
        .iter()
        .filter_map(|(key, value)| {
            GAME_KEY_RE
                .captures(key)
                .map(|caps| (caps[1].to_string(), value.as_bool().unwrap_or(false)))
        })
        .collect();

    Some(MemberRecord { discord_id, games })
}

fn value_as_u64(value: &Value) -> Option<u64> {
    value
        .as_u64()
        .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::{parse_directory, parse_rankings, RankValue};

    #[test]
    fn rank_values_deserialize_as_points_or_titles() {
        let body = r#"{"111": 354000, "222": "Grandmaster"}"#;
        let raw: HashMap<String, RankValue> = serde_json::from_str(body).expect("parses");

        assert_eq!(raw["111"], RankValue::Points(354_000));
        assert_eq!(raw["222"], RankValue::Title("Grandmaster".to_string()));
    }

    #[test]
    fn rankings_with_bad_keys_are_skipped() {
        let raw: HashMap<String, RankValue> =
            serde_json::from_str(r#"{"111": 5, "not-a-number": 6}"#).expect("parses");

        let rankings = parse_rankings(raw);

        assert_eq!(rankings.len(), 1);
        assert_eq!(rankings[&111], RankValue::Points(5));
    }

    #[test]
    fn empty_payload_parses_to_no_data() {
        // fetch_rankings turns an empty map into `None`, so an empty API
        // response causes zero mutations that tick.
        assert!(parse_rankings(HashMap::new()).is_empty());
    }

    #[test]
    fn directory_rows_parse_ids_and_game_flags() {
        let body = r#"[
            {
                "site[id_user]": "1",
                "site[username]": "somename",
                "discord[id]": "6666666666666666",
                "discord[username]": "somediscordname",
                "games[Spelunky Classic]": true,
                "games[Spelunky HD]": false
            },
            {
                "site[id_user]": "2",
                "discord[id]": "0"
            },
            {
                "site[id_user]": "3"
            }
        ]"#;
        let rows: Vec<serde_json::Map<String, serde_json::Value>> =
            serde_json::from_str(body).expect("parses");

        let records = parse_directory(&rows);

        // Rows with a zero or missing Discord id are dropped.
        assert_eq!(records.len(), 1);
        let record = &records[&6666666666666666];
        assert_eq!(record.games["Spelunky Classic"], true);
        assert_eq!(record.games["Spelunky HD"], false);
        assert!(!record.games.contains_key("Roguelike Challenges"));
    }

    #[test]
    fn directory_accepts_numeric_discord_ids() {
        let rows: Vec<serde_json::Map<String, serde_json::Value>> =
            serde_json::from_str(r#"[{"discord[id]": 12345}]"#).expect("parses");

        let records = parse_directory(&rows);
        assert!(records.contains_key(&12345));
    }
}
