use std::{env, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use urlencoding::encode;

/// Largest page the match-v5 id listing accepts.
pub const MAX_ID_PAGE_SIZE: u32 = 100;

#[derive(Debug, Error)]
pub enum RiotError {
    #[error("request to the game API failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("game API returned status {0}: {1}")]
    Status(u16, String),
    #[error("account {0} is not part of match {1}")]
    PuuidNotInMatch(String, String),
}

/// Regional routing group the account-v1 and match-v5 hosts are keyed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Region {
    Americas,
    Europe,
    Asia,
    Sea,
}

impl Region {
    pub fn as_str(&self) -> &'static str {
        match self {
            Region::Americas => "americas",
            Region::Europe => "europe",
            Region::Asia => "asia",
            Region::Sea => "sea",
        }
    }
}

impl FromStr for Region {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "americas" => Ok(Region::Americas),
            "europe" => Ok(Region::Europe),
            "asia" => Ok(Region::Asia),
            "sea" => Ok(Region::Sea),
            _ => Err(format!("unknown region: {}", s)),
        }
    }
}

/// Account data answered by the account-v1 endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AccountDto {
    pub puuid: String,
    pub game_name: Option<String>,
    pub tag_line: Option<String>,
}

/// Match detail answered by the match-v5 endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MatchDto {
    pub metadata: MetadataDto,
    pub info: InfoDto,
}

impl MatchDto {
    /// The one participant record belonging to the tracked account.
    pub fn participant(&self, puuid: &str) -> Option<&ParticipantDto> {
        self.info.participants.iter().find(|p| p.puuid == puuid)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MetadataDto {
    pub match_id: String,
    pub participants: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct InfoDto {
    pub game_creation: i64,
    pub game_duration: i64,
    pub game_start_timestamp: Option<i64>,
    pub queue_id: i64,
    pub participants: Vec<ParticipantDto>,
}

/// Per-player performance record inside a match payload. Only the fields the
/// tracker persists are decoded; everything else is ignored.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantDto {
    pub puuid: String,
    pub riot_id_game_name: Option<String>,
    pub riot_id_tagline: Option<String>,
    pub summoner_level: Option<i64>,
    pub profile_icon: Option<i64>,
    pub win: bool,
    pub champion_name: String,
    pub team_position: Option<String>,
    pub team_id: Option<i64>,
    pub kills: i64,
    pub deaths: i64,
    pub assists: i64,
    pub total_damage_dealt_to_champions: Option<i64>,
    pub damage_dealt_to_turrets: Option<i64>,
    pub gold_earned: Option<i64>,
    pub enemy_missing_pings: Option<i64>,
    pub longest_time_spent_living: Option<i64>,
    pub game_ended_in_surrender: Option<bool>,
    pub team_early_surrendered: Option<bool>,
    /// Absent on some older queue types.
    #[serde(default)]
    pub challenges: Option<ChallengesDto>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChallengesDto {
    pub damage_per_minute: Option<f64>,
    pub skillshots_dodged: Option<i64>,
    pub skillshots_hit: Option<i64>,
}

/// Client for the third-party game-statistics REST API.
///
/// The key comes from `RIOT_API_KEY`; `RIOT_API_BASE_URL` overrides the
/// per-region host (used by tests to point at a mock server).
pub struct RiotClient {
    client: reqwest::Client,
    api_key: String,
    base_override: Option<String>,
}

impl RiotClient {
    pub fn new() -> Self {
        let api_key = env::var("RIOT_API_KEY").expect("RIOT_API_KEY must be set");
        let base_override = env::var("RIOT_API_BASE_URL").ok();

        RiotClient {
            client: reqwest::Client::new(),
            api_key,
            base_override,
        }
    }

    pub fn with_base(api_key: &str, base_url: &str) -> Self {
        RiotClient {
            client: reqwest::Client::new(),
            api_key: api_key.to_string(),
            base_override: Some(base_url.to_string()),
        }
    }

    fn base_url(&self, region: Region) -> String {
        match &self.base_override {
            Some(base) => base.trim_end_matches('/').to_string(),
            None => format!("https://{}.api.riotgames.com", region.as_str()),
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: String) -> Result<T, RiotError> {
        let res = self
            .client
            .get(&url)
            .header("X-Riot-Token", &self.api_key)
            .send()
            .await?;

        if !res.status().is_success() {
            let status = res.status().as_u16();
            let body = res.text().await.unwrap_or_default();
            return Err(RiotError::Status(status, body));
        }

        Ok(res.json().await?)
    }

    /// Resolve a Riot ID (`game name` + `tagline`) to its PUUID.
    pub async fn get_account_by_riot_id(
        &self,
        game_name: &str,
        tagline: &str,
        region: Region,
    ) -> Result<AccountDto, RiotError> {
        let url = format!(
            "{}/riot/account/v1/accounts/by-riot-id/{}/{}",
            self.base_url(region),
            encode(game_name),
            encode(tagline)
        );

        self.get_json(url).await
    }

    /// One page of match ids for a PUUID, newest first. `count` is clamped to
    /// what the upstream accepts; callers page with `start`.
    pub async fn get_match_ids(
        &self,
        region: Region,
        puuid: &str,
        start: u32,
        count: u32,
    ) -> Result<Vec<String>, RiotError> {
        let count = count.clamp(1, MAX_ID_PAGE_SIZE);
        let url = format!(
            "{}/lol/match/v5/matches/by-puuid/{}/ids?start={}&count={}",
            self.base_url(region),
            puuid,
            start,
            count
        );

        self.get_json(url).await
    }

    /// Full detail payload for a single match.
    pub async fn get_match(&self, region: Region, match_id: &str) -> Result<MatchDto, RiotError> {
        let url = format!(
            "{}/lol/match/v5/matches/{}",
            self.base_url(region),
            match_id
        );

        self.get_json(url).await
    }
}
