use chrono::{DateTime, Utc};
use rocket::serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use uuid::Uuid;

use crate::{
    SqliteClient,
    api_error::ApiErrors,
    riot_client::{InfoDto, ParticipantDto, Region},
};

pub type ProfileId = i64;
pub type MatchRowId = i64;

/// A registered summoner, owned by one identity-service user. One row per
/// PUUID; uniqueness lives in the schema.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, FromRow)]
pub struct SummonerProfile {
    pub id: ProfileId,
    pub user_id: Uuid,
    pub summoner_name: String,
    pub tagline: String,
    pub puuid: String,
    pub region: Region,
    pub level: Option<i64>,
    pub icon_id: Option<i64>,
    pub last_updated: DateTime<Utc>,
}

impl SummonerProfile {
    /// Insert or refresh the profile for a PUUID. A conflict refreshes the
    /// display fields but never reassigns the owning user.
    pub async fn upsert_by_puuid(
        user_id: Uuid,
        summoner_name: &str,
        tagline: &str,
        puuid: &str,
        region: Region,
        level: Option<i64>,
        icon_id: Option<i64>,
        client: &SqliteClient,
    ) -> Result<SummonerProfile, sqlx::Error> {
        let res = sqlx::query_as::<_, SummonerProfile>(
            r#"
            INSERT INTO summoner_profiles (user_id, summoner_name, tagline, puuid, region, level, icon_id, last_updated)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (puuid) DO UPDATE SET
                summoner_name = EXCLUDED.summoner_name,
                tagline = EXCLUDED.tagline,
                level = EXCLUDED.level,
                icon_id = EXCLUDED.icon_id,
                last_updated = EXCLUDED.last_updated
            RETURNING id, user_id, summoner_name, tagline, puuid, region, level, icon_id, last_updated
            "#,
        )
        .bind(user_id)
        .bind(summoner_name)
        .bind(tagline)
        .bind(puuid)
        .bind(region)
        .bind(level)
        .bind(icon_id)
        .bind(Utc::now())
        .fetch_one(client)
        .await?;

        Ok(res)
    }

    pub async fn get_by_id(
        id: ProfileId,
        client: &SqliteClient,
    ) -> Result<SummonerProfile, sqlx::Error> {
        let res = sqlx::query_as::<_, SummonerProfile>(
            r#"
            SELECT id, user_id, summoner_name, tagline, puuid, region, level, icon_id, last_updated
            FROM summoner_profiles
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_one(client)
        .await?;

        Ok(res)
    }

    /// Fetch a profile only if it belongs to the given user. Foreign profiles
    /// are indistinguishable from missing ones.
    pub async fn get_for_user(
        id: ProfileId,
        user_id: Uuid,
        client: &SqliteClient,
    ) -> Result<SummonerProfile, sqlx::Error> {
        let res = sqlx::query_as::<_, SummonerProfile>(
            r#"
            SELECT id, user_id, summoner_name, tagline, puuid, region, level, icon_id, last_updated
            FROM summoner_profiles
            WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(id)
        .bind(user_id)
        .fetch_one(client)
        .await?;

        Ok(res)
    }

    pub async fn all_for_user(
        user_id: Uuid,
        client: &SqliteClient,
    ) -> Result<Vec<SummonerProfile>, sqlx::Error> {
        let res = sqlx::query_as::<_, SummonerProfile>(
            r#"
            SELECT id, user_id, summoner_name, tagline, puuid, region, level, icon_id, last_updated
            FROM summoner_profiles
            WHERE user_id = $1
            ORDER BY last_updated DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(client)
        .await?;

        Ok(res)
    }

    /// Returns how many rows were deleted (0 when the profile is missing or
    /// owned by someone else). Stored matches go with the profile.
    pub async fn delete_for_user(
        id: ProfileId,
        user_id: Uuid,
        client: &SqliteClient,
    ) -> Result<u64, sqlx::Error> {
        let res = sqlx::query(
            r#"
            DELETE FROM summoner_profiles
            WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(id)
        .bind(user_id)
        .execute(client)
        .await?;

        Ok(res.rows_affected())
    }

    /// Refresh the mutable display fields after an ingestion run.
    pub async fn touch(
        id: ProfileId,
        level: Option<i64>,
        icon_id: Option<i64>,
        client: &SqliteClient,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE summoner_profiles
            SET level = COALESCE($2, level),
                icon_id = COALESCE($3, icon_id),
                last_updated = $4
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(level)
        .bind(icon_id)
        .bind(Utc::now())
        .execute(client)
        .await?;

        Ok(())
    }
}

/// One player's participation in one match, flattened from the upstream
/// payload. UNIQUE(match_id, puuid) makes re-ingestion idempotent.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, FromRow)]
pub struct MatchRecord {
    pub id: MatchRowId,
    pub match_id: String,
    pub puuid: String,
    pub riot_id_game_name: Option<String>,
    pub riot_id_tagline: Option<String>,
    pub summoner_level: Option<i64>,
    pub win: bool,
    pub champion_name: String,
    pub role: Option<String>,
    pub team_id: Option<i64>,
    pub kills: i64,
    pub deaths: i64,
    pub assists: i64,
    pub total_damage_dealt_to_champions: Option<i64>,
    pub damage_dealt_to_turrets: Option<i64>,
    pub gold_earned: Option<i64>,
    pub enemy_missing_pings: Option<i64>,
    pub damage_per_minute: Option<f64>,
    pub skillshots_dodged: Option<i64>,
    pub skillshots_hit: Option<i64>,
    pub longest_time_spent_living: Option<i64>,
    pub game_ended_in_surrender: Option<bool>,
    pub team_early_surrendered: Option<bool>,
    pub game_start: DateTime<Utc>,
    pub game_duration: i64,
    pub queue_id: i64,
    pub summoner_profile_id: ProfileId,
}

const MATCH_COLUMNS: &str = r#"id, match_id, puuid, riot_id_game_name, riot_id_tagline,
    summoner_level, win, champion_name, role, team_id, kills, deaths, assists,
    total_damage_dealt_to_champions, damage_dealt_to_turrets, gold_earned,
    enemy_missing_pings, damage_per_minute, skillshots_dodged, skillshots_hit,
    longest_time_spent_living, game_ended_in_surrender, team_early_surrendered,
    game_start, game_duration, queue_id, summoner_profile_id"#;

impl MatchRecord {
    /// Persist one participation, ignoring rows already stored for the same
    /// (match, puuid) pair. Returns how many rows were actually inserted.
    pub async fn insert_ignore(
        profile: &SummonerProfile,
        match_id: &str,
        participant: &ParticipantDto,
        info: &InfoDto,
        client: &SqliteClient,
    ) -> Result<u64, sqlx::Error> {
        let game_start_ms = info.game_start_timestamp.unwrap_or(info.game_creation);
        let game_start =
            DateTime::from_timestamp_millis(game_start_ms).unwrap_or(DateTime::UNIX_EPOCH);
        let challenges = participant.challenges.as_ref();

        let res = sqlx::query(
            r#"
            INSERT INTO matches (
                match_id, puuid, riot_id_game_name, riot_id_tagline, summoner_level,
                win, champion_name, role, team_id, kills, deaths, assists,
                total_damage_dealt_to_champions, damage_dealt_to_turrets, gold_earned,
                enemy_missing_pings, damage_per_minute, skillshots_dodged, skillshots_hit,
                longest_time_spent_living, game_ended_in_surrender, team_early_surrendered,
                game_start, game_duration, queue_id, summoner_profile_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15,
                    $16, $17, $18, $19, $20, $21, $22, $23, $24, $25, $26)
            ON CONFLICT (match_id, puuid) DO NOTHING
            "#,
        )
        .bind(match_id)
        .bind(&participant.puuid)
        .bind(&participant.riot_id_game_name)
        .bind(&participant.riot_id_tagline)
        .bind(participant.summoner_level)
        .bind(participant.win)
        .bind(&participant.champion_name)
        .bind(&participant.team_position)
        .bind(participant.team_id)
        .bind(participant.kills)
        .bind(participant.deaths)
        .bind(participant.assists)
        .bind(participant.total_damage_dealt_to_champions)
        .bind(participant.damage_dealt_to_turrets)
        .bind(participant.gold_earned)
        .bind(participant.enemy_missing_pings)
        .bind(challenges.and_then(|c| c.damage_per_minute))
        .bind(challenges.and_then(|c| c.skillshots_dodged))
        .bind(challenges.and_then(|c| c.skillshots_hit))
        .bind(participant.longest_time_spent_living)
        .bind(participant.game_ended_in_surrender)
        .bind(participant.team_early_surrendered)
        .bind(game_start)
        .bind(info.game_duration)
        .bind(info.queue_id)
        .bind(profile.id)
        .execute(client)
        .await?;

        Ok(res.rows_affected())
    }

    /// Match ids already stored for a PUUID, for pre-fetch deduplication.
    pub async fn existing_ids(
        puuid: &str,
        client: &SqliteClient,
    ) -> Result<Vec<String>, sqlx::Error> {
        let res = sqlx::query_scalar::<_, String>(
            r#"
            SELECT match_id
            FROM matches
            WHERE puuid = $1
            "#,
        )
        .bind(puuid)
        .fetch_all(client)
        .await?;

        Ok(res)
    }

    /// Stored participations for a profile, newest game first. `None` lists
    /// everything.
    pub async fn for_profile(
        profile_id: ProfileId,
        limit: Option<i64>,
        client: &SqliteClient,
    ) -> Result<Vec<MatchRecord>, sqlx::Error> {
        let res = sqlx::query_as::<_, MatchRecord>(&format!(
            r#"
            SELECT {MATCH_COLUMNS}
            FROM matches
            WHERE summoner_profile_id = $1
            ORDER BY game_start DESC
            LIMIT $2
            "#
        ))
        .bind(profile_id)
        .bind(limit.unwrap_or(-1))
        .fetch_all(client)
        .await?;

        Ok(res)
    }
}

pub trait ResultExt<T, E> {
    fn or_not_found(self, entity_name: &str) -> Result<T, ApiErrors>;
}

impl<T, E> ResultExt<T, E> for Result<T, E> {
    fn or_not_found(self, entity_name: &str) -> Result<T, ApiErrors> {
        self.map_err(|_| ApiErrors::NotFound(format!("{} not found", entity_name)))
    }
}
