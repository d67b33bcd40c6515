use std::collections::HashSet;

use serde::Serialize;
use uuid::Uuid;

use crate::{
    SqliteClient,
    api_error::ApiErrors,
    model::{MatchRecord, SummonerProfile},
    riot_client::{MAX_ID_PAGE_SIZE, ParticipantDto, Region, RiotClient},
};

/// How many matches a refresh walks through when the caller does not say.
pub const DEFAULT_REFRESH_COUNT: u32 = 20;
/// Upper bound on a single refresh, across pages.
pub const MAX_REFRESH_COUNT: u32 = 200;

/// What an ingestion run did: ids seen, details fetched, rows inserted,
/// ids skipped because they were already stored.
#[derive(Debug, Clone, Copy, Default, Serialize, JsonSchema)]
pub struct RefreshOutcome {
    pub fetched: usize,
    pub inserted: usize,
    pub skipped: usize,
}

/// Register a summoner for a user: resolve the Riot ID to a PUUID, seed the
/// profile from the most recent match's participant record, then ingest the
/// recent history.
pub async fn create_profile(
    user_id: Uuid,
    summoner_name: &str,
    tagline: &str,
    region: Region,
    riot: &RiotClient,
    client: &SqliteClient,
) -> Result<(SummonerProfile, RefreshOutcome), ApiErrors> {
    let account = riot
        .get_account_by_riot_id(summoner_name, tagline, region)
        .await?;

    let ids = riot.get_match_ids(region, &account.puuid, 0, 1).await?;
    let Some(first_id) = ids.first() else {
        return Err(ApiErrors::NotFound(
            "No matches found for this summoner".into(),
        ));
    };

    let data = riot.get_match(region, first_id).await?;
    let participant = data
        .participant(&account.puuid)
        .ok_or_else(|| ApiErrors::BadRequest("Failed to extract player data".into()))?;

    let display_name = participant
        .riot_id_game_name
        .clone()
        .or(account.game_name.clone())
        .unwrap_or_else(|| summoner_name.to_string());
    let display_tag = participant
        .riot_id_tagline
        .clone()
        .or(account.tag_line.clone())
        .unwrap_or_else(|| tagline.to_string());

    let profile = SummonerProfile::upsert_by_puuid(
        user_id,
        &display_name,
        &display_tag,
        &account.puuid,
        region,
        participant.summoner_level,
        participant.profile_icon,
        client,
    )
    .await
    .map_err(|e| {
        log::error!("Failed to upsert summoner profile: {}", e);
        ApiErrors::InternalError("Failed to store summoner profile".into())
    })?;

    if profile.user_id != user_id {
        return Err(ApiErrors::BadRequest(
            "This summoner is already registered by another user".into(),
        ));
    }

    // The seed match is already in hand, store it before walking the list.
    MatchRecord::insert_ignore(&profile, first_id, participant, &data.info, client)
        .await
        .map_err(|e| {
            log::error!("Failed to store match {}: {}", first_id, e);
            ApiErrors::InternalError("Failed to store match".into())
        })?;

    let outcome = refresh_matches(&profile, DEFAULT_REFRESH_COUNT, riot, client).await?;

    let profile = SummonerProfile::get_by_id(profile.id, client)
        .await
        .map_err(|e| {
            log::error!("Failed to reload summoner profile: {}", e);
            ApiErrors::InternalError("Failed to reload summoner profile".into())
        })?;

    Ok((profile, outcome))
}

/// Walk the paginated match-id list for a profile, fetch detail only for ids
/// not yet stored, extract the tracked participant and persist it. A match
/// the PUUID is somehow missing from is skipped, never fatal.
pub async fn refresh_matches(
    profile: &SummonerProfile,
    count: u32,
    riot: &RiotClient,
    client: &SqliteClient,
) -> Result<RefreshOutcome, ApiErrors> {
    let count = count.clamp(1, MAX_REFRESH_COUNT);
    let region = profile.region;

    let known: HashSet<String> = MatchRecord::existing_ids(&profile.puuid, client)
        .await
        .map_err(|e| {
            log::error!("Failed to load stored match ids: {}", e);
            ApiErrors::InternalError("Failed to load stored match ids".into())
        })?
        .into_iter()
        .collect();

    let mut outcome = RefreshOutcome::default();
    let mut newest: Option<ParticipantDto> = None;
    let mut start = 0u32;

    while start < count {
        let page_size = (count - start).min(MAX_ID_PAGE_SIZE);
        let ids = riot
            .get_match_ids(region, &profile.puuid, start, page_size)
            .await?;
        let page_len = ids.len();

        for match_id in ids {
            if known.contains(&match_id) {
                outcome.skipped += 1;
                continue;
            }

            let data = riot.get_match(region, &match_id).await?;
            outcome.fetched += 1;

            let Some(participant) = data.participant(&profile.puuid) else {
                log::warn!(
                    "Match {} does not contain participant {}, skipping",
                    match_id,
                    profile.puuid
                );
                continue;
            };

            let inserted = MatchRecord::insert_ignore(profile, &match_id, participant, &data.info, client)
                .await
                .map_err(|e| {
                    log::error!("Failed to store match {}: {}", match_id, e);
                    ApiErrors::InternalError("Failed to store match".into())
                })?;
            outcome.inserted += inserted as usize;

            // Ids come newest first, so the first fetched detail carries the
            // freshest level and icon.
            if newest.is_none() {
                newest = Some(participant.clone());
            }
        }

        if page_len < page_size as usize {
            break;
        }
        start += page_len as u32;
    }

    let (level, icon_id) = newest
        .map(|p| (p.summoner_level, p.profile_icon))
        .unwrap_or((None, None));
    SummonerProfile::touch(profile.id, level, icon_id, client)
        .await
        .map_err(|e| {
            log::error!("Failed to touch summoner profile: {}", e);
            ApiErrors::InternalError("Failed to update summoner profile".into())
        })?;

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use httpmock::prelude::*;
    use serde_json::json;

    use super::*;

    const PUUID: &str = "puuid-1";
    const USER_ID: &str = "7c9e6679-7425-40de-944b-e07fc1f90ae7";

    fn user() -> Uuid {
        USER_ID.parse().unwrap()
    }

    async fn pool() -> SqliteClient {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        pool
    }

    fn match_body(match_id: &str, puuid: &str, win: bool, start_ms: i64) -> serde_json::Value {
        json!({
            "metadata": { "matchId": match_id, "participants": [puuid] },
            "info": {
                "gameCreation": start_ms - 60_000,
                "gameDuration": 1800,
                "gameStartTimestamp": start_ms,
                "queueId": 420,
                "participants": [{
                    "puuid": puuid,
                    "riotIdGameName": "Simo",
                    "riotIdTagline": "LEMON",
                    "summonerLevel": 143,
                    "profileIcon": 4568,
                    "win": win,
                    "championName": "Ahri",
                    "teamPosition": "MIDDLE",
                    "teamId": 100,
                    "kills": 7,
                    "deaths": 2,
                    "assists": 9
                }]
            }
        })
    }

    async fn mock_account(server: &MockServer) {
        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/riot/account/v1/accounts/by-riot-id/Simo/LEMON");
                then.status(200).json_body(json!({
                    "puuid": PUUID, "gameName": "Simo", "tagLine": "LEMON"
                }));
            })
            .await;
    }

    async fn mock_ids(server: &MockServer, ids: &[&str]) {
        let ids: Vec<String> = ids.iter().map(|s| s.to_string()).collect();
        server
            .mock_async(move |when, then| {
                when.method(GET)
                    .path(format!("/lol/match/v5/matches/by-puuid/{}/ids", PUUID));
                then.status(200).json_body(json!(ids));
            })
            .await;
    }

    async fn mock_match(server: &MockServer, match_id: &str, win: bool, start_ms: i64) {
        let body = match_body(match_id, PUUID, win, start_ms);
        let path = format!("/lol/match/v5/matches/{}", match_id);
        server
            .mock_async(move |when, then| {
                when.method(GET).path(path);
                then.status(200).json_body(body);
            })
            .await;
    }

    #[rocket::async_test]
    async fn create_profile_seeds_from_latest_match_and_ingests() {
        let server = MockServer::start_async().await;
        mock_account(&server).await;
        mock_ids(&server, &["EUW1_2", "EUW1_1"]).await;
        mock_match(&server, "EUW1_2", true, 1_700_100_000_000).await;
        mock_match(&server, "EUW1_1", false, 1_700_000_000_000).await;

        let riot = RiotClient::with_base("test-key", &server.base_url());
        let db = pool().await;

        let (profile, outcome) = create_profile(user(), "Simo", "LEMON", Region::Europe, &riot, &db)
            .await
            .unwrap();

        assert_eq!(profile.puuid, PUUID);
        assert_eq!(profile.summoner_name, "Simo");
        assert_eq!(profile.level, Some(143));
        assert_eq!(profile.icon_id, Some(4568));
        // The seed match is already stored when the first refresh walks the
        // id list again.
        assert_eq!(outcome.inserted, 1);
        assert_eq!(outcome.skipped, 1);

        let stored = MatchRecord::for_profile(profile.id, None, &db).await.unwrap();
        assert_eq!(stored.len(), 2);
    }

    #[rocket::async_test]
    async fn refresh_skips_already_stored_matches() {
        let server = MockServer::start_async().await;
        mock_ids(&server, &["EUW1_2", "EUW1_1"]).await;
        let detail_2 = server
            .mock_async(|when, then| {
                when.method(GET).path("/lol/match/v5/matches/EUW1_2");
                then.status(200)
                    .json_body(match_body("EUW1_2", PUUID, true, 1_700_100_000_000));
            })
            .await;
        let detail_1 = server
            .mock_async(|when, then| {
                when.method(GET).path("/lol/match/v5/matches/EUW1_1");
                then.status(200)
                    .json_body(match_body("EUW1_1", PUUID, false, 1_700_000_000_000));
            })
            .await;

        let riot = RiotClient::with_base("test-key", &server.base_url());
        let db = pool().await;
        let profile = SummonerProfile::upsert_by_puuid(
            user(),
            "Simo",
            "LEMON",
            PUUID,
            Region::Europe,
            None,
            None,
            &db,
        )
        .await
        .unwrap();

        let first = refresh_matches(&profile, 10, &riot, &db).await.unwrap();
        assert_eq!(first.fetched, 2);
        assert_eq!(first.inserted, 2);
        assert_eq!(first.skipped, 0);

        let second = refresh_matches(&profile, 10, &riot, &db).await.unwrap();
        assert_eq!(second.fetched, 0);
        assert_eq!(second.inserted, 0);
        assert_eq!(second.skipped, 2);

        // Details were fetched exactly once per match across both runs.
        detail_2.assert_hits_async(1).await;
        detail_1.assert_hits_async(1).await;
    }

    #[rocket::async_test]
    async fn refresh_updates_profile_level_from_newest_match() {
        let server = MockServer::start_async().await;
        mock_ids(&server, &["EUW1_9"]).await;
        let mut body = match_body("EUW1_9", PUUID, true, 1_700_200_000_000);
        body["info"]["participants"][0]["summonerLevel"] = json!(150);
        server
            .mock_async(move |when, then| {
                when.method(GET).path("/lol/match/v5/matches/EUW1_9");
                then.status(200).json_body(body);
            })
            .await;

        let riot = RiotClient::with_base("test-key", &server.base_url());
        let db = pool().await;
        let profile = SummonerProfile::upsert_by_puuid(
            user(),
            "Simo",
            "LEMON",
            PUUID,
            Region::Europe,
            Some(143),
            None,
            &db,
        )
        .await
        .unwrap();

        refresh_matches(&profile, 5, &riot, &db).await.unwrap();

        let reloaded = SummonerProfile::get_by_id(profile.id, &db).await.unwrap();
        assert_eq!(reloaded.level, Some(150));
        assert!(reloaded.last_updated >= profile.last_updated);
    }

    #[rocket::async_test]
    async fn match_without_tracked_participant_is_skipped() {
        let server = MockServer::start_async().await;
        mock_ids(&server, &["EUW1_5"]).await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/lol/match/v5/matches/EUW1_5");
                then.status(200)
                    .json_body(match_body("EUW1_5", "someone-else", true, 1_700_000_000_000));
            })
            .await;

        let riot = RiotClient::with_base("test-key", &server.base_url());
        let db = pool().await;
        let profile = SummonerProfile::upsert_by_puuid(
            user(),
            "Simo",
            "LEMON",
            PUUID,
            Region::Europe,
            None,
            None,
            &db,
        )
        .await
        .unwrap();

        let outcome = refresh_matches(&profile, 5, &riot, &db).await.unwrap();
        assert_eq!(outcome.fetched, 1);
        assert_eq!(outcome.inserted, 0);
        assert!(MatchRecord::for_profile(profile.id, None, &db)
            .await
            .unwrap()
            .is_empty());
    }

    #[rocket::async_test]
    async fn create_profile_with_no_match_history_is_not_found() {
        let server = MockServer::start_async().await;
        mock_account(&server).await;
        mock_ids(&server, &[]).await;

        let riot = RiotClient::with_base("test-key", &server.base_url());
        let db = pool().await;

        let err = create_profile(user(), "Simo", "LEMON", Region::Europe, &riot, &db)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiErrors::NotFound(_)));
    }
}
