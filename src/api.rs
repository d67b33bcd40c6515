use lazy_static::lazy_static;
use regex::Regex;
use rocket::{Route, State, http::Status, serde::json::Json};
use rocket_okapi::openapi;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    SqliteClient,
    api_error::ApiErrors,
    auth_client::AuthClient,
    cookie::ApiUser,
    model::{MatchRecord, ProfileId, ResultExt, SummonerProfile},
    riot_client::{MatchDto, ParticipantDto, Region, RiotClient, RiotError},
    stats::{StatsReport, build_report},
    sync::{self, RefreshOutcome},
};

#[openapi]
#[get("/healthz")]
fn api_health_check() -> &'static str {
    "OK"
}

lazy_static! {
    static ref EMAIL_REGEX: Regex =
        Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("Failed to compile regex for email validation");
    static ref GAME_NAME_REGEX: Regex =
        Regex::new(r"^.{3,16}$").expect("Failed to compile regex for game name validation");
    static ref TAGLINE_REGEX: Regex =
        Regex::new(r"^\w{3,5}$").expect("Failed to compile regex for tagline validation");
}

fn parse_region(region: &str) -> Result<Region, ApiErrors> {
    region
        .parse::<Region>()
        .map_err(|e| ApiErrors::BadRequest(e))
}

// --- Authentication (delegated to the identity service) ---

#[derive(Debug, Deserialize, JsonSchema)]
pub struct UserCredentials {
    email: String,
    password: String,
}

impl UserCredentials {
    fn validate(&self) -> Result<(), ApiErrors> {
        if !EMAIL_REGEX.is_match(&self.email) {
            return Err(ApiErrors::BadRequest("Invalid email address".into()));
        }
        if self.password.len() < 6 {
            return Err(ApiErrors::BadRequest(
                "Password must be at least 6 characters".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct SignupResponse {
    status: String,
    message: String,
    user_id: Uuid,
}

#[openapi]
#[post("/auth/signup", data = "<body>")]
async fn api_signup(
    body: Json<UserCredentials>,
    auth_client: &State<AuthClient>,
) -> Result<Json<SignupResponse>, ApiErrors> {
    let credentials = body.into_inner();
    credentials.validate()?;

    let user = auth_client
        .sign_up(&credentials.email, &credentials.password)
        .await
        .map_err(|e| match e {
            crate::auth_client::AuthError::Rejected(msg) => ApiErrors::BadRequest(msg),
            other => other.into(),
        })?;

    Ok(Json(SignupResponse {
        status: "success".into(),
        message: "Signup successful. Check your email for verification".into(),
        user_id: user.id,
    }))
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct LoginResponse {
    status: String,
    access_token: String,
    refresh_token: String,
    user_id: Uuid,
}

#[openapi]
#[post("/auth/login", data = "<body>")]
async fn api_login(
    body: Json<UserCredentials>,
    auth_client: &State<AuthClient>,
) -> Result<Json<LoginResponse>, ApiErrors> {
    let credentials = body.into_inner();
    credentials.validate()?;

    let session = auth_client
        .sign_in(&credentials.email, &credentials.password)
        .await?;

    Ok(Json(LoginResponse {
        status: "success".into(),
        access_token: session.access_token,
        refresh_token: session.refresh_token,
        user_id: session.user.id,
    }))
}

#[openapi]
#[get("/auth/me")]
async fn api_me(user: ApiUser) -> Json<ApiUser> {
    Json(user)
}

// --- Summoner registration & ingestion ---

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CreateSummoner {
    summoner_name: String,
    tagline: String,
    region: String,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct CreateSummonerResponse {
    status: String,
    profile: SummonerProfile,
    refresh: RefreshOutcome,
}

#[openapi]
#[post("/summoners", data = "<body>")]
async fn api_create_summoner(
    user: ApiUser,
    body: Json<CreateSummoner>,
    riot_client: &State<RiotClient>,
    client: &State<SqliteClient>,
) -> Result<Json<CreateSummonerResponse>, ApiErrors> {
    let CreateSummoner {
        summoner_name,
        tagline,
        region,
    } = body.into_inner();

    if !GAME_NAME_REGEX.is_match(&summoner_name) {
        return Err(ApiErrors::BadRequest("Invalid summoner name".into()));
    }
    if !TAGLINE_REGEX.is_match(&tagline) {
        return Err(ApiErrors::BadRequest("Invalid tagline".into()));
    }
    let region = parse_region(&region)?;

    let (profile, refresh) =
        sync::create_profile(user.id, &summoner_name, &tagline, region, riot_client, client)
            .await?;

    Ok(Json(CreateSummonerResponse {
        status: "success".into(),
        profile,
        refresh,
    }))
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct SummonerListResponse {
    summoners: Vec<SummonerProfile>,
}

#[openapi]
#[get("/summoners")]
async fn api_list_summoners(
    user: ApiUser,
    client: &State<SqliteClient>,
) -> Result<Json<SummonerListResponse>, ApiErrors> {
    let summoners = SummonerProfile::all_for_user(user.id, client)
        .await
        .map_err(|e| {
            log::error!("Failed to list summoner profiles: {}", e);
            ApiErrors::InternalError("Failed to list summoner profiles".into())
        })?;

    Ok(Json(SummonerListResponse { summoners }))
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct RefreshResponse {
    profile: SummonerProfile,
    refresh: RefreshOutcome,
}

#[openapi]
#[post("/summoners/<id>/refresh?<count>")]
async fn api_refresh_summoner(
    user: ApiUser,
    id: ProfileId,
    count: Option<u32>,
    riot_client: &State<RiotClient>,
    client: &State<SqliteClient>,
) -> Result<Json<RefreshResponse>, ApiErrors> {
    let profile = SummonerProfile::get_for_user(id, user.id, client)
        .await
        .or_not_found("Summoner")?;

    let refresh = sync::refresh_matches(
        &profile,
        count.unwrap_or(sync::DEFAULT_REFRESH_COUNT),
        riot_client,
        client,
    )
    .await?;

    let profile = SummonerProfile::get_by_id(profile.id, client)
        .await
        .map_err(|e| {
            log::error!("Failed to reload summoner profile: {}", e);
            ApiErrors::InternalError("Failed to reload summoner profile".into())
        })?;

    Ok(Json(RefreshResponse { profile, refresh }))
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct SummonerMatchesResponse {
    matches: Vec<MatchRecord>,
}

#[openapi]
#[get("/summoners/<id>/matches?<limit>")]
async fn api_summoner_matches(
    user: ApiUser,
    id: ProfileId,
    limit: Option<i64>,
    client: &State<SqliteClient>,
) -> Result<Json<SummonerMatchesResponse>, ApiErrors> {
    let profile = SummonerProfile::get_for_user(id, user.id, client)
        .await
        .or_not_found("Summoner")?;

    let matches = MatchRecord::for_profile(profile.id, limit, client)
        .await
        .map_err(|e| {
            log::error!("Failed to list matches: {}", e);
            ApiErrors::InternalError("Failed to list matches".into())
        })?;

    Ok(Json(SummonerMatchesResponse { matches }))
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct SummonerStatsResponse {
    profile: SummonerProfile,
    stats: StatsReport,
}

#[openapi]
#[get("/summoners/<id>/stats")]
async fn api_summoner_stats(
    user: ApiUser,
    id: ProfileId,
    client: &State<SqliteClient>,
) -> Result<Json<SummonerStatsResponse>, ApiErrors> {
    let profile = SummonerProfile::get_for_user(id, user.id, client)
        .await
        .or_not_found("Summoner")?;

    let matches = MatchRecord::for_profile(profile.id, None, client)
        .await
        .map_err(|e| {
            log::error!("Failed to load matches for stats: {}", e);
            ApiErrors::InternalError("Failed to load matches for stats".into())
        })?;

    Ok(Json(SummonerStatsResponse {
        profile,
        stats: build_report(&matches),
    }))
}

#[openapi]
#[delete("/summoners/<id>")]
async fn api_delete_summoner(
    user: ApiUser,
    id: ProfileId,
    client: &State<SqliteClient>,
) -> Result<Status, ApiErrors> {
    let deleted = SummonerProfile::delete_for_user(id, user.id, client)
        .await
        .map_err(|e| {
            log::error!("Failed to delete summoner profile: {}", e);
            ApiErrors::InternalError("Failed to delete summoner profile".into())
        })?;

    if deleted == 0 {
        return Err(ApiErrors::NotFound("Summoner not found".into()));
    }

    Ok(Status::NoContent)
}

// --- Upstream passthroughs, handy when debugging ingestion ---

#[derive(Debug, Serialize, JsonSchema)]
pub struct PuuidResponse {
    puuid: String,
}

#[openapi]
#[get("/summoners/puuid?<summoner_name>&<tagline>&<region>")]
async fn api_fetch_puuid(
    summoner_name: String,
    tagline: String,
    region: String,
    riot_client: &State<RiotClient>,
) -> Result<Json<PuuidResponse>, ApiErrors> {
    let region = parse_region(&region)?;
    let account = riot_client
        .get_account_by_riot_id(&summoner_name, &tagline, region)
        .await?;

    Ok(Json(PuuidResponse {
        puuid: account.puuid,
    }))
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct MatchIdsResponse {
    match_ids: Vec<String>,
}

#[openapi]
#[get("/summoners/match-ids?<region>&<puuid>&<start>&<count>")]
async fn api_fetch_match_ids(
    region: String,
    puuid: String,
    start: Option<u32>,
    count: Option<u32>,
    riot_client: &State<RiotClient>,
) -> Result<Json<MatchIdsResponse>, ApiErrors> {
    let region = parse_region(&region)?;
    let match_ids = riot_client
        .get_match_ids(region, &puuid, start.unwrap_or(0), count.unwrap_or(5))
        .await?;

    Ok(Json(MatchIdsResponse { match_ids }))
}

#[openapi]
#[get("/summoners/match-data?<region>&<match_id>")]
async fn api_fetch_match_data(
    region: String,
    match_id: String,
    riot_client: &State<RiotClient>,
) -> Result<Json<MatchDto>, ApiErrors> {
    let region = parse_region(&region)?;
    let data = riot_client.get_match(region, &match_id).await?;

    Ok(Json(data))
}

#[openapi]
#[get("/summoners/match/playerdata?<region>&<match_id>&<player_puuid>")]
async fn api_fetch_player_match_data(
    region: String,
    match_id: String,
    player_puuid: String,
    riot_client: &State<RiotClient>,
) -> Result<Json<ParticipantDto>, ApiErrors> {
    let region = parse_region(&region)?;
    let data = riot_client.get_match(region, &match_id).await?;

    let participant = data
        .participant(&player_puuid)
        .cloned()
        .ok_or(RiotError::PuuidNotInMatch(player_puuid, match_id))?;

    Ok(Json(participant))
}

pub fn routes() -> Vec<Route> {
    openapi_get_routes![
        api_health_check,
        api_signup,
        api_login,
        api_me,
        api_create_summoner,
        api_list_summoners,
        api_refresh_summoner,
        api_summoner_matches,
        api_summoner_stats,
        api_delete_summoner,
        api_fetch_puuid,
        api_fetch_match_ids,
        api_fetch_match_data,
        api_fetch_player_match_data,
    ]
}

#[cfg(test)]
mod tests {
    use httpmock::prelude::*;
    use rocket::{http::Header, local::asynchronous::Client};
    use serde_json::{Value, json};

    use super::*;

    const USER_ID: &str = "7c9e6679-7425-40de-944b-e07fc1f90ae7";

    async fn test_client(auth_server: &MockServer, riot_server: &MockServer) -> Client {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();

        let rocket = rocket::build()
            .manage(pool)
            .manage(AuthClient::with_base(&auth_server.base_url(), "service-key"))
            .manage(RiotClient::with_base("test-key", &riot_server.base_url()))
            .mount("/api", routes());

        Client::tracked(rocket).await.unwrap()
    }

    async fn mock_session(auth_server: &MockServer) {
        auth_server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/auth/v1/token")
                    .query_param("grant_type", "password");
                then.status(200).json_body(json!({
                    "access_token": "token-1",
                    "refresh_token": "refresh-1",
                    "user": { "id": USER_ID, "email": "simo@example.com" }
                }));
            })
            .await;
        auth_server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/auth/v1/user")
                    .header("authorization", "Bearer token-1");
                then.status(200)
                    .json_body(json!({ "id": USER_ID, "email": "simo@example.com" }));
            })
            .await;
    }

    #[rocket::async_test]
    async fn login_then_me_returns_the_same_user_id() {
        let auth_server = MockServer::start_async().await;
        let riot_server = MockServer::start_async().await;
        mock_session(&auth_server).await;
        let client = test_client(&auth_server, &riot_server).await;

        let login = client
            .post("/api/auth/login")
            .json(&json!({ "email": "simo@example.com", "password": "12345678" }))
            .dispatch()
            .await;
        assert_eq!(login.status().code, 200);
        let login: Value = login.into_json().await.unwrap();
        assert_eq!(login["status"], "success");
        let token = login["access_token"].as_str().unwrap().to_string();

        let me = client
            .get("/api/auth/me")
            .header(Header::new("Authorization", format!("Bearer {}", token)))
            .dispatch()
            .await;
        assert_eq!(me.status().code, 200);
        let me: Value = me.into_json().await.unwrap();
        assert_eq!(me["id"], login["user_id"]);
    }

    #[rocket::async_test]
    async fn me_without_token_or_with_bad_scheme_is_unauthorized() {
        let auth_server = MockServer::start_async().await;
        let riot_server = MockServer::start_async().await;
        let client = test_client(&auth_server, &riot_server).await;

        let missing = client.get("/api/auth/me").dispatch().await;
        assert_eq!(missing.status().code, 401);

        let bad_scheme = client
            .get("/api/auth/me")
            .header(Header::new("Authorization", "Basic dXNlcjpwdw=="))
            .dispatch()
            .await;
        assert_eq!(bad_scheme.status().code, 401);
    }

    #[rocket::async_test]
    async fn register_then_stats_reflects_ingested_matches() {
        let auth_server = MockServer::start_async().await;
        let riot_server = MockServer::start_async().await;
        mock_session(&auth_server).await;

        riot_server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/riot/account/v1/accounts/by-riot-id/Simo/LEMON");
                then.status(200).json_body(json!({
                    "puuid": "puuid-1", "gameName": "Simo", "tagLine": "LEMON"
                }));
            })
            .await;
        riot_server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/lol/match/v5/matches/by-puuid/puuid-1/ids");
                then.status(200).json_body(json!(["EUW1_1"]));
            })
            .await;
        riot_server
            .mock_async(|when, then| {
                when.method(GET).path("/lol/match/v5/matches/EUW1_1");
                then.status(200).json_body(json!({
                    "metadata": { "matchId": "EUW1_1", "participants": ["puuid-1"] },
                    "info": {
                        "gameCreation": 1_700_000_000_000_i64,
                        "gameDuration": 1800,
                        "gameStartTimestamp": 1_700_000_060_000_i64,
                        "queueId": 420,
                        "participants": [{
                            "puuid": "puuid-1",
                            "riotIdGameName": "Simo",
                            "riotIdTagline": "LEMON",
                            "summonerLevel": 143,
                            "profileIcon": 4568,
                            "win": true,
                            "championName": "Ahri",
                            "teamPosition": "MIDDLE",
                            "kills": 7,
                            "deaths": 2,
                            "assists": 9
                        }]
                    }
                }));
            })
            .await;

        let client = test_client(&auth_server, &riot_server).await;
        let auth = Header::new("Authorization", "Bearer token-1");

        let created = client
            .post("/api/summoners")
            .header(auth.clone())
            .json(&json!({
                "summoner_name": "Simo", "tagline": "LEMON", "region": "EUROPE"
            }))
            .dispatch()
            .await;
        assert_eq!(created.status().code, 200);
        let created: Value = created.into_json().await.unwrap();
        let profile_id = created["profile"]["id"].as_i64().unwrap();

        let stats = client
            .get(format!("/api/summoners/{}/stats", profile_id))
            .header(auth)
            .dispatch()
            .await;
        assert_eq!(stats.status().code, 200);
        let stats: Value = stats.into_json().await.unwrap();
        assert_eq!(stats["stats"]["overall"]["total_matches"], 1);
        assert_eq!(stats["stats"]["overall"]["wins"], 1);
        assert_eq!(stats["stats"]["champions"][0]["champion_name"], "Ahri");
    }

    #[rocket::async_test]
    async fn foreign_profiles_are_not_found() {
        let auth_server = MockServer::start_async().await;
        let riot_server = MockServer::start_async().await;
        mock_session(&auth_server).await;
        let client = test_client(&auth_server, &riot_server).await;
        let auth = Header::new("Authorization", "Bearer token-1");

        let res = client
            .get("/api/summoners/9999/stats")
            .header(auth)
            .dispatch()
            .await;
        assert_eq!(res.status().code, 404);
    }

    #[rocket::async_test]
    async fn upstream_failure_status_is_surfaced() {
        let auth_server = MockServer::start_async().await;
        let riot_server = MockServer::start_async().await;
        riot_server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/riot/account/v1/accounts/by-riot-id/Nobody/NOPE");
                then.status(404).json_body(json!({ "status": { "status_code": 404 } }));
            })
            .await;
        let client = test_client(&auth_server, &riot_server).await;

        let res = client
            .get("/api/summoners/puuid?summoner_name=Nobody&tagline=NOPE&region=europe")
            .dispatch()
            .await;
        assert_eq!(res.status().code, 404);
    }

    #[rocket::async_test]
    async fn invalid_region_is_a_bad_request() {
        let auth_server = MockServer::start_async().await;
        let riot_server = MockServer::start_async().await;
        let client = test_client(&auth_server, &riot_server).await;

        let res = client
            .get("/api/summoners/puuid?summoner_name=Simo&tagline=LEMON&region=euw1")
            .dispatch()
            .await;
        assert_eq!(res.status().code, 400);
    }
}
