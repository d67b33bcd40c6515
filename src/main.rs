pub mod api;
pub mod api_error;
pub mod auth_client;
pub mod cookie;
pub mod cors;
pub mod model;
pub mod riot_client;
pub mod stats;
pub mod sync;
pub mod util;

use std::str::FromStr;

use rocket::{
    State,
    form::Form,
    fs::{FileServer, relative},
    http::{Cookie, CookieJar, Status},
    response::Redirect,
};
use rocket_dyn_templates::{Template, context};
use rocket_okapi::{
    rapidoc::{GeneralConfig, HideShowConfig, RapiDocConfig, make_rapidoc},
    settings::UrlObject,
};

use crate::{
    api_error::ApiErrors,
    auth_client::AuthClient,
    cookie::ApiUser,
    model::{MatchRecord, ProfileId, ResultExt, SummonerProfile},
    riot_client::{Region, RiotClient},
    stats::{build_report, normalize_role},
    util::{build_info_ctx, champion_icon_url, format_date_relative, format_date_time, profile_icon_url},
};

#[macro_use]
extern crate rocket;
#[macro_use]
extern crate rocket_okapi;

type SqliteClient = sqlx::Pool<sqlx::Sqlite>;

#[get("/")]
async fn index_page(
    user: Option<ApiUser>,
    client: &State<SqliteClient>,
) -> Result<Template, ApiErrors> {
    let summoners = match &user {
        Some(user) => SummonerProfile::all_for_user(user.id, client)
            .await
            .map_err(|e| {
                log::error!("Failed to list summoner profiles: {}", e);
                ApiErrors::InternalError("Failed to list summoner profiles".into())
            })?,
        None => Vec::new(),
    };

    let summoners_ctx: Vec<_> = summoners
        .iter()
        .map(|p| {
            context! {
                id: p.id,
                name: p.summoner_name.clone(),
                tagline: p.tagline.clone(),
                region: p.region.as_str(),
                level: p.level,
                icon_url: p.icon_id.map(profile_icon_url),
                last_updated: format_date_relative(&p.last_updated),
            }
        })
        .collect();

    Ok(Template::render(
        "index",
        context! {
            summoners: summoners_ctx,
            user: user,
            build_info: build_info_ctx()
        },
    ))
}

#[get("/login?<next>")]
async fn login_page(next: Option<&str>) -> Template {
    Template::render(
        "login",
        context! { next: next.unwrap_or("/"), build_info: build_info_ctx() },
    )
}

#[derive(FromForm)]
struct LoginForm {
    email: String,
    password: String,
    next: Option<String>,
}

#[post("/login", data = "<form>")]
async fn login_submit(
    form: Form<LoginForm>,
    cookies: &CookieJar<'_>,
    auth_client: &State<AuthClient>,
) -> Result<Redirect, Template> {
    let form = form.into_inner();
    let next = form.next.unwrap_or_else(|| "/".to_string());

    let session = match auth_client.sign_in(&form.email, &form.password).await {
        Ok(session) => session,
        Err(e) => {
            return Err(Template::render(
                "login",
                context! {
                    error: e.to_string(),
                    next: next,
                    build_info: build_info_ctx()
                },
            ));
        }
    };

    let cookie_str = match serde_json::to_string(&ApiUser {
        id: session.user.id,
        email: session.user.email,
    }) {
        Ok(s) => s,
        Err(e) => {
            log::error!("Failed to serialize user data: {}", e);
            return Err(Template::render(
                "login",
                context! {
                    error: "Login failed",
                    next: next,
                    build_info: build_info_ctx()
                },
            ));
        }
    };

    cookies.add_private(Cookie::new("auth", cookie_str));

    Ok(Redirect::found(next))
}

#[get("/signup")]
async fn signup_page() -> Template {
    Template::render("signup", context! { build_info: build_info_ctx() })
}

#[derive(FromForm)]
struct SignupForm {
    email: String,
    password: String,
}

#[post("/signup", data = "<form>")]
async fn signup_submit(form: Form<SignupForm>, auth_client: &State<AuthClient>) -> Template {
    let form = form.into_inner();

    match auth_client.sign_up(&form.email, &form.password).await {
        Ok(_) => Template::render(
            "login",
            context! {
                notice: "Signup successful. Check your email for verification",
                next: "/",
                build_info: build_info_ctx()
            },
        ),
        Err(e) => Template::render(
            "signup",
            context! { error: e.to_string(), build_info: build_info_ctx() },
        ),
    }
}

#[get("/logout")]
async fn logout(cookies: &CookieJar<'_>) -> Redirect {
    cookies.remove_private("auth");
    Redirect::to("/")
}

#[derive(FromForm)]
struct CreateSummonerForm {
    summoner_name: String,
    tagline: String,
    region: String,
}

#[post("/summoner", data = "<form>")]
async fn summoner_create_form(
    user: ApiUser,
    form: Form<CreateSummonerForm>,
    riot_client: &State<RiotClient>,
    client: &State<SqliteClient>,
) -> Result<Redirect, ApiErrors> {
    let form = form.into_inner();
    let region =
        Region::from_str(&form.region).map_err(ApiErrors::BadRequest)?;

    let (profile, _) = sync::create_profile(
        user.id,
        &form.summoner_name,
        &form.tagline,
        region,
        riot_client,
        client,
    )
    .await?;

    Ok(Redirect::to(format!("/summoner/{}", profile.id)))
}

#[post("/summoner/<id>/refresh")]
async fn summoner_refresh_form(
    user: ApiUser,
    id: ProfileId,
    riot_client: &State<RiotClient>,
    client: &State<SqliteClient>,
) -> Result<Redirect, ApiErrors> {
    let profile = SummonerProfile::get_for_user(id, user.id, client)
        .await
        .or_not_found("Summoner")?;

    sync::refresh_matches(&profile, sync::DEFAULT_REFRESH_COUNT, riot_client, client).await?;

    Ok(Redirect::to(format!("/summoner/{}", id)))
}

#[get("/summoner/<id>")]
async fn summoner_page(
    user: ApiUser,
    id: ProfileId,
    client: &State<SqliteClient>,
) -> Result<Template, ApiErrors> {
    let profile = SummonerProfile::get_for_user(id, user.id, client)
        .await
        .or_not_found("Summoner")?;

    let matches = MatchRecord::for_profile(profile.id, None, client)
        .await
        .map_err(|e| {
            log::error!("Failed to load matches: {}", e);
            ApiErrors::InternalError("Failed to load matches".into())
        })?;

    let report = build_report(&matches);

    let champions_ctx: Vec<_> = report
        .champions
        .iter()
        .map(|c| {
            context! {
                name: c.champion_name.clone(),
                icon_url: champion_icon_url(&c.champion_name),
                games: c.games,
                wins: c.wins,
                losses: c.losses,
                win_rate: format!("{:.0}", c.win_rate),
                kda: format!("{:.2}", c.kda),
            }
        })
        .collect();

    let roles_ctx: Vec<_> = report
        .roles
        .iter()
        .map(|r| {
            context! {
                role: r.role.clone(),
                games: r.games,
                wins: r.wins,
                win_rate: format!("{:.0}", r.win_rate),
                kda: format!("{:.2}", r.kda),
            }
        })
        .collect();

    let recent_matches: Vec<_> = matches
        .iter()
        .take(10)
        .map(|m| {
            context! {
                champion: m.champion_name.clone(),
                champion_icon_url: champion_icon_url(&m.champion_name),
                role: normalize_role(m.role.as_deref().unwrap_or("")),
                won: m.win,
                score: format!("{}/{}/{}", m.kills, m.deaths, m.assists),
                kda: format!("{:.2}", stats::kda(m.kills, m.deaths, m.assists)),
                game_start: format_date_time(&m.game_start),
            }
        })
        .collect();

    Ok(Template::render(
        "summoner_stats",
        context! {
            summoner: context! {
                id: profile.id,
                name: profile.summoner_name.clone(),
                tagline: profile.tagline.clone(),
                region: profile.region.as_str(),
                level: profile.level,
                icon_url: profile.icon_id.map(profile_icon_url),
                last_updated: format_date_relative(&profile.last_updated),
            },
            overall_stats: context! {
                total_matches: report.overall.total_matches,
                wins: report.overall.wins,
                losses: report.overall.losses,
                win_rate: format!("{:.0}", report.overall.win_rate),
                kda: format!("{:.2}", report.overall.kda),
                avg_kills: format!("{:.1}", report.overall.avg_kills),
                avg_deaths: format!("{:.1}", report.overall.avg_deaths),
                avg_assists: format!("{:.1}", report.overall.avg_assists),
            },
            champions: champions_ctx,
            roles: roles_ctx,
            recent_matches: recent_matches,
            user: user,
            build_info: build_info_ctx()
        },
    ))
}

fn render_error_page(code: u16, message: &str) -> Template {
    Template::render(
        "error",
        context! {
            code: code.to_string(),
            message: message,
            build_info: build_info_ctx(),
        },
    )
}

#[catch(401)]
fn unauthorized_catcher(_status: Status, req: &rocket::Request<'_>) -> Redirect {
    let next = req.uri().path();
    Redirect::to(format!("/login?next={}", next))
}

#[catch(404)]
fn not_found_catcher(_status: Status, _req: &rocket::Request<'_>) -> Template {
    render_error_page(404, "Not Found")
}

#[catch(500)]
fn internal_error_catcher(_status: Status, _req: &rocket::Request<'_>) -> Template {
    render_error_page(500, "Internal Server Error")
}

#[catch(default)]
fn default_catcher(status: Status, _req: &rocket::Request<'_>) -> Template {
    let message = match status.code {
        400 => "Bad Request",
        403 => "Forbidden",
        405 => "Method Not Allowed",
        422 => "Unprocessable Entity",
        _ => "Error",
    };

    render_error_page(status.code, message)
}

#[launch]
async fn rocket() -> _ {
    simple_logger::init_with_level(log::Level::Info).expect("Failed to initialize logger");

    let _ = dotenvy::dotenv();

    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let opts = sqlx::sqlite::SqliteConnectOptions::from_str(&url)
        .expect("Failed to parse DATABASE_URL")
        .create_if_missing(true);
    let client = sqlx::sqlite::SqlitePool::connect_with(opts)
        .await
        .expect("Failed to connect to database");
    sqlx::migrate!("./migrations")
        .run(&client)
        .await
        .expect("Failed to run migrations");

    let auth_client = AuthClient::new();
    let riot_client = RiotClient::new();

    rocket::build()
        .manage(client)
        .manage(auth_client)
        .manage(riot_client)
        .mount("/api", api::routes())
        .mount("/static", FileServer::from(relative!("public")))
        .mount(
            "/",
            routes![
                index_page,
                login_page,
                login_submit,
                signup_page,
                signup_submit,
                logout,
                summoner_create_form,
                summoner_refresh_form,
                summoner_page,
                cors::preflight,
            ],
        )
        .mount(
            "/rapidoc",
            make_rapidoc(&RapiDocConfig {
                general: GeneralConfig {
                    spec_urls: vec![UrlObject::new("General", "../api/openapi.json")],
                    ..Default::default()
                },
                hide_show: HideShowConfig {
                    allow_spec_url_load: false,
                    allow_spec_file_load: false,
                    ..Default::default()
                },
                ..Default::default()
            }),
        )
        .register(
            "/",
            catchers![
                unauthorized_catcher,
                not_found_catcher,
                internal_error_catcher,
                default_catcher
            ],
        )
        .attach(Template::fairing())
        .attach(cors::Cors)
}
