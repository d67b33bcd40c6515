use std::collections::HashMap;

use serde::Serialize;

use crate::model::MatchRecord;

/// Kills + assists per death. Zero deaths counts as a "perfect" ratio of
/// kills + assists, the way stat sites render it.
pub fn kda(kills: i64, deaths: i64, assists: i64) -> f64 {
    if deaths == 0 {
        (kills + assists) as f64
    } else {
        (kills + assists) as f64 / deaths as f64
    }
}

pub fn win_rate(wins: i64, total: i64) -> f64 {
    if total > 0 {
        wins as f64 / total as f64 * 100.0
    } else {
        0.0
    }
}

pub fn normalize_role(team_position: &str) -> &'static str {
    match team_position {
        "TOP" => "Top",
        "JUNGLE" => "Jungle",
        "MIDDLE" => "Mid",
        "BOTTOM" => "AD Carry",
        "UTILITY" => "Support",
        _ => "Unknown",
    }
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct OverallStats {
    pub total_matches: i64,
    pub wins: i64,
    pub losses: i64,
    pub win_rate: f64,
    pub kda: f64,
    pub avg_kills: f64,
    pub avg_deaths: f64,
    pub avg_assists: f64,
    pub avg_damage_to_champions: f64,
    pub avg_gold_earned: f64,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ChampionStats {
    pub champion_name: String,
    pub games: i64,
    pub wins: i64,
    pub losses: i64,
    pub win_rate: f64,
    pub kda: f64,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct RoleStats {
    pub role: String,
    pub games: i64,
    pub wins: i64,
    pub win_rate: f64,
    pub kda: f64,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct StatsReport {
    pub overall: OverallStats,
    pub champions: Vec<ChampionStats>,
    pub roles: Vec<RoleStats>,
}

#[derive(Default)]
struct Bucket {
    games: i64,
    wins: i64,
    kills: i64,
    deaths: i64,
    assists: i64,
}

impl Bucket {
    fn add(&mut self, m: &MatchRecord) {
        self.games += 1;
        if m.win {
            self.wins += 1;
        }
        self.kills += m.kills;
        self.deaths += m.deaths;
        self.assists += m.assists;
    }
}

/// Derived statistics over a stored match set. Pure arithmetic; the caller
/// decides which slice of matches to feed in.
pub fn build_report(matches: &[MatchRecord]) -> StatsReport {
    let total = matches.len() as i64;
    let wins = matches.iter().filter(|m| m.win).count() as i64;

    let sum = |f: fn(&MatchRecord) -> i64| matches.iter().map(f).sum::<i64>();
    let avg = |value: i64| {
        if total > 0 {
            value as f64 / total as f64
        } else {
            0.0
        }
    };

    let kills = sum(|m| m.kills);
    let deaths = sum(|m| m.deaths);
    let assists = sum(|m| m.assists);

    let overall = OverallStats {
        total_matches: total,
        wins,
        losses: total - wins,
        win_rate: win_rate(wins, total),
        kda: kda(kills, deaths, assists),
        avg_kills: avg(kills),
        avg_deaths: avg(deaths),
        avg_assists: avg(assists),
        avg_damage_to_champions: avg(sum(|m| m.total_damage_dealt_to_champions.unwrap_or(0))),
        avg_gold_earned: avg(sum(|m| m.gold_earned.unwrap_or(0))),
    };

    let mut champion_buckets: HashMap<&str, Bucket> = HashMap::new();
    let mut role_buckets: HashMap<&'static str, Bucket> = HashMap::new();

    for m in matches {
        champion_buckets
            .entry(m.champion_name.as_str())
            .or_default()
            .add(m);
        role_buckets
            .entry(normalize_role(m.role.as_deref().unwrap_or("")))
            .or_default()
            .add(m);
    }

    let mut champions: Vec<ChampionStats> = champion_buckets
        .into_iter()
        .map(|(name, b)| ChampionStats {
            champion_name: name.to_string(),
            games: b.games,
            wins: b.wins,
            losses: b.games - b.wins,
            win_rate: win_rate(b.wins, b.games),
            kda: kda(b.kills, b.deaths, b.assists),
        })
        .collect();
    champions.sort_by(|a, b| b.games.cmp(&a.games).then(a.champion_name.cmp(&b.champion_name)));

    let mut roles: Vec<RoleStats> = role_buckets
        .into_iter()
        .map(|(role, b)| RoleStats {
            role: role.to_string(),
            games: b.games,
            wins: b.wins,
            win_rate: win_rate(b.wins, b.games),
            kda: kda(b.kills, b.deaths, b.assists),
        })
        .collect();
    roles.sort_by(|a, b| b.games.cmp(&a.games).then(a.role.cmp(&b.role)));

    StatsReport {
        overall,
        champions,
        roles,
    }
}
