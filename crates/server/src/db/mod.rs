//! Database access.

mod migrations;

use anyhow::Result;
use chrono::{Duration, Utc};
use rusqlite::{params, Connection, Row};
use std::path::Path;
use std::sync::Mutex;

use shared::{
    Match, MatchPatch, MatchStatus, NewMatch, NewStanding, Standing, Team, Tournament,
    TournamentPatch,
};

pub use migrations::run_migrations;

/// Database connection wrapper. The mutex doubles as the write-serialization
/// discipline for match updates: matches are few, so a global lock is enough.
pub struct Db(pub Mutex<Connection>);

impl Db {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(Self(Mutex::new(conn)))
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(Self(Mutex::new(conn)))
    }

    pub fn run_migrations(&self) -> Result<()> {
        run_migrations(&self.0.lock().unwrap())
    }
}

fn tournament_from_row(row: &Row) -> rusqlite::Result<Tournament> {
    Ok(Tournament {
        id: row.get(0)?,
        name: row.get(1)?,
        name_ar: row.get(2)?,
        kind: row.get(3)?,
        country: row.get(4)?,
        season: row.get(5)?,
        is_active: row.get(6)?,
    })
}

fn team_from_row(row: &Row) -> rusqlite::Result<Team> {
    Ok(Team {
        id: row.get(0)?,
        name: row.get(1)?,
        name_ar: row.get(2)?,
        country: row.get(3)?,
        logo: row.get(4)?,
    })
}

fn match_from_row(row: &Row) -> rusqlite::Result<Match> {
    let status_text: String = row.get(6)?;
    let status = MatchStatus::parse(&status_text).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            6,
            rusqlite::types::Type::Text,
            format!("unknown match status: {status_text}").into(),
        )
    })?;
    Ok(Match {
        id: row.get(0)?,
        tournament_id: row.get(1)?,
        home_team_id: row.get(2)?,
        away_team_id: row.get(3)?,
        home_score: row.get(4)?,
        away_score: row.get(5)?,
        status,
        match_date: row.get(7)?,
        current_minute: row.get(8)?,
        stream_url: row.get(9)?,
    })
}

fn standing_from_row(row: &Row) -> rusqlite::Result<Standing> {
    Ok(Standing {
        id: row.get(0)?,
        tournament_id: row.get(1)?,
        team_id: row.get(2)?,
        position: row.get(3)?,
        played: row.get(4)?,
        won: row.get(5)?,
        drawn: row.get(6)?,
        lost: row.get(7)?,
        points: row.get(8)?,
        goals_for: row.get(9)?,
        goals_against: row.get(10)?,
    })
}

const MATCH_COLUMNS: &str = "id, tournament_id, home_team_id, away_team_id, home_score, \
     away_score, status, match_date, current_minute, stream_url";

pub fn get_tournaments(conn: &Connection) -> Result<Vec<Tournament>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, name_ar, type, country, season, is_active FROM tournaments",
    )?;
    let rows = stmt.query_map([], tournament_from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

pub fn get_tournament(conn: &Connection, id: i64) -> Result<Option<Tournament>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, name_ar, type, country, season, is_active FROM tournaments WHERE id = ?1",
    )?;
    match stmt.query_row([id], tournament_from_row) {
        Ok(t) => Ok(Some(t)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Merge-update for tournaments, same semantics as `update_match`.
pub fn update_tournament(
    conn: &Connection,
    id: i64,
    patch: &TournamentPatch,
) -> Result<Option<Tournament>> {
    let Some(mut t) = get_tournament(conn, id)? else {
        return Ok(None);
    };
    if let Some(v) = &patch.name {
        t.name = v.clone();
    }
    if let Some(v) = &patch.name_ar {
        t.name_ar = v.clone();
    }
    if let Some(v) = &patch.kind {
        t.kind = v.clone();
    }
    if let Some(v) = &patch.country {
        t.country = Some(v.clone());
    }
    if let Some(v) = &patch.season {
        t.season = v.clone();
    }
    if let Some(v) = patch.is_active {
        t.is_active = v;
    }
    conn.execute(
        "UPDATE tournaments SET name = ?1, name_ar = ?2, type = ?3, country = ?4, season = ?5, \
         is_active = ?6 WHERE id = ?7",
        params![t.name, t.name_ar, t.kind, t.country, t.season, t.is_active, id],
    )?;
    Ok(Some(t))
}

pub fn get_teams(conn: &Connection) -> Result<Vec<Team>> {
    let mut stmt = conn.prepare("SELECT id, name, name_ar, country, logo FROM teams")?;
    let rows = stmt.query_map([], team_from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

pub fn get_team(conn: &Connection, id: i64) -> Result<Option<Team>> {
    let mut stmt = conn.prepare("SELECT id, name, name_ar, country, logo FROM teams WHERE id = ?1")?;
    match stmt.query_row([id], team_from_row) {
        Ok(t) => Ok(Some(t)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn get_matches(conn: &Connection) -> Result<Vec<Match>> {
    let mut stmt = conn.prepare(&format!("SELECT {MATCH_COLUMNS} FROM matches"))?;
    let rows = stmt.query_map([], match_from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

pub fn get_matches_by_status(conn: &Connection, status: MatchStatus) -> Result<Vec<Match>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {MATCH_COLUMNS} FROM matches WHERE status = ?1"
    ))?;
    let rows = stmt.query_map([status.as_str()], match_from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

pub fn get_matches_by_tournament(conn: &Connection, tournament_id: i64) -> Result<Vec<Match>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {MATCH_COLUMNS} FROM matches WHERE tournament_id = ?1"
    ))?;
    let rows = stmt.query_map([tournament_id], match_from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

pub fn get_match(conn: &Connection, id: i64) -> Result<Option<Match>> {
    let mut stmt = conn.prepare(&format!("SELECT {MATCH_COLUMNS} FROM matches WHERE id = ?1"))?;
    match stmt.query_row([id], match_from_row) {
        Ok(m) => Ok(Some(m)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn create_match(conn: &Connection, new: &NewMatch) -> Result<Match> {
    conn.execute(
        "INSERT INTO matches (tournament_id, home_team_id, away_team_id, home_score, away_score, \
         status, match_date, current_minute, stream_url)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            new.tournament_id,
            new.home_team_id,
            new.away_team_id,
            new.home_score,
            new.away_score,
            new.status.as_str(),
            new.match_date,
            new.current_minute,
            new.stream_url,
        ],
    )?;
    let id = conn.last_insert_rowid();
    get_match(conn, id)?.ok_or_else(|| anyhow::anyhow!("created match {} not found", id))
}

/// Merge-update: absent patch fields keep their stored value. Returns the
/// merged record, or None when the match does not exist.
pub fn update_match(conn: &Connection, id: i64, patch: &MatchPatch) -> Result<Option<Match>> {
    let Some(mut m) = get_match(conn, id)? else {
        return Ok(None);
    };
    if let Some(v) = patch.home_score {
        m.home_score = v;
    }
    if let Some(v) = patch.away_score {
        m.away_score = v;
    }
    if let Some(v) = patch.current_minute {
        m.current_minute = Some(v);
    }
    if let Some(v) = patch.status {
        m.status = v;
    }
    conn.execute(
        "UPDATE matches SET home_score = ?1, away_score = ?2, current_minute = ?3, status = ?4
         WHERE id = ?5",
        params![
            m.home_score,
            m.away_score,
            m.current_minute,
            m.status.as_str(),
            id
        ],
    )?;
    Ok(Some(m))
}

pub fn get_standings_by_tournament(conn: &Connection, tournament_id: i64) -> Result<Vec<Standing>> {
    let mut stmt = conn.prepare(
        "SELECT id, tournament_id, team_id, position, played, won, drawn, lost, points, \
         goals_for, goals_against FROM standings WHERE tournament_id = ?1 ORDER BY position",
    )?;
    let rows = stmt.query_map([tournament_id], standing_from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

/// Replace a tournament's table wholesale. The admin panel posts the full
/// table at once, so a delete-and-insert keeps positions consistent.
pub fn replace_standings(
    conn: &Connection,
    tournament_id: i64,
    rows: &[NewStanding],
) -> Result<Vec<Standing>> {
    conn.execute(
        "DELETE FROM standings WHERE tournament_id = ?1",
        [tournament_id],
    )?;
    for row in rows {
        conn.execute(
            "INSERT INTO standings (tournament_id, team_id, position, played, won, drawn, lost, \
             points, goals_for, goals_against)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                tournament_id,
                row.team_id,
                row.position,
                row.played,
                row.won,
                row.drawn,
                row.lost,
                row.points,
                row.goals_for,
                row.goals_against,
            ],
        )?;
    }
    get_standings_by_tournament(conn, tournament_id)
}

/// Seed demo fixtures. No-op when tournaments already exist, so restarts
/// keep accumulated state.
pub fn seed_demo_data(conn: &Connection) -> Result<()> {
    let existing: i64 = conn.query_row("SELECT COUNT(*) FROM tournaments", [], |row| row.get(0))?;
    if existing > 0 {
        return Ok(());
    }

    let tournaments: &[(i64, &str, &str, &str, &str, &str)] = &[
        (1, "UEFA Champions League", "دوري أبطال أوروبا", "cup", "Europe", "2024-25"),
        (2, "Premier League", "الدوري الإنجليزي الممتاز", "league", "England", "2024-25"),
        (3, "La Liga", "الدوري الإسباني", "league", "Spain", "2024-25"),
        (4, "Serie A", "الدوري الإيطالي", "league", "Italy", "2024-25"),
    ];
    for (id, name, name_ar, kind, country, season) in tournaments {
        conn.execute(
            "INSERT INTO tournaments (id, name, name_ar, type, country, season, is_active)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1)",
            params![id, name, name_ar, kind, country, season],
        )?;
    }

    let teams: &[(i64, &str, &str, &str)] = &[
        (1, "Real Madrid", "ريال مدريد", "Spain"),
        (2, "Manchester City", "مانشستر سيتي", "England"),
        (3, "Barcelona", "برشلونة", "Spain"),
        (4, "Liverpool", "ليفربول", "England"),
        (5, "Arsenal", "آرسنال", "England"),
        (6, "Chelsea", "تشيلسي", "England"),
        (7, "Bayern Munich", "بايرن ميونخ", "Germany"),
        (8, "AC Milan", "ميلان", "Italy"),
        (9, "Atletico Madrid", "أتلتيكو مدريد", "Spain"),
        (10, "PSG", "باريس سان جيرمان", "France"),
    ];
    for (id, name, name_ar, country) in teams {
        conn.execute(
            "INSERT INTO teams (id, name, name_ar, country) VALUES (?1, ?2, ?3, ?4)",
            params![id, name, name_ar, country],
        )?;
    }

    let now = Utc::now();
    // (tournament, home, away, home_score, away_score, status, minutes offset, minute, stream)
    let matches: &[(i64, i64, i64, u32, u32, MatchStatus, i64, Option<u32>, Option<&str>)] = &[
        (1, 1, 7, 2, 1, MatchStatus::Live, -78, Some(78), Some("https://live.koralive.example/stream1")),
        (2, 4, 2, 1, 2, MatchStatus::Live, -67, Some(67), Some("https://live.koralive.example/stream2")),
        (3, 3, 9, 0, 1, MatchStatus::Live, -23, Some(23), Some("https://live.koralive.example/stream3")),
        (2, 5, 6, 0, 0, MatchStatus::Upcoming, 180, None, None),
        (1, 8, 10, 0, 0, MatchStatus::Upcoming, 1440, None, None),
    ];
    for (tournament, home, away, hs, aw, status, offset, minute, stream) in matches {
        conn.execute(
            "INSERT INTO matches (tournament_id, home_team_id, away_team_id, home_score, \
             away_score, status, match_date, current_minute, stream_url)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                tournament,
                home,
                away,
                hs,
                aw,
                status.as_str(),
                now + Duration::minutes(*offset),
                minute,
                stream,
            ],
        )?;
    }

    // (tournament, team, position, played, won, drawn, lost, points, gf, ga)
    let standings: &[(i64, i64, u32, u32, u32, u32, u32, u32, u32, u32)] = &[
        (2, 4, 1, 16, 12, 3, 1, 39, 45, 15),
        (2, 2, 2, 16, 11, 3, 2, 36, 42, 18),
        (2, 5, 3, 16, 10, 4, 2, 34, 38, 20),
        (2, 6, 4, 16, 9, 4, 3, 31, 35, 22),
        (3, 1, 1, 15, 13, 1, 1, 40, 35, 8),
        (3, 3, 2, 15, 11, 2, 2, 35, 38, 15),
        (3, 9, 3, 15, 9, 4, 2, 31, 28, 18),
    ];
    for (tournament, team, position, played, won, drawn, lost, points, gf, ga) in standings {
        conn.execute(
            "INSERT INTO standings (tournament_id, team_id, position, played, won, drawn, lost, \
             points, goals_for, goals_against)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![tournament, team, position, played, won, drawn, lost, points, gf, ga],
        )?;
    }

    Ok(())
}
