//! API route handlers.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, Query, State,
    },
    http::{HeaderMap, StatusCode},
    routing::{get, post, put},
    Json, Router,
};
use futures_util::{stream::SplitSink, SinkExt, StreamExt};
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};

use shared::{
    ClientMessage, Match, MatchEvent, MatchPatch, MatchStatus, NewMatch, NewStanding,
    ServerMessage, Standing, Team, Tournament, TournamentPatch,
};

use crate::api::AppState;
use crate::db;
use crate::realtime::ApplyError;

/// Per-IP rate limit for admin endpoints: 10 requests per burst, 1 replenish
/// every 2 seconds. Mitigates brute-force on the admin key.
fn admin_rate_limit_layer() -> GovernorLayer<
    tower_governor::key_extractor::PeerIpKeyExtractor,
    governor::middleware::NoOpMiddleware,
    axum::body::Body,
> {
    let config = GovernorConfigBuilder::default()
        .per_second(2)
        .burst_size(10)
        .finish()
        .expect("invalid governor config");
    GovernorLayer::new(config)
}

pub fn api_routes() -> Router<AppState> {
    let admin_routes = Router::new()
        .route("/admin/matches", post(admin_create_match))
        .route("/admin/matches/{id}", put(admin_update_match))
        .route("/admin/tournaments/{id}", put(admin_update_tournament))
        .route("/admin/standings/{tournament_id}", put(admin_replace_standings))
        .route("/admin/stats", get(admin_stats))
        .layer(admin_rate_limit_layer());

    Router::new()
        .merge(admin_routes)
        .route("/tournaments", get(tournaments_list))
        .route("/tournaments/{id}", get(tournaments_get))
        .route("/teams", get(teams_list))
        .route("/teams/{id}", get(teams_get))
        .route("/matches", get(matches_list))
        .route("/matches/{id}", get(matches_get))
        .route("/matches-enriched", get(matches_enriched))
        .route("/standings/{tournament_id}", get(standings_list))
        .route("/standings-enriched/{tournament_id}", get(standings_enriched))
}

fn internal(e: anyhow::Error) -> (StatusCode, String) {
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}

// --- Public reads ---

async fn tournaments_list(
    State(state): State<AppState>,
) -> Result<Json<Vec<Tournament>>, (StatusCode, String)> {
    let conn = state.db.0.lock().unwrap();
    Ok(Json(db::get_tournaments(&conn).map_err(internal)?))
}

async fn tournaments_get(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Tournament>, (StatusCode, String)> {
    let conn = state.db.0.lock().unwrap();
    db::get_tournament(&conn, id)
        .map_err(internal)?
        .map(Json)
        .ok_or((StatusCode::NOT_FOUND, "tournament not found".to_string()))
}

async fn teams_list(
    State(state): State<AppState>,
) -> Result<Json<Vec<Team>>, (StatusCode, String)> {
    let conn = state.db.0.lock().unwrap();
    Ok(Json(db::get_teams(&conn).map_err(internal)?))
}

async fn teams_get(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Team>, (StatusCode, String)> {
    let conn = state.db.0.lock().unwrap();
    db::get_team(&conn, id)
        .map_err(internal)?
        .map(Json)
        .ok_or((StatusCode::NOT_FOUND, "team not found".to_string()))
}

#[derive(serde::Deserialize)]
struct MatchesQuery {
    status: Option<String>,
    tournament: Option<i64>,
}

fn parse_status(s: &str) -> Result<MatchStatus, (StatusCode, String)> {
    MatchStatus::parse(s).ok_or((
        StatusCode::BAD_REQUEST,
        format!("invalid match status: {s}"),
    ))
}

async fn matches_list(
    State(state): State<AppState>,
    Query(q): Query<MatchesQuery>,
) -> Result<Json<Vec<Match>>, (StatusCode, String)> {
    let conn = state.db.0.lock().unwrap();
    let matches = if let Some(status) = q.status.as_deref() {
        db::get_matches_by_status(&conn, parse_status(status)?)
    } else if let Some(tournament_id) = q.tournament {
        db::get_matches_by_tournament(&conn, tournament_id)
    } else {
        db::get_matches(&conn)
    };
    Ok(Json(matches.map_err(internal)?))
}

async fn matches_get(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Match>, (StatusCode, String)> {
    let conn = state.db.0.lock().unwrap();
    db::get_match(&conn, id)
        .map_err(internal)?
        .map(Json)
        .ok_or((StatusCode::NOT_FOUND, "match not found".to_string()))
}

/// Match joined with its team and tournament records, the shape match
/// cards render from.
#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct EnrichedMatch {
    #[serde(flatten)]
    base: Match,
    home_team: Option<Team>,
    away_team: Option<Team>,
    tournament: Option<Tournament>,
}

#[derive(serde::Deserialize)]
struct EnrichedQuery {
    status: Option<String>,
}

async fn matches_enriched(
    State(state): State<AppState>,
    Query(q): Query<EnrichedQuery>,
) -> Result<Json<Vec<EnrichedMatch>>, (StatusCode, String)> {
    let conn = state.db.0.lock().unwrap();
    let matches = if let Some(status) = q.status.as_deref() {
        db::get_matches_by_status(&conn, parse_status(status)?)
    } else {
        db::get_matches(&conn)
    }
    .map_err(internal)?;
    let teams = db::get_teams(&conn).map_err(internal)?;
    let tournaments = db::get_tournaments(&conn).map_err(internal)?;

    let enriched = matches
        .into_iter()
        .map(|m| EnrichedMatch {
            home_team: teams.iter().find(|t| t.id == m.home_team_id).cloned(),
            away_team: teams.iter().find(|t| t.id == m.away_team_id).cloned(),
            tournament: tournaments.iter().find(|t| t.id == m.tournament_id).cloned(),
            base: m,
        })
        .collect();
    Ok(Json(enriched))
}

async fn standings_list(
    State(state): State<AppState>,
    Path(tournament_id): Path<i64>,
) -> Result<Json<Vec<Standing>>, (StatusCode, String)> {
    let conn = state.db.0.lock().unwrap();
    Ok(Json(
        db::get_standings_by_tournament(&conn, tournament_id).map_err(internal)?,
    ))
}

/// Standing joined with its team record, the shape the league table
/// renders from.
#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct EnrichedStanding {
    #[serde(flatten)]
    base: Standing,
    team: Option<Team>,
}

async fn standings_enriched(
    State(state): State<AppState>,
    Path(tournament_id): Path<i64>,
) -> Result<Json<Vec<EnrichedStanding>>, (StatusCode, String)> {
    let conn = state.db.0.lock().unwrap();
    let standings = db::get_standings_by_tournament(&conn, tournament_id).map_err(internal)?;
    let teams = db::get_teams(&conn).map_err(internal)?;
    let enriched = standings
        .into_iter()
        .map(|s| EnrichedStanding {
            team: teams.iter().find(|t| t.id == s.team_id).cloned(),
            base: s,
        })
        .collect();
    Ok(Json(enriched))
}

// --- Admin ---

/// Body of the admin match update: a partial match plus optional events to
/// carry in the broadcast.
#[derive(serde::Deserialize)]
struct AdminMatchUpdate {
    #[serde(flatten)]
    patch: MatchPatch,
    #[serde(default)]
    events: Vec<MatchEvent>,
}

/// Operator-driven update. Delegates to the broadcaster, the same single
/// write path the simulation clock uses.
async fn admin_update_match(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(req): Json<AdminMatchUpdate>,
) -> Result<Json<Match>, (StatusCode, String)> {
    require_admin_key(&headers, &state)?;
    match state.broadcaster.apply(id, req.patch, req.events) {
        Ok(updated) => Ok(Json(updated)),
        Err(ApplyError::NotFound(_)) => {
            Err((StatusCode::NOT_FOUND, "match not found".to_string()))
        }
        Err(ApplyError::Store(e)) => Err(internal(e)),
    }
}

async fn admin_create_match(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<NewMatch>,
) -> Result<(StatusCode, Json<Match>), (StatusCode, String)> {
    require_admin_key(&headers, &state)?;
    let conn = state.db.0.lock().unwrap();
    let created = db::create_match(&conn, &req).map_err(internal)?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn admin_update_tournament(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(patch): Json<TournamentPatch>,
) -> Result<Json<Tournament>, (StatusCode, String)> {
    require_admin_key(&headers, &state)?;
    let conn = state.db.0.lock().unwrap();
    db::update_tournament(&conn, id, &patch)
        .map_err(internal)?
        .map(Json)
        .ok_or((StatusCode::NOT_FOUND, "tournament not found".to_string()))
}

/// Body of the bulk standings update: the tournament's full table.
#[derive(serde::Deserialize)]
struct StandingsUpdate {
    standings: Vec<NewStanding>,
}

async fn admin_replace_standings(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(tournament_id): Path<i64>,
    Json(req): Json<StandingsUpdate>,
) -> Result<Json<Vec<Standing>>, (StatusCode, String)> {
    require_admin_key(&headers, &state)?;
    let conn = state.db.0.lock().unwrap();
    Ok(Json(
        db::replace_standings(&conn, tournament_id, &req.standings).map_err(internal)?,
    ))
}

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct AdminStats {
    total_tournaments: usize,
    total_teams: usize,
    total_matches: usize,
    live_matches: usize,
    upcoming_matches: usize,
    finished_matches: usize,
    connected_viewers: usize,
}

async fn admin_stats(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<AdminStats>, (StatusCode, String)> {
    require_admin_key(&headers, &state)?;
    let conn = state.db.0.lock().unwrap();
    let matches = db::get_matches(&conn).map_err(internal)?;
    let count = |status: MatchStatus| matches.iter().filter(|m| m.status == status).count();
    Ok(Json(AdminStats {
        total_tournaments: db::get_tournaments(&conn).map_err(internal)?.len(),
        total_teams: db::get_teams(&conn).map_err(internal)?.len(),
        total_matches: matches.len(),
        live_matches: count(MatchStatus::Live),
        upcoming_matches: count(MatchStatus::Upcoming),
        finished_matches: count(MatchStatus::Finished),
        connected_viewers: state.hub.connection_count(),
    }))
}

fn require_admin_key(headers: &HeaderMap, state: &AppState) -> Result<(), (StatusCode, String)> {
    let token = extract_bearer_from_headers(headers)?;
    if token != state.config.admin_api_key {
        return Err((StatusCode::UNAUTHORIZED, "invalid admin key".to_string()));
    }
    Ok(())
}

fn extract_bearer_from_headers(headers: &HeaderMap) -> Result<String, (StatusCode, String)> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer ").map(String::from))
        .ok_or((
            StatusCode::UNAUTHORIZED,
            "missing authorization".to_string(),
        ))
}

// --- WebSocket ---

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> axum::response::Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Per-connection protocol loop: snapshot on join, then forward every
/// broadcast delta. Inbound `get_live_matches` gets a fresh snapshot,
/// `subscribe` gets an acknowledgment, anything else is dropped with a
/// warning. Returning from this function unregisters the connection.
async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut ws_tx, mut ws_rx) = socket.split();

    // Register before reading the snapshot so no delta in between is missed.
    let mut rx = state.hub.subscribe();
    tracing::info!(
        "websocket client connected ({} total)",
        state.hub.connection_count()
    );

    if let Some(snapshot) = join_snapshot(&state) {
        if send_message(&mut ws_tx, &snapshot).await.is_err() {
            return;
        }
    }

    let mut ping_interval = tokio::time::interval(tokio::time::Duration::from_secs(30));
    ping_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            recv = rx.recv() => {
                match recv {
                    Ok(delta) => {
                        let msg = ServerMessage::MatchUpdate(delta);
                        if send_message(&mut ws_tx, &msg).await.is_err() {
                            break;
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!("websocket client lagged, skipped {} updates", skipped);
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
            _ = ping_interval.tick() => {
                if ws_tx.send(Message::Ping(axum::body::Bytes::new())).await.is_err() {
                    break;
                }
            }
            inbound = ws_rx.next() => {
                match inbound {
                    Some(Ok(Message::Text(text))) => {
                        handle_client_message(&state, &mut ws_tx, &text).await;
                    }
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {} // binary/ping/pong frames are ignored
                }
            }
        }
    }

    tracing::info!("websocket client disconnected");
}

async fn handle_client_message(
    state: &AppState,
    ws_tx: &mut SplitSink<WebSocket, Message>,
    text: &str,
) {
    match serde_json::from_str::<ClientMessage>(text) {
        Ok(ClientMessage::GetLiveMatches) => match live_snapshot(state) {
            Ok(snapshot) => {
                let _ = send_message(ws_tx, &snapshot).await;
            }
            Err(e) => tracing::error!("live matches snapshot failed: {}", e),
        },
        Ok(ClientMessage::Subscribe { match_id }) => {
            // Accepted but not filtered: every connection receives every
            // delta. The ack tells the client the request was understood.
            let _ = send_message(ws_tx, &ServerMessage::Subscribed { match_id }).await;
        }
        Err(e) => tracing::warn!("dropping malformed websocket message: {}", e),
    }
}

/// Snapshot for a joining connection. A store error is not fatal: the
/// connection stays open and the client can retry with `get_live_matches`.
fn join_snapshot(state: &AppState) -> Option<ServerMessage> {
    match live_snapshot(state) {
        Ok(snapshot) => Some(snapshot),
        Err(e) => {
            tracing::error!("snapshot on join failed: {}", e);
            None
        }
    }
}

/// Fresh snapshot of currently-live matches.
fn live_snapshot(state: &AppState) -> anyhow::Result<ServerMessage> {
    let conn = state.db.0.lock().unwrap();
    let matches = db::get_matches_by_status(&conn, MatchStatus::Live)?;
    Ok(ServerMessage::LiveMatches(matches))
}

async fn send_message(
    ws_tx: &mut SplitSink<WebSocket, Message>,
    msg: &ServerMessage,
) -> Result<(), axum::Error> {
    let json = serde_json::to_string(msg).map_err(axum::Error::new)?;
    ws_tx.send(Message::Text(json.into())).await
}
