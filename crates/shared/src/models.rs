//! Shared domain and wire models.
//!
//! Wire JSON is camelCase, matching what the web front end consumes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Match lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    Upcoming,
    Live,
    Finished,
}

impl MatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Upcoming => "upcoming",
            Self::Live => "live",
            Self::Finished => "finished",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "upcoming" => Some(Self::Upcoming),
            "live" => Some(Self::Live),
            "finished" => Some(Self::Finished),
            _ => None,
        }
    }
}

/// Tournament record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tournament {
    pub id: i64,
    pub name: String,
    pub name_ar: String,
    /// "league", "cup" or "international".
    #[serde(rename = "type")]
    pub kind: String,
    pub country: Option<String>,
    pub season: String,
    pub is_active: bool,
}

/// Partial tournament update (admin). Absent fields keep their stored value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TournamentPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_ar: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub season: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

/// Team record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    pub id: i64,
    pub name: String,
    pub name_ar: String,
    pub country: String,
    pub logo: Option<String>,
}

/// Match record. Mutable fields change only through the broadcaster's
/// single write path.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Match {
    pub id: i64,
    pub tournament_id: i64,
    pub home_team_id: i64,
    pub away_team_id: i64,
    pub home_score: u32,
    pub away_score: u32,
    pub status: MatchStatus,
    pub match_date: DateTime<Utc>,
    /// None until kickoff; frozen once the match finishes.
    pub current_minute: Option<u32>,
    pub stream_url: Option<String>,
}

/// Payload for creating a match (admin).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMatch {
    pub tournament_id: i64,
    pub home_team_id: i64,
    pub away_team_id: i64,
    #[serde(default)]
    pub home_score: u32,
    #[serde(default)]
    pub away_score: u32,
    pub status: MatchStatus,
    pub match_date: DateTime<Utc>,
    #[serde(default)]
    pub current_minute: Option<u32>,
    #[serde(default)]
    pub stream_url: Option<String>,
}

/// League table row.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Standing {
    pub id: i64,
    pub tournament_id: i64,
    pub team_id: i64,
    pub position: u32,
    pub played: u32,
    pub won: u32,
    pub drawn: u32,
    pub lost: u32,
    pub points: u32,
    pub goals_for: u32,
    pub goals_against: u32,
}

/// One row of a bulk standings update. The tournament comes from the
/// request path.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewStanding {
    pub team_id: i64,
    pub position: u32,
    #[serde(default)]
    pub played: u32,
    #[serde(default)]
    pub won: u32,
    #[serde(default)]
    pub drawn: u32,
    #[serde(default)]
    pub lost: u32,
    #[serde(default)]
    pub points: u32,
    #[serde(default)]
    pub goals_for: u32,
    #[serde(default)]
    pub goals_against: u32,
}

/// Kind of in-match event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchEventKind {
    Goal,
    YellowCard,
    RedCard,
    Substitution,
    Penalty,
}

/// An in-match event. Broadcast-only: events are carried inside a delta
/// and never persisted, so a client that joins later will not see them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchEvent {
    pub id: Uuid,
    pub match_id: i64,
    pub minute: u32,
    #[serde(rename = "type")]
    pub kind: MatchEventKind,
    pub team_id: i64,
    pub description: String,
}

/// Partial match update with merge semantics: an absent field means
/// "unchanged".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub home_score: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub away_score: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_minute: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<MatchStatus>,
}

/// Incremental update fanned out to every connection: the fields that
/// changed plus any new events.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchDelta {
    pub match_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub home_score: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub away_score: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_minute: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<MatchStatus>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<MatchEvent>,
}

/// Message from a viewer connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    GetLiveMatches,
    #[serde(rename_all = "camelCase")]
    Subscribe {
        #[serde(default)]
        match_id: Option<i64>,
    },
}

/// Message to a viewer connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Full snapshot of currently-live matches.
    LiveMatches(Vec<Match>),
    /// Changed fields of one match plus any new events.
    MatchUpdate(MatchDelta),
    /// Acknowledgment of a subscribe request.
    #[serde(rename_all = "camelCase")]
    Subscribed { match_id: Option<i64> },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_match() -> Match {
        Match {
            id: 1,
            tournament_id: 2,
            home_team_id: 3,
            away_team_id: 4,
            home_score: 2,
            away_score: 1,
            status: MatchStatus::Live,
            match_date: "2025-06-01T18:00:00Z".parse().unwrap(),
            current_minute: Some(78),
            stream_url: None,
        }
    }

    #[test]
    fn match_uses_camel_case_keys() {
        let json = serde_json::to_string(&sample_match()).unwrap();
        assert!(json.contains("\"tournamentId\":2"));
        assert!(json.contains("\"homeScore\":2"));
        assert!(json.contains("\"currentMinute\":78"));
        let parsed: Match = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.status, MatchStatus::Live);
    }

    #[test]
    fn client_message_decodes_tagged_types() {
        let msg: ClientMessage = serde_json::from_str(r#"{"type":"get_live_matches"}"#).unwrap();
        assert!(matches!(msg, ClientMessage::GetLiveMatches));

        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"subscribe","matchId":7}"#).unwrap();
        assert!(matches!(msg, ClientMessage::Subscribe { match_id: Some(7) }));

        let msg: ClientMessage = serde_json::from_str(r#"{"type":"subscribe"}"#).unwrap();
        assert!(matches!(msg, ClientMessage::Subscribe { match_id: None }));
    }

    #[test]
    fn client_message_rejects_unknown_tag() {
        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"shout"}"#).is_err());
    }

    #[test]
    fn snapshot_wire_shape() {
        let json = serde_json::to_value(ServerMessage::LiveMatches(vec![sample_match()])).unwrap();
        assert_eq!(json["type"], "live_matches");
        assert_eq!(json["data"][0]["id"], 1);
    }

    #[test]
    fn delta_omits_unchanged_fields() {
        let delta = MatchDelta {
            match_id: 5,
            home_score: Some(1),
            away_score: None,
            current_minute: None,
            status: None,
            events: vec![],
        };
        let json = serde_json::to_value(ServerMessage::MatchUpdate(delta)).unwrap();
        assert_eq!(json["type"], "match_update");
        assert_eq!(json["data"]["matchId"], 5);
        assert_eq!(json["data"]["homeScore"], 1);
        assert!(json["data"].get("awayScore").is_none());
        assert!(json["data"].get("events").is_none());
    }

    #[test]
    fn delta_carries_events() {
        let event = MatchEvent {
            id: Uuid::new_v4(),
            match_id: 5,
            minute: 63,
            kind: MatchEventKind::Goal,
            team_id: 3,
            description: "Goal!".to_string(),
        };
        let delta = MatchDelta {
            match_id: 5,
            home_score: Some(2),
            away_score: None,
            current_minute: Some(63),
            status: None,
            events: vec![event],
        };
        let json = serde_json::to_string(&delta).unwrap();
        assert!(json.contains("\"type\":\"goal\""));
        let parsed: MatchDelta = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.events.len(), 1);
        assert_eq!(parsed.events[0].kind, MatchEventKind::Goal);
    }

    #[test]
    fn patch_roundtrip_with_absent_fields() {
        let patch: MatchPatch = serde_json::from_str(r#"{"homeScore":3}"#).unwrap();
        assert_eq!(patch.home_score, Some(3));
        assert_eq!(patch.away_score, None);
        assert_eq!(patch.status, None);
        let json = serde_json::to_string(&patch).unwrap();
        assert_eq!(json, r#"{"homeScore":3}"#);
    }

    #[test]
    fn tournament_patch_keeps_absent_fields_unset() {
        let patch: TournamentPatch =
            serde_json::from_str(r#"{"nameAr":"الدوري الممتاز","isActive":false}"#).unwrap();
        assert_eq!(patch.name_ar.as_deref(), Some("الدوري الممتاز"));
        assert_eq!(patch.is_active, Some(false));
        assert!(patch.name.is_none());
        assert!(patch.kind.is_none());
    }

    #[test]
    fn new_standing_defaults_counters_to_zero() {
        let row: NewStanding = serde_json::from_str(r#"{"teamId":4,"position":1}"#).unwrap();
        assert_eq!(row.team_id, 4);
        assert_eq!(row.position, 1);
        assert_eq!(row.played, 0);
        assert_eq!(row.points, 0);
    }

    #[test]
    fn status_text_roundtrip() {
        for status in [
            MatchStatus::Upcoming,
            MatchStatus::Live,
            MatchStatus::Finished,
        ] {
            assert_eq!(MatchStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(MatchStatus::parse("postponed"), None);
    }
}
