//! Shared types and models for the live scores monorepo.

mod models;

// Explicit re-exports (avoids rust-analyzer issues with `pub use models::*`)
pub use models::{
    ClientMessage, Match, MatchDelta, MatchEvent, MatchEventKind, MatchPatch, MatchStatus,
    NewMatch, NewStanding, ServerMessage, Standing, Team, Tournament, TournamentPatch,
};
