//! Single write path for match state changes.
//!
//! Every mutation — simulation tick or admin push — goes through here: the
//! store write always precedes the fan-out, and the store lock is held from
//! read to write so concurrent updates to one match cannot lose increments.

use std::sync::Arc;

use rusqlite::Connection;
use thiserror::Error;

use shared::{Match, MatchDelta, MatchEvent, MatchPatch};

use super::Hub;
use crate::db::{self, Db};

#[derive(Debug, Error)]
pub enum ApplyError {
    #[error("match {0} not found")]
    NotFound(i64),
    #[error("store error: {0}")]
    Store(#[from] anyhow::Error),
}

pub struct Broadcaster {
    db: Arc<Db>,
    hub: Hub,
}

impl Broadcaster {
    pub fn new(db: Arc<Db>, hub: Hub) -> Self {
        Self { db, hub }
    }

    /// Merge `patch` into the match, then fan out the changed fields plus
    /// `events`. Fails closed on an unknown match id: nothing is broadcast.
    pub fn apply(
        &self,
        match_id: i64,
        patch: MatchPatch,
        events: Vec<MatchEvent>,
    ) -> Result<Match, ApplyError> {
        let conn = self.db.0.lock().unwrap();
        let Some(before) = db::get_match(&conn, match_id)? else {
            return Err(ApplyError::NotFound(match_id));
        };
        self.commit(&conn, &before, &patch, events)
    }

    /// Like `apply`, but the patch is derived from the current record inside
    /// the critical section. Used by the simulation clock, whose steps are
    /// read-modify-write. The derivation may return None to decline (e.g.
    /// the match finished between listing and locking).
    pub fn apply_with<F>(&self, match_id: i64, derive: F) -> Result<Option<Match>, ApplyError>
    where
        F: FnOnce(&Match) -> Option<(MatchPatch, Vec<MatchEvent>)>,
    {
        let conn = self.db.0.lock().unwrap();
        let Some(before) = db::get_match(&conn, match_id)? else {
            return Err(ApplyError::NotFound(match_id));
        };
        let Some((patch, events)) = derive(&before) else {
            return Ok(None);
        };
        self.commit(&conn, &before, &patch, events).map(Some)
    }

    fn commit(
        &self,
        conn: &Connection,
        before: &Match,
        patch: &MatchPatch,
        events: Vec<MatchEvent>,
    ) -> Result<Match, ApplyError> {
        let updated = db::update_match(conn, before.id, patch)?
            .ok_or(ApplyError::NotFound(before.id))?;
        // Write committed; broadcast can never expose state the store lacks.
        self.hub.broadcast(changed_fields(before, &updated, events));
        Ok(updated)
    }
}

fn changed_fields(before: &Match, after: &Match, events: Vec<MatchEvent>) -> MatchDelta {
    MatchDelta {
        match_id: after.id,
        home_score: (before.home_score != after.home_score).then_some(after.home_score),
        away_score: (before.away_score != after.away_score).then_some(after.away_score),
        current_minute: (before.current_minute != after.current_minute)
            .then_some(after.current_minute)
            .flatten(),
        status: (before.status != after.status).then_some(after.status),
        events,
    }
}
