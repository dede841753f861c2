//! Simulation clock: advances live matches once per tick and occasionally
//! emits scoring events.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use uuid::Uuid;

use shared::{Match, MatchEvent, MatchEventKind, MatchPatch, MatchStatus};

use super::Broadcaster;
use crate::config::SimulationConfig;
use crate::db::{self, Db};

/// Regulation end; no goals are simulated past this minute.
const FULL_TIME_MINUTE: u32 = 90;
/// Hard cap on the simulated clock (stoppage time).
const MAX_MINUTE: u32 = 95;

pub struct Simulation {
    db: Arc<Db>,
    broadcaster: Arc<Broadcaster>,
    config: SimulationConfig,
}

impl Simulation {
    pub fn new(db: Arc<Db>, broadcaster: Arc<Broadcaster>, config: SimulationConfig) -> Self {
        Self {
            db,
            broadcaster,
            config,
        }
    }

    /// Run the clock until the process exits. Nothing inside a tick is fatal.
    pub async fn run(self) {
        let mut interval =
            tokio::time::interval(Duration::from_secs(self.config.tick_interval_secs));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            self.tick();
        }
    }

    /// One pass over all live matches. Failures are isolated per match: a
    /// store error on one match is logged and the rest still advance.
    pub fn tick(&self) {
        let ids: Vec<i64> = {
            let conn = self.db.0.lock().unwrap();
            match db::get_matches_by_status(&conn, MatchStatus::Live) {
                Ok(matches) => matches.into_iter().map(|m| m.id).collect(),
                Err(e) => {
                    tracing::error!("tick: listing live matches failed: {}", e);
                    return;
                }
            }
        };

        let mut rng = rand::thread_rng();
        for id in ids {
            let step = self
                .broadcaster
                .apply_with(id, |m| advance(m, &mut rng, &self.config));
            match step {
                Ok(Some(m)) => tracing::info!(
                    "advanced match {}: {}-{} ({}')",
                    m.id,
                    m.home_score,
                    m.away_score,
                    m.current_minute.unwrap_or(0)
                ),
                Ok(None) => {}
                Err(e) => tracing::warn!("tick: updating match {} failed: {}", id, e),
            }
        }
    }
}

/// Derive one simulation step for a match. Returns None when the match is
/// not live (it may have finished between listing and locking).
fn advance(
    m: &Match,
    rng: &mut impl Rng,
    config: &SimulationConfig,
) -> Option<(MatchPatch, Vec<MatchEvent>)> {
    if m.status != MatchStatus::Live {
        return None;
    }

    let minute = m.current_minute.unwrap_or(0);
    let new_minute = (minute + rng.gen_range(1..=3)).min(MAX_MINUTE);

    let mut patch = MatchPatch {
        current_minute: Some(new_minute),
        ..Default::default()
    };
    let mut events = Vec::new();

    if new_minute < FULL_TIME_MINUTE && rng.gen_bool(config.goal_probability) {
        let home_scores = rng.gen_bool(0.5);
        let team_id = if home_scores {
            patch.home_score = Some(m.home_score + 1);
            m.home_team_id
        } else {
            patch.away_score = Some(m.away_score + 1);
            m.away_team_id
        };
        events.push(MatchEvent {
            id: Uuid::new_v4(),
            match_id: m.id,
            minute: new_minute,
            kind: MatchEventKind::Goal,
            team_id,
            description: "Goal!".to_string(),
        });
    }

    if new_minute >= FULL_TIME_MINUTE && rng.gen_bool(config.finish_probability) {
        patch.status = Some(MatchStatus::Finished);
    }

    Some((patch, events))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::realtime::Hub;
    use chrono::Utc;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use shared::NewMatch;

    fn live_match(minute: Option<u32>) -> Match {
        Match {
            id: 1,
            tournament_id: 1,
            home_team_id: 1,
            away_team_id: 7,
            home_score: 0,
            away_score: 0,
            status: MatchStatus::Live,
            match_date: Utc::now(),
            current_minute: minute,
            stream_url: None,
        }
    }

    fn quiet() -> SimulationConfig {
        SimulationConfig {
            tick_interval_secs: 30,
            goal_probability: 0.0,
            finish_probability: 0.0,
        }
    }

    #[test]
    fn minute_is_monotonic_and_capped() {
        let mut rng = StdRng::seed_from_u64(42);
        let config = quiet();
        let mut m = live_match(None);
        let mut minutes = Vec::new();
        for _ in 0..40 {
            let (patch, _) = advance(&m, &mut rng, &config).unwrap();
            let next = patch.current_minute.unwrap();
            minutes.push(next);
            m.current_minute = Some(next);
        }
        assert!(minutes.windows(2).all(|w| w[0] <= w[1]));
        assert!(minutes.iter().all(|&minute| minute <= MAX_MINUTE));
    }

    #[test]
    fn minute_saturates_at_the_cap() {
        let mut rng = StdRng::seed_from_u64(42);
        let (patch, _) = advance(&live_match(Some(MAX_MINUTE)), &mut rng, &quiet()).unwrap();
        assert_eq!(patch.current_minute, Some(MAX_MINUTE));
    }

    #[test]
    fn null_minute_starts_from_zero() {
        let mut rng = StdRng::seed_from_u64(7);
        let (patch, _) = advance(&live_match(None), &mut rng, &quiet()).unwrap();
        assert!((1..=3).contains(&patch.current_minute.unwrap()));
    }

    #[test]
    fn certain_goal_scores_exactly_one_side() {
        let mut rng = StdRng::seed_from_u64(3);
        let config = SimulationConfig {
            goal_probability: 1.0,
            ..quiet()
        };
        let m = live_match(Some(30));
        let (patch, events) = advance(&m, &mut rng, &config).unwrap();
        let home = patch.home_score.unwrap_or(m.home_score);
        let away = patch.away_score.unwrap_or(m.away_score);
        assert_eq!(home + away, 1);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, MatchEventKind::Goal);
        let scorer = if patch.home_score.is_some() {
            m.home_team_id
        } else {
            m.away_team_id
        };
        assert_eq!(events[0].team_id, scorer);
    }

    #[test]
    fn no_goals_after_full_time() {
        let mut rng = StdRng::seed_from_u64(9);
        let config = SimulationConfig {
            goal_probability: 1.0,
            ..quiet()
        };
        // Already past 90: the minute can only land in [91, 95].
        let (patch, events) = advance(&live_match(Some(92)), &mut rng, &config).unwrap();
        assert!(patch.home_score.is_none());
        assert!(patch.away_score.is_none());
        assert!(events.is_empty());
    }

    #[test]
    fn certain_finish_transitions_past_ninety() {
        let mut rng = StdRng::seed_from_u64(11);
        let config = SimulationConfig {
            finish_probability: 1.0,
            ..quiet()
        };
        let (patch, _) = advance(&live_match(Some(90)), &mut rng, &config).unwrap();
        assert_eq!(patch.status, Some(MatchStatus::Finished));
    }

    #[test]
    fn non_live_match_is_skipped() {
        let mut rng = StdRng::seed_from_u64(13);
        let mut m = live_match(Some(95));
        m.status = MatchStatus::Finished;
        assert!(advance(&m, &mut rng, &quiet()).is_none());
    }

    fn seeded_world(config: SimulationConfig) -> (Arc<Db>, Hub, Simulation) {
        let db = Arc::new(Db::open_in_memory().unwrap());
        db.run_migrations().unwrap();
        {
            let conn = db.0.lock().unwrap();
            db::seed_demo_data(&conn).unwrap();
        }
        let hub = Hub::new();
        let broadcaster = Arc::new(Broadcaster::new(db.clone(), hub.clone()));
        let simulation = Simulation::new(db.clone(), broadcaster, config);
        (db, hub, simulation)
    }

    #[tokio::test]
    async fn tick_advances_every_live_match() {
        let (db, hub, simulation) = seeded_world(quiet());
        let mut rx = hub.subscribe();

        let live_before = {
            let conn = db.0.lock().unwrap();
            db::get_matches_by_status(&conn, MatchStatus::Live).unwrap()
        };
        simulation.tick();

        let mut seen = Vec::new();
        for _ in 0..live_before.len() {
            seen.push(rx.try_recv().unwrap().match_id);
        }
        let mut expected: Vec<i64> = live_before.iter().map(|m| m.id).collect();
        seen.sort_unstable();
        expected.sort_unstable();
        assert_eq!(seen, expected);

        let conn = db.0.lock().unwrap();
        for before in &live_before {
            let after = db::get_match(&conn, before.id).unwrap().unwrap();
            assert!(after.current_minute.unwrap() > before.current_minute.unwrap_or(0));
        }
    }

    #[tokio::test]
    async fn finished_match_emits_no_further_deltas() {
        let (db, hub, simulation) = seeded_world(quiet());
        let finished = {
            let conn = db.0.lock().unwrap();
            db::create_match(
                &conn,
                &NewMatch {
                    tournament_id: 1,
                    home_team_id: 1,
                    away_team_id: 7,
                    home_score: 3,
                    away_score: 1,
                    status: MatchStatus::Finished,
                    match_date: Utc::now(),
                    current_minute: Some(95),
                    stream_url: None,
                },
            )
            .unwrap()
        };
        let mut rx = hub.subscribe();

        for _ in 0..5 {
            simulation.tick();
        }

        while let Ok(delta) = rx.try_recv() {
            assert_ne!(delta.match_id, finished.id);
        }
        let conn = db.0.lock().unwrap();
        let after = db::get_match(&conn, finished.id).unwrap().unwrap();
        assert_eq!(after.current_minute, Some(95));
        assert_eq!(after.status, MatchStatus::Finished);
    }

    #[tokio::test]
    async fn tick_with_no_live_matches_broadcasts_nothing() {
        let (db, hub, simulation) = seeded_world(quiet());
        {
            let conn = db.0.lock().unwrap();
            for m in db::get_matches_by_status(&conn, MatchStatus::Live).unwrap() {
                let patch = MatchPatch {
                    status: Some(MatchStatus::Finished),
                    ..Default::default()
                };
                db::update_match(&conn, m.id, &patch).unwrap();
            }
        }
        let mut rx = hub.subscribe();
        simulation.tick();
        assert!(rx.try_recv().is_err());
    }
}
