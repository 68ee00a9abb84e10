//! Shared fixtures for integration tests.

use chrono::{TimeZone, Utc};
use usaco_treasure::progress::{
    JsonFileStore, Moment, ProgressionEngine, ProgressionPolicy, StateStore, DEFAULT_STATE_KEY,
};

/// Thursday of the week starting 2026-10-12.
pub fn thursday() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 15, 18, 30, 0).unwrap()
}

pub fn fixed_moment() -> Moment {
    Moment::at(&thursday())
}

/// Engine over `store` with the clock pinned to [`thursday`].
pub fn engine_with(store: Box<dyn StateStore>, policy: ProgressionPolicy) -> ProgressionEngine {
    ProgressionEngine::load_at(store, DEFAULT_STATE_KEY, policy, &thursday())
        .with_clock(fixed_moment)
}

/// JSON-backed engine rooted in `dir`.
#[allow(dead_code)]
pub fn json_engine(dir: &std::path::Path) -> ProgressionEngine {
    let store = JsonFileStore::open(dir).expect("json store");
    engine_with(Box::new(store), ProgressionPolicy::default())
}
