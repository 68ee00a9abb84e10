//! Snapshot migration.
//!
//! Snapshots carry no version field. Older shapes are recognised purely by
//! which fields are present, so the stored shape is decoded into
//! [`StoredGameState`] (every evolvable field optional) and an ordered list
//! of [`MIGRATION_STEPS`] fills the gaps. Each step is a pure function of the
//! stored shape and is idempotent: running the whole list twice changes
//! nothing the second time.
//!
//! # Adding New Migrations
//!
//! 1. Add the new field to [`Player`] and as an `Option` to [`StoredPlayer`]
//! 2. Backfill it in a step (or extend `backfill_player_fields`)
//! 3. Add a test loading a snapshot without the field
//!
//! Fields are only ever added, never renamed or removed.

use std::collections::BTreeMap;

use chrono::{DateTime, TimeZone};
use log::{info, warn};
use serde::Deserialize;
use serde_json::Value;

use crate::progress::calendar::week_start_iso;
use crate::progress::catalog::{roster_name, FALLBACK_PLAYER_ID, ROSTER};
use crate::progress::types::{AvatarId, GameState, InventoryItem, Player, WeeklyProgress};

/// Player record as it may appear in any historical snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredPlayer {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    /// Added with avatar selection
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub coins: u64,
    #[serde(default)]
    pub total_coins_earned: u64,
    #[serde(default)]
    pub completed_problems: BTreeMap<String, bool>,
    #[serde(default)]
    pub opened_boxes: BTreeMap<String, bool>,
    #[serde(default)]
    pub inventory: Vec<InventoryItem>,
    /// Added with limited shop items
    #[serde(default)]
    pub purchased_limited_items: Option<BTreeMap<String, bool>>,
    /// Added with weekly recaps
    #[serde(default)]
    pub weekly_progress: Option<Vec<WeeklyProgress>>,
    #[serde(default)]
    pub current_week_start: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredGameState {
    #[serde(default)]
    pub current_player: Option<String>,
    #[serde(default)]
    pub players: Option<BTreeMap<String, StoredPlayer>>,
}

/// Top level of a snapshot with each player left undecoded, so one broken
/// record cannot take the others down with it.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawGameState {
    #[serde(default)]
    current_player: Option<String>,
    #[serde(default)]
    players: Option<BTreeMap<String, Value>>,
}

/// Values a migration may need that do not come from the snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationContext {
    /// ISO timestamp of the current week's Monday midnight
    pub week_start: String,
}

impl MigrationContext {
    pub fn at<Tz: TimeZone>(now: &DateTime<Tz>) -> Self {
        Self {
            week_start: week_start_iso(now),
        }
    }
}

pub struct MigrationStep {
    pub name: &'static str,
    pub apply: fn(StoredGameState, &MigrationContext) -> StoredGameState,
}

/// Steps in application order.
pub const MIGRATION_STEPS: &[MigrationStep] = &[
    MigrationStep {
        name: "default-incomplete-state",
        apply: default_incomplete_state,
    },
    MigrationStep {
        name: "backfill-player-fields",
        apply: backfill_player_fields,
    },
    MigrationStep {
        name: "insert-missing-roster-members",
        apply: insert_missing_roster_members,
    },
    MigrationStep {
        name: "repair-current-player",
        apply: repair_current_player,
    },
];

/// Which steps changed the snapshot during a migration run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    pub applied: Vec<&'static str>,
}

impl MigrationReport {
    pub fn changed(&self) -> bool {
        !self.applied.is_empty()
    }
}

// ============================================================================
// Steps
// ============================================================================

fn default_roster(ctx: &MigrationContext) -> BTreeMap<String, StoredPlayer> {
    ROSTER
        .iter()
        .map(|entry| {
            (
                entry.id.to_string(),
                StoredPlayer::from(Player::new(entry.id, entry.name, ctx.week_start.as_str())),
            )
        })
        .collect()
}

/// Absent value, or one missing `players` or `currentPlayer`, becomes the full default state.
fn default_incomplete_state(state: StoredGameState, ctx: &MigrationContext) -> StoredGameState {
    if state.players.is_some() && state.current_player.is_some() {
        return state;
    }
    StoredGameState {
        current_player: Some(FALLBACK_PLAYER_ID.to_string()),
        players: Some(default_roster(ctx)),
    }
}

fn backfill_player_fields(mut state: StoredGameState, ctx: &MigrationContext) -> StoredGameState {
    let Some(players) = state.players.as_mut() else {
        return state;
    };
    for (key, player) in players.iter_mut() {
        if player.id.is_none() {
            player.id = Some(key.clone());
        }
        if player.name.is_none() {
            player.name = Some(roster_name(key).unwrap_or(key.as_str()).to_string());
        }
        let avatar_known = player
            .avatar
            .as_deref()
            .and_then(AvatarId::parse)
            .is_some();
        if !avatar_known {
            player.avatar = Some(AvatarId::default().as_str().to_string());
        }
        if player.purchased_limited_items.is_none() {
            player.purchased_limited_items = Some(BTreeMap::new());
        }
        if player.weekly_progress.is_none() {
            player.weekly_progress = Some(Vec::new());
        }
        if player.current_week_start.is_none() {
            player.current_week_start = Some(ctx.week_start.clone());
        }
    }
    state
}

fn insert_missing_roster_members(
    mut state: StoredGameState,
    ctx: &MigrationContext,
) -> StoredGameState {
    let players = state.players.get_or_insert_with(BTreeMap::new);
    for entry in ROSTER {
        players.entry(entry.id.to_string()).or_insert_with(|| {
            StoredPlayer::from(Player::new(entry.id, entry.name, ctx.week_start.as_str()))
        });
    }
    state
}

fn repair_current_player(mut state: StoredGameState, _ctx: &MigrationContext) -> StoredGameState {
    let resolves = match (&state.current_player, &state.players) {
        (Some(current), Some(players)) => players.contains_key(current),
        _ => false,
    };
    if !resolves {
        state.current_player = Some(FALLBACK_PLAYER_ID.to_string());
    }
    state
}

// ============================================================================
// Conversions
// ============================================================================

impl From<Player> for StoredPlayer {
    fn from(player: Player) -> Self {
        Self {
            id: Some(player.id),
            name: Some(player.name),
            avatar: Some(player.avatar.as_str().to_string()),
            coins: player.coins,
            total_coins_earned: player.total_coins_earned,
            completed_problems: player.completed_problems,
            opened_boxes: player.opened_boxes,
            inventory: player.inventory,
            purchased_limited_items: Some(player.purchased_limited_items),
            weekly_progress: Some(player.weekly_progress),
            current_week_start: Some(player.current_week_start),
        }
    }
}

impl StoredPlayer {
    fn into_player(self, key: &str, ctx: &MigrationContext) -> Player {
        Player {
            id: self.id.unwrap_or_else(|| key.to_string()),
            name: self
                .name
                .unwrap_or_else(|| roster_name(key).unwrap_or(key).to_string()),
            avatar: self
                .avatar
                .as_deref()
                .and_then(AvatarId::parse)
                .unwrap_or_default(),
            coins: self.coins,
            total_coins_earned: self.total_coins_earned,
            completed_problems: self.completed_problems,
            opened_boxes: self.opened_boxes,
            inventory: self.inventory,
            purchased_limited_items: self.purchased_limited_items.unwrap_or_default(),
            weekly_progress: self.weekly_progress.unwrap_or_default(),
            current_week_start: self
                .current_week_start
                .unwrap_or_else(|| ctx.week_start.clone()),
        }
    }
}

impl StoredGameState {
    /// Decode a raw snapshot. Shapes that do not even match the stored
    /// layout count as absent; a single undecodable player record is
    /// replaced by an empty one and backfilled like any other gap.
    pub fn decode(raw: Option<Value>) -> Self {
        let Some(raw) = raw else {
            return Self::default();
        };
        let raw: RawGameState = match serde_json::from_value(raw) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("stored snapshot has an unrecognised shape, using defaults: {}", e);
                return Self::default();
            }
        };
        let players = raw.players.map(|players| {
            players
                .into_iter()
                .map(|(key, value)| {
                    let player = serde_json::from_value(value).unwrap_or_else(|e| {
                        warn!("player '{}' has an unrecognised shape, resetting it: {}", key, e);
                        StoredPlayer::default()
                    });
                    (key, player)
                })
                .collect()
        });
        Self {
            current_player: raw.current_player,
            players,
        }
    }

    fn into_game_state(self, ctx: &MigrationContext) -> GameState {
        let players = self
            .players
            .unwrap_or_default()
            .into_iter()
            .map(|(key, stored)| {
                let player = stored.into_player(&key, ctx);
                (key, player)
            })
            .collect();
        GameState {
            current_player: self
                .current_player
                .unwrap_or_else(|| FALLBACK_PLAYER_ID.to_string()),
            players,
        }
    }
}

// ============================================================================
// Entry point
// ============================================================================

/// Run every step over `stored` and return the resulting fully-shaped state.
pub fn migrate_stored(
    stored: StoredGameState,
    ctx: &MigrationContext,
) -> (GameState, MigrationReport) {
    let mut report = MigrationReport::default();
    let mut current = stored;
    for step in MIGRATION_STEPS {
        let next = (step.apply)(current.clone(), ctx);
        if next != current {
            report.applied.push(step.name);
        }
        current = next;
    }
    if report.changed() {
        info!("snapshot migrated: {}", report.applied.join(", "));
    }
    (current.into_game_state(ctx), report)
}

/// Load path used at startup: raw snapshot (possibly absent) to valid state.
pub fn migrate(raw: Option<Value>, ctx: &MigrationContext) -> (GameState, MigrationReport) {
    migrate_stored(StoredGameState::decode(raw), ctx)
}
