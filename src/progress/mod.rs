//! Player progression for the treasure map game.
//!
//! Read-only content lives in [`catalog`]; the persisted aggregate in
//! [`types`]; rules in [`engine`]; derived read-only figures in [`views`].
//! Snapshots go through [`storage`] and are upgraded on load by
//! [`migration`]. [`commands`] puts a text interface on top.

pub mod calendar;
pub mod catalog;
pub mod commands;
pub mod engine;
pub mod errors;
pub mod migration;
pub mod session;
pub mod shop;
pub mod storage;
pub mod types;
pub mod views;

pub use calendar::{week_start, week_start_iso, Moment};
pub use catalog::{
    avatar_info, find_problem, level, roster_name, unlock_threshold, AvatarInfo, LevelConfig,
    Problem, RosterEntry, FALLBACK_PLAYER_ID, LEVELS, ROSTER,
};
pub use commands::{parse_command, GameCommand, GameSession};
pub use engine::{ProgressionEngine, ProgressionPolicy};
pub use errors::ProgressError;
pub use migration::{migrate, MigrationContext, MigrationReport, MIGRATION_STEPS};
pub use session::{MusicToggle, SessionTimer};
pub use shop::{item_label, price, sell_price, shop_name, PurchaseBlock, SHOP_ITEMS};
pub use storage::{
    load_snapshot, save_snapshot, JsonFileStore, MemoryStore, SledStore, StateStore,
    DEFAULT_STATE_KEY,
};
pub use types::{AvatarId, GameState, InventoryItem, ItemType, Player, WeeklyProgress};
pub use views::{
    format_clock, format_duration_hm, leaderboard, level_groups, player_progress_percent,
    unlocked_level_ids, weekly_achievements, LeaderboardEntry,
};
