//! Progression rules.
//!
//! Every rule is a pure transition over [`GameState`]: it borrows the current
//! state and either returns the complete next state or `None` when validation
//! refuses the operation. Nothing is partially applied, so a refused trade or
//! a replayed box leaves the caller's state exactly as it was.
//!
//! [`ProgressionEngine`] is the stateful handle used by the command layer. It
//! owns the state and a [`StateStore`], swaps in the next state when a rule
//! accepts it and then saves a snapshot. A failed save is logged and never
//! rolls back the in-memory change.

use std::borrow::Cow;

use chrono::{DateTime, TimeZone};
use log::{debug, info};
use uuid::Uuid;

use crate::progress::calendar::Moment;
use crate::progress::migration::{migrate, MigrationContext};
use crate::progress::shop::{item_label, price, purchase_block, sell_price};
use crate::progress::storage::{load_snapshot, save_snapshot, StateStore};
use crate::progress::types::{
    AvatarId, GameState, InventoryItem, ItemType, Player, WeeklyProgress,
};
use crate::progress::views::{
    leaderboard, unlocked_level_ids, weekly_achievements, LeaderboardEntry,
};

/// Tunable rules. Only one so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressionPolicy {
    /// Re-award coins when an already completed problem is completed again.
    pub allow_repeat_rewards: bool,
}

impl Default for ProgressionPolicy {
    fn default() -> Self {
        Self {
            allow_repeat_rewards: true,
        }
    }
}

/// Apply `f` to the current player's record in a copy of `state`. The copy is
/// returned only when `f` accepts the change.
fn update_current<F>(state: &GameState, at: &Moment, f: F) -> Option<GameState>
where
    F: FnOnce(&mut Player) -> bool,
{
    let mut next = state.clone();
    let player_id = next.current_player.clone();
    let player = next.player_entry(&player_id, &at.week_start);
    if f(player) {
        Some(next)
    } else {
        None
    }
}

// ============================================================================
// Transitions
// ============================================================================

pub fn complete_problem(
    state: &GameState,
    problem_id: &str,
    level_id: &str,
    reward: u64,
    policy: ProgressionPolicy,
    at: &Moment,
) -> Option<GameState> {
    update_current(state, at, |player| {
        if !policy.allow_repeat_rewards && player.has_completed(problem_id) {
            debug!("{} already completed {}, no reward", player.id, problem_id);
            return false;
        }
        player.coins = player.coins.saturating_add(reward);
        player.total_coins_earned = player.total_coins_earned.saturating_add(reward);
        player.completed_problems.insert(problem_id.to_string(), true);
        debug!(
            "{} completed {} (level {}) for {} coins",
            player.id, problem_id, level_id, reward
        );
        true
    })
}

/// Open the level's treasure box once, granting a map fragment.
pub fn open_box(state: &GameState, level_id: &str, at: &Moment) -> Option<GameState> {
    update_current(state, at, |player| {
        if player.has_opened_box(level_id) {
            return false;
        }
        player.opened_boxes.insert(level_id.to_string(), true);
        player.inventory.push(InventoryItem {
            id: format!("map-fragment-{}-{}", level_id, Uuid::new_v4()),
            item_type: ItemType::MapFragment,
            label: format!("Map Fragment {}", level_id),
            level_id: Some(level_id.to_string()),
            created_at: at.millis,
        });
        true
    })
}

/// Buy one item of `item_type` at its fixed price.
pub fn trade(state: &GameState, item_type: ItemType, at: &Moment) -> Option<GameState> {
    update_current(state, at, |player| {
        if let Some(block) = purchase_block(player, item_type) {
            debug!("{} cannot buy {}: {:?}", player.id, item_type, block);
            return false;
        }
        let Some(cost) = price(item_type) else {
            return false;
        };
        player.coins -= cost;
        player.inventory.push(InventoryItem {
            id: format!("{}-{}", item_type, Uuid::new_v4()),
            item_type,
            label: item_label(item_type).to_string(),
            level_id: None,
            created_at: at.millis,
        });
        if item_type.is_limited() {
            player
                .purchased_limited_items
                .insert(item_type.as_str().to_string(), true);
        }
        true
    })
}

/// Sell back the first inventory item with `item_id`. Limited purchase flags
/// stay set.
pub fn sell_item(state: &GameState, item_id: &str, at: &Moment) -> Option<GameState> {
    update_current(state, at, |player| match player.take_item(item_id) {
        Some(item) => {
            player.coins = player.coins.saturating_add(sell_price(item.item_type));
            true
        }
        None => false,
    })
}

/// Consume an item without any coin change.
pub fn redeem_item(state: &GameState, item_id: &str, at: &Moment) -> Option<GameState> {
    update_current(state, at, |player| player.take_item(item_id).is_some())
}

/// Point `current_player` at `player_id`. Unknown ids are accepted; their
/// record is created by the first mutation.
pub fn switch_player(state: &GameState, player_id: &str) -> GameState {
    let mut next = state.clone();
    next.current_player = player_id.to_string();
    next
}

pub fn change_avatar(state: &GameState, avatar: AvatarId, at: &Moment) -> GameState {
    update_current(state, at, |player| {
        player.avatar = avatar;
        true
    })
    .unwrap_or_else(|| state.clone())
}

pub fn reset_progress(at: &Moment) -> GameState {
    GameState::new_default(&at.week_start)
}

/// Replace one player's record with defaults, keeping id and display name.
pub fn reset_student_progress(state: &GameState, player_id: &str, at: &Moment) -> GameState {
    let mut next = state.clone();
    let fresh = match next.player(player_id) {
        Some(existing) => Player::new(player_id, &existing.name, at.week_start.as_str()),
        None => Player::for_roster_id(player_id, at.week_start.as_str()),
    };
    next.players.insert(player_id.to_string(), fresh);
    next
}

/// Week summary for `player` as of `at`, before anything is reset.
///
/// `problems_completed` lists ids in ascending id order. Completions are kept
/// as a keyed map in the snapshot, so the order they happened in is not
/// recorded.
pub fn week_summary(player: &Player, elapsed_seconds: u64, at: &Moment) -> WeeklyProgress {
    let problems_completed: Vec<String> = player
        .completed_problems
        .iter()
        .filter(|(_, done)| **done)
        .map(|(id, _)| id.clone())
        .collect();
    let levels_unlocked: Vec<String> = unlocked_level_ids(player.total_coins_earned)
        .into_iter()
        .map(String::from)
        .collect();
    let achievements = weekly_achievements(
        problems_completed.len(),
        player.coins,
        levels_unlocked.len(),
        elapsed_seconds,
    );
    WeeklyProgress {
        week_start_date: player.current_week_start.clone(),
        week_end_date: at.iso.clone(),
        coins_earned: player.coins,
        problems_completed,
        levels_unlocked,
        time_spent: elapsed_seconds,
        achievements,
    }
}

/// Archive the week and wipe live progress in one step. Identity, avatar and
/// history survive.
pub fn weekly_reset(
    state: &GameState,
    player_id: &str,
    elapsed_seconds: u64,
    at: &Moment,
) -> GameState {
    let mut next = state.clone();
    let player = next.player_entry(player_id, &at.week_start);
    let summary = week_summary(player, elapsed_seconds, at);

    let mut history = std::mem::take(&mut player.weekly_progress);
    history.push(summary);
    let mut fresh = Player::new(&player.id, &player.name, at.week_start.as_str());
    fresh.avatar = player.avatar;
    fresh.weekly_progress = history;
    *player = fresh;
    next
}

// ============================================================================
// Engine handle
// ============================================================================

type Clock = Box<dyn Fn() -> Moment + Send + Sync>;

pub struct ProgressionEngine {
    state: GameState,
    store: Box<dyn StateStore>,
    key: String,
    policy: ProgressionPolicy,
    clock: Clock,
}

impl ProgressionEngine {
    /// Load (and migrate) the snapshot under `key`. Nothing is written back
    /// until the first mutation.
    pub fn load(
        store: Box<dyn StateStore>,
        key: impl Into<String>,
        policy: ProgressionPolicy,
    ) -> Self {
        Self::load_at(store, key, policy, &chrono::Local::now())
    }

    pub fn load_at<Tz: TimeZone>(
        store: Box<dyn StateStore>,
        key: impl Into<String>,
        policy: ProgressionPolicy,
        now: &DateTime<Tz>,
    ) -> Self {
        let key = key.into();
        let raw = load_snapshot(store.as_ref(), &key);
        let (state, report) = migrate(raw, &MigrationContext::at(now));
        debug!(
            "loaded '{}' ({} players, {} migration steps)",
            key,
            state.players.len(),
            report.applied.len()
        );
        Self {
            state,
            store,
            key,
            policy,
            clock: Box::new(Moment::now),
        }
    }

    /// Replace the wall clock, mainly for tests that pin week boundaries.
    pub fn with_clock<F>(mut self, clock: F) -> Self
    where
        F: Fn() -> Moment + Send + Sync + 'static,
    {
        self.clock = Box::new(clock);
        self
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn policy(&self) -> ProgressionPolicy {
        self.policy
    }

    pub fn current_player(&self) -> Cow<'_, Player> {
        self.state.current()
    }

    pub fn unlocked_level_ids(&self) -> Vec<&'static str> {
        unlocked_level_ids(self.current_player().total_coins_earned)
    }

    pub fn leaderboard(&self) -> Vec<LeaderboardEntry> {
        leaderboard(&self.state)
    }

    /// Write the current state. Returns whether the store accepted it.
    pub fn persist(&self) -> bool {
        save_snapshot(self.store.as_ref(), &self.key, &self.state)
    }

    fn commit(&mut self, next: GameState) {
        self.state = next;
        self.persist();
    }

    fn apply(&mut self, next: Option<GameState>) -> bool {
        match next {
            Some(next) => {
                self.commit(next);
                true
            }
            None => false,
        }
    }

    pub fn complete_problem(&mut self, problem_id: &str, level_id: &str, reward: u64) -> bool {
        let at = (self.clock)();
        let next = complete_problem(&self.state, problem_id, level_id, reward, self.policy, &at);
        self.apply(next)
    }

    pub fn open_box(&mut self, level_id: &str) -> bool {
        let at = (self.clock)();
        let next = open_box(&self.state, level_id, &at);
        self.apply(next)
    }

    pub fn trade(&mut self, item_type: ItemType) -> bool {
        let at = (self.clock)();
        let next = trade(&self.state, item_type, &at);
        self.apply(next)
    }

    pub fn sell_item(&mut self, item_id: &str) -> bool {
        let at = (self.clock)();
        let next = sell_item(&self.state, item_id, &at);
        self.apply(next)
    }

    pub fn redeem_item(&mut self, item_id: &str) -> bool {
        let at = (self.clock)();
        let next = redeem_item(&self.state, item_id, &at);
        self.apply(next)
    }

    pub fn switch_player(&mut self, player_id: &str) {
        let next = switch_player(&self.state, player_id);
        self.commit(next);
    }

    pub fn change_avatar(&mut self, avatar: AvatarId) {
        let at = (self.clock)();
        let next = change_avatar(&self.state, avatar, &at);
        self.commit(next);
    }

    pub fn reset_progress(&mut self) {
        let at = (self.clock)();
        info!("resetting all progress");
        self.commit(reset_progress(&at));
    }

    pub fn reset_student_progress(&mut self, player_id: &str) {
        let at = (self.clock)();
        info!("resetting progress of {}", player_id);
        let next = reset_student_progress(&self.state, player_id, &at);
        self.commit(next);
    }

    pub fn weekly_reset(&mut self, player_id: &str, elapsed_seconds: u64) {
        let at = (self.clock)();
        info!("weekly reset for {} ({}s this session)", player_id, elapsed_seconds);
        let next = weekly_reset(&self.state, player_id, elapsed_seconds, &at);
        self.commit(next);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::storage::MemoryStore;
    use chrono::Utc;
    use std::sync::Arc;

    const WEEK: &str = "2026-10-12T00:00:00.000Z";

    fn moment() -> Moment {
        Moment::at(&Utc.with_ymd_and_hms(2026, 10, 16, 8, 0, 0).unwrap())
    }

    fn fresh() -> GameState {
        GameState::new_default(WEEK)
    }

    fn with_coins(coins: u64) -> GameState {
        let mut state = fresh();
        state.players.get_mut("gilbert").unwrap().coins = coins;
        state
    }

    fn engine(store: Arc<MemoryStore>) -> ProgressionEngine {
        ProgressionEngine::load_at(
            Box::new(store),
            "k",
            ProgressionPolicy::default(),
            &Utc.with_ymd_and_hms(2026, 10, 16, 8, 0, 0).unwrap(),
        )
        .with_clock(moment)
    }

    #[test]
    fn first_coins_unlock_second_levels() {
        let at = moment();
        let policy = ProgressionPolicy::default();
        let state = complete_problem(&fresh(), "1-impl-1", "1", 1, policy, &at).unwrap();
        let gilbert = state.current();
        assert_eq!(gilbert.coins, 1);
        assert_eq!(gilbert.total_coins_earned, 1);
        assert!(!unlocked_level_ids(gilbert.total_coins_earned).contains(&"2A"));

        let state = complete_problem(&state, "1-impl-2", "1", 1, policy, &at).unwrap();
        let unlocked = unlocked_level_ids(state.current().total_coins_earned);
        assert!(unlocked.contains(&"2A") && unlocked.contains(&"2B"));
    }

    #[test]
    fn repeat_rewards_follow_policy() {
        let at = moment();
        let repeat = ProgressionPolicy::default();
        let once = ProgressionPolicy {
            allow_repeat_rewards: false,
        };
        let state = complete_problem(&fresh(), "1-impl-1", "1", 1, repeat, &at).unwrap();
        let again = complete_problem(&state, "1-impl-1", "1", 1, repeat, &at).unwrap();
        assert_eq!(again.current().coins, 2);
        assert!(complete_problem(&state, "1-impl-1", "1", 1, once, &at).is_none());
    }

    #[test]
    fn box_opens_once() {
        let at = moment();
        let opened = open_box(&fresh(), "2A", &at).unwrap();
        let player = opened.current();
        assert_eq!(player.inventory.len(), 1);
        let fragment = &player.inventory[0];
        assert_eq!(fragment.item_type, ItemType::MapFragment);
        assert_eq!(fragment.label, "Map Fragment 2A");
        assert_eq!(fragment.level_id.as_deref(), Some("2A"));
        assert!(fragment.id.starts_with("map-fragment-2A-"));
        assert_eq!(fragment.created_at, at.millis);
        assert!(open_box(&opened, "2A", &at).is_none());
    }

    #[test]
    fn lunch_needs_ten_coins() {
        let at = moment();
        assert!(trade(&with_coins(9), ItemType::Lunch, &at).is_none());
        let bought = trade(&with_coins(10), ItemType::Lunch, &at).unwrap();
        let player = bought.current();
        assert_eq!(player.coins, 0);
        assert_eq!(player.inventory.len(), 1);
        assert_eq!(player.inventory[0].item_type, ItemType::Lunch);
        assert_eq!(player.inventory[0].label, "Choice of Lunch");
    }

    #[test]
    fn limited_items_sell_once_even_after_resale() {
        let at = moment();
        let bought = trade(&with_coins(100), ItemType::ChipsLimited, &at).unwrap();
        assert!(trade(&bought, ItemType::ChipsLimited, &at).is_none());
        let item_id = bought.current().inventory[0].id.clone();
        let sold = sell_item(&bought, &item_id, &at).unwrap();
        assert!(sold.current().has_purchased(ItemType::ChipsLimited));
        assert!(trade(&sold, ItemType::ChipsLimited, &at).is_none());
    }

    #[test]
    fn trade_then_sell_loses_the_spread() {
        let at = moment();
        for item_type in crate::progress::shop::SHOP_ITEMS {
            let bought = trade(&with_coins(50), item_type, &at).unwrap();
            let item_id = bought.current().inventory[0].id.clone();
            let sold = sell_item(&bought, &item_id, &at).unwrap();
            let cost = price(item_type).unwrap();
            assert_eq!(sold.current().coins, 50 - cost + sell_price(item_type));
        }
    }

    #[test]
    fn map_fragments_are_not_for_sale() {
        assert!(trade(&with_coins(100), ItemType::MapFragment, &moment()).is_none());
    }

    #[test]
    fn sell_and_redeem_remove_items() {
        let at = moment();
        let opened = open_box(&fresh(), "1", &at).unwrap();
        let fragment = opened.current().inventory[0].id.clone();
        let sold = sell_item(&opened, &fragment, &at).unwrap();
        assert_eq!(sold.current().coins, 1);
        assert!(sold.current().inventory.is_empty());
        assert!(sell_item(&sold, &fragment, &at).is_none());

        let redeemed = redeem_item(&opened, &fragment, &at).unwrap();
        assert_eq!(redeemed.current().coins, 0);
        assert!(redeemed.current().inventory.is_empty());
        assert!(redeem_item(&redeemed, "missing", &at).is_none());
    }

    #[test]
    fn unknown_current_player_gets_a_record_on_first_change() {
        let at = moment();
        let switched = switch_player(&fresh(), "zoe");
        assert_eq!(switched.current_player, "zoe");
        assert!(switched.player("zoe").is_none());
        let policy = ProgressionPolicy::default();
        let next = complete_problem(&switched, "1-impl-1", "1", 1, policy, &at).unwrap();
        let zoe = next.player("zoe").expect("created");
        assert_eq!(zoe.name, "zoe");
        assert_eq!(zoe.coins, 1);
        assert_eq!(zoe.current_week_start, at.week_start);
    }

    #[test]
    fn avatar_change_only_touches_current_player() {
        let next = change_avatar(&fresh(), AvatarId::Ninja, &moment());
        assert_eq!(next.current().avatar, AvatarId::Ninja);
        assert_eq!(next.player("grace").unwrap().avatar, AvatarId::Pirate);
    }

    #[test]
    fn reset_student_leaves_others_alone() {
        let at = moment();
        let mut state = fresh();
        state.current_player = "brian".into();
        state.players.get_mut("brian").unwrap().coins = 9;
        let grace = state.players.get_mut("grace").unwrap();
        grace.coins = 30;
        grace.name = "Grace H.".into();
        grace.avatar = AvatarId::Wizard;

        let next = reset_student_progress(&state, "grace", &at);
        assert_eq!(next.current_player, "brian");
        assert_eq!(next.player("brian"), state.player("brian"));
        let grace = next.player("grace").unwrap();
        assert_eq!(grace.name, "Grace H.");
        assert_eq!(grace.coins, 0);
        assert_eq!(grace.avatar, AvatarId::Pirate);
    }

    #[test]
    fn reset_progress_restores_defaults() {
        let at = moment();
        let next = reset_progress(&at);
        assert_eq!(next, GameState::new_default(&at.week_start));
    }

    #[test]
    fn week_summary_lists_completed_ids_in_id_order() {
        let at = moment();
        let mut player = Player::new("grace", "Grace", WEEK);
        player.completed_problems.insert("2A-bf-1".into(), true);
        player.completed_problems.insert("1-impl-3".into(), true);
        player.completed_problems.insert("1-impl-2".into(), false);
        player.completed_problems.insert("1-impl-1".into(), true);
        let week = week_summary(&player, 0, &at);
        assert_eq!(week.problems_completed, vec!["1-impl-1", "1-impl-3", "2A-bf-1"]);
    }

    #[test]
    fn weekly_reset_archives_then_wipes() {
        let at = moment();
        let mut state = fresh();
        {
            let gilbert = state.players.get_mut("gilbert").unwrap();
            gilbert.avatar = AvatarId::Knight;
            gilbert.coins = 12;
            gilbert.total_coins_earned = 20;
            gilbert.completed_problems.insert("1-impl-1".into(), true);
            gilbert.opened_boxes.insert("1".into(), true);
            gilbert.purchased_limited_items.insert("soda-limited".into(), true);
            gilbert.current_week_start = "2026-10-05T00:00:00.000Z".into();
        }
        let once = weekly_reset(&state, "gilbert", 7300, &at);
        let gilbert = once.player("gilbert").unwrap();
        assert_eq!(gilbert.weekly_progress.len(), 1);
        let week = &gilbert.weekly_progress[0];
        assert_eq!(week.coins_earned, 12);
        assert_eq!(week.week_start_date, "2026-10-05T00:00:00.000Z");
        assert_eq!(week.week_end_date, at.iso);
        assert_eq!(week.problems_completed, vec!["1-impl-1"]);
        assert_eq!(week.levels_unlocked.len(), 7);
        assert_eq!(week.time_spent, 7300);
        assert!(week.achievements.contains(&"Level Master".to_string()));
        assert!(week.achievements.contains(&"Study Champion".to_string()));

        assert_eq!(gilbert.coins, 0);
        assert_eq!(gilbert.total_coins_earned, 0);
        assert!(gilbert.completed_problems.is_empty());
        assert!(gilbert.opened_boxes.is_empty());
        assert!(gilbert.inventory.is_empty());
        assert!(gilbert.purchased_limited_items.is_empty());
        assert_eq!(gilbert.avatar, AvatarId::Knight);
        assert_eq!(gilbert.name, "Gilbert");
        assert_eq!(gilbert.current_week_start, WEEK);

        let twice = weekly_reset(&once, "gilbert", 0, &at);
        let history = &twice.player("gilbert").unwrap().weekly_progress;
        assert_eq!(history.len(), 2);
        assert_eq!(history[0], *week);
        assert_eq!(history[1].coins_earned, 0);
    }

    #[test]
    fn engine_persists_accepted_changes_only() {
        let store = Arc::new(MemoryStore::new());
        let mut engine = engine(Arc::clone(&store));
        assert!(store.get("k").is_none(), "loading must not write");

        assert!(!engine.trade(ItemType::Lunch));
        assert!(store.get("k").is_none());

        assert!(engine.complete_problem("1-impl-1", "1", 1));
        let saved = store.get("k").expect("saved");
        assert!(saved.contains("\"1-impl-1\":true"));
        assert_eq!(engine.unlocked_level_ids(), vec!["1"]);
    }

    #[test]
    fn engine_keeps_memory_state_when_store_rejects() {
        let store = Arc::new(MemoryStore::new());
        store.set_reject_writes(true);
        let mut engine = engine(Arc::clone(&store));
        assert!(engine.complete_problem("1-impl-1", "1", 5));
        assert_eq!(engine.current_player().coins, 5);
        assert!(!engine.persist());
        assert!(store.get("k").is_none());
    }

    #[test]
    fn engine_reloads_saved_state() {
        let store = Arc::new(MemoryStore::new());
        {
            let mut engine = engine(Arc::clone(&store));
            engine.switch_player("grace");
            engine.change_avatar(AvatarId::Archer);
            assert!(engine.open_box("1"));
        }
        let reloaded = engine(store);
        let grace = reloaded.current_player();
        assert_eq!(grace.id, "grace");
        assert_eq!(grace.avatar, AvatarId::Archer);
        assert!(grace.has_opened_box("1"));
        assert_eq!(reloaded.leaderboard().len(), 4);
    }
}
