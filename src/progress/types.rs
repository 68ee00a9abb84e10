//! Persisted data model: players, inventory items, weekly snapshots and the
//! process-wide [`GameState`] aggregate.
//!
//! Every struct serializes with the camelCase field names of the stored
//! snapshot. Field names are only ever added, never renamed, so that older
//! snapshots keep loading through the migrator.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::progress::catalog::{roster_name, FALLBACK_PLAYER_ID, ROSTER};

// ============================================================================
// Avatars
// ============================================================================

/// Avatar variants a player can pick. The first variant is the default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AvatarId {
    #[default]
    Pirate,
    Explorer,
    Knight,
    Wizard,
    Archer,
    Ninja,
}

impl AvatarId {
    pub const ALL: [AvatarId; 6] = [
        AvatarId::Pirate,
        AvatarId::Explorer,
        AvatarId::Knight,
        AvatarId::Wizard,
        AvatarId::Archer,
        AvatarId::Ninja,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AvatarId::Pirate => "pirate",
            AvatarId::Explorer => "explorer",
            AvatarId::Knight => "knight",
            AvatarId::Wizard => "wizard",
            AvatarId::Archer => "archer",
            AvatarId::Ninja => "ninja",
        }
    }

    /// Parse from a string (case-insensitive)
    pub fn parse(s: &str) -> Option<Self> {
        let lowered = s.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|a| a.as_str() == lowered)
    }
}

impl fmt::Display for AvatarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Inventory
// ============================================================================

/// Type tag carried by every inventory item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ItemType {
    Chips,
    ChipsLimited,
    Soda,
    SodaLimited,
    Lunch,
    MapFragment,
}

impl ItemType {
    pub const ALL: [ItemType; 6] = [
        ItemType::Chips,
        ItemType::ChipsLimited,
        ItemType::Soda,
        ItemType::SodaLimited,
        ItemType::Lunch,
        ItemType::MapFragment,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ItemType::Chips => "chips",
            ItemType::ChipsLimited => "chips-limited",
            ItemType::Soda => "soda",
            ItemType::SodaLimited => "soda-limited",
            ItemType::Lunch => "lunch",
            ItemType::MapFragment => "map-fragment",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let lowered = s.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|t| t.as_str() == lowered)
    }

    /// Limited items can be bought once per player lifetime.
    pub fn is_limited(&self) -> bool {
        matches!(self, ItemType::ChipsLimited | ItemType::SodaLimited)
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One owned item. Insertion order in the inventory is preserved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryItem {
    pub id: String,
    #[serde(rename = "type")]
    pub item_type: ItemType,
    pub label: String,
    /// Source level for map fragments
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level_id: Option<String>,
    /// Unix timestamp (ms) when acquired
    pub created_at: i64,
}

// ============================================================================
// Weekly history
// ============================================================================

/// Archived summary of one finished week. Never modified after it is appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyProgress {
    pub week_start_date: String,
    pub week_end_date: String,
    pub coins_earned: u64,
    pub problems_completed: Vec<String>,
    pub levels_unlocked: Vec<String>,
    /// Seconds of timed study during the week
    pub time_spent: u64,
    pub achievements: Vec<String>,
}

// ============================================================================
// Players
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: String,
    pub name: String,
    pub avatar: AvatarId,
    pub coins: u64,
    /// Lifetime coins earned; gates level unlocks and is never reduced by spending
    pub total_coins_earned: u64,
    pub completed_problems: BTreeMap<String, bool>,
    pub opened_boxes: BTreeMap<String, bool>,
    pub inventory: Vec<InventoryItem>,
    pub purchased_limited_items: BTreeMap<String, bool>,
    pub weekly_progress: Vec<WeeklyProgress>,
    pub current_week_start: String,
}

impl Player {
    pub fn new(id: &str, name: &str, current_week_start: impl Into<String>) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            avatar: AvatarId::default(),
            coins: 0,
            total_coins_earned: 0,
            completed_problems: BTreeMap::new(),
            opened_boxes: BTreeMap::new(),
            inventory: Vec::new(),
            purchased_limited_items: BTreeMap::new(),
            weekly_progress: Vec::new(),
            current_week_start: current_week_start.into(),
        }
    }

    /// Default record for a roster id; unknown ids use the id as display name.
    pub fn for_roster_id(id: &str, current_week_start: impl Into<String>) -> Self {
        Self::new(id, roster_name(id).unwrap_or(id), current_week_start)
    }

    pub fn has_completed(&self, problem_id: &str) -> bool {
        self.completed_problems.get(problem_id).copied().unwrap_or(false)
    }

    pub fn completed_count(&self) -> usize {
        self.completed_problems.values().filter(|done| **done).count()
    }

    pub fn has_opened_box(&self, level_id: &str) -> bool {
        self.opened_boxes.get(level_id).copied().unwrap_or(false)
    }

    pub fn has_purchased(&self, item_type: ItemType) -> bool {
        self.purchased_limited_items
            .get(item_type.as_str())
            .copied()
            .unwrap_or(false)
    }

    pub fn find_item(&self, item_id: &str) -> Option<&InventoryItem> {
        self.inventory.iter().find(|item| item.id == item_id)
    }

    /// Remove the first inventory entry with `item_id`.
    pub fn take_item(&mut self, item_id: &str) -> Option<InventoryItem> {
        let index = self.inventory.iter().position(|item| item.id == item_id)?;
        Some(self.inventory.remove(index))
    }
}

// ============================================================================
// Game state
// ============================================================================

/// Whole persisted aggregate: who is playing and every roster member's record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameState {
    pub current_player: String,
    pub players: BTreeMap<String, Player>,
}

impl GameState {
    /// Fixed default state: the full roster, default-initialized, with the
    /// fallback player active.
    pub fn new_default(current_week_start: &str) -> Self {
        let players = ROSTER
            .iter()
            .map(|entry| {
                (
                    entry.id.to_string(),
                    Player::new(entry.id, entry.name, current_week_start),
                )
            })
            .collect();
        Self {
            current_player: FALLBACK_PLAYER_ID.to_string(),
            players,
        }
    }

    /// Resolve the active player, falling back to the default player (and
    /// finally a fresh default record) when `current_player` is dangling.
    pub fn current(&self) -> Cow<'_, Player> {
        if let Some(player) = self.players.get(&self.current_player) {
            return Cow::Borrowed(player);
        }
        match self.players.get(FALLBACK_PLAYER_ID) {
            Some(player) => Cow::Borrowed(player),
            None => Cow::Owned(Player::for_roster_id(FALLBACK_PLAYER_ID, String::new())),
        }
    }

    pub fn player(&self, player_id: &str) -> Option<&Player> {
        self.players.get(player_id)
    }

    /// Mutable access to a player record, creating a default one on first
    /// reference to an unknown id.
    pub fn player_entry(&mut self, player_id: &str, current_week_start: &str) -> &mut Player {
        self.players
            .entry(player_id.to_string())
            .or_insert_with(|| Player::for_roster_id(player_id, current_week_start))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn player_serializes_with_snapshot_field_names() {
        let mut player = Player::new("grace", "Grace", "2026-10-12T00:00:00.000Z");
        player.inventory.push(InventoryItem {
            id: "map-fragment-1-abc".into(),
            item_type: ItemType::MapFragment,
            label: "Map Fragment 1".into(),
            level_id: Some("1".into()),
            created_at: 42,
        });
        let json = serde_json::to_value(&player).expect("serialize");
        assert_eq!(json["totalCoinsEarned"], 0);
        assert_eq!(json["avatar"], "pirate");
        assert_eq!(json["currentWeekStart"], "2026-10-12T00:00:00.000Z");
        assert_eq!(json["inventory"][0]["type"], "map-fragment");
        assert_eq!(json["inventory"][0]["levelId"], "1");
        assert_eq!(json["inventory"][0]["createdAt"], 42);
        assert!(json["purchasedLimitedItems"].is_object());
        assert!(json["weeklyProgress"].is_array());
    }

    #[test]
    fn default_state_covers_roster() {
        let state = GameState::new_default("w");
        assert_eq!(state.current_player, FALLBACK_PLAYER_ID);
        for entry in ROSTER {
            let player = state.player(entry.id).expect("roster member");
            assert_eq!(player.name, entry.name);
            assert_eq!(player.coins, 0);
        }
    }

    #[test]
    fn dangling_current_player_falls_back() {
        let mut state = GameState::new_default("w");
        state.current_player = "nobody".into();
        assert_eq!(state.current().id, FALLBACK_PLAYER_ID);

        state.players.clear();
        let fallback = state.current();
        assert_eq!(fallback.id, FALLBACK_PLAYER_ID);
        assert_eq!(fallback.name, "Gilbert");
    }

    #[test]
    fn take_item_removes_first_match_only() {
        let mut player = Player::new("eric", "Eric", "w");
        for n in 0..2 {
            player.inventory.push(InventoryItem {
                id: "dup".into(),
                item_type: ItemType::Soda,
                label: format!("Soda {}", n),
                level_id: None,
                created_at: n,
            });
        }
        let taken = player.take_item("dup").expect("present");
        assert_eq!(taken.label, "Soda 0");
        assert_eq!(player.inventory.len(), 1);
        assert!(player.take_item("missing").is_none());
    }

    #[test]
    fn parses_tags_case_insensitively() {
        assert_eq!(AvatarId::parse("Wizard"), Some(AvatarId::Wizard));
        assert_eq!(AvatarId::parse("dragon"), None);
        assert_eq!(ItemType::parse("CHIPS-LIMITED"), Some(ItemType::ChipsLimited));
        assert!(ItemType::SodaLimited.is_limited());
        assert!(!ItemType::Lunch.is_limited());
    }
}
