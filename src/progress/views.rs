//! Pure read-only computations over game state: unlocked levels, leaderboard,
//! weekly achievements and recap formatting.

use crate::progress::catalog::{total_problems, LevelConfig, LEVELS, ROSTER};
use crate::progress::types::{AvatarId, GameState, Player, WeeklyProgress};

/// Last map square; players beyond it are drawn on the final square.
pub const MAP_LAST_POSITION: usize = 20;

/// Level ids (catalog order) whose threshold is met by `total_coins_earned`.
///
/// Monotonic in its input, so a level never re-locks while lifetime coins only grow.
pub fn unlocked_level_ids(total_coins_earned: u64) -> Vec<&'static str> {
    LEVELS
        .iter()
        .filter(|level| level.unlock_threshold <= total_coins_earned)
        .map(|level| level.id)
        .collect()
}

pub fn is_level_unlocked(level_id: &str, total_coins_earned: u64) -> bool {
    unlocked_level_ids(total_coins_earned)
        .iter()
        .any(|id| id.eq_ignore_ascii_case(level_id))
}

/// Catalog levels grouped by numeric prefix, groups in catalog order.
pub fn level_groups() -> Vec<(&'static str, Vec<&'static LevelConfig>)> {
    let mut groups: Vec<(&'static str, Vec<&'static LevelConfig>)> = Vec::new();
    for level in LEVELS {
        match groups.iter_mut().find(|(group, _)| *group == level.group()) {
            Some((_, members)) => members.push(level),
            None => groups.push((level.group(), vec![level])),
        }
    }
    groups
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaderboardEntry {
    pub id: String,
    pub name: String,
    pub avatar: AvatarId,
    pub coins: u64,
    pub total_coins_earned: u64,
    pub completed: usize,
}

/// Whole roster merged with live state, richest first. Ties keep roster order.
pub fn leaderboard(state: &GameState) -> Vec<LeaderboardEntry> {
    let mut entries: Vec<LeaderboardEntry> = ROSTER
        .iter()
        .map(|member| match state.player(member.id) {
            Some(player) => LeaderboardEntry {
                id: member.id.to_string(),
                name: player.name.clone(),
                avatar: player.avatar,
                coins: player.coins,
                total_coins_earned: player.total_coins_earned,
                completed: player.completed_count(),
            },
            None => LeaderboardEntry {
                id: member.id.to_string(),
                name: member.name.to_string(),
                avatar: AvatarId::default(),
                coins: 0,
                total_coins_earned: 0,
                completed: 0,
            },
        })
        .collect();
    entries.sort_by(|a, b| b.coins.cmp(&a.coins));
    entries
}

// ============================================================================
// Weekly achievements
// ============================================================================

pub const PROBLEM_SOLVER: &str = "Problem Solver";
pub const MASTER_CODER: &str = "Master Coder";
pub const COIN_COLLECTOR: &str = "Coin Collector";
pub const TREASURE_HUNTER: &str = "Treasure Hunter";
pub const LEVEL_MASTER: &str = "Level Master";
pub const DEDICATED_LEARNER: &str = "Dedicated Learner";
pub const STUDY_CHAMPION: &str = "Study Champion";

/// Achievement labels earned for a week. Thresholds are independent, so
/// several can fire at once.
pub fn weekly_achievements(
    problems_completed: usize,
    coins: u64,
    levels_unlocked: usize,
    elapsed_seconds: u64,
) -> Vec<String> {
    let rules: [(bool, &str); 7] = [
        (problems_completed >= 10, PROBLEM_SOLVER),
        (problems_completed >= 20, MASTER_CODER),
        (coins >= 50, COIN_COLLECTOR),
        (coins >= 100, TREASURE_HUNTER),
        (levels_unlocked >= 5, LEVEL_MASTER),
        (elapsed_seconds > 3600, DEDICATED_LEARNER),
        (elapsed_seconds > 7200, STUDY_CHAMPION),
    ];
    rules
        .iter()
        .filter(|(earned, _)| *earned)
        .map(|(_, label)| label.to_string())
        .collect()
}

// ============================================================================
// Map progress
// ============================================================================

/// Share of the catalog's problems completed, rounded to a whole percent.
pub fn player_progress_percent(player: &Player) -> u32 {
    let total = total_problems();
    if total == 0 {
        return 0;
    }
    ((player.completed_count() as f64 / total as f64) * 100.0).round() as u32
}

pub fn map_position(player: &Player) -> usize {
    player.completed_count().min(MAP_LAST_POSITION)
}

// ============================================================================
// Weekly recap
// ============================================================================

pub fn latest_week(player: &Player) -> Option<&WeeklyProgress> {
    player.weekly_progress.last()
}

/// Week by 1-based number as shown in the recap ("Week 1" is the oldest).
pub fn week_by_number(player: &Player, number: usize) -> Option<&WeeklyProgress> {
    number
        .checked_sub(1)
        .and_then(|index| player.weekly_progress.get(index))
}

pub fn week_count(player: &Player) -> usize {
    player.weekly_progress.len()
}

/// "Xh Ym" as used in recap summaries.
pub fn format_duration_hm(seconds: u64) -> String {
    format!("{}h {}m", seconds / 3600, (seconds % 3600) / 60)
}

/// Timer display: "MM:SS", or "H:MM:SS" once past an hour.
pub fn format_clock(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{:02}:{:02}", minutes, secs)
    }
}

pub fn format_recap(week: &WeeklyProgress, number: usize) -> String {
    let start = week.week_start_date.get(..10).unwrap_or(&week.week_start_date);
    let end = week.week_end_date.get(..10).unwrap_or(&week.week_end_date);
    let mut out = format!("Week {} ({} - {})\n", number, start, end);
    out.push_str(&format!(
        "  coins {} | problems {} | time {} | achievements {}\n",
        week.coins_earned,
        week.problems_completed.len(),
        format_duration_hm(week.time_spent),
        week.achievements.len()
    ));
    if !week.achievements.is_empty() {
        out.push_str(&format!("  earned: {}\n", week.achievements.join(", ")));
    }
    if week.levels_unlocked.is_empty() {
        out.push_str("  no new levels unlocked this week\n");
    } else {
        out.push_str(&format!("  levels: {}\n", week.levels_unlocked.join(", ")));
    }
    out
}
