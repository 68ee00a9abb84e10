//! Text command parsing and dispatch.
//!
//! [`GameSession`] bundles the progression engine with the session-local
//! timer and music switch and turns one line of user input into one reply.
//! Verbs are case-insensitive; arguments keep their case because inventory
//! item ids are matched exactly.
//!
//! The command layer is also where catalog gating lives: `complete` and
//! `open` look the level up and refuse locked levels before the engine is
//! asked to change anything.

use log::debug;

use crate::logutil::escape_log;
use crate::progress::catalog::{avatar_info, find_problem, level, roster_name, LevelConfig};
use crate::progress::engine::ProgressionEngine;
use crate::progress::session::{MusicToggle, SessionTimer};
use crate::progress::shop::{
    format_shop_listing, item_label, price, purchase_block, sell_price, PurchaseBlock, SHOP_ITEMS,
};
use crate::progress::types::{AvatarId, ItemType, Player};
use crate::progress::views::{
    format_clock, format_recap, is_level_unlocked, latest_week, level_groups, map_position,
    player_progress_percent, unlocked_level_ids, week_by_number, week_count, MAP_LAST_POSITION,
};

/// Parsed form of one input line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameCommand {
    // Progress
    Complete(String), // COMPLETE 1-impl-1
    Open(String),     // OPEN 2A

    // Shop and inventory
    Trade(String),  // TRADE lunch
    Sell(String),   // SELL <item id>
    Redeem(String), // REDEEM <item id>
    Shop,
    Inventory,

    // Players
    Switch(String),       // SWITCH grace
    Avatar(String),       // AVATAR wizard
    Reset,                // RESET - wipe everyone
    ResetStudent(String), // RESET-STUDENT grace
    Weekly(Option<String>),

    // Information
    Status,
    Levels,
    Leaderboard,
    Recap(Option<usize>),

    // Session
    Timer,
    TimerReset,
    Music,
    Help,
    Quit,

    /// Known verb with missing or malformed arguments
    Usage(&'static str),
    Unknown(String),
}

/// Parse one line of input. Never fails; bad input maps to `Usage` or `Unknown`.
pub fn parse_command(input: &str) -> GameCommand {
    let parts: Vec<&str> = input.split_whitespace().collect();
    let Some(verb) = parts.first() else {
        return GameCommand::Unknown(String::new());
    };
    let arg = parts.get(1).map(|s| s.to_string());
    let verb = verb.to_ascii_lowercase();

    match verb.as_str() {
        "complete" | "c" => arg.map_or(
            GameCommand::Usage("Usage: COMPLETE <problem-id>"),
            GameCommand::Complete,
        ),
        "open" | "o" => arg.map_or(GameCommand::Usage("Usage: OPEN <level>"), GameCommand::Open),
        "trade" | "buy" => {
            arg.map_or(GameCommand::Usage("Usage: TRADE <item-type>"), GameCommand::Trade)
        }
        "sell" => arg.map_or(GameCommand::Usage("Usage: SELL <item-id>"), GameCommand::Sell),
        "redeem" => arg.map_or(GameCommand::Usage("Usage: REDEEM <item-id>"), GameCommand::Redeem),
        "switch" => arg.map_or(GameCommand::Usage("Usage: SWITCH <player>"), |id| {
            GameCommand::Switch(id.to_ascii_lowercase())
        }),
        "avatar" => arg.map_or(GameCommand::Usage("Usage: AVATAR <name>"), GameCommand::Avatar),
        "reset" => GameCommand::Reset,
        "reset-student" => arg.map_or(GameCommand::Usage("Usage: RESET-STUDENT <player>"), |id| {
            GameCommand::ResetStudent(id.to_ascii_lowercase())
        }),
        "weekly" => GameCommand::Weekly(arg.map(|id| id.to_ascii_lowercase())),
        "status" | "s" => GameCommand::Status,
        "inventory" | "inv" | "i" => GameCommand::Inventory,
        "levels" | "l" => GameCommand::Levels,
        "leaderboard" | "lb" => GameCommand::Leaderboard,
        "recap" => match arg {
            None => GameCommand::Recap(None),
            Some(n) => match n.parse::<usize>() {
                Ok(n) if n > 0 => GameCommand::Recap(Some(n)),
                _ => GameCommand::Usage("Usage: RECAP [week-number]"),
            },
        },
        "shop" => GameCommand::Shop,
        "timer" => match arg.as_deref().map(str::to_ascii_lowercase).as_deref() {
            None => GameCommand::Timer,
            Some("reset") => GameCommand::TimerReset,
            Some(_) => GameCommand::Usage("Usage: TIMER [reset]"),
        },
        "music" => GameCommand::Music,
        "help" | "h" | "?" => GameCommand::Help,
        "quit" | "q" | "exit" => GameCommand::Quit,
        _ => GameCommand::Unknown(parts.join(" ")),
    }
}

const HELP_TEXT: &str = "\
Commands:
  COMPLETE <problem>     solve a problem in an unlocked level
  OPEN <level>           open a level's treasure chest
  TRADE <item>           buy chips, chips-limited, soda, soda-limited or lunch
  SELL <item-id>         sell an inventory item back for half price
  REDEEM <item-id>       redeem an inventory item
  SHOP | INVENTORY       browse the market or your items
  SWITCH <player>        change the active player
  AVATAR <name>          pirate, explorer, knight, wizard, archer, ninja
  STATUS | LEVELS | LEADERBOARD
  RECAP [week]           weekly summaries
  WEEKLY [player]        archive this week and start a new one
  RESET | RESET-STUDENT <player>
  TIMER [reset] | MUSIC | HELP | QUIT";

/// One interactive session over a loaded engine.
pub struct GameSession {
    engine: ProgressionEngine,
    timer: SessionTimer,
    music: MusicToggle,
    finished: bool,
}

impl GameSession {
    pub fn new(engine: ProgressionEngine) -> Self {
        Self {
            engine,
            timer: SessionTimer::new(),
            music: MusicToggle::default(),
            finished: false,
        }
    }

    pub fn engine(&self) -> &ProgressionEngine {
        &self.engine
    }

    pub fn timer(&self) -> &SessionTimer {
        &self.timer
    }

    /// Set once QUIT has been processed.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Process one input line and return the reply text.
    pub fn process_command(&mut self, input: &str) -> String {
        let command = parse_command(input);
        debug!("command input='{}' parsed={:?}", escape_log(input), command);

        match command {
            GameCommand::Complete(problem_id) => self.handle_complete(&problem_id),
            GameCommand::Open(level_id) => self.handle_open(&level_id),
            GameCommand::Trade(name) => self.handle_trade(&name),
            GameCommand::Sell(item_id) => self.handle_sell(&item_id),
            GameCommand::Redeem(item_id) => self.handle_redeem(&item_id),
            GameCommand::Shop => format_shop_listing(&self.engine.current_player()),
            GameCommand::Inventory => format_inventory(&self.engine.current_player()),
            GameCommand::Switch(player_id) => self.handle_switch(&player_id),
            GameCommand::Avatar(name) => self.handle_avatar(&name),
            GameCommand::Reset => {
                self.engine.reset_progress();
                "All progress has been reset.".to_string()
            }
            GameCommand::ResetStudent(player_id) => self.handle_reset_student(&player_id),
            GameCommand::Weekly(player_id) => self.handle_weekly(player_id),
            GameCommand::Status => self.format_status(),
            GameCommand::Levels => format_levels(&self.engine.current_player()),
            GameCommand::Leaderboard => self.format_leaderboard(),
            GameCommand::Recap(number) => self.handle_recap(number),
            GameCommand::Timer => self.handle_timer(),
            GameCommand::TimerReset => {
                self.timer.reset();
                "Timer reset to 00:00.".to_string()
            }
            GameCommand::Music => {
                if self.music.toggle() {
                    "Music on.".to_string()
                } else {
                    "Music off.".to_string()
                }
            }
            GameCommand::Help => HELP_TEXT.to_string(),
            GameCommand::Quit => {
                self.finished = true;
                "Goodbye! Progress is saved.".to_string()
            }
            GameCommand::Usage(usage) => usage.to_string(),
            GameCommand::Unknown(text) if text.is_empty() => "Type HELP for commands.".to_string(),
            GameCommand::Unknown(text) => {
                format!("Unknown command '{}'. Type HELP for commands.", text)
            }
        }
    }

    fn handle_complete(&mut self, problem_id: &str) -> String {
        let Some((level, problem)) = find_problem(problem_id) else {
            return format!("No problem '{}'. Type LEVELS to see problem ids.", problem_id);
        };
        let before = self.engine.current_player().total_coins_earned;
        if let Some(refusal) = locked_message(level, before) {
            return refusal;
        }
        let unlocked_before = unlocked_level_ids(before);
        let reward = level.coin_reward_per_problem;
        if !self.engine.complete_problem(problem.id, level.id, reward) {
            return format!("'{}' is already completed. No coins this time.", problem.title);
        }

        let player = self.engine.current_player();
        let mut out = format!(
            "Solved '{}'! +{} {} ({} coins).",
            problem.title,
            reward,
            if reward == 1 { "coin" } else { "coins" },
            player.coins
        );
        let newly: Vec<&str> = unlocked_level_ids(player.total_coins_earned)
            .into_iter()
            .filter(|id| !unlocked_before.contains(id))
            .collect();
        if !newly.is_empty() {
            out.push_str(&format!("\nUnlocked level {}!", newly.join(", ")));
        }
        out
    }

    fn handle_open(&mut self, level_id: &str) -> String {
        let Some(level) = level(level_id) else {
            return format!("No level '{}'. Type LEVELS to list them.", level_id);
        };
        let total = self.engine.current_player().total_coins_earned;
        if let Some(refusal) = locked_message(level, total) {
            return refusal;
        }
        if self.engine.open_box(level.id) {
            format!("You open the chest of level {} and find Map Fragment {}!", level.id, level.id)
        } else {
            format!("The chest of level {} is already open.", level.id)
        }
    }

    fn handle_trade(&mut self, name: &str) -> String {
        let Some(item_type) = ItemType::parse(name) else {
            let names: Vec<&str> = SHOP_ITEMS.iter().map(|t| t.as_str()).collect();
            return format!("No such item '{}'. The shop sells: {}.", name, names.join(", "));
        };
        if let Some(block) = purchase_block(&self.engine.current_player(), item_type) {
            return match block {
                PurchaseBlock::NotForSale => format!("{} cannot be bought.", item_label(item_type)),
                PurchaseBlock::AlreadyPurchased => {
                    format!("{} is limited and you already bought one.", item_label(item_type))
                }
                PurchaseBlock::InsufficientCoins { price, balance } => format!(
                    "{} costs {} coins; you have {}.",
                    item_label(item_type),
                    price,
                    balance
                ),
            };
        }
        if !self.engine.trade(item_type) {
            return format!("Could not buy {}.", item_label(item_type));
        }
        format!(
            "Bought {} for {} coins. {} coins left.",
            item_label(item_type),
            price(item_type).unwrap_or_default(),
            self.engine.current_player().coins
        )
    }

    fn handle_sell(&mut self, item_id: &str) -> String {
        let Some(item) = self.engine.current_player().find_item(item_id).cloned() else {
            return format!("No item '{}' in your inventory.", item_id);
        };
        if !self.engine.sell_item(item_id) {
            return format!("Could not sell '{}'.", item_id);
        }
        format!(
            "Sold {} for {} {}. {} coins now.",
            item.label,
            sell_price(item.item_type),
            if sell_price(item.item_type) == 1 { "coin" } else { "coins" },
            self.engine.current_player().coins
        )
    }

    fn handle_redeem(&mut self, item_id: &str) -> String {
        let Some(item) = self.engine.current_player().find_item(item_id).cloned() else {
            return format!("No item '{}' in your inventory.", item_id);
        };
        if self.engine.redeem_item(item_id) {
            format!("Redeemed {}. Enjoy!", item.label)
        } else {
            format!("Could not redeem '{}'.", item_id)
        }
    }

    fn handle_switch(&mut self, player_id: &str) -> String {
        self.engine.switch_player(player_id);
        match self.engine.state().player(player_id) {
            Some(player) => format!("Now playing as {}.", player.name),
            None => format!(
                "Now playing as {}. A new record starts with the first progress.",
                roster_name(player_id).unwrap_or(player_id)
            ),
        }
    }

    fn handle_avatar(&mut self, name: &str) -> String {
        let Some(avatar) = AvatarId::parse(name) else {
            let names: Vec<&str> = AvatarId::ALL.iter().map(|a| a.as_str()).collect();
            return format!("No avatar '{}'. Choose one of: {}.", name, names.join(", "));
        };
        self.engine.change_avatar(avatar);
        let info = avatar_info(avatar);
        format!("{} You are now a {}: {}.", info.emoji, info.name, info.description)
    }

    fn handle_reset_student(&mut self, player_id: &str) -> String {
        if self.engine.state().player(player_id).is_none() && roster_name(player_id).is_none() {
            return format!("No player '{}'.", player_id);
        }
        self.engine.reset_student_progress(player_id);
        format!("Progress of {} has been reset.", player_id)
    }

    fn handle_weekly(&mut self, player_id: Option<String>) -> String {
        let player_id = match player_id {
            Some(id) => {
                if self.engine.state().player(&id).is_none() && roster_name(&id).is_none() {
                    return format!("No player '{}'.", id);
                }
                id
            }
            None => self.engine.state().current_player.clone(),
        };
        let elapsed = self.timer.elapsed();
        self.engine.weekly_reset(&player_id, elapsed);
        let Some(player) = self.engine.state().player(&player_id) else {
            return format!("Weekly reset done for {}.", player_id);
        };
        match latest_week(player) {
            Some(week) => format!(
                "New week started for {}.\n{}",
                player.name,
                format_recap(week, week_count(player))
            ),
            None => format!("New week started for {}.", player.name),
        }
    }

    fn handle_timer(&mut self) -> String {
        if self.timer.is_running() {
            self.timer.stop();
            return format!("Timer paused at {}.", format_clock(self.timer.elapsed()));
        }
        if self.timer.start() {
            format!("Timer running ({}).", format_clock(self.timer.elapsed()))
        } else {
            "The timer needs a tokio runtime and is not available here.".to_string()
        }
    }

    fn handle_recap(&self, number: Option<usize>) -> String {
        let player = self.engine.current_player();
        let count = week_count(&player);
        if count == 0 {
            return "No weekly recaps yet. Use WEEKLY to close a week.".to_string();
        }
        let number = number.unwrap_or(count);
        match week_by_number(&player, number) {
            Some(week) => format_recap(week, number),
            None => format!("No week {}; recaps run from 1 to {}.", number, count),
        }
    }

    fn format_status(&self) -> String {
        let player = self.engine.current_player();
        let info = avatar_info(player.avatar);
        let unlocked = unlocked_level_ids(player.total_coins_earned);
        format!(
            "{} {} the {}\n\
             Coins: {} (lifetime {})\n\
             Progress: {}% | map square {}/{}\n\
             Levels unlocked: {}\n\
             Items: {} | timer {}{} | music {}",
            info.emoji,
            player.name,
            info.name,
            player.coins,
            player.total_coins_earned,
            player_progress_percent(&player),
            map_position(&player),
            MAP_LAST_POSITION,
            unlocked.join(", "),
            player.inventory.len(),
            format_clock(self.timer.elapsed()),
            if self.timer.is_running() { " (running)" } else { "" },
            if self.music.is_playing() { "on" } else { "off" }
        )
    }

    fn format_leaderboard(&self) -> String {
        let current = &self.engine.state().current_player;
        let mut out = String::from("Leaderboard\n");
        for (rank, entry) in self.engine.leaderboard().iter().enumerate() {
            let marker = if &entry.id == current { '*' } else { ' ' };
            out.push_str(&format!(
                "{}{}. {} {:<10} {:>4} coins  {:>2} solved\n",
                marker,
                rank + 1,
                avatar_info(entry.avatar).emoji,
                entry.name,
                entry.coins,
                entry.completed
            ));
        }
        out
    }
}

fn locked_message(level: &LevelConfig, total_coins_earned: u64) -> Option<String> {
    if is_level_unlocked(level.id, total_coins_earned) {
        return None;
    }
    Some(format!(
        "Level {} is locked: earn {} lifetime coins to unlock it (you have {}).",
        level.id, level.unlock_threshold, total_coins_earned
    ))
}

fn format_inventory(player: &Player) -> String {
    if player.inventory.is_empty() {
        return "Your inventory is empty.".to_string();
    }
    let mut out = format!("{}'s inventory:\n", player.name);
    for item in &player.inventory {
        out.push_str(&format!("  {:<22} {}\n", item.label, item.id));
    }
    out
}

fn format_levels(player: &Player) -> String {
    let mut out = String::new();
    for (group, levels) in level_groups() {
        out.push_str(&format!("== Level {} ==\n", group));
        for level in levels {
            let unlocked = is_level_unlocked(level.id, player.total_coins_earned);
            let chest = if player.has_opened_box(level.id) {
                "chest opened"
            } else if unlocked {
                "chest ready"
            } else {
                "locked"
            };
            out.push_str(&format!(
                "{} [{}c/problem, {}]\n",
                level.title, level.coin_reward_per_problem, chest
            ));
            if !unlocked {
                out.push_str(&format!(
                    "  needs {} lifetime coins ({}/{})\n",
                    level.unlock_threshold, player.total_coins_earned, level.unlock_threshold
                ));
                continue;
            }
            for problem in level.problems {
                let mark = if player.has_completed(problem.id) { 'x' } else { ' ' };
                out.push_str(&format!("  [{}] {:<16} {}\n", mark, problem.id, problem.title));
            }
        }
    }
    out
}
