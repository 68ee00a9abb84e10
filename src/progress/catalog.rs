//! Read-only game content: level catalog, unlock thresholds, the roster
//! template and avatar metadata. Nothing in here is ever mutated at runtime.

use crate::progress::types::AvatarId;

/// Player that `currentPlayer` falls back to when it no longer resolves.
pub const FALLBACK_PLAYER_ID: &str = "gilbert";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Problem {
    pub id: &'static str,
    pub title: &'static str,
    pub prompt: &'static str,
}

const fn problem(id: &'static str, title: &'static str, prompt: &'static str) -> Problem {
    Problem { id, title, prompt }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelConfig {
    pub id: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub coin_reward_per_problem: u64,
    /// Lifetime coins required before the level unlocks
    pub unlock_threshold: u64,
    pub problems: &'static [Problem],
}

impl LevelConfig {
    /// Numeric group of the level id ("2A" and "2B" both belong to "2").
    pub fn group(&self) -> &'static str {
        level_group(self.id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RosterEntry {
    pub id: &'static str,
    pub name: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AvatarInfo {
    pub emoji: &'static str,
    pub name: &'static str,
    pub description: &'static str,
}

/// Fixed roster. Adding a member here makes the migrator insert them into
/// existing snapshots on next load.
pub static ROSTER: &[RosterEntry] = &[
    RosterEntry { id: "gilbert", name: "Gilbert" },
    RosterEntry { id: "grace", name: "Grace" },
    RosterEntry { id: "brian", name: "Brian" },
    RosterEntry { id: "eric", name: "Eric" },
];

pub static LEVELS: &[LevelConfig] = &[
    LevelConfig {
        id: "1",
        title: "Level 1 — Implementation",
        description: "Warm up with straightforward IO, loops, and arrays.",
        coin_reward_per_problem: 1,
        unlock_threshold: 0,
        problems: &[
            problem("1-impl-1", "Basic IO Practice", "Simulate reading input and printing output."),
            problem("1-impl-2", "Loop Mechanics", "Iterate through values and aggregate totals."),
            problem("1-impl-3", "Array Basics", "Indexing and simple transformations."),
        ],
    },
    LevelConfig {
        id: "2A",
        title: "Level 2A — Brute Force",
        description: "Try all possibilities within constraints.",
        coin_reward_per_problem: 2,
        unlock_threshold: 2,
        problems: &[
            problem("2A-bf-1", "Try-All Pairs", "Enumerate all pairs and count matches."),
            problem("2A-bf-2", "Triple Nesting", "Tight loops with pruning."),
            problem(
                "2A-bf-3",
                "State Enumeration",
                "Check every configuration in small search space.",
            ),
        ],
    },
    LevelConfig {
        id: "2B",
        title: "Level 2B — Greedy",
        description: "Pick the best local choice and prove correctness.",
        coin_reward_per_problem: 2,
        unlock_threshold: 2,
        problems: &[
            problem("2B-greedy-1", "Interval Selection", "Choose non-overlapping intervals."),
            problem("2B-greedy-2", "Coin Change (Greedy)", "Use canonical coin systems."),
            problem("2B-greedy-3", "Sorting then Sweep", "Greedy orderings with sorting."),
        ],
    },
    LevelConfig {
        id: "3A",
        title: "Level 3A — Sorting",
        description: "Master comparator logic and stable sorts.",
        coin_reward_per_problem: 3,
        unlock_threshold: 3,
        problems: &[
            problem("3A-sort-1", "Custom Comparator", "Sort by multiple keys."),
            problem("3A-sort-2", "Bucket/Counting", "Use frequency counts."),
            problem("3A-sort-3", "Sweep Line Prep", "Sort then scan."),
        ],
    },
    LevelConfig {
        id: "3B",
        title: "Level 3B — Searching",
        description: "Linear and binary search patterns.",
        coin_reward_per_problem: 3,
        unlock_threshold: 3,
        problems: &[
            problem("3B-search-1", "Lower/Upper Bound", "Locate positions efficiently."),
            problem("3B-search-2", "Two Pointers", "Move endpoints to meet in the middle."),
            problem("3B-search-3", "Prefix Check", "Use prefix sums to prune search ranges."),
        ],
    },
    LevelConfig {
        id: "4",
        title: "Level 4 — Simulation & Ad Hoc",
        description: "Carefully simulate events and handle edge-cases.",
        coin_reward_per_problem: 4,
        unlock_threshold: 4,
        problems: &[
            problem("4-sim-1", "Event Timeline", "Simulate arrivals and departures."),
            problem("4-sim-2", "Grid Simulation", "Update cells over steps."),
            problem("4-sim-3", "Corner Cases Galore", "Handle diverse inputs robustly."),
        ],
    },
    LevelConfig {
        id: "5",
        title: "Level 5 — Final Stage (Binary Search & DP)",
        description: "Put it all together with binary search on answer and basic DP.",
        coin_reward_per_problem: 5,
        unlock_threshold: 5,
        problems: &[
            problem("5-final-1", "Binary Search on Answer", "Monotonic predicate + bisect."),
            problem("5-final-2", "1D DP", "Classic state transitions."),
            problem("5-final-3", "Knapsack Lite", "Optimize under constraints."),
        ],
    },
];

pub fn level(level_id: &str) -> Option<&'static LevelConfig> {
    LEVELS.iter().find(|level| level.id.eq_ignore_ascii_case(level_id))
}

/// Unlock threshold for a level id, `None` for ids outside the catalog.
pub fn unlock_threshold(level_id: &str) -> Option<u64> {
    level(level_id).map(|level| level.unlock_threshold)
}

/// Locate a problem and the level that owns it.
pub fn find_problem(problem_id: &str) -> Option<(&'static LevelConfig, &'static Problem)> {
    LEVELS.iter().find_map(|level| {
        level
            .problems
            .iter()
            .find(|problem| problem.id.eq_ignore_ascii_case(problem_id))
            .map(|problem| (level, problem))
    })
}

/// Strip a trailing letter suffix from a level id.
pub fn level_group(level_id: &str) -> &str {
    level_id.trim_end_matches(|c: char| c.is_ascii_alphabetic())
}

pub fn total_problems() -> usize {
    LEVELS.iter().map(|level| level.problems.len()).sum()
}

pub fn roster_name(player_id: &str) -> Option<&'static str> {
    ROSTER
        .iter()
        .find(|entry| entry.id == player_id)
        .map(|entry| entry.name)
}

pub fn avatar_info(avatar: AvatarId) -> AvatarInfo {
    match avatar {
        AvatarId::Pirate => AvatarInfo {
            emoji: "🏴‍☠️",
            name: "Pirate",
            description: "Sea-faring treasure hunter",
        },
        AvatarId::Explorer => AvatarInfo {
            emoji: "🧭",
            name: "Explorer",
            description: "Map-reading adventurer",
        },
        AvatarId::Knight => AvatarInfo {
            emoji: "⚔️",
            name: "Knight",
            description: "Noble treasure protector",
        },
        AvatarId::Wizard => AvatarInfo {
            emoji: "🔮",
            name: "Wizard",
            description: "Magical artifact seeker",
        },
        AvatarId::Archer => AvatarInfo {
            emoji: "🏹",
            name: "Archer",
            description: "Precise treasure tracker",
        },
        AvatarId::Ninja => AvatarInfo {
            emoji: "🥷",
            name: "Ninja",
            description: "Stealthy treasure hunter",
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_order_and_thresholds() {
        let ids: Vec<_> = LEVELS.iter().map(|l| l.id).collect();
        assert_eq!(ids, ["1", "2A", "2B", "3A", "3B", "4", "5"]);
        assert_eq!(unlock_threshold("1"), Some(0));
        assert_eq!(unlock_threshold("2b"), Some(2));
        assert_eq!(unlock_threshold("3A"), Some(3));
        assert_eq!(unlock_threshold("5"), Some(5));
        assert_eq!(unlock_threshold("6"), None);
    }

    #[test]
    fn groups_strip_letter_suffix() {
        assert_eq!(level_group("2A"), "2");
        assert_eq!(level_group("3B"), "3");
        assert_eq!(level_group("4"), "4");
        assert_eq!(level("2A").map(|l| l.group()), Some("2"));
    }

    #[test]
    fn problem_lookup_returns_owning_level() {
        let (level, problem) = find_problem("3B-search-2").expect("known problem");
        assert_eq!(level.id, "3B");
        assert_eq!(level.coin_reward_per_problem, 3);
        assert_eq!(problem.title, "Two Pointers");
        assert!(find_problem("9-nope").is_none());
        assert_eq!(total_problems(), 21);
    }

    #[test]
    fn roster_names() {
        assert_eq!(roster_name("eric"), Some("Eric"));
        assert_eq!(roster_name("zed"), None);
        assert_eq!(avatar_info(AvatarId::Wizard).name, "Wizard");
    }
}
