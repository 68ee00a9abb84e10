//! # USACO Treasure - progression engine for a competitive programming practice game
//!
//! Students solve USACO-style problems grouped into levels. Each solved
//! problem pays coins; lifetime coins unlock further levels, every level has
//! a one-time treasure chest, and coins buy snacks in a small shop. A weekly
//! reset archives the week into a recap and starts fresh.
//!
//! ## Features
//!
//! - **Level catalog**: seven levels in five groups with fixed rewards and unlock thresholds.
//! - **Pure rules**: every operation is a transition from one [`progress::GameState`] to the next.
//! - **Shop and inventory**: limited and unlimited items, half-price buy-back.
//! - **Weekly recaps**: per-week archive with achievements computed from the week's figures.
//! - **Snapshot storage**: JSON file or sled backends behind one trait, with load-time migration.
//! - **Session timer**: tokio interval task feeding study time into the weekly recap.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use usaco_treasure::config::Config;
//! use usaco_treasure::progress::{GameSession, ProgressionEngine};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml").await?;
//!     let store = config.storage.open_store()?;
//!     let engine = ProgressionEngine::load(
//!         store,
//!         config.storage.state_key.clone(),
//!         config.progression.policy(),
//!     );
//!     let mut session = GameSession::new(engine);
//!     println!("{}", session.process_command("complete 1-impl-1"));
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`progress`] - data model, rules, storage, migration and the command layer
//! - [`config`] - configuration loading and backend selection
//! - [`logutil`] - log-safe rendering of user input

pub mod config;
pub mod logutil;
pub mod progress;
