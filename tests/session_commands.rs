//! Scripted command sessions against a JSON-backed engine.

mod common;

use common::json_engine;
use tempfile::TempDir;
use usaco_treasure::progress::GameSession;

fn run(session: &mut GameSession, script: &[&str]) -> Vec<String> {
    script.iter().map(|line| session.process_command(line)).collect()
}

#[test]
fn a_week_of_play() {
    let dir = TempDir::new().expect("tempdir");
    let mut session = GameSession::new(json_engine(dir.path()));

    let replies = run(
        &mut session,
        &[
            "complete 1-impl-1",
            "complete 1-impl-2",
            "complete 2A-bf-1",
            "complete 2A-bf-2",
            "open 2A",
            "trade chips",
            "inventory",
        ],
    );
    assert!(replies[1].contains("Unlocked level 2A, 2B"), "{}", replies[1]);
    assert!(replies[2].contains("+2 coins"), "{}", replies[2]);
    assert!(replies[4].contains("Map Fragment 2A"));
    assert_eq!(replies[5], "Bought Bag of Chips for 5 coins. 1 coins left.");
    assert!(replies[6].contains("Bag of Chips"));
    assert!(replies[6].contains("Map Fragment 2A"));

    let weekly = session.process_command("weekly");
    assert!(weekly.starts_with("New week started for Gilbert."), "{}", weekly);
    assert!(session.process_command("recap").contains("problems 4"));
    assert!(session.process_command("inventory").contains("empty"));
}

#[test]
fn progress_is_visible_to_the_next_session() {
    let dir = TempDir::new().expect("tempdir");
    {
        let mut session = GameSession::new(json_engine(dir.path()));
        run(&mut session, &["switch brian", "avatar knight", "complete 1-impl-1"]);
    }
    let mut session = GameSession::new(json_engine(dir.path()));
    let status = session.process_command("status");
    assert!(status.contains("Brian the Knight"), "{}", status);
    assert!(status.contains("Coins: 1 (lifetime 1)"), "{}", status);
    let board = session.process_command("leaderboard");
    assert!(board.contains("*1."), "{}", board);
}

#[test]
fn help_and_unknown_input() {
    let dir = TempDir::new().expect("tempdir");
    let mut session = GameSession::new(json_engine(dir.path()));
    assert!(session.process_command("HELP").contains("RESET-STUDENT"));
    assert_eq!(session.process_command(""), "Type HELP for commands.");
    assert!(session
        .process_command("fly away")
        .starts_with("Unknown command 'fly away'"));
    assert_eq!(session.process_command("sell"), "Usage: SELL <item-id>");
}
