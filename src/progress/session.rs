//! Session-local controls: the study timer and the music switch.
//!
//! Neither is persisted. The timer's elapsed seconds are handed to
//! `weekly_reset` explicitly, the music flag never touches progression.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::debug;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

const TICK: Duration = Duration::from_secs(1);

/// Seconds counter advanced by a tokio interval task while running.
///
/// Missed ticks are skipped rather than replayed, so a stalled runtime never
/// produces a burst of increments. Starting outside a tokio runtime is
/// refused.
#[derive(Debug, Default)]
pub struct SessionTimer {
    elapsed: Arc<AtomicU64>,
    task: Option<JoinHandle<()>>,
}

impl SessionTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn elapsed(&self) -> u64 {
        self.elapsed.load(Ordering::Relaxed)
    }

    pub fn is_running(&self) -> bool {
        self.task.is_some()
    }

    /// Start counting. Returns whether the timer is running afterwards, which
    /// is `false` only when no tokio runtime is available.
    pub fn start(&mut self) -> bool {
        if self.task.is_some() {
            return true;
        }
        let Ok(handle) = Handle::try_current() else {
            debug!("timer not started: no tokio runtime");
            return false;
        };
        let elapsed = Arc::clone(&self.elapsed);
        self.task = Some(handle.spawn(async move {
            let mut ticks = interval_at(Instant::now() + TICK, TICK);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticks.tick().await;
                elapsed.fetch_add(1, Ordering::Relaxed);
            }
        }));
        debug!("timer started at {}s", self.elapsed());
        true
    }

    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            debug!("timer paused at {}s", self.elapsed());
        }
    }

    /// Flip running/paused. Returns whether the timer is now running.
    pub fn toggle(&mut self) -> bool {
        if self.is_running() {
            self.stop();
        } else {
            self.start();
        }
        self.is_running()
    }

    /// Stop and zero the counter.
    pub fn reset(&mut self) {
        self.stop();
        self.elapsed.store(0, Ordering::Relaxed);
    }
}

impl Drop for SessionTimer {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MusicToggle {
    playing: bool,
}

impl MusicToggle {
    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn toggle(&mut self) -> bool {
        self.playing = !self.playing;
        self.playing
    }
}
