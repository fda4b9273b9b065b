//! Auto-refresh scheduler.
//!
//! One spawned task drives both the 1 Hz countdown and the refetch trigger
//! off a single ticker, so they cannot drift apart or be cancelled
//! separately.  Disabling aborts the task and bumps the epoch; any event
//! already queued from the old task is then rejected by [`Poller::accepts`].
//!
//! While the view is hidden the task parks on the visibility channel and
//! resumes with the countdown where it left off.

use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::debug;

const TICK: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollKind {
    /// Seconds left until the next refetch.
    Countdown(u64),
    Refetch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollEvent {
    pub epoch: u64,
    pub kind: PollKind,
}

pub struct Poller {
    interval_secs: u64,
    tx: mpsc::UnboundedSender<PollEvent>,
    visible: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
    epoch: u64,
}

impl Poller {
    pub fn new(interval_secs: u64, tx: mpsc::UnboundedSender<PollEvent>) -> Self {
        let (visible, _) = watch::channel(true);
        Self {
            interval_secs: interval_secs.max(1),
            tx,
            visible,
            task: None,
            epoch: 0,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.task.is_some()
    }

    /// (Re)start the countdown from the full interval.
    pub fn enable(&mut self) {
        self.stop();
        self.epoch += 1;

        let task = run(
            self.epoch,
            self.interval_secs,
            self.tx.clone(),
            self.visible.subscribe(),
        );
        self.task = Some(tokio::spawn(task));
        debug!(epoch = self.epoch, "poller enabled");
    }

    /// Stop immediately.  No event from the previous task is accepted after
    /// this returns.
    pub fn disable(&mut self) {
        self.stop();
        self.epoch += 1;
        debug!(epoch = self.epoch, "poller disabled");
    }

    pub fn set_visible(&self, visible: bool) {
        self.visible.send_if_modified(|v| {
            let changed = *v != visible;
            *v = visible;
            changed
        });
    }

    /// `true` if `event` came from the task that is currently running.
    pub fn accepts(&self, event: &PollEvent) -> bool {
        self.task.is_some() && event.epoch == self.epoch
    }

    fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run(
    epoch: u64,
    interval_secs: u64,
    tx: mpsc::UnboundedSender<PollEvent>,
    mut visible: watch::Receiver<bool>,
) {
    let mut remaining = interval_secs;
    let mut ticker = time::interval_at(Instant::now() + TICK, TICK);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let send = |kind| tx.send(PollEvent { epoch, kind }).is_ok();

    loop {
        let shown = *visible.borrow_and_update();
        if !shown {
            debug!(remaining, "poller suspended");
            let resumed = visible.wait_for(|v| *v).await.is_ok();
            if !resumed {
                return;
            }
            ticker.reset();
        }

        tokio::select! {
            _ = ticker.tick() => {}
            changed = visible.changed() => {
                if changed.is_err() {
                    return;
                }
                continue;
            }
        }

        remaining -= 1;
        if remaining == 0 {
            if !send(PollKind::Countdown(0)) || !send(PollKind::Refetch) {
                return;
            }
            remaining = interval_secs;
        } else if !send(PollKind::Countdown(remaining)) {
            return;
        }
    }
}
