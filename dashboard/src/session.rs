//! Event loop tying the controller, the poller and the data source together.
//!
//! Fetches run as spawned tasks and report back over a channel, so the loop
//! keeps handling commands and countdown ticks while a page or a KPI sweep is
//! in flight.  All state changes happen on the loop, one event at a time.

use std::sync::Arc;

use chrono::Utc;
use streamstats::{
    compute_global_aggregates, fetch_query, FetchOutcome, GlobalAggregates, SortOrder,
    StreamQuery, StreamSource,
};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::command::{Command, HELP};
use crate::controller::ViewController;
use crate::poller::{PollEvent, PollKind, Poller};
use crate::view::FilterPatch;

/// Completed background work.
#[derive(Debug)]
enum Fetched {
    Page { query: StreamQuery, outcome: FetchOutcome },
    Aggregates(GlobalAggregates),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

pub struct Session {
    controller: ViewController,
    source: Arc<dyn StreamSource>,
    poller: Poller,
    poll_rx: mpsc::UnboundedReceiver<PollEvent>,
    results_tx: mpsc::UnboundedSender<Fetched>,
    results_rx: mpsc::UnboundedReceiver<Fetched>,
    notice: Option<String>,
}

impl Session {
    pub fn new(controller: ViewController, source: Arc<dyn StreamSource>) -> Self {
        let (poll_tx, poll_rx) = mpsc::unbounded_channel();
        let (results_tx, results_rx) = mpsc::unbounded_channel();
        let poller = Poller::new(controller.config().poll_interval_secs, poll_tx);
        Self {
            controller,
            source,
            poller,
            poll_rx,
            results_tx,
            results_rx,
            notice: None,
        }
    }

    pub fn controller(&self) -> &ViewController {
        &self.controller
    }

    /// One-line message for the user (help text, errors, the share URL).
    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    /// First load plus the KPI sweep; arms the poller if polling is on.
    pub fn start(&mut self) {
        if self.controller.is_polling() {
            self.poller.enable();
        }
        self.load(false);
        self.sweep_if_stale();
    }

    // -------------------------------------------------------------- //
    //  Commands                                                       //
    // -------------------------------------------------------------- //

    pub fn handle_line(&mut self, line: &str) -> Flow {
        match line.parse::<Command>() {
            Ok(cmd) => self.handle_command(cmd),
            Err(e) => {
                self.notice = Some(e.to_string());
                Flow::Continue
            }
        }
    }

    pub fn handle_command(&mut self, cmd: Command) -> Flow {
        self.notice = None;
        debug!(?cmd, "command");

        match cmd {
            Command::Next => {
                self.controller.next_page();
            }
            Command::Prev => {
                self.controller.prev_page();
            }
            Command::Page(n) => {
                if !self.controller.go_to_page(n) {
                    self.notice = Some(format!("no page {n}"));
                }
            }
            Command::Sort(key, None) => {
                self.controller.toggle_sort(key);
            }
            Command::Sort(key, Some(order)) => {
                self.controller.set_filters(FilterPatch {
                    sort_by: Some(key),
                    sort_order: Some(order),
                    ..FilterPatch::default()
                });
            }
            Command::Order => {
                let flipped: SortOrder = self.controller.filters().sort_order.flipped();
                self.controller.set_filters(FilterPatch::sort_order(flipped));
            }
            Command::Limit(n) => {
                self.controller.set_filters(FilterPatch::limit(n));
            }
            Command::Search(text) => {
                self.controller.set_filters(FilterPatch::search(text));
            }
            Command::Poll(enabled) => {
                self.set_polling(enabled);
                return Flow::Continue;
            }
            Command::Visible(visible) => {
                self.poller.set_visible(visible);
                return Flow::Continue;
            }
            Command::Refresh => {
                self.load(true);
                self.sweep_if_stale();
                return Flow::Continue;
            }
            Command::ShowUrl => {
                self.notice = Some(format!("?{}", self.controller.filters().to_query_string()));
                return Flow::Continue;
            }
            Command::Help => {
                self.notice = Some(HELP.to_string());
                return Flow::Continue;
            }
            Command::Quit => return Flow::Quit,
        }

        // filters may have moved; the cache decides whether this hits the network
        self.load(false);
        Flow::Continue
    }

    fn set_polling(&mut self, enabled: bool) {
        self.controller.set_polling(enabled);
        if enabled {
            self.poller.enable();
        } else {
            self.poller.disable();
        }
    }

    // -------------------------------------------------------------- //
    //  Background work                                                //
    // -------------------------------------------------------------- //

    fn load(&mut self, force: bool) {
        let Some(query) = self.controller.request_page(force, Instant::now()) else {
            return;
        };
        let source = Arc::clone(&self.source);
        let tx = self.results_tx.clone();
        tokio::spawn(async move {
            let outcome = fetch_query(source.as_ref(), query).await;
            let _ = tx.send(Fetched::Page { query, outcome });
        });
    }

    fn sweep_if_stale(&mut self) {
        if !self.controller.request_aggregates(Instant::now()) {
            return;
        }
        info!("starting KPI sweep");
        let source = Arc::clone(&self.source);
        let config = self.controller.config().clone();
        let tx = self.results_tx.clone();
        tokio::spawn(async move {
            let aggregates = compute_global_aggregates(source.as_ref(), &config).await;
            let _ = tx.send(Fetched::Aggregates(aggregates));
        });
    }

    // -------------------------------------------------------------- //
    //  Event pump                                                     //
    // -------------------------------------------------------------- //

    /// Wait for the next poll tick or finished fetch and apply it.
    pub async fn next_event(&mut self) {
        tokio::select! {
            Some(ev) = self.poll_rx.recv() => self.on_poll(ev),
            Some(done) = self.results_rx.recv() => self.on_fetched(done),
        }
    }

    /// Process events until `deadline`.
    pub async fn pump_until(&mut self, deadline: Instant) {
        loop {
            tokio::select! {
                _ = tokio::time::sleep_until(deadline) => return,
                _ = self.next_event() => {}
            }
        }
    }

    /// Drive the session from a stream of input lines, calling `render`
    /// after every change.  Returns when the input ends or on `quit`.
    pub async fn run<F>(&mut self, mut lines: mpsc::Receiver<String>, mut render: F)
    where
        F: FnMut(&Session),
    {
        self.start();
        render(self);

        loop {
            tokio::select! {
                line = lines.recv() => {
                    let Some(line) = line else { break };
                    if self.handle_line(&line) == Flow::Quit {
                        break;
                    }
                }
                _ = self.next_event() => {}
            }
            render(self);
        }
        self.poller.disable();
    }

    fn on_poll(&mut self, ev: PollEvent) {
        if !self.poller.accepts(&ev) {
            return;
        }
        match ev.kind {
            PollKind::Countdown(n) => self.controller.set_countdown(n),
            PollKind::Refetch => {
                debug!("auto refresh");
                self.load(true);
                self.sweep_if_stale();
                self.controller.set_countdown(self.controller.config().poll_interval_secs);
            }
        }
    }

    fn on_fetched(&mut self, done: Fetched) {
        match done {
            Fetched::Page { query, outcome } => {
                self.controller.apply_page(query, outcome, Instant::now(), Utc::now());
            }
            Fetched::Aggregates(aggregates) => {
                self.controller.apply_aggregates(aggregates, Instant::now(), Utc::now());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use streamstats::{FakeStreamSource, SortKey, StatsConfig};

    use super::*;
    use crate::controller::LoadState;

    /// Session with auto refresh switched on, as `--poll` starts it.
    fn session(source: &FakeStreamSource) -> Session {
        let mut controller = ViewController::new(StatsConfig::default());
        controller.set_polling(true);
        Session::new(controller, Arc::new(source.clone()))
    }

    /// Page fetches use the default page size; sweep batches use 50.
    fn page_offsets(source: &FakeStreamSource) -> Vec<u32> {
        source
            .calls()
            .into_iter()
            .filter(|q| q.limit != 50)
            .map(|q| q.offset)
            .collect()
    }

    fn sweeps(source: &FakeStreamSource) -> usize {
        source.calls().iter().filter(|q| q.limit == 50 && q.offset == 0).count()
    }

    async fn pump(s: &mut Session, ms: u64) {
        s.pump_until(Instant::now() + Duration::from_millis(ms)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn polling_refetches_every_interval() {
        let source = FakeStreamSource::with_participants(0..30);
        let mut s = session(&source);
        s.start();

        pump(&mut s, 500).await;
        assert_eq!(page_offsets(&source).len(), 1);
        assert_eq!(s.controller().countdown(), 15);

        pump(&mut s, 15_000).await;
        assert_eq!(page_offsets(&source).len(), 2);
        assert_eq!(s.controller().countdown(), 15);

        pump(&mut s, 15_000).await;
        assert_eq!(page_offsets(&source).len(), 3);
        // the KPI sweep is still fresh
        assert_eq!(sweeps(&source), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn default_session_loads_once_without_polling() {
        let source = FakeStreamSource::with_participants(0..30);
        let mut s = Session::new(
            ViewController::new(StatsConfig::default()),
            Arc::new(source.clone()),
        );
        s.start();
        assert!(!s.poller.is_enabled());

        pump(&mut s, 60_000).await;
        assert_eq!(page_offsets(&source).len(), 1);
        assert_eq!(sweeps(&source), 1);

        s.handle_command(Command::Poll(true));
        pump(&mut s, 15_500).await;
        assert_eq!(page_offsets(&source).len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn disabling_polling_stops_network_calls() {
        let source = FakeStreamSource::with_participants(0..30);
        let mut s = session(&source);
        s.start();

        pump(&mut s, 10_500).await;
        assert_eq!(s.controller().countdown(), 5);
        s.handle_command(Command::Poll(false));

        pump(&mut s, 60_000).await;
        assert_eq!(page_offsets(&source).len(), 1);
        assert!(!s.controller().is_polling());
        assert_eq!(s.controller().countdown(), 15);
    }

    #[tokio::test(start_paused = true)]
    async fn hidden_view_does_not_poll() {
        let source = FakeStreamSource::with_participants(0..30);
        let mut s = session(&source);
        s.start();

        pump(&mut s, 5_500).await;
        s.handle_command(Command::Visible(false));
        pump(&mut s, 60_000).await;
        assert_eq!(page_offsets(&source).len(), 1);

        s.handle_command(Command::Visible(true));
        pump(&mut s, 10_500).await;
        assert_eq!(page_offsets(&source).len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn late_result_does_not_replace_newer_view() {
        let source = FakeStreamSource::with_participants(0..45).with_latency(Duration::from_secs(2));
        let mut s = session(&source);
        s.start();
        pump(&mut s, 2_500).await;
        assert_eq!(s.controller().state(), &LoadState::Loaded);

        s.handle_command(Command::Next);
        s.handle_command(Command::Prev);
        assert_eq!(s.controller().current_page().unwrap().offset, 0);

        pump(&mut s, 3_000).await;
        assert_eq!(page_offsets(&source), vec![0, 20]);
        assert_eq!(s.controller().filters().offset, 0);
        assert_eq!(s.controller().current_page().unwrap().offset, 0);
        assert_eq!(s.controller().state(), &LoadState::Loaded);
    }

    #[tokio::test(start_paused = true)]
    async fn revisiting_a_page_uses_the_cache_while_fresh() {
        let source = FakeStreamSource::with_participants(0..45);
        let mut s = session(&source);
        s.start();
        pump(&mut s, 500).await;

        s.handle_command(Command::Next);
        pump(&mut s, 500).await;
        s.handle_command(Command::Prev);
        pump(&mut s, 500).await;
        assert_eq!(page_offsets(&source), vec![0, 20]);

        pump(&mut s, 10_000).await;
        s.handle_command(Command::Next);
        pump(&mut s, 500).await;
        assert_eq!(page_offsets(&source), vec![0, 20, 20]);
    }

    #[tokio::test(start_paused = true)]
    async fn navigation_never_starts_a_sweep() {
        let source = FakeStreamSource::with_participants(0..45);
        let mut s = session(&source);
        s.start();
        pump(&mut s, 500).await;

        for cmd in [
            Command::Next,
            Command::Page(3),
            Command::Sort(SortKey::CreatedAt, None),
            Command::Limit(10),
            Command::Search("stream".into()),
        ] {
            s.handle_command(cmd);
            pump(&mut s, 500).await;
        }
        assert_eq!(sweeps(&source), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn share_url_and_bad_input_notices() {
        let source = FakeStreamSource::default();
        let mut s = session(&source);

        s.handle_command(Command::Sort(SortKey::CreatedAt, Some(SortOrder::Asc)));
        s.handle_command(Command::ShowUrl);
        assert_eq!(
            s.notice(),
            Some("?sortBy=created_at&sortOrder=ASC&limit=20&offset=0")
        );

        assert_eq!(s.handle_line("dance"), Flow::Continue);
        assert!(s.notice().unwrap().contains("unknown command"));
    }

    #[tokio::test(start_paused = true)]
    async fn run_stops_on_quit() {
        let source = FakeStreamSource::with_participants(0..5);
        let mut s = session(&source);
        let (tx, rx) = mpsc::channel(4);
        tx.send("sort created_at".to_string()).await.unwrap();
        tx.send("q".to_string()).await.unwrap();

        let mut frames = 0;
        s.run(rx, |_| frames += 1).await;

        assert!(frames >= 2);
        assert_eq!(s.controller().filters().sort_by, SortKey::CreatedAt);
        assert!(!s.poller.is_enabled());
    }
}
