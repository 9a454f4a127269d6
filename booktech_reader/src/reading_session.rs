//! Client side of an open book.
//!
//! A [`ReadingSession`] keeps the local page, pushes every page change to the
//! progress service, polls it for changes made on other devices and
//! periodically reports the reading time.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use booktech_common::clock::now_millis;

use crate::api::{
    BookId, ProgressUpdate, ProgressUpdateOutcome, ReadingProgress, ReadingTimeReport,
    MAX_REPORTED_SECONDS,
};
use crate::progress::clamp_page;

pub const POLL_INTERVAL: Duration = Duration::from_secs(5);
pub const REPORT_INTERVAL: Duration = Duration::from_secs(30);

/// Remote side of the reading session
#[async_trait::async_trait]
pub trait ProgressSync: Send + Sync {
    async fn fetch(&self, book_id: BookId) -> anyhow::Result<Option<ReadingProgress>>;

    async fn push(
        &self,
        book_id: BookId,
        update: ProgressUpdate,
    ) -> anyhow::Result<ProgressUpdateOutcome>;

    async fn report_time(&self, book_id: BookId, report: ReadingTimeReport) -> anyhow::Result<()>;
}

struct SessionState {
    page: u32,
    total_pages: u32,
    /// Client time of the last local change, or of the adopted server copy
    changed_at: i64,
    /// False until the server acknowledged the current page
    synced: bool,
    closed: bool,
    pages_turned: u32,
    reported_until: Instant,
}

impl SessionState {
    fn progress(&self, book_id: BookId) -> ReadingProgress {
        ReadingProgress::new(book_id, self.page, self.total_pages, self.changed_at)
    }
}

struct SessionCore {
    book_id: BookId,
    sync: Arc<dyn ProgressSync>,
    state: Mutex<SessionState>,
    observers: watch::Sender<ReadingProgress>,
}

impl SessionCore {
    fn publish(&self, state: &SessionState) {
        self.observers.send_replace(state.progress(self.book_id));
    }

    /// Replaces the local page with a newer server copy
    fn adopt(&self, state: &mut SessionState, server: &ReadingProgress) {
        let (page, _) = clamp_page(server.page, state.total_pages);
        state.page = page;
        state.changed_at = server.updated_at;
        state.synced = true;
        self.publish(state);
    }

    async fn go_to_page(&self, page: u32) -> ReadingProgress {
        {
            let mut state = self.state.lock();
            if state.closed {
                return state.progress(self.book_id);
            }
            let (page, _) = clamp_page(page, state.total_pages);
            if page != state.page {
                state.page = page;
                state.pages_turned = state.pages_turned.saturating_add(1);
                state.changed_at = now_millis().max(state.changed_at.saturating_add(1));
                state.synced = false;
                self.publish(&state);
            }
        }
        self.push_current().await;
        self.current()
    }

    async fn push_current(&self) {
        let update = {
            let state = self.state.lock();
            if state.closed || state.synced {
                return;
            }
            ProgressUpdate {
                page: state.page,
                total_pages: state.total_pages,
                updated_at: Some(state.changed_at),
            }
        };
        let pushed_at = update.updated_at;

        match self.sync.push(self.book_id, update).await {
            Ok(outcome) => {
                let mut state = self.state.lock();
                if state.closed {
                    return;
                }
                if outcome.accepted {
                    if Some(state.changed_at) == pushed_at {
                        state.synced = true;
                    }
                } else if outcome.progress.updated_at > state.changed_at {
                    tracing::info!(
                        "Progress of book {} changed on another device, moving to page {}",
                        self.book_id,
                        outcome.progress.page
                    );
                    self.adopt(&mut state, &outcome.progress);
                }
            }
            Err(err) => {
                tracing::warn!(
                    "Failed to push progress of book {}, will retry {}",
                    self.book_id,
                    err
                );
            }
        }
    }

    async fn poll(&self) {
        let server = match self.sync.fetch(self.book_id).await {
            Ok(server) => server,
            Err(err) => {
                tracing::warn!("Failed to fetch progress of book {} {}", self.book_id, err);
                return;
            }
        };

        let needs_push = {
            let mut state = self.state.lock();
            if state.closed {
                return;
            }
            match server {
                Some(server)
                    if server.updated_at > state.changed_at && server.page != state.page =>
                {
                    tracing::info!(
                        "Book {} moved to page {} on another device",
                        self.book_id,
                        server.page
                    );
                    self.adopt(&mut state, &server);
                    false
                }
                _ => !state.synced,
            }
        };
        if needs_push {
            self.push_current().await;
        }
    }

    async fn report_reading_time(&self) {
        let (report, measured_until) = {
            let state = self.state.lock();
            if state.closed {
                return;
            }
            // Older unreported time is sent by the following reports
            let seconds = Instant::now()
                .duration_since(state.reported_until)
                .as_secs()
                .min(MAX_REPORTED_SECONDS);
            let report = ReadingTimeReport {
                seconds,
                pages: state.pages_turned,
            };
            (report, state.reported_until + Duration::from_secs(seconds))
        };
        if report.seconds == 0 && report.pages == 0 {
            return;
        }

        match self.sync.report_time(self.book_id, report.clone()).await {
            Ok(()) => {
                let mut state = self.state.lock();
                state.reported_until = measured_until;
                state.pages_turned = state.pages_turned.saturating_sub(report.pages);
            }
            Err(err) => {
                tracing::warn!(
                    "Failed to report reading time of book {} {}",
                    self.book_id,
                    err
                );
            }
        }
    }

    fn current(&self) -> ReadingProgress {
        self.state.lock().progress(self.book_id)
    }

    fn close(&self) {
        self.state.lock().closed = true;
    }
}

async fn run_timers(core: Arc<SessionCore>, mut close: oneshot::Receiver<()>) {
    let start = Instant::now();
    let mut poll_ticks = interval_at(start + POLL_INTERVAL, POLL_INTERVAL);
    poll_ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut report_ticks = interval_at(start + REPORT_INTERVAL, REPORT_INTERVAL);
    report_ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = &mut close => break,
            _ = poll_ticks.tick() => core.poll().await,
            _ = report_ticks.tick() => core.report_reading_time().await,
        }
    }
    tracing::debug!("Reading session of book {} stopped", core.book_id);
}

/// An open book, kept in sync with the progress service until closed
pub struct ReadingSession {
    core: Arc<SessionCore>,
    close: Option<oneshot::Sender<()>>,
    timers: Option<JoinHandle<()>>,
}

impl ReadingSession {
    /// Opens the book, continuing from the server page when the user already read past page 1.
    /// Starts the poll and report timers, so it must be called inside a tokio runtime.
    pub async fn open(sync: Arc<dyn ProgressSync>, book_id: BookId, total_pages: u32) -> Self {
        let (_, total_pages) = clamp_page(1, total_pages);
        let mut state = SessionState {
            page: 1,
            total_pages,
            changed_at: 0,
            synced: true,
            closed: false,
            pages_turned: 0,
            reported_until: Instant::now(),
        };

        match sync.fetch(book_id).await {
            Ok(Some(server)) if server.page > 1 => {
                state.page = clamp_page(server.page, total_pages).0;
                state.changed_at = server.updated_at;
            }
            Ok(_) => {}
            Err(err) => {
                tracing::warn!(
                    "Failed to fetch progress of book {}, starting at page 1 {}",
                    book_id,
                    err
                );
            }
        }

        let (observers, _) = watch::channel(state.progress(book_id));
        let core = Arc::new(SessionCore {
            book_id,
            sync,
            state: Mutex::new(state),
            observers,
        });
        let (close_sender, close_receiver) = oneshot::channel();
        let timers = tokio::spawn(run_timers(core.clone(), close_receiver));

        Self {
            core,
            close: Some(close_sender),
            timers: Some(timers),
        }
    }

    pub fn book_id(&self) -> BookId {
        self.core.book_id
    }

    pub fn current(&self) -> ReadingProgress {
        self.core.current()
    }

    /// Receives the progress every time the page changes, locally or from the server
    pub fn subscribe(&self) -> watch::Receiver<ReadingProgress> {
        self.core.observers.subscribe()
    }

    /// Moves to the page (clamped into the book) and pushes it.
    /// A failed push leaves the page unsynced; the next poll retries it.
    pub async fn go_to_page(&self, page: u32) -> ReadingProgress {
        self.core.go_to_page(page).await
    }

    pub async fn next_page(&self) -> ReadingProgress {
        let page = self.current().page.saturating_add(1);
        self.core.go_to_page(page).await
    }

    pub async fn previous_page(&self) -> ReadingProgress {
        let page = self.current().page.saturating_sub(1);
        self.core.go_to_page(page).await
    }

    /// Runs one poll now instead of waiting for the timer
    pub async fn poll(&self) {
        self.core.poll().await
    }

    /// Reports the time since the last successful report now
    pub async fn report_reading_time(&self) {
        self.core.report_reading_time().await
    }

    /// Stops the timers. A request already in flight finishes but no longer changes the session.
    pub async fn close(mut self) {
        self.core.close();
        if let Some(close) = self.close.take() {
            let _ = close.send(());
        }
        if let Some(timers) = self.timers.take() {
            if let Err(err) = timers.await {
                tracing::warn!("Reading session timers ended abnormally {}", err);
            }
        }
    }
}

impl Drop for ReadingSession {
    fn drop(&mut self) {
        self.core.close();
        if let Some(close) = self.close.take() {
            let _ = close.send(());
        }
    }
}
