use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use shared::{
    domain::{Project, ProjectSortMode},
    protocol::ListProjectsQuery,
};
use tokio::sync::{broadcast, Mutex};
use tracing::{info, warn};

use crate::{error::ClientError, store::ProjectStore, ProjectLister};

/// Matches the page size the reference listing UI requests.
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Sentinel for "no page request outstanding".
const IDLE: u64 = u64::MAX;

#[derive(Debug, Clone)]
pub enum FeedEvent {
    PageAppended { added: usize, loaded: usize },
    Exhausted,
    Error(String),
}

/// Outcome of one visibility trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedProgress {
    Appended { added: usize },
    /// The server returned an empty page (or had already done so); no
    /// further requests will be issued until a reset.
    Exhausted,
    /// A request for the next page is already outstanding.
    AlreadyFetching,
    /// The response belonged to a superseded sort-parameter epoch and was
    /// dropped without touching the store.
    Discarded,
}

struct FeedState {
    epoch: u64,
    next_offset: u64,
    exhausted: bool,
    pages: Vec<Vec<Project>>,
}

impl FeedState {
    fn reset_for_new_epoch(&mut self) {
        self.epoch += 1;
        self.next_offset = 0;
        self.exhausted = false;
        // Any outstanding request now carries a dead epoch; its completion
        // is discarded by the epoch check rather than by cancellation.
        self.pages.clear();
    }
}

/// Releases the in-flight slot when the request future finishes or is
/// dropped mid-flight, but only while the slot still belongs to the epoch
/// that armed it. A reset hands the slot to the next epoch untouched.
struct InFlightGuard<'a> {
    slot: &'a AtomicU64,
    epoch: u64,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        let _ = self
            .slot
            .compare_exchange(self.epoch, IDLE, Ordering::AcqRel, Ordering::Acquire);
    }
}

/// Drives incremental retrieval of the project list and keeps the store's
/// accumulated list consistent with the current sort mode.
///
/// Pages are fetched one at a time: the caller invokes [`request_more`] when
/// its near-the-end marker becomes visible, and the in-flight slot refuses
/// overlapping requests for the same epoch. The feed lock is always taken
/// before the store lock.
///
/// [`request_more`]: ProjectFeed::request_more
pub struct ProjectFeed {
    lister: Arc<dyn ProjectLister>,
    store: Arc<ProjectStore>,
    page_size: u32,
    inner: Mutex<FeedState>,
    // Holds the epoch of the outstanding request, or `IDLE`. Armed and
    // checked under the feed lock; cleared by [`InFlightGuard`] so a
    // dropped request future cannot wedge the feed.
    in_flight: AtomicU64,
    events: broadcast::Sender<FeedEvent>,
}

impl ProjectFeed {
    pub fn new(lister: Arc<dyn ProjectLister>, store: Arc<ProjectStore>) -> Self {
        Self::with_page_size(lister, store, DEFAULT_PAGE_SIZE)
    }

    pub fn with_page_size(
        lister: Arc<dyn ProjectLister>,
        store: Arc<ProjectStore>,
        page_size: u32,
    ) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            lister,
            store,
            page_size,
            inner: Mutex::new(FeedState {
                epoch: 0,
                next_offset: 0,
                exhausted: false,
                pages: Vec::new(),
            }),
            in_flight: AtomicU64::new(IDLE),
            events,
        }
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<FeedEvent> {
        self.events.subscribe()
    }

    pub async fn is_exhausted(&self) -> bool {
        self.inner.lock().await.exhausted
    }

    pub async fn next_offset(&self) -> u64 {
        self.inner.lock().await.next_offset
    }

    /// The visibility trigger: fetch the next page if nothing is in flight
    /// and the listing is not exhausted.
    ///
    /// A failed request leaves the offset and page cache untouched, so the
    /// next trigger re-attempts the same page.
    pub async fn request_more(&self) -> Result<FeedProgress, ClientError> {
        let (epoch, query) = {
            let state = self.inner.lock().await;
            if state.exhausted {
                return Ok(FeedProgress::Exhausted);
            }
            if self.in_flight.load(Ordering::Acquire) != IDLE {
                return Ok(FeedProgress::AlreadyFetching);
            }
            self.in_flight.store(state.epoch, Ordering::Release);
            let params = self.store.sort_params().await;
            (
                state.epoch,
                ListProjectsQuery {
                    offset: state.next_offset,
                    limit: self.page_size,
                    order: params.order,
                    order_by: params.order_by,
                },
            )
        };
        let _in_flight = InFlightGuard {
            slot: &self.in_flight,
            epoch,
        };

        // The lock is released while the request is out.
        let result = self.lister.list_projects(query).await;

        let mut state = self.inner.lock().await;
        if state.epoch != epoch {
            // Sort parameters changed while this request was in flight.
            // The new epoch owns the in-flight slot now; drop the result whole.
            info!(
                stale_epoch = epoch,
                current_epoch = state.epoch,
                offset = query.offset,
                "feed: discarding response from superseded epoch"
            );
            return Ok(FeedProgress::Discarded);
        }

        let page = match result {
            Ok(page) => page,
            Err(err) => {
                warn!(offset = query.offset, "feed: page request failed: {err}");
                let _ = self.events.send(FeedEvent::Error(err.to_string()));
                return Err(err);
            }
        };

        if page.is_final() {
            state.exhausted = true;
            let _ = self.events.send(FeedEvent::Exhausted);
            return Ok(FeedProgress::Exhausted);
        }

        state.next_offset = page.next_offset();
        let added = page.results.len();
        state.pages.push(page.results);
        let accumulated = state.pages.iter().flatten().cloned().collect::<Vec<_>>();
        let loaded = accumulated.len();
        // Committed while the feed lock is held, so a concurrent sort change
        // cannot slip between the epoch check and the store write.
        self.store.update_projects(accumulated).await;
        let _ = self.events.send(FeedEvent::PageAppended { added, loaded });
        Ok(FeedProgress::Appended { added })
    }

    /// Switch sort mode. Accumulated pages belong to the old parameters and
    /// would render a mixed-order list, so they are invalidated first and
    /// pagination restarts at offset zero under the new mode.
    pub async fn change_sort_mode(&self, mode: ProjectSortMode) {
        let mut state = self.inner.lock().await;
        state.reset_for_new_epoch();
        self.in_flight.store(IDLE, Ordering::Release);
        self.store.clear_projects().await;
        self.store.set_sort_mode(mode).await;
        drop(state);
        info!(?mode, "feed: sort mode changed, pagination reset");
    }

    /// Manual refresh: discard everything fetched so far and restart from
    /// offset zero without changing the sort mode.
    pub async fn refresh(&self) {
        let mut state = self.inner.lock().await;
        state.reset_for_new_epoch();
        self.in_flight.store(IDLE, Ordering::Release);
        self.store.clear_projects().await;
    }
}

#[cfg(test)]
#[path = "tests/feed_tests.rs"]
mod tests;
