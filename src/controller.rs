//! Incremental pagination controller
//!
//! [`PageableController`] owns the mutable side of pagination: it calls the
//! injected fetcher, keeps concurrent fetches from overlapping, debounces
//! "load more" triggers, applies the retry policy and publishes a fresh
//! [`PageableView`] after every transition.
//!
//! Concurrency rules:
//! - `fetch_first_page` and `refresh` share one in-flight slot. A caller that
//!   arrives while either is running awaits that run instead of starting one.
//! - `fetch_next_page` is guarded by the set of keys being fetched, so the
//!   same key is never requested twice at once.
//! - Every reset (`fetch_first_page`, `refresh`, `clear`) bumps an epoch.
//!   Results that come back for an older epoch, or after `dispose`, are
//!   dropped without publishing.

pub mod builder;
pub mod hooks;
pub mod options;

use std::{collections::HashSet, future::Future, sync::Arc};

use color_eyre::eyre::Result;
use futures::{
    future::{BoxFuture, Shared},
    FutureExt,
};
use parking_lot::Mutex;
use tracing::{debug, info, trace, warn, Instrument};

pub use builder::PageableControllerBuilder;
pub use hooks::LifecycleHooks;
pub use options::ControllerOptions;

use crate::{
    debounce::Debouncer,
    model::{
        PageItem, PageKey, PageResult, PageableStatus, PageableView, SharedError, ViewUpdate,
    },
    observable::{Observable, Subscription},
    retry::{FetchFailure, RetryPolicy},
};

pub type FetchFuture<Item> = BoxFuture<'static, Result<Vec<Item>>>;
/// Loads the items of one page; an `Err` marks the fetch as failed
pub type FetchPage<K, Item> = Arc<dyn Fn(K) -> FetchFuture<Item> + Send + Sync>;
/// Derives the key after `current_key` from its items and the total number
/// of items loaded so far; `None` means there is no further page
pub type NextPageKeyGenerator<K, Item> =
    Arc<dyn Fn(&K, &[Item], usize) -> Option<K> + Send + Sync>;

type Flight = Shared<BoxFuture<'static, ()>>;

pub struct PageableController<K, Item> {
    inner: Arc<Inner<K, Item>>,
}

impl<K, Item> Clone for PageableController<K, Item> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct Inner<K, Item> {
    fetch_page: FetchPage<K, Item>,
    first_page_key: K,
    next_page_key_generator: Option<NextPageKeyGenerator<K, Item>>,
    retry: RetryPolicy,
    hooks: LifecycleHooks,
    invisible_items_threshold: usize,
    view: Observable<PageableView<K, Item>>,
    flight: Mutex<FlightState<K>>,
    debouncer: Debouncer,
}

struct FlightState<K> {
    current: Option<(u64, Flight)>,
    next_flight_id: u64,
    fetching_keys: HashSet<K>,
    epoch: u64,
    disposed: bool,
}

impl<K> Default for FlightState<K> {
    fn default() -> Self {
        Self {
            current: None,
            next_flight_id: 0,
            fetching_keys: HashSet::new(),
            epoch: 0,
            disposed: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reload {
    FirstPage,
    Refresh,
}

impl<K: PageKey, Item: PageItem> PageableController<K, Item> {
    pub fn builder() -> PageableControllerBuilder<K, Item> {
        PageableControllerBuilder::default()
    }

    /// The current snapshot
    pub fn pageable(&self) -> PageableView<K, Item> {
        self.inner.view.current()
    }

    /// Receive the current snapshot now and every published one after it
    pub fn subscribe(&self) -> Subscription<PageableView<K, Item>> {
        self.inner.view.subscribe()
    }

    pub fn status(&self) -> PageableStatus {
        self.inner.view.read(PageableView::status)
    }

    pub fn item_list(&self) -> Vec<Item>
    where
        Item: Clone,
    {
        self.inner.view.read(PageableView::items)
    }

    pub fn error(&self) -> Option<SharedError> {
        self.inner.view.read(|view| view.error().cloned())
    }

    pub fn next_page_key(&self) -> Option<K> {
        self.inner.view.read(|view| view.next_page_key().cloned())
    }

    /// Whether a first-page, refresh or next-page fetch is running
    pub fn is_fetching(&self) -> bool {
        self.inner.flight.lock().is_fetching()
    }

    pub fn can_fetch_next_page(&self) -> bool {
        !self.is_fetching() && self.status().can_load_more()
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.flight.lock().disposed
    }

    /// Fetch the first page, replacing whatever was loaded before
    ///
    /// Joins the running first-page fetch or refresh if there is one.
    ///
    /// # Panics
    ///
    /// Panics if the controller has been disposed.
    pub async fn fetch_first_page(&self) {
        self.inner.ensure_active("fetch_first_page");
        self.inner.reload(Reload::FirstPage).await;
    }

    /// Fetch the page after the last loaded one
    ///
    /// Does nothing unless [`Self::can_fetch_next_page`]. Calls arriving
    /// within the debounce window restart it and all await the one fetch
    /// made when it closes.
    ///
    /// # Panics
    ///
    /// Panics if the controller has been disposed.
    pub async fn fetch_next_page(&self) {
        self.inner.ensure_active("fetch_next_page");
        if !self.can_fetch_next_page() {
            trace!("fetch_next_page ignored in status {}", self.status());
            return;
        }

        let inner = Arc::downgrade(&self.inner);
        self.inner
            .debouncer
            .trigger(move || async move {
                if let Some(inner) = inner.upgrade() {
                    inner.load_next_page().await;
                }
            })
            .await;
    }

    /// Refetch the first page and start pagination over from it
    ///
    /// Loaded pages stay visible while `Refreshing`. On failure with data
    /// on screen the status falls back to `LoadedPage`, keeping the stale
    /// pages and recording the error.
    ///
    /// # Panics
    ///
    /// Panics if the controller has been disposed.
    pub async fn refresh(&self) {
        self.inner.ensure_active("refresh");
        self.inner.reload(Reload::Refresh).await;
    }

    /// Repeat whichever fetch failed last; a no-op outside error statuses
    ///
    /// # Panics
    ///
    /// Panics if the controller has been disposed.
    pub async fn retry(&self) {
        self.inner.ensure_active("retry");
        match self.status() {
            PageableStatus::FirstPageError => self.fetch_first_page().await,
            PageableStatus::NewPageError => self.fetch_next_page().await,
            status => trace!("retry ignored in status {status}"),
        }
    }

    /// Reset to an empty `Initial` view, abandoning pending work
    ///
    /// # Panics
    ///
    /// Panics if the controller has been disposed.
    pub fn clear(&self) {
        self.inner.ensure_active("clear");
        self.inner.debouncer.cancel();

        let mut flight = self.inner.flight.lock();
        flight.reset();
        self.inner
            .view
            .update(|view| PageableView::initial(view.page_size(), view.show_log()));
        debug!("Pageable view cleared");
    }

    /// Stop the controller for good
    ///
    /// Pending timers are cancelled, subscriptions end, and fetches still
    /// running are left to finish with their results discarded.
    ///
    /// # Panics
    ///
    /// Panics if called twice.
    pub fn dispose(&self) {
        {
            let mut flight = self.inner.flight.lock();
            if flight.disposed {
                panic!("PageableController::dispose called after dispose");
            }
            flight.disposed = true;
            flight.reset();
        }
        self.inner.debouncer.cancel();
        self.inner.view.close();
        info!("Pageable controller disposed");
        self.inner.hooks.fire_dispose();
    }

    /// Append a page fetched outside the controller
    ///
    /// `next_page_key` of `None` marks the list complete. A page whose key is
    /// already loaded is ignored.
    ///
    /// # Panics
    ///
    /// Panics if the controller has been disposed.
    pub fn append_page(&self, page_key: K, items: Vec<Item>, next_page_key: Option<K>) {
        self.inner.ensure_active("append_page");
        let epoch = self.inner.flight.lock().epoch;
        self.inner.transition(epoch, |view| {
            if view.contains_key(&page_key) {
                warn!("Ignoring appended page {page_key:?}: key is already loaded");
                return None;
            }

            let status = match &next_page_key {
                Some(_) => PageableStatus::LoadedPage,
                None if items.is_empty() && view.pages().is_empty() => {
                    PageableStatus::NoItemsFound
                }
                None => PageableStatus::Completed,
            };
            let mut pages = view.pages().to_vec();
            pages.push(PageResult::new(page_key, items));

            Some(
                view.copy_with(
                    ViewUpdate::new()
                        .pages(pages)
                        .status(status)
                        .next_page_key(next_page_key)
                        .clear_error(),
                ),
            )
        });
    }

    /// Append the final page fetched outside the controller
    ///
    /// # Panics
    ///
    /// Panics if the controller has been disposed.
    pub fn append_last_page(&self, page_key: K, items: Vec<Item>) {
        self.append_page(page_key, items, None);
    }

    /// Prefetch trigger for list UIs
    ///
    /// Once the item at `index` is within `invisible_items_threshold` of the
    /// end of the loaded list, fetches the next page.
    ///
    /// # Panics
    ///
    /// Panics if the controller has been disposed.
    pub async fn notify_item_visible(&self, index: usize) {
        self.inner.ensure_active("notify_item_visible");
        let item_count = self.inner.view.read(PageableView::item_count);
        let trigger_at = item_count.saturating_sub(self.inner.invisible_items_threshold);
        if item_count > 0 && index >= trigger_at && self.can_fetch_next_page() {
            self.fetch_next_page().await;
        }
    }
}

impl<K> FlightState<K> {
    fn is_fetching(&self) -> bool {
        self.current.is_some() || !self.fetching_keys.is_empty()
    }

    /// Abandon everything in flight; results of the old epoch are dropped
    fn reset(&mut self) -> u64 {
        self.epoch += 1;
        self.current = None;
        self.fetching_keys.clear();
        self.epoch
    }
}

impl<K: PageKey, Item: PageItem> Inner<K, Item> {
    fn ensure_active(&self, operation: &str) {
        if self.flight.lock().disposed {
            panic!("PageableController::{operation} called after dispose");
        }
    }

    fn is_stale(&self, epoch: u64) -> bool {
        let flight = self.flight.lock();
        flight.disposed || flight.epoch != epoch
    }

    /// Publish the view produced by `next`, unless the epoch moved on
    ///
    /// The flight lock is held across the publish so that `clear` and
    /// `dispose` cannot interleave with it.
    fn transition(
        &self,
        epoch: u64,
        next: impl FnOnce(&PageableView<K, Item>) -> Option<PageableView<K, Item>>,
    ) -> bool {
        let flight = self.flight.lock();
        if flight.disposed || flight.epoch != epoch {
            return false;
        }
        self.view.update_if(|view| {
            let view = next(view)?;
            if view.show_log() {
                debug!(
                    status = %view.status(),
                    pages = view.pages().len(),
                    items = view.item_count(),
                    next_page_key = ?view.next_page_key(),
                    "Publishing pageable view"
                );
            }
            Some(view)
        })
    }

    fn publish(&self, epoch: u64, update: ViewUpdate<K, Item>) -> bool {
        self.transition(epoch, |view| Some(view.copy_with(update)))
    }

    fn publish_failure(&self, epoch: u64, status: PageableStatus, failure: FetchFailure) {
        self.publish(
            epoch,
            ViewUpdate::new()
                .status(status)
                .error(failure.error)
                .stack_trace(failure.stack_trace),
        );
    }

    /// Start or join the single in-flight first-page/refresh run
    fn reload(self: &Arc<Self>, kind: Reload) -> Flight {
        let mut flight = self.flight.lock();
        if let Some((_, running)) = &flight.current {
            debug!("Joining in-flight fetch instead of starting {kind:?}");
            return running.clone();
        }

        flight.next_flight_id += 1;
        let id = flight.next_flight_id;
        let inner = Arc::clone(self);
        let run = async move {
            match kind {
                Reload::FirstPage => inner.load_first_page().await,
                Reload::Refresh => inner.load_refresh().await,
            }
            let mut flight = inner.flight.lock();
            if flight
                .current
                .as_ref()
                .is_some_and(|(current, _)| *current == id)
            {
                flight.current = None;
            }
        }
        .boxed()
        .shared();

        flight.current = Some((id, run.clone()));
        drop(flight);

        tokio::spawn(run.clone());
        run
    }

    /// Reset pagination for a fresh first page, returning the new epoch
    fn begin_reload(&self) -> u64 {
        self.debouncer.cancel();
        let mut flight = self.flight.lock();
        flight.epoch += 1;
        flight.fetching_keys.clear();
        flight.epoch
    }

    async fn load_first_page(&self) {
        let epoch = self.begin_reload();
        if !self.publish(
            epoch,
            ViewUpdate::new()
                .status(PageableStatus::LoadingFirstPage)
                .clear_error(),
        ) {
            return;
        }

        let key = self.first_page_key.clone();
        match self.fetch(&key, epoch).await {
            Ok(items) => {
                let next = self.generate_next_key(&key, &items, items.len());
                self.transition(epoch, |view| {
                    Some(self.first_page_loaded(view, key, items, next))
                });
            }
            Err(failure) => {
                warn!("First page {key:?} failed: {}", failure.error);
                self.publish_failure(epoch, PageableStatus::FirstPageError, failure);
            }
        }
    }

    async fn load_refresh(&self) {
        let epoch = self.begin_reload();
        let had_data = self.view.read(PageableView::has_data);
        if !self.publish(
            epoch,
            ViewUpdate::new()
                .status(PageableStatus::Refreshing)
                .clear_error(),
        ) {
            return;
        }

        let key = self.first_page_key.clone();
        match self.fetch(&key, epoch).await {
            Ok(items) => {
                let next = self.generate_next_key(&key, &items, items.len());
                self.transition(epoch, |view| {
                    Some(self.first_page_loaded(view, key, items, next))
                });
            }
            Err(failure) if had_data => {
                warn!("Refresh failed, keeping loaded pages: {}", failure.error);
                self.publish_failure(epoch, PageableStatus::LoadedPage, failure);
            }
            Err(failure) => {
                warn!("Refresh failed with nothing loaded: {}", failure.error);
                self.publish_failure(epoch, PageableStatus::FirstPageError, failure);
            }
        }
    }

    /// View after a first page (or refreshed first page) arrived
    fn first_page_loaded(
        &self,
        view: &PageableView<K, Item>,
        key: K,
        items: Vec<Item>,
        next: Option<K>,
    ) -> PageableView<K, Item> {
        let update = ViewUpdate::new().clear_error();
        let update = if items.is_empty() {
            update
                .pages(Vec::new())
                .status(PageableStatus::NoItemsFound)
                .next_page_key(None)
        } else if view.is_last_page(items.len()) {
            update
                .pages(vec![PageResult::new(key, items)])
                .status(PageableStatus::Completed)
                .next_page_key(None)
        } else {
            // without a generator no key survives the reset
            update
                .pages(vec![PageResult::new(key, items)])
                .status(PageableStatus::LoadedPage)
                .next_page_key(next)
        };
        view.copy_with(update)
    }

    /// Key after a freshly fetched page; `None` for a short page or
    /// without a generator
    ///
    /// The generator is user code, so it runs with no lock held.
    fn generate_next_key(&self, key: &K, items: &[Item], total: usize) -> Option<K> {
        let generate = self.next_page_key_generator.as_ref()?;
        let last_page = self.view.read(|view| view.is_last_page(items.len()));
        if items.is_empty() || last_page {
            return None;
        }
        generate(key, items, total)
    }

    /// The key `fetch_next_page` should request next
    fn resolve_next_key(&self) -> Option<K> {
        let (last, total, stored) = self.view.read(|view| {
            (
                view.last_page().cloned(),
                view.item_count(),
                view.next_page_key().cloned(),
            )
        });
        match (&self.next_page_key_generator, last) {
            (Some(generate), Some(last)) => generate(last.page_key(), last.items(), total),
            _ => stored,
        }
    }

    async fn load_next_page(&self) {
        let epoch = {
            let flight = self.flight.lock();
            if flight.disposed || flight.is_fetching() {
                return;
            }
            flight.epoch
        };

        if !self.view.read(PageableView::status).can_load_more() {
            return;
        }
        let key = self.resolve_next_key();

        let Some(key) = key else {
            debug!("No next page key; pagination complete");
            self.publish(
                epoch,
                ViewUpdate::new()
                    .status(PageableStatus::Completed)
                    .next_page_key(None)
                    .clear_error(),
            );
            return;
        };

        if self.view.read(|view| view.contains_key(&key)) {
            warn!("Next page key {key:?} is already loaded; treating the list as complete");
            self.publish(
                epoch,
                ViewUpdate::new()
                    .status(PageableStatus::Completed)
                    .next_page_key(None),
            );
            return;
        }

        {
            let mut flight = self.flight.lock();
            if flight.epoch != epoch || !flight.fetching_keys.insert(key.clone()) {
                return;
            }
        }

        if self.publish(
            epoch,
            ViewUpdate::new()
                .status(PageableStatus::LoadingNewPage)
                .clear_error(),
        ) {
            let result = self.fetch(&key, epoch).await;
            self.release_key(epoch, &key);
            match result {
                Ok(items) => {
                    let total = self.view.read(PageableView::item_count) + items.len();
                    let next = self.generate_next_key(&key, &items, total);
                    self.transition(epoch, |view| {
                        Some(self.next_page_loaded(view, key, items, next))
                    });
                }
                Err(failure) => {
                    warn!("Page {key:?} failed: {}", failure.error);
                    self.publish_failure(epoch, PageableStatus::NewPageError, failure);
                }
            }
        } else {
            self.release_key(epoch, &key);
        }
    }

    /// View after a subsequent page arrived; loaded pages are kept
    fn next_page_loaded(
        &self,
        view: &PageableView<K, Item>,
        key: K,
        items: Vec<Item>,
        next: Option<K>,
    ) -> PageableView<K, Item> {
        let (status, next) = if view.is_last_page(items.len()) {
            (PageableStatus::Completed, None)
        } else {
            (PageableStatus::LoadedPage, next)
        };

        let mut pages = view.pages().to_vec();
        pages.push(PageResult::new(key, items));
        view.copy_with(
            ViewUpdate::new()
                .pages(pages)
                .status(status)
                .next_page_key(next)
                .clear_error(),
        )
    }

    fn release_key(&self, epoch: u64, key: &K) {
        let mut flight = self.flight.lock();
        if flight.epoch == epoch {
            flight.fetching_keys.remove(key);
        }
    }

    fn fetch(
        &self,
        key: &K,
        epoch: u64,
    ) -> impl Future<Output = std::result::Result<Vec<Item>, FetchFailure>> + Send + '_ {
        let fetch_page = Arc::clone(&self.fetch_page);
        let page_key = key.clone();
        let span = tracing::debug_span!("fetch_page", key = ?key);
        async move {
            self.retry
                .run(|| fetch_page(page_key.clone()), || self.is_stale(epoch))
                .await
        }
        .instrument(span)
    }
}
