use std::{future::Future, sync::Arc, time::Duration};

use color_eyre::eyre::{Report, Result};
use futures::FutureExt;
use parking_lot::Mutex;
use tracing::debug;

use super::{
    hooks::LifecycleHooks, options::ControllerOptions, FetchPage, FlightState, Inner,
    NextPageKeyGenerator, PageableController, Reload,
};
use crate::{
    debounce::Debouncer,
    error::BuildError,
    model::{PageItem, PageKey, PageableView},
    observable::Observable,
    retry::RetryPolicy,
};

/// Assembles a [`PageableController`]
///
/// ```
/// use pageable::controller::PageableController;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> color_eyre::eyre::Result<()> {
/// let controller: PageableController<u32, String> = PageableController::builder()
///     .fetch_page(|page| async move { Ok(vec![format!("item on page {page}")]) })
///     .first_page_key(0)
///     .page_size(10)
///     .next_page_key_generator(|page, _, _| Some(page + 1))
///     .build()?;
///
/// controller.fetch_first_page().await;
/// assert_eq!(controller.item_list(), vec!["item on page 0".to_string()]);
/// # Ok(())
/// # }
/// ```
pub struct PageableControllerBuilder<K, Item> {
    fetch_page: Option<FetchPage<K, Item>>,
    first_page_key: Option<K>,
    next_page_key_generator: Option<NextPageKeyGenerator<K, Item>>,
    page_size: usize,
    retry: RetryPolicy,
    max_retries: u32,
    retry_delay: Duration,
    debounce: Duration,
    invisible_items_threshold: usize,
    show_log: bool,
    auto_fetch_first_page: bool,
    hooks: LifecycleHooks,
    initial_view: Option<PageableView<K, Item>>,
}

impl<K, Item> Default for PageableControllerBuilder<K, Item> {
    fn default() -> Self {
        let options = ControllerOptions::default();
        Self {
            fetch_page: None,
            first_page_key: None,
            next_page_key_generator: None,
            page_size: options.page_size,
            retry: RetryPolicy::default(),
            max_retries: options.max_retries,
            retry_delay: options.retry_delay(),
            debounce: options.debounce(),
            invisible_items_threshold: options.invisible_items_threshold,
            show_log: options.show_log,
            auto_fetch_first_page: options.auto_fetch_first_page,
            hooks: LifecycleHooks::default(),
            initial_view: None,
        }
    }
}

impl<K: PageKey, Item: PageItem> PageableControllerBuilder<K, Item> {
    /// Take every plain setting from `options`
    pub fn options(mut self, options: &ControllerOptions) -> Self {
        self.page_size = options.page_size;
        self.max_retries = options.max_retries;
        self.retry_delay = options.retry_delay();
        self.debounce = options.debounce();
        self.invisible_items_threshold = options.invisible_items_threshold;
        self.show_log = options.show_log;
        self.auto_fetch_first_page = options.auto_fetch_first_page;
        self
    }

    pub fn fetch_page<F, Fut>(mut self, fetch_page: F) -> Self
    where
        F: Fn(K) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<Item>>> + Send + 'static,
    {
        self.fetch_page = Some(Arc::new(move |key| fetch_page(key).boxed()));
        self
    }

    pub fn first_page_key(mut self, key: K) -> Self {
        self.first_page_key = Some(key);
        self
    }

    /// Runs on the fetching task with no controller lock held, so it may
    /// read the controller
    pub fn next_page_key_generator(
        mut self,
        generator: impl Fn(&K, &[Item], usize) -> Option<K> + Send + Sync + 'static,
    ) -> Self {
        self.next_page_key_generator = Some(Arc::new(generator));
        self
    }

    pub fn page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn retry_if(
        mut self,
        retry_if: impl Fn(&Report, u32) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.retry = self.retry.with_retry_if(retry_if);
        self
    }

    /// Per-attempt delay; takes precedence over [`Self::retry_delay`]
    pub fn retry_delay_builder(
        mut self,
        builder: impl Fn(u32) -> Duration + Send + Sync + 'static,
    ) -> Self {
        self.retry = self.retry.with_delay_builder(builder);
        self
    }

    pub fn on_retry(
        mut self,
        on_retry: impl Fn(u32, &Report, Duration) + Send + Sync + 'static,
    ) -> Self {
        self.retry = self.retry.with_on_retry(on_retry);
        self
    }

    pub fn debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn invisible_items_threshold(mut self, threshold: usize) -> Self {
        self.invisible_items_threshold = threshold;
        self
    }

    pub fn show_log(mut self, show_log: bool) -> Self {
        self.show_log = show_log;
        self
    }

    /// Fetch the first page on the scheduler tick after `build`
    pub fn auto_fetch_first_page(mut self, enabled: bool) -> Self {
        self.auto_fetch_first_page = enabled;
        self
    }

    pub fn on_init(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.hooks.on_init = Some(Arc::new(hook));
        self
    }

    /// Runs once, on the scheduler tick after `build`
    pub fn on_ready(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.hooks.on_ready = Some(Arc::new(hook));
        self
    }

    pub fn on_dispose(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.hooks.on_dispose = Some(Arc::new(hook));
        self
    }

    /// Start from previously loaded pages instead of an empty view
    ///
    /// The view keeps its own `show_log` flag; [`Self::show_log`] only
    /// applies to views the controller creates. Its `page_size` must match
    /// the configured one.
    pub fn initial_view(mut self, view: PageableView<K, Item>) -> Self {
        self.initial_view = Some(view);
        self
    }

    pub fn build(self) -> std::result::Result<PageableController<K, Item>, BuildError> {
        if self.page_size == 0 {
            return Err(BuildError::InvalidPageSize(self.page_size));
        }
        let fetch_page = self.fetch_page.ok_or(BuildError::MissingFetchPage)?;
        let first_page_key = self.first_page_key.ok_or(BuildError::MissingFirstPageKey)?;

        let view = match self.initial_view {
            Some(view) if view.page_size() != self.page_size => {
                return Err(BuildError::PageSizeMismatch {
                    view: view.page_size(),
                    configured: self.page_size,
                });
            }
            Some(view) => view,
            None => PageableView::initial(self.page_size, self.show_log),
        };

        let deferred = self.auto_fetch_first_page || self.hooks.on_ready.is_some();
        if deferred && tokio::runtime::Handle::try_current().is_err() {
            return Err(BuildError::NoRuntime);
        }

        let inner = Arc::new(Inner {
            fetch_page,
            first_page_key,
            next_page_key_generator: self.next_page_key_generator,
            retry: self.retry.with_limits(self.max_retries, self.retry_delay),
            hooks: self.hooks,
            invisible_items_threshold: self.invisible_items_threshold,
            view: Observable::new(view),
            flight: Mutex::new(FlightState::default()),
            debouncer: Debouncer::new(self.debounce),
        });

        debug!(
            page_size = self.page_size,
            first_page_key = ?inner.first_page_key,
            "Pageable controller created"
        );
        inner.hooks.fire_init();

        if deferred {
            let weak = Arc::downgrade(&inner);
            let auto_fetch = self.auto_fetch_first_page;
            tokio::spawn(async move {
                tokio::task::yield_now().await;
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                if inner.flight.lock().disposed {
                    return;
                }
                inner.hooks.fire_ready();
                if auto_fetch {
                    inner.reload(Reload::FirstPage).await;
                }
            });
        }

        Ok(PageableController { inner })
    }
}
