//! Immutable snapshot of a pageable list
//!
//! A `PageableView` is never modified in place. Every transition goes through
//! [`PageableView::copy_with`], which returns a new view, so anything holding
//! an older snapshot keeps seeing a consistent state.

use std::{collections::HashSet, hash::Hash, sync::Arc};

use color_eyre::eyre::Report;
use tracing_error::SpanTrace;

use super::{page_result::PageResult, status::PageableStatus};

/// A fetch error as stored in a view; shared because views are copied freely
pub type SharedError = Arc<Report>;

#[derive(Debug)]
pub struct PageableView<K, Item> {
    pages: Vec<PageResult<K, Item>>,
    status: PageableStatus,
    next_page_key: Option<K>,
    error: Option<SharedError>,
    stack_trace: Option<Arc<SpanTrace>>,
    page_size: usize,
    show_log: bool,
}

impl<K: Clone, Item> Clone for PageableView<K, Item> {
    fn clone(&self) -> Self {
        Self {
            pages: self.pages.clone(),
            status: self.status,
            next_page_key: self.next_page_key.clone(),
            error: self.error.clone(),
            stack_trace: self.stack_trace.clone(),
            page_size: self.page_size,
            show_log: self.show_log,
        }
    }
}

impl<K, Item> PageableView<K, Item> {
    /// Empty view in `Initial` status
    ///
    /// # Panics
    ///
    /// Panics if `page_size` is zero.
    pub fn initial(page_size: usize, show_log: bool) -> Self {
        assert!(page_size >= 1, "page_size must be at least 1, got {page_size}");
        Self {
            pages: Vec::new(),
            status: PageableStatus::Initial,
            next_page_key: None,
            error: None,
            stack_trace: None,
            page_size,
            show_log,
        }
    }

    pub fn pages(&self) -> &[PageResult<K, Item>] {
        &self.pages
    }

    pub fn status(&self) -> PageableStatus {
        self.status
    }

    pub fn next_page_key(&self) -> Option<&K> {
        self.next_page_key.as_ref()
    }

    pub fn error(&self) -> Option<&SharedError> {
        self.error.as_ref()
    }

    pub fn stack_trace(&self) -> Option<&SpanTrace> {
        self.stack_trace.as_deref()
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn show_log(&self) -> bool {
        self.show_log
    }

    pub fn iter_items(&self) -> impl Iterator<Item = &Item> {
        self.pages.iter().flat_map(|page| page.items().iter())
    }

    pub fn item_count(&self) -> usize {
        self.pages.iter().map(PageResult::len).sum()
    }

    pub fn item_at(&self, index: usize) -> Option<&Item> {
        self.iter_items().nth(index)
    }

    pub fn has_data(&self) -> bool {
        self.pages.iter().any(|page| !page.is_empty())
    }

    pub fn last_page(&self) -> Option<&PageResult<K, Item>> {
        self.pages.last()
    }

    pub fn page_keys(&self) -> impl Iterator<Item = &K> {
        self.pages.iter().map(PageResult::page_key)
    }

    /// Last-page auto-detection: a short page means the source is exhausted
    pub fn is_last_page(&self, fetched: usize) -> bool {
        fetched < self.page_size
    }
}

impl<K: PartialEq, Item> PageableView<K, Item> {
    pub fn contains_key(&self, key: &K) -> bool {
        self.pages.iter().any(|page| page.page_key() == key)
    }
}

impl<K: Clone, Item: Clone> PageableView<K, Item> {
    /// All items flattened in fetch order
    pub fn items(&self) -> Vec<Item> {
        self.iter_items().cloned().collect()
    }
}

impl<K: Clone + Eq + Hash, Item> PageableView<K, Item> {
    /// Bootstrap a view from pages obtained elsewhere, e.g. a cache
    ///
    /// Pages with a key seen earlier in `pages` are dropped. The status is
    /// derived from the data: no pages is `Initial`, a single empty page is
    /// `NoItemsFound`, a known next key or a full last page is `LoadedPage`,
    /// and a short last page with no next key is `Completed`.
    ///
    /// # Panics
    ///
    /// Panics if `page_size` is zero.
    pub fn from_pages(
        pages: Vec<PageResult<K, Item>>,
        next_page_key: Option<K>,
        page_size: usize,
        show_log: bool,
    ) -> Self {
        let mut view = Self::initial(page_size, show_log);

        let mut seen = HashSet::new();
        let pages: Vec<_> = pages
            .into_iter()
            .filter(|page| seen.insert(page.page_key().clone()))
            .collect();

        let status = match pages.last() {
            None => PageableStatus::Initial,
            Some(only) if pages.len() == 1 && only.is_empty() && next_page_key.is_none() => {
                PageableStatus::NoItemsFound
            }
            Some(_) if next_page_key.is_some() => PageableStatus::LoadedPage,
            Some(last) if !view.is_last_page(last.len()) => PageableStatus::LoadedPage,
            Some(_) => PageableStatus::Completed,
        };

        view.next_page_key = if status.is_terminal() {
            None
        } else {
            next_page_key
        };
        view.pages = pages;
        view.status = status;
        view
    }
}

impl<K: Clone, Item> PageableView<K, Item> {
    /// Apply a partial update, returning a new view
    ///
    /// Fields the update leaves unset keep their current value. The error
    /// fields are only ever removed through [`ViewUpdate::clear_error`].
    pub fn copy_with(&self, update: ViewUpdate<K, Item>) -> Self {
        let ViewUpdate {
            pages,
            status,
            next_page_key,
            error,
            stack_trace,
            clear_error,
        } = update;

        let (error, stack_trace) = if clear_error {
            (None, None)
        } else {
            (
                error.or_else(|| self.error.clone()),
                stack_trace.or_else(|| self.stack_trace.clone()),
            )
        };

        Self {
            pages: pages.unwrap_or_else(|| self.pages.clone()),
            status: status.unwrap_or(self.status),
            next_page_key: next_page_key.unwrap_or_else(|| self.next_page_key.clone()),
            error,
            stack_trace,
            page_size: self.page_size,
            show_log: self.show_log,
        }
    }
}

/// Partial override set for [`PageableView::copy_with`]
///
/// ```
/// use pageable::model::{PageableStatus, PageableView, ViewUpdate};
///
/// let view: PageableView<u32, u32> = PageableView::initial(10, false);
/// let next = view.copy_with(ViewUpdate::new().status(PageableStatus::LoadingFirstPage));
/// assert_eq!(next.status(), PageableStatus::LoadingFirstPage);
/// assert_eq!(view.status(), PageableStatus::Initial);
/// ```
pub struct ViewUpdate<K, Item> {
    pages: Option<Vec<PageResult<K, Item>>>,
    status: Option<PageableStatus>,
    next_page_key: Option<Option<K>>,
    error: Option<SharedError>,
    stack_trace: Option<Arc<SpanTrace>>,
    clear_error: bool,
}

impl<K, Item> Default for ViewUpdate<K, Item> {
    fn default() -> Self {
        Self {
            pages: None,
            status: None,
            next_page_key: None,
            error: None,
            stack_trace: None,
            clear_error: false,
        }
    }
}

impl<K, Item> ViewUpdate<K, Item> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pages(mut self, pages: Vec<PageResult<K, Item>>) -> Self {
        self.pages = Some(pages);
        self
    }

    pub fn status(mut self, status: PageableStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Override the next page key; `None` clears it
    pub fn next_page_key(mut self, key: Option<K>) -> Self {
        self.next_page_key = Some(key);
        self
    }

    pub fn error(mut self, error: SharedError) -> Self {
        self.error = Some(error);
        self
    }

    pub fn stack_trace(mut self, stack_trace: Arc<SpanTrace>) -> Self {
        self.stack_trace = Some(stack_trace);
        self
    }

    pub fn clear_error(mut self) -> Self {
        self.clear_error = true;
        self
    }
}
