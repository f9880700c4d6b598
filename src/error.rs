use thiserror::Error;

/// Why a [`PageableControllerBuilder`](crate::controller::PageableControllerBuilder)
/// refused to build
///
/// These are programmer errors in the owning code; nothing is clamped or
/// defaulted silently.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    #[error("page_size must be at least 1, got {0}")]
    InvalidPageSize(usize),

    #[error("no fetch_page callback was provided")]
    MissingFetchPage,

    #[error("no first_page_key was provided")]
    MissingFirstPageKey,

    #[error("initial view has page_size {view}, but the controller is configured with {configured}")]
    PageSizeMismatch { view: usize, configured: usize },

    #[error("a tokio runtime is required to defer on_ready and the automatic first fetch")]
    NoRuntime,
}
