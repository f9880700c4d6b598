//! # Pageable - incremental pagination for async Rust
//!
//! A [`PageableController`] loads a list page by page through an injected
//! fetcher and publishes an immutable [`PageableView`] snapshot after every
//! state change. It guarantees that:
//!
//! - concurrent first-page loads and refreshes share a single fetch,
//! - bursts of "load more" triggers are debounced into one fetch,
//! - failed fetches are retried according to a [`RetryPolicy`],
//! - nothing is published once the controller is disposed.
//!
//! ## Example Usage
//!
//! ```rust
//! use pageable::{PageableController, PageableStatus};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> color_eyre::eyre::Result<()> {
//! let controller: PageableController<u32, u32> = PageableController::builder()
//!     .fetch_page(|page| async move { Ok((page * 2..page * 2 + 2).collect()) })
//!     .first_page_key(0)
//!     .page_size(2)
//!     .next_page_key_generator(|page, _, _| (*page < 2).then(|| page + 1))
//!     .build()?;
//!
//! controller.fetch_first_page().await;
//! assert_eq!(controller.status(), PageableStatus::LoadedPage);
//! assert_eq!(controller.item_list(), vec![0, 1]);
//!
//! controller.fetch_next_page().await;
//! assert_eq!(controller.item_list(), vec![0, 1, 2, 3]);
//! controller.dispose();
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`controller`] - The pagination controller and its builder
//! - [`model`] - View snapshot, page results and statuses
//! - [`observable`] - Latest-value broadcast used to publish views
//! - [`debounce`] - Trailing-edge debouncer
//! - [`retry`] - Retry policy for fetches
//! - [`infrastructure`] - Configuration, CLI and the demo data source

pub mod controller;
pub mod debounce;
pub mod error;
pub mod infrastructure;
pub mod model;
pub mod observable;
pub mod retry;
pub mod utils;

pub use controller::{ControllerOptions, PageableController, PageableControllerBuilder};
pub use error::BuildError;
pub use model::{PageResult, PageableStatus, PageableView};
pub use observable::{Observable, Subscription};
pub use retry::RetryPolicy;

pub type Result<T> = color_eyre::eyre::Result<T>;
