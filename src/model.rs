//! Pagination state model
//!
//! Pure data and pure transitions: nothing in here performs I/O, starts a
//! timer, or knows about the controller that drives it.

pub mod page_result;
pub mod status;
pub mod view;

use std::{fmt::Debug, hash::Hash};

pub use page_result::PageResult;
pub use status::PageableStatus;
pub use view::{PageableView, SharedError, ViewUpdate};

/// Bounds a page key must satisfy: keys are compared, hashed into the
/// in-flight set, and moved across tasks
pub trait PageKey: Clone + Eq + Hash + Debug + Send + Sync + 'static {}

impl<T> PageKey for T where T: Clone + Eq + Hash + Debug + Send + Sync + 'static {}

/// Bounds an item must satisfy to travel between fetch tasks and observers
pub trait PageItem: Send + Sync + 'static {}

impl<T> PageItem for T where T: Send + Sync + 'static {}
