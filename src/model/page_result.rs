use std::sync::Arc;

/// The output of one successful fetch: a page key and the items it returned
///
/// Items are held behind an `Arc` so that copying a view (which happens on
/// every published transition) never copies item data.
#[derive(Debug, PartialEq, Eq)]
pub struct PageResult<K, Item> {
    page_key: K,
    items: Arc<[Item]>,
}

impl<K: Clone, Item> Clone for PageResult<K, Item> {
    fn clone(&self) -> Self {
        Self {
            page_key: self.page_key.clone(),
            items: Arc::clone(&self.items),
        }
    }
}

impl<K, Item> PageResult<K, Item> {
    pub fn new(page_key: K, items: Vec<Item>) -> Self {
        Self {
            page_key,
            items: Arc::from(items),
        }
    }

    pub fn page_key(&self) -> &K {
        &self.page_key
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
