use strum::{Display, EnumIter};

/// Lifecycle status of a pageable list
///
/// `Completed` and `NoItemsFound` are terminal: nothing moves the list on
/// from there except `refresh` or `clear`. The error statuses stay put until
/// `retry` is called.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, EnumIter)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum PageableStatus {
    #[default]
    Initial,
    LoadingFirstPage,
    LoadedPage,
    LoadingNewPage,
    NoItemsFound,
    FirstPageError,
    NewPageError,
    Completed,
    Refreshing,
}

impl PageableStatus {
    pub fn is_initial(self) -> bool {
        self == Self::Initial
    }

    pub fn is_loading_first_page(self) -> bool {
        self == Self::LoadingFirstPage
    }

    /// A page is on screen and no request is running
    pub fn is_loaded(self) -> bool {
        matches!(self, Self::LoadedPage | Self::Completed)
    }

    pub fn is_loading_more(self) -> bool {
        self == Self::LoadingNewPage
    }

    pub fn is_no_items_found(self) -> bool {
        self == Self::NoItemsFound
    }

    pub fn is_first_page_error(self) -> bool {
        self == Self::FirstPageError
    }

    pub fn is_loading_more_error(self) -> bool {
        self == Self::NewPageError
    }

    pub fn is_completed(self) -> bool {
        self == Self::Completed
    }

    pub fn is_refreshing(self) -> bool {
        self == Self::Refreshing
    }

    pub fn is_loading(self) -> bool {
        self.is_loading_first_page() || self.is_loading_more()
    }

    pub fn has_error(self) -> bool {
        self.is_first_page_error() || self.is_loading_more_error()
    }

    /// Whether `fetch_next_page` is allowed to start from this status
    ///
    /// A failed next page can be fetched again, which is how `retry` resumes.
    pub fn can_load_more(self) -> bool {
        self.is_loaded() || self.is_loading_more_error()
    }

    /// Statuses that nothing but `refresh` or `clear` moves on from
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::NoItemsFound)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::*;
    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn test_default_is_initial() {
        assert_eq!(PageableStatus::default(), PageableStatus::Initial);
    }

    #[rstest]
    #[case(PageableStatus::Initial, false)]
    #[case(PageableStatus::LoadingFirstPage, false)]
    #[case(PageableStatus::LoadedPage, true)]
    #[case(PageableStatus::LoadingNewPage, false)]
    #[case(PageableStatus::NoItemsFound, false)]
    #[case(PageableStatus::FirstPageError, false)]
    #[case(PageableStatus::NewPageError, true)]
    #[case(PageableStatus::Completed, true)]
    #[case(PageableStatus::Refreshing, false)]
    fn test_can_load_more(#[case] status: PageableStatus, #[case] expected: bool) {
        assert_eq!(status.can_load_more(), expected);
    }

    #[rstest]
    #[case(PageableStatus::LoadingFirstPage, true)]
    #[case(PageableStatus::LoadingNewPage, true)]
    #[case(PageableStatus::Refreshing, false)]
    #[case(PageableStatus::LoadedPage, false)]
    fn test_is_loading(#[case] status: PageableStatus, #[case] expected: bool) {
        assert_eq!(status.is_loading(), expected);
    }

    #[test]
    fn test_only_error_statuses_have_error() {
        let with_error: Vec<_> = PageableStatus::iter()
            .filter(|status| status.has_error())
            .collect();
        assert_eq!(
            with_error,
            vec![PageableStatus::FirstPageError, PageableStatus::NewPageError]
        );
    }

    #[test]
    fn test_terminal_statuses() {
        let terminal: Vec<_> = PageableStatus::iter()
            .filter(|status| status.is_terminal())
            .collect();
        assert_eq!(
            terminal,
            vec![PageableStatus::NoItemsFound, PageableStatus::Completed]
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(PageableStatus::LoadingFirstPage.to_string(), "LOADING_FIRST_PAGE");
        assert_eq!(PageableStatus::NewPageError.to_string(), "NEW_PAGE_ERROR");
    }
}
