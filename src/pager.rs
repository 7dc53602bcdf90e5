use std::ops::Range;

use tracing::{debug, trace};

use crate::location::Location;

pub const PAGE_KEY: &str = "page";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageState {
    pub index: usize,
    pub size: usize,
}

impl PageState {
    pub fn page_count(&self, rows: usize) -> usize {
        rows.div_ceil(self.size.max(1))
    }

    pub fn clamped(&self, rows: usize) -> usize {
        match self.page_count(rows) {
            0 => 0,
            pages => self.index.min(pages - 1),
        }
    }

    pub fn can_previous(&self) -> bool {
        self.index > 0
    }

    pub fn can_next(&self, rows: usize) -> bool {
        self.index + 1 < self.page_count(rows)
    }

    pub fn range(&self, rows: usize) -> Range<usize> {
        let start = (self.index * self.size).min(rows);
        start..(start + self.size).min(rows)
    }
}

/// Keeps the zero-based page index in step with the one-based `page` query
/// parameter. Page moves replace the current history entry.
pub struct Pager {
    location: Box<dyn Location>,
    state: PageState,
}

impl Pager {
    pub fn new(location: Box<dyn Location>, size: usize) -> Self {
        let mut pager = Pager {
            location,
            state: PageState { index: 0, size },
        };
        pager.state.index = pager.read_location();
        pager
    }

    fn read_location(&self) -> usize {
        self.location
            .query_param(PAGE_KEY)
            .and_then(|p| p.trim().parse::<usize>().ok())
            .map(|p| p.saturating_sub(1))
            .unwrap_or(0)
    }

    pub fn state(&self) -> PageState {
        self.state
    }

    /// Picks up a page index that changed outside of the pager, e.g. after
    /// navigating back to this screen.
    pub fn sync_from_location(&mut self, rows: usize) {
        if self.location.query_param(PAGE_KEY).is_some() {
            self.state.index = self.read_location();
        }
        self.clamp(rows);
    }

    pub fn set_index(&mut self, index: usize, rows: usize) {
        self.state.index = index;
        self.state.index = self.state.clamped(rows);
        debug!("Page set to {} (requested {index})", self.state.index);
        self.write_location();
    }

    pub fn next(&mut self, rows: usize) {
        if self.state.can_next(rows) {
            self.set_index(self.state.index + 1, rows);
        }
    }

    pub fn previous(&mut self, rows: usize) {
        if self.state.can_previous() {
            self.set_index(self.state.index - 1, rows);
        }
    }

    pub fn first(&mut self, rows: usize) {
        self.set_index(0, rows);
    }

    pub fn last(&mut self, rows: usize) {
        self.set_index(self.state.page_count(rows).saturating_sub(1), rows);
    }

    /// Re-establishes the index bound after the row count changed.
    pub fn clamp(&mut self, rows: usize) {
        let clamped = self.state.clamped(rows);
        if clamped != self.state.index {
            trace!("Clamping page {} to {clamped} for {rows} rows", self.state.index);
            self.state.index = clamped;
            self.write_location();
        }
    }

    fn write_location(&mut self) {
        let page = (self.state.index + 1).to_string();
        self.location.replace_query_param(PAGE_KEY, Some(&page));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::{Router, ScopedLocation, SharedRouter};

    fn make_pager(location: &str, size: usize) -> (Pager, SharedRouter) {
        let router = Router::new(location).unwrap().shared();
        let scoped = ScopedLocation::new(router.clone(), "/tickets");
        (Pager::new(Box::new(scoped), size), router)
    }

    #[test]
    fn page_state_bounds() {
        let state = PageState { index: 1, size: 10 };
        assert_eq!(state.page_count(12), 2);
        assert_eq!(state.page_count(0), 0);
        assert_eq!(state.range(12), 10..12);
        assert!(!state.can_next(12));
        assert!(state.can_previous());
        assert_eq!(PageState { index: 7, size: 10 }.clamped(12), 1);
        assert_eq!(PageState { index: 7, size: 10 }.clamped(0), 0);
    }

    #[test]
    fn initializes_from_one_based_parameter() {
        let (pager, _) = make_pager("/tickets?page=2", 10);
        assert_eq!(pager.state().index, 1);
        let (pager, _) = make_pager("/tickets", 10);
        assert_eq!(pager.state().index, 0);
        let (pager, _) = make_pager("/tickets?page=abc", 10);
        assert_eq!(pager.state().index, 0);
    }

    #[test]
    fn next_and_previous_write_back_without_new_history() {
        let (mut pager, router) = make_pager("/tickets", 10);
        pager.previous(25);
        assert_eq!(pager.state().index, 0);
        pager.next(25);
        pager.next(25);
        pager.next(25);
        assert_eq!(pager.state().index, 2);
        assert_eq!(router.borrow().query_param(PAGE_KEY), Some("3".to_string()));
        assert_eq!(router.borrow().depth(), 1);
        pager.previous(25);
        assert_eq!(router.borrow().query_param(PAGE_KEY), Some("2".to_string()));
    }

    #[test]
    fn out_of_range_requests_clamp() {
        let (mut pager, router) = make_pager("/tickets", 10);
        pager.set_index(40, 12);
        assert_eq!(pager.state().index, 1);
        assert_eq!(router.borrow().query_param(PAGE_KEY), Some("2".to_string()));
        pager.last(31);
        assert_eq!(pager.state().index, 3);
        pager.clamp(5);
        assert_eq!(pager.state().index, 0);
        assert_eq!(router.borrow().query_param(PAGE_KEY), Some("1".to_string()));
    }
}
