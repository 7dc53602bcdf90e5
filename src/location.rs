use std::cell::RefCell;
use std::rc::Rc;

use tracing::{debug, trace};
use url::Url;

use crate::domain::TRError;

const APP_BASE: &str = "rtrack://app/";

/// Read/write access to the query parameters of the current location.
pub trait Location {
    fn query_param(&self, key: &str) -> Option<String>;
    /// Edits the current history entry in place. `None` removes the key.
    fn replace_query_param(&mut self, key: &str, value: Option<&str>);
}

pub trait Navigator {
    fn navigate_to(&mut self, path: &str, params: &[(&str, String)]) -> Result<(), TRError>;
}

/// In-app history of locations. The last entry is the current one.
#[derive(Debug)]
pub struct Router {
    history: Vec<Url>,
}

pub type SharedRouter = Rc<RefCell<Router>>;

impl Router {
    pub fn new(location: &str) -> Result<Self, TRError> {
        let url = Url::parse(APP_BASE)?.join(location)?;
        debug!("Initial location {url}");
        Ok(Router { history: vec![url] })
    }

    pub fn shared(self) -> SharedRouter {
        Rc::new(RefCell::new(self))
    }

    pub fn current(&self) -> &Url {
        // history is never empty, see `back`
        &self.history[self.history.len() - 1]
    }

    fn current_mut(&mut self) -> &mut Url {
        let last = self.history.len() - 1;
        &mut self.history[last]
    }

    pub fn path(&self) -> &str {
        self.current().path()
    }

    pub fn depth(&self) -> usize {
        self.history.len()
    }

    pub fn back(&mut self) -> bool {
        if self.history.len() > 1 {
            self.history.pop();
            trace!("Back to {}", self.current());
            true
        } else {
            false
        }
    }
}

impl Location for Router {
    fn query_param(&self, key: &str) -> Option<String> {
        self.current()
            .query_pairs()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
    }

    fn replace_query_param(&mut self, key: &str, value: Option<&str>) {
        let url = self.current_mut();
        let mut pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        match (pairs.iter().position(|(k, _)| k == key), value) {
            (Some(idx), Some(v)) => pairs[idx].1 = v.to_string(),
            (Some(idx), None) => {
                pairs.remove(idx);
            }
            (None, Some(v)) => pairs.push((key.to_string(), v.to_string())),
            (None, None) => return,
        }
        if pairs.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(pairs);
        }
        trace!("Replaced location with {url}");
    }
}

fn location_url(path: &str, params: &[(&str, String)]) -> Result<Url, TRError> {
    let mut url = Url::parse(APP_BASE)?.join(path)?;
    let params: Vec<&(&str, String)> = params.iter().filter(|(_, v)| !v.is_empty()).collect();
    if !params.is_empty() {
        url.query_pairs_mut()
            .extend_pairs(params.iter().map(|(k, v)| (*k, v.as_str())));
    }
    Ok(url)
}

impl Router {
    /// Like `navigate_to`, but swaps the current entry instead of pushing.
    pub fn replace_to(&mut self, path: &str, params: &[(&str, String)]) -> Result<(), TRError> {
        let url = location_url(path, params)?;
        debug!("Replace location with {url}");
        *self.current_mut() = url;
        Ok(())
    }
}

impl Navigator for Router {
    fn navigate_to(&mut self, path: &str, params: &[(&str, String)]) -> Result<(), TRError> {
        let url = location_url(path, params)?;
        debug!("Navigate to {url}");
        self.history.push(url);
        Ok(())
    }
}

/// The location as seen by one screen: empty while another path is
/// current, and writes are dropped.
pub struct ScopedLocation {
    router: SharedRouter,
    path: String,
}

impl ScopedLocation {
    pub fn new(router: SharedRouter, path: &str) -> Self {
        ScopedLocation {
            router,
            path: path.to_string(),
        }
    }

    fn is_current(&self) -> bool {
        self.router.borrow().path() == self.path
    }
}

impl Location for ScopedLocation {
    fn query_param(&self, key: &str) -> Option<String> {
        if self.is_current() {
            self.router.borrow().query_param(key)
        } else {
            None
        }
    }

    fn replace_query_param(&mut self, key: &str, value: Option<&str>) {
        if self.is_current() {
            self.router.borrow_mut().replace_query_param(key, value);
        } else {
            trace!("Ignoring {key} write for inactive {}", self.path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_params_from_shared_link() {
        let router = Router::new("/tickets?searchText=dave&page=3").unwrap();
        assert_eq!(router.path(), "/tickets");
        assert_eq!(router.query_param("page"), Some("3".to_string()));
        assert_eq!(router.query_param("searchText"), Some("dave".to_string()));
        assert_eq!(router.query_param("missing"), None);
    }

    #[test]
    fn replace_keeps_history_depth_and_other_params() {
        let mut router = Router::new("/tickets?searchText=dave").unwrap();
        router.replace_query_param("page", Some("2"));
        router.replace_query_param("page", Some("4"));
        assert_eq!(router.depth(), 1);
        assert_eq!(router.current().query(), Some("searchText=dave&page=4"));
        router.replace_query_param("searchText", None);
        assert_eq!(router.current().query(), Some("page=4"));
        router.replace_query_param("page", None);
        assert_eq!(router.current().query(), None);
    }

    #[test]
    fn navigation_pushes_and_back_pops() {
        let mut router = Router::new("/tickets").unwrap();
        router
            .navigate_to("/tickets/form", &[("ticketId", "12".to_string())])
            .unwrap();
        assert_eq!(router.depth(), 2);
        assert_eq!(router.path(), "/tickets/form");
        assert_eq!(router.query_param("ticketId"), Some("12".to_string()));
        assert!(router.back());
        assert!(!router.back());
        assert_eq!(router.path(), "/tickets");
    }

    #[test]
    fn replace_to_keeps_history_depth() {
        let mut router = Router::new("/tickets?page=3").unwrap();
        router
            .replace_to("/customers", &[("searchText", "anna".to_string()), ("page", String::new())])
            .unwrap();
        assert_eq!(router.depth(), 1);
        assert_eq!(router.path(), "/customers");
        assert_eq!(router.current().query(), Some("searchText=anna"));
        assert!(!router.back());
    }

    #[test]
    fn scoped_location_only_sees_its_own_path() {
        let router = Router::new("/tickets?page=2").unwrap().shared();
        let mut customers = ScopedLocation::new(router.clone(), "/customers");
        let tickets = ScopedLocation::new(router.clone(), "/tickets");
        assert_eq!(customers.query_param("page"), None);
        customers.replace_query_param("page", Some("5"));
        assert_eq!(tickets.query_param("page"), Some("2".to_string()));
    }
}
