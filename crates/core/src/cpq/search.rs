use std::time::{Duration, Instant};

use crate::cpq::catalog::ProductQuery;
use crate::domain::product::Product;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SearchSettings {
    pub min_query_chars: usize,
    pub debounce: Duration,
    pub recent_limit: usize,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self { min_query_chars: 3, debounce: Duration::from_millis(500), recent_limit: 5 }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SearchInput {
    /// Input was emptied or is too short; results were cleared.
    Cleared,
    /// A search is due once the debounce window has elapsed.
    Scheduled { due_at: Instant },
}

/// A dispatched search. Only the ticket for the latest input may publish results.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchTicket {
    generation: u64,
    pub term: String,
    pub query: ProductQuery,
}

/// Search box state: debounced dispatch, last-writer-wins results, recent terms.
#[derive(Clone, Debug, Default)]
pub struct SearchSession {
    settings: SearchSettings,
    term: String,
    generation: u64,
    due_at: Option<Instant>,
    results: Vec<Product>,
    no_results: bool,
    recent: Vec<String>,
}

impl SearchSession {
    pub fn new(settings: SearchSettings) -> Self {
        Self { settings, ..Self::default() }
    }

    pub fn settings(&self) -> SearchSettings {
        self.settings
    }

    pub fn term(&self) -> &str {
        &self.term
    }

    pub fn results(&self) -> &[Product] {
        &self.results
    }

    /// True when the latest completed search returned nothing.
    pub fn no_results(&self) -> bool {
        self.no_results
    }

    /// Most recent first.
    pub fn recent_searches(&self) -> &[String] {
        &self.recent
    }

    /// Records new input. Any in-flight search is superseded.
    pub fn set_term(&mut self, term: &str, now: Instant) -> SearchInput {
        self.term = term.to_string();
        self.generation += 1;

        if self.term.trim().chars().count() < self.settings.min_query_chars {
            self.due_at = None;
            self.results.clear();
            self.no_results = false;
            return SearchInput::Cleared;
        }

        let due_at = now + self.settings.debounce;
        self.due_at = Some(due_at);
        SearchInput::Scheduled { due_at }
    }

    /// Hands out the pending search once its debounce window has elapsed.
    pub fn poll(&mut self, now: Instant) -> Option<SearchTicket> {
        match self.due_at {
            Some(due_at) if now >= due_at => {
                self.due_at = None;
                Some(self.ticket())
            }
            _ => None,
        }
    }

    /// Skips the debounce window, e.g. when a recent search is picked.
    pub fn submit(&mut self, term: &str) -> Option<SearchTicket> {
        match self.set_term(term, Instant::now()) {
            SearchInput::Cleared => None,
            SearchInput::Scheduled { .. } => {
                self.due_at = None;
                Some(self.ticket())
            }
        }
    }

    /// Publishes results for `ticket`. Returns false when newer input superseded it.
    pub fn complete(&mut self, ticket: &SearchTicket, results: Vec<Product>) -> bool {
        if ticket.generation != self.generation {
            return false;
        }

        self.no_results = results.is_empty();
        if !results.is_empty() && !self.recent.iter().any(|term| term == &ticket.term) {
            self.recent.insert(0, ticket.term.clone());
            self.recent.truncate(self.settings.recent_limit);
        }
        self.results = results;
        true
    }

    pub fn clear(&mut self) {
        self.term.clear();
        self.generation += 1;
        self.due_at = None;
        self.results.clear();
        self.no_results = false;
    }

    fn ticket(&self) -> SearchTicket {
        SearchTicket {
            generation: self.generation,
            term: self.term.clone(),
            query: ProductQuery::classify(&self.term),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use rust_decimal::Decimal;

    use super::{SearchInput, SearchSession, SearchSettings};
    use crate::cpq::catalog::ProductQuery;
    use crate::domain::product::Product;

    fn product(part_number: &str) -> Product {
        Product::new(part_number, part_number, "Widget", Decimal::ONE).expect("product")
    }

    fn session() -> SearchSession {
        SearchSession::new(SearchSettings {
            min_query_chars: 3,
            debounce: Duration::from_millis(500),
            recent_limit: 2,
        })
    }

    #[test]
    fn short_input_clears_results_without_dispatch() {
        let mut search = session();
        let ticket = search.submit("valve").expect("ticket");
        search.complete(&ticket, vec![product("AB-1")]);

        let now = Instant::now();
        assert_eq!(search.set_term("va", now), SearchInput::Cleared);
        assert!(search.results().is_empty());
        assert!(search.poll(now + Duration::from_secs(5)).is_none());
    }

    #[test]
    fn dispatch_waits_for_debounce_window() {
        let mut search = session();
        let start = Instant::now();
        search.set_term("val", start);
        search.set_term("valve", start + Duration::from_millis(300));

        assert!(search.poll(start + Duration::from_millis(700)).is_none());
        let ticket = search.poll(start + Duration::from_millis(800)).expect("due");
        assert_eq!(ticket.term, "valve");
        assert_eq!(ticket.query, ProductQuery::PartNumber("valve".into()));
        assert!(search.poll(start + Duration::from_secs(2)).is_none(), "dispatched once");
    }

    #[test]
    fn newer_input_supersedes_older_results() {
        let mut search = session();
        let older = search.submit("valve").expect("older");
        let newer = search.submit("gauge").expect("newer");

        assert!(search.complete(&newer, vec![product("GG-1")]));
        assert!(!search.complete(&older, vec![product("VV-1")]));
        assert_eq!(search.results()[0].part_number, "GG-1");
    }

    #[test]
    fn empty_results_flag_no_results_and_skip_recent() {
        let mut search = session();
        let ticket = search.submit("nothing").expect("ticket");
        assert!(search.complete(&ticket, Vec::new()));

        assert!(search.no_results());
        assert!(search.recent_searches().is_empty());
    }

    #[test]
    fn recent_searches_are_deduplicated_and_bounded() {
        let mut search = session();
        for term in ["valve", "gauge", "valve", "flange"] {
            let ticket = search.submit(term).expect("ticket");
            search.complete(&ticket, vec![product("AB-1")]);
        }

        assert_eq!(search.recent_searches(), ["flange", "gauge"]);
    }

    #[test]
    fn clear_resets_term_and_results() {
        let mut search = session();
        let ticket = search.submit("valve").expect("ticket");
        search.clear();

        assert!(!search.complete(&ticket, vec![product("AB-1")]));
        assert_eq!(search.term(), "");
        assert!(search.results().is_empty());
        assert!(!search.no_results());
    }
}
