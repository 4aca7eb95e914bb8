//! Address search-as-you-type.
//!
//! The controller runs on logical time (milliseconds supplied by the caller)
//! and never awaits anything itself: the caller polls it for a due query,
//! runs the query, and feeds the response back tagged with its generation.
//!
//! ```text
//! Idle ──input≥min──► Debouncing ──deadline──► Fetching ──ok──► ResultsShown
//!  ▲                     │  ▲                     │
//!  └────input<min────────┘  └──────input──────────┘──err──► Failed (hidden)
//! ```

use tokio::sync::mpsc::UnboundedSender;

use crate::client::ClientError;
use crate::logging::{self, obj, v_int, v_str, Domain};
use crate::model::Address;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    ArrowDown,
    ArrowUp,
    Enter,
    Escape,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchPhase {
    Idle,
    Debouncing,
    Fetching,
    ResultsShown,
    /// Last query failed; the list is hidden.
    Failed,
}

/// A query that is due to be sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub generation: u64,
    pub query: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultItem {
    pub title: String,
    pub subtitle: String,
}

impl From<&Address> for ResultItem {
    fn from(a: &Address) -> Self {
        Self {
            title: a.text.clone(),
            subtitle: a.subtitle(),
        }
    }
}

/// The text input and its dropdown.
pub trait SearchView {
    fn set_input_text(&mut self, text: &str);
    fn show_results(&mut self, items: &[ResultItem]);
    fn hide_results(&mut self);
    fn highlight(&mut self, index: Option<usize>);
}

#[derive(Debug, Clone)]
struct PendingQuery {
    deadline: u64,
    query: String,
}

pub struct SearchController<V: SearchView> {
    view: V,
    on_select: UnboundedSender<Address>,
    debounce_ms: u64,
    min_query_len: usize,
    phase: SearchPhase,
    pending: Option<PendingQuery>,
    /// Last generation handed out by `poll`.
    issued: u64,
    /// Generation whose response will be applied, if any.
    awaiting: Option<u64>,
    results: Vec<Address>,
    active: Option<usize>,
    open: bool,
}

impl<V: SearchView> SearchController<V> {
    pub fn new(view: V, on_select: UnboundedSender<Address>, debounce_ms: u64, min_query_len: usize) -> Self {
        Self {
            view,
            on_select,
            debounce_ms,
            min_query_len,
            phase: SearchPhase::Idle,
            pending: None,
            issued: 0,
            awaiting: None,
            results: Vec::new(),
            active: None,
            open: false,
        }
    }

    /// A change of the input text at time `now`.
    ///
    /// Cancels any scheduled query and invalidates any response still in
    /// flight; the in-flight request itself cannot be cancelled.
    pub fn on_input(&mut self, now: u64, text: &str) {
        let query = text.trim();
        self.pending = None;
        self.awaiting = None;

        if query.chars().count() < self.min_query_len {
            self.hide_results();
            self.phase = SearchPhase::Idle;
            return;
        }

        self.pending = Some(PendingQuery {
            deadline: now + self.debounce_ms,
            query: query.to_string(),
        });
        self.phase = SearchPhase::Debouncing;
    }

    /// When the scheduled query becomes due.
    pub fn next_deadline(&self) -> Option<u64> {
        self.pending.as_ref().map(|p| p.deadline)
    }

    /// Hands out the scheduled query once its deadline has passed.
    pub fn poll(&mut self, now: u64) -> Option<SearchRequest> {
        if self.pending.as_ref()?.deadline > now {
            return None;
        }
        let pending = self.pending.take()?;
        self.issued += 1;
        self.awaiting = Some(self.issued);
        self.phase = SearchPhase::Fetching;

        logging::debug(
            Domain::Search,
            "search.dispatch",
            obj(&[("generation", v_int(self.issued)), ("query", v_str(&pending.query))]),
        );
        Some(SearchRequest {
            generation: self.issued,
            query: pending.query,
        })
    }

    /// Applies a search response. Returns false when the response was stale.
    pub fn on_results(&mut self, generation: u64, result: Result<Vec<Address>, ClientError>) -> bool {
        if self.awaiting != Some(generation) {
            logging::debug(
                Domain::Search,
                "search.stale",
                obj(&[("generation", v_int(generation)), ("latest", v_int(self.issued))]),
            );
            return false;
        }
        self.awaiting = None;

        match result {
            Ok(results) => {
                self.results = results;
                self.active = None;
                if self.results.is_empty() {
                    self.hide_results();
                    self.phase = SearchPhase::Idle;
                } else {
                    let items: Vec<ResultItem> = self.results.iter().map(ResultItem::from).collect();
                    self.view.show_results(&items);
                    self.open = true;
                    self.phase = SearchPhase::ResultsShown;
                }
            }
            Err(e) => {
                logging::warn(
                    Domain::Search,
                    "search.failed",
                    obj(&[("generation", v_int(generation)), ("error", v_str(&e.to_string()))]),
                );
                self.hide_results();
                self.phase = SearchPhase::Failed;
            }
        }
        true
    }

    /// Keyboard handling while the list is open. Returns the selected
    /// address when Enter picks one.
    pub fn on_key(&mut self, key: Key) -> Option<Address> {
        if !self.open {
            return None;
        }
        match key {
            Key::ArrowDown => {
                let last = self.results.len().saturating_sub(1);
                self.active = Some(self.active.map_or(0, |i| (i + 1).min(last)));
                self.view.highlight(self.active);
                None
            }
            Key::ArrowUp => {
                // Clamped at the first item; never back to "no selection".
                self.active = Some(self.active.map_or(0, |i| i.saturating_sub(1)));
                self.view.highlight(self.active);
                None
            }
            Key::Enter => match self.active {
                Some(i) => self.select(i),
                None => None,
            },
            Key::Escape => {
                self.close();
                None
            }
            Key::Other => None,
        }
    }

    /// A click outside both the input and the list.
    pub fn on_click_outside(&mut self) {
        if self.open {
            self.close();
        }
    }

    /// Selects result `index`: fills the input, closes the list and emits the
    /// address to the registered consumer.
    pub fn select(&mut self, index: usize) -> Option<Address> {
        let address = self.results.get(index).cloned()?;
        self.view.set_input_text(&address.text);
        self.close();

        logging::info(
            Domain::Search,
            "search.selected",
            obj(&[("text", v_str(&address.text)), ("knr", v_str(&address.kommunenummer))]),
        );
        if self.on_select.send(address.clone()).is_err() {
            logging::warn(Domain::Search, "search.no_consumer", obj(&[]));
        }
        Some(address)
    }

    fn close(&mut self) {
        self.hide_results();
        if self.phase == SearchPhase::ResultsShown {
            self.phase = SearchPhase::Idle;
        }
    }

    fn hide_results(&mut self) {
        self.open = false;
        self.active = None;
        self.results.clear();
        self.view.hide_results();
    }

    pub fn phase(&self) -> SearchPhase {
        self.phase
    }

    pub fn active_index(&self) -> Option<usize> {
        self.active
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn results(&self) -> &[Address] {
        &self.results
    }

    pub fn view(&self) -> &V {
        &self.view
    }
}
