//! Predictive search for the drawer's search box.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use cart_client::CartApi;
use cart_core::{CartError, SearchSuggestions};
use futures::future::{AbortHandle, Abortable};
use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::debug;

use crate::config::SyncConfig;

/// How long a cached result stays usable.
pub const CACHE_TTL: Duration = Duration::from_secs(5 * 60);

/// Result of one keystroke.
#[derive(Debug, Clone, PartialEq)]
pub enum SuggestOutcome {
    /// The query is shorter than the minimum; show nothing.
    TooShort,
    /// Suggestions for this query.
    Results(SearchSuggestions),
    /// A newer query arrived first; ignore.
    Stale,
}

#[derive(Debug, Default)]
struct SessionState {
    latest: u64,
    inflight: Option<AbortHandle>,
    cache: HashMap<String, (Instant, SearchSuggestions)>,
}

/// One search box. Only the newest query's results are ever returned.
pub struct SuggestionSession {
    api: Arc<dyn CartApi>,
    min_len: usize,
    limit: u32,
    debounce: Duration,
    state: Mutex<SessionState>,
}

impl SuggestionSession {
    pub fn new(api: Arc<dyn CartApi>, config: &SyncConfig) -> Self {
        Self {
            api,
            min_len: config.search_min_query_len,
            limit: config.search_limit,
            debounce: config.search_debounce(),
            state: Mutex::new(SessionState::default()),
        }
    }

    /// Handle a change of the search input.
    pub async fn query(&self, raw: &str) -> Result<SuggestOutcome, CartError> {
        let query = raw.trim().to_lowercase();
        let ticket = {
            let mut state = self.state.lock();
            state.latest += 1;
            if let Some(inflight) = state.inflight.take() {
                inflight.abort();
            }
            state.latest
        };

        if query.chars().count() < self.min_len {
            return Ok(SuggestOutcome::TooShort);
        }
        if let Some(hit) = self.cached(&query) {
            debug!(query = %query, "suggestion cache hit");
            return Ok(SuggestOutcome::Results(hit));
        }

        tokio::time::sleep(self.debounce).await;

        let (handle, registration) = AbortHandle::new_pair();
        {
            let mut state = self.state.lock();
            if state.latest != ticket {
                return Ok(SuggestOutcome::Stale);
            }
            state.inflight = Some(handle);
        }

        let request = self.api.suggest(&query, self.limit);
        let suggestions = match Abortable::new(request, registration).await {
            Ok(result) => result?,
            Err(_aborted) => return Ok(SuggestOutcome::Stale),
        };

        let mut state = self.state.lock();
        state
            .cache
            .insert(query, (Instant::now(), suggestions.clone()));
        if state.latest != ticket {
            return Ok(SuggestOutcome::Stale);
        }
        state.inflight = None;
        Ok(SuggestOutcome::Results(suggestions))
    }

    /// Forget the query in progress and any cached results.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.latest += 1;
        if let Some(inflight) = state.inflight.take() {
            inflight.abort();
        }
        state.cache.clear();
    }

    fn cached(&self, query: &str) -> Option<SearchSuggestions> {
        let mut state = self.state.lock();
        let now = Instant::now();
        state.cache.retain(|_, (at, _)| now.duration_since(*at) < CACHE_TTL);
        state.cache.get(query).map(|(_, hit)| hit.clone())
    }
}

impl std::fmt::Debug for SuggestionSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SuggestionSession")
            .field("min_len", &self.min_len)
            .field("limit", &self.limit)
            .field("debounce", &self.debounce)
            .finish()
    }
}
