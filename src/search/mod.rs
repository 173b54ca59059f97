use std::time::{Duration, Instant};

/// Holds back search-term edits until the input has been quiet for `delay`.
#[derive(Debug, Clone)]
pub struct SearchDebouncer {
    delay: Duration,
    applied: String,
    pending: Option<PendingTerm>,
}

#[derive(Debug, Clone)]
struct PendingTerm {
    term: String,
    since: Instant,
}

impl SearchDebouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            applied: String::new(),
            pending: None,
        }
    }

    /// The term the visible list was last loaded with.
    pub fn applied(&self) -> &str {
        &self.applied
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Records an edit. Each edit restarts the quiet period.
    pub fn push(&mut self, input: &str, now: Instant) {
        let term = normalize_term(input);
        if term == self.applied {
            self.pending = None;
            return;
        }
        self.pending = Some(PendingTerm { term, since: now });
    }

    /// Returns the term to load once the quiet period has elapsed. The term
    /// stays pending until `commit` records that the load succeeded.
    pub fn poll(&self, now: Instant) -> Option<String> {
        let pending = self.pending.as_ref()?;
        if now.saturating_duration_since(pending.since) < self.delay {
            return None;
        }
        Some(pending.term.clone())
    }

    /// Returns a pending term immediately, ignoring the delay.
    pub fn flush(&self) -> Option<String> {
        self.pending.as_ref().map(|pending| pending.term.clone())
    }

    /// Marks `term` as the one the visible list is now loaded with.
    pub fn commit(&mut self, term: &str) {
        self.applied = term.to_string();
        if self
            .pending
            .as_ref()
            .is_some_and(|pending| pending.term == term)
        {
            self.pending = None;
        }
    }
}

fn normalize_term(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}
