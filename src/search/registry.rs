//! Registry of submitted search terms.

use crate::search::criteria::{SearchCriteria, SearchId, SearchType};
use std::collections::HashSet;

/// Ordered set of search terms for one loaded file
///
/// Ids are handed out sequentially from 1 and never reused within a session,
/// so a line's match ids stay meaningful for as long as the file is bound. The
/// id space is 16 bits: after 65535 accepted terms every further `add` returns
/// [`SearchId::REJECTED`] until [`reset`](SearchRegistry::reset) is called.
#[derive(Debug, Clone)]
pub struct SearchRegistry {
    items: Vec<SearchCriteria>,

    /// (type, pattern) of every entry, for constant-time duplicate checks
    terms: HashSet<(SearchType, String)>,

    next_id: u32,
}

impl SearchRegistry {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            terms: HashSet::new(),
            next_id: 1,
        }
    }

    /// Register a term and return its id
    ///
    /// Returns [`SearchId::REJECTED`] and leaves the registry untouched when a
    /// term with the same (type, pattern) exists or the id space is exhausted.
    /// A non-cumulative add disables the existing terms; they stay registered.
    pub fn add(&mut self, mut criteria: SearchCriteria, cumulative: bool) -> SearchId {
        let term = (criteria.search_type(), criteria.pattern().to_string());
        if self.terms.contains(&term) {
            return SearchId::REJECTED;
        }

        let Some(id) = u16::try_from(self.next_id).ok().and_then(SearchId::new) else {
            log::warn!("search id space exhausted; rejecting '{}'", criteria.pattern());
            return SearchId::REJECTED;
        };
        self.next_id += 1;

        if !cumulative {
            for existing in &mut self.items {
                existing.set_enabled(false);
            }
        }

        criteria.assign_id(id);
        self.terms.insert(term);
        self.items.push(criteria);
        id
    }

    /// Drop every term and restart ids at 1
    pub fn reset(&mut self) {
        self.items.clear();
        self.terms.clear();
        self.next_id = 1;
    }

    /// Terms in insertion order
    pub fn items(&self) -> impl Iterator<Item = &SearchCriteria> + '_ {
        self.items.iter()
    }

    pub fn get(&self, id: SearchId) -> Option<&SearchCriteria> {
        // Ids are assigned densely from 1, so an id is its position plus one
        let idx = usize::from(id.get()).checked_sub(1)?;
        self.items.get(idx)
    }

    /// Toggle whether a term counts as active for highlighting; false if unknown
    pub fn set_enabled(&mut self, id: SearchId, enabled: bool) -> bool {
        let idx = usize::from(id.get()).checked_sub(1);
        match idx.and_then(|idx| self.items.get_mut(idx)) {
            Some(criteria) => {
                criteria.set_enabled(enabled);
                true
            }
            None => false,
        }
    }

    /// Ids of the enabled terms, in insertion order
    pub fn enabled_ids(&self) -> Vec<SearchId> {
        self.items
            .iter()
            .filter(|c| c.enabled())
            .map(SearchCriteria::id)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl Default for SearchRegistry {
    fn default() -> Self {
        Self::new()
    }
}
