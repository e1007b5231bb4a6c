//! In-memory document store: the source of truth the cache sits in front of.
//!
//! One [`Collection`] per document type, each a concurrent map keyed by id.
//! Listings are newest-first by insertion order and paginated.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Claim, Feedback, Item, Report, User};

pub const DEFAULT_PAGE_LIMIT: u32 = 20;
pub const MAX_PAGE_LIMIT: u32 = 100;

pub trait Document: Clone + Send + Sync + 'static {
    fn id(&self) -> Uuid;
}

/// A resolved page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: u32,
    pub limit: u32,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_PAGE_LIMIT,
        }
    }
}

impl Page {
    pub fn new(page: u32, limit: u32) -> Result<Self, String> {
        if page == 0 {
            return Err("page must be >= 1".into());
        }
        if !(1..=MAX_PAGE_LIMIT).contains(&limit) {
            return Err(format!("limit must be between 1 and {MAX_PAGE_LIMIT}"));
        }
        Ok(Self { page, limit })
    }

    fn offset(&self) -> usize {
        (self.page as usize - 1) * self.limit as usize
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub page: u32,
    pub limit: u32,
    pub total: usize,
}

#[derive(Debug)]
struct Slot<T> {
    seq: u64,
    doc: T,
}

#[derive(Debug)]
pub struct Collection<T> {
    docs: DashMap<Uuid, Slot<T>>,
    next_seq: AtomicU64,
}

impl<T> Default for Collection<T> {
    fn default() -> Self {
        Self {
            docs: DashMap::new(),
            next_seq: AtomicU64::new(0),
        }
    }
}

impl<T: Document> Collection<T> {
    pub fn insert(&self, doc: T) -> T {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        self.docs.insert(
            doc.id(),
            Slot {
                seq,
                doc: doc.clone(),
            },
        );
        doc
    }

    pub fn get(&self, id: &Uuid) -> Option<T> {
        self.docs.get(id).map(|slot| slot.doc.clone())
    }

    pub fn contains(&self, id: &Uuid) -> bool {
        self.docs.contains_key(id)
    }

    /// Mutate a document in place, returning the updated copy.
    pub fn update<F>(&self, id: &Uuid, f: F) -> Option<T>
    where
        F: FnOnce(&mut T),
    {
        let mut slot = self.docs.get_mut(id)?;
        f(&mut slot.doc);
        Some(slot.doc.clone())
    }

    pub fn remove(&self, id: &Uuid) -> Option<T> {
        self.docs.remove(id).map(|(_, slot)| slot.doc)
    }

    /// Remove every document matching `filter`, returning what was removed.
    pub fn remove_where<F>(&self, filter: F) -> Vec<T>
    where
        F: Fn(&T) -> bool,
    {
        let ids: Vec<Uuid> = self
            .docs
            .iter()
            .filter(|entry| filter(&entry.value().doc))
            .map(|entry| *entry.key())
            .collect();
        ids.iter().filter_map(|id| self.remove(id)).collect()
    }

    pub fn any<F>(&self, predicate: F) -> bool
    where
        F: Fn(&T) -> bool,
    {
        self.docs.iter().any(|entry| predicate(&entry.value().doc))
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// Newest-first page of the documents matching `filter`.
    pub fn list<F>(&self, filter: F, page: Page) -> Paginated<T>
    where
        F: Fn(&T) -> bool,
    {
        let mut matching: Vec<(u64, T)> = self
            .docs
            .iter()
            .filter(|entry| filter(&entry.value().doc))
            .map(|entry| (entry.value().seq, entry.value().doc.clone()))
            .collect();
        matching.sort_by(|a, b| b.0.cmp(&a.0));

        let total = matching.len();
        let data = matching
            .into_iter()
            .skip(page.offset())
            .take(page.limit as usize)
            .map(|(_, doc)| doc)
            .collect();

        Paginated {
            data,
            page: page.page,
            limit: page.limit,
            total,
        }
    }
}

#[derive(Debug, Default)]
pub struct DocumentStore {
    pub items: Collection<Item>,
    pub claims: Collection<Claim>,
    pub reports: Collection<Report>,
    pub feedback: Collection<Feedback>,
    pub users: Collection<User>,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::default()
    }
}
