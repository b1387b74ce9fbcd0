//! Registry of active Troves ordered by descending nominal ICR.
//!
//! Backed by an arena of nodes keyed by owner address with explicit
//! `prev`/`next` links, so the doubly linked list needs no interior
//! mutability or back-references. The head holds the safest Trove, the tail
//! the riskiest; liquidation walks from the tail.
//!
//! Inserts take position hints and walk from them to the true position, so a
//! stale hint costs time, never correctness. Equal keys are placed after all
//! existing equal entries, which keeps the head-to-tail key sequence
//! non-increasing and insertion-stable.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::utils::address::Address;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct Node {
    prev: Option<Address>,
    next: Option<Address>,
    nicr: u128,
}

/// Doubly linked list of active Troves, ordered by descending nominal ICR
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SortedTroves {
    nodes: BTreeMap<Address, Node>,
    head: Option<Address>,
    tail: Option<Address>,
}

impl SortedTroves {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of Troves in the registry
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Whether the Trove is in the registry
    pub fn contains(&self, id: &Address) -> bool {
        self.nodes.contains_key(id)
    }

    /// The Trove with the highest key (safest)
    pub fn first(&self) -> Option<Address> {
        self.head
    }

    /// The Trove with the lowest key (riskiest)
    pub fn last(&self) -> Option<Address> {
        self.tail
    }

    /// The neighbor toward the tail
    pub fn next(&self, id: &Address) -> Option<Address> {
        self.nodes.get(id).and_then(|n| n.next)
    }

    /// The neighbor toward the head
    pub fn prev(&self, id: &Address) -> Option<Address> {
        self.nodes.get(id).and_then(|n| n.prev)
    }

    /// The key the Trove was inserted under
    pub fn key_of(&self, id: &Address) -> Option<u128> {
        self.nodes.get(id).map(|n| n.nicr)
    }

    /// Iterate head to tail (descending key)
    pub fn iter(&self) -> impl Iterator<Item = Address> + '_ {
        std::iter::successors(self.head, move |id| self.next(id))
    }

    /// Whether the head-to-tail key sequence is non-increasing
    pub fn is_ordered(&self) -> bool {
        let mut walk = self.iter();
        let Some(mut current) = walk.next() else {
            return true;
        };
        for id in walk {
            let (Some(a), Some(b)) = (self.key_of(&current), self.key_of(&id)) else {
                return false;
            };
            if a < b {
                return false;
            }
            current = id;
        }
        true
    }

    fn key_unchecked(&self, id: &Address) -> u128 {
        self.nodes.get(id).map(|n| n.nicr).unwrap_or(0)
    }

    /// A position `(prev, next)` accepts `nicr` when the left neighbor is at
    /// least as large and the right neighbor strictly smaller, so equal keys
    /// land after all existing equals
    fn valid_insert_position(
        &self,
        nicr: u128,
        prev: Option<Address>,
        next: Option<Address>,
    ) -> bool {
        match (prev, next) {
            (None, None) => self.is_empty(),
            (None, Some(next)) => self.head == Some(next) && nicr > self.key_unchecked(&next),
            (Some(prev), None) => self.tail == Some(prev) && nicr <= self.key_unchecked(&prev),
            (Some(prev), Some(next)) => {
                self.nodes.get(&prev).map(|n| n.next) == Some(Some(next))
                    && self.key_unchecked(&prev) >= nicr
                    && nicr > self.key_unchecked(&next)
            }
        }
    }

    /// Walk toward the tail from `start` until the position fits
    fn descend(&self, nicr: u128, start: Address) -> (Option<Address>, Option<Address>) {
        if self.head == Some(start) && nicr > self.key_unchecked(&start) {
            return (None, Some(start));
        }
        let mut prev = Some(start);
        let mut next = self.next(&start);
        while prev.is_some() && !self.valid_insert_position(nicr, prev, next) {
            prev = next;
            next = prev.and_then(|p| self.next(&p));
        }
        (prev, next)
    }

    /// Walk toward the head from `start` until the position fits
    fn ascend(&self, nicr: u128, start: Address) -> (Option<Address>, Option<Address>) {
        if self.tail == Some(start) && nicr <= self.key_unchecked(&start) {
            return (Some(start), None);
        }
        let mut next = Some(start);
        let mut prev = self.prev(&start);
        while next.is_some() && !self.valid_insert_position(nicr, prev, next) {
            next = prev;
            prev = next.and_then(|n| self.prev(&n));
        }
        (prev, next)
    }

    /// Resolve hints to the true insert position. Hints not in the list, or
    /// on the wrong side of the key, are discarded before walking.
    fn find_insert_position(
        &self,
        nicr: u128,
        prev_hint: Option<Address>,
        next_hint: Option<Address>,
    ) -> (Option<Address>, Option<Address>) {
        let prev = prev_hint.filter(|p| self.contains(p) && nicr <= self.key_unchecked(p));
        let next = next_hint.filter(|n| self.contains(n) && nicr > self.key_unchecked(n));

        match (prev, next) {
            (None, None) => match self.head {
                Some(head) => self.descend(nicr, head),
                None => (None, None),
            },
            (None, Some(next)) => self.ascend(nicr, next),
            (Some(prev), _) => self.descend(nicr, prev),
        }
    }

    fn splice(&mut self, id: Address, nicr: u128, prev: Option<Address>, next: Option<Address>) {
        self.nodes.insert(id, Node { prev, next, nicr });
        match (prev, next) {
            (None, None) => {
                self.head = Some(id);
                self.tail = Some(id);
            }
            (None, Some(next)) => {
                if let Some(n) = self.nodes.get_mut(&next) {
                    n.prev = Some(id);
                }
                self.head = Some(id);
            }
            (Some(prev), None) => {
                if let Some(p) = self.nodes.get_mut(&prev) {
                    p.next = Some(id);
                }
                self.tail = Some(id);
            }
            (Some(prev), Some(next)) => {
                if let Some(p) = self.nodes.get_mut(&prev) {
                    p.next = Some(id);
                }
                if let Some(n) = self.nodes.get_mut(&next) {
                    n.prev = Some(id);
                }
            }
        }
    }

    /// Insert a Trove at the position its key sorts to, walking from the
    /// hint. A missing or stale hint falls back to a scan from the boundary.
    pub fn insert(&mut self, id: Address, nicr: u128, hint: Option<Address>) -> Result<()> {
        if self.contains(&id) {
            return Err(Error::AlreadyInRegistry(id.to_string()));
        }
        if nicr == 0 {
            return Err(Error::InvalidParameter {
                name: "nicr".to_string(),
                reason: "registry key must be positive".to_string(),
            });
        }
        let (prev, next) = self.find_insert_position(nicr, hint, hint);
        self.splice(id, nicr, prev, next);
        tracing::trace!(id = %id, nicr, "registry insert");
        Ok(())
    }

    /// Remove a Trove from the registry
    pub fn remove(&mut self, id: &Address) -> Result<()> {
        let node = self
            .nodes
            .remove(id)
            .ok_or_else(|| Error::NotInRegistry(id.to_string()))?;
        match node.prev {
            Some(prev) => {
                if let Some(p) = self.nodes.get_mut(&prev) {
                    p.next = node.next;
                }
            }
            None => self.head = node.next,
        }
        match node.next {
            Some(next) => {
                if let Some(n) = self.nodes.get_mut(&next) {
                    n.prev = node.prev;
                }
            }
            None => self.tail = node.prev,
        }
        tracing::trace!(id = %id, "registry remove");
        Ok(())
    }

    /// Move a Trove to the position a changed key sorts to
    pub fn re_insert(
        &mut self,
        id: Address,
        new_nicr: u128,
        prev_hint: Option<Address>,
        next_hint: Option<Address>,
    ) -> Result<()> {
        if !self.contains(&id) {
            return Err(Error::NotInRegistry(id.to_string()));
        }
        if new_nicr == 0 {
            return Err(Error::InvalidParameter {
                name: "nicr".to_string(),
                reason: "registry key must be positive".to_string(),
            });
        }
        self.remove(&id)?;
        let (prev, next) = self.find_insert_position(new_nicr, prev_hint, next_hint);
        self.splice(id, new_nicr, prev, next);
        Ok(())
    }
}
