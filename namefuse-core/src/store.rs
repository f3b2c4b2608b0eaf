//! Fuse/expiry store.
//!
//! A dumb keyed store of `{controller, fuses, expiry, approved}` per node,
//! plus the DNS wire name each node was created from. It holds no
//! authorization logic.
//!
//! Reads go through [`Collapsing`], which applies the expiry rule at read
//! time: once `now >= expiry` the fuses read as empty, and an emancipated
//! name (one with `PARENT_CANNOT_CONTROL`) also loses its controller. Writes
//! store raw values, so a record whose expiry is later extended becomes
//! valid again without any explicit resurrection step.
//!
//! The store keeps an undo journal while a transaction is open so a failed
//! operation can be rolled back with no partial effect.

use crate::fuses::Fuses;
use crate::name::{Address, Node};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Highest representable expiry; used for names that never expire.
pub const MAX_EXPIRY: u64 = u64::MAX;

/// Values that know how to collapse once their validity window has passed.
pub trait Collapse: Copy {
    fn collapse(self) -> Self;
}

/// A raw value tagged with the instant it stops being valid.
///
/// [`Collapsing::effective`] is the only public read path, so no caller can
/// consult stale raw bits by accident.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Collapsing<T> {
    raw: T,
    expiry: u64,
}

impl<T: Collapse> Collapsing<T> {
    pub fn new(raw: T, expiry: u64) -> Self {
        Self { raw, expiry }
    }

    pub fn expiry(&self) -> u64 {
        self.expiry
    }

    /// A boundary-exact read counts as expired.
    pub fn is_expired(&self, now: u64) -> bool {
        now >= self.expiry
    }

    /// The value as seen at `now`.
    pub fn effective(&self, now: u64) -> T {
        if self.is_expired(now) {
            self.raw.collapse()
        } else {
            self.raw
        }
    }

    pub(crate) fn raw(&self) -> T {
        self.raw
    }
}

/// The part of a record that expiry collapses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Ownership {
    pub controller: Address,
    pub fuses: Fuses,
}

impl Collapse for Ownership {
    fn collapse(self) -> Self {
        let controller = if self.fuses.contains(Fuses::PARENT_CANNOT_CONTROL) {
            Address::ZERO
        } else {
            self.controller
        };
        Ownership {
            controller,
            fuses: Fuses::CAN_DO_EVERYTHING,
        }
    }
}

/// A record as returned to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NameData {
    pub controller: Address,
    pub fuses: Fuses,
    pub expiry: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Slot {
    ownership: Collapsing<Ownership>,
    approved: Address,
}

impl Default for Slot {
    fn default() -> Self {
        Self {
            ownership: Collapsing::new(Ownership::default(), 0),
            approved: Address::ZERO,
        }
    }
}

#[derive(Debug)]
enum Undo {
    Slot(Node, Option<Slot>),
    Name(Node, Option<Vec<u8>>),
}

/// Keyed store of fuse/expiry records.
#[derive(Debug, Default)]
pub struct FuseStore {
    slots: HashMap<Node, Slot>,
    names: HashMap<Node, Vec<u8>>,
    journal: Option<Vec<Undo>>,
}

impl FuseStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collapsed view of `node` at `now`.
    pub fn get(&self, node: &Node, now: u64) -> NameData {
        match self.slots.get(node) {
            Some(slot) => {
                let ownership = slot.ownership.effective(now);
                NameData {
                    controller: ownership.controller,
                    fuses: ownership.fuses,
                    expiry: slot.ownership.expiry(),
                }
            }
            None => NameData::default(),
        }
    }

    /// Stored values without collapse. Only lifecycle code that must
    /// re-validate an expired record (renewal, re-mint) reads this.
    pub(crate) fn raw(&self, node: &Node) -> NameData {
        match self.slots.get(node) {
            Some(slot) => {
                let ownership = slot.ownership.raw();
                NameData {
                    controller: ownership.controller,
                    fuses: ownership.fuses,
                    expiry: slot.ownership.expiry(),
                }
            }
            None => NameData::default(),
        }
    }

    /// Store raw values, keeping any approval.
    pub fn put(&mut self, node: Node, controller: Address, fuses: Fuses, expiry: u64) {
        self.record_slot(&node);
        let slot = self.slots.entry(node).or_default();
        slot.ownership = Collapsing::new(Ownership { controller, fuses }, expiry);
    }

    /// Raw per-name approval; callers filter it through the collapsed
    /// controller.
    pub fn approved(&self, node: &Node) -> Address {
        self.slots
            .get(node)
            .map(|slot| slot.approved)
            .unwrap_or(Address::ZERO)
    }

    pub fn set_approved(&mut self, node: Node, approved: Address) {
        self.record_slot(&node);
        self.slots.entry(node).or_default().approved = approved;
    }

    /// Drop the record entirely.
    pub fn remove(&mut self, node: &Node) {
        self.record_slot(node);
        self.slots.remove(node);
    }

    pub fn name(&self, node: &Node) -> Option<&[u8]> {
        self.names.get(node).map(|v| v.as_slice())
    }

    pub fn set_name(&mut self, node: Node, wire: Vec<u8>) {
        if let Some(journal) = self.journal.as_mut() {
            journal.push(Undo::Name(node, self.names.get(&node).cloned()));
        }
        self.names.insert(node, wire);
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Start recording undo information.
    pub fn begin(&mut self) {
        debug_assert!(self.journal.is_none(), "store transactions do not nest");
        self.journal = Some(Vec::new());
    }

    /// Keep every change made since [`FuseStore::begin`].
    pub fn commit(&mut self) {
        self.journal = None;
    }

    /// Undo every change made since [`FuseStore::begin`].
    pub fn rollback(&mut self) {
        let Some(mut journal) = self.journal.take() else {
            return;
        };
        while let Some(undo) = journal.pop() {
            match undo {
                Undo::Slot(node, Some(slot)) => {
                    self.slots.insert(node, slot);
                }
                Undo::Slot(node, None) => {
                    self.slots.remove(&node);
                }
                Undo::Name(node, Some(wire)) => {
                    self.names.insert(node, wire);
                }
                Undo::Name(node, None) => {
                    self.names.remove(&node);
                }
            }
        }
    }

    fn record_slot(&mut self, node: &Node) {
        if let Some(journal) = self.journal.as_mut() {
            journal.push(Undo::Slot(*node, self.slots.get(node).cloned()));
        }
    }
}
