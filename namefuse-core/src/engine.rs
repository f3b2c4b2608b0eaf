//! Fuse, expiry and approval rules.
//!
//! The free functions here are the pure burn rules; the `NameWrapper`
//! methods apply them to collapsed records under the right policy.

use crate::audit::NameEvent;
use crate::authority::{APPROVE, EXTEND_EXPIRY, MODIFY_NAME};
use crate::error::{Error, Result};
use crate::fuses::Fuses;
use crate::name::{Address, LabelHash, Node};
use crate::wrapper::NameWrapper;
use tracing::debug;

/// Only user-settable fuses may be requested.
pub fn check_settable(node: &Node, fuses: Fuses) -> Result<()> {
    if fuses.is_subset_of(Fuses::SETTABLE) {
        Ok(())
    } else {
        Err(Error::OperationProhibited { node: *node })
    }
}

/// A mask with any owner-controlled fuse must also carry both
/// `PARENT_CANNOT_CONTROL` and `CANNOT_UNWRAP`.
pub fn check_burnable(node: &Node, resulting: Fuses) -> Result<()> {
    if resulting.intersects(Fuses::OWNER_CONTROLLED)
        && !resulting.contains(Fuses::EMANCIPATED_AND_LOCKED)
    {
        return Err(Error::OperationProhibited { node: *node });
    }
    Ok(())
}

/// Parent-controlled fuses need the parent to have burned `CANNOT_UNWRAP`.
pub fn check_parent_fuses(node: &Node, fuses: Fuses, parent_fuses: Fuses) -> Result<()> {
    if fuses.intersects(Fuses::PARENT_CONTROLLED) && !parent_fuses.contains(Fuses::CANNOT_UNWRAP) {
        return Err(Error::OperationProhibited { node: *node });
    }
    Ok(())
}

/// Clamp a requested expiry to the parent, then never below the current one.
pub fn normalise_expiry(requested: u64, current: u64, parent: u64) -> u64 {
    requested.min(parent).max(current)
}

impl NameWrapper {
    /// Burn owner-controlled fuses on a name the caller may modify.
    ///
    /// Returns the new fuse mask.
    pub fn burn_owner_fuses(&mut self, caller: Address, node: Node, fuses: Fuses) -> Result<Fuses> {
        self.transact("burn_owner_fuses", |w| {
            let now = w.now();
            w.authorize(&MODIFY_NAME, caller, &node, None, now)?;
            if !fuses.is_subset_of(Fuses::OWNER_CONTROLLED) {
                return Err(Error::OperationProhibited { node });
            }
            let data = w.store.get(&node, now);
            if data.fuses.contains(Fuses::CANNOT_BURN_FUSES) {
                return Err(Error::OperationProhibited { node });
            }
            let burned = data.fuses | fuses;
            check_burnable(&node, burned)?;
            w.write_fuses(caller, node, data.controller, burned, data.expiry, data.expiry);
            Ok(burned)
        })
    }

    /// Same as [`NameWrapper::burn_owner_fuses`].
    pub fn set_fuses(&mut self, caller: Address, node: Node, fuses: Fuses) -> Result<Fuses> {
        self.burn_owner_fuses(caller, node, fuses)
    }

    /// Burn fuses on a child and optionally raise its expiry, acting as the
    /// parent. Top-level names are governed by their own controller instead.
    pub fn burn_parent_fuses(
        &mut self,
        caller: Address,
        parent: Node,
        label: LabelHash,
        fuses: Fuses,
        expiry: u64,
    ) -> Result<Fuses> {
        self.transact("burn_parent_fuses", |w| {
            let now = w.now();
            let node = parent.child(&label);
            check_settable(&node, fuses)?;
            if !w.is_node_wrapped(&node, now) {
                return Err(Error::NameIsNotWrapped { node });
            }
            if parent == Node::ROOT {
                w.authorize(&MODIFY_NAME, caller, &node, None, now)?;
            } else {
                w.authorize(&MODIFY_NAME, caller, &parent, None, now)?;
            }

            let data = w.store.get(&node, now);
            let parent_data = w.store.get(&parent, now);
            check_parent_fuses(&node, fuses, parent_data.fuses)?;
            let expiry = normalise_expiry(expiry, data.expiry, parent_data.expiry);

            if data.fuses.contains(Fuses::PARENT_CANNOT_CONTROL) && !fuses.is_subset_of(data.fuses) {
                return Err(Error::OperationProhibited { node });
            }
            let burned = data.fuses | fuses;
            check_burnable(&node, burned)?;
            w.write_fuses(caller, node, data.controller, burned, data.expiry, expiry);
            Ok(burned)
        })
    }

    /// Raise a child's expiry, clamped to the parent's.
    ///
    /// The parent's controller or operator may always do this. The child's
    /// own controller, operator or delegate may only do it once the parent
    /// has burned `CAN_EXTEND_EXPIRY`; without it they get
    /// `OperationProhibited`.
    pub fn extend_expiry(
        &mut self,
        caller: Address,
        parent: Node,
        label: LabelHash,
        expiry: u64,
    ) -> Result<u64> {
        self.transact("extend_expiry", |w| {
            let now = w.now();
            let node = parent.child(&label);
            if !w.is_node_wrapped(&node, now) {
                return Err(Error::NameIsNotWrapped { node });
            }
            let ctx = w.context(caller, &node, Some(&parent), now);
            if EXTEND_EXPIRY.resolve(&ctx).is_none() {
                return Err(if MODIFY_NAME.permits(&ctx) {
                    Error::OperationProhibited { node }
                } else {
                    Error::Unauthorised { node, caller }
                });
            }

            let data = w.store.get(&node, now);
            let max = w.store.get(&parent, now).expiry;
            let expiry = normalise_expiry(expiry, data.expiry, max);
            w.store.put(node, data.controller, data.fuses, expiry);
            debug!(node = %node, expiry, "expiry extended");
            w.emit(caller, NameEvent::ExpiryExtended { node, expiry });
            Ok(expiry)
        })
    }

    /// Set or clear the per-name delegate.
    ///
    /// Once `CANNOT_APPROVE` is burned the current approval is frozen: no
    /// caller can replace or clear it while the name is live.
    pub fn approve(&mut self, caller: Address, node: Node, delegate: Address) -> Result<()> {
        self.transact("approve", |w| {
            let now = w.now();
            w.authorize(&APPROVE, caller, &node, None, now)?;
            let data = w.store.get(&node, now);
            if data.fuses.contains(Fuses::CANNOT_APPROVE) {
                return Err(Error::OperationProhibited { node });
            }
            if delegate == data.controller {
                return Err(Error::ApprovalToCurrentOwner);
            }
            w.store.set_approved(node, delegate);
            w.emit(
                caller,
                NameEvent::Approval {
                    owner: data.controller,
                    approved: delegate,
                    node,
                },
            );
            Ok(())
        })
    }

    /// Grant or revoke blanket authority over everything `caller` controls.
    pub fn set_approval_for_all(&mut self, caller: Address, operator: Address, approved: bool) -> Result<()> {
        self.transact("set_approval_for_all", |w| {
            if caller == operator {
                return Err(Error::ApprovalToCurrentOwner);
            }
            w.operators.set(caller, operator, approved);
            w.emit(
                caller,
                NameEvent::ApprovalForAll {
                    owner: caller,
                    operator,
                    approved,
                },
            );
            Ok(())
        })
    }

    pub fn set_resolver(&mut self, caller: Address, node: Node, resolver: Address) -> Result<()> {
        self.transact("set_resolver", |w| {
            w.guarded_record_write(caller, node, Fuses::CANNOT_SET_RESOLVER)?;
            w.registry.set_resolver(w.address(), node, resolver)
        })
    }

    pub fn set_ttl(&mut self, caller: Address, node: Node, ttl: u64) -> Result<()> {
        self.transact("set_ttl", |w| {
            w.guarded_record_write(caller, node, Fuses::CANNOT_SET_TTL)?;
            w.registry.set_ttl(w.address(), node, ttl)
        })
    }

    /// Modify authority plus none of `blocking` burned.
    pub(crate) fn guarded_record_write(&self, caller: Address, node: Node, blocking: Fuses) -> Result<()> {
        let now = self.now();
        self.authorize(&MODIFY_NAME, caller, &node, None, now)?;
        if self.store.get(&node, now).fuses.intersects(blocking) {
            return Err(Error::OperationProhibited { node });
        }
        Ok(())
    }

    /// Store new fuses and expiry, emitting `FusesSet` and, when the expiry
    /// grew, `ExpiryExtended`.
    pub(crate) fn write_fuses(
        &mut self,
        actor: Address,
        node: Node,
        controller: Address,
        fuses: Fuses,
        old_expiry: u64,
        expiry: u64,
    ) {
        self.store.put(node, controller, fuses, expiry);
        debug!(node = %node, fuses = %fuses, expiry, "fuses set");
        self.emit(actor, NameEvent::FusesSet { node, fuses });
        if expiry > old_expiry {
            self.emit(actor, NameEvent::ExpiryExtended { node, expiry });
        }
    }
}
