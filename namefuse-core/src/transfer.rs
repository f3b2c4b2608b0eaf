//! Wrapped-name transfers.
//!
//! A transfer moves the controller of a wrapped name. It is refused while
//! `CANNOT_TRANSFER` is burned on a live name, and an emancipated name that
//! has expired (or, for native names, entered its grace period) has no
//! holder left to send it. The per-name approval goes with the transfer
//! unless `CANNOT_APPROVE` froze it.

use crate::adapters::TransferNotice;
use crate::audit::NameEvent;
use crate::authority::{AuthContext, Party, TRANSFER};
use crate::error::{Error, Result};
use crate::fuses::Fuses;
use crate::name::{Address, Node};
use crate::store::NameData;
use crate::wrapper::NameWrapper;
use tracing::debug;

impl NameWrapper {
    /// Move `node` from `from` to `to`.
    ///
    /// The caller must be `from`, a blanket operator of `from`, or the
    /// name's approved delegate. A registered receiver for `to` may veto.
    pub fn safe_transfer_from(
        &mut self,
        caller: Address,
        from: Address,
        to: Address,
        node: Node,
        data: Vec<u8>,
    ) -> Result<()> {
        self.transact("safe_transfer_from", |w| {
            w.check_target_owner(to)?;
            let now = w.now();
            let current = w.store.get(&node, now);
            let approved = if current.controller == from {
                w.approved_at(&node, now)
            } else {
                Address::ZERO
            };
            w.authorize_transfer(caller, from, current.fuses, approved, &node)?;
            w.transfer_node(caller, from, to, node, data)
        })
    }

    /// Move several names from `from` to `to` at once. Only `from` or its
    /// blanket operators may do this; per-name delegates are not consulted.
    pub fn safe_batch_transfer_from(
        &mut self,
        caller: Address,
        from: Address,
        to: Address,
        nodes: Vec<Node>,
        data: Vec<u8>,
    ) -> Result<()> {
        self.transact("safe_batch_transfer_from", |w| {
            w.check_target_owner(to)?;
            let now = w.now();
            let subject = nodes.first().copied().unwrap_or(Node::ROOT);
            w.authorize_transfer(caller, from, Fuses::CAN_DO_EVERYTHING, Address::ZERO, &subject)?;
            for node in &nodes {
                let current = w.store.get(node, now);
                w.before_transfer(node, &current, now)?;
                if current.controller != from {
                    return Err(Error::InsufficientBalance { node: *node });
                }
                w.store.put(*node, to, current.fuses, current.expiry);
            }
            debug!(count = nodes.len(), from = %from.fingerprint(), to = %to.fingerprint(), "batch transfer");
            w.emit(
                caller,
                NameEvent::TransferBatch {
                    operator: caller,
                    from,
                    to,
                    nodes: nodes.clone(),
                },
            );
            w.notify(TransferNotice {
                operator: caller,
                from,
                to,
                nodes,
                data,
            })
        })
    }

    /// Move the controller without checking the caller. Used by transfers
    /// and by the operations that reassign a name as a side effect.
    pub(crate) fn transfer_node(
        &mut self,
        actor: Address,
        from: Address,
        to: Address,
        node: Node,
        data: Vec<u8>,
    ) -> Result<()> {
        let now = self.now();
        let current = self.store.get(&node, now);
        self.before_transfer(&node, &current, now)?;
        if current.controller != from {
            return Err(Error::InsufficientBalance { node });
        }
        if from == to {
            return Ok(());
        }
        self.store.put(node, to, current.fuses, current.expiry);
        debug!(node = %node, from = %from.fingerprint(), to = %to.fingerprint(), "transfer");
        self.emit(
            actor,
            NameEvent::TransferSingle {
                operator: actor,
                from,
                to,
                node,
            },
        );
        self.notify(TransferNotice {
            operator: actor,
            from,
            to,
            nodes: vec![node],
            data,
        })
    }

    /// Fuse gate shared by every transfer. Native names count as expired
    /// from the start of their grace period.
    fn before_transfer(&mut self, node: &Node, data: &NameData, now: u64) -> Result<()> {
        let mut expiry = data.expiry;
        if data.fuses.contains(Fuses::IS_NATIVE) {
            expiry = expiry.saturating_sub(self.config.grace_period_secs);
        }
        if now >= expiry {
            if data.fuses.contains(Fuses::PARENT_CANNOT_CONTROL) {
                return Err(Error::InsufficientBalance { node: *node });
            }
        } else if data.fuses.contains(Fuses::CANNOT_TRANSFER) {
            return Err(Error::OperationProhibited { node: *node });
        }
        if !data.fuses.contains(Fuses::CANNOT_APPROVE) {
            self.store.set_approved(*node, Address::ZERO);
        }
        Ok(())
    }

    fn authorize_transfer(
        &self,
        caller: Address,
        from: Address,
        fuses: Fuses,
        approved: Address,
        node: &Node,
    ) -> Result<()> {
        let ctx = AuthContext {
            caller,
            name: Party {
                controller: from,
                fuses,
                approved,
                locked: false,
            },
            parent: None,
            operators: &self.operators,
        };
        match TRANSFER.resolve(&ctx) {
            Some(_) => Ok(()),
            None => Err(Error::Unauthorised {
                node: *node,
                caller,
            }),
        }
    }
}
