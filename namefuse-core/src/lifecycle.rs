//! Wrap, unwrap and subname lifecycle.
//!
//! A name moves `Unwrapped -> Wrapped -> Expired` and from there back to
//! `Wrapped` (re-wrap, re-registration, re-creation by the parent) or to
//! `Unwrapped`. Minting over an existing record keeps the parent-controlled
//! fuses that are still live and the larger expiry, so a parent cannot
//! launder away restrictions by forcing a re-wrap.

use crate::adapters::{TransferNotice, UpgradeData};
use crate::audit::NameEvent;
use crate::authority::{MODIFY_NAME, UNWRAP};
use crate::engine::{check_burnable, check_parent_fuses, check_settable, normalise_expiry};
use crate::error::{Error, Result};
use crate::fuses::Fuses;
use crate::name::{add_label, check_label, decode_dns, encode_dns, labelhash, namehash, Address, LabelHash, Node, ParsedName};
use crate::wire;
use crate::wrapper::NameWrapper;
use tracing::{debug, info};

impl NameWrapper {
    // ========================================================================
    // Wrap / unwrap
    // ========================================================================

    /// Wrap a name held in the registry. Native-zone names use
    /// [`NameWrapper::wrap_native`].
    pub fn wrap(
        &mut self,
        caller: Address,
        name: &str,
        wrapped_owner: Address,
        resolver: Address,
    ) -> Result<Node> {
        self.transact("wrap", |w| {
            let parsed = ParsedName::parse(name)?;
            check_label(&parsed.label, w.config.max_label_length)?;
            let node = parsed.node;
            if parsed.parent == w.native_node {
                return Err(Error::IncompatibleParent);
            }

            let owner = w.registry.owner(&node);
            if owner != caller && !w.registry.is_approved_for_all(&owner, &caller) {
                return Err(Error::Unauthorised { node, caller });
            }
            let me = w.address();
            if owner != me && !w.registry.is_approved_for_all(&owner, &me) {
                return Err(Error::Adapter(format!(
                    "registry: {} has not approved the wrapper",
                    owner
                )));
            }

            w.mint(caller, node, parsed.wire, wrapped_owner, Fuses::CAN_DO_EVERYTHING, 0)?;
            if !resolver.is_zero() {
                w.registry.set_resolver(me, node, resolver)?;
            }
            w.registry.set_owner(me, node, me)?;
            info!(node = %node, name, owner = %wrapped_owner, "name wrapped");
            Ok(node)
        })
    }

    /// Wrap a native-zone name held with the registrar.
    ///
    /// Returns the wrapped expiry: registrar expiry plus the grace period.
    pub fn wrap_native(
        &mut self,
        caller: Address,
        label: &str,
        wrapped_owner: Address,
        owner_fuses: Fuses,
        resolver: Address,
    ) -> Result<u64> {
        self.transact("wrap_native", |w| {
            check_label(label, w.config.max_label_length)?;
            let token = labelhash(label);
            let node = w.native_node.child(&token);
            if !owner_fuses.is_subset_of(Fuses::OWNER_CONTROLLED) {
                return Err(Error::OperationProhibited { node });
            }

            let registrant = w
                .registrar
                .owner_of(&token)
                .ok_or(Error::Unauthorised { node, caller })?;
            if registrant != caller && !w.registrar.is_approved_for_all(&registrant, &caller) {
                return Err(Error::Unauthorised { node, caller });
            }
            let me = w.address();
            if registrant != me && !w.registrar.is_approved_for_all(&registrant, &me) {
                return Err(Error::Adapter(format!(
                    "registrar: {} has not approved the wrapper",
                    registrant
                )));
            }

            let expiry = w
                .registrar
                .name_expires(&token)
                .saturating_add(w.config.grace_period_secs);
            w.mint_native(caller, label, wrapped_owner, owner_fuses, expiry)?;
            w.registrar.transfer_from(me, registrant, me, token)?;
            w.registrar.reclaim(me, token, me)?;
            if !resolver.is_zero() {
                w.registry.set_resolver(me, node, resolver)?;
            }
            info!(node = %node, label, owner = %wrapped_owner, expiry, "native name wrapped");
            Ok(expiry)
        })
    }

    /// Hand a wrapped name back to the registry as `new_controller`.
    ///
    /// The name's own authority may always unwrap unless `CANNOT_UNWRAP` is
    /// burned. The parent may unwrap until it emancipates the child.
    pub fn unwrap(
        &mut self,
        caller: Address,
        parent: Node,
        label: LabelHash,
        new_controller: Address,
    ) -> Result<()> {
        self.transact("unwrap", |w| {
            if parent == w.native_node {
                return Err(Error::IncompatibleParent);
            }
            w.check_target_owner(new_controller)?;
            let node = parent.child(&label);
            let now = w.now();
            w.authorize(&UNWRAP, caller, &node, Some(&parent), now)?;
            w.unwrap_node(caller, node, new_controller)
        })
    }

    /// Unwrap a native name, returning the registrar token to `registrant`
    /// and the registry record to `controller`.
    pub fn unwrap_native(
        &mut self,
        caller: Address,
        label: LabelHash,
        registrant: Address,
        controller: Address,
    ) -> Result<()> {
        self.transact("unwrap_native", |w| {
            let me = w.address();
            if registrant.is_zero() || registrant == me {
                return Err(Error::IncorrectTargetOwner { owner: registrant });
            }
            if controller == me {
                return Err(Error::IncorrectTargetOwner { owner: controller });
            }
            let node = w.native_node.child(&label);
            let now = w.now();
            w.authorize(&MODIFY_NAME, caller, &node, None, now)?;
            w.unwrap_node(caller, node, controller)?;
            w.registrar.transfer_from(me, me, registrant, label)
        })
    }

    // ========================================================================
    // Subnames
    // ========================================================================

    /// Create or reassign a child of `parent`, burning parent-controlled
    /// fuses and setting its expiry on the way.
    ///
    /// An `owner` of zero on an existing child unwraps it to nobody.
    pub fn set_subnode_owner(
        &mut self,
        caller: Address,
        parent: Node,
        label: &str,
        owner: Address,
        fuses: Fuses,
        expiry: u64,
    ) -> Result<Node> {
        self.transact("set_subnode_owner", |w| {
            w.create_subnode(caller, parent, label, owner, fuses, expiry, None)
        })
    }

    /// [`NameWrapper::set_subnode_owner`] that also writes resolver and ttl.
    #[allow(clippy::too_many_arguments)]
    pub fn set_subnode_record(
        &mut self,
        caller: Address,
        parent: Node,
        label: &str,
        owner: Address,
        resolver: Address,
        ttl: u64,
        fuses: Fuses,
        expiry: u64,
    ) -> Result<Node> {
        self.transact("set_subnode_record", |w| {
            w.create_subnode(caller, parent, label, owner, fuses, expiry, Some((resolver, ttl)))
        })
    }

    /// Set owner, resolver and ttl of a wrapped name in one call.
    ///
    /// An `owner` of zero unwraps the name to nobody, which native names and
    /// names with `CANNOT_UNWRAP` refuse.
    pub fn set_record(
        &mut self,
        caller: Address,
        node: Node,
        owner: Address,
        resolver: Address,
        ttl: u64,
    ) -> Result<()> {
        self.transact("set_record", |w| {
            w.guarded_record_write(
                caller,
                node,
                Fuses::CANNOT_TRANSFER | Fuses::CANNOT_SET_RESOLVER | Fuses::CANNOT_SET_TTL,
            )?;
            let now = w.now();
            let data = w.store.get(&node, now);
            let me = w.address();
            if owner.is_zero() {
                if data.fuses.contains(Fuses::IS_NATIVE) {
                    return Err(Error::IncorrectTargetOwner { owner });
                }
                if data.fuses.contains(Fuses::CANNOT_UNWRAP) {
                    return Err(Error::OperationProhibited { node });
                }
                w.registry.set_record(me, node, me, resolver, ttl)?;
                w.unwrap_node(caller, node, Address::ZERO)
            } else {
                w.check_target_owner(owner)?;
                w.transfer_node(caller, data.controller, owner, node, Vec::new())?;
                w.registry.set_record(me, node, me, resolver, ttl)
            }
        })
    }

    // ========================================================================
    // Native registration
    // ========================================================================

    /// Register a native name straight into the wrapper. Controllers only.
    ///
    /// Returns the registrar expiry.
    pub fn register_and_wrap(
        &mut self,
        caller: Address,
        label: &str,
        owner: Address,
        duration: u64,
        resolver: Address,
        owner_fuses: Fuses,
    ) -> Result<u64> {
        self.transact("register_and_wrap", |w| {
            w.require_controller(caller)?;
            check_label(label, w.config.max_label_length)?;
            let token = labelhash(label);
            let node = w.native_node.child(&token);
            if !owner_fuses.is_subset_of(Fuses::OWNER_CONTROLLED) {
                return Err(Error::OperationProhibited { node });
            }
            w.check_target_owner(owner)?;
            check_burnable(&node, owner_fuses | Fuses::PARENT_CANNOT_CONTROL)?;

            let me = w.address();
            let registrar_expiry = w.registrar.register(me, token, me, duration)?;
            let expiry = registrar_expiry.saturating_add(w.config.grace_period_secs);
            w.mint_native(caller, label, owner, owner_fuses, expiry)?;
            if !resolver.is_zero() {
                w.registry.set_resolver(me, node, resolver)?;
            }
            info!(node = %node, label, owner = %owner, expiry, "native name registered");
            Ok(registrar_expiry)
        })
    }

    /// Renew a native name with the registrar. Controllers only.
    ///
    /// When the name is wrapped the stored expiry follows, even if the
    /// wrapped record had already collapsed.
    pub fn renew(&mut self, caller: Address, label: LabelHash, duration: u64) -> Result<u64> {
        self.transact("renew", |w| {
            w.require_controller(caller)?;
            let me = w.address();
            let registrar_expiry = w.registrar.renew(me, label, duration)?;
            let node = w.native_node.child(&label);
            if w.registrar.owner_of(&label) != Some(me) || w.registry.owner(&node) != me {
                return Ok(registrar_expiry);
            }
            let expiry = registrar_expiry.saturating_add(w.config.grace_period_secs);
            let raw = w.store.raw(&node);
            w.store.put(node, raw.controller, raw.fuses, expiry);
            debug!(node = %node, expiry, "native name renewed");
            w.emit(caller, NameEvent::ExpiryExtended { node, expiry });
            Ok(registrar_expiry)
        })
    }

    /// Wrap a native name that the registrar has just delivered to the
    /// wrapper. `data` must be an encoded [`wire::TransferData`].
    pub fn receive_native_transfer(
        &mut self,
        caller: Address,
        operator: Address,
        from: Address,
        token: LabelHash,
        data: &[u8],
    ) -> Result<Node> {
        self.transact("receive_native_transfer", |w| {
            if caller != w.registrar.address() {
                return Err(Error::IncorrectTokenType);
            }
            let payload = wire::decode(data)?;
            let found = labelhash(&payload.label);
            if found != token {
                return Err(Error::LabelMismatch {
                    expected: token,
                    found,
                });
            }
            check_label(&payload.label, w.config.max_label_length)?;

            let me = w.address();
            let node = w.native_node.child(&token);
            let expiry = w
                .registrar
                .name_expires(&token)
                .saturating_add(w.config.grace_period_secs);
            w.mint_native(operator, &payload.label, payload.owner, payload.fuses(), expiry)?;
            w.registrar.reclaim(me, token, me)?;
            if !payload.resolver.is_zero() {
                w.registry.set_resolver(me, node, payload.resolver)?;
            }
            info!(node = %node, from = %from, owner = %payload.owner, "native name received");
            Ok(node)
        })
    }

    // ========================================================================
    // Upgrade
    // ========================================================================

    /// Migrate a name to the successor wrapper and drop it here entirely.
    pub fn upgrade(&mut self, caller: Address, name: &str, extra_data: Vec<u8>) -> Result<()> {
        self.transact("upgrade", |w| {
            let wire = encode_dns(name)?;
            let node = namehash(name);
            let target = w.upgrade_target.clone().ok_or(Error::CannotUpgrade)?;
            let now = w.now();
            w.authorize(&MODIFY_NAME, caller, &node, None, now)?;

            let data = w.store.get(&node, now);
            let approved = w.approved_at(&node, now);
            w.store.remove(&node);
            w.emit(
                caller,
                NameEvent::TransferSingle {
                    operator: caller,
                    from: data.controller,
                    to: Address::ZERO,
                    node,
                },
            );
            w.emit(
                caller,
                NameEvent::NameUpgraded {
                    node,
                    owner: data.controller,
                },
            );
            target.wrap_from_upgrade(UpgradeData {
                name: wire,
                node,
                controller: data.controller,
                fuses: data.fuses,
                expiry: data.expiry,
                approved,
                extra_data,
            })?;
            info!(node = %node, name, "name upgraded");
            Ok(())
        })
    }

    // ========================================================================
    // Internals
    // ========================================================================

    /// Create a wrapped record for `owner`, replacing any previous one.
    pub(crate) fn mint(
        &mut self,
        actor: Address,
        node: Node,
        wire: Vec<u8>,
        owner: Address,
        fuses: Fuses,
        expiry: u64,
    ) -> Result<()> {
        self.check_target_owner(owner)?;
        check_burnable(&node, fuses)?;
        let name = decode_dns(&wire)?;
        let now = self.now();

        if !self.store.raw(&node).controller.is_zero() {
            self.burn(actor, node, now);
            self.emit(
                actor,
                NameEvent::NameUnwrapped {
                    node,
                    owner: Address::ZERO,
                },
            );
        }

        let old = self.store.get(&node, now);
        let fuses = fuses | old.fuses.mask(Fuses::PARENT_CONTROLLED);
        let expiry = expiry.max(old.expiry);
        self.store.put(node, owner, fuses, expiry);
        self.store.set_approved(node, Address::ZERO);
        self.store.set_name(node, wire);

        self.emit(
            actor,
            NameEvent::TransferSingle {
                operator: actor,
                from: Address::ZERO,
                to: owner,
                node,
            },
        );
        self.emit(
            actor,
            NameEvent::NameWrapped {
                node,
                name,
                owner,
                fuses,
                expiry,
            },
        );
        self.notify(TransferNotice {
            operator: actor,
            from: Address::ZERO,
            to: owner,
            nodes: vec![node],
            data: Vec::new(),
        })
    }

    pub(crate) fn mint_native(
        &mut self,
        actor: Address,
        label: &str,
        owner: Address,
        owner_fuses: Fuses,
        expiry: u64,
    ) -> Result<Node> {
        let parent_wire = self
            .store
            .name(&self.native_node)
            .map(|w| w.to_vec())
            .ok_or_else(|| Error::InvalidName("native zone has no recorded name".into()))?;
        let wire = add_label(label, &parent_wire)?;
        let node = self.native_node.child(&labelhash(label));
        let fuses = owner_fuses | Fuses::PARENT_CANNOT_CONTROL | Fuses::IS_NATIVE;
        self.mint(actor, node, wire, owner, fuses, expiry)?;
        Ok(node)
    }

    /// Drop the controller and approval. Parent-controlled fuses survive
    /// only while the name is emancipated and live; the expiry always does.
    fn burn(&mut self, actor: Address, node: Node, now: u64) {
        let data = self.store.get(&node, now);
        let previous = self.store.raw(&node).controller;
        let kept = if data.fuses.contains(Fuses::PARENT_CANNOT_CONTROL) {
            data.fuses.mask(Fuses::PARENT_CONTROLLED)
        } else {
            Fuses::CAN_DO_EVERYTHING
        };
        self.store.put(node, Address::ZERO, kept, data.expiry);
        self.store.set_approved(node, Address::ZERO);
        self.emit(
            actor,
            NameEvent::TransferSingle {
                operator: actor,
                from: previous,
                to: Address::ZERO,
                node,
            },
        );
    }

    pub(crate) fn unwrap_node(&mut self, actor: Address, node: Node, owner: Address) -> Result<()> {
        let now = self.now();
        if self.store.get(&node, now).fuses.contains(Fuses::CANNOT_UNWRAP) {
            return Err(Error::OperationProhibited { node });
        }
        self.burn(actor, node, now);
        self.registry.set_owner(self.address(), node, owner)?;
        info!(node = %node, owner = %owner, "name unwrapped");
        self.emit(actor, NameEvent::NameUnwrapped { node, owner });
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn create_subnode(
        &mut self,
        caller: Address,
        parent: Node,
        label: &str,
        owner: Address,
        fuses: Fuses,
        expiry: u64,
        record: Option<(Address, u64)>,
    ) -> Result<Node> {
        let now = self.now();
        self.authorize(&MODIFY_NAME, caller, &parent, None, now)?;
        check_label(label, self.config.max_label_length)?;
        let token = labelhash(label);
        let node = parent.child(&token);
        self.check_can_create(&parent, &node, now)?;
        check_settable(&node, fuses)?;

        let parent_wire = self
            .store
            .name(&parent)
            .ok_or_else(|| Error::InvalidName(format!("no recorded name for {}", parent)))?;
        let wire = add_label(label, parent_wire)?;

        let current = self.store.get(&node, now);
        let parent_data = self.store.get(&parent, now);
        check_parent_fuses(&node, fuses, parent_data.fuses)?;
        let expiry = normalise_expiry(expiry, current.expiry, parent_data.expiry);

        if !self.is_node_wrapped(&node, now) {
            self.mint(caller, node, wire, owner, fuses, expiry)?;
            self.write_subnode_record(parent, token, record)?;
        } else {
            if self.store.name(&node).is_none() {
                self.store.set_name(node, wire);
            }
            let burned = current.fuses | fuses;
            check_burnable(&node, burned)?;
            self.write_fuses(caller, node, current.controller, burned, current.expiry, expiry);
            if owner.is_zero() {
                self.write_subnode_record(parent, token, record)?;
                self.unwrap_node(caller, node, Address::ZERO)?;
            } else {
                self.check_target_owner(owner)?;
                self.transfer_node(caller, current.controller, owner, node, Vec::new())?;
                self.write_subnode_record(parent, token, record)?;
            }
        }
        debug!(parent = %parent, node = %node, label, "subname set");
        Ok(node)
    }

    /// Point the registry record of the child at the wrapper.
    fn write_subnode_record(
        &self,
        parent: Node,
        label: LabelHash,
        record: Option<(Address, u64)>,
    ) -> Result<()> {
        let me = self.address();
        match record {
            Some((resolver, ttl)) => {
                self.registry
                    .set_subnode_record(me, parent, label, me, resolver, ttl)?;
            }
            None => {
                self.registry.set_subnode_owner(me, parent, label, me)?;
            }
        }
        Ok(())
    }

    /// A fresh (or fully expired) child needs the parent to allow subdomain
    /// creation; a live child must not be emancipated.
    fn check_can_create(&self, parent: &Node, node: &Node, now: u64) -> Result<()> {
        let child = self.store.get(node, now);
        let expired = now >= child.expiry;
        let fresh = self.registry.owner(node).is_zero() || child.controller.is_zero();
        if expired && fresh {
            if self
                .store
                .get(parent, now)
                .fuses
                .contains(Fuses::CANNOT_CREATE_SUBDOMAIN)
            {
                return Err(Error::OperationProhibited { node: *node });
            }
        } else if child.fuses.contains(Fuses::PARENT_CANNOT_CONTROL) {
            return Err(Error::OperationProhibited { node: *node });
        }
        Ok(())
    }
}
