//! External collaborators.
//!
//! The wrapper never owns the raw name ledger or the native registrar. It
//! talks to them through the [`Registry`] and [`Registrar`] traits, which are
//! injected at build time. Every write names the acting address so the
//! adapter can enforce its own authorization, exactly as the real ledger
//! would.
//!
//! [`InMemoryRegistry`] and [`InMemoryRegistrar`] are shared-handle fakes:
//! clones point at the same state, so a test can hand one clone to the
//! wrapper and keep another to inspect or drive the ledger directly.

use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::fuses::Fuses;
use crate::name::{Address, LabelHash, Node};
use crate::wrapper::NameWrapper;
use std::collections::{HashMap, HashSet};
use std::fmt::Debug;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

// ============================================================================
// Traits
// ============================================================================

/// The raw name-ownership ledger.
pub trait Registry: Send + Sync + Debug {
    fn owner(&self, node: &Node) -> Address;
    fn resolver(&self, node: &Node) -> Address;
    fn ttl(&self, node: &Node) -> u64;

    fn set_owner(&self, caller: Address, node: Node, owner: Address) -> Result<()>;
    fn set_resolver(&self, caller: Address, node: Node, resolver: Address) -> Result<()>;
    fn set_ttl(&self, caller: Address, node: Node, ttl: u64) -> Result<()>;
    fn set_record(
        &self,
        caller: Address,
        node: Node,
        owner: Address,
        resolver: Address,
        ttl: u64,
    ) -> Result<()>;
    fn set_subnode_owner(
        &self,
        caller: Address,
        parent: Node,
        label: LabelHash,
        owner: Address,
    ) -> Result<Node>;
    fn set_subnode_record(
        &self,
        caller: Address,
        parent: Node,
        label: LabelHash,
        owner: Address,
        resolver: Address,
        ttl: u64,
    ) -> Result<Node>;

    fn is_approved_for_all(&self, owner: &Address, operator: &Address) -> bool;
    fn set_approval_for_all(&self, caller: Address, operator: Address, approved: bool)
        -> Result<()>;
}

/// The legacy registrar of the native zone. Tokens are label hashes.
pub trait Registrar: Send + Sync + Debug {
    /// The registrar's own account, used to recognise deliveries.
    fn address(&self) -> Address;
    /// Current registrant, or `None` once the registration has expired.
    fn owner_of(&self, label: &LabelHash) -> Option<Address>;
    fn is_approved_for_all(&self, owner: &Address, operator: &Address) -> bool;
    fn set_approval_for_all(&self, caller: Address, operator: Address, approved: bool)
        -> Result<()>;
    /// Registration expiry in Unix seconds, 0 if never registered.
    fn name_expires(&self, label: &LabelHash) -> u64;
    fn available(&self, label: &LabelHash) -> bool;
    /// Register for `duration` seconds, returning the new expiry.
    fn register(
        &self,
        caller: Address,
        label: LabelHash,
        owner: Address,
        duration: u64,
    ) -> Result<u64>;
    /// Extend by `duration` seconds, returning the new expiry.
    fn renew(&self, caller: Address, label: LabelHash, duration: u64) -> Result<u64>;
    fn transfer_from(
        &self,
        caller: Address,
        from: Address,
        to: Address,
        label: LabelHash,
    ) -> Result<()>;
    /// Point the registry record of the name at `owner`.
    fn reclaim(&self, caller: Address, label: LabelHash, owner: Address) -> Result<()>;
}

/// Everything a successor wrapper needs to take over a name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradeData {
    /// DNS wire-format name.
    pub name: Vec<u8>,
    pub node: Node,
    pub controller: Address,
    pub fuses: Fuses,
    pub expiry: u64,
    pub approved: Address,
    pub extra_data: Vec<u8>,
}

/// A successor wrapper that accepts migrated names.
pub trait UpgradeTarget: Send + Sync + Debug {
    fn address(&self) -> Address;
    fn wrap_from_upgrade(&self, data: UpgradeData) -> Result<()>;
}

/// Details of a wrapped-name delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferNotice {
    pub operator: Address,
    /// Zero for a fresh mint.
    pub from: Address,
    pub to: Address,
    pub nodes: Vec<Node>,
    pub data: Vec<u8>,
}

/// Acceptance hook for accounts that want to vet incoming names.
///
/// Called after the store reflects the delivery, so `wrapper` already shows
/// `to` as the controller. Returning an error vetoes the whole operation.
pub trait TransferReceiver: Send + Sync + Debug {
    fn on_received(&self, wrapper: &NameWrapper, notice: &TransferNotice) -> Result<()>;
}

// ============================================================================
// In-memory registry
// ============================================================================

#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct RegistryRecord {
    owner: Address,
    resolver: Address,
    ttl: u64,
}

#[derive(Debug, Default)]
struct RegistryState {
    records: HashMap<Node, RegistryRecord>,
    operators: HashSet<(Address, Address)>,
}

impl RegistryState {
    fn authorised(&self, node: &Node, caller: &Address) -> bool {
        let owner = self.records.get(node).map(|r| r.owner).unwrap_or_default();
        !owner.is_zero() && (owner == *caller || self.operators.contains(&(owner, *caller)))
    }

    fn require(&self, node: &Node, caller: &Address) -> Result<()> {
        if self.authorised(node, caller) {
            Ok(())
        } else {
            Err(Error::Adapter(format!(
                "registry: {} is not authorised for {}",
                caller, node
            )))
        }
    }
}

/// Shared in-memory [`Registry`].
#[derive(Debug, Clone, Default)]
pub struct InMemoryRegistry {
    state: Arc<RwLock<RegistryState>>,
}

impl InMemoryRegistry {
    /// New ledger whose root node belongs to `root_owner`.
    pub fn new(root_owner: Address) -> Self {
        let mut state = RegistryState::default();
        state.records.insert(
            Node::ROOT,
            RegistryRecord {
                owner: root_owner,
                ..Default::default()
            },
        );
        Self {
            state: Arc::new(RwLock::new(state)),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, RegistryState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, RegistryState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Registry for InMemoryRegistry {
    fn owner(&self, node: &Node) -> Address {
        self.read()
            .records
            .get(node)
            .map(|r| r.owner)
            .unwrap_or_default()
    }

    fn resolver(&self, node: &Node) -> Address {
        self.read()
            .records
            .get(node)
            .map(|r| r.resolver)
            .unwrap_or_default()
    }

    fn ttl(&self, node: &Node) -> u64 {
        self.read().records.get(node).map(|r| r.ttl).unwrap_or(0)
    }

    fn set_owner(&self, caller: Address, node: Node, owner: Address) -> Result<()> {
        let mut state = self.write();
        state.require(&node, &caller)?;
        state.records.entry(node).or_default().owner = owner;
        Ok(())
    }

    fn set_resolver(&self, caller: Address, node: Node, resolver: Address) -> Result<()> {
        let mut state = self.write();
        state.require(&node, &caller)?;
        state.records.entry(node).or_default().resolver = resolver;
        Ok(())
    }

    fn set_ttl(&self, caller: Address, node: Node, ttl: u64) -> Result<()> {
        let mut state = self.write();
        state.require(&node, &caller)?;
        state.records.entry(node).or_default().ttl = ttl;
        Ok(())
    }

    fn set_record(
        &self,
        caller: Address,
        node: Node,
        owner: Address,
        resolver: Address,
        ttl: u64,
    ) -> Result<()> {
        let mut state = self.write();
        state.require(&node, &caller)?;
        state.records.insert(
            node,
            RegistryRecord {
                owner,
                resolver,
                ttl,
            },
        );
        Ok(())
    }

    fn set_subnode_owner(
        &self,
        caller: Address,
        parent: Node,
        label: LabelHash,
        owner: Address,
    ) -> Result<Node> {
        let mut state = self.write();
        state.require(&parent, &caller)?;
        let node = parent.child(&label);
        state.records.entry(node).or_default().owner = owner;
        Ok(node)
    }

    fn set_subnode_record(
        &self,
        caller: Address,
        parent: Node,
        label: LabelHash,
        owner: Address,
        resolver: Address,
        ttl: u64,
    ) -> Result<Node> {
        let mut state = self.write();
        state.require(&parent, &caller)?;
        let node = parent.child(&label);
        state.records.insert(
            node,
            RegistryRecord {
                owner,
                resolver,
                ttl,
            },
        );
        Ok(node)
    }

    fn is_approved_for_all(&self, owner: &Address, operator: &Address) -> bool {
        self.read().operators.contains(&(*owner, *operator))
    }

    fn set_approval_for_all(
        &self,
        caller: Address,
        operator: Address,
        approved: bool,
    ) -> Result<()> {
        let mut state = self.write();
        if approved {
            state.operators.insert((caller, operator));
        } else {
            state.operators.remove(&(caller, operator));
        }
        Ok(())
    }
}

// ============================================================================
// In-memory registrar
// ============================================================================

#[derive(Debug, Default)]
struct RegistrarState {
    owners: HashMap<LabelHash, Address>,
    expiries: HashMap<LabelHash, u64>,
    operators: HashSet<(Address, Address)>,
    controllers: HashSet<Address>,
}

impl RegistrarState {
    fn live_owner(&self, label: &LabelHash, now: u64) -> Option<Address> {
        let expires = self.expiries.get(label).copied().unwrap_or(0);
        if expires > now {
            self.owners.get(label).copied()
        } else {
            None
        }
    }
}

/// Shared in-memory [`Registrar`] for the native zone.
///
/// It must own the native zone node in the registry it is given, since
/// registrations and reclaims write subnode records under it.
#[derive(Debug, Clone)]
pub struct InMemoryRegistrar {
    address: Address,
    native_node: Node,
    grace_period: u64,
    registry: Arc<dyn Registry>,
    clock: Arc<dyn Clock>,
    state: Arc<RwLock<RegistrarState>>,
}

impl InMemoryRegistrar {
    pub fn new(
        address: Address,
        native_node: Node,
        grace_period: u64,
        registry: Arc<dyn Registry>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            address,
            native_node,
            grace_period,
            registry,
            clock,
            state: Arc::new(RwLock::new(RegistrarState::default())),
        }
    }

    /// Allow `controller` to register and renew names.
    pub fn add_controller(&self, controller: Address) {
        self.write().controllers.insert(controller);
    }

    fn read(&self) -> RwLockReadGuard<'_, RegistrarState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, RegistrarState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn require_controller(state: &RegistrarState, caller: &Address) -> Result<()> {
        if state.controllers.contains(caller) {
            Ok(())
        } else {
            Err(Error::Adapter(format!(
                "registrar: {} is not a controller",
                caller
            )))
        }
    }
}

impl Registrar for InMemoryRegistrar {
    fn address(&self) -> Address {
        self.address
    }

    fn owner_of(&self, label: &LabelHash) -> Option<Address> {
        self.read().live_owner(label, self.clock.now())
    }

    fn is_approved_for_all(&self, owner: &Address, operator: &Address) -> bool {
        self.read().operators.contains(&(*owner, *operator))
    }

    fn set_approval_for_all(
        &self,
        caller: Address,
        operator: Address,
        approved: bool,
    ) -> Result<()> {
        let mut state = self.write();
        if approved {
            state.operators.insert((caller, operator));
        } else {
            state.operators.remove(&(caller, operator));
        }
        Ok(())
    }

    fn name_expires(&self, label: &LabelHash) -> u64 {
        self.read().expiries.get(label).copied().unwrap_or(0)
    }

    fn available(&self, label: &LabelHash) -> bool {
        let expires = self.name_expires(label);
        expires.saturating_add(self.grace_period) < self.clock.now()
    }

    fn register(
        &self,
        caller: Address,
        label: LabelHash,
        owner: Address,
        duration: u64,
    ) -> Result<u64> {
        if !self.available(&label) {
            return Err(Error::NameNotAvailable { label });
        }
        let expires = self.clock.now().saturating_add(duration);
        {
            let mut state = self.write();
            Self::require_controller(&state, &caller)?;
            state.owners.insert(label, owner);
            state.expiries.insert(label, expires);
        }
        self.registry
            .set_subnode_owner(self.address, self.native_node, label, owner)?;
        Ok(expires)
    }

    fn renew(&self, caller: Address, label: LabelHash, duration: u64) -> Result<u64> {
        let now = self.clock.now();
        let mut state = self.write();
        Self::require_controller(&state, &caller)?;
        let current = state.expiries.get(&label).copied().unwrap_or(0);
        if current.saturating_add(self.grace_period) < now {
            return Err(Error::NameExpired { label });
        }
        let expires = current.saturating_add(duration);
        state.expiries.insert(label, expires);
        Ok(expires)
    }

    fn transfer_from(
        &self,
        caller: Address,
        from: Address,
        to: Address,
        label: LabelHash,
    ) -> Result<()> {
        let now = self.clock.now();
        let mut state = self.write();
        let owner = state
            .live_owner(&label, now)
            .ok_or(Error::NameExpired { label })?;
        if owner != from {
            return Err(Error::Adapter(format!(
                "registrar: {} does not hold the token",
                from
            )));
        }
        if caller != owner && !state.operators.contains(&(owner, caller)) {
            return Err(Error::Adapter(format!(
                "registrar: {} may not move tokens of {}",
                caller, owner
            )));
        }
        state.owners.insert(label, to);
        Ok(())
    }

    fn reclaim(&self, caller: Address, label: LabelHash, owner: Address) -> Result<()> {
        {
            let state = self.read();
            let registrant = state
                .live_owner(&label, self.clock.now())
                .ok_or(Error::NameExpired { label })?;
            if caller != registrant && !state.operators.contains(&(registrant, caller)) {
                return Err(Error::Adapter(format!(
                    "registrar: {} may not reclaim",
                    caller
                )));
            }
        }
        self.registry
            .set_subnode_owner(self.address, self.native_node, label, owner)?;
        Ok(())
    }
}
