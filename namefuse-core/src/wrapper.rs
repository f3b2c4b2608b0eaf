//! The name wrapper.
//!
//! [`NameWrapper`] owns the fuse/expiry store and brokers every mutation
//! between callers, the raw registry and the native registrar. Each public
//! mutating method runs inside [`NameWrapper::transact`]:
//!
//! 1. the store journal opens and an event buffer starts;
//! 2. the operation reads collapsed records, resolves authority, checks
//!    fuse rules and writes the store;
//! 3. receivers are notified against the already-updated store, then the
//!    adapters are written;
//! 4. on success the journal is dropped and buffered events are published,
//!    on failure the journal is replayed backwards and the events discarded.
//!
//! Operations are split by concern: fuse/expiry/approval rules live in
//! `engine`, wrap/unwrap and subname creation in `lifecycle`, token
//! movement in `transfer`.

use crate::adapters::{Registrar, Registry, TransferNotice, TransferReceiver, UpgradeTarget};
use crate::audit::{AuditEvent, AuditLogger, NameEvent, NoOpLogger};
use crate::authority::{AuthContext, Authority, OperatorSet, Party, Policy, EXTEND_SUBNAMES, MODIFY_NAME};
use crate::clock::{Clock, SystemClock};
use crate::config::WrapperConfig;
use crate::error::{Error, Result};
use crate::fuses::Fuses;
use crate::name::{decode_dns, encode_dns, labelhash, namehash, read_labels, Address, LabelHash, Node};
use crate::store::{FuseStore, NameData, MAX_EXPIRY};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info};

/// Fuse/expiry permission engine over a registry and a native registrar.
#[derive(Debug)]
pub struct NameWrapper {
    pub(crate) config: WrapperConfig,
    pub(crate) native_node: Node,
    pub(crate) store: FuseStore,
    pub(crate) registry: Arc<dyn Registry>,
    pub(crate) registrar: Arc<dyn Registrar>,
    pub(crate) clock: Arc<dyn Clock>,
    logger: Arc<dyn AuditLogger>,
    pub(crate) operators: OperatorSet,
    pub(crate) controllers: HashSet<Address>,
    pub(crate) upgrade_target: Option<Arc<dyn UpgradeTarget>>,
    receivers: HashMap<Address, Arc<dyn TransferReceiver>>,
    staged: Vec<AuditEvent>,
    pending_events: Vec<AuditEvent>,
}

/// Builder for a [`NameWrapper`] with validated configuration.
///
/// ```rust,ignore
/// let wrapper = NameWrapper::builder(config)
///     .registry(Arc::new(registry))
///     .registrar(Arc::new(registrar))
///     .clock(Arc::new(clock))
///     .build()?;
/// ```
#[derive(Debug)]
pub struct NameWrapperBuilder {
    config: WrapperConfig,
    registry: Option<Arc<dyn Registry>>,
    registrar: Option<Arc<dyn Registrar>>,
    clock: Option<Arc<dyn Clock>>,
    logger: Option<Arc<dyn AuditLogger>>,
}

impl NameWrapperBuilder {
    pub fn new(config: WrapperConfig) -> Self {
        Self {
            config,
            registry: None,
            registrar: None,
            clock: None,
            logger: None,
        }
    }

    /// Required.
    pub fn registry(mut self, registry: Arc<dyn Registry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Required.
    pub fn registrar(mut self, registrar: Arc<dyn Registrar>) -> Self {
        self.registrar = Some(registrar);
        self
    }

    /// Default: [`SystemClock`].
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Default: [`NoOpLogger`].
    pub fn audit_logger(mut self, logger: Arc<dyn AuditLogger>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Validate the configuration and seed the root and native zone records.
    pub fn build(self) -> Result<NameWrapper> {
        self.config.validate().map_err(|errors| {
            Error::ConfigurationError(
                errors
                    .iter()
                    .map(|e| e.to_string())
                    .collect::<Vec<_>>()
                    .join("; "),
            )
        })?;
        let registry = self
            .registry
            .ok_or_else(|| Error::ConfigurationError("a registry adapter is required".into()))?;
        let registrar = self
            .registrar
            .ok_or_else(|| Error::ConfigurationError("a registrar adapter is required".into()))?;

        let native_node = self.config.native_node();
        let mut store = FuseStore::new();
        for (node, name) in [(Node::ROOT, ""), (native_node, self.config.native_zone.as_str())] {
            store.put(node, Address::ZERO, Fuses::EMANCIPATED_AND_LOCKED, MAX_EXPIRY);
            store.set_name(node, encode_dns(name)?);
        }

        info!(
            wrapper = %self.config.wrapper_address,
            native_zone = %self.config.native_zone,
            "name wrapper initialised"
        );

        Ok(NameWrapper {
            config: self.config,
            native_node,
            store,
            registry,
            registrar,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            logger: self.logger.unwrap_or_else(|| Arc::new(NoOpLogger)),
            operators: OperatorSet::new(),
            controllers: HashSet::new(),
            upgrade_target: None,
            receivers: HashMap::new(),
            staged: Vec::new(),
            pending_events: Vec::new(),
        })
    }
}

impl NameWrapper {
    pub fn builder(config: WrapperConfig) -> NameWrapperBuilder {
        NameWrapperBuilder::new(config)
    }

    /// The wrapper's own account.
    pub fn address(&self) -> Address {
        self.config.wrapper_address
    }

    pub fn config(&self) -> &WrapperConfig {
        &self.config
    }

    pub fn native_node(&self) -> Node {
        self.native_node
    }

    pub fn now(&self) -> u64 {
        self.clock.now()
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Collapsed `{controller, fuses, expiry}` of a name.
    pub fn get_data(&self, node: &Node) -> NameData {
        self.store.get(node, self.now())
    }

    pub fn owner_of(&self, node: &Node) -> Address {
        self.get_data(node).controller
    }

    /// The per-name delegate, or zero when the name has no controller.
    pub fn get_approved(&self, node: &Node) -> Address {
        self.approved_at(node, self.now())
    }

    /// Blanket approval over everything `owner` controls in the wrapper.
    pub fn is_approved_for_all(&self, owner: &Address, operator: &Address) -> bool {
        self.operators.is_operator(owner, operator)
    }

    pub fn all_fuses_burned(&self, node: &Node, fuses: Fuses) -> bool {
        self.get_data(node).fuses.contains(fuses)
    }

    pub fn can_modify_name(&self, node: &Node, addr: &Address) -> bool {
        let now = self.now();
        MODIFY_NAME.permits(&self.context(*addr, node, None, now))
    }

    pub fn can_extend_subnames(&self, node: &Node, addr: &Address) -> bool {
        let now = self.now();
        EXTEND_SUBNAMES.permits(&self.context(*addr, node, None, now))
    }

    /// Whether the name recorded for `node` is currently wrapped.
    pub fn is_wrapped(&self, node: &Node) -> bool {
        let Some(wire) = self.store.name(node) else {
            return false;
        };
        let Ok(labels) = read_labels(wire) else {
            return false;
        };
        let Some((label, rest)) = labels.split_first() else {
            return false;
        };
        self.is_child_wrapped(&namehash(&rest.join(".")), &labelhash(label))
    }

    /// Whether `label` under `parent` is wrapped. Native names also need the
    /// registrar token to sit with the wrapper.
    pub fn is_child_wrapped(&self, parent: &Node, label: &LabelHash) -> bool {
        let node = parent.child(label);
        let wrapped = self.is_node_wrapped(&node, self.now());
        if *parent != self.native_node {
            return wrapped;
        }
        wrapped && self.registrar.owner_of(label) == Some(self.address())
    }

    pub fn balance_of(&self, owner: &Address, node: &Node) -> u64 {
        u64::from(!owner.is_zero() && self.owner_of(node) == *owner)
    }

    /// Human-readable name a node was created from.
    pub fn name_of(&self, node: &Node) -> Option<String> {
        self.store.name(node).and_then(|wire| decode_dns(wire).ok())
    }

    pub fn is_controller(&self, addr: &Address) -> bool {
        self.controllers.contains(addr)
    }

    /// Events published since the last drain.
    pub fn pending_events(&self) -> &[AuditEvent] {
        &self.pending_events
    }

    pub fn drain_events(&mut self) -> Vec<AuditEvent> {
        std::mem::take(&mut self.pending_events)
    }

    // ========================================================================
    // Administration
    // ========================================================================

    /// Allow or revoke a registration controller.
    pub fn set_controller(&mut self, caller: Address, controller: Address, active: bool) -> Result<()> {
        self.transact("set_controller", |w| {
            w.require_admin(caller)?;
            if active {
                w.controllers.insert(controller);
            } else {
                w.controllers.remove(&controller);
            }
            info!(controller = %controller, active, "controller changed");
            w.emit(caller, NameEvent::ControllerChanged { controller, active });
            Ok(())
        })
    }

    /// Install or remove the successor wrapper. The successor is made an
    /// operator of the wrapper on both adapters so it can take names over.
    pub fn set_upgrade_contract(
        &mut self,
        caller: Address,
        target: Option<Arc<dyn UpgradeTarget>>,
    ) -> Result<()> {
        self.transact("set_upgrade_contract", |w| {
            w.require_admin(caller)?;
            let me = w.address();
            if let Some(old) = w.upgrade_target.clone() {
                w.registry.set_approval_for_all(me, old.address(), false)?;
                w.registrar.set_approval_for_all(me, old.address(), false)?;
            }
            if let Some(new) = target.as_ref() {
                w.registry.set_approval_for_all(me, new.address(), true)?;
                w.registrar.set_approval_for_all(me, new.address(), true)?;
            }
            let installed = target.is_some();
            w.upgrade_target = target;
            info!(installed, "upgrade contract changed");
            w.emit(caller, NameEvent::UpgradeContractChanged { installed });
            Ok(())
        })
    }

    /// Register an acceptance hook for deliveries to `account`.
    pub fn register_receiver(&mut self, account: Address, receiver: Arc<dyn TransferReceiver>) {
        self.receivers.insert(account, receiver);
    }

    pub fn remove_receiver(&mut self, account: &Address) -> Option<Arc<dyn TransferReceiver>> {
        self.receivers.remove(account)
    }

    // ========================================================================
    // Internals shared by the operation modules
    // ========================================================================

    /// Run `op` atomically: all store writes and events, or none.
    pub(crate) fn transact<T>(
        &mut self,
        op: &'static str,
        f: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        self.store.begin();
        match f(self) {
            Ok(value) => {
                self.store.commit();
                let events = std::mem::take(&mut self.staged);
                for event in &events {
                    self.logger.log(event);
                }
                debug!(op, events = events.len(), "operation committed");
                self.pending_events.extend(events);
                Ok(value)
            }
            Err(e) => {
                self.store.rollback();
                self.staged.clear();
                debug!(op, code = e.code().code(), error = %e, "operation rejected");
                Err(e)
            }
        }
    }

    pub(crate) fn emit(&mut self, actor: Address, event: NameEvent) {
        self.staged.push(AuditEvent::new(actor, event));
    }

    pub(crate) fn approved_at(&self, node: &Node, now: u64) -> Address {
        if self.store.get(node, now).controller.is_zero() {
            Address::ZERO
        } else {
            self.store.approved(node)
        }
    }

    /// Native names stop granting authority once their grace period starts.
    pub(crate) fn in_grace_period(&self, data: &NameData, now: u64) -> bool {
        data.fuses.contains(Fuses::IS_NATIVE)
            && now >= data.expiry.saturating_sub(self.config.grace_period_secs)
    }

    pub(crate) fn party(&self, node: &Node, now: u64) -> Party {
        let data = self.store.get(node, now);
        Party {
            controller: data.controller,
            fuses: data.fuses,
            approved: self.approved_at(node, now),
            locked: self.in_grace_period(&data, now),
        }
    }

    pub(crate) fn context(
        &self,
        caller: Address,
        node: &Node,
        parent: Option<&Node>,
        now: u64,
    ) -> AuthContext<'_> {
        AuthContext {
            caller,
            name: self.party(node, now),
            parent: parent.map(|p| self.party(p, now)),
            operators: &self.operators,
        }
    }

    /// Resolve `policy` or fail with `Unauthorised` on `node`.
    pub(crate) fn authorize(
        &self,
        policy: &Policy,
        caller: Address,
        node: &Node,
        parent: Option<&Node>,
        now: u64,
    ) -> Result<Authority> {
        match policy.resolve(&self.context(caller, node, parent, now)) {
            Some(authority) => {
                debug!(policy = policy.name(), %authority, caller = %caller.fingerprint(), "authorised");
                Ok(authority)
            }
            None => Err(Error::Unauthorised {
                node: *node,
                caller,
            }),
        }
    }

    /// Live controller in the store and the wrapper holds the registry record.
    pub(crate) fn is_node_wrapped(&self, node: &Node, now: u64) -> bool {
        !self.store.get(node, now).controller.is_zero()
            && self.registry.owner(node) == self.address()
    }

    /// Reject the zero address and the wrapper as a wrapped owner.
    pub(crate) fn check_target_owner(&self, owner: Address) -> Result<()> {
        if owner.is_zero() || owner == self.address() {
            return Err(Error::IncorrectTargetOwner { owner });
        }
        Ok(())
    }

    /// Offer a delivery to the recipient's hook. The store already reflects
    /// it, and any error vetoes the enclosing operation.
    pub(crate) fn notify(&self, notice: TransferNotice) -> Result<()> {
        let Some(receiver) = self.receivers.get(&notice.to) else {
            return Ok(());
        };
        receiver
            .on_received(self, &notice)
            .map_err(|e| match e {
                Error::TransferRejected { .. } => e,
                other => Error::TransferRejected {
                    receiver: notice.to,
                    reason: other.to_string(),
                },
            })
    }

    pub(crate) fn require_controller(&self, caller: Address) -> Result<()> {
        if self.controllers.contains(&caller) {
            Ok(())
        } else {
            Err(Error::NotController { caller })
        }
    }

    fn require_admin(&self, caller: Address) -> Result<()> {
        if caller == self.config.admin {
            Ok(())
        } else {
            Err(Error::NotAdmin { caller })
        }
    }
}
