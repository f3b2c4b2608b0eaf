//! Red Team Tests - Privilege Escalation and Laundering Attempts
//!
//! Each test plays an attacker who holds some legitimate authority and tries
//! to stretch it.
//!
//! ## Test Categories
//!
//! 1. **Fuse Escalation** - burning fuses the caller has no right to
//! 2. **Parent Laundering** - a parent regaining control over an emancipated child
//! 3. **Approval Abuse** - delegates and operators against `CANNOT_APPROVE`
//! 4. **Grace and Expiry** - acting on names whose validity has lapsed
//! 5. **Receiver Hooks** - observing and vetoing deliveries
//!
//! Run: cargo test --test red_team -- --nocapture

use namefuse::{
    labelhash, namehash, Address, Error, ErrorCode, Fuses, InMemoryRegistrar, InMemoryRegistry,
    ManualClock, NameWrapper, Node, Registry, TransferNotice, TransferReceiver, WrapperConfig,
    DEFAULT_GRACE_PERIOD_SECS, MAX_EXPIRY,
};
use std::sync::{Arc, Mutex};

const ROOT_OWNER: Address = Address::repeat_byte(0xee);
const REGISTRAR: Address = Address::repeat_byte(0xaa);
const WRAPPER: Address = Address::repeat_byte(0x77);
const ADMIN: Address = Address::repeat_byte(0xad);

const ALICE: Address = Address::repeat_byte(1);
const BOB: Address = Address::repeat_byte(2);
const CAROL: Address = Address::repeat_byte(3);
const MALLORY: Address = Address::repeat_byte(0x66);

const DAY: u64 = 86_400;

struct Fixture {
    wrapper: NameWrapper,
    registry: InMemoryRegistry,
    clock: ManualClock,
}

impl Fixture {
    fn new() -> Self {
        let clock = ManualClock::new(1_700_000_000);
        let registry = InMemoryRegistry::new(ROOT_OWNER);
        registry
            .set_subnode_owner(ROOT_OWNER, Node::ROOT, labelhash("eth"), REGISTRAR)
            .unwrap();
        let registrar = InMemoryRegistrar::new(
            REGISTRAR,
            namehash("eth"),
            DEFAULT_GRACE_PERIOD_SECS,
            Arc::new(registry.clone()),
            Arc::new(clock.clone()),
        );
        registrar.add_controller(WRAPPER);

        let mut wrapper = NameWrapper::builder(WrapperConfig::new(WRAPPER, ADMIN))
            .registry(Arc::new(registry.clone()))
            .registrar(Arc::new(registrar))
            .clock(Arc::new(clock.clone()))
            .build()
            .unwrap();
        wrapper.set_controller(ADMIN, ADMIN, true).unwrap();

        Self {
            wrapper,
            registry,
            clock,
        }
    }

    fn wrapped_top_level(&mut self, label: &str, owner: Address) -> Node {
        self.registry
            .set_subnode_owner(ROOT_OWNER, Node::ROOT, labelhash(label), owner)
            .unwrap();
        self.registry
            .set_approval_for_all(owner, WRAPPER, true)
            .unwrap();
        self.wrapper.wrap(owner, label, owner, Address::ZERO).unwrap()
    }

    fn locked_top_level(&mut self, label: &str, owner: Address) -> Node {
        let node = self.wrapped_top_level(label, owner);
        self.wrapper
            .burn_parent_fuses(
                owner,
                Node::ROOT,
                labelhash(label),
                Fuses::EMANCIPATED_AND_LOCKED,
                MAX_EXPIRY,
            )
            .unwrap();
        node
    }

    fn locked_native(&mut self, label: &str, owner: Address, duration: u64) -> Node {
        self.wrapper
            .register_and_wrap(ADMIN, label, owner, duration, Address::ZERO, Fuses::CANNOT_UNWRAP)
            .unwrap();
        namehash(&format!("{}.eth", label))
    }
}

/// Records who the wrapper reports as owner while the hook runs.
#[derive(Debug, Default)]
struct ObservingReceiver {
    seen: Mutex<Vec<(Node, Address)>>,
}

impl TransferReceiver for ObservingReceiver {
    fn on_received(&self, wrapper: &NameWrapper, notice: &TransferNotice) -> namefuse::Result<()> {
        let mut seen = self.seen.lock().unwrap();
        for node in &notice.nodes {
            seen.push((*node, wrapper.owner_of(node)));
        }
        Ok(())
    }
}

/// Refuses every delivery.
#[derive(Debug)]
struct VetoReceiver;

impl TransferReceiver for VetoReceiver {
    fn on_received(&self, _wrapper: &NameWrapper, notice: &TransferNotice) -> namefuse::Result<()> {
        Err(Error::Unauthorised {
            node: notice.nodes[0],
            caller: notice.operator,
        })
    }
}

// ============================================================================
// Fuse Escalation
// ============================================================================

#[test]
fn test_owner_cannot_burn_parent_controlled_fuses() {
    let mut f = Fixture::new();
    let node = f.locked_top_level("xyz", ALICE);

    for fuse in [Fuses::CAN_EXTEND_EXPIRY, Fuses::PARENT_CANNOT_CONTROL, Fuses::IS_NATIVE] {
        let err = f.wrapper.burn_owner_fuses(ALICE, node, fuse).unwrap_err();
        assert_eq!(err.code(), ErrorCode::OperationProhibited, "{}", fuse);
    }
    assert!(!f.wrapper.all_fuses_burned(&node, Fuses::CAN_EXTEND_EXPIRY));
}

#[test]
fn test_owner_fuses_need_emancipation_and_lock() {
    let mut f = Fixture::new();
    let parent = f.wrapped_top_level("xyz", ALICE);
    let child = f
        .wrapper
        .set_subnode_owner(ALICE, parent, "sub", BOB, Fuses::CAN_DO_EVERYTHING, 0)
        .unwrap();

    let err = f
        .wrapper
        .burn_owner_fuses(BOB, child, Fuses::CANNOT_TRANSFER)
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::OperationProhibited);

    // CANNOT_UNWRAP alone would let the parent keep a locked child.
    let err = f
        .wrapper
        .burn_owner_fuses(BOB, child, Fuses::CANNOT_UNWRAP)
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::OperationProhibited);
}

#[test]
fn test_unlocked_parent_cannot_emancipate() {
    let mut f = Fixture::new();
    let parent = f.wrapped_top_level("xyz", ALICE);
    f.wrapper
        .set_subnode_owner(ALICE, parent, "sub", BOB, Fuses::CAN_DO_EVERYTHING, 0)
        .unwrap();

    let err = f
        .wrapper
        .burn_parent_fuses(ALICE, parent, labelhash("sub"), Fuses::PARENT_CANNOT_CONTROL, 0)
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::OperationProhibited);

    let err = f
        .wrapper
        .set_subnode_owner(ALICE, parent, "other", BOB, Fuses::PARENT_CANNOT_CONTROL, 0)
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::OperationProhibited);
}

#[test]
fn test_child_cannot_burn_through_parent_path() {
    let mut f = Fixture::new();
    let parent = f.locked_top_level("xyz", ALICE);
    f.wrapper
        .set_subnode_owner(ALICE, parent, "sub", MALLORY, Fuses::CAN_DO_EVERYTHING, MAX_EXPIRY)
        .unwrap();

    let err = f
        .wrapper
        .burn_parent_fuses(
            MALLORY,
            parent,
            labelhash("sub"),
            Fuses::PARENT_CANNOT_CONTROL,
            MAX_EXPIRY,
        )
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::Unauthorised);
}

#[test]
fn test_unsettable_bits_are_refused() {
    let mut f = Fixture::new();
    let parent = f.locked_top_level("xyz", ALICE);
    let err = f
        .wrapper
        .set_subnode_owner(ALICE, parent, "sub", BOB, Fuses::IS_NATIVE, MAX_EXPIRY)
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::OperationProhibited);

    let err = f
        .wrapper
        .set_subnode_owner(ALICE, parent, "sub", BOB, Fuses::from_bits(1 << 30), MAX_EXPIRY)
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::OperationProhibited);
}

// ============================================================================
// Parent Laundering
// ============================================================================

#[test]
fn test_parent_cannot_add_fuses_to_emancipated_child() {
    let mut f = Fixture::new();
    let parent = f.locked_top_level("xyz", ALICE);
    let label = labelhash("sub");
    f.wrapper
        .set_subnode_owner(ALICE, parent, "sub", BOB, Fuses::PARENT_CANNOT_CONTROL, 1_800_000_000)
        .unwrap();

    let err = f
        .wrapper
        .burn_parent_fuses(ALICE, parent, label, Fuses::CAN_EXTEND_EXPIRY, MAX_EXPIRY)
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::OperationProhibited);

    // Re-stating existing fuses only extends the expiry.
    f.wrapper
        .burn_parent_fuses(ALICE, parent, label, Fuses::PARENT_CANNOT_CONTROL, 1_900_000_000)
        .unwrap();
    let data = f.wrapper.get_data(&namehash("sub.xyz"));
    assert_eq!(data.fuses, Fuses::PARENT_CANNOT_CONTROL);
    assert_eq!(data.expiry, 1_900_000_000);
}

#[test]
fn test_unwrap_and_rewrap_keeps_emancipation() {
    let mut f = Fixture::new();
    let parent_node = f.locked_native("alice", ALICE, 365 * DAY);
    let label = labelhash("sub");
    let child = namehash("sub.alice.eth");
    f.wrapper
        .set_subnode_owner(ALICE, parent_node, "sub", BOB, Fuses::PARENT_CANNOT_CONTROL, MAX_EXPIRY)
        .unwrap();

    // The emancipated child leaves the wrapper and comes back.
    f.wrapper.unwrap(BOB, parent_node, label, BOB).unwrap();
    assert_eq!(f.registry.owner(&child), BOB);
    f.registry.set_approval_for_all(BOB, WRAPPER, true).unwrap();
    f.wrapper
        .wrap(BOB, "sub.alice.eth", BOB, Address::ZERO)
        .unwrap();

    let data = f.wrapper.get_data(&child);
    assert_eq!(data.controller, BOB);
    assert!(data.fuses.contains(Fuses::PARENT_CANNOT_CONTROL));

    // The parent still has no way back in.
    let err = f
        .wrapper
        .set_subnode_owner(ALICE, parent_node, "sub", MALLORY, Fuses::CAN_DO_EVERYTHING, 0)
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::OperationProhibited);
    let err = f.wrapper.unwrap(ALICE, parent_node, label, ALICE).unwrap_err();
    assert_eq!(err.code(), ErrorCode::Unauthorised);
}

#[test]
fn test_rejected_operations_leave_no_trace() {
    let mut f = Fixture::new();
    let parent = f.locked_top_level("xyz", ALICE);
    f.wrapper.drain_events();

    // Owner fuses on a fresh child that is not emancipated.
    let err = f
        .wrapper
        .set_subnode_owner(ALICE, parent, "sub", BOB, Fuses::CANNOT_TRANSFER, MAX_EXPIRY)
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::OperationProhibited);
    let child = namehash("sub.xyz");
    assert_eq!(f.wrapper.owner_of(&child), Address::ZERO);
    assert_eq!(f.wrapper.name_of(&child), None);
    assert_eq!(f.registry.owner(&child), Address::ZERO);
    assert!(f.wrapper.pending_events().is_empty());
}

// ============================================================================
// Approval Abuse
// ============================================================================

#[test]
fn test_cannot_approve_freezes_delegate_against_everyone() {
    let mut f = Fixture::new();
    let node = f.locked_top_level("xyz", ALICE);
    f.wrapper.approve(ALICE, node, CAROL).unwrap();
    f.wrapper
        .burn_owner_fuses(ALICE, node, Fuses::CANNOT_APPROVE)
        .unwrap();
    f.wrapper.set_approval_for_all(ALICE, MALLORY, true).unwrap();

    for caller in [ALICE, MALLORY] {
        let err = f.wrapper.approve(caller, node, Address::ZERO).unwrap_err();
        assert_eq!(err.code(), ErrorCode::OperationProhibited);
    }

    // The frozen delegate survives a transfer and keeps working for the new owner.
    f.wrapper
        .safe_transfer_from(ALICE, ALICE, BOB, node, Vec::new())
        .unwrap();
    assert_eq!(f.wrapper.get_approved(&node), CAROL);
    f.wrapper
        .safe_transfer_from(CAROL, BOB, ALICE, node, Vec::new())
        .unwrap();
    assert_eq!(f.wrapper.owner_of(&node), ALICE);
}

#[test]
fn test_delegate_cannot_appoint_delegates() {
    let mut f = Fixture::new();
    let node = f.wrapped_top_level("xyz", ALICE);
    f.wrapper.approve(ALICE, node, CAROL).unwrap();

    let err = f.wrapper.approve(CAROL, node, MALLORY).unwrap_err();
    assert_eq!(err.code(), ErrorCode::Unauthorised);
    assert_eq!(f.wrapper.get_approved(&node), CAROL);
}

#[test]
fn test_stale_delegate_cannot_move_reissued_name() {
    let mut f = Fixture::new();
    let node = f.wrapped_top_level("xyz", ALICE);
    f.wrapper.approve(ALICE, node, MALLORY).unwrap();
    f.wrapper
        .safe_transfer_from(ALICE, ALICE, BOB, node, Vec::new())
        .unwrap();

    let err = f
        .wrapper
        .safe_transfer_from(MALLORY, BOB, MALLORY, node, Vec::new())
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::Unauthorised);
}

#[test]
fn test_self_operator_and_wrapper_target_are_rejected() {
    let mut f = Fixture::new();
    let node = f.wrapped_top_level("xyz", ALICE);

    let err = f.wrapper.set_approval_for_all(ALICE, ALICE, true).unwrap_err();
    assert_eq!(err.code(), ErrorCode::ApprovalToCurrentOwner);

    for to in [WRAPPER, Address::ZERO] {
        let err = f
            .wrapper
            .safe_transfer_from(ALICE, ALICE, to, node, Vec::new())
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::IncorrectTargetOwner);
    }
}

// ============================================================================
// Grace and Expiry
// ============================================================================

#[test]
fn test_grace_period_strips_native_authority() {
    let mut f = Fixture::new();
    let node = f.locked_native("alice", ALICE, DAY);
    f.wrapper.set_approval_for_all(ALICE, CAROL, true).unwrap();

    f.clock.advance(DAY);
    // Still recorded, but no longer usable.
    assert_eq!(f.wrapper.get_data(&node).controller, ALICE);
    assert!(!f.wrapper.can_modify_name(&node, &ALICE));
    assert!(!f.wrapper.can_modify_name(&node, &CAROL));

    let err = f.wrapper.set_resolver(ALICE, node, ALICE).unwrap_err();
    assert_eq!(err.code(), ErrorCode::Unauthorised);
    let err = f
        .wrapper
        .set_subnode_owner(ALICE, node, "sub", BOB, Fuses::CAN_DO_EVERYTHING, 0)
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::Unauthorised);
    let err = f
        .wrapper
        .safe_transfer_from(ALICE, ALICE, BOB, node, Vec::new())
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::InsufficientBalance);
}

#[test]
fn test_lapsed_emancipated_name_cannot_move() {
    let mut f = Fixture::new();
    let parent = f.locked_top_level("xyz", ALICE);
    let expiry = f.wrapper.now() + 100;
    let child = f
        .wrapper
        .set_subnode_owner(ALICE, parent, "sub", BOB, Fuses::PARENT_CANNOT_CONTROL, expiry)
        .unwrap();

    f.clock.advance(100);
    let err = f
        .wrapper
        .safe_transfer_from(BOB, BOB, CAROL, child, Vec::new())
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::InsufficientBalance);
    let err = f.wrapper.set_resolver(BOB, child, BOB).unwrap_err();
    assert_eq!(err.code(), ErrorCode::Unauthorised);
}

#[test]
fn test_expired_fuses_stop_binding() {
    let mut f = Fixture::new();
    let parent = f.locked_top_level("xyz", ALICE);
    let expiry = f.wrapper.now() + 100;
    let err = f
        .wrapper
        .set_subnode_owner(
            ALICE,
            parent,
            "sub",
            BOB,
            Fuses::CANNOT_SET_TTL | Fuses::CANNOT_UNWRAP,
            expiry,
        )
        .unwrap_err();
    // Owner fuses need the child emancipated, so this is refused outright.
    assert_eq!(err.code(), ErrorCode::OperationProhibited);

    let child = f
        .wrapper
        .set_subnode_owner(ALICE, parent, "sub", BOB, Fuses::CAN_DO_EVERYTHING, expiry)
        .unwrap();
    f.wrapper
        .burn_parent_fuses(ALICE, parent, labelhash("sub"), Fuses::CAN_EXTEND_EXPIRY, expiry)
        .unwrap();
    assert!(f.wrapper.all_fuses_burned(&child, Fuses::CAN_EXTEND_EXPIRY));

    f.clock.advance(100);
    // Not emancipated: the controller survives, the fuses do not.
    let data = f.wrapper.get_data(&child);
    assert_eq!(data.controller, BOB);
    assert_eq!(data.fuses, Fuses::CAN_DO_EVERYTHING);
    f.wrapper.set_ttl(BOB, child, 30).unwrap();
}

// ============================================================================
// Receiver Hooks
// ============================================================================

#[test]
fn test_receiver_observes_committed_owner() {
    let mut f = Fixture::new();
    let node = f.wrapped_top_level("xyz", ALICE);
    let receiver = Arc::new(ObservingReceiver::default());
    f.wrapper.register_receiver(BOB, receiver.clone());

    f.wrapper
        .safe_transfer_from(ALICE, ALICE, BOB, node, b"hello".to_vec())
        .unwrap();
    let child = f
        .wrapper
        .set_subnode_owner(BOB, node, "sub", BOB, Fuses::CAN_DO_EVERYTHING, 0)
        .unwrap();

    let seen = receiver.seen.lock().unwrap();
    assert_eq!(seen.as_slice(), &[(node, BOB), (child, BOB)]);
}

#[test]
fn test_vetoing_receiver_rolls_back_everything() {
    let mut f = Fixture::new();
    let node = f.wrapped_top_level("xyz", ALICE);
    f.wrapper.approve(ALICE, node, CAROL).unwrap();
    f.wrapper.register_receiver(MALLORY, Arc::new(VetoReceiver));
    f.wrapper.drain_events();

    let err = f
        .wrapper
        .safe_transfer_from(ALICE, ALICE, MALLORY, node, Vec::new())
        .unwrap_err();
    assert!(matches!(err, Error::TransferRejected { receiver, .. } if receiver == MALLORY));
    assert_eq!(f.wrapper.owner_of(&node), ALICE);
    assert_eq!(f.wrapper.get_approved(&node), CAROL);

    let err = f
        .wrapper
        .set_subnode_owner(ALICE, node, "sub", MALLORY, Fuses::CAN_DO_EVERYTHING, 0)
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::TransferRejected);
    let child = namehash("sub.xyz");
    assert_eq!(f.wrapper.owner_of(&child), Address::ZERO);
    assert_eq!(f.registry.owner(&child), Address::ZERO);
    assert!(f.wrapper.pending_events().is_empty());

    assert!(f.wrapper.remove_receiver(&MALLORY).is_some());
    f.wrapper
        .safe_transfer_from(ALICE, ALICE, MALLORY, node, Vec::new())
        .unwrap();
}
