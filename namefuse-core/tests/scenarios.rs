//! End-to-end scenarios over the in-memory registry and registrar.
//!
//! 1. **Expiry collapse** - a lapsed native name reads as unowned and can be
//!    re-registered and re-wrapped by someone else
//! 2. **Expiry clamping** - a parent extends a child only up to its own expiry
//! 3. **Emancipation** - a parent loses unwrap power until the child lapses
//!
//! Run: cargo test --test scenarios

use namefuse::{
    labelhash, namehash, Address, ErrorCode, Fuses, InMemoryRegistrar, InMemoryRegistry,
    ManualClock, NameData, NameWrapper, Node, Registrar, Registry, WrapperConfig,
    DEFAULT_GRACE_PERIOD_SECS,
};
use std::sync::Arc;

const ROOT_OWNER: Address = Address::repeat_byte(0xee);
const REGISTRAR: Address = Address::repeat_byte(0xaa);
const WRAPPER: Address = Address::repeat_byte(0x77);
const ADMIN: Address = Address::repeat_byte(0xad);
const SALES: Address = Address::repeat_byte(0xcc);

const ALICE: Address = Address::repeat_byte(1);
const BOB: Address = Address::repeat_byte(2);
const CAROL: Address = Address::repeat_byte(3);

const DAY: u64 = 86_400;
const GRACE: u64 = DEFAULT_GRACE_PERIOD_SECS;

struct Fixture {
    wrapper: NameWrapper,
    registry: InMemoryRegistry,
    registrar: InMemoryRegistrar,
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
            GRACE,
            Arc::new(registry.clone()),
            Arc::new(clock.clone()),
        );
        registrar.add_controller(WRAPPER);
        registrar.add_controller(SALES);

        let mut wrapper = NameWrapper::builder(WrapperConfig::new(WRAPPER, ADMIN))
            .registry(Arc::new(registry.clone()))
            .registrar(Arc::new(registrar.clone()))
            .clock(Arc::new(clock.clone()))
            .build()
            .unwrap();
        wrapper.set_controller(ADMIN, ADMIN, true).unwrap();

        Self {
            wrapper,
            registry,
            registrar,
            clock,
        }
    }

    /// Register directly with the registrar and let the wrapper move the token.
    fn register(&self, label: &str, owner: Address, duration: u64) -> u64 {
        let expires = self
            .registrar
            .register(SALES, labelhash(label), owner, duration)
            .unwrap();
        self.registrar
            .set_approval_for_all(owner, WRAPPER, true)
            .unwrap();
        expires
    }

    /// Register `alice.eth` into the wrapper, locked against unwrapping.
    /// Returns the wrapped expiry.
    fn locked_parent(&mut self) -> u64 {
        let registrar_expiry = self
            .wrapper
            .register_and_wrap(
                ADMIN,
                "alice",
                ALICE,
                365 * DAY,
                Address::ZERO,
                Fuses::CANNOT_UNWRAP,
            )
            .unwrap();
        registrar_expiry + GRACE
    }
}

#[test]
fn test_lapsed_native_name_collapses_and_rewraps_for_new_owner() {
    let mut f = Fixture::new();
    let node = namehash("xyz.eth");

    let registrar_expiry = f.register("xyz", ALICE, DAY);
    let expiry0 = f
        .wrapper
        .wrap_native(ALICE, "xyz", ALICE, Fuses::CAN_DO_EVERYTHING, Address::ZERO)
        .unwrap();
    assert_eq!(expiry0, registrar_expiry + GRACE);

    let data = f.wrapper.get_data(&node);
    assert_eq!(data.controller, ALICE);
    assert!(data.fuses.mask(Fuses::OWNER_CONTROLLED).is_empty());
    assert!(data.fuses.contains(Fuses::PARENT_CANNOT_CONTROL | Fuses::IS_NATIVE));
    assert_eq!(data.expiry, expiry0);
    assert_eq!(f.registrar.owner_of(&labelhash("xyz")), Some(WRAPPER));
    assert_eq!(f.registry.owner(&node), WRAPPER);

    // One day plus grace later the record collapses.
    f.clock.advance(DAY + GRACE);
    assert_eq!(
        f.wrapper.get_data(&node),
        NameData {
            controller: Address::ZERO,
            fuses: Fuses::CAN_DO_EVERYTHING,
            expiry: expiry0,
        }
    );
    assert!(!f.wrapper.is_wrapped(&node));

    // Once the registrar frees the label, Bob registers and wraps it locked.
    f.clock.advance(1);
    f.register("xyz", BOB, 365 * DAY);
    let new_expiry = f
        .wrapper
        .wrap_native(BOB, "xyz", BOB, Fuses::CANNOT_UNWRAP, Address::ZERO)
        .unwrap();
    assert!(new_expiry > expiry0);
    assert_eq!(
        f.wrapper.get_data(&node),
        NameData {
            controller: BOB,
            fuses: Fuses::CANNOT_UNWRAP | Fuses::PARENT_CANNOT_CONTROL | Fuses::IS_NATIVE,
            expiry: new_expiry,
        }
    );
    assert_eq!(f.wrapper.balance_of(&ALICE, &node), 0);
    assert_eq!(f.wrapper.balance_of(&BOB, &node), 1);
}

#[test]
fn test_parent_extends_child_only_up_to_its_own_expiry() {
    let mut f = Fixture::new();
    let parent_expiry = f.locked_parent();
    let parent = namehash("alice.eth");
    let sub = labelhash("sub");
    let child = namehash("sub.alice.eth");

    f.wrapper
        .set_subnode_owner(ALICE, parent, "sub", BOB, Fuses::CAN_DO_EVERYTHING, 0)
        .unwrap();
    let burned = f
        .wrapper
        .burn_parent_fuses(
            ALICE,
            parent,
            sub,
            Fuses::PARENT_CANNOT_CONTROL | Fuses::CANNOT_UNWRAP,
            parent_expiry - 3600,
        )
        .unwrap();
    assert_eq!(burned, Fuses::PARENT_CANNOT_CONTROL | Fuses::CANNOT_UNWRAP);
    assert_eq!(f.wrapper.get_data(&child).expiry, parent_expiry - 3600);

    // The child's own controller has no extension grant.
    let err = f.wrapper.extend_expiry(BOB, parent, sub, u64::MAX).unwrap_err();
    assert_eq!(err.code(), ErrorCode::OperationProhibited);

    // A stranger is simply unauthorised.
    let err = f.wrapper.extend_expiry(CAROL, parent, sub, u64::MAX).unwrap_err();
    assert_eq!(err.code(), ErrorCode::Unauthorised);

    let extended = f.wrapper.extend_expiry(ALICE, parent, sub, u64::MAX).unwrap();
    assert_eq!(extended, parent_expiry);
    assert_eq!(f.wrapper.get_data(&child).expiry, parent_expiry);
}

#[test]
fn test_delegated_extend_lets_child_extend_itself() {
    let mut f = Fixture::new();
    let parent_expiry = f.locked_parent();
    let parent = namehash("alice.eth");

    f.wrapper
        .set_subnode_owner(
            ALICE,
            parent,
            "dele",
            BOB,
            Fuses::PARENT_CANNOT_CONTROL | Fuses::CANNOT_UNWRAP | Fuses::CAN_EXTEND_EXPIRY,
            parent_expiry - 3600,
        )
        .unwrap();

    let extended = f
        .wrapper
        .extend_expiry(BOB, parent, labelhash("dele"), u64::MAX)
        .unwrap();
    assert_eq!(extended, parent_expiry);
}

#[test]
fn test_emancipated_child_resists_parent_until_it_lapses() {
    let mut f = Fixture::new();
    f.locked_parent();
    let parent = namehash("alice.eth");
    let label = labelhash("locked");
    let child = namehash("locked.alice.eth");
    let child_expiry = f.wrapper.now() + 1_000;

    f.wrapper
        .set_subnode_owner(
            ALICE,
            parent,
            "locked",
            BOB,
            Fuses::PARENT_CANNOT_CONTROL | Fuses::CANNOT_UNWRAP,
            child_expiry,
        )
        .unwrap();

    // The parent no longer counts as an authority over the child.
    let err = f.wrapper.unwrap(ALICE, parent, label, ALICE).unwrap_err();
    assert_eq!(err.code(), ErrorCode::Unauthorised);
    // The child itself is blocked by its own fuse.
    let err = f.wrapper.unwrap(BOB, parent, label, BOB).unwrap_err();
    assert_eq!(err.code(), ErrorCode::OperationProhibited);
    // Nor can the parent simply reissue it.
    let err = f
        .wrapper
        .set_subnode_owner(ALICE, parent, "locked", CAROL, Fuses::CAN_DO_EVERYTHING, child_expiry)
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::OperationProhibited);

    f.clock.advance(1_000);
    assert_eq!(f.wrapper.get_data(&child).controller, Address::ZERO);

    let fresh_expiry = f.wrapper.now() + 1_000;
    f.wrapper
        .set_subnode_owner(
            ALICE,
            parent,
            "locked",
            CAROL,
            Fuses::CAN_DO_EVERYTHING,
            fresh_expiry,
        )
        .unwrap();
    assert_eq!(
        f.wrapper.get_data(&child),
        NameData {
            controller: CAROL,
            fuses: Fuses::CAN_DO_EVERYTHING,
            expiry: fresh_expiry,
        }
    );

    f.wrapper.unwrap(ALICE, parent, label, ALICE).unwrap();
    assert_eq!(f.registry.owner(&child), ALICE);
    assert_eq!(f.wrapper.owner_of(&child), Address::ZERO);
    assert!(!f.wrapper.is_wrapped(&child));
}
