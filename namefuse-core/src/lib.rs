//! # namefuse
//!
//! Fuse/expiry permission engine for hierarchical names.
//!
//! A name owner can hand out subnames while keeping, or permanently giving
//! up, specific controls. Controls are "fuses": one-way bits that stay
//! burned until the name expires. Expiry is inherited down the tree, and an
//! expired name collapses to an unowned, unrestricted state at read time.
//!
//! ## Key Concepts
//!
//! - **Node**: SHA-256 hierarchical hash of a dotted name
//! - **Fuses**: owner-controlled (low 16 bits) and parent-controlled (high 16 bits) restrictions
//! - **Emancipation**: burning `PARENT_CANNOT_CONTROL` removes the parent's power over a child
//! - **Native zone**: the one top-level zone whose expiry comes from a legacy registrar
//!
//! ## Example
//!
//! ```rust,ignore
//! use namefuse::{Fuses, NameWrapper, WrapperConfig};
//!
//! let mut wrapper = NameWrapper::builder(config)
//!     .registry(registry)
//!     .registrar(registrar)
//!     .build()?;
//!
//! // Wrap a native name and lock it against unwrapping
//! wrapper.wrap_native(alice, "alice", alice, Fuses::CANNOT_UNWRAP, resolver)?;
//!
//! // Issue an emancipated subname that can extend its own expiry
//! let parent = namehash("alice.eth");
//! wrapper.set_subnode_owner(
//!     alice,
//!     parent,
//!     "bob",
//!     bob,
//!     Fuses::PARENT_CANNOT_CONTROL | Fuses::CAN_EXTEND_EXPIRY,
//!     u64::MAX,
//! )?;
//! ```

pub mod adapters;
pub mod audit;
pub mod authority;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod fuses;
pub mod lifecycle;
pub mod name;
pub mod store;
pub mod transfer;
pub mod wire;
pub mod wrapper;

// Re-exports for convenience
pub use adapters::{
    InMemoryRegistrar, InMemoryRegistry, Registrar, Registry, TransferNotice, TransferReceiver,
    UpgradeData, UpgradeTarget,
};
pub use audit::{AuditEvent, AuditLogger, MemoryLogger, NameEvent, NoOpLogger, StdoutLogger};
pub use authority::{Authority, Policy};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{WrapperConfig, DEFAULT_GRACE_PERIOD_SECS};
pub use error::{Error, ErrorCode, Result};
pub use fuses::Fuses;
pub use name::{labelhash, namehash, Address, LabelHash, Node};
pub use store::{NameData, MAX_EXPIRY};
pub use wire::{TransferData, MAX_TRANSFER_DATA_SIZE};
pub use wrapper::{NameWrapper, NameWrapperBuilder};

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    const ROOT_OWNER: Address = Address::repeat_byte(0xee);
    const REGISTRAR: Address = Address::repeat_byte(0xaa);
    const WRAPPER: Address = Address::repeat_byte(0x77);
    const ADMIN: Address = Address::repeat_byte(0xad);
    const ALICE: Address = Address::repeat_byte(1);

    fn setup() -> (NameWrapper, InMemoryRegistrar, ManualClock) {
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
            .registry(Arc::new(registry))
            .registrar(Arc::new(registrar.clone()))
            .clock(Arc::new(clock.clone()))
            .build()
            .unwrap();
        wrapper.set_controller(ADMIN, ADMIN, true).unwrap();
        (wrapper, registrar, clock)
    }

    #[test]
    fn test_seeded_zones_are_locked_and_unowned() {
        let (wrapper, _, _) = setup();
        for node in [Node::ROOT, namehash("eth")] {
            let data = wrapper.get_data(&node);
            assert_eq!(data.controller, Address::ZERO);
            assert_eq!(data.fuses, Fuses::EMANCIPATED_AND_LOCKED);
            assert_eq!(data.expiry, MAX_EXPIRY);
        }
        assert_eq!(wrapper.name_of(&namehash("eth")).as_deref(), Some("eth"));
    }

    #[test]
    fn test_register_and_lock() {
        let (mut wrapper, _, clock) = setup();
        let registrar_expiry = wrapper
            .register_and_wrap(ADMIN, "alice", ALICE, 365 * 86_400, Address::ZERO, Fuses::CANNOT_UNWRAP)
            .unwrap();
        assert_eq!(registrar_expiry, clock.now() + 365 * 86_400);

        let node = namehash("alice.eth");
        let data = wrapper.get_data(&node);
        assert_eq!(data.controller, ALICE);
        assert!(data.fuses.contains(Fuses::CANNOT_UNWRAP | Fuses::IS_NATIVE));
        assert_eq!(data.expiry, registrar_expiry + DEFAULT_GRACE_PERIOD_SECS);
        assert!(wrapper.is_wrapped(&node));
        assert_eq!(wrapper.name_of(&node).as_deref(), Some("alice.eth"));
    }

    #[test]
    fn test_rejected_operation_publishes_nothing() {
        let (mut wrapper, _, _) = setup();
        wrapper.drain_events();
        let err = wrapper
            .register_and_wrap(ALICE, "alice", ALICE, 100, Address::ZERO, Fuses::CAN_DO_EVERYTHING)
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotController);
        assert!(wrapper.pending_events().is_empty());
    }
}
