//! Authorization precedence.
//!
//! Several parties can act on a name: its controller, the controller's
//! blanket operators, the single approved delegate, the parent's controller
//! and, for expiry extension, the child itself once the parent has granted
//! `CAN_EXTEND_EXPIRY`. Each operation family has a [`Policy`]: an ordered
//! list of `(Authority, predicate)` pairs evaluated top to bottom, first
//! match wins.
//!
//! Policies only see an [`AuthContext`] built from collapsed records, so
//! they can be tested without a wrapper.

use crate::fuses::Fuses;
use crate::name::Address;
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Which branch of a policy granted access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Authority {
    Controller,
    Operator,
    Approved,
    ParentController,
    ParentOperator,
    /// The child's own controller, operator or delegate acting under
    /// `CAN_EXTEND_EXPIRY`.
    DelegatedExtend,
}

impl fmt::Display for Authority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Controller => "controller",
            Self::Operator => "operator",
            Self::Approved => "approved",
            Self::ParentController => "parent-controller",
            Self::ParentOperator => "parent-operator",
            Self::DelegatedExtend => "delegated-extend",
        };
        f.write_str(s)
    }
}

/// Blanket approvals: `owner -> operators`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OperatorSet {
    approvals: HashMap<Address, HashSet<Address>>,
}

impl OperatorSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, owner: Address, operator: Address, approved: bool) {
        if approved {
            self.approvals.entry(owner).or_default().insert(operator);
        } else if let Some(ops) = self.approvals.get_mut(&owner) {
            ops.remove(&operator);
            if ops.is_empty() {
                self.approvals.remove(&owner);
            }
        }
    }

    pub fn is_operator(&self, owner: &Address, operator: &Address) -> bool {
        self.approvals
            .get(owner)
            .map(|ops| ops.contains(operator))
            .unwrap_or(false)
    }
}

/// Collapsed view of one name as far as authorization cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Party {
    pub controller: Address,
    pub fuses: Fuses,
    /// Already filtered: zero when the controller is zero.
    pub approved: Address,
    /// A native name inside its grace period grants nothing.
    pub locked: bool,
}

/// Everything a policy may look at.
#[derive(Debug, Clone, Copy)]
pub struct AuthContext<'a> {
    pub caller: Address,
    pub name: Party,
    pub parent: Option<Party>,
    pub operators: &'a OperatorSet,
}

impl AuthContext<'_> {
    fn is_controller(&self, party: &Party) -> bool {
        !party.locked && !party.controller.is_zero() && party.controller == self.caller
    }

    fn is_operator(&self, party: &Party) -> bool {
        !party.locked
            && !party.controller.is_zero()
            && self.operators.is_operator(&party.controller, &self.caller)
    }

    fn is_approved(&self, party: &Party) -> bool {
        !party.locked && !party.approved.is_zero() && party.approved == self.caller
    }
}

type Rule = fn(&AuthContext<'_>) -> bool;

/// An ordered list of authority sources.
#[derive(Clone, Copy)]
pub struct Policy {
    name: &'static str,
    rules: &'static [(Authority, Rule)],
}

impl Policy {
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The authorities this policy consults, in order.
    pub fn authorities(&self) -> impl Iterator<Item = Authority> + '_ {
        self.rules.iter().map(|(authority, _)| *authority)
    }

    /// First authority whose predicate holds.
    pub fn resolve(&self, ctx: &AuthContext<'_>) -> Option<Authority> {
        self.rules
            .iter()
            .find(|(_, rule)| rule(ctx))
            .map(|(authority, _)| *authority)
    }

    pub fn permits(&self, ctx: &AuthContext<'_>) -> bool {
        self.resolve(ctx).is_some()
    }
}

impl fmt::Debug for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Policy")
            .field("name", &self.name)
            .field("rules", &self.authorities().collect::<Vec<_>>())
            .finish()
    }
}

fn controller(ctx: &AuthContext<'_>) -> bool {
    ctx.is_controller(&ctx.name)
}

fn operator(ctx: &AuthContext<'_>) -> bool {
    ctx.is_operator(&ctx.name)
}

fn approved(ctx: &AuthContext<'_>) -> bool {
    ctx.is_approved(&ctx.name)
}

fn parent_controller(ctx: &AuthContext<'_>) -> bool {
    ctx.parent.as_ref().is_some_and(|p| ctx.is_controller(p))
}

fn parent_operator(ctx: &AuthContext<'_>) -> bool {
    ctx.parent.as_ref().is_some_and(|p| ctx.is_operator(p))
}

fn parent_retains_control(ctx: &AuthContext<'_>) -> bool {
    !ctx.name.fuses.contains(Fuses::PARENT_CANNOT_CONTROL)
}

fn parent_controller_of_controlled_child(ctx: &AuthContext<'_>) -> bool {
    parent_retains_control(ctx) && parent_controller(ctx)
}

fn parent_operator_of_controlled_child(ctx: &AuthContext<'_>) -> bool {
    parent_retains_control(ctx) && parent_operator(ctx)
}

fn delegated_extend(ctx: &AuthContext<'_>) -> bool {
    ctx.name.fuses.contains(Fuses::CAN_EXTEND_EXPIRY)
        && (controller(ctx) || operator(ctx) || approved(ctx))
}

/// Act on the name itself: set resolver/ttl/record, burn own fuses,
/// create subnames, upgrade.
pub const MODIFY_NAME: Policy = Policy {
    name: "modify-name",
    rules: &[
        (Authority::Controller, controller),
        (Authority::Operator, operator),
        (Authority::Approved, approved),
    ],
};

/// Set or clear the per-name delegate.
pub const APPROVE: Policy = Policy {
    name: "approve",
    rules: &[
        (Authority::Controller, controller),
        (Authority::Operator, operator),
    ],
};

/// Move a name between controllers. Grace handling happens in the transfer
/// path, so callers build the context with `locked = false`.
pub const TRANSFER: Policy = Policy {
    name: "transfer",
    rules: &[
        (Authority::Controller, controller),
        (Authority::Operator, operator),
        (Authority::Approved, approved),
    ],
};

/// Extend the expiry of the parent's children without any child-side grant.
pub const EXTEND_SUBNAMES: Policy = Policy {
    name: "extend-subnames",
    rules: &[
        (Authority::Controller, controller),
        (Authority::Operator, operator),
    ],
};

/// Raise a child's expiry. The context's `name` is the child.
pub const EXTEND_EXPIRY: Policy = Policy {
    name: "extend-expiry",
    rules: &[
        (Authority::ParentController, parent_controller),
        (Authority::ParentOperator, parent_operator),
        (Authority::DelegatedExtend, delegated_extend),
    ],
};

/// Unwrap a child. The parent keeps this right until it emancipates the
/// child.
pub const UNWRAP: Policy = Policy {
    name: "unwrap",
    rules: &[
        (Authority::Controller, controller),
        (Authority::Operator, operator),
        (Authority::Approved, approved),
        (
            Authority::ParentController,
            parent_controller_of_controlled_child,
        ),
        (
            Authority::ParentOperator,
            parent_operator_of_controlled_child,
        ),
    ],
};
