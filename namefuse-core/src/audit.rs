//! Audit events.
//!
//! Every committed state change produces one or more [`NameEvent`]s wrapped
//! in an [`AuditEvent`]. The wrapper hands them to its [`AuditLogger`] and
//! also keeps them in a pending buffer that callers drain. Events from a
//! rejected operation are discarded together with its state changes.

use crate::fuses::Fuses;
use crate::name::{Address, Node};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, Mutex};

/// What happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NameEvent {
    NameWrapped {
        node: Node,
        name: String,
        owner: Address,
        fuses: Fuses,
        expiry: u64,
    },
    NameUnwrapped {
        node: Node,
        owner: Address,
    },
    FusesSet {
        node: Node,
        fuses: Fuses,
    },
    ExpiryExtended {
        node: Node,
        expiry: u64,
    },
    TransferSingle {
        operator: Address,
        from: Address,
        to: Address,
        node: Node,
    },
    TransferBatch {
        operator: Address,
        from: Address,
        to: Address,
        nodes: Vec<Node>,
    },
    Approval {
        owner: Address,
        approved: Address,
        node: Node,
    },
    ApprovalForAll {
        owner: Address,
        operator: Address,
        approved: bool,
    },
    ControllerChanged {
        controller: Address,
        active: bool,
    },
    UpgradeContractChanged {
        installed: bool,
    },
    NameUpgraded {
        node: Node,
        owner: Address,
    },
}

impl NameEvent {
    /// The node the event is about, if it concerns a single name.
    pub fn node(&self) -> Option<Node> {
        match self {
            Self::NameWrapped { node, .. }
            | Self::NameUnwrapped { node, .. }
            | Self::FusesSet { node, .. }
            | Self::ExpiryExtended { node, .. }
            | Self::TransferSingle { node, .. }
            | Self::Approval { node, .. }
            | Self::NameUpgraded { node, .. } => Some(*node),
            _ => None,
        }
    }
}

/// A timestamped event together with the caller that caused it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditEvent {
    pub timestamp: DateTime<Utc>,
    /// Caller of the operation.
    pub actor: Address,
    #[serde(flatten)]
    pub event: NameEvent,
}

impl AuditEvent {
    pub fn new(actor: Address, event: NameEvent) -> Self {
        Self {
            timestamp: Utc::now(),
            actor,
            event,
        }
    }
}

/// Trait for audit loggers.
pub trait AuditLogger: Send + Sync + std::fmt::Debug {
    /// Log an audit event.
    fn log(&self, event: &AuditEvent);
}

/// A logger that writes events to stdout as JSON lines.
#[derive(Debug, Default)]
pub struct StdoutLogger;

impl StdoutLogger {
    pub fn new() -> Self {
        Self
    }
}

impl AuditLogger for StdoutLogger {
    fn log(&self, event: &AuditEvent) {
        if let Ok(json) = serde_json::to_string(event) {
            println!("{}", json);
        } else {
            eprintln!("Failed to serialize audit event: {:?}", event);
        }
    }
}

/// A logger that does nothing.
#[derive(Debug, Default)]
pub struct NoOpLogger;

impl AuditLogger for NoOpLogger {
    fn log(&self, _event: &AuditEvent) {}
}

/// A logger that keeps every event in memory. Clones share the buffer.
#[derive(Debug, Default, Clone)]
pub struct MemoryLogger {
    events: Arc<Mutex<Vec<AuditEvent>>>,
}

impl MemoryLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.events.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AuditLogger for MemoryLogger {
    fn log(&self, event: &AuditEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}
