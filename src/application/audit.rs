use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tokio::sync::mpsc;

use crate::domain::account::{AccountId, OwnerId};
use crate::domain::transaction::TransactionId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOperation {
    Deposit,
    Withdrawal,
    Transfer,
    Reversal,
}

/// Side-effect record emitted once per committed balance mutation, consumed
/// by an external audit collaborator.
#[derive(Debug, Clone, Serialize)]
pub struct AuditRecord {
    pub operation: AuditOperation,
    pub actor: OwnerId,
    pub account_id: AccountId,
    pub balance_before: Decimal,
    pub balance_after: Decimal,
    pub transaction_id: TransactionId,
    pub reference: String,
    pub at: DateTime<Utc>,
}

/// Structured record of an internal fault, consumed by an external
/// error-logging collaborator.
#[derive(Debug, Clone, Serialize)]
pub struct FaultRecord {
    pub operation: AuditOperation,
    pub message: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub enum AuditEvent {
    Record(AuditRecord),
    Fault(FaultRecord),
}

/// Delivery is fire-and-forget: a sink must not block the engine and must
/// swallow its own delivery failures.
pub trait AuditSink: Send + Sync {
    fn record(&self, record: AuditRecord);
    fn fault(&self, fault: FaultRecord);
}

/// Sink for callers that do not wire an audit collaborator.
#[derive(Debug, Default)]
pub struct NoopAuditSink;

impl AuditSink for NoopAuditSink {
    fn record(&self, _record: AuditRecord) {}
    fn fault(&self, _fault: FaultRecord) {}
}

/// Forwards events over an unbounded channel; drops them once the consumer
/// goes away.
#[derive(Debug, Clone)]
pub struct ChannelAuditSink {
    sender: mpsc::UnboundedSender<AuditEvent>,
}

impl ChannelAuditSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<AuditEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl AuditSink for ChannelAuditSink {
    fn record(&self, record: AuditRecord) {
        let _ = self.sender.send(AuditEvent::Record(record));
    }

    fn fault(&self, fault: FaultRecord) {
        let _ = self.sender.send(AuditEvent::Fault(fault));
    }
}
