use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use rand::Rng;

/// Generates transaction references:
/// `TXN` + second-resolution timestamp + rolling sequence mod 10000 + 4
/// random digits.
///
/// The process-local sequence plus entropy is not globally unique across
/// concurrent processes; the ledger's unique-reference constraint is, and the
/// engine regenerates on collision.
#[derive(Debug, Default)]
pub struct ReferenceGenerator {
    sequence: AtomicU64,
}

impl ReferenceGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generate(&self) -> String {
        let timestamp = Utc::now().format("%Y%m%d%H%M%S");
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed) % 10_000;
        let entropy = rand::thread_rng().gen_range(0..10_000u32);
        format!("TXN{timestamp}{sequence:04}{entropy:04}")
    }
}
