use rust_decimal::Decimal;

use crate::domain::money::{self, Amount};

/// 0.5% of the transferred amount.
fn fee_rate() -> Decimal {
    Decimal::new(5, 3)
}

fn minimum_fee() -> Decimal {
    Decimal::new(100, 2)
}

fn maximum_fee() -> Decimal {
    Decimal::new(5_000, 2)
}

/// Fee charged to the source account of a transfer, on top of the amount.
///
/// `clamp(amount * 0.005, 1.00, 50.00)`, rounded half-up to the ledger scale
/// before clamping. The floor keeps the result strictly positive.
pub fn transfer_fee(amount: Amount) -> Amount {
    let raw = amount.value() * fee_rate();
    Amount::from_raw(money::quantize(raw).clamp(minimum_fee(), maximum_fee()))
}
