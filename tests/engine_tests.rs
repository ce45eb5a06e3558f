mod common;

use common::{balance_of, harness, open_funded, open_with_limits};
use corebank::LedgerError;
use corebank::domain::account::AccountStatus;
use corebank::domain::transaction::{TransactionStatus, TransactionType};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

#[tokio::test]
async fn deposit_credits_and_records() {
    let h = harness();
    let id = open_funded(&h, 1, dec!(100.00)).await;

    let row = h.engine.deposit(id, dec!(25.50), "cash").await.unwrap();

    assert_eq!(row.kind, TransactionType::Deposit);
    assert_eq!(row.status, TransactionStatus::Completed);
    assert_eq!(row.destination_account_id, Some(id));
    assert_eq!(row.source_account_id, None);
    assert_eq!(row.amount.value(), dec!(25.50));
    assert_eq!(row.balance_after.value(), dec!(125.50));
    assert!(row.reference.starts_with("TXN"));
    assert_eq!(balance_of(&h, id).await, dec!(125.50));
}

#[tokio::test]
async fn withdraw_debits_and_records() {
    let h = harness();
    let id = open_funded(&h, 1, dec!(100.00)).await;

    let row = h.engine.withdraw(id, dec!(40.00), "atm").await.unwrap();

    assert_eq!(row.kind, TransactionType::Withdrawal);
    assert_eq!(row.source_account_id, Some(id));
    assert_eq!(row.destination_account_id, None);
    assert_eq!(row.balance_after.value(), dec!(60.00));
    assert_eq!(balance_of(&h, id).await, dec!(60.00));
}

#[tokio::test]
async fn deposit_then_withdraw_round_trips_exactly() {
    let h = harness();
    let id = open_funded(&h, 1, dec!(123.4567)).await;

    for amount in [dec!(0.0001), dec!(1), dec!(999.9999)] {
        h.engine.deposit(id, amount, "").await.unwrap();
        h.engine.withdraw(id, amount, "").await.unwrap();
        assert_eq!(balance_of(&h, id).await, dec!(123.4567));
    }
}

#[tokio::test]
async fn withdrawal_at_the_minimum_balance_boundary_fails() {
    let h = harness();
    let id =
        open_with_limits(&h, 1, dec!(1000.00), Some(dec!(1000.00)), Some(dec!(0))).await;

    assert!(matches!(
        h.engine.withdraw(id, dec!(0.01), "").await,
        Err(LedgerError::InsufficientFunds(_))
    ));
    assert_eq!(balance_of(&h, id).await, dec!(1000.00));
    assert!(h.engine.statement(id).await.unwrap().is_empty());
}

#[tokio::test]
async fn withdrawal_into_the_overdraft_band_succeeds() {
    let h = harness();
    let id = open_with_limits(&h, 1, dec!(100.00), Some(dec!(0)), Some(dec!(50.00))).await;

    h.engine.withdraw(id, dec!(120.00), "").await.unwrap();
    assert_eq!(balance_of(&h, id).await, dec!(-20.00));

    assert!(matches!(
        h.engine.withdraw(id, dec!(30.01), "").await,
        Err(LedgerError::InsufficientFunds(_))
    ));
}

#[tokio::test]
async fn operations_on_missing_accounts_fail() {
    let h = harness();
    assert!(matches!(
        h.engine.deposit(42, dec!(1), "").await,
        Err(LedgerError::AccountNotFound(42))
    ));
    assert!(matches!(
        h.engine.withdraw(42, dec!(1), "").await,
        Err(LedgerError::AccountNotFound(42))
    ));
}

#[tokio::test]
async fn frozen_and_closed_accounts_reject_money_movement() {
    let h = harness();
    let id = open_funded(&h, 1, dec!(100.00)).await;

    h.service.set_status(id, AccountStatus::Frozen).await.unwrap();
    assert!(matches!(
        h.engine.deposit(id, dec!(1), "").await,
        Err(LedgerError::AccountNotActive(_))
    ));

    h.service.close(id).await.unwrap();
    assert!(matches!(
        h.engine.withdraw(id, dec!(1), "").await,
        Err(LedgerError::AccountNotActive(_))
    ));
    assert_eq!(balance_of(&h, id).await, dec!(100.00));
}

#[tokio::test]
async fn statement_lookups_round_trip() {
    let h = harness();
    let id = open_funded(&h, 7, dec!(50.00)).await;

    let row = h.engine.deposit(id, dec!(10.00), "").await.unwrap();

    let by_id = h.engine.transaction(row.id).await.unwrap().unwrap();
    assert_eq!(by_id, row);
    let by_reference = h
        .engine
        .transaction_by_reference(&row.reference)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(by_reference, row);

    assert_eq!(h.engine.statement(id).await.unwrap(), vec![row.clone()]);
    assert_eq!(h.engine.transactions_for_owner(7).await.unwrap().len(), 1);
    assert_eq!(
        h.engine
            .transactions_for_owner_with_status(7, TransactionStatus::Completed)
            .await
            .unwrap()
            .len(),
        1
    );
    assert!(h
        .engine
        .transactions_for_owner_with_status(7, TransactionStatus::Reversed)
        .await
        .unwrap()
        .is_empty());

    let window = h
        .engine
        .transactions_between(row.transaction_date, row.transaction_date)
        .await
        .unwrap();
    assert_eq!(window.len(), 1);
}

#[tokio::test]
async fn cancel_voids_a_row_without_touching_the_balance() {
    let h = harness();
    let id = open_funded(&h, 1, dec!(100.00)).await;
    let row = h.engine.deposit(id, dec!(10.00), "").await.unwrap();

    let cancelled = h.engine.cancel(row.id).await.unwrap();
    assert_eq!(cancelled.status, TransactionStatus::Cancelled);
    assert_eq!(balance_of(&h, id).await, dec!(110.00));

    // terminal both ways
    assert!(matches!(
        h.engine.cancel(row.id).await,
        Err(LedgerError::TransactionNotReversible(_))
    ));
    assert!(matches!(
        h.engine.reverse(row.id).await,
        Err(LedgerError::TransactionNotReversible(_))
    ));
}

#[tokio::test]
async fn balance_replays_from_the_ledger() {
    let h = harness();
    let source = open_funded(&h, 1, dec!(5000.00)).await;
    let destination = open_funded(&h, 2, dec!(100.00)).await;

    h.engine.deposit(source, dec!(250.25), "").await.unwrap();
    h.engine.withdraw(source, dec!(75.75), "").await.unwrap();
    h.engine
        .transfer(source, destination, dec!(1200.00), "")
        .await
        .unwrap();
    let deposit = h.engine.deposit(destination, dec!(10.00), "").await.unwrap();
    h.engine.reverse(deposit.id).await.unwrap();

    for account in [source, destination] {
        let mut replayed = if account == source {
            dec!(5000.00)
        } else {
            dec!(100.00)
        };
        for row in h.engine.statement(account).await.unwrap() {
            let amount = row.amount.value();
            let fee = row.fee_amount.map(|f| f.value()).unwrap_or(Decimal::ZERO);
            match row.kind {
                TransactionType::Deposit if row.destination_account_id == Some(account) => {
                    replayed += amount;
                }
                TransactionType::Withdrawal if row.source_account_id == Some(account) => {
                    replayed -= amount;
                }
                TransactionType::Transfer => {
                    // The debit leg carries the fee; the credit leg links back
                    // to it.
                    if row.related_transaction_id.is_none()
                        && row.source_account_id == Some(account)
                    {
                        replayed -= amount + fee;
                    } else if row.related_transaction_id.is_some()
                        && row.destination_account_id == Some(account)
                    {
                        replayed += amount;
                    }
                }
                TransactionType::Refund => {
                    if row.source_account_id == Some(account) {
                        replayed -= amount;
                    } else if row.destination_account_id == Some(account) {
                        replayed += amount;
                    }
                }
                _ => {}
            }
        }
        assert_eq!(replayed, balance_of(&h, account).await);
    }
}
