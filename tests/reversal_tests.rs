mod common;

use common::{balance_of, harness, open_funded, open_with_limits};
use corebank::LedgerError;
use corebank::domain::account::AccountStatus;
use corebank::domain::money::{Amount, Balance};
use corebank::domain::transaction::{NewTransaction, TransactionStatus, TransactionType};
use rust_decimal_macros::dec;

#[tokio::test]
async fn reversing_a_deposit_claws_the_money_back() {
    let h = harness();
    let id = open_funded(&h, 1, dec!(100.00)).await;
    let deposit = h.engine.deposit(id, dec!(40.00), "").await.unwrap();

    let refund = h.engine.reverse(deposit.id).await.unwrap();

    assert_eq!(refund.kind, TransactionType::Refund);
    assert_eq!(refund.source_account_id, Some(id));
    assert_eq!(refund.destination_account_id, None);
    assert_eq!(refund.amount.value(), dec!(40.00));
    assert_eq!(refund.related_transaction_id, Some(deposit.id));
    assert_eq!(refund.balance_after.value(), dec!(100.00));
    assert!(
        refund
            .description
            .as_deref()
            .unwrap()
            .contains(&deposit.reference)
    );
    assert_eq!(balance_of(&h, id).await, dec!(100.00));

    let original = h.engine.transaction(deposit.id).await.unwrap().unwrap();
    assert_eq!(original.status, TransactionStatus::Reversed);
}

#[tokio::test]
async fn reversing_a_withdrawal_credits_it_back() {
    let h = harness();
    let id = open_funded(&h, 1, dec!(100.00)).await;
    let withdrawal = h.engine.withdraw(id, dec!(25.00), "").await.unwrap();

    let refund = h.engine.reverse(withdrawal.id).await.unwrap();

    assert_eq!(refund.source_account_id, None);
    assert_eq!(refund.destination_account_id, Some(id));
    assert_eq!(balance_of(&h, id).await, dec!(100.00));
}

#[tokio::test]
async fn reversing_a_transfer_restores_both_sides_but_not_the_fee() {
    let h = harness();
    let source = open_funded(&h, 1, dec!(2000.00)).await;
    let destination = open_funded(&h, 2, dec!(500.00)).await;
    let debit = h
        .engine
        .transfer(source, destination, dec!(1000.00), "")
        .await
        .unwrap();

    let refund = h.engine.reverse(debit.id).await.unwrap();

    // the amount comes back; the 5.00 fee stays charged
    assert_eq!(balance_of(&h, source).await, dec!(1995.00));
    assert_eq!(balance_of(&h, destination).await, dec!(500.00));
    assert_eq!(refund.source_account_id, Some(destination));
    assert_eq!(refund.destination_account_id, Some(source));
    assert_eq!(refund.balance_after.value(), dec!(500.00));

    let original = h.engine.transaction(debit.id).await.unwrap().unwrap();
    assert_eq!(original.status, TransactionStatus::Reversed);
}

#[tokio::test]
async fn a_reversal_cannot_be_reversed() {
    let h = harness();
    let id = open_funded(&h, 1, dec!(100.00)).await;
    let deposit = h.engine.deposit(id, dec!(40.00), "").await.unwrap();
    let refund = h.engine.reverse(deposit.id).await.unwrap();

    assert!(matches!(
        h.engine.reverse(refund.id).await,
        Err(LedgerError::TransactionNotReversible(id)) if id == refund.id
    ));
    assert_eq!(balance_of(&h, id).await, dec!(100.00));
}

#[tokio::test]
async fn a_transaction_reverses_at_most_once() {
    let h = harness();
    let id = open_funded(&h, 1, dec!(100.00)).await;
    let deposit = h.engine.deposit(id, dec!(40.00), "").await.unwrap();

    h.engine.reverse(deposit.id).await.unwrap();
    assert!(matches!(
        h.engine.reverse(deposit.id).await,
        Err(LedgerError::TransactionNotReversible(_))
    ));
    assert_eq!(balance_of(&h, id).await, dec!(100.00));
}

#[tokio::test]
async fn unknown_transactions_fail() {
    let h = harness();
    assert!(matches!(
        h.engine.reverse(404).await,
        Err(LedgerError::TransactionNotFound(404))
    ));
}

#[tokio::test]
async fn bookkeeping_rows_are_not_reversible() {
    let h = harness();
    let id = open_funded(&h, 1, dec!(100.00)).await;

    for kind in [
        TransactionType::Fee,
        TransactionType::InterestCredit,
        TransactionType::LoanDisbursement,
        TransactionType::LoanRepayment,
    ] {
        let row = h
            .ledger
            .append(NewTransaction {
                reference: format!("TXN-test-{kind:?}"),
                kind,
                amount: Amount::new(dec!(10.00)).unwrap(),
                source_account_id: None,
                destination_account_id: Some(id),
                owner_id: 1,
                description: None,
                balance_after: Balance::new(dec!(100.00)),
                fee_amount: None,
                related_transaction_id: None,
            })
            .await
            .unwrap();

        assert!(matches!(
            h.engine.reverse(row.id).await,
            Err(LedgerError::UnsupportedReversal(k)) if k == kind
        ));
    }
    assert_eq!(balance_of(&h, id).await, dec!(100.00));
}

#[tokio::test]
async fn reversal_fails_cleanly_when_the_funds_have_moved() {
    let h = harness();
    let id = open_funded(&h, 1, dec!(0)).await;
    let deposit = h.engine.deposit(id, dec!(100.00), "").await.unwrap();
    h.engine.withdraw(id, dec!(100.00), "").await.unwrap();

    // clawing the deposit back would take the balance below the floor
    assert!(matches!(
        h.engine.reverse(deposit.id).await,
        Err(LedgerError::InsufficientFunds(_))
    ));

    // the original stays COMPLETED and no refund row was written
    let original = h.engine.transaction(deposit.id).await.unwrap().unwrap();
    assert_eq!(original.status, TransactionStatus::Completed);
    assert_eq!(h.engine.statement(id).await.unwrap().len(), 2);
    assert_eq!(balance_of(&h, id).await, dec!(0));
}

#[tokio::test]
async fn reversal_respects_the_overdraft_band() {
    let h = harness();
    let id = open_with_limits(&h, 1, dec!(0), Some(dec!(0)), Some(dec!(100.00))).await;
    let deposit = h.engine.deposit(id, dec!(100.00), "").await.unwrap();
    h.engine.withdraw(id, dec!(50.00), "").await.unwrap();

    // 50.00 - 100.00 lands inside the overdraft band
    h.engine.reverse(deposit.id).await.unwrap();
    assert_eq!(balance_of(&h, id).await, dec!(-50.00));
}

#[tokio::test]
async fn reversal_of_a_frozen_account_transaction_fails_cleanly() {
    let h = harness();
    let id = open_funded(&h, 1, dec!(100.00)).await;
    let deposit = h.engine.deposit(id, dec!(40.00), "").await.unwrap();
    h.service.set_status(id, AccountStatus::Frozen).await.unwrap();

    assert!(matches!(
        h.engine.reverse(deposit.id).await,
        Err(LedgerError::AccountNotActive(_))
    ));
    let original = h.engine.transaction(deposit.id).await.unwrap().unwrap();
    assert_eq!(original.status, TransactionStatus::Completed);
}

#[tokio::test]
async fn transfer_reversal_fails_cleanly_when_the_destination_spent_it() {
    let h = harness();
    let source = open_funded(&h, 1, dec!(2000.00)).await;
    let destination = open_funded(&h, 2, dec!(0)).await;
    let debit = h
        .engine
        .transfer(source, destination, dec!(1000.00), "")
        .await
        .unwrap();
    h.engine.withdraw(destination, dec!(600.00), "").await.unwrap();

    assert!(matches!(
        h.engine.reverse(debit.id).await,
        Err(LedgerError::InsufficientFunds(id)) if id == destination
    ));

    // neither side changed and the transfer still stands
    assert_eq!(balance_of(&h, source).await, dec!(995.00));
    assert_eq!(balance_of(&h, destination).await, dec!(400.00));
    let original = h.engine.transaction(debit.id).await.unwrap().unwrap();
    assert_eq!(original.status, TransactionStatus::Completed);
}
