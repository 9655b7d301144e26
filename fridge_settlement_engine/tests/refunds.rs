use fridge_settlement_engine::{
    db_types::{Brl, OrderStatusType, TransactionStatus, WalletTransactionType},
    traits::{CardDetails, WalletManagement},
    SettlementError,
};

mod support;
use support::TestContext;

#[tokio::test]
async fn refunding_an_order_restores_stock_and_credits_the_wallet() {
    let ctx = TestContext::new().await;
    let alice = ctx.fixture.alice.id;
    let (water, soda) = (ctx.fixture.water.id, ctx.fixture.soda.id);
    let settled = ctx.orders().settle_wallet(ctx.alice_buys(&[(water, 1), (soda, 2)])).await.unwrap();
    assert_eq!(ctx.wallet().balance(alice).await.unwrap(), Brl::from(450));

    let refunded = ctx.refunds().refund_order(settled.order.id).await.unwrap();
    assert_eq!(refunded.order.status, OrderStatusType::Refunded);
    assert_eq!(refunded.new_balance, Brl::from(2000));
    assert_eq!(refunded.refund_entry.tx_type, WalletTransactionType::Deposit);
    assert_eq!(refunded.refund_entry.amount, Brl::from(1550));
    assert_eq!(refunded.refund_entry.related_order_id, Some(settled.order.id));
    assert_eq!(refunded.refund_entry.description, "Reembolso (1x Water, 2x Soda)");
    assert_eq!(ctx.stock(water).await, 10);
    assert_eq!(ctx.stock(soda).await, 10);

    // A second refund is refused and changes nothing
    let err = ctx.refunds().refund_order(settled.order.id).await.unwrap_err();
    assert!(matches!(err, SettlementError::IllegalOrderTransition { status: OrderStatusType::Refunded, .. }));
    assert_eq!(ctx.wallet().balance(alice).await.unwrap(), Brl::from(2000));
    assert_eq!(ctx.stock(water).await, 10);
    ctx.tear_down().await;
}

#[tokio::test]
async fn gateway_orders_are_refunded_to_the_wallet() {
    let ctx = TestContext::new().await;
    let bruno = ctx.fixture.bruno.id;
    let card = CardDetails { token: "tok".into(), payment_method_id: "elo".into(), issuer_id: None, installments: 1 };
    let outcome = ctx.orders().settle_card(ctx.cart_for(bruno, &[(ctx.fixture.soda.id, 1)]), card).await.unwrap();
    let refunded = ctx.refunds().refund_order(outcome.order().id).await.unwrap();
    assert_eq!(refunded.new_balance, Brl::from(600));
    ctx.tear_down().await;
}

#[tokio::test]
async fn only_paid_orders_can_be_refunded() {
    let ctx = TestContext::new().await;
    let outcome = ctx.orders().settle_pix(ctx.alice_buys(&[(ctx.fixture.water.id, 1)])).await.unwrap();
    let err = ctx.refunds().refund_order(outcome.order().id).await.unwrap_err();
    assert!(matches!(err, SettlementError::IllegalOrderTransition { status: OrderStatusType::Pending, .. }));
    let err = ctx.refunds().refund_order(9999).await.unwrap_err();
    assert!(matches!(err, SettlementError::OrderNotFound(9999)));
    ctx.tear_down().await;
}

#[tokio::test]
async fn reversing_an_unspent_deposit() {
    let ctx = TestContext::new().await;
    let bruno = ctx.fixture.bruno.id;
    let deposit = ctx.wallet().adjust_balance(bruno, Brl::from(3000), "Depósito em espécie").await.unwrap();

    let reversal = ctx.refunds().refund_deposit(deposit.id).await.unwrap();
    assert_eq!(reversal.original_amount, Brl::from(3000));
    assert_eq!(reversal.debited, Brl::from(3000));
    assert_eq!(reversal.new_balance, Brl::from(0));
    assert_eq!(reversal.transaction.status, TransactionStatus::Reversed);
    assert_eq!(reversal.transaction.amount, Brl::from(0));
    assert!(reversal.transaction.description.starts_with("[REEMBOLSADO] "));

    let err = ctx.refunds().refund_deposit(deposit.id).await.unwrap_err();
    assert!(matches!(err, SettlementError::InvalidState(_)));
    ctx.tear_down().await;
}

#[tokio::test]
async fn reversing_a_partly_spent_deposit_never_goes_negative() {
    let ctx = TestContext::new().await;
    let bruno = ctx.fixture.bruno.id;
    let deposit = ctx.wallet().adjust_balance(bruno, Brl::from(1000), "Depósito").await.unwrap();
    ctx.orders().settle_wallet(ctx.cart_for(bruno, &[(ctx.fixture.soda.id, 1)])).await.unwrap();

    let reversal = ctx.refunds().refund_deposit(deposit.id).await.unwrap();
    assert_eq!(reversal.debited, Brl::from(400));
    assert_eq!(reversal.new_balance, Brl::from(0));
    let row = ctx.db.fetch_transaction(deposit.id).await.unwrap().unwrap();
    assert_eq!(row.status, TransactionStatus::Reversed);
    ctx.tear_down().await;
}

#[tokio::test]
async fn only_deposits_can_be_reversed() {
    let ctx = TestContext::new().await;
    let settled = ctx.orders().settle_wallet(ctx.alice_buys(&[(ctx.fixture.water.id, 1)])).await.unwrap();
    let err = ctx.refunds().refund_deposit(settled.ledger_entry.id).await.unwrap_err();
    assert!(matches!(err, SettlementError::InvalidState(_)));
    let err = ctx.refunds().refund_deposit(4242).await.unwrap_err();
    assert!(matches!(err, SettlementError::TransactionNotFound(4242)));
    ctx.tear_down().await;
}
