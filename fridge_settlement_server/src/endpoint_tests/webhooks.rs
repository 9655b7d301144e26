use actix_web::{http::StatusCode, test::TestRequest};
use fridge_settlement_engine::{db_types::Brl, traits::GatewayPaymentStatus};
use serde_json::json;

use super::helpers::{bearer, token_for, TestBackend};
use crate::{auth::Role, helpers::calculate_hmac, server::SIGNATURE_HEADER};

fn notification(payment_id: &str) -> serde_json::Value {
    json!({ "action": "payment.updated", "type": "payment", "data": { "id": payment_id } })
}

#[actix_web::test]
async fn confirmed_pix_orders_are_paid_once() {
    let backend = TestBackend::new().await;
    let f = &backend.fixture;
    let token = token_for(f.bruno.id, &[Role::User]);
    let req = TestRequest::post()
        .uri("/api/orders/pix")
        .insert_header(bearer(&token))
        .set_json(json!({ "location_id": f.location.id, "items": [{ "product_id": f.water.id, "quantity": 3 }] }));
    let (_, body) = backend.send(req).await;
    let order_id = body["order"]["id"].as_i64().unwrap();
    let payment_id = body["charge"]["payment_id"].as_str().unwrap().to_string();

    // Not paid yet: nothing happens
    let req = TestRequest::post().uri("/webhook/payments").set_json(notification(&payment_id));
    let (status, _) = backend.send_webhook(req, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(f.stock_of(&backend.db, f.water.id).await, 10);

    backend.gateway.approve(&payment_id);
    for _ in 0..2 {
        let req = TestRequest::post().uri("/webhook/payments").set_json(notification(&payment_id));
        let (status, body) = backend.send_webhook(req, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
    }
    assert_eq!(f.stock_of(&backend.db, f.water.id).await, 7);

    let req = TestRequest::get().uri(&format!("/api/orders/{order_id}/status")).insert_header(bearer(&token));
    let (_, body) = backend.send(req).await;
    assert_eq!(body["status"], "paid");
    assert_eq!(body["payment_gateway_id"], payment_id.as_str());
}

#[actix_web::test]
async fn query_string_notifications_credit_deposits() {
    let backend = TestBackend::new().await;
    let f = &backend.fixture;
    let token = token_for(f.bruno.id, &[Role::User]);
    let req =
        TestRequest::post().uri("/api/wallet/deposit/pix").insert_header(bearer(&token)).set_json(json!({ "amount": 3000 }));
    let (_, body) = backend.send(req).await;
    let payment_id = body["payment_id"].as_str().unwrap().to_string();
    backend.gateway.approve(&payment_id);

    let req = TestRequest::post().uri(&format!("/webhook/payments?topic=payment&id={payment_id}"));
    let (status, _) = backend.send_webhook(req, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(f.balance_of(&backend.db, f.bruno.id).await, Brl::from(3000));
}

#[actix_web::test]
async fn failures_are_still_acknowledged() {
    let backend = TestBackend::new().await;
    let f = &backend.fixture;
    // The gateway has never heard of this payment
    let req = TestRequest::post().uri("/webhook/payments").set_json(notification("mp-404"));
    let (status, _) = backend.send_webhook(req, None).await;
    assert_eq!(status, StatusCode::OK);

    // Not a payment notification
    let req = TestRequest::post()
        .uri("/webhook/payments")
        .set_json(json!({ "type": "merchant_order", "data": { "id": "123" } }));
    let (status, _) = backend.send_webhook(req, None).await;
    assert_eq!(status, StatusCode::OK);

    // A rejected deposit payment is ignored
    let reference = format!("wallet_deposit_{}_1718000000000", f.bruno.id);
    backend.gateway.insert_payment("mp-77", GatewayPaymentStatus::Declined, Brl::from(5000), &reference);
    let req = TestRequest::post().uri("/webhook/payments").set_json(notification("mp-77"));
    let (status, _) = backend.send_webhook(req, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(f.balance_of(&backend.db, f.bruno.id).await, Brl::from(0));

    // Garbage
    let req = TestRequest::post().uri("/webhook/payments").set_payload("not json at all");
    let (status, _) = backend.send_webhook(req, None).await;
    assert_eq!(status, StatusCode::OK);
}

#[actix_web::test]
async fn signatures_are_checked_when_enabled() {
    const SECRET: &str = "webhook-secret";
    let backend = TestBackend::new().await;
    let f = &backend.fixture;
    let reference = format!("wallet_deposit_{}_1718000000000", f.alice.id);
    backend.gateway.insert_payment("mp-88", GatewayPaymentStatus::Approved, Brl::from(1000), &reference);
    let body = notification("mp-88").to_string();

    let req = TestRequest::post().uri("/webhook/payments").set_payload(body.clone());
    let (status, _) = backend.send_webhook(req, Some(SECRET)).await;
    assert_eq!(status, StatusCode::FORBIDDEN, "Unsigned");

    let req = TestRequest::post()
        .uri("/webhook/payments")
        .insert_header((SIGNATURE_HEADER, calculate_hmac("another-secret", body.as_bytes())))
        .set_payload(body.clone());
    let (status, _) = backend.send_webhook(req, Some(SECRET)).await;
    assert_eq!(status, StatusCode::FORBIDDEN, "Wrong key");
    assert_eq!(f.balance_of(&backend.db, f.alice.id).await, Brl::from(2000));

    let req = TestRequest::post()
        .uri("/webhook/payments")
        .insert_header((SIGNATURE_HEADER, calculate_hmac(SECRET, body.as_bytes())))
        .set_payload(body);
    let (status, _) = backend.send_webhook(req, Some(SECRET)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(f.balance_of(&backend.db, f.alice.id).await, Brl::from(3000));
}
