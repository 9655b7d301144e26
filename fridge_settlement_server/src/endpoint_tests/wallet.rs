use actix_web::{http::StatusCode, test::TestRequest};
use fridge_settlement_engine::{db_types::Brl, test_utils::seed_invoice, traits::GatewayPaymentStatus};
use serde_json::json;

use super::helpers::{bearer, token_for, TestBackend};
use crate::auth::Role;

#[actix_web::test]
async fn balance_and_history() {
    let backend = TestBackend::new().await;
    let f = &backend.fixture;
    let token = token_for(f.alice.id, &[Role::User]);
    let (status, body) = backend.send(TestRequest::get().uri("/api/wallet/balance").insert_header(bearer(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "balance": 2000 }));

    let req = TestRequest::post()
        .uri("/api/orders/wallet")
        .insert_header(bearer(&token))
        .set_json(json!({ "location_id": f.location.id, "items": [{ "product_id": f.water.id, "quantity": 1 }] }));
    let (status, _) = backend.send(req).await;
    assert_eq!(status, StatusCode::OK);

    let req = TestRequest::get().uri("/api/wallet/transactions?page=1&limit=5").insert_header(bearer(&token));
    let (status, body) = backend.send(req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["page"], 1);
    assert_eq!(body["limit"], 5);
    let first = &body["transactions"][0];
    assert_eq!(first["type"], "purchase");
    assert_eq!(first["amount"], 350);

    let req = TestRequest::get().uri("/api/wallet/transactions?limit=1000").insert_header(bearer(&token));
    let (status, _) = backend.send(req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn card_deposits_credit_immediately() {
    let backend = TestBackend::new().await;
    let f = &backend.fixture;
    let token = token_for(f.bruno.id, &[Role::User]);
    let req = TestRequest::post().uri("/api/wallet/deposit/card").insert_header(bearer(&token)).set_json(json!({
        "amount": 5000,
        "card": { "token": "tok_master", "payment_method_id": "master", "installments": 1 }
    }));
    let (status, body) = backend.send(req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"], "credited");
    assert_eq!(body["amount"], 5000);
    assert_eq!(f.balance_of(&backend.db, f.bruno.id).await, Brl::from(5000));

    backend.gateway.set_card_status(GatewayPaymentStatus::Pending);
    let req = TestRequest::post().uri("/api/wallet/deposit/card").insert_header(bearer(&token)).set_json(json!({
        "amount": 1000,
        "card": { "token": "tok_master", "payment_method_id": "master" }
    }));
    let (status, body) = backend.send(req).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["result"], "pending");
    assert!(body["payment_id"].is_string());
    assert_eq!(f.balance_of(&backend.db, f.bruno.id).await, Brl::from(5000));

    let req = TestRequest::post().uri("/api/wallet/deposit/card").insert_header(bearer(&token)).set_json(json!({
        "amount": -10,
        "card": { "token": "tok_master", "payment_method_id": "master" }
    }));
    let (status, _) = backend.send(req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn pix_deposits_wait_for_the_gateway() {
    let backend = TestBackend::new().await;
    let f = &backend.fixture;
    let token = token_for(f.bruno.id, &[Role::User]);
    let req = TestRequest::post().uri("/api/wallet/deposit/pix").insert_header(bearer(&token)).set_json(json!({ "amount": 50 }));
    let (status, _) = backend.send(req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "Below the PIX minimum");

    let req =
        TestRequest::post().uri("/api/wallet/deposit/pix").insert_header(bearer(&token)).set_json(json!({ "amount": 2500 }));
    let (status, body) = backend.send(req).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["qr_code"].is_string());
    let payment_id = body["payment_id"].as_str().unwrap().to_string();
    assert_eq!(f.balance_of(&backend.db, f.bruno.id).await, Brl::from(0));

    let status_uri = format!("/api/wallet/deposit/{payment_id}/status");
    let (status, body) = backend.send(TestRequest::get().uri(&status_uri).insert_header(bearer(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "payment_id": payment_id, "status": "pending" }));

    backend.gateway.approve(&payment_id);
    let (_, body) = backend.send(TestRequest::get().uri(&status_uri).insert_header(bearer(&token))).await;
    assert_eq!(body["status"], "paid");

    // Another user's deposit is not visible
    let alice = token_for(f.alice.id, &[Role::User]);
    let (status, _) = backend.send(TestRequest::get().uri(&status_uri).insert_header(bearer(&alice))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn transfers() {
    let backend = TestBackend::new().await;
    let f = &backend.fixture;
    let token = token_for(f.alice.id, &[Role::User]);
    let req = TestRequest::post()
        .uri("/api/wallet/transfer")
        .insert_header(bearer(&token))
        .set_json(json!({ "recipient_email": "bruno@example.com", "amount": 500 }));
    let (status, body) = backend.send(req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["new_balance"], 1500);
    assert!(body["transaction_id"].is_i64());
    assert_eq!(f.balance_of(&backend.db, f.bruno.id).await, Brl::from(500));

    let req = TestRequest::post()
        .uri("/api/wallet/transfer")
        .insert_header(bearer(&token))
        .set_json(json!({ "recipient_email": "nobody@example.com", "amount": 100 }));
    let (status, _) = backend.send(req).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let req = TestRequest::post()
        .uri("/api/wallet/transfer")
        .insert_header(bearer(&token))
        .set_json(json!({ "recipient_email": "bruno@example.com", "amount": 1_000_000 }));
    let (status, _) = backend.send(req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(f.balance_of(&backend.db, f.alice.id).await, Brl::from(1500));
}

#[actix_web::test]
async fn invoice_payments() {
    let backend = TestBackend::new().await;
    let f = &backend.fixture;
    let token = token_for(f.alice.id, &[Role::User]);
    let (status, _) =
        backend.send(TestRequest::post().uri("/api/credit/invoice_payment").insert_header(bearer(&token))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "Nothing to pay yet");

    seed_invoice(&backend.db, f.alice.id, 1200).await;
    seed_invoice(&backend.db, f.alice.id, 800).await;
    let (status, body) =
        backend.send(TestRequest::post().uri("/api/credit/invoice_payment").insert_header(bearer(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["amount"], 2000);
    assert!(body["qr_code"].is_string());
}

#[actix_web::test]
async fn verify_a_recipient() {
    let backend = TestBackend::new().await;
    let token = token_for(backend.fixture.alice.id, &[Role::User]);
    let verify = |email: &str| {
        TestRequest::post()
            .uri("/api/wallet/verify_recipient")
            .insert_header(bearer(&token))
            .set_json(json!({ "recipient_email": email }))
    };
    let (status, body) = backend.send(verify("bruno@example.com")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Bruno Lima");
    assert_eq!(body["email"], "bruno@example.com");

    let (status, _) = backend.send(verify("nobody@example.com")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = backend.send(verify("alice@example.com")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn transaction_receipts_are_private() {
    let backend = TestBackend::new().await;
    let f = &backend.fixture;
    let alice = token_for(f.alice.id, &[Role::User]);
    let req = TestRequest::post().uri("/api/orders/wallet").insert_header(bearer(&alice)).set_json(json!({
        "location_id": f.location.id,
        "items": [{ "product_id": f.water.id, "quantity": 2 }]
    }));
    let (status, _) = backend.send(req).await;
    assert_eq!(status, StatusCode::OK);
    let req = TestRequest::get().uri("/api/wallet/transactions").insert_header(bearer(&alice));
    let (_, body) = backend.send(req).await;
    let tx_id = body["transactions"][0]["id"].as_i64().unwrap();

    let uri = format!("/api/wallet/transactions/{tx_id}");
    let (status, body) = backend.send(TestRequest::get().uri(&uri).insert_header(bearer(&alice))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], tx_id);
    assert_eq!(body["type"], "purchase");
    assert_eq!(body["items"][0]["product_name"], "Water");
    assert_eq!(body["items"][0]["quantity"], 2);
    assert!(body.get("counterparty").is_none());

    let bruno = token_for(f.bruno.id, &[Role::User]);
    let (status, _) = backend.send(TestRequest::get().uri(&uri).insert_header(bearer(&bruno))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let req = TestRequest::post()
        .uri("/api/wallet/transfer")
        .insert_header(bearer(&alice))
        .set_json(json!({ "recipient_email": "bruno@example.com", "amount": 200 }));
    let (_, body) = backend.send(req).await;
    let uri = format!("/api/wallet/transactions/{}", body["transaction_id"]);
    let (status, body) = backend.send(TestRequest::get().uri(&uri).insert_header(bearer(&alice))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["counterparty"]["name"], "Bruno Lima");
}
