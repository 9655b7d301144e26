use actix_web::{http::StatusCode, test::TestRequest, web};
use fridge_settlement_engine::{
    db_types::Brl,
    events::EventProducers,
    traits::{GatewayError, GatewayPaymentStatus},
    OrderFlowApi,
    SqliteDatabase,
};
use serde_json::json;

use super::{
    helpers::{bearer, send_to_api, token_for, TestBackend},
    mocks::MockGateway,
};
use crate::{auth::Role, routes::SettleCardOrderRoute};

fn cart(location_id: i64, product_id: i64, quantity: i64) -> serde_json::Value {
    json!({ "location_id": location_id, "items": [{ "product_id": product_id, "quantity": quantity }] })
}

fn card_cart(location_id: i64, product_id: i64, quantity: i64) -> serde_json::Value {
    let mut body = cart(location_id, product_id, quantity);
    body["card"] = json!({ "token": "tok_visa_4242", "payment_method_id": "visa" });
    body
}

#[actix_web::test]
async fn orders_require_a_token() {
    let backend = TestBackend::new().await;
    let f = &backend.fixture;
    let req = TestRequest::post().uri("/api/orders/wallet").set_json(cart(f.location.id, f.water.id, 1));
    let (status, body) = backend.send(req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Authentication Error. No access token was provided.");
}

#[actix_web::test]
async fn forged_tokens_are_rejected() {
    let backend = TestBackend::new().await;
    let f = &backend.fixture;
    let mut token = token_for(f.alice.id, &[Role::User]);
    token.replace_range(token.len() - 10..token.len() - 5, "AAAAA");
    let req = TestRequest::post()
        .uri("/api/orders/wallet")
        .insert_header(bearer(&token))
        .set_json(cart(f.location.id, f.water.id, 1));
    let (status, _) = backend.send(req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn wallet_order_debits_the_wallet_and_unlocks_the_fridge() {
    let backend = TestBackend::new().await;
    let f = &backend.fixture;
    let token = token_for(f.alice.id, &[Role::User]);
    let req = TestRequest::post()
        .uri("/api/orders/wallet")
        .insert_header(bearer(&token))
        .set_json(cart(f.location.id, f.water.id, 2));
    let (status, body) = backend.send(req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["order"]["status"], "paid");
    assert_eq!(body["order"]["total_amount"], 700);
    assert_eq!(body["unlock"]["fridge_id"], "FRIDGE-001");
    assert_eq!(f.balance_of(&backend.db, f.alice.id).await, Brl::from(1300));
    assert_eq!(f.stock_of(&backend.db, f.water.id).await, 8);
}

#[actix_web::test]
async fn short_wallets_are_rejected() {
    let backend = TestBackend::new().await;
    let f = &backend.fixture;
    let token = token_for(f.bruno.id, &[Role::User]);
    let req = TestRequest::post()
        .uri("/api/orders/wallet")
        .insert_header(bearer(&token))
        .set_json(cart(f.location.id, f.soda.id, 1));
    let (status, body) = backend.send(req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
    assert_eq!(f.stock_of(&backend.db, f.soda.id).await, 10);
}

#[actix_web::test]
async fn only_customers_can_buy() {
    let backend = TestBackend::new().await;
    let f = &backend.fixture;
    let token = token_for(f.alice.id, &[Role::Admin]);
    let req = TestRequest::post()
        .uri("/api/orders/wallet")
        .insert_header(bearer(&token))
        .set_json(cart(f.location.id, f.water.id, 1));
    let (status, _) = backend.send(req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn overselling_is_rejected() {
    let backend = TestBackend::new().await;
    let f = &backend.fixture;
    let token = token_for(f.alice.id, &[Role::User]);
    let req = TestRequest::post()
        .uri("/api/orders/credit")
        .insert_header(bearer(&token))
        .set_json(cart(f.location.id, f.water.id, 11));
    let (status, _) = backend.send(req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(f.stock_of(&backend.db, f.water.id).await, 10);
}

#[actix_web::test]
async fn malformed_carts_are_bad_requests() {
    let backend = TestBackend::new().await;
    let token = token_for(backend.fixture.alice.id, &[Role::User]);
    let req = TestRequest::post()
        .uri("/api/orders/wallet")
        .insert_header(bearer(&token))
        .set_json(json!({ "items": "two waters please" }));
    let (status, body) = backend.send(req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().starts_with("Could not read request body"));
}

#[actix_web::test]
async fn absurd_quantities_are_bad_requests() {
    let backend = TestBackend::new().await;
    let f = &backend.fixture;
    let token = token_for(f.alice.id, &[Role::User]);
    for uri in ["/api/orders/wallet", "/api/orders/credit", "/api/orders/pix"] {
        let req = TestRequest::post()
            .uri(uri)
            .insert_header(bearer(&token))
            .set_json(cart(f.location.id, f.water.id, i64::MAX / 2));
        let (status, _) = backend.send(req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
    }
    assert_eq!(f.stock_of(&backend.db, f.water.id).await, 10);
    assert_eq!(f.balance_of(&backend.db, f.alice.id).await, Brl::from(2000));
}

#[actix_web::test]
async fn credit_orders_leave_the_wallet_alone() {
    let backend = TestBackend::new().await;
    let f = &backend.fixture;
    let token = token_for(f.alice.id, &[Role::User]);
    let req = TestRequest::post()
        .uri("/api/orders/credit")
        .insert_header(bearer(&token))
        .set_json(cart(f.location.id, f.soda.id, 1));
    let (status, body) = backend.send(req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["order"]["payment_method"], "credit");
    assert_eq!(f.balance_of(&backend.db, f.alice.id).await, Brl::from(2000));
}

#[actix_web::test]
async fn card_orders() {
    let backend = TestBackend::new().await;
    let f = &backend.fixture;
    let token = token_for(f.bruno.id, &[Role::User]);
    let req = TestRequest::post()
        .uri("/api/orders/card")
        .insert_header(bearer(&token))
        .set_json(card_cart(f.location.id, f.soda.id, 1));
    let (status, body) = backend.send(req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"], "paid");
    assert_eq!(body["order"]["status"], "paid");
    assert_eq!(backend.gateway.requests().len(), 1);

    backend.gateway.set_card_status(GatewayPaymentStatus::Declined);
    let req = TestRequest::post()
        .uri("/api/orders/card")
        .insert_header(bearer(&token))
        .set_json(card_cart(f.location.id, f.soda.id, 1));
    let (status, _) = backend.send(req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(f.stock_of(&backend.db, f.soda.id).await, 9);

    backend.gateway.set_card_status(GatewayPaymentStatus::Pending);
    let req = TestRequest::post()
        .uri("/api/orders/card")
        .insert_header(bearer(&token))
        .set_json(card_cart(f.location.id, f.soda.id, 1));
    let (status, body) = backend.send(req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"], "pending");
    assert_eq!(body["order"]["status"], "pending");
}

#[actix_web::test]
async fn gateway_outages_are_bad_gateway() {
    let backend = TestBackend::new().await;
    let f = &backend.fixture;
    let mut gateway = MockGateway::new();
    gateway.expect_create_payment().times(1).returning(|_| Err(GatewayError::Timeout));
    let db = backend.db.clone();
    let configure = move |cfg: &mut web::ServiceConfig| {
        let api = OrderFlowApi::new(db, gateway, EventProducers::default());
        cfg.app_data(web::Data::new(api)).service(SettleCardOrderRoute::<SqliteDatabase, MockGateway>::new());
    };
    let token = token_for(f.bruno.id, &[Role::User]);
    let req = TestRequest::post()
        .uri("/api/orders/card")
        .insert_header(bearer(&token))
        .set_json(card_cart(f.location.id, f.water.id, 1));
    let (status, body) = send_to_api(req, configure).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body["error"].as_str().unwrap().contains("did not answer in time"));
    assert_eq!(f.stock_of(&backend.db, f.water.id).await, 10);
}

#[actix_web::test]
async fn pix_orders_return_a_qr_code() {
    let backend = TestBackend::new().await;
    let f = &backend.fixture;
    let token = token_for(f.bruno.id, &[Role::User]);
    let req =
        TestRequest::post().uri("/api/orders/pix").insert_header(bearer(&token)).set_json(cart(f.location.id, f.water.id, 1));
    let (status, body) = backend.send(req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"], "pending");
    assert_eq!(body["charge"]["amount"], 350);
    assert!(body["charge"]["qr_code"].as_str().unwrap().starts_with("00020126"));

    let order_id = body["order"]["id"].as_i64().unwrap();
    let req = TestRequest::get().uri(&format!("/api/orders/{order_id}/status")).insert_header(bearer(&token));
    let (status, body) = backend.send(req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "pending");
}

#[actix_web::test]
async fn other_users_orders_are_not_found() {
    let backend = TestBackend::new().await;
    let f = &backend.fixture;
    let alice = token_for(f.alice.id, &[Role::User]);
    let req =
        TestRequest::post().uri("/api/orders/wallet").insert_header(bearer(&alice)).set_json(cart(f.location.id, f.water.id, 1));
    let (_, body) = backend.send(req).await;
    let order_id = body["order"]["id"].as_i64().unwrap();

    let bruno = token_for(f.bruno.id, &[Role::User]);
    let req = TestRequest::get().uri(&format!("/api/orders/{order_id}/status")).insert_header(bearer(&bruno));
    let (status, _) = backend.send(req).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let req = TestRequest::get().uri("/api/orders/not-a-number/status").insert_header(bearer(&alice));
    let (status, _) = backend.send(req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn fridges_report_door_openings() {
    let backend = TestBackend::new().await;
    let f = &backend.fixture;
    let alice = token_for(f.alice.id, &[Role::User]);
    let req =
        TestRequest::post().uri("/api/orders/wallet").insert_header(bearer(&alice)).set_json(cart(f.location.id, f.water.id, 1));
    let (_, body) = backend.send(req).await;
    let order_id = body["order"]["id"].as_i64().unwrap();
    let status_uri = format!("/api/orders/{order_id}/unlock_status");

    let (_, body) = backend.send(TestRequest::get().uri(&status_uri).insert_header(bearer(&alice))).await;
    assert_eq!(body, json!({ "order_id": order_id, "door_opened": false }));

    // Customers cannot claim the door was opened
    let req = TestRequest::post()
        .uri("/api/fridge/door_opened")
        .insert_header(bearer(&alice))
        .set_json(json!({ "order_id": order_id }));
    let (status, _) = backend.send(req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let fridge = token_for(0, &[Role::Fridge]);
    let req = TestRequest::post()
        .uri("/api/fridge/door_opened")
        .insert_header(bearer(&fridge))
        .set_json(json!({ "order_id": order_id }));
    let (status, body) = backend.send(req).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["door_opened_at"].is_string());

    let (_, body) = backend.send(TestRequest::get().uri(&status_uri).insert_header(bearer(&alice))).await;
    assert_eq!(body["door_opened"], true);
}
