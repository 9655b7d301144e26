use actix_web::{http::StatusCode, test::TestRequest};
use fridge_settlement_engine::db_types::Brl;
use fridge_settlement_engine::traits::InventoryManagement;
use serde_json::json;

use super::helpers::{bearer, token_for, TestBackend};
use crate::auth::Role;

#[actix_web::test]
async fn customers_cannot_use_admin_routes() {
    let backend = TestBackend::new().await;
    let token = token_for(backend.fixture.alice.id, &[Role::User]);
    let req = TestRequest::post()
        .uri(&format!("/api/admin/users/{}/balance", backend.fixture.alice.id))
        .insert_header(bearer(&token))
        .set_json(json!({ "amount": 100000, "reason": "Because I can" }));
    let (status, body) = backend.send(req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body["error"].as_str().unwrap().contains("Insufficient Permissions"));
    assert_eq!(backend.fixture.balance_of(&backend.db, backend.fixture.alice.id).await, Brl::from(2000));
}

#[actix_web::test]
async fn refund_an_order() {
    let backend = TestBackend::new().await;
    let f = &backend.fixture;
    let alice = token_for(f.alice.id, &[Role::User]);
    let req = TestRequest::post()
        .uri("/api/orders/wallet")
        .insert_header(bearer(&alice))
        .set_json(json!({ "location_id": f.location.id, "items": [{ "product_id": f.soda.id, "quantity": 2 }] }));
    let (_, body) = backend.send(req).await;
    let order_id = body["order"]["id"].as_i64().unwrap();
    assert_eq!(f.balance_of(&backend.db, f.alice.id).await, Brl::from(800));

    let admin = token_for(99, &[Role::Admin]);
    let refund_uri = format!("/api/admin/orders/{order_id}/refund");
    let (status, body) = backend.send(TestRequest::post().uri(&refund_uri).insert_header(bearer(&admin))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["order"]["status"], "refunded");
    assert_eq!(body["new_balance"], 2000);
    assert_eq!(f.stock_of(&backend.db, f.soda.id).await, 10);

    let (status, _) = backend.send(TestRequest::post().uri(&refund_uri).insert_header(bearer(&admin))).await;
    assert_eq!(status, StatusCode::CONFLICT, "Orders can only be refunded once");

    let (status, _) =
        backend.send(TestRequest::post().uri("/api/admin/orders/4040/refund").insert_header(bearer(&admin))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn reverse_a_deposit() {
    let backend = TestBackend::new().await;
    let f = &backend.fixture;
    let bruno = token_for(f.bruno.id, &[Role::User]);
    let req = TestRequest::post().uri("/api/wallet/deposit/card").insert_header(bearer(&bruno)).set_json(json!({
        "amount": 1000,
        "card": { "token": "tok_visa", "payment_method_id": "visa" }
    }));
    let (_, body) = backend.send(req).await;
    let tx_id = body["id"].as_i64().unwrap();

    // Bruno spends some of it before the chargeback arrives
    let req = TestRequest::post()
        .uri("/api/orders/wallet")
        .insert_header(bearer(&bruno))
        .set_json(json!({ "location_id": f.location.id, "items": [{ "product_id": f.soda.id, "quantity": 1 }] }));
    let (status, _) = backend.send(req).await;
    assert_eq!(status, StatusCode::OK);

    let admin = token_for(99, &[Role::Admin]);
    let uri = format!("/api/admin/transactions/{tx_id}/refund");
    let (status, body) = backend.send(TestRequest::post().uri(&uri).insert_header(bearer(&admin))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["original_amount"], 1000);
    assert_eq!(body["debited"], 400);
    assert_eq!(body["new_balance"], 0);
}

#[actix_web::test]
async fn adjust_a_balance() {
    let backend = TestBackend::new().await;
    let f = &backend.fixture;
    let admin = token_for(99, &[Role::Admin]);
    let uri = format!("/api/admin/users/{}/balance", f.bruno.id);
    let req = TestRequest::post()
        .uri(&uri)
        .insert_header(bearer(&admin))
        .set_json(json!({ "amount": 1500, "reason": "Compensation for a jammed door" }));
    let (status, _) = backend.send(req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(f.balance_of(&backend.db, f.bruno.id).await, Brl::from(1500));

    let req = TestRequest::post().uri(&uri).insert_header(bearer(&admin)).set_json(json!({ "amount": 100, "reason": "" }));
    let (status, body) = backend.send(req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["description"], "Crédito administrativo: Adicionado pelo administrador");

    let req = TestRequest::post().uri(&uri).insert_header(bearer(&admin)).set_json(json!({ "amount": -600 }));
    let (status, body) = backend.send(req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["description"], "Débito administrativo: Removido pelo administrador");
    assert_eq!(f.balance_of(&backend.db, f.bruno.id).await, Brl::from(1000));
}

#[actix_web::test]
async fn stocktake_and_inventory() {
    let backend = TestBackend::new().await;
    let f = &backend.fixture;
    let admin = token_for(99, &[Role::Admin]);
    let uri = format!("/api/admin/inventory/{}", f.location.id);
    let req = TestRequest::post().uri(&uri).insert_header(bearer(&admin)).set_json(json!({ "items": [
        { "product_id": f.water.id, "quantity": 24, "expiration_date": "2030-06-30" },
        { "product_id": f.soda.id, "quantity": 0 }
    ]}));
    let (status, _) = backend.send(req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(f.stock_of(&backend.db, f.water.id).await, 24);
    assert_eq!(f.stock_of(&backend.db, f.soda.id).await, 0);

    let (status, body) = backend.send(TestRequest::get().uri(&uri).insert_header(bearer(&admin))).await;
    assert_eq!(status, StatusCode::OK);
    let water = body.as_array().unwrap().iter().find(|e| e["product_id"] == f.water.id).unwrap();
    assert_eq!(water["expiration_date"], "2030-06-30");

    // One bad line rejects the whole stocktake
    let req = TestRequest::post().uri(&uri).insert_header(bearer(&admin)).set_json(json!({ "items": [
        { "product_id": f.water.id, "quantity": 5 },
        { "product_id": 4040, "quantity": 1 }
    ]}));
    let (status, _) = backend.send(req).await;
    assert!(status.is_client_error());
    assert_eq!(f.stock_of(&backend.db, f.water.id).await, 24);

    let req = TestRequest::post().uri(&uri).insert_header(bearer(&admin)).set_json(json!({ "items": [] }));
    let (status, _) = backend.send(req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn remote_unlock() {
    let backend = TestBackend::new().await;
    let admin = token_for(99, &[Role::Admin]);
    let (status, body) =
        backend.send(TestRequest::post().uri("/api/admin/fridges/FRIDGE-001/unlock").insert_header(bearer(&admin))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["fridge_id"], "FRIDGE-001");
    let commands = backend.db.fetch_unlock_commands("FRIDGE-001").await.unwrap();
    assert_eq!(commands.len(), 1);
}

#[actix_web::test]
async fn promotions_change_the_price_charged() {
    let backend = TestBackend::new().await;
    let f = &backend.fixture;
    let admin = token_for(99, &[Role::Admin]);
    let uri = format!("/api/admin/products/{}/promotion", f.soda.id);
    let req = TestRequest::post().uri(&uri).insert_header(bearer(&admin)).set_json(json!({
        "promotional_price": 450,
        "start": "2020-01-01T00:00:00Z",
        "end": "2099-01-01T00:00:00Z"
    }));
    let (status, body) = backend.send(req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["promotional_price"], 450);

    let alice = token_for(f.alice.id, &[Role::User]);
    let req = TestRequest::post()
        .uri("/api/orders/wallet")
        .insert_header(bearer(&alice))
        .set_json(json!({ "location_id": f.location.id, "items": [{ "product_id": f.soda.id, "quantity": 1 }] }));
    let (_, body) = backend.send(req).await;
    assert_eq!(body["order"]["total_amount"], 450);

    let (status, body) = backend.send(TestRequest::post().uri(&uri).insert_header(bearer(&admin)).set_json(json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["promotional_price"].is_null());
}

#[actix_web::test]
async fn restock_prices() {
    let backend = TestBackend::new().await;
    let f = &backend.fixture;
    let admin = token_for(99, &[Role::Admin]);
    let uri = format!("/api/admin/products/{}/restock", f.water.id);
    let req = TestRequest::post().uri(&uri).insert_header(bearer(&admin)).set_json(json!({ "purchase_price": 140 }));
    let (status, body) = backend.send(req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["purchase_price"], 140);

    let req = TestRequest::post().uri(&uri).insert_header(bearer(&admin)).set_json(json!({ "purchase_price": -1 }));
    let (status, _) = backend.send(req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
