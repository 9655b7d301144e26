use actix_web::{
    body::MessageBody,
    dev::ServiceResponse,
    http::{header::AUTHORIZATION, StatusCode},
    test,
    test::TestRequest,
    web,
    web::ServiceConfig,
    App,
};
use chrono::{Duration, Utc};
use fridge_common::Secret;
use fridge_settlement_engine::{
    events::EventProducers,
    test_utils::{prepare_test_env, random_db_path, FakeGateway, Fixture},
    InventoryApi,
    OrderFlowApi,
    RefundApi,
    SqliteDatabase,
    WalletApi,
    WebhookApi,
};
use log::debug;
use serde_json::Value;

use crate::{
    auth::{issue_token, JwtClaims, Role, TokenValidator},
    middleware::{HmacMiddlewareFactory, JwtMiddlewareFactory},
    routes::PaymentWebhookRoute,
    server::{api_routes, json_config, path_config, query_config, SIGNATURE_HEADER},
};

// DO NOT re-use this secret anywhere.
pub const TEST_JWT_SECRET: &str = "endpoint-tests-only-0f3b9c1e5a7d2468ace13579bdf02468";

pub fn jwt_secret() -> Secret<String> {
    Secret::new(TEST_JWT_SECRET.to_string())
}

pub fn token_for(user_id: i64, roles: &[Role]) -> String {
    let claims = JwtClaims::new(user_id, roles.to_vec(), Utc::now() + Duration::days(1));
    issue_token(&claims, &jwt_secret()).unwrap()
}

pub fn bearer(token: &str) -> (actix_web::http::header::HeaderName, String) {
    (AUTHORIZATION, format!("Bearer {token}"))
}

/// A fresh database with the standard fixture, and a gateway whose state the test can inspect.
pub struct TestBackend {
    pub db: SqliteDatabase,
    pub fixture: Fixture,
    pub gateway: FakeGateway,
}

impl TestBackend {
    pub async fn new() -> Self {
        let db = prepare_test_env(&random_db_path()).await;
        let fixture = Fixture::new(&db).await;
        Self { db, fixture, gateway: FakeGateway::new() }
    }

    /// Registers every API, backed by this database and gateway, plus all the `/api` routes.
    pub fn configure(&self) -> impl FnOnce(&mut ServiceConfig) {
        let db = self.db.clone();
        let gateway = self.gateway.clone();
        move |cfg| {
            let producers = EventProducers::default();
            cfg.app_data(web::Data::new(OrderFlowApi::new(db.clone(), gateway.clone(), producers.clone())))
                .app_data(web::Data::new(WalletApi::new(db.clone(), gateway.clone(), producers.clone())))
                .app_data(web::Data::new(WebhookApi::new(db.clone(), gateway.clone(), producers.clone())))
                .app_data(web::Data::new(RefundApi::new(db.clone(), producers)))
                .app_data(web::Data::new(InventoryApi::new(db)));
            api_routes::<SqliteDatabase, FakeGateway>(cfg);
        }
    }

    pub async fn send(&self, req: TestRequest) -> (StatusCode, Value) {
        send_to_api(req, self.configure()).await
    }

    /// Sends `req` to the payment webhook. Signatures are checked when `hmac_secret` is given.
    pub async fn send_webhook(&self, req: TestRequest, hmac_secret: Option<&str>) -> (StatusCode, Value) {
        let api = WebhookApi::new(self.db.clone(), self.gateway.clone(), EventProducers::default());
        let hmac = HmacMiddlewareFactory::new(
            SIGNATURE_HEADER,
            Secret::new(hmac_secret.unwrap_or_default().to_string()),
            hmac_secret.is_some(),
        );
        let app = App::new()
            .app_data(web::Data::new(api))
            .service(web::scope("/webhook").wrap(hmac).service(PaymentWebhookRoute::<SqliteDatabase, FakeGateway>::new()));
        let service = test::init_service(app).await;
        into_parts(test::try_call_service(&service, req.to_request()).await).await
    }
}

/// Sends `req` to an app with the `/api` scope (and its bearer token check) configured by `configure`.
pub async fn send_to_api<F>(req: TestRequest, configure: F) -> (StatusCode, Value)
where F: FnOnce(&mut ServiceConfig) {
    let app = App::new()
        .app_data(json_config())
        .app_data(path_config())
        .app_data(query_config())
        .service(
            web::scope("/api").wrap(JwtMiddlewareFactory::new(TokenValidator::new(&jwt_secret()))).configure(configure),
        );
    let service = test::init_service(app).await;
    into_parts(test::try_call_service(&service, req.to_request()).await).await
}

async fn into_parts<B>(result: Result<ServiceResponse<B>, actix_web::Error>) -> (StatusCode, Value)
where B: MessageBody + 'static {
    let res = match result {
        Ok(res) => res.into_parts().1.map_into_boxed_body(),
        Err(e) => e.error_response(),
    };
    let status = res.status();
    let body = res.into_body().try_into_bytes().unwrap_or_default();
    debug!("🚀️ {status} {}", String::from_utf8_lossy(&body));
    (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
}
