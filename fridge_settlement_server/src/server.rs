use std::time::Duration;

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use fridge_settlement_engine::{
    events::{EventHandlers, EventProducers},
    traits::{InventoryManagement, PaymentGateway, SettlementDatabase, WalletManagement},
    InventoryApi,
    OrderFlowApi,
    RefundApi,
    SqliteDatabase,
    WalletApi,
    WebhookApi,
};
use log::*;

use crate::{
    auth::TokenValidator,
    config::ServerConfig,
    errors::ServerError,
    expiry_worker::start_expiry_worker,
    integrations::mercado_pago::MercadoPagoGateway,
    middleware::{HmacMiddlewareFactory, JwtMiddlewareFactory},
    notifier::ticket_hooks,
    routes::{
        health,
        AdjustBalanceRoute,
        BalanceRoute,
        CardDepositRoute,
        CreatePixOrderRoute,
        DepositStatusRoute,
        DoorOpenedRoute,
        InventoryRoute,
        InvoicePaymentRoute,
        OrderStatusRoute,
        PaymentWebhookRoute,
        PixDepositRoute,
        RefundDepositRoute,
        RefundOrderRoute,
        RegisterRestockRoute,
        RemoteUnlockRoute,
        SetPromotionRoute,
        SettleCardOrderRoute,
        SettleCreditOrderRoute,
        SettleWalletOrderRoute,
        StocktakeRoute,
        TransactionDetailsRoute,
        TransferRoute,
        UnlockStatusRoute,
        VerifyRecipientRoute,
        WalletTransactionsRoute,
    },
};

const DB_MAX_CONNECTIONS: u32 = 25;
const EVENT_BUFFER_SIZE: usize = 64;
pub const SIGNATURE_HEADER: &str = "X-Signature";

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, DB_MAX_CONNECTIONS)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.run_migrations().await.map_err(|e| ServerError::InitializeError(e.to_string()))?;
    info!("🗃️ Database at {} is ready", config.database_url);
    let gateway = MercadoPagoGateway::new(config.gateway.clone())?;
    let handlers = EventHandlers::new(EVENT_BUFFER_SIZE, ticket_hooks(db.clone()));
    let producers = handlers.producers();
    handlers.start_handlers();
    // The worker lives for as long as the process does.
    let _worker = start_expiry_worker(
        db.clone(),
        gateway.clone(),
        producers.clone(),
        config.pending_order_timeout,
        config.expiry_check_interval,
    );
    let srv = create_server_instance(config, db, gateway, producers)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    gateway: MercadoPagoGateway,
    producers: EventProducers,
) -> Result<Server, ServerError> {
    let srv = HttpServer::new(move || {
        let orders_api = OrderFlowApi::new(db.clone(), gateway.clone(), producers.clone());
        let wallet_api = WalletApi::new(db.clone(), gateway.clone(), producers.clone());
        let webhook_api = WebhookApi::new(db.clone(), gateway.clone(), producers.clone());
        let refund_api = RefundApi::new(db.clone(), producers.clone());
        let inventory_api = InventoryApi::new(db.clone());
        let validator = TokenValidator::new(&config.auth.jwt_secret);
        let webhook = config.webhook.clone();
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("fss::access_log"))
            .app_data(json_config())
            .app_data(path_config())
            .app_data(query_config())
            .app_data(web::Data::new(orders_api))
            .app_data(web::Data::new(wallet_api))
            .app_data(web::Data::new(webhook_api))
            .app_data(web::Data::new(refund_api))
            .app_data(web::Data::new(inventory_api))
            .service(health)
            .service(
                web::scope("/api")
                    .wrap(JwtMiddlewareFactory::new(validator))
                    .configure(api_routes::<SqliteDatabase, MercadoPagoGateway>),
            )
            .service(
                web::scope("/webhook")
                    .wrap(HmacMiddlewareFactory::new(SIGNATURE_HEADER, webhook.hmac_secret, webhook.hmac_checks))
                    .service(PaymentWebhookRoute::<SqliteDatabase, MercadoPagoGateway>::new()),
            )
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}

/// Registers every authenticated route. Mount it inside a scope wrapped with [`JwtMiddlewareFactory`]; each route
/// checks the caller's roles itself.
pub fn api_routes<B, G>(cfg: &mut web::ServiceConfig)
where
    B: SettlementDatabase + WalletManagement + InventoryManagement + 'static,
    G: PaymentGateway + 'static,
{
    cfg.service(SettleWalletOrderRoute::<B, G>::new())
        .service(SettleCreditOrderRoute::<B, G>::new())
        .service(SettleCardOrderRoute::<B, G>::new())
        .service(CreatePixOrderRoute::<B, G>::new())
        .service(OrderStatusRoute::<B, G>::new())
        .service(UnlockStatusRoute::<B, G>::new())
        .service(DoorOpenedRoute::<B, G>::new())
        .service(BalanceRoute::<B, G>::new())
        .service(WalletTransactionsRoute::<B, G>::new())
        .service(TransactionDetailsRoute::<B, G>::new())
        .service(CardDepositRoute::<B, G>::new())
        .service(PixDepositRoute::<B, G>::new())
        .service(DepositStatusRoute::<B, G>::new())
        .service(VerifyRecipientRoute::<B, G>::new())
        .service(TransferRoute::<B, G>::new())
        .service(InvoicePaymentRoute::<B, G>::new())
        .service(RefundOrderRoute::<B>::new())
        .service(RefundDepositRoute::<B>::new())
        .service(AdjustBalanceRoute::<B, G>::new())
        .service(InventoryRoute::<B>::new())
        .service(StocktakeRoute::<B>::new())
        .service(RemoteUnlockRoute::<B>::new())
        .service(SetPromotionRoute::<B>::new())
        .service(RegisterRestockRoute::<B>::new());
}

/// Malformed JSON bodies are reported as `{"error": ...}` with a 400, like every other error.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _| ServerError::InvalidRequestBody(err.to_string()).into())
}

pub fn path_config() -> web::PathConfig {
    web::PathConfig::default().error_handler(|err, _| ServerError::InvalidRequestPath(err.to_string()).into())
}

pub fn query_config() -> web::QueryConfig {
    web::QueryConfig::default().error_handler(|err, _| ServerError::InvalidQuery(err.to_string()).into())
}
