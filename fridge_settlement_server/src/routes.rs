//! Request handler definitions
//!
//! Define each route and its handler here. Handlers should stay thin: extract the caller and the request, call one
//! settlement API method, and turn the result into JSON. Errors are converted into [`ServerError`]s, which render as
//! `{"error": "..."}` with the right status code.
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will cause the
//! current worker to stop processing new requests. Every database and gateway call in the settlement APIs is async, so
//! keep it that way: never call blocking code from a handler.
use std::collections::HashMap;

use actix_web::{get, web, HttpRequest, HttpResponse, Responder};
use fridge_settlement_engine::{
    traits::{InventoryManagement, Pagination, PaymentGateway, SettlementDatabase, WalletManagement},
    CardDeposit,
    InventoryApi,
    OrderFlowApi,
    PaymentNotification,
    ReconcileOutcome,
    RefundApi,
    WalletApi,
    WebhookApi,
};
use log::*;
use serde_json::{json, Value};

use crate::{
    auth::{JwtClaims, Role},
    data_objects::{
        BalanceAdjustment,
        BalanceResponse,
        CardDepositRequest,
        CardOrderRequest,
        CartRequest,
        DoorOpenedReport,
        JsonResponse,
        PaginationQuery,
        PixDepositRequest,
        PromotionRequest,
        RestockRequest,
        StocktakeRequest,
        TransferRequest,
        TransferResponse,
        UnlockStatusResponse,
        VerifyRecipientRequest,
    },
    errors::ServerError,
};

/// Backends that can reconcile payment notifications: they settle orders and hold wallets.
pub trait PaymentsBackend: SettlementDatabase + WalletManagement {}

impl<T> PaymentsBackend for T where T: SettlementDatabase + WalletManagement {}

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro.
// Each bound becomes one generic parameter on the route struct, in the order given, and the handler is instantiated
// with them in the same order.
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ident),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };

    ($name:ident => $method:ident $path:literal impl $($bounds:ident),+ where requires [$($roles:expr),+]) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>)
                    .wrap($crate::middleware::AclMiddlewareFactory::new(&[$($roles),+]));
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Orders  ----------------------------------------------------
route!(settle_wallet_order => Post "/orders/wallet" impl SettlementDatabase, PaymentGateway where requires [Role::User]);
/// Pays for the cart from the caller's wallet. On success the fridge door unlock has been queued.
pub async fn settle_wallet_order<B: SettlementDatabase, G: PaymentGateway>(
    claims: JwtClaims,
    body: web::Json<CartRequest>,
    api: web::Data<OrderFlowApi<B, G>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ POST wallet order for user #{}", claims.sub);
    let settled = api.settle_wallet(body.into_inner().into_order(claims.user_id())).await.map_err(|e| {
        debug!("💻️ Wallet order for user #{} failed. {e}", claims.sub);
        e
    })?;
    Ok(HttpResponse::Ok().json(settled))
}

route!(settle_credit_order => Post "/orders/credit" impl SettlementDatabase, PaymentGateway where requires [Role::User]);
/// Charges the cart to the caller's credit line, to be billed on the next invoice.
pub async fn settle_credit_order<B: SettlementDatabase, G: PaymentGateway>(
    claims: JwtClaims,
    body: web::Json<CartRequest>,
    api: web::Data<OrderFlowApi<B, G>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ POST credit order for user #{}", claims.sub);
    let settled = api.settle_credit(body.into_inner().into_order(claims.user_id())).await.map_err(|e| {
        debug!("💻️ Credit order for user #{} failed. {e}", claims.sub);
        e
    })?;
    Ok(HttpResponse::Ok().json(settled))
}

route!(settle_card_order => Post "/orders/card" impl SettlementDatabase, PaymentGateway where requires [Role::User]);
/// Charges a tokenised card for the cart.
///
/// The response is tagged with `"result": "paid"` or, when the gateway holds the payment for review,
/// `"result": "pending"`. Pending orders are completed by the payment webhook.
pub async fn settle_card_order<B: SettlementDatabase, G: PaymentGateway>(
    claims: JwtClaims,
    body: web::Json<CardOrderRequest>,
    api: web::Data<OrderFlowApi<B, G>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ POST card order for user #{}", claims.sub);
    let CardOrderRequest { cart, card } = body.into_inner();
    let outcome = api.settle_card(cart.into_order(claims.user_id()), card).await.map_err(|e| {
        debug!("💻️ Card order for user #{} failed. {e}", claims.sub);
        e
    })?;
    Ok(HttpResponse::Ok().json(outcome))
}

route!(create_pix_order => Post "/orders/pix" impl SettlementDatabase, PaymentGateway where requires [Role::User]);
/// Creates a pending order and returns the PIX QR code that pays for it.
pub async fn create_pix_order<B: SettlementDatabase, G: PaymentGateway>(
    claims: JwtClaims,
    body: web::Json<CartRequest>,
    api: web::Data<OrderFlowApi<B, G>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ POST pix order for user #{}", claims.sub);
    let outcome = api.settle_pix(body.into_inner().into_order(claims.user_id())).await.map_err(|e| {
        debug!("💻️ PIX order for user #{} failed. {e}", claims.sub);
        e
    })?;
    Ok(HttpResponse::Ok().json(outcome))
}

route!(order_status => Get "/orders/{order_id}/status" impl SettlementDatabase, PaymentGateway where requires [Role::User]);
/// Users can only see their own orders. Any other order id is reported as not found, whether it exists or not.
pub async fn order_status<B: SettlementDatabase, G: PaymentGateway>(
    claims: JwtClaims,
    path: web::Path<i64>,
    api: web::Data<OrderFlowApi<B, G>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    debug!("💻️ GET order_status({order_id}) for user #{}", claims.sub);
    let order = api.order_status(order_id, claims.user_id()).await?;
    Ok(HttpResponse::Ok().json(order))
}

route!(unlock_status => Get "/orders/{order_id}/unlock_status" impl SettlementDatabase, PaymentGateway where requires [Role::User]);
/// The customer app polls this after paying, to tell the user when the door has been opened.
pub async fn unlock_status<B: SettlementDatabase, G: PaymentGateway>(
    claims: JwtClaims,
    path: web::Path<i64>,
    api: web::Data<OrderFlowApi<B, G>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    trace!("💻️ GET unlock_status({order_id}) for user #{}", claims.sub);
    let door_opened = api.unlock_status(order_id, claims.user_id()).await?;
    Ok(HttpResponse::Ok().json(UnlockStatusResponse { order_id, door_opened }))
}

//----------------------------------------------   Fridge  ----------------------------------------------------
route!(door_opened => Post "/fridge/door_opened" impl SettlementDatabase, PaymentGateway where requires [Role::Fridge]);
pub async fn door_opened<B: SettlementDatabase, G: PaymentGateway>(
    body: web::Json<DoorOpenedReport>,
    api: web::Data<OrderFlowApi<B, G>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = body.order_id;
    debug!("💻️ POST door_opened for order #{order_id}");
    let order = api.confirm_door_opened(order_id).await.map_err(|e| {
        warn!("💻️ Could not record door opening for order #{order_id}. {e}");
        e
    })?;
    Ok(HttpResponse::Ok().json(order))
}

//----------------------------------------------   Wallet  ----------------------------------------------------
route!(balance => Get "/wallet/balance" impl WalletManagement, PaymentGateway where requires [Role::User]);
pub async fn balance<B: WalletManagement, G: PaymentGateway>(
    claims: JwtClaims,
    api: web::Data<WalletApi<B, G>>,
) -> Result<HttpResponse, ServerError> {
    trace!("💻️ GET balance for user #{}", claims.sub);
    let balance = api.balance(claims.user_id()).await?;
    Ok(HttpResponse::Ok().json(BalanceResponse { balance }))
}

route!(wallet_transactions => Get "/wallet/transactions" impl WalletManagement, PaymentGateway where requires [Role::User]);
/// The caller's wallet history, newest first. Supports `?page=` (from 1) and `?limit=` (1 to 100).
pub async fn wallet_transactions<B: WalletManagement, G: PaymentGateway>(
    claims: JwtClaims,
    query: web::Query<PaginationQuery>,
    api: web::Data<WalletApi<B, G>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ GET wallet transactions for user #{}", claims.sub);
    let page = Pagination::try_from(query.into_inner())?;
    let transactions = api.transactions(claims.user_id(), page).await?;
    Ok(HttpResponse::Ok().json(transactions))
}

route!(transaction_details => Get "/wallet/transactions/{transaction_id}" impl WalletManagement, PaymentGateway where requires [Role::User]);
/// A receipt for one of the caller's ledger rows, with the items bought or the other side of a transfer.
pub async fn transaction_details<B: WalletManagement, G: PaymentGateway>(
    claims: JwtClaims,
    path: web::Path<i64>,
    api: web::Data<WalletApi<B, G>>,
) -> Result<HttpResponse, ServerError> {
    let transaction_id = path.into_inner();
    debug!("💻️ GET transaction #{transaction_id} for user #{}", claims.sub);
    let details = api.transaction_details(claims.user_id(), transaction_id).await?;
    Ok(HttpResponse::Ok().json(details))
}

route!(card_deposit => Post "/wallet/deposit/card" impl WalletManagement, PaymentGateway where requires [Role::User]);
pub async fn card_deposit<B: WalletManagement, G: PaymentGateway>(
    claims: JwtClaims,
    body: web::Json<CardDepositRequest>,
    api: web::Data<WalletApi<B, G>>,
) -> Result<HttpResponse, ServerError> {
    let CardDepositRequest { amount, card } = body.into_inner();
    debug!("💻️ POST card deposit of {amount} for user #{}", claims.sub);
    let deposit = api.deposit_with_card(claims.user_id(), amount, card).await.map_err(|e| {
        debug!("💻️ Card deposit for user #{} failed. {e}", claims.sub);
        e
    })?;
    match deposit {
        CardDeposit::Credited(_) => Ok(HttpResponse::Ok().json(deposit)),
        CardDeposit::Pending { .. } => Ok(HttpResponse::Accepted().json(deposit)),
    }
}

route!(pix_deposit => Post "/wallet/deposit/pix" impl WalletManagement, PaymentGateway where requires [Role::User]);
/// Returns a PIX QR code. The wallet is credited when the payment webhook confirms the transfer.
pub async fn pix_deposit<B: WalletManagement, G: PaymentGateway>(
    claims: JwtClaims,
    body: web::Json<PixDepositRequest>,
    api: web::Data<WalletApi<B, G>>,
) -> Result<HttpResponse, ServerError> {
    let amount = body.amount;
    debug!("💻️ POST PIX deposit of {amount} for user #{}", claims.sub);
    let charge = api.create_pix_deposit(claims.user_id(), amount).await?;
    Ok(HttpResponse::Ok().json(charge))
}

route!(deposit_status => Get "/wallet/deposit/{payment_id}/status" impl WalletManagement, PaymentGateway where requires [Role::User]);
pub async fn deposit_status<B: WalletManagement, G: PaymentGateway>(
    claims: JwtClaims,
    path: web::Path<String>,
    api: web::Data<WalletApi<B, G>>,
) -> Result<HttpResponse, ServerError> {
    let payment_id = path.into_inner();
    trace!("💻️ GET deposit status of {payment_id} for user #{}", claims.sub);
    let status = api.deposit_status(claims.user_id(), &payment_id).await?;
    Ok(HttpResponse::Ok().json(json!({ "payment_id": payment_id, "status": status })))
}

route!(verify_recipient => Post "/wallet/verify_recipient" impl WalletManagement, PaymentGateway where requires [Role::User]);
pub async fn verify_recipient<B: WalletManagement, G: PaymentGateway>(
    claims: JwtClaims,
    body: web::Json<VerifyRecipientRequest>,
    api: web::Data<WalletApi<B, G>>,
) -> Result<HttpResponse, ServerError> {
    let recipient_email = body.into_inner().recipient_email;
    debug!("💻️ POST verify recipient {recipient_email} for user #{}", claims.sub);
    let recipient = api.verify_recipient(claims.user_id(), &recipient_email).await?;
    Ok(HttpResponse::Ok().json(recipient))
}

route!(transfer => Post "/wallet/transfer" impl WalletManagement, PaymentGateway where requires [Role::User]);
/// Sends money from the caller's wallet to another user, identified by email address.
pub async fn transfer<B: WalletManagement, G: PaymentGateway>(
    claims: JwtClaims,
    body: web::Json<TransferRequest>,
    api: web::Data<WalletApi<B, G>>,
) -> Result<HttpResponse, ServerError> {
    let TransferRequest { recipient_email, amount } = body.into_inner();
    debug!("💻️ POST transfer of {amount} from user #{} to {recipient_email}", claims.sub);
    let result = api.transfer(claims.user_id(), &recipient_email, amount).await.map_err(|e| {
        debug!("💻️ Transfer from user #{} failed. {e}", claims.sub);
        e
    })?;
    Ok(HttpResponse::Ok().json(TransferResponse {
        transaction_id: result.outgoing.id,
        new_balance: result.sender_balance,
    }))
}

//----------------------------------------------   Credit  ----------------------------------------------------
route!(invoice_payment => Post "/credit/invoice_payment" impl WalletManagement, PaymentGateway where requires [Role::User]);
/// A single PIX charge covering all of the caller's open and late invoices.
pub async fn invoice_payment<B: WalletManagement, G: PaymentGateway>(
    claims: JwtClaims,
    api: web::Data<WalletApi<B, G>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ POST invoice payment for user #{}", claims.sub);
    let charge = api.create_invoice_payment(claims.user_id()).await?;
    Ok(HttpResponse::Ok().json(charge))
}

//----------------------------------------------   Admin  ----------------------------------------------------
route!(refund_order => Post "/admin/orders/{order_id}/refund" impl SettlementDatabase where requires [Role::Admin]);
/// Restocks the items of a paid order and credits the total to the buyer's wallet.
pub async fn refund_order<B: SettlementDatabase>(
    path: web::Path<i64>,
    api: web::Data<RefundApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    info!("💻️ POST refund for order #{order_id}");
    let refund = api.refund_order(order_id).await.map_err(|e| {
        warn!("💻️ Could not refund order #{order_id}. {e}");
        e
    })?;
    Ok(HttpResponse::Ok().json(refund))
}

route!(refund_deposit => Post "/admin/transactions/{transaction_id}/refund" impl SettlementDatabase where requires [Role::Admin]);
/// Reverses a wallet deposit. The wallet is debited by no more than its current balance.
pub async fn refund_deposit<B: SettlementDatabase>(
    path: web::Path<i64>,
    api: web::Data<RefundApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let transaction_id = path.into_inner();
    info!("💻️ POST refund for deposit #{transaction_id}");
    let reversal = api.refund_deposit(transaction_id).await.map_err(|e| {
        warn!("💻️ Could not reverse deposit #{transaction_id}. {e}");
        e
    })?;
    Ok(HttpResponse::Ok().json(reversal))
}

route!(adjust_balance => Post "/admin/users/{user_id}/balance" impl WalletManagement, PaymentGateway where requires [Role::Admin]);
pub async fn adjust_balance<B: WalletManagement, G: PaymentGateway>(
    path: web::Path<i64>,
    body: web::Json<BalanceAdjustment>,
    api: web::Data<WalletApi<B, G>>,
) -> Result<HttpResponse, ServerError> {
    let user_id = path.into_inner();
    let BalanceAdjustment { amount, reason } = body.into_inner();
    info!("💻️ POST balance adjustment of {amount} for user #{user_id}: {reason}");
    let row = api.adjust_balance(user_id, amount, &reason).await?;
    Ok(HttpResponse::Ok().json(row))
}

route!(inventory => Get "/admin/inventory/{location_id}" impl InventoryManagement where requires [Role::Admin]);
pub async fn inventory<B: InventoryManagement>(
    path: web::Path<i64>,
    api: web::Data<InventoryApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let location_id = path.into_inner();
    debug!("💻️ GET inventory for location #{location_id}");
    let entries = api.inventory(location_id).await?;
    Ok(HttpResponse::Ok().json(entries))
}

route!(stocktake => Post "/admin/inventory/{location_id}" impl InventoryManagement where requires [Role::Admin]);
/// Replaces the stored quantities of the listed products. Either every item is applied or none is.
pub async fn stocktake<B: InventoryManagement>(
    path: web::Path<i64>,
    body: web::Json<StocktakeRequest>,
    api: web::Data<InventoryApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let location_id = path.into_inner();
    info!("💻️ POST stocktake of {} items for location #{location_id}", body.items.len());
    let entries = api.bulk_upsert(location_id, &body.updates()).await?;
    Ok(HttpResponse::Ok().json(entries))
}

route!(remote_unlock => Post "/admin/fridges/{fridge_id}/unlock" impl InventoryManagement where requires [Role::Admin]);
pub async fn remote_unlock<B: InventoryManagement>(
    path: web::Path<String>,
    api: web::Data<InventoryApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let fridge_id = path.into_inner();
    info!("💻️ POST remote unlock for fridge {fridge_id}");
    let command = api.remote_unlock(&fridge_id).await?;
    Ok(HttpResponse::Ok().json(command))
}

route!(set_promotion => Post "/admin/products/{product_id}/promotion" impl InventoryManagement where requires [Role::Admin]);
pub async fn set_promotion<B: InventoryManagement>(
    path: web::Path<i64>,
    body: web::Json<PromotionRequest>,
    api: web::Data<InventoryApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let product_id = path.into_inner();
    debug!("💻️ POST promotion for product #{product_id}");
    let product = api.set_promotion(product_id, &body.into_inner().into()).await?;
    Ok(HttpResponse::Ok().json(product))
}

route!(register_restock => Post "/admin/products/{product_id}/restock" impl InventoryManagement where requires [Role::Admin]);
/// Records the unit cost paid at the latest restock. Items already sold keep the cost they were sold at.
pub async fn register_restock<B: InventoryManagement>(
    path: web::Path<i64>,
    body: web::Json<RestockRequest>,
    api: web::Data<InventoryApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let product_id = path.into_inner();
    debug!("💻️ POST restock for product #{product_id} at {}", body.purchase_price);
    let product = api.register_restock(product_id, body.purchase_price).await?;
    Ok(HttpResponse::Ok().json(product))
}

//----------------------------------------------   Webhook  ----------------------------------------------------
route!(payment_webhook => Post "/payments" impl PaymentsBackend, PaymentGateway);
/// Payment notifications from the gateway, mounted under `/webhook`.
///
/// The gateway retries any notification that is not acknowledged with a 200, so this handler always returns 200 once
/// the request got past the signature check. Failures are logged; the notification carries no data of its own (the
/// payment is always fetched from the gateway), so there is nothing to gain from a retry storm.
pub async fn payment_webhook<B: PaymentsBackend, G: PaymentGateway>(
    req: HttpRequest,
    body: web::Bytes,
    api: web::Data<WebhookApi<B, G>>,
) -> HttpResponse {
    let query = web::Query::<HashMap<String, String>>::from_query(req.query_string())
        .map(web::Query::into_inner)
        .unwrap_or_default();
    let json = if body.is_empty() { None } else { serde_json::from_slice::<Value>(&body).ok() };
    let notification = PaymentNotification::from_parts(json.as_ref(), &query);
    debug!("📬️ Payment notification received: {notification:?}");
    match api.reconcile(&notification).await {
        Ok(ReconcileOutcome::Ignored(reason)) => debug!("📬️ Notification ignored. {reason}"),
        Ok(ReconcileOutcome::Duplicate) => info!("📬️ Notification {notification:?} had already been applied"),
        Ok(ReconcileOutcome::DepositCredited(tx)) => {
            info!("📬️ Deposit of {} credited to user #{}", tx.amount, tx.user_id)
        },
        Ok(ReconcileOutcome::InvoicesPaid(paid)) => {
            info!("📬️ {} invoices of user #{} paid ({})", paid.invoices.len(), paid.user_id, paid.amount)
        },
        Ok(ReconcileOutcome::OrderFinalized(order)) => info!("📬️ Order #{} is now {}", order.id, order.status),
        Err(e) => error!("📬️ Could not reconcile notification {notification:?}. {e}"),
    }
    HttpResponse::Ok().json(JsonResponse::success("Notification received"))
}
