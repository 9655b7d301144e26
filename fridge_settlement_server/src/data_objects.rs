use std::fmt::Display;

use chrono::{DateTime, NaiveDate, Utc};
use fridge_settlement_engine::{
    db_types::Brl,
    traits::{CardDetails, CartItem, InventoryUpdate, NewOrderRequest, Pagination, PromotionUpdate},
    SettlementError,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }
}

/// The cart sent by the customer app. Prices are never accepted from the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartRequest {
    pub location_id: i64,
    pub items: Vec<CartItem>,
}

impl CartRequest {
    pub fn into_order(self, user_id: i64) -> NewOrderRequest {
        NewOrderRequest::new(user_id, self.location_id, self.items)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardOrderRequest {
    #[serde(flatten)]
    pub cart: CartRequest,
    pub card: CardDetails,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardDepositRequest {
    pub amount: Brl,
    pub card: CardDetails,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PixDepositRequest {
    pub amount: Brl,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferRequest {
    pub recipient_email: String,
    pub amount: Brl,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyRecipientRequest {
    pub recipient_email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferResponse {
    pub transaction_id: i64,
    pub new_balance: Brl,
}

/// A signed amount. Positive values credit the wallet, negative values debit it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceAdjustment {
    pub amount: Brl,
    /// Optional. A generic description is used when it is empty.
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoorOpenedReport {
    pub order_id: i64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct UnlockStatusResponse {
    pub order_id: i64,
    pub door_opened: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BalanceResponse {
    pub balance: Brl,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PaginationQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl TryFrom<PaginationQuery> for Pagination {
    type Error = SettlementError;

    fn try_from(query: PaginationQuery) -> Result<Self, Self::Error> {
        let default = Pagination::default();
        Pagination::new(query.page.unwrap_or(default.page), query.limit.unwrap_or(default.limit))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StocktakeItem {
    pub product_id: i64,
    pub quantity: i64,
    #[serde(default)]
    pub expiration_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StocktakeRequest {
    pub items: Vec<StocktakeItem>,
}

impl StocktakeRequest {
    pub fn updates(&self) -> Vec<InventoryUpdate> {
        self.items
            .iter()
            .map(|i| InventoryUpdate {
                product_id: i.product_id,
                quantity: i.quantity,
                expiration_date: i.expiration_date,
            })
            .collect()
    }
}

/// Omit every field (or send `{}`) to end a promotion.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PromotionRequest {
    #[serde(default)]
    pub promotional_price: Option<Brl>,
    #[serde(default)]
    pub start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end: Option<DateTime<Utc>>,
}

impl From<PromotionRequest> for PromotionUpdate {
    fn from(req: PromotionRequest) -> Self {
        Self { promotional_price: req.promotional_price, promotion_start_date: req.start, promotion_end_date: req.end }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestockRequest {
    pub purchase_price: Brl,
}
