use crate::{
    db_types::{Brl, InventoryEntry, Location, Product, UnlockCommand},
    traits::{data_objects::PromotionUpdate, InventoryUpdate, SettlementError},
};

#[allow(async_fn_in_trait)]
pub trait InventoryManagement {
    async fn fetch_location(&self, location_id: i64) -> Result<Option<Location>, SettlementError>;

    async fn fetch_product(&self, product_id: i64) -> Result<Option<Product>, SettlementError>;

    async fn fetch_inventory(&self, location_id: i64) -> Result<Vec<InventoryEntry>, SettlementError>;

    /// Replaces quantity and expiration for every item in one transaction. Any invalid item (unknown product,
    /// negative quantity) fails the whole batch.
    async fn bulk_upsert_inventory(
        &self,
        location_id: i64,
        items: &[InventoryUpdate],
    ) -> Result<Vec<InventoryEntry>, SettlementError>;

    /// Queues an unlock command for a fridge that belongs to a known location.
    async fn enqueue_remote_unlock(&self, fridge_id: &str) -> Result<UnlockCommand, SettlementError>;

    async fn fetch_unlock_commands(&self, fridge_id: &str) -> Result<Vec<UnlockCommand>, SettlementError>;

    async fn set_promotion(&self, product_id: i64, promotion: &PromotionUpdate) -> Result<Product, SettlementError>;

    /// Updates the unit cost used for future sales. Historical order items keep the cost they were sold at.
    async fn register_restock(&self, product_id: i64, purchase_price: Brl) -> Result<Product, SettlementError>;
}
