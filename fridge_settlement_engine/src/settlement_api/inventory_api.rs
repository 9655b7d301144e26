use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{Brl, InventoryEntry, Product, UnlockCommand},
    traits::{InventoryManagement, InventoryUpdate, PromotionUpdate, SettlementError},
};

/// Stock, fridge doors and the catalog fields that pricing depends on.
pub struct InventoryApi<B> {
    db: B,
}

impl<B> Debug for InventoryApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "InventoryApi")
    }
}

impl<B> InventoryApi<B>
where B: InventoryManagement
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    pub async fn inventory(&self, location_id: i64) -> Result<Vec<InventoryEntry>, SettlementError> {
        self.db.fetch_location(location_id).await?.ok_or(SettlementError::LocationNotFound(location_id))?;
        self.db.fetch_inventory(location_id).await
    }

    /// Records a stocktake. The whole batch is applied or none of it is.
    pub async fn bulk_upsert(
        &self,
        location_id: i64,
        items: &[InventoryUpdate],
    ) -> Result<Vec<InventoryEntry>, SettlementError> {
        if items.is_empty() {
            return Err(SettlementError::ValidationError("The stocktake has no items".into()));
        }
        self.db.bulk_upsert_inventory(location_id, items).await
    }

    pub async fn remote_unlock(&self, fridge_id: &str) -> Result<UnlockCommand, SettlementError> {
        let command = self.db.enqueue_remote_unlock(fridge_id).await?;
        info!("🗃️ Remote unlock #{} queued for fridge {fridge_id}", command.id);
        Ok(command)
    }

    pub async fn unlock_commands(&self, fridge_id: &str) -> Result<Vec<UnlockCommand>, SettlementError> {
        self.db.fetch_unlock_commands(fridge_id).await
    }

    pub async fn set_promotion(&self, product_id: i64, promotion: &PromotionUpdate) -> Result<Product, SettlementError> {
        self.db.set_promotion(product_id, promotion).await
    }

    pub async fn register_restock(&self, product_id: i64, purchase_price: Brl) -> Result<Product, SettlementError> {
        self.db.register_restock(product_id, purchase_price).await
    }
}
