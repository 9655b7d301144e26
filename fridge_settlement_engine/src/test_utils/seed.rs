use chrono::NaiveDate;

use crate::{
    db_types::{Brl, CreditInvoice, Location, Product, UserAccount},
    SqliteDatabase,
};

pub async fn seed_location(db: &SqliteDatabase, name: &str, fridge_id: Option<&str>) -> Location {
    sqlx::query_as(
        "INSERT INTO locations (name, fridge_id, syndic_commission_percentage) VALUES ($1, $2, 5.0) RETURNING id, \
         name, fridge_id, syndic_commission_percentage, initial_investment, monthly_fixed_cost",
    )
    .bind(name)
    .bind(fridge_id)
    .fetch_one(db.pool())
    .await
    .expect("Error seeding location")
}

pub async fn seed_product(db: &SqliteDatabase, name: &str, sale_price: i64, purchase_price: i64) -> Product {
    sqlx::query_as(
        "INSERT INTO products (name, sale_price, purchase_price, critical_stock_level) VALUES ($1, $2, $3, 2) \
         RETURNING id, name, purchase_price, sale_price, promotional_price, promotion_start_date, promotion_end_date, \
         critical_stock_level, archived",
    )
    .bind(name)
    .bind(sale_price)
    .bind(purchase_price)
    .fetch_one(db.pool())
    .await
    .expect("Error seeding product")
}

pub async fn seed_user(db: &SqliteDatabase, name: &str, email: &str, wallet: i64, credit_limit: i64) -> UserAccount {
    sqlx::query_as(
        "INSERT INTO users (name, email, cpf, wallet_balance, credit_limit) VALUES ($1, $2, '123.456.789-09', $3, $4) \
         RETURNING id, name, email, cpf, location_id, wallet_balance, credit_limit, credit_used",
    )
    .bind(name)
    .bind(email)
    .bind(wallet)
    .bind(credit_limit)
    .fetch_one(db.pool())
    .await
    .expect("Error seeding user")
}

pub async fn seed_stock(db: &SqliteDatabase, location_id: i64, product_id: i64, quantity: i64) {
    sqlx::query(
        "INSERT INTO inventory (location_id, product_id, quantity) VALUES ($1, $2, $3) ON CONFLICT (location_id, \
         product_id) DO UPDATE SET quantity = excluded.quantity",
    )
    .bind(location_id)
    .bind(product_id)
    .bind(quantity)
    .execute(db.pool())
    .await
    .expect("Error seeding stock");
}

pub async fn seed_invoice(db: &SqliteDatabase, user_id: i64, amount: i64) -> CreditInvoice {
    sqlx::query_as(
        "INSERT INTO credit_invoices (user_id, amount, due_date) VALUES ($1, $2, $3) RETURNING id, user_id, amount, \
         status, due_date, paid_at, related_payment_ref",
    )
    .bind(user_id)
    .bind(amount)
    .bind(NaiveDate::from_ymd_opt(2030, 1, 10))
    .fetch_one(db.pool())
    .await
    .expect("Error seeding invoice")
}

/// One condominium with a fridge, two stocked products and two users.
///
/// * Residencial Aurora, fridge `FRIDGE-001`
/// * Water: R$ 3,50 (cost R$ 1,20), 10 in stock
/// * Soda: R$ 6,00 (cost R$ 2,50), 10 in stock
/// * Alice: R$ 20,00 in her wallet and a R$ 50,00 credit line
/// * Bruno: empty wallet, no credit
pub struct Fixture {
    pub location: Location,
    pub water: Product,
    pub soda: Product,
    pub alice: UserAccount,
    pub bruno: UserAccount,
}

impl Fixture {
    pub async fn new(db: &SqliteDatabase) -> Self {
        let location = seed_location(db, "Residencial Aurora", Some("FRIDGE-001")).await;
        let water = seed_product(db, "Water", 350, 120).await;
        let soda = seed_product(db, "Soda", 600, 250).await;
        seed_stock(db, location.id, water.id, 10).await;
        seed_stock(db, location.id, soda.id, 10).await;
        let alice = seed_user(db, "Alice Prado", "alice@example.com", 2000, 5000).await;
        let bruno = seed_user(db, "Bruno Lima", "bruno@example.com", 0, 0).await;
        Self { location, water, soda, alice, bruno }
    }

    pub async fn stock_of(&self, db: &SqliteDatabase, product_id: i64) -> i64 {
        sqlx::query_scalar("SELECT quantity FROM inventory WHERE location_id = $1 AND product_id = $2")
            .bind(self.location.id)
            .bind(product_id)
            .fetch_optional(db.pool())
            .await
            .expect("Error fetching stock")
            .unwrap_or(0)
    }

    pub async fn balance_of(&self, db: &SqliteDatabase, user_id: i64) -> Brl {
        sqlx::query_scalar("SELECT wallet_balance FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_one(db.pool())
            .await
            .expect("Error fetching balance")
    }
}
