use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{postgres::PgPoolOptions, types::Json, PgPool};
use uuid::Uuid;

use super::{CartEntry, CartStore, CatalogStore, CouponStore, OrderStore, StoreError};
use crate::domain::aggregates::{Coupon, Order, OrderLine, Product, Variation};
use crate::domain::value_objects::{CartKey, CouponCode, DiscountPercentage, Money};

const COUPON_COLUMNS: &str = "code, discount_percentage, expiration_date, is_active, user_id, max_usage, usage_count";

#[derive(Clone, Debug)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new().max_connections(10).connect(database_url).await?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self { Self { pool } }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct ProductRow { id: String, name: String, image: Option<String>, category: Option<String>, variations: Json<Vec<Variation>> }

impl From<ProductRow> for Product {
    fn from(r: ProductRow) -> Self {
        Product { id: r.id, name: r.name, image: r.image, category: r.category, variations: r.variations.0 }
    }
}

#[derive(sqlx::FromRow)]
struct CartRow { product_id: String, variation_id: String, color: String, size: String, quantity: i32 }

impl TryFrom<CartRow> for CartEntry {
    type Error = StoreError;
    fn try_from(r: CartRow) -> Result<Self, Self::Error> {
        let quantity = u32::try_from(r.quantity).map_err(|_| StoreError::Corrupt(format!("cart quantity {}", r.quantity)))?;
        Ok(CartEntry { key: CartKey::new(r.product_id, r.variation_id, r.color, r.size), quantity })
    }
}

#[derive(sqlx::FromRow)]
struct CouponRow { code: String, discount_percentage: i16, expiration_date: DateTime<Utc>, is_active: bool, user_id: String, max_usage: i32, usage_count: i32 }

impl TryFrom<CouponRow> for Coupon {
    type Error = StoreError;
    fn try_from(r: CouponRow) -> Result<Self, Self::Error> {
        let corrupt = |what: &str| StoreError::Corrupt(format!("coupon {}: {what}", r.code));
        let discount = u8::try_from(r.discount_percentage).ok().and_then(|p| DiscountPercentage::new(p).ok()).ok_or_else(|| corrupt("discount"))?;
        let max_usage = u32::try_from(r.max_usage).map_err(|_| corrupt("max_usage"))?;
        let usage_count = u32::try_from(r.usage_count).map_err(|_| corrupt("usage_count"))?;
        let code = CouponCode::new(r.code.clone()).map_err(|_| corrupt("code"))?;
        Ok(Coupon {
            code, discount_percentage: discount, expiration_date: r.expiration_date, is_active: r.is_active,
            user_id: r.user_id, max_usage, usage_count,
        })
    }
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid, user_id: String, payment_session_id: String, lines: Json<Vec<OrderLine>>,
    total_amount: Decimal, currency: String, coupon_code: Option<String>, created_at: DateTime<Utc>,
}

impl From<OrderRow> for Order {
    fn from(r: OrderRow) -> Self {
        let coupon_code = r.coupon_code.and_then(|c| CouponCode::new(c).ok());
        Order::restore(r.id, r.user_id, r.payment_session_id, r.lines.0, Money::new(r.total_amount, &r.currency), coupon_code, r.created_at)
    }
}

fn to_i32(quantity: u32) -> Result<i32, StoreError> {
    i32::try_from(quantity).map_err(|_| StoreError::Corrupt(format!("quantity {quantity} out of range")))
}

#[async_trait]
impl CatalogStore for PgStore {
    async fn product(&self, product_id: &str) -> Result<Option<Product>, StoreError> {
        let row = sqlx::query_as::<_, ProductRow>("SELECT id, name, image, category, variations FROM products WHERE id = $1")
            .bind(product_id).fetch_optional(&self.pool).await?;
        Ok(row.map(Product::from))
    }

    async fn products(&self, product_ids: &[String]) -> Result<Vec<Product>, StoreError> {
        let rows = sqlx::query_as::<_, ProductRow>("SELECT id, name, image, category, variations FROM products WHERE id = ANY($1)")
            .bind(product_ids.to_vec()).fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(Product::from).collect())
    }

    async fn upsert_product(&self, product: Product) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO products (id, name, image, category, variations) VALUES ($1, $2, $3, $4, $5) ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name, image = EXCLUDED.image, category = EXCLUDED.category, variations = EXCLUDED.variations, updated_at = NOW()")
            .bind(&product.id).bind(&product.name).bind(&product.image).bind(&product.category).bind(Json(&product.variations))
            .execute(&self.pool).await?;
        Ok(())
    }

    async fn remove_stock(&self, key: &CartKey, quantity: u32) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query_as::<_, ProductRow>("SELECT id, name, image, category, variations FROM products WHERE id = $1 FOR UPDATE")
            .bind(&key.product_id).fetch_optional(&mut *tx).await?
            .ok_or_else(|| StoreError::NotFound(format!("product {}", key.product_id)))?;
        let mut product = Product::from(row);
        product.remove_stock(key, quantity)?;
        sqlx::query("UPDATE products SET variations = $2, updated_at = NOW() WHERE id = $1")
            .bind(&product.id).bind(Json(&product.variations)).execute(&mut *tx).await?;
        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl CartStore for PgStore {
    async fn cart(&self, user_id: &str) -> Result<Vec<CartEntry>, StoreError> {
        sqlx::query_as::<_, CartRow>("SELECT product_id, variation_id, color, size, quantity FROM cart_items WHERE user_id = $1 ORDER BY created_at")
            .bind(user_id).fetch_all(&self.pool).await?
            .into_iter().map(CartEntry::try_from).collect()
    }

    async fn add_item(&self, user_id: &str, entry: CartEntry) -> Result<CartEntry, StoreError> {
        let k = &entry.key;
        let row = sqlx::query_as::<_, CartRow>("INSERT INTO cart_items (user_id, product_id, variation_id, color, size, quantity, created_at) VALUES ($1, $2, $3, $4, $5, $6, NOW()) ON CONFLICT (user_id, product_id, variation_id, color, size) DO UPDATE SET quantity = cart_items.quantity + EXCLUDED.quantity RETURNING product_id, variation_id, color, size, quantity")
            .bind(user_id).bind(&k.product_id).bind(&k.variation_id).bind(&k.color).bind(&k.size).bind(to_i32(entry.quantity)?)
            .fetch_one(&self.pool).await?;
        CartEntry::try_from(row)
    }

    async fn set_quantity(&self, user_id: &str, key: &CartKey, quantity: u32) -> Result<Vec<CartEntry>, StoreError> {
        if quantity == 0 {
            return self.remove_item(user_id, key).await;
        }
        sqlx::query("UPDATE cart_items SET quantity = $6 WHERE user_id = $1 AND product_id = $2 AND variation_id = $3 AND color = $4 AND size = $5")
            .bind(user_id).bind(&key.product_id).bind(&key.variation_id).bind(&key.color).bind(&key.size).bind(to_i32(quantity)?)
            .execute(&self.pool).await?;
        self.cart(user_id).await
    }

    async fn remove_item(&self, user_id: &str, key: &CartKey) -> Result<Vec<CartEntry>, StoreError> {
        sqlx::query("DELETE FROM cart_items WHERE user_id = $1 AND product_id = $2 AND variation_id = $3 AND color = $4 AND size = $5")
            .bind(user_id).bind(&key.product_id).bind(&key.variation_id).bind(&key.color).bind(&key.size)
            .execute(&self.pool).await?;
        self.cart(user_id).await
    }

    async fn clear(&self, user_id: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM cart_items WHERE user_id = $1").bind(user_id).execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl CouponStore for PgStore {
    async fn active_coupon(&self, user_id: &str, now: DateTime<Utc>) -> Result<Option<Coupon>, StoreError> {
        let sql = format!("SELECT {COUPON_COLUMNS} FROM coupons WHERE user_id = $1 AND is_active AND expiration_date > $2 ORDER BY expiration_date DESC LIMIT 1");
        sqlx::query_as::<_, CouponRow>(&sql).bind(user_id).bind(now).fetch_optional(&self.pool).await?
            .map(Coupon::try_from).transpose()
    }

    async fn redeem(&self, code: &CouponCode, user_id: &str, now: DateTime<Utc>) -> Result<Option<Coupon>, StoreError> {
        // SET expressions see the pre-update row.
        let sql = format!(
            "WITH redeemed AS ( \
                 UPDATE coupons SET usage_count = usage_count + 1, is_active = (usage_count + 1 < max_usage) \
                 WHERE code = $1 AND user_id = $2 AND is_active AND expiration_date > $3 AND usage_count < max_usage \
                 RETURNING {COUPON_COLUMNS} \
             ), recorded AS ( \
                 INSERT INTO coupon_redemptions (code, user_id) SELECT code, user_id FROM redeemed \
             ) \
             SELECT {COUPON_COLUMNS} FROM redeemed"
        );
        sqlx::query_as::<_, CouponRow>(&sql).bind(code.as_str()).bind(user_id).bind(now).fetch_optional(&self.pool).await?
            .map(Coupon::try_from).transpose()
    }

    async fn has_unclaimed_redemption(&self, code: &CouponCode, user_id: &str) -> Result<bool, StoreError> {
        let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM coupon_redemptions WHERE code = $1 AND user_id = $2 AND order_id IS NULL)")
            .bind(code.as_str()).bind(user_id).fetch_one(&self.pool).await?;
        Ok(exists)
    }

    async fn claim_redemption(&self, code: &CouponCode, user_id: &str, order_id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("UPDATE coupon_redemptions SET order_id = $3, claimed_at = NOW() WHERE id = (SELECT id FROM coupon_redemptions WHERE code = $1 AND user_id = $2 AND order_id IS NULL ORDER BY redeemed_at, id LIMIT 1 FOR UPDATE SKIP LOCKED)")
            .bind(code.as_str()).bind(user_id).bind(order_id).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    async fn coupon(&self, code: &CouponCode) -> Result<Option<Coupon>, StoreError> {
        let sql = format!("SELECT {COUPON_COLUMNS} FROM coupons WHERE code = $1");
        sqlx::query_as::<_, CouponRow>(&sql).bind(code.as_str()).fetch_optional(&self.pool).await?
            .map(Coupon::try_from).transpose()
    }

    async fn insert_coupon(&self, coupon: Coupon) -> Result<(), StoreError> {
        let result = sqlx::query("INSERT INTO coupons (code, discount_percentage, expiration_date, is_active, user_id, max_usage, usage_count) VALUES ($1, $2, $3, $4, $5, $6, $7) ON CONFLICT (code) DO NOTHING")
            .bind(coupon.code.as_str()).bind(i16::from(coupon.discount_percentage.value())).bind(coupon.expiration_date)
            .bind(coupon.is_active).bind(&coupon.user_id).bind(to_i32(coupon.max_usage)?).bind(to_i32(coupon.usage_count)?)
            .execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::Conflict(format!("coupon {}", coupon.code)));
        }
        Ok(())
    }
}

#[async_trait]
impl OrderStore for PgStore {
    async fn order_for_session(&self, payment_session_id: &str) -> Result<Option<Order>, StoreError> {
        let row = sqlx::query_as::<_, OrderRow>("SELECT id, user_id, payment_session_id, lines, total_amount, currency, coupon_code, created_at FROM orders WHERE payment_session_id = $1")
            .bind(payment_session_id).fetch_optional(&self.pool).await?;
        Ok(row.map(Order::from))
    }

    async fn insert_order(&self, order: &Order) -> Result<(), StoreError> {
        let result = sqlx::query("INSERT INTO orders (id, user_id, payment_session_id, lines, total_amount, currency, coupon_code, created_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8) ON CONFLICT (payment_session_id) DO NOTHING")
            .bind(order.id()).bind(order.user_id()).bind(order.payment_session_id()).bind(Json(order.lines()))
            .bind(order.total().amount()).bind(order.total().currency()).bind(order.coupon_code().map(CouponCode::as_str))
            .bind(order.created_at())
            .execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::Conflict(format!("order for session {}", order.payment_session_id())));
        }
        Ok(())
    }
}
