use async_trait::async_trait;
use chrono::Utc;
use common::{AccountId, Money, OrderId, OrderStatus, ProductId};
use sqlx::{PgConnection, PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    Account, LineItem, Order, OrderQuery, Product, ProductPatch, Result, StockLine, StoreError,
    model::merge_stock_lines,
    store::{AccountStore, CatalogStore, OrderStore},
};

const EMAIL_UNIQUE_INDEX: &str = "accounts_email_lower_idx";

/// PostgreSQL-backed store.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_account(row: PgRow) -> Result<Account> {
        Ok(Account {
            id: AccountId::from_uuid(row.try_get::<Uuid, _>("id")?),
            name: row.try_get("name")?,
            email: row.try_get("email")?,
            phone: row.try_get("phone")?,
            password_hash: row.try_get("password_hash")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn row_to_product(row: &PgRow) -> Result<Product> {
        Ok(Product {
            id: ProductId::from_uuid(row.try_get::<Uuid, _>("id")?),
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            price: Money::from_cents(row.try_get("price_cents")?),
            stock: row.try_get("stock")?,
            image_url: row.try_get("image_url")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn row_to_order(row: PgRow) -> Result<Order> {
        let line_items: serde_json::Value = row.try_get("line_items")?;
        let line_items: Vec<LineItem> = serde_json::from_value(line_items)?;
        let status: String = row.try_get("status")?;
        let status: OrderStatus = status
            .parse()
            .map_err(|e: common::UnknownStatus| StoreError::Corrupt(e.to_string()))?;

        Ok(Order {
            id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
            account_id: AccountId::from_uuid(row.try_get::<Uuid, _>("account_id")?),
            line_items,
            total_amount: Money::from_cents(row.try_get("total_cents")?),
            delivery_address: row.try_get("delivery_address")?,
            status,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

async fn restock_lines(conn: &mut PgConnection, lines: &[StockLine]) -> Result<()> {
    for (product_id, quantity) in merge_stock_lines(lines) {
        let result =
            sqlx::query("UPDATE products SET stock = stock + $2, updated_at = NOW() WHERE id = $1")
                .bind(product_id.as_uuid())
                .bind(i64::try_from(quantity).unwrap_or(i64::MAX))
                .execute(&mut *conn)
                .await?;

        if result.rows_affected() == 0 {
            tracing::warn!(%product_id, quantity, "restock skipped, product no longer exists");
        }
    }
    Ok(())
}

/// Explains why a compare-and-set on an order's status matched no row.
async fn status_mismatch(
    conn: &mut PgConnection,
    id: OrderId,
    expected: OrderStatus,
) -> Result<StoreError> {
    let actual: Option<String> = sqlx::query_scalar("SELECT status FROM orders WHERE id = $1")
        .bind(id.as_uuid())
        .fetch_optional(&mut *conn)
        .await?;

    Ok(match actual {
        None => StoreError::order_not_found(id),
        Some(actual) => StoreError::StatusConflict {
            order_id: id,
            expected,
            actual: actual
                .parse()
                .map_err(|e: common::UnknownStatus| StoreError::Corrupt(e.to_string()))?,
        },
    })
}

#[async_trait]
impl AccountStore for PostgresStore {
    async fn insert_account(&self, account: Account) -> Result<Account> {
        sqlx::query(
            r#"
            INSERT INTO accounts (id, name, email, phone, password_hash, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(account.id.as_uuid())
        .bind(&account.name)
        .bind(&account.email)
        .bind(&account.phone)
        .bind(&account.password_hash)
        .bind(account.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.constraint() == Some(EMAIL_UNIQUE_INDEX)
            {
                return StoreError::DuplicateEmail(account.email.clone());
            }
            StoreError::Database(e)
        })?;

        Ok(account)
    }

    async fn find_account_by_email(&self, email: &str) -> Result<Option<Account>> {
        let row = sqlx::query(
            r#"
            SELECT id, name, email, phone, password_hash, created_at
            FROM accounts
            WHERE LOWER(email) = LOWER($1)
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_account).transpose()
    }

    async fn get_account(&self, id: AccountId) -> Result<Option<Account>> {
        let row = sqlx::query(
            r#"
            SELECT id, name, email, phone, password_hash, created_at
            FROM accounts
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_account).transpose()
    }

    async fn update_password(&self, id: AccountId, password_hash: String) -> Result<()> {
        let result = sqlx::query("UPDATE accounts SET password_hash = $2 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(password_hash)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::account_not_found(id));
        }
        Ok(())
    }
}

#[async_trait]
impl CatalogStore for PostgresStore {
    async fn insert_product(&self, product: Product) -> Result<Product> {
        sqlx::query(
            r#"
            INSERT INTO products (id, name, description, price_cents, stock, image_url, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(product.id.as_uuid())
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price.cents())
        .bind(product.stock)
        .bind(&product.image_url)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(product)
    }

    async fn list_products(&self) -> Result<Vec<Product>> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, description, price_cents, stock, image_url, created_at, updated_at
            FROM products
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_product).collect()
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>> {
        let row = sqlx::query(
            r#"
            SELECT id, name, description, price_cents, stock, image_url, created_at, updated_at
            FROM products
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_product).transpose()
    }

    async fn update_product(&self, id: ProductId, patch: ProductPatch) -> Result<Product> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            r#"
            SELECT id, name, description, price_cents, stock, image_url, created_at, updated_at
            FROM products
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| StoreError::product_not_found(id))?;

        let mut product = Self::row_to_product(&row)?;
        patch.apply_to(&mut product, Utc::now());

        sqlx::query(
            r#"
            UPDATE products
            SET name = $2, description = $3, price_cents = $4, stock = $5, image_url = $6, updated_at = $7
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price.cents())
        .bind(product.stock)
        .bind(&product.image_url)
        .bind(product.updated_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(product)
    }

    async fn delete_product(&self, id: ProductId) -> Result<()> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::product_not_found(id));
        }
        Ok(())
    }

    async fn decrement_stock_batch(&self, lines: &[StockLine]) -> Result<Vec<Product>> {
        // Merged lines come back sorted by id, so concurrent carts lock rows in the same order
        let merged = merge_stock_lines(lines);
        let mut tx = self.pool.begin().await?;
        let mut updated = Vec::with_capacity(merged.len());

        for (product_id, requested) in merged {
            let quantity = i64::try_from(requested).unwrap_or(i64::MAX);

            let row = sqlx::query(
                r#"
                UPDATE products
                SET stock = stock - $2, updated_at = NOW()
                WHERE id = $1 AND stock >= $2
                RETURNING id, name, description, price_cents, stock, image_url, created_at, updated_at
                "#,
            )
            .bind(product_id.as_uuid())
            .bind(quantity)
            .fetch_optional(&mut *tx)
            .await?;

            match row {
                Some(row) => updated.push(Self::row_to_product(&row)?),
                None => {
                    let available: Option<i64> =
                        sqlx::query_scalar("SELECT stock FROM products WHERE id = $1")
                            .bind(product_id.as_uuid())
                            .fetch_optional(&mut *tx)
                            .await?;

                    // Dropping the transaction rolls back earlier lines
                    return Err(match available {
                        None => StoreError::product_not_found(product_id),
                        Some(available) => StoreError::InsufficientStock {
                            product_id,
                            requested,
                            available,
                        },
                    });
                }
            }
        }

        tx.commit().await?;
        Ok(updated)
    }

    async fn restock(&self, lines: &[StockLine]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        restock_lines(&mut tx, lines).await?;
        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl OrderStore for PostgresStore {
    async fn insert_order(&self, order: Order) -> Result<Order> {
        let line_items = serde_json::to_value(&order.line_items)?;

        sqlx::query(
            r#"
            INSERT INTO orders (id, account_id, line_items, total_cents, delivery_address, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(order.account_id.as_uuid())
        .bind(line_items)
        .bind(order.total_amount.cents())
        .bind(&order.delivery_address)
        .bind(order.status.as_str())
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(order)
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        let row = sqlx::query(
            r#"
            SELECT id, account_id, line_items, total_cents, delivery_address, status, created_at, updated_at
            FROM orders
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_order).transpose()
    }

    async fn list_orders(&self, query: OrderQuery) -> Result<Vec<Order>> {
        let mut sql = String::from(
            "SELECT id, account_id, line_items, total_cents, delivery_address, status, created_at, updated_at FROM orders WHERE 1=1",
        );
        let mut param_count = 0;

        if query.account_id.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND account_id = ${param_count}"));
        }
        if query.status.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND status = ${param_count}"));
        }

        sql.push_str(" ORDER BY created_at DESC, id DESC");

        if query.limit.is_some() {
            param_count += 1;
            sql.push_str(&format!(" LIMIT ${param_count}"));
        }
        if query.offset.is_some() {
            param_count += 1;
            sql.push_str(&format!(" OFFSET ${param_count}"));
        }

        let mut sqlx_query = sqlx::query(&sql);

        if let Some(account_id) = query.account_id {
            sqlx_query = sqlx_query.bind(account_id.as_uuid());
        }
        if let Some(status) = query.status {
            sqlx_query = sqlx_query.bind(status.as_str());
        }
        if let Some(limit) = query.limit {
            sqlx_query = sqlx_query.bind(i64::try_from(limit).unwrap_or(i64::MAX));
        }
        if let Some(offset) = query.offset {
            sqlx_query = sqlx_query.bind(i64::try_from(offset).unwrap_or(i64::MAX));
        }

        let rows = sqlx_query.fetch_all(&self.pool).await?;
        rows.into_iter().map(Self::row_to_order).collect()
    }

    async fn update_order_status(
        &self,
        id: OrderId,
        expected: OrderStatus,
        next: OrderStatus,
    ) -> Result<Order> {
        let row = sqlx::query(
            r#"
            UPDATE orders
            SET status = $3, updated_at = NOW()
            WHERE id = $1 AND status = $2
            RETURNING id, account_id, line_items, total_cents, delivery_address, status, created_at, updated_at
            "#,
        )
        .bind(id.as_uuid())
        .bind(expected.as_str())
        .bind(next.as_str())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Self::row_to_order(row),
            None => {
                let mut conn = self.pool.acquire().await?;
                Err(status_mismatch(&mut conn, id, expected).await?)
            }
        }
    }

    async fn cancel_order(&self, id: OrderId, expected: OrderStatus) -> Result<Order> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            r#"
            UPDATE orders
            SET status = $3, updated_at = NOW()
            WHERE id = $1 AND status = $2
            RETURNING id, account_id, line_items, total_cents, delivery_address, status, created_at, updated_at
            "#,
        )
        .bind(id.as_uuid())
        .bind(expected.as_str())
        .bind(OrderStatus::Cancelled.as_str())
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            return Err(status_mismatch(&mut tx, id, expected).await?);
        };
        let order = Self::row_to_order(row)?;

        // Dropping the transaction on error undoes the status change
        restock_lines(&mut tx, &order.stock_lines()).await?;
        tx.commit().await?;
        Ok(order)
    }
}
