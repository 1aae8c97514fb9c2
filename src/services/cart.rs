use crate::{
    entities::{cart_item, CartItem, Product},
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Cart service: per-user mutable line collections, priced live.
///
/// No stock is reserved or checked here; availability is enforced (or not,
/// per configuration) only when checkout converts the cart.
#[derive(Clone)]
pub struct CartService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl CartService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Adds one unit of a product to the user's cart.
    ///
    /// An existing (user, product) line is incremented by one; otherwise a
    /// new line with quantity 1 is created. Fails with `NotFound` when the
    /// product does not exist. Publishes `CartItemAdded`.
    #[instrument(skip(self))]
    pub async fn add_item(
        &self,
        user_id: Uuid,
        product_id: Uuid,
    ) -> Result<cart_item::Model, ServiceError> {
        let txn = self.db.begin().await?;

        let product = Product::find_by_id(product_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;

        let existing = CartItem::find()
            .filter(cart_item::Column::UserId.eq(user_id))
            .filter(cart_item::Column::ProductId.eq(product_id))
            .one(&txn)
            .await?;

        let line = if let Some(line) = existing {
            let quantity = line.quantity;
            let mut line: cart_item::ActiveModel = line.into();
            line.quantity = Set(quantity + 1);
            line.updated_at = Set(Utc::now());
            line.update(&txn).await?
        } else {
            let now = Utc::now();
            let line = cart_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                user_id: Set(user_id),
                product_id: Set(product_id),
                quantity: Set(1),
                created_at: Set(now),
                updated_at: Set(now),
            };
            line.insert(&txn).await?
        };

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::CartItemAdded {
                user_id,
                product_id,
            })
            .await;

        info!(
            "Added {} to cart of user {} (quantity now {})",
            product.name, user_id, line.quantity
        );
        Ok(line)
    }

    /// Overwrites a line's quantity; a quantity of zero or less deletes it.
    ///
    /// The line must belong to the calling user, otherwise `Unauthorized`.
    /// Returns the updated line, or `None` when it was deleted.
    #[instrument(skip(self))]
    pub async fn set_quantity(
        &self,
        user_id: Uuid,
        line_id: Uuid,
        quantity: i32,
    ) -> Result<Option<cart_item::Model>, ServiceError> {
        let line = self.owned_line(user_id, line_id).await?;

        if quantity <= 0 {
            line.delete(&*self.db).await?;

            self.event_sender
                .send_or_log(Event::CartItemRemoved { user_id, line_id })
                .await;
            return Ok(None);
        }

        let mut line: cart_item::ActiveModel = line.into();
        line.quantity = Set(quantity);
        line.updated_at = Set(Utc::now());
        let line = line.update(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::CartItemUpdated { user_id, line_id })
            .await;

        Ok(Some(line))
    }

    /// Removes a line from the user's cart unconditionally.
    #[instrument(skip(self))]
    pub async fn remove_item(&self, user_id: Uuid, line_id: Uuid) -> Result<(), ServiceError> {
        let line = self.owned_line(user_id, line_id).await?;
        line.delete(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::CartItemRemoved { user_id, line_id })
            .await;

        info!("Removed line {} from cart of user {}", line_id, user_id);
        Ok(())
    }

    /// The user's cart joined with live catalog prices, plus the grand total.
    ///
    /// Lines are returned in insertion order. Read-only.
    #[instrument(skip(self))]
    pub async fn get_cart(&self, user_id: Uuid) -> Result<CartView, ServiceError> {
        let rows = CartItem::find()
            .filter(cart_item::Column::UserId.eq(user_id))
            .order_by_asc(cart_item::Column::CreatedAt)
            .find_also_related(Product)
            .all(&*self.db)
            .await?;

        let mut lines = Vec::with_capacity(rows.len());
        let mut total = Decimal::ZERO;

        for (line, product) in rows {
            // FK cascade keeps lines and catalog consistent; a miss here is
            // storage corruption, not a user error.
            let product = product.ok_or_else(|| {
                ServiceError::database_error_message(format!(
                    "cart line {} references missing product {}",
                    line.id, line.product_id
                ))
            })?;

            let line_total = product.price * Decimal::from(line.quantity);
            total += line_total;

            lines.push(CartLine {
                line_id: line.id,
                product_id: product.id,
                product_name: product.name,
                unit_price: product.price,
                quantity: line.quantity,
                line_total,
            });
        }

        Ok(CartView { lines, total })
    }

    /// Deletes every line in the user's cart.
    #[instrument(skip(self))]
    pub async fn clear_cart(&self, user_id: Uuid) -> Result<(), ServiceError> {
        CartItem::delete_many()
            .filter(cart_item::Column::UserId.eq(user_id))
            .exec(&*self.db)
            .await?;

        self.event_sender.send_or_log(Event::CartCleared(user_id)).await;

        info!("Cleared cart for user {}", user_id);
        Ok(())
    }

    /// Loads a line and enforces ownership.
    async fn owned_line(
        &self,
        user_id: Uuid,
        line_id: Uuid,
    ) -> Result<cart_item::Model, ServiceError> {
        let line = CartItem::find_by_id(line_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Cart line {} not found", line_id)))?;

        if line.user_id != user_id {
            return Err(ServiceError::Unauthorized(
                "Cart line belongs to another user".to_string(),
            ));
        }

        Ok(line)
    }
}

/// A cart line joined with its live product data.
#[derive(Debug, Clone, Serialize)]
pub struct CartLine {
    pub line_id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub unit_price: Decimal,
    pub quantity: i32,
    pub line_total: Decimal,
}

/// A user's cart with totals computed up front.
#[derive(Debug, Clone, Serialize)]
pub struct CartView {
    pub lines: Vec<CartLine>,
    pub total: Decimal,
}

impl CartView {
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}
