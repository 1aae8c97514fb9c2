use crate::{
    config::AppConfig,
    entities::{cart_item, order, order_item, product, CartItem, OrderStatus, Product, User},
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use dashmap::DashMap;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, instrument};
use uuid::Uuid;

/// Checkout service: converts a user's cart into exactly one order.
///
/// The whole conversion (order insert, item snapshots, stock decrements,
/// cart clear) commits as a single transaction; on any failure nothing is
/// visible. Checkouts for the same user are additionally serialized through
/// a per-user lock so a double submission cannot interleave; the second
/// attempt finds the cart already cleared and fails with `EmptyCart`.
#[derive(Clone)]
pub struct CheckoutService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    config: Arc<AppConfig>,
    // One entry per user that has ever checked out in this process.
    locks: Arc<DashMap<Uuid, Arc<Mutex<()>>>>,
}

impl CheckoutService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
        config: Arc<AppConfig>,
    ) -> Self {
        Self {
            db,
            event_sender,
            config,
            locks: Arc::new(DashMap::new()),
        }
    }

    /// Places an order from the user's entire cart.
    ///
    /// Fails with `EmptyCart` when there is nothing to convert, `NotFound`
    /// when the account or a referenced product no longer exists, and
    /// `InsufficientStock` when stock enforcement is configured and any line
    /// exceeds what is on hand. In every failure case no state changes.
    ///
    /// Each order item snapshots the product's name and price at this
    /// moment; later catalog edits do not reach the placed order.
    #[instrument(skip(self))]
    pub async fn place_order(&self, user_id: Uuid) -> Result<order::Model, ServiceError> {
        let lock = self
            .locks
            .entry(user_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        let txn = self.db.begin().await?;

        // Defensive: the identity provider vouched for this id, but the
        // account may have been deleted since.
        User::find_by_id(user_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("User {} not found", user_id)))?;

        let lines = CartItem::find()
            .filter(cart_item::Column::UserId.eq(user_id))
            .order_by_asc(cart_item::Column::CreatedAt)
            .all(&txn)
            .await?;

        if lines.is_empty() {
            return Err(ServiceError::EmptyCart);
        }

        // Resolve live products and price the cart.
        let mut priced: Vec<(cart_item::Model, product::Model)> = Vec::with_capacity(lines.len());
        let mut total = Decimal::ZERO;

        for line in lines {
            let product = Product::find_by_id(line.product_id)
                .one(&txn)
                .await?
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("Product {} not found", line.product_id))
                })?;

            if self.config.enforce_stock_levels {
                ensure_stock(&product, line.quantity)?;
            }

            total += product.price * Decimal::from(line.quantity);
            priced.push((line, product));
        }

        let order_id = Uuid::new_v4();
        let now = Utc::now();

        let order = order::ActiveModel {
            id: Set(order_id),
            user_id: Set(user_id),
            total_amount: Set(total),
            status: Set(OrderStatus::Pending.to_string()),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let order = order.insert(&txn).await?;

        for (line, product) in &priced {
            let item = order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                product_id: Set(Some(product.id)),
                product_name: Set(product.name.clone()),
                quantity: Set(line.quantity),
                price: Set(product.price),
                created_at: Set(now),
            };
            item.insert(&txn).await?;

            let mut stock_update: product::ActiveModel = product.clone().into();
            stock_update.stock = Set(product.stock - line.quantity);
            stock_update.updated_at = Set(now);
            stock_update.update(&txn).await?;
        }

        CartItem::delete_many()
            .filter(cart_item::Column::UserId.eq(user_id))
            .exec(&txn)
            .await?;

        txn.commit().await?;

        // Post-commit, fire-and-forget.
        self.event_sender
            .send_or_log(Event::OrderPlaced {
                order_id,
                user_id,
                total,
            })
            .await;

        info!(
            "Order {} placed for user {} (total {}, {} lines)",
            order_id,
            user_id,
            total,
            priced.len()
        );
        Ok(order)
    }
}

/// Stock precondition for the strict checkout policy.
fn ensure_stock(product: &product::Model, requested: i32) -> Result<(), ServiceError> {
    if product.stock < requested {
        return Err(ServiceError::InsufficientStock(format!(
            "Product {} has {} in stock, {} requested",
            product.name, product.stock, requested
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;

    fn product_with_stock(stock: i32) -> product::Model {
        let now = Utc::now();
        product::Model {
            id: Uuid::new_v4(),
            name: "Laptop".to_string(),
            description: String::new(),
            price: dec!(999.99),
            stock,
            image_url: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn stock_check_allows_exact_fit() {
        assert!(ensure_stock(&product_with_stock(5), 5).is_ok());
        assert!(ensure_stock(&product_with_stock(5), 1).is_ok());
    }

    #[test]
    fn stock_check_rejects_oversell() {
        assert_matches!(
            ensure_stock(&product_with_stock(5), 6),
            Err(ServiceError::InsufficientStock(_))
        );
        assert_matches!(
            ensure_stock(&product_with_stock(0), 1),
            Err(ServiceError::InsufficientStock(_))
        );
    }

    #[test]
    fn totals_accumulate_per_line() {
        let mut total = Decimal::ZERO;
        for (price, quantity) in [(dec!(10.00), 2), (dec!(199.99), 1)] {
            total += price * Decimal::from(quantity);
        }
        assert_eq!(total, dec!(219.99));
    }
}
