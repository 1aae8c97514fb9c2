use crate::{
    auth::Actor,
    entities::{order, order_item, Order, OrderItem, User},
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Order ledger: owner-readable history, admin-writable fulfillment state.
///
/// Orders are created by checkout (with items) or by the admin manual path
/// (without). Status is stored as the string the admin wrote; the canonical
/// lifecycle is documentation, not a write-side constraint.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl OrderService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// A user's own order history, newest first.
    #[instrument(skip(self))]
    pub async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<order::Model>, ServiceError> {
        Ok(Order::find()
            .filter(order::Column::UserId.eq(user_id))
            .order_by_desc(order::Column::CreatedAt)
            .all(&*self.db)
            .await?)
    }

    /// Every order in the ledger, newest first. Admin only.
    #[instrument(skip(self))]
    pub async fn list_all(&self, actor: &Actor) -> Result<Vec<order::Model>, ServiceError> {
        actor.ensure_admin()?;

        Ok(Order::find()
            .order_by_desc(order::Column::CreatedAt)
            .all(&*self.db)
            .await?)
    }

    /// Looks up a single order.
    pub async fn get_order(&self, order_id: Uuid) -> Result<order::Model, ServiceError> {
        Order::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))
    }

    /// An order with its line items, as the admin detail view needs it.
    #[instrument(skip(self))]
    pub async fn get_order_with_items(
        &self,
        actor: &Actor,
        order_id: Uuid,
    ) -> Result<OrderWithItems, ServiceError> {
        actor.ensure_admin()?;

        let order = self.get_order(order_id).await?;
        let items = OrderItem::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .all(&*self.db)
            .await?;

        Ok(OrderWithItems { order, items })
    }

    /// Overwrites an order's status. Admin only.
    ///
    /// Any string is accepted and stored verbatim. Items are untouched.
    /// Publishes `OrderStatusChanged` with the old and new values.
    #[instrument(skip(self))]
    pub async fn update_status(
        &self,
        actor: &Actor,
        order_id: Uuid,
        status: &str,
    ) -> Result<order::Model, ServiceError> {
        actor.ensure_admin()?;

        let order = self.get_order(order_id).await?;
        let old_status = order.status.clone();

        let mut active: order::ActiveModel = order.into();
        active.status = Set(status.to_string());
        active.updated_at = Set(Utc::now());
        let order = active.update(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::OrderStatusChanged {
                order_id,
                old_status: old_status.clone(),
                new_status: status.to_string(),
            })
            .await;

        info!(
            "Order {} status changed: {} -> {}",
            order_id, old_status, status
        );
        Ok(order)
    }

    /// Admin edit of an order: status and/or total override.
    ///
    /// A total written here is an accepted escape hatch; it is not
    /// re-validated against the order's items.
    #[instrument(skip(self, input))]
    pub async fn update_order(
        &self,
        actor: &Actor,
        order_id: Uuid,
        input: UpdateOrderInput,
    ) -> Result<order::Model, ServiceError> {
        actor.ensure_admin()?;

        let order = self.get_order(order_id).await?;
        let old_status = order.status.clone();
        let mut active: order::ActiveModel = order.into();

        let status_change = match input.status {
            Some(ref status) if *status != old_status => {
                active.status = Set(status.clone());
                Some(status.clone())
            }
            _ => None,
        };
        if let Some(total_amount) = input.total_amount {
            active.total_amount = Set(total_amount);
        }
        active.updated_at = Set(Utc::now());

        let order = active.update(&*self.db).await?;

        if let Some(new_status) = status_change {
            self.event_sender
                .send_or_log(Event::OrderStatusChanged {
                    order_id,
                    old_status,
                    new_status,
                })
                .await;
        }

        info!("Order {} updated", order_id);
        Ok(order)
    }

    /// Creates an order with no items. Admin only.
    ///
    /// Escape hatch that bypasses checkout entirely; the target account must
    /// exist.
    #[instrument(skip(self, input), fields(user_id = %input.user_id))]
    pub async fn create_manual(
        &self,
        actor: &Actor,
        input: CreateManualOrderInput,
    ) -> Result<order::Model, ServiceError> {
        actor.ensure_admin()?;

        User::find_by_id(input.user_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("User {} not found", input.user_id)))?;

        let order_id = Uuid::new_v4();
        let now = Utc::now();

        let order = order::ActiveModel {
            id: Set(order_id),
            user_id: Set(input.user_id),
            total_amount: Set(input.total_amount),
            status: Set(input.status),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let order = order.insert(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::OrderCreated(order_id))
            .await;

        info!("Manual order {} created for user {}", order_id, input.user_id);
        Ok(order)
    }

    /// Deletes an order and its items as one unit. Admin only.
    #[instrument(skip(self))]
    pub async fn delete_order(&self, actor: &Actor, order_id: Uuid) -> Result<(), ServiceError> {
        actor.ensure_admin()?;

        let txn = self.db.begin().await?;

        Order::find_by_id(order_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        OrderItem::delete_many()
            .filter(order_item::Column::OrderId.eq(order_id))
            .exec(&txn)
            .await?;

        Order::delete_by_id(order_id).exec(&txn).await?;

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::OrderDeleted(order_id))
            .await;

        info!("Deleted order {}", order_id);
        Ok(())
    }

    pub async fn count_orders(&self) -> Result<u64, ServiceError> {
        Ok(Order::find().count(&*self.db).await?)
    }

    /// The most recently created orders, newest first.
    pub async fn recent_orders(&self, limit: u64) -> Result<Vec<order::Model>, ServiceError> {
        Ok(Order::find()
            .order_by_desc(order::Column::CreatedAt)
            .limit(limit)
            .all(&*self.db)
            .await?)
    }
}

/// An order with its line items
#[derive(Debug, Serialize)]
pub struct OrderWithItems {
    pub order: order::Model,
    pub items: Vec<order_item::Model>,
}

/// Admin edit of an existing order
#[derive(Debug, Default, Deserialize)]
pub struct UpdateOrderInput {
    pub status: Option<String>,
    pub total_amount: Option<Decimal>,
}

/// Input for the admin manual-creation escape hatch
#[derive(Debug, Deserialize)]
pub struct CreateManualOrderInput {
    pub user_id: Uuid,
    pub total_amount: Decimal,
    pub status: String,
}
