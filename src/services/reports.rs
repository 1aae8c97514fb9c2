use crate::{
    auth::Actor,
    entities::{order, user, Order, Product, Role, User},
    errors::ServiceError,
};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::instrument;

/// Number of recent orders shown on the dashboard.
const RECENT_ORDERS: u64 = 5;

/// Read-only aggregates for the admin back office.
#[derive(Clone)]
pub struct ReportsService {
    db: Arc<DatabaseConnection>,
}

impl ReportsService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// The admin dashboard summary. Admin only.
    ///
    /// Counts and the recent-order list are computed here, not at render
    /// time.
    #[instrument(skip(self))]
    pub async fn dashboard(&self, actor: &Actor) -> Result<DashboardSummary, ServiceError> {
        actor.ensure_admin()?;

        let total_products = Product::find().count(&*self.db).await?;
        let total_orders = Order::find().count(&*self.db).await?;
        let total_customers = User::find()
            .filter(user::Column::Role.eq(Role::Customer))
            .count(&*self.db)
            .await?;
        let recent_orders = Order::find()
            .order_by_desc(order::Column::CreatedAt)
            .limit(RECENT_ORDERS)
            .all(&*self.db)
            .await?;

        Ok(DashboardSummary {
            total_products,
            total_orders,
            total_customers,
            recent_orders,
        })
    }
}

/// Aggregates for the admin dashboard
#[derive(Debug, Serialize)]
pub struct DashboardSummary {
    pub total_products: u64,
    pub total_orders: u64,
    pub total_customers: u64,
    pub recent_orders: Vec<order::Model>,
}
