//! SmallCart storefront core
//!
//! Catalog, per-user carts, the checkout transaction, the order ledger, and
//! the account directory, as a typed service layer over sea-orm. The
//! presentation layer, identity provider, and telemetry sink are external
//! collaborators: pages call into the services here, authenticated identities
//! arrive as [`auth::Actor`] values, and observability subscribes to the
//! domain events in [`events`].
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod logging;
pub mod migrator;
pub mod seed;
pub mod services;

use sea_orm::DatabaseConnection;
use std::sync::Arc;

use crate::{
    config::AppConfig,
    errors::ServiceError,
    events::EventSender,
    services::{
        AccountService, CartService, CatalogService, CheckoutService, OrderService, ReportsService,
    },
};

/// The wired-up storefront: every service sharing one pool, one event
/// channel, and one configuration.
#[derive(Clone)]
pub struct Storefront {
    pub db: Arc<DatabaseConnection>,
    pub config: Arc<AppConfig>,
    pub event_sender: Arc<EventSender>,
    pub accounts: AccountService,
    pub catalog: CatalogService,
    pub cart: CartService,
    pub checkout: CheckoutService,
    pub orders: OrderService,
    pub reports: ReportsService,
}

impl Storefront {
    /// Wires the services over an established connection.
    pub fn new(db: DatabaseConnection, config: AppConfig, event_sender: EventSender) -> Self {
        let db = Arc::new(db);
        let config = Arc::new(config);
        let event_sender = Arc::new(event_sender);

        Self {
            accounts: AccountService::new(db.clone(), event_sender.clone()),
            catalog: CatalogService::new(db.clone(), event_sender.clone()),
            cart: CartService::new(db.clone(), event_sender.clone()),
            checkout: CheckoutService::new(db.clone(), event_sender.clone(), config.clone()),
            orders: OrderService::new(db.clone(), event_sender.clone()),
            reports: ReportsService::new(db.clone()),
            db,
            config,
            event_sender,
        }
    }

    /// Connects, optionally migrates, and wires the services from
    /// configuration in one call.
    pub async fn connect(
        config: AppConfig,
        event_sender: EventSender,
    ) -> Result<Self, ServiceError> {
        let db = db::establish_connection_from_app_config(&config).await?;

        if config.auto_migrate {
            migrator::run_migrations(&db).await?;
        }

        Ok(Self::new(db, config, event_sender))
    }
}
