#![allow(dead_code)]

use rust_decimal::Decimal;
use smallcart_core::{
    auth::Actor,
    config::AppConfig,
    db,
    entities::{product, user},
    events,
    migrator,
    services::{accounts::RegisterInput, catalog::CreateProductInput},
    Storefront,
};

/// Test harness: a fully wired storefront over a fresh in-memory SQLite
/// database, with the event loop running.
pub struct TestApp {
    pub store: Storefront,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    /// A storefront with default configuration (permissive stock policy).
    pub async fn new() -> Self {
        Self::with_config(AppConfig::new("sqlite::memory:", "test")).await
    }

    /// A storefront with the strict checkout stock policy enabled.
    pub async fn with_stock_enforcement() -> Self {
        let mut cfg = AppConfig::new("sqlite::memory:", "test");
        cfg.enforce_stock_levels = true;
        Self::with_config(cfg).await
    }

    pub async fn with_config(mut cfg: AppConfig) -> Self {
        // A single connection keeps every query on the same in-memory
        // database.
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        migrator::run_migrations(&pool)
            .await
            .expect("failed to run migrations");

        let (event_sender, rx) = events::channel();
        let event_task = events::spawn_event_loop(rx);

        Self {
            store: Storefront::new(pool, cfg, event_sender),
            _event_task: event_task,
        }
    }

    /// Registers a customer account, returning the record and its actor.
    pub async fn register_customer(&self, name: &str) -> (user::Model, Actor) {
        let user = self
            .store
            .accounts
            .register(RegisterInput::customer(
                name,
                format!("{name}@example.com"),
                "hunter22",
            ))
            .await
            .expect("failed to register customer");
        let actor = Actor::from(&user);
        (user, actor)
    }

    /// Registers an admin account and returns its actor.
    pub async fn register_admin(&self) -> Actor {
        let user = self
            .store
            .accounts
            .register(RegisterInput::admin(
                "admin",
                "admin@example.com",
                "change-me-now",
            ))
            .await
            .expect("failed to register admin");
        Actor::from(&user)
    }

    /// Creates a catalog product through the service layer.
    pub async fn create_product(
        &self,
        admin: &Actor,
        name: &str,
        price: Decimal,
        stock: i32,
    ) -> product::Model {
        self.store
            .catalog
            .create_product(
                admin,
                CreateProductInput {
                    name: name.to_string(),
                    description: format!("{name} description"),
                    price,
                    stock,
                    image_url: None,
                },
            )
            .await
            .expect("failed to create test product")
    }
}
