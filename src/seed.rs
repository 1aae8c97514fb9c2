//! First-run bootstrap: initial admin account and demo catalog.

use crate::{
    auth::Actor,
    errors::ServiceError,
    services::{
        accounts::RegisterInput, catalog::CreateProductInput, AccountService, CatalogService,
    },
};
use rust_decimal_macros::dec;
use tracing::info;

/// Creates the initial admin account unless one already exists.
///
/// Returns the admin actor either way. Idempotent.
pub async fn ensure_admin_account(
    accounts: &AccountService,
    username: &str,
    email: &str,
    password: &str,
) -> Result<Actor, ServiceError> {
    if let Some(admin) = accounts.find_admin().await? {
        return Ok(Actor::from(&admin));
    }

    let admin = accounts
        .register(RegisterInput::admin(username, email, password))
        .await?;

    info!("Default admin account created: {}", admin.email);
    Ok(Actor::from(&admin))
}

/// Seeds the demo catalog when it is empty. Idempotent.
pub async fn seed_demo_catalog(
    catalog: &CatalogService,
    actor: &Actor,
) -> Result<(), ServiceError> {
    if catalog.count_products().await? > 0 {
        return Ok(());
    }

    let demo_products = [
        CreateProductInput {
            name: "Laptop".to_string(),
            description: "High-performance laptop".to_string(),
            price: dec!(999.99),
            stock: 10,
            image_url: Some("https://via.placeholder.com/300x200?text=Laptop".to_string()),
        },
        CreateProductInput {
            name: "Smartphone".to_string(),
            description: "Latest smartphone".to_string(),
            price: dec!(699.99),
            stock: 15,
            image_url: Some("https://via.placeholder.com/300x200?text=Smartphone".to_string()),
        },
        CreateProductInput {
            name: "Headphones".to_string(),
            description: "Wireless noise-cancelling headphones".to_string(),
            price: dec!(199.99),
            stock: 25,
            image_url: Some("https://via.placeholder.com/300x200?text=Headphones".to_string()),
        },
        CreateProductInput {
            name: "Tablet".to_string(),
            description: "10-inch tablet with stylus".to_string(),
            price: dec!(449.99),
            stock: 20,
            image_url: Some("https://via.placeholder.com/300x200?text=Tablet".to_string()),
        },
    ];

    let count = demo_products.len();
    for input in demo_products {
        catalog.create_product(actor, input).await?;
    }

    info!("Seeded {} demo products", count);
    Ok(())
}
