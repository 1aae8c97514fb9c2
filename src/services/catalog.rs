use crate::{
    auth::Actor,
    entities::{product, Product},
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, DatabaseConnection, EntityTrait, ModelTrait, PaginatorTrait, Set,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::{Validate, ValidationError};

/// Catalog service: admin-mutated, read by everyone.
#[derive(Clone)]
pub struct CatalogService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl CatalogService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Creates a new product. Admin only.
    ///
    /// Invalid input (empty name, negative price or stock) is rejected with
    /// `ValidationError`, never coerced. Publishes `ProductCreated`.
    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_product(
        &self,
        actor: &Actor,
        input: CreateProductInput,
    ) -> Result<product::Model, ServiceError> {
        actor.ensure_admin()?;
        input.validate()?;

        let product_id = Uuid::new_v4();
        let now = Utc::now();

        let product = product::ActiveModel {
            id: Set(product_id),
            name: Set(input.name.clone()),
            description: Set(input.description.clone()),
            price: Set(input.price),
            stock: Set(input.stock),
            image_url: Set(input.image_url.clone()),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let product = product.insert(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::ProductCreated(product_id))
            .await;

        info!("Created product: {} ({})", product.name, product_id);
        Ok(product)
    }

    /// Updates editable fields of an existing product. Admin only.
    #[instrument(skip(self, input))]
    pub async fn update_product(
        &self,
        actor: &Actor,
        product_id: Uuid,
        input: UpdateProductInput,
    ) -> Result<product::Model, ServiceError> {
        actor.ensure_admin()?;
        input.validate()?;

        let product = self.get_product(product_id).await?;
        let mut active: product::ActiveModel = product.into();

        if let Some(name) = input.name {
            active.name = Set(name);
        }
        if let Some(description) = input.description {
            active.description = Set(description);
        }
        if let Some(price) = input.price {
            active.price = Set(price);
        }
        if let Some(stock) = input.stock {
            active.stock = Set(stock);
        }
        if let Some(image_url) = input.image_url {
            active.image_url = Set(Some(image_url));
        }
        active.updated_at = Set(Utc::now());

        let product = active.update(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::ProductUpdated(product_id))
            .await;

        info!("Updated product: {}", product_id);
        Ok(product)
    }

    /// Removes a product from the catalog. Admin only.
    ///
    /// Cart lines holding the product go with it; historical order items
    /// survive with their snapshots and a nulled product reference.
    #[instrument(skip(self))]
    pub async fn delete_product(
        &self,
        actor: &Actor,
        product_id: Uuid,
    ) -> Result<(), ServiceError> {
        actor.ensure_admin()?;

        let product = self.get_product(product_id).await?;
        product.delete(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::ProductDeleted(product_id))
            .await;

        info!("Deleted product: {}", product_id);
        Ok(())
    }

    /// Looks up a single product.
    pub async fn get_product(&self, product_id: Uuid) -> Result<product::Model, ServiceError> {
        Product::find_by_id(product_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))
    }

    /// The full catalog. No ordering guarantee.
    pub async fn list_products(&self) -> Result<Vec<product::Model>, ServiceError> {
        Ok(Product::find().all(&*self.db).await?)
    }

    pub async fn count_products(&self) -> Result<u64, ServiceError> {
        Ok(Product::find().count(&*self.db).await?)
    }
}

fn validate_price(price: &Decimal) -> Result<(), ValidationError> {
    if price.is_sign_negative() {
        return Err(ValidationError::new("negative_price"));
    }
    Ok(())
}

/// Input for creating a product
#[derive(Debug, Deserialize, Validate)]
pub struct CreateProductInput {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[validate(custom = "validate_price")]
    pub price: Decimal,
    #[validate(range(min = 0))]
    pub stock: i32,
    #[serde(default)]
    pub image_url: Option<String>,
}

/// Partial update of a product's editable fields
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateProductInput {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    pub description: Option<String>,
    #[validate(custom = "validate_price")]
    pub price: Option<Decimal>,
    #[validate(range(min = 0))]
    pub stock: Option<i32>,
    pub image_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    fn input(name: &str, price: Decimal, stock: i32) -> CreateProductInput {
        CreateProductInput {
            name: name.to_string(),
            description: "desc".to_string(),
            price,
            stock,
            image_url: None,
        }
    }

    #[rstest]
    #[case::regular("Laptop", dec!(999.99), 10)]
    #[case::free_and_out_of_stock("Free sample", Decimal::ZERO, 0)]
    fn accepts_well_formed_products(
        #[case] name: &str,
        #[case] price: Decimal,
        #[case] stock: i32,
    ) {
        assert!(input(name, price, stock).validate().is_ok());
    }

    #[rstest]
    #[case::empty_name("", dec!(10.00), 1)]
    #[case::negative_price("Laptop", dec!(-0.01), 1)]
    #[case::negative_stock("Laptop", dec!(10.00), -1)]
    fn rejects_invalid_products(#[case] name: &str, #[case] price: Decimal, #[case] stock: i32) {
        assert!(input(name, price, stock).validate().is_err());
    }

    #[test]
    fn partial_update_validates_present_fields_only() {
        let empty = UpdateProductInput::default();
        assert!(empty.validate().is_ok());

        let bad_price = UpdateProductInput {
            price: Some(dec!(-5)),
            ..Default::default()
        };
        assert!(bad_price.validate().is_err());

        let stock_only = UpdateProductInput {
            stock: Some(42),
            ..Default::default()
        };
        assert!(stock_only.validate().is_ok());
    }
}
