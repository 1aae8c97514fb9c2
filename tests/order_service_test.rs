mod common;

use assert_matches::assert_matches;
use common::TestApp;
use rust_decimal_macros::dec;
use sea_orm::EntityTrait;
use smallcart_core::{
    entities::OrderItem,
    errors::ServiceError,
    services::orders::{CreateManualOrderInput, UpdateOrderInput},
};
use std::time::Duration;
use uuid::Uuid;

#[tokio::test]
async fn order_history_is_per_user_and_newest_first() {
    let app = TestApp::new().await;
    let admin = app.register_admin().await;
    let (alice, _) = app.register_customer("alice").await;
    let (bob, _) = app.register_customer("bob").await;
    let product = app.create_product(&admin, "Laptop", dec!(999.99), 10).await;

    app.store.cart.add_item(alice.id, product.id).await.unwrap();
    let first = app.store.checkout.place_order(alice.id).await.unwrap();

    tokio::time::sleep(Duration::from_millis(5)).await;

    app.store.cart.add_item(alice.id, product.id).await.unwrap();
    let second = app.store.checkout.place_order(alice.id).await.unwrap();

    app.store.cart.add_item(bob.id, product.id).await.unwrap();
    app.store.checkout.place_order(bob.id).await.unwrap();

    let history = app.store.orders.list_for_user(alice.id).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].id, second.id);
    assert_eq!(history[1].id, first.id);
}

#[tokio::test]
async fn status_update_is_visible_immediately_and_leaves_items_alone() {
    let app = TestApp::new().await;
    let admin = app.register_admin().await;
    let (user, _) = app.register_customer("alice").await;
    let product = app.create_product(&admin, "Laptop", dec!(999.99), 10).await;

    app.store.cart.add_item(user.id, product.id).await.unwrap();
    let order = app.store.checkout.place_order(user.id).await.unwrap();
    assert_eq!(order.status, "pending");

    app.store
        .orders
        .update_status(&admin, order.id, "shipped")
        .await
        .expect("status update should succeed");

    // The owner's view reflects the change immediately.
    let history = app.store.orders.list_for_user(user.id).await.unwrap();
    assert_eq!(history[0].status, "shipped");

    // No item was touched.
    let items = OrderItem::find().all(&*app.store.db).await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].quantity, 1);
    assert_eq!(items[0].price, dec!(999.99));
}

#[tokio::test]
async fn status_accepts_arbitrary_strings() {
    let app = TestApp::new().await;
    let admin = app.register_admin().await;
    let (user, _) = app.register_customer("alice").await;
    let product = app.create_product(&admin, "Laptop", dec!(999.99), 10).await;

    app.store.cart.add_item(user.id, product.id).await.unwrap();
    let order = app.store.checkout.place_order(user.id).await.unwrap();

    // The ledger stores whatever the admin wrote; the canonical lifecycle
    // is not enforced at this boundary.
    let order = app
        .store
        .orders
        .update_status(&admin, order.id, "awaiting-carrier-pickup")
        .await
        .unwrap();
    assert_eq!(order.status, "awaiting-carrier-pickup");
    assert!(order.canonical_status().is_none());

    let order = app
        .store
        .orders
        .update_status(&admin, order.id, "delivered")
        .await
        .unwrap();
    assert_eq!(
        order.canonical_status(),
        Some(smallcart_core::entities::OrderStatus::Delivered)
    );
}

#[tokio::test]
async fn admin_edit_can_override_the_total() {
    let app = TestApp::new().await;
    let admin = app.register_admin().await;
    let (user, _) = app.register_customer("alice").await;
    let product = app.create_product(&admin, "Laptop", dec!(999.99), 10).await;

    app.store.cart.add_item(user.id, product.id).await.unwrap();
    let order = app.store.checkout.place_order(user.id).await.unwrap();

    let order = app
        .store
        .orders
        .update_order(
            &admin,
            order.id,
            UpdateOrderInput {
                status: Some("processing".to_string()),
                total_amount: Some(dec!(899.99)),
            },
        )
        .await
        .expect("edit should succeed");

    // The override is stored as-is; items are not re-validated against it.
    assert_eq!(order.total_amount, dec!(899.99));
    assert_eq!(order.status, "processing");

    let items = OrderItem::find().all(&*app.store.db).await.unwrap();
    assert_eq!(items[0].price, dec!(999.99));
}

#[tokio::test]
async fn manual_orders_bypass_checkout() {
    let app = TestApp::new().await;
    let admin = app.register_admin().await;
    let (user, _) = app.register_customer("alice").await;

    let order = app
        .store
        .orders
        .create_manual(
            &admin,
            CreateManualOrderInput {
                user_id: user.id,
                total_amount: dec!(150.00),
                status: "processing".to_string(),
            },
        )
        .await
        .expect("manual creation should succeed");

    assert_eq!(order.user_id, user.id);
    assert_eq!(order.total_amount, dec!(150.00));
    assert_eq!(order.status, "processing");

    // No items, and it shows up in the owner's history.
    let detail = app
        .store
        .orders
        .get_order_with_items(&admin, order.id)
        .await
        .unwrap();
    assert!(detail.items.is_empty());
    assert_eq!(app.store.orders.list_for_user(user.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn manual_order_for_unknown_user_fails() {
    let app = TestApp::new().await;
    let admin = app.register_admin().await;

    let result = app
        .store
        .orders
        .create_manual(
            &admin,
            CreateManualOrderInput {
                user_id: Uuid::new_v4(),
                total_amount: dec!(1.00),
                status: "pending".to_string(),
            },
        )
        .await;
    assert_matches!(result, Err(ServiceError::NotFound(_)));
}

#[tokio::test]
async fn delete_order_removes_its_items_too() {
    let app = TestApp::new().await;
    let admin = app.register_admin().await;
    let (user, _) = app.register_customer("alice").await;
    let product = app.create_product(&admin, "Laptop", dec!(999.99), 10).await;

    app.store.cart.add_item(user.id, product.id).await.unwrap();
    let order = app.store.checkout.place_order(user.id).await.unwrap();

    app.store
        .orders
        .delete_order(&admin, order.id)
        .await
        .expect("delete should succeed");

    assert_matches!(
        app.store.orders.get_order(order.id).await,
        Err(ServiceError::NotFound(_))
    );
    assert!(OrderItem::find().all(&*app.store.db).await.unwrap().is_empty());
}

#[tokio::test]
async fn admin_operations_reject_customers() {
    let app = TestApp::new().await;
    let admin = app.register_admin().await;
    let (user, customer) = app.register_customer("alice").await;
    let product = app.create_product(&admin, "Laptop", dec!(999.99), 10).await;

    app.store.cart.add_item(user.id, product.id).await.unwrap();
    let order = app.store.checkout.place_order(user.id).await.unwrap();

    assert_matches!(
        app.store.orders.list_all(&customer).await,
        Err(ServiceError::Forbidden(_))
    );
    assert_matches!(
        app.store.orders.update_status(&customer, order.id, "shipped").await,
        Err(ServiceError::Forbidden(_))
    );
    assert_matches!(
        app.store.orders.get_order_with_items(&customer, order.id).await,
        Err(ServiceError::Forbidden(_))
    );
    assert_matches!(
        app.store.orders.delete_order(&customer, order.id).await,
        Err(ServiceError::Forbidden(_))
    );
    assert_matches!(
        app.store
            .orders
            .create_manual(
                &customer,
                CreateManualOrderInput {
                    user_id: user.id,
                    total_amount: dec!(1.00),
                    status: "pending".to_string(),
                },
            )
            .await,
        Err(ServiceError::Forbidden(_))
    );

    // The failed attempts changed nothing.
    assert_eq!(app.store.orders.list_for_user(user.id).await.unwrap().len(), 1);
    assert_eq!(
        app.store.orders.get_order(order.id).await.unwrap().status,
        "pending"
    );
}

#[tokio::test]
async fn list_all_sees_every_user_newest_first() {
    let app = TestApp::new().await;
    let admin = app.register_admin().await;
    let (alice, _) = app.register_customer("alice").await;
    let (bob, _) = app.register_customer("bob").await;
    let product = app.create_product(&admin, "Laptop", dec!(999.99), 10).await;

    app.store.cart.add_item(alice.id, product.id).await.unwrap();
    app.store.checkout.place_order(alice.id).await.unwrap();

    tokio::time::sleep(Duration::from_millis(5)).await;

    app.store.cart.add_item(bob.id, product.id).await.unwrap();
    let latest = app.store.checkout.place_order(bob.id).await.unwrap();

    let all = app.store.orders.list_all(&admin).await.unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].id, latest.id);
}

#[tokio::test]
async fn dashboard_aggregates_the_back_office_counts() {
    let app = TestApp::new().await;
    let admin = app.register_admin().await;
    let (alice, _) = app.register_customer("alice").await;
    let (_bob, _) = app.register_customer("bob").await;
    let product = app.create_product(&admin, "Laptop", dec!(999.99), 10).await;
    app.create_product(&admin, "Tablet", dec!(449.99), 20).await;

    app.store.cart.add_item(alice.id, product.id).await.unwrap();
    app.store.checkout.place_order(alice.id).await.unwrap();

    let summary = app.store.reports.dashboard(&admin).await.unwrap();
    assert_eq!(summary.total_products, 2);
    assert_eq!(summary.total_orders, 1);
    // The admin account is not a customer.
    assert_eq!(summary.total_customers, 2);
    assert_eq!(summary.recent_orders.len(), 1);

    let (_, customer) = app.register_customer("carol").await;
    assert_matches!(
        app.store.reports.dashboard(&customer).await,
        Err(ServiceError::Forbidden(_))
    );
}
