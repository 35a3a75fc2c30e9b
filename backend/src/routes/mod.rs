//! Route definitions for the charcoal distribution API

use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};

use crate::{handlers, middleware::auth_middleware, AppState};

/// Create API routes
pub fn api_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        // Health check (public)
        .route("/health", get(handlers::health::health_check))
        // Auth routes (public)
        .route("/auth/login", post(handlers::auth::login))
        // Protected routes - accounts
        .nest("/users", user_routes(state))
        // Protected routes - catalog
        .nest("/warehouses", warehouse_routes(state))
        .nest("/clients", client_routes(state))
        .nest("/suppliers", supplier_routes(state))
        .nest("/products", product_routes(state))
        .nest("/presentations", presentation_routes(state))
        .nest("/lots", lot_routes(state))
        .nest("/waste", waste_routes(state))
        // Protected routes - stock
        .nest("/inventory", inventory_routes(state))
        .nest("/movements", movement_routes(state))
        .nest("/transfers", transfer_routes(state))
        // Protected routes - sales and money
        .nest("/sales", sale_routes(state))
        .nest("/payments", payment_routes(state))
        .nest("/orders", order_routes(state))
        .nest("/bank-deposits", deposit_routes(state))
        .nest("/expenses", expense_routes(state))
}

/// User management routes (protected, admin only)
fn user_routes(state: &AppState) -> Router<AppState> {
    use handlers::user::*;
    Router::new()
        .route("/", get(list_users).post(create_user))
        .route(
            "/:user_id",
            get(get_user).put(update_user).delete(delete_user),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
}

/// Warehouse routes (protected)
fn warehouse_routes(state: &AppState) -> Router<AppState> {
    use handlers::catalog::*;
    Router::new()
        .route("/", get(list_warehouses).post(create_warehouse))
        .route("/:warehouse_id", get(get_warehouse))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
}

/// Client routes (protected)
fn client_routes(state: &AppState) -> Router<AppState> {
    use handlers::catalog::*;
    Router::new()
        .route("/", get(list_clients).post(create_client))
        .route("/:client_id", get(get_client).put(update_client))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
}

/// Supplier routes (protected)
fn supplier_routes(state: &AppState) -> Router<AppState> {
    use handlers::catalog::*;
    Router::new()
        .route("/", get(list_suppliers).post(create_supplier))
        .route(
            "/:supplier_id",
            get(get_supplier).put(update_supplier).delete(delete_supplier),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
}

/// Product routes (protected)
fn product_routes(state: &AppState) -> Router<AppState> {
    use handlers::catalog::*;
    Router::new()
        .route("/", get(list_products).post(create_product))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
}

/// Presentation routes (protected)
fn presentation_routes(state: &AppState) -> Router<AppState> {
    use handlers::catalog::*;
    Router::new()
        .route("/", get(list_presentations).post(create_presentation))
        .route(
            "/:presentation_id",
            get(get_presentation).put(update_presentation),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
}

/// Lot routes (protected)
fn lot_routes(state: &AppState) -> Router<AppState> {
    use handlers::catalog::*;
    Router::new()
        .route("/", get(list_lots).post(create_lot))
        .route("/:lot_id", get(get_lot))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
}

/// Waste routes (protected)
fn waste_routes(state: &AppState) -> Router<AppState> {
    use handlers::waste::*;
    Router::new()
        .route("/", get(list_waste).post(record_waste))
        .route("/:waste_id", delete(delete_waste))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
}

/// Inventory record routes (protected)
fn inventory_routes(state: &AppState) -> Router<AppState> {
    use handlers::inventory::*;
    Router::new()
        .route("/", get(list_records).post(initialize_record))
        .route("/:record_id", put(update_record))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
}

/// Manual movement routes (protected)
fn movement_routes(state: &AppState) -> Router<AppState> {
    use handlers::inventory::*;
    Router::new()
        .route("/", get(list_movements).post(create_movement))
        .route("/:movement_id", delete(reverse_movement))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
}

/// Transfer routes (protected)
fn transfer_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/", post(handlers::transfer::create_transfer))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
}

/// Sale routes (protected)
fn sale_routes(state: &AppState) -> Router<AppState> {
    use handlers::sale::*;
    Router::new()
        .route("/", get(list_sales).post(create_sale))
        .route(
            "/:sale_id",
            get(get_sale).put(update_sale).delete(delete_sale),
        )
        .route(
            "/:sale_id/payments",
            get(handlers::payment::list_payments).post(handlers::payment::add_payment),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
}

/// Payment routes (protected)
fn payment_routes(state: &AppState) -> Router<AppState> {
    use handlers::payment::*;
    Router::new()
        .route("/batch", post(batch_create))
        .route("/deposit", post(register_deposit))
        .route("/:payment_id", put(update_payment).delete(delete_payment))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
}

/// Order routes (protected)
fn order_routes(state: &AppState) -> Router<AppState> {
    use handlers::order::*;
    Router::new()
        .route("/", get(list_orders).post(create_order))
        .route(
            "/:order_id",
            get(get_order).put(update_order).delete(delete_order),
        )
        .route("/:order_id/cancel", post(cancel_order))
        .route("/:order_id/convert", post(convert_order))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
}

/// Bank deposit routes (protected)
fn deposit_routes(state: &AppState) -> Router<AppState> {
    use handlers::deposit::*;
    Router::new()
        .route("/", get(list_deposits).post(create_deposit))
        .route(
            "/:deposit_id",
            get(get_deposit).put(update_deposit).delete(delete_deposit),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
}

/// Expense routes (protected)
fn expense_routes(state: &AppState) -> Router<AppState> {
    use handlers::expense::*;
    Router::new()
        .route("/", get(list_expenses).post(create_expense))
        .route("/:expense_id", put(update_expense).delete(delete_expense))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
}
