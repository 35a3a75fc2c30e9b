//! Catalog: warehouses, clients, suppliers, products, presentations and lots

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use shared::money::ensure_money_scale;
use shared::{
    Client, Lot, PaginatedResponse, Pagination, Presentation, PresentationKind, Principal, Product,
    Supplier, Warehouse,
};
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::services::access::{ensure_warehouse_scope, require_role, ADMIN_ONLY, MANAGERS};

const CLIENT_COLUMNS: &str = "id, name, phone, address, purchase_frequency_days, \
     last_purchase_at, next_purchase_at, created_at";

const PRESENTATION_COLUMNS: &str =
    "id, product_id, name, kind, net_weight_kg, sale_price, active, created_at";

const SUPPLIER_COLUMNS: &str = "id, name, phone, address, created_at";

const LOT_COLUMNS: &str = "id, product_id, supplier_id, wet_weight_kg, dry_weight_kg, \
     available_quantity_kg, received_at, created_at";

#[derive(Clone)]
pub struct CatalogService {
    db: PgPool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateWarehouseInput {
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    pub address: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateClientInput {
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    #[validate(length(max = 30))]
    pub phone: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateClientInput {
    #[validate(length(min = 1, max = 120))]
    pub name: Option<String>,
    #[validate(length(max = 30))]
    pub phone: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ClientFilter {
    pub name: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateSupplierInput {
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    #[validate(length(max = 30))]
    pub phone: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateSupplierInput {
    #[validate(length(min = 1, max = 120))]
    pub name: Option<String>,
    #[validate(length(max = 30))]
    pub phone: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateProductInput {
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreatePresentationInput {
    pub product_id: Uuid,
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    pub kind: PresentationKind,
    #[serde(with = "rust_decimal::serde::str")]
    pub net_weight_kg: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub sale_price: Decimal,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdatePresentationInput {
    #[validate(length(min = 1, max = 120))]
    pub name: Option<String>,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub sale_price: Option<Decimal>,
    pub active: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PresentationFilter {
    pub product_id: Option<Uuid>,
    pub active: Option<bool>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateLotInput {
    pub product_id: Uuid,
    pub supplier_id: Option<Uuid>,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub wet_weight_kg: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub dry_weight_kg: Option<Decimal>,
    /// Defaults to the dry weight
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub available_quantity_kg: Option<Decimal>,
    pub received_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LotFilter {
    pub product_id: Option<Uuid>,
    pub supplier_id: Option<Uuid>,
    /// Only lots with kilograms left
    #[serde(default)]
    pub available: bool,
}

fn non_negative(field: &'static str, value: Option<Decimal>) -> AppResult<()> {
    match value {
        Some(v) if v < Decimal::ZERO => Err(AppError::validation(field, "Must not be negative")),
        _ => Ok(()),
    }
}

fn validate_price(value: Decimal) -> AppResult<Decimal> {
    if value < Decimal::ZERO {
        return Err(AppError::validation("sale_price", "Price must not be negative"));
    }
    Ok(ensure_money_scale("sale_price", value)?)
}

impl CatalogService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    // ========================================================================
    // Warehouses
    // ========================================================================

    pub async fn create_warehouse(
        &self,
        actor: &Principal,
        input: CreateWarehouseInput,
    ) -> AppResult<Warehouse> {
        require_role(actor, ADMIN_ONLY)?;
        input.validate()?;

        let warehouse = sqlx::query_as::<_, Warehouse>(
            r#"
            INSERT INTO warehouses (name, address)
            VALUES ($1, $2)
            RETURNING id, name, address, created_at
            "#,
        )
        .bind(input.name.trim())
        .bind(&input.address)
        .fetch_one(&self.db)
        .await?;

        tracing::info!(warehouse_id = %warehouse.id, name = %warehouse.name, "Warehouse created");
        Ok(warehouse)
    }

    /// Admins see every warehouse, everyone else only their own
    pub async fn list_warehouses(&self, actor: &Principal) -> AppResult<Vec<Warehouse>> {
        let warehouses = sqlx::query_as::<_, Warehouse>(
            r#"
            SELECT id, name, address, created_at
            FROM warehouses
            WHERE ($1::uuid IS NULL OR id = $1)
            ORDER BY name
            "#,
        )
        .bind(actor.warehouse_filter(None))
        .fetch_all(&self.db)
        .await?;
        Ok(warehouses)
    }

    pub async fn get_warehouse(&self, actor: &Principal, id: Uuid) -> AppResult<Warehouse> {
        ensure_warehouse_scope(actor, id)?;
        sqlx::query_as::<_, Warehouse>(
            "SELECT id, name, address, created_at FROM warehouses WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Warehouse".to_string()))
    }

    // ========================================================================
    // Clients
    // ========================================================================

    pub async fn create_client(&self, input: CreateClientInput) -> AppResult<Client> {
        input.validate()?;
        let client = sqlx::query_as::<_, Client>(&format!(
            r#"
            INSERT INTO clients (name, phone, address)
            VALUES ($1, $2, $3)
            RETURNING {CLIENT_COLUMNS}
            "#
        ))
        .bind(input.name.trim())
        .bind(&input.phone)
        .bind(&input.address)
        .fetch_one(&self.db)
        .await?;
        Ok(client)
    }

    pub async fn list_clients(
        &self,
        filter: ClientFilter,
        pagination: Pagination,
    ) -> AppResult<PaginatedResponse<Client>> {
        let pattern = filter
            .name
            .map(|name| format!("%{}%", name.trim()))
            .filter(|p| p.len() > 2);

        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM clients WHERE ($1::text IS NULL OR name ILIKE $1)",
        )
        .bind(&pattern)
        .fetch_one(&self.db)
        .await?;

        let clients = sqlx::query_as::<_, Client>(&format!(
            r#"
            SELECT {CLIENT_COLUMNS} FROM clients
            WHERE ($1::text IS NULL OR name ILIKE $1)
            ORDER BY name
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(&pattern)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.db)
        .await?;

        Ok(PaginatedResponse::new(clients, &pagination, total.max(0) as u64))
    }

    pub async fn get_client(&self, id: Uuid) -> AppResult<Client> {
        sqlx::query_as::<_, Client>(&format!("SELECT {CLIENT_COLUMNS} FROM clients WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Client".to_string()))
    }

    /// Update contact fields; the purchase projection is maintained by sales
    pub async fn update_client(&self, id: Uuid, input: UpdateClientInput) -> AppResult<Client> {
        input.validate()?;
        let existing = self.get_client(id).await?;

        let client = sqlx::query_as::<_, Client>(&format!(
            r#"
            UPDATE clients SET name = $2, phone = $3, address = $4
            WHERE id = $1
            RETURNING {CLIENT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(input.name.as_deref().map(str::trim).unwrap_or(&existing.name))
        .bind(input.phone.or(existing.phone))
        .bind(input.address.or(existing.address))
        .fetch_one(&self.db)
        .await?;
        Ok(client)
    }

    // ========================================================================
    // Suppliers
    // ========================================================================

    pub async fn create_supplier(
        &self,
        actor: &Principal,
        input: CreateSupplierInput,
    ) -> AppResult<Supplier> {
        require_role(actor, MANAGERS)?;
        input.validate()?;
        let name = input.name.trim();
        self.ensure_unique_supplier(name, None).await?;

        let supplier = sqlx::query_as::<_, Supplier>(&format!(
            r#"
            INSERT INTO suppliers (name, phone, address)
            VALUES ($1, $2, $3)
            RETURNING {SUPPLIER_COLUMNS}
            "#
        ))
        .bind(name)
        .bind(&input.phone)
        .bind(&input.address)
        .fetch_one(&self.db)
        .await?;

        tracing::info!(supplier_id = %supplier.id, name = %supplier.name, "Supplier created");
        Ok(supplier)
    }

    pub async fn list_suppliers(&self) -> AppResult<Vec<Supplier>> {
        let suppliers = sqlx::query_as::<_, Supplier>(&format!(
            "SELECT {SUPPLIER_COLUMNS} FROM suppliers ORDER BY name"
        ))
        .fetch_all(&self.db)
        .await?;
        Ok(suppliers)
    }

    pub async fn get_supplier(&self, id: Uuid) -> AppResult<Supplier> {
        sqlx::query_as::<_, Supplier>(&format!(
            "SELECT {SUPPLIER_COLUMNS} FROM suppliers WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Supplier".to_string()))
    }

    pub async fn update_supplier(
        &self,
        actor: &Principal,
        id: Uuid,
        input: UpdateSupplierInput,
    ) -> AppResult<Supplier> {
        require_role(actor, MANAGERS)?;
        input.validate()?;
        let existing = self.get_supplier(id).await?;

        let name = input
            .name
            .as_deref()
            .map(str::trim)
            .unwrap_or(&existing.name)
            .to_string();
        if name != existing.name {
            self.ensure_unique_supplier(&name, Some(id)).await?;
        }

        let supplier = sqlx::query_as::<_, Supplier>(&format!(
            r#"
            UPDATE suppliers SET name = $2, phone = $3, address = $4
            WHERE id = $1
            RETURNING {SUPPLIER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&name)
        .bind(input.phone.or(existing.phone))
        .bind(input.address.or(existing.address))
        .fetch_one(&self.db)
        .await?;
        Ok(supplier)
    }

    /// Lots received from the supplier keep their history with no supplier
    pub async fn delete_supplier(&self, actor: &Principal, id: Uuid) -> AppResult<()> {
        require_role(actor, ADMIN_ONLY)?;
        let deleted = sqlx::query("DELETE FROM suppliers WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?
            .rows_affected();
        if deleted == 0 {
            return Err(AppError::NotFound("Supplier".to_string()));
        }

        tracing::info!(supplier_id = %id, user_id = %actor.user_id, "Supplier deleted");
        Ok(())
    }

    async fn ensure_unique_supplier(&self, name: &str, except: Option<Uuid>) -> AppResult<()> {
        let taken = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM suppliers
                WHERE LOWER(name) = LOWER($1) AND ($2::uuid IS NULL OR id <> $2)
            )
            "#,
        )
        .bind(name)
        .bind(except)
        .fetch_one(&self.db)
        .await?;

        if taken {
            return Err(AppError::Conflict {
                resource: "supplier".to_string(),
                message: format!("A supplier named '{}' already exists", name),
            });
        }
        Ok(())
    }

    // ========================================================================
    // Products and presentations
    // ========================================================================

    pub async fn create_product(
        &self,
        actor: &Principal,
        input: CreateProductInput,
    ) -> AppResult<Product> {
        require_role(actor, ADMIN_ONLY)?;
        input.validate()?;
        let product = sqlx::query_as::<_, Product>(
            r#"
            INSERT INTO products (name, description)
            VALUES ($1, $2)
            RETURNING id, name, description, created_at
            "#,
        )
        .bind(input.name.trim())
        .bind(&input.description)
        .fetch_one(&self.db)
        .await?;
        Ok(product)
    }

    pub async fn list_products(&self) -> AppResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(
            "SELECT id, name, description, created_at FROM products ORDER BY name",
        )
        .fetch_all(&self.db)
        .await?;
        Ok(products)
    }

    pub async fn create_presentation(
        &self,
        actor: &Principal,
        input: CreatePresentationInput,
    ) -> AppResult<Presentation> {
        require_role(actor, ADMIN_ONLY)?;
        input.validate()?;
        if input.net_weight_kg <= Decimal::ZERO {
            return Err(AppError::validation(
                "net_weight_kg",
                "Net weight must be greater than zero",
            ));
        }
        let sale_price = validate_price(input.sale_price)?;
        let name = input.name.trim();

        let product_exists =
            sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM products WHERE id = $1)")
                .bind(input.product_id)
                .fetch_one(&self.db)
                .await?;
        if !product_exists {
            return Err(AppError::NotFound("Product".to_string()));
        }
        self.ensure_unique_presentation(input.product_id, name, None)
            .await?;

        let presentation = sqlx::query_as::<_, Presentation>(&format!(
            r#"
            INSERT INTO presentations (product_id, name, kind, net_weight_kg, sale_price)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {PRESENTATION_COLUMNS}
            "#
        ))
        .bind(input.product_id)
        .bind(name)
        .bind(input.kind)
        .bind(input.net_weight_kg)
        .bind(sale_price)
        .fetch_one(&self.db)
        .await?;

        tracing::info!(presentation_id = %presentation.id, name = %presentation.name, "Presentation created");
        Ok(presentation)
    }

    pub async fn list_presentations(
        &self,
        filter: PresentationFilter,
        pagination: Pagination,
    ) -> AppResult<PaginatedResponse<Presentation>> {
        const WHERE: &str = r#"
            WHERE ($1::uuid IS NULL OR product_id = $1)
              AND ($2::boolean IS NULL OR active = $2)
        "#;

        let total =
            sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM presentations {WHERE}"))
                .bind(filter.product_id)
                .bind(filter.active)
                .fetch_one(&self.db)
                .await?;

        let presentations = sqlx::query_as::<_, Presentation>(&format!(
            r#"
            SELECT {PRESENTATION_COLUMNS} FROM presentations {WHERE}
            ORDER BY name
            LIMIT $3 OFFSET $4
            "#
        ))
        .bind(filter.product_id)
        .bind(filter.active)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.db)
        .await?;

        Ok(PaginatedResponse::new(
            presentations,
            &pagination,
            total.max(0) as u64,
        ))
    }

    pub async fn get_presentation(&self, id: Uuid) -> AppResult<Presentation> {
        sqlx::query_as::<_, Presentation>(&format!(
            "SELECT {PRESENTATION_COLUMNS} FROM presentations WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Presentation".to_string()))
    }

    /// Rename, reprice or (de)activate a presentation. Existing sales keep
    /// the price they were made at.
    pub async fn update_presentation(
        &self,
        actor: &Principal,
        id: Uuid,
        input: UpdatePresentationInput,
    ) -> AppResult<Presentation> {
        require_role(actor, ADMIN_ONLY)?;
        input.validate()?;
        let existing = self.get_presentation(id).await?;

        let name = input
            .name
            .as_deref()
            .map(str::trim)
            .unwrap_or(&existing.name)
            .to_string();
        if name != existing.name {
            self.ensure_unique_presentation(existing.product_id, &name, Some(id))
                .await?;
        }
        let sale_price = match input.sale_price {
            Some(price) => validate_price(price)?,
            None => existing.sale_price,
        };

        let presentation = sqlx::query_as::<_, Presentation>(&format!(
            r#"
            UPDATE presentations SET name = $2, sale_price = $3, active = $4
            WHERE id = $1
            RETURNING {PRESENTATION_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&name)
        .bind(sale_price)
        .bind(input.active.unwrap_or(existing.active))
        .fetch_one(&self.db)
        .await?;
        Ok(presentation)
    }

    async fn ensure_unique_presentation(
        &self,
        product_id: Uuid,
        name: &str,
        except: Option<Uuid>,
    ) -> AppResult<()> {
        let taken = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM presentations
                WHERE product_id = $1 AND name = $2 AND ($3::uuid IS NULL OR id <> $3)
            )
            "#,
        )
        .bind(product_id)
        .bind(name)
        .bind(except)
        .fetch_one(&self.db)
        .await?;

        if taken {
            return Err(AppError::Conflict {
                resource: "presentation".to_string(),
                message: format!("A presentation named '{}' already exists for this product", name),
            });
        }
        Ok(())
    }

    // ========================================================================
    // Lots
    // ========================================================================

    pub async fn create_lot(&self, actor: &Principal, input: CreateLotInput) -> AppResult<Lot> {
        require_role(actor, MANAGERS)?;
        input.validate()?;
        non_negative("wet_weight_kg", input.wet_weight_kg)?;
        non_negative("dry_weight_kg", input.dry_weight_kg)?;
        non_negative("available_quantity_kg", input.available_quantity_kg)?;

        let available = input
            .available_quantity_kg
            .or(input.dry_weight_kg)
            .ok_or_else(|| {
                AppError::validation(
                    "available_quantity_kg",
                    "Either available_quantity_kg or dry_weight_kg is required",
                )
            })?;
        if let Some(supplier_id) = input.supplier_id {
            self.get_supplier(supplier_id).await?;
        }

        let lot = sqlx::query_as::<_, Lot>(&format!(
            r#"
            INSERT INTO lots (product_id, supplier_id, wet_weight_kg, dry_weight_kg,
                              available_quantity_kg, received_at)
            VALUES ($1, $2, $3, $4, $5, COALESCE($6, NOW()))
            RETURNING {LOT_COLUMNS}
            "#
        ))
        .bind(input.product_id)
        .bind(input.supplier_id)
        .bind(input.wet_weight_kg)
        .bind(input.dry_weight_kg)
        .bind(available)
        .bind(input.received_at)
        .fetch_one(&self.db)
        .await?;

        tracing::info!(lot_id = %lot.id, available_kg = %lot.available_quantity_kg, "Lot received");
        Ok(lot)
    }

    pub async fn list_lots(
        &self,
        filter: LotFilter,
        pagination: Pagination,
    ) -> AppResult<PaginatedResponse<Lot>> {
        const WHERE: &str = r#"
            WHERE ($1::uuid IS NULL OR product_id = $1)
              AND (NOT $2 OR available_quantity_kg > 0)
              AND ($3::uuid IS NULL OR supplier_id = $3)
        "#;

        let total = sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM lots {WHERE}"))
            .bind(filter.product_id)
            .bind(filter.available)
            .bind(filter.supplier_id)
            .fetch_one(&self.db)
            .await?;

        let lots = sqlx::query_as::<_, Lot>(&format!(
            r#"
            SELECT {LOT_COLUMNS} FROM lots {WHERE}
            ORDER BY received_at DESC
            LIMIT $4 OFFSET $5
            "#
        ))
        .bind(filter.product_id)
        .bind(filter.available)
        .bind(filter.supplier_id)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.db)
        .await?;

        Ok(PaginatedResponse::new(lots, &pagination, total.max(0) as u64))
    }

    pub async fn get_lot(&self, id: Uuid) -> AppResult<Lot> {
        sqlx::query_as::<_, Lot>(&format!("SELECT {LOT_COLUMNS} FROM lots WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Lot".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn blank_names_fail_validation() {
        let input = CreateWarehouseInput {
            name: String::new(),
            address: None,
        };
        let err = AppError::from(input.validate().unwrap_err());
        assert!(matches!(err, AppError::Validation { ref field, .. } if field == "name"));
    }

    #[test]
    fn supplier_phone_is_bounded() {
        let input = CreateSupplierInput {
            name: "Carbonera del Norte".to_string(),
            phone: Some("9".repeat(31)),
            address: None,
        };
        let err = AppError::from(input.validate().unwrap_err());
        assert!(matches!(err, AppError::Validation { ref field, .. } if field == "phone"));
    }

    #[test]
    fn prices_are_non_negative_cents() {
        assert!(validate_price(Decimal::from_str("12.50").unwrap()).is_ok());
        assert!(validate_price(Decimal::from_str("-1").unwrap()).is_err());
        assert!(validate_price(Decimal::from_str("1.005").unwrap()).is_err());
    }
}
