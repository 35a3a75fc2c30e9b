//! Operating expenses per warehouse

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use shared::money::{ensure_money_scale, ensure_positive};
use shared::{DateRange, Expense, ExpenseCategory, PaginatedResponse, Pagination, Principal};
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::services::access::{ensure_warehouse_scope, require_role, MANAGERS};

const EXPENSE_COLUMNS: &str =
    "id, warehouse_id, category, description, amount, expense_date, user_id, created_at";

#[derive(Clone)]
pub struct ExpenseService {
    db: PgPool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateExpenseInput {
    pub warehouse_id: Uuid,
    pub category: ExpenseCategory,
    #[validate(length(min = 1, max = 500))]
    pub description: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub amount: Decimal,
    pub expense_date: Option<NaiveDate>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateExpenseInput {
    pub category: Option<ExpenseCategory>,
    #[validate(length(min = 1, max = 500))]
    pub description: Option<String>,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub amount: Option<Decimal>,
    pub expense_date: Option<NaiveDate>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ExpenseFilter {
    pub warehouse_id: Option<Uuid>,
    pub category: Option<ExpenseCategory>,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

fn validate_amount(amount: Decimal) -> AppResult<Decimal> {
    ensure_positive("amount", amount)?;
    Ok(ensure_money_scale("amount", amount)?)
}

impl ExpenseService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn create(&self, actor: &Principal, input: CreateExpenseInput) -> AppResult<Expense> {
        input.validate()?;
        ensure_warehouse_scope(actor, input.warehouse_id)?;
        let amount = validate_amount(input.amount)?;

        let expense = sqlx::query_as::<_, Expense>(&format!(
            r#"
            INSERT INTO expenses (warehouse_id, category, description, amount, expense_date, user_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {EXPENSE_COLUMNS}
            "#
        ))
        .bind(input.warehouse_id)
        .bind(input.category)
        .bind(input.description.trim())
        .bind(amount)
        .bind(input.expense_date.unwrap_or_else(|| Utc::now().date_naive()))
        .bind(actor.user_id)
        .fetch_one(&self.db)
        .await?;

        tracing::info!(
            expense_id = %expense.id,
            warehouse_id = %expense.warehouse_id,
            amount = %expense.amount,
            "Expense recorded"
        );
        Ok(expense)
    }

    pub async fn list(
        &self,
        actor: &Principal,
        filter: ExpenseFilter,
        pagination: Pagination,
    ) -> AppResult<PaginatedResponse<Expense>> {
        let range = DateRange {
            start: filter.start,
            end: filter.end,
        };
        range
            .validate()
            .map_err(|msg| AppError::validation("start", msg))?;
        let warehouse = actor.warehouse_filter(filter.warehouse_id);

        const WHERE: &str = r#"
            WHERE ($1::uuid IS NULL OR warehouse_id = $1)
              AND ($2::expense_category IS NULL OR category = $2)
              AND ($3::date IS NULL OR expense_date >= $3)
              AND ($4::date IS NULL OR expense_date <= $4)
        "#;

        let total = sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM expenses {WHERE}"))
            .bind(warehouse)
            .bind(filter.category)
            .bind(filter.start)
            .bind(filter.end)
            .fetch_one(&self.db)
            .await?;

        let expenses = sqlx::query_as::<_, Expense>(&format!(
            r#"
            SELECT {EXPENSE_COLUMNS} FROM expenses {WHERE}
            ORDER BY expense_date DESC, created_at DESC
            LIMIT $5 OFFSET $6
            "#
        ))
        .bind(warehouse)
        .bind(filter.category)
        .bind(filter.start)
        .bind(filter.end)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.db)
        .await?;

        Ok(PaginatedResponse::new(expenses, &pagination, total.max(0) as u64))
    }

    pub async fn update(
        &self,
        actor: &Principal,
        id: Uuid,
        input: UpdateExpenseInput,
    ) -> AppResult<Expense> {
        require_role(actor, MANAGERS)?;
        input.validate()?;
        let existing = self.fetch(id).await?;
        ensure_warehouse_scope(actor, existing.warehouse_id)?;

        let amount = match input.amount {
            Some(amount) => validate_amount(amount)?,
            None => existing.amount,
        };

        let expense = sqlx::query_as::<_, Expense>(&format!(
            r#"
            UPDATE expenses
            SET category = $2, description = $3, amount = $4, expense_date = $5
            WHERE id = $1
            RETURNING {EXPENSE_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(input.category.unwrap_or(existing.category))
        .bind(
            input
                .description
                .as_deref()
                .map(str::trim)
                .unwrap_or(&existing.description),
        )
        .bind(amount)
        .bind(input.expense_date.unwrap_or(existing.expense_date))
        .fetch_one(&self.db)
        .await?;
        Ok(expense)
    }

    pub async fn delete(&self, actor: &Principal, id: Uuid) -> AppResult<()> {
        require_role(actor, MANAGERS)?;
        let existing = self.fetch(id).await?;
        ensure_warehouse_scope(actor, existing.warehouse_id)?;

        sqlx::query("DELETE FROM expenses WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;

        tracing::info!(expense_id = %id, user_id = %actor.user_id, "Expense deleted");
        Ok(())
    }

    async fn fetch(&self, id: Uuid) -> AppResult<Expense> {
        sqlx::query_as::<_, Expense>(&format!(
            "SELECT {EXPENSE_COLUMNS} FROM expenses WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Expense".to_string()))
    }
}
