//! Payment HTTP handlers
//!
//! Endpoints that accept a receipt read `multipart/form-data`; the file part
//! is named `receipt` and every other part is a plain text field.

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use shared::PaymentMethod;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::handlers::form::ReceiptForm;
use crate::middleware::CurrentUser;
use crate::services::payment::{
    BatchPaymentInput, NewPayment, PaymentChanges, PaymentView, RegisterDepositInput,
};
use crate::services::PaymentService;
use crate::AppState;

fn service(state: &AppState) -> PaymentService {
    PaymentService::new(state.db.clone(), state.store.clone(), &state.config.storage)
}

fn required_method(form: &ReceiptForm) -> AppResult<PaymentMethod> {
    form.tag::<PaymentMethod>("method")?
        .ok_or_else(|| AppError::validation("method", "Field is required"))
}

pub async fn list_payments(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(sale_id): Path<Uuid>,
) -> AppResult<Json<Vec<PaymentView>>> {
    Ok(Json(service(&state).list_for_sale(&actor, sale_id).await?))
}

/// Fields: `amount`, `method`, `reference?`, `payment_date?`, file `receipt?`
pub async fn add_payment(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(sale_id): Path<Uuid>,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<PaymentView>)> {
    let form = ReceiptForm::read(multipart).await?;
    let input = NewPayment {
        amount: form.required_decimal("amount")?,
        method: required_method(&form)?,
        reference: form.text("reference"),
        payment_date: form.date("payment_date")?,
    };

    let payment = service(&state)
        .add_payment(&actor, sale_id, input, form.receipt)
        .await?;
    Ok((StatusCode::CREATED, Json(payment)))
}

/// Every field optional; `remove_receipt=true` drops the current receipt
pub async fn update_payment(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> AppResult<Json<PaymentView>> {
    let form = ReceiptForm::read(multipart).await?;
    let changes = PaymentChanges {
        amount: form.decimal("amount")?,
        method: form.tag("method")?,
        reference: form.text("reference"),
        payment_date: form.date("payment_date")?,
        remove_receipt: form.flag("remove_receipt"),
    };

    let payment = service(&state)
        .update_payment(&actor, id, changes, form.receipt)
        .await?;
    Ok(Json(payment))
}

pub async fn delete_payment(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    service(&state).delete_payment(&actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Fields: `pairs` (JSON list of `{sale_id, amount}`), `method`,
/// `reference?`, `payment_date?`, file `receipt?`
pub async fn batch_create(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<Vec<PaymentView>>)> {
    let form = ReceiptForm::read(multipart).await?;
    let input = BatchPaymentInput {
        pairs: form.json("pairs")?,
        method: required_method(&form)?,
        reference: form.text("reference"),
        payment_date: form.date("payment_date")?,
    };

    let payments = service(&state)
        .batch_create(&actor, input, form.receipt)
        .await?;
    Ok((StatusCode::CREATED, Json(payments)))
}

pub async fn register_deposit(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Json(input): Json<RegisterDepositInput>,
) -> AppResult<Json<Vec<PaymentView>>> {
    Ok(Json(service(&state).register_deposit(&actor, input).await?))
}
