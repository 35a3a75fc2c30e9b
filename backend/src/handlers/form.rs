//! Multipart form parsing for endpoints that accept a receipt file

use std::collections::HashMap;
use std::str::FromStr;

use axum::extract::Multipart;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use shared::money::parse_exact;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::external::Upload;

/// Name of the file part carrying the receipt
const RECEIPT_FIELD: &str = "receipt";

/// Text fields of a multipart body plus the optional receipt file
#[derive(Debug, Default)]
pub struct ReceiptForm {
    fields: HashMap<String, String>,
    pub receipt: Option<Upload>,
}

impl ReceiptForm {
    pub async fn read(mut multipart: Multipart) -> AppResult<Self> {
        let mut form = ReceiptForm::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::validation("body", format!("Malformed multipart body: {}", e)))?
        {
            let name = field.name().unwrap_or_default().to_string();
            if name == RECEIPT_FIELD {
                let filename = field.file_name().unwrap_or("receipt").to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::validation(RECEIPT_FIELD, format!("Failed to read file: {}", e)))?;
                if !bytes.is_empty() {
                    form.receipt = Some(Upload {
                        filename,
                        content_type,
                        bytes: bytes.to_vec(),
                    });
                }
            } else {
                let value = field
                    .text()
                    .await
                    .map_err(|e| AppError::validation(name.clone(), format!("Unreadable field: {}", e)))?;
                form.fields.insert(name, value);
            }
        }

        Ok(form)
    }

    /// A trimmed, non-empty text field
    pub fn text(&self, name: &str) -> Option<String> {
        self.fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    }

    pub fn decimal(&self, name: &'static str) -> AppResult<Option<Decimal>> {
        self.text(name)
            .map(|raw| parse_exact(name, &raw))
            .transpose()
            .map_err(AppError::from)
    }

    pub fn required_decimal(&self, name: &'static str) -> AppResult<Decimal> {
        self.decimal(name)?
            .ok_or_else(|| AppError::validation(name, "Field is required"))
    }

    pub fn date(&self, name: &str) -> AppResult<Option<NaiveDate>> {
        self.text(name)
            .map(|raw| {
                NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
                    .map_err(|_| AppError::validation(name, "Expected a date as YYYY-MM-DD"))
            })
            .transpose()
    }

    pub fn uuid(&self, name: &str) -> AppResult<Option<Uuid>> {
        self.text(name)
            .map(|raw| Uuid::from_str(&raw).map_err(|_| AppError::validation(name, "Invalid id")))
            .transpose()
    }

    /// `true`, `1` or `on` count as set
    pub fn flag(&self, name: &str) -> bool {
        matches!(
            self.text(name).map(|v| v.to_ascii_lowercase()).as_deref(),
            Some("true" | "1" | "on")
        )
    }

    /// A field holding a bare enum tag such as `efectivo`
    pub fn tag<T: DeserializeOwned>(&self, name: &str) -> AppResult<Option<T>> {
        self.text(name)
            .map(|raw| {
                serde_json::from_value(serde_json::Value::String(raw))
                    .map_err(|_| AppError::validation(name, "Unknown value"))
            })
            .transpose()
    }

    /// A field holding a JSON document, e.g. the pairs of a batch payment
    pub fn json<T: DeserializeOwned>(&self, name: &str) -> AppResult<T> {
        let raw = self
            .text(name)
            .ok_or_else(|| AppError::validation(name, "Field is required"))?;
        serde_json::from_str(&raw).map_err(|e| AppError::validation(name, e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::PaymentMethod;

    fn form(pairs: &[(&str, &str)]) -> ReceiptForm {
        ReceiptForm {
            fields: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            receipt: None,
        }
    }

    #[test]
    fn amounts_are_exact_decimals() {
        let f = form(&[("amount", " 12.30 "), ("bad", "1e3")]);
        assert_eq!(f.required_decimal("amount").unwrap(), Decimal::new(1230, 2));
        assert!(f.decimal("bad").is_err());
        assert!(f.required_decimal("missing").is_err());
    }

    #[test]
    fn blank_fields_are_absent() {
        let f = form(&[("reference", "   "), ("payment_date", "2024-03-01")]);
        assert_eq!(f.text("reference"), None);
        assert_eq!(
            f.date("payment_date").unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 1)
        );
    }

    #[test]
    fn enum_tags_and_flags() {
        let f = form(&[("method", "yape_plin"), ("remove_receipt", "TRUE")]);
        assert_eq!(f.tag::<PaymentMethod>("method").unwrap(), Some(PaymentMethod::YapePlin));
        assert!(f.flag("remove_receipt"));
        assert!(!f.flag("other"));
    }

    #[test]
    fn batch_pairs_parse_from_json() {
        let id = Uuid::new_v4();
        let f = form(&[("pairs", &format!(r#"[{{"sale_id":"{id}","amount":"40.00"}}]"#))]);
        let pairs: Vec<shared::reconciliation::BatchPair> = f.json("pairs").unwrap();
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].sale_id, id);
    }
}
