//! Input validation utilities

// ============================================================================
// General Validations
// ============================================================================

/// Validate a display name (non-blank, at most 120 characters)
pub fn validate_name(name: &str) -> Result<(), &'static str> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err("Name must not be blank");
    }
    if trimmed.chars().count() > 120 {
        return Err("Name must be at most 120 characters");
    }
    Ok(())
}

/// Validate a minimum-stock threshold
pub fn validate_minimum_stock(minimum_stock: i32) -> Result<(), &'static str> {
    if minimum_stock < 0 {
        return Err("Minimum stock cannot be negative");
    }
    Ok(())
}

/// Validate a stock quantity that must move at least one unit
pub fn validate_quantity(quantity: i32) -> Result<(), &'static str> {
    if quantity <= 0 {
        return Err("Quantity must be greater than zero");
    }
    Ok(())
}

/// Validate password strength: at least 8 characters with a letter and a digit
pub fn validate_password(password: &str) -> Result<(), &'static str> {
    if password.chars().count() < 8 {
        return Err("Password must be at least 8 characters");
    }
    if !password.chars().any(char::is_alphabetic) {
        return Err("Password must contain a letter");
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err("Password must contain a number");
    }
    Ok(())
}

// ============================================================================
// Receipt Files
// ============================================================================

/// Extensions accepted for receipt uploads
pub const ALLOWED_RECEIPT_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "pdf", "webp"];

/// Lower-cased extension of an uploaded file name, if it is an allowed one
pub fn receipt_extension(filename: &str) -> Result<String, &'static str> {
    let (_, ext) = filename
        .rsplit_once('.')
        .ok_or("File name has no extension")?;
    let ext = ext.to_ascii_lowercase();
    if ALLOWED_RECEIPT_EXTENSIONS.contains(&ext.as_str()) {
        Ok(ext)
    } else {
        Err("File type not allowed")
    }
}

/// Object name for an upload: sanitized stem, a unique suffix, the extension.
///
/// `photo of receipt.JPG` with suffix `ab12` becomes `photo_of_receipt_ab12.jpg`.
pub fn receipt_object_name(filename: &str, unique: &str) -> Result<String, &'static str> {
    let ext = receipt_extension(filename)?;
    let stem = filename
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .unwrap_or_default();
    // Browsers may send a full client path
    let stem = stem.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or_default();

    let mut safe: String = stem
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .take(50)
        .collect();
    if safe.trim_matches('_').is_empty() {
        safe = "file".to_string();
    }
    Ok(format!("{}_{}.{}", safe, unique, ext))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_name() {
        assert!(validate_name("Bolsa 5kg").is_ok());
        assert!(validate_name("   ").is_err());
        assert!(validate_name(&"x".repeat(121)).is_err());
    }

    #[test]
    fn test_validate_password() {
        assert!(validate_password("carbon2024").is_ok());
        assert_eq!(
            validate_password("abc123"),
            Err("Password must be at least 8 characters")
        );
        assert_eq!(validate_password("12345678"), Err("Password must contain a letter"));
        assert_eq!(validate_password("password"), Err("Password must contain a number"));
    }

    #[test]
    fn test_receipt_extension() {
        assert_eq!(receipt_extension("scan.PDF").unwrap(), "pdf");
        assert!(receipt_extension("script.exe").is_err());
        assert!(receipt_extension("noext").is_err());
    }

    #[test]
    fn test_receipt_object_name() {
        assert_eq!(
            receipt_object_name("photo of receipt.JPG", "ab12").unwrap(),
            "photo_of_receipt_ab12.jpg"
        );
        assert_eq!(
            receipt_object_name("C:\\Users\\me\\voucher.png", "ff").unwrap(),
            "voucher_ff.png"
        );
        assert_eq!(receipt_object_name("../...pdf", "00").unwrap(), "file_00.pdf");
    }
}
