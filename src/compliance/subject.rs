//! Data subject identifiers
//!
//! フォーム等で受け取ったメールアドレスからデータ主体IDを導出する。

use crate::error::{Error, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};

/// 表示時に残すID先頭の文字数
const REDACTED_PREFIX_LEN: usize = 12;

/// メールアドレスからデータ主体IDを導出（小文字化した値のBase64）
pub fn subject_id_from_email(email: &str) -> Result<String> {
    let normalized = email.trim().to_lowercase();
    if normalized.is_empty() || !normalized.contains('@') {
        return Err(Error::validation(format!(
            "a valid email address is required, got {:?}",
            email
        )));
    }

    Ok(STANDARD.encode(normalized.as_bytes()))
}

/// 応答に載せるための部分表示ID
pub fn redact_subject_id(subject_id: &str) -> String {
    let visible: String = subject_id.chars().take(REDACTED_PREFIX_LEN).collect();
    format!("{}...", visible)
}
