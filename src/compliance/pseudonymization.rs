//! Pseudonymization
//!
//! 保存前に識別子をマスキングする一方向変換。元の値は保持しない。

use super::types::DataContent;
use serde_json::Value;

/// マスク文字列
const MASK: &str = "***";

/// データ本体を仮名化
///
/// `email` / `phone` / `name` の文字列値のみを変換し、その他のフィールドはそのまま残す。
pub fn pseudonymize(content: DataContent) -> DataContent {
    content
        .into_iter()
        .map(|(key, value)| {
            let masked = match (key.as_str(), value) {
                ("email", Value::String(email)) => Value::String(mask_email(&email)),
                ("phone", Value::String(phone)) => Value::String(mask_phone(&phone)),
                ("name", Value::String(name)) => Value::String(mask_name(&name)),
                (_, other) => other,
            };
            (key, masked)
        })
        .collect()
}

/// メールアドレスをマスク
///
/// `local@domain` → `lo***@domain`。ローカル部かドメインが空なら変換しない。
/// 3つ目以降の `@` 区切りは捨てられる。
pub fn mask_email(email: &str) -> String {
    let mut parts = email.split('@');
    match (parts.next(), parts.next()) {
        (Some(local), Some(domain)) if !local.is_empty() && !domain.is_empty() => {
            format!("{}{}@{}", prefix(local, 2), MASK, domain)
        }
        _ => email.to_string(),
    }
}

/// 電話番号をマスク
///
/// 数字のみを取り出し、末尾4桁だけを残す。数字が4桁以下なら元の文字列のまま。
pub fn mask_phone(phone: &str) -> String {
    let digits: Vec<char> = phone.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() <= 4 {
        return phone.to_string();
    }

    let last_four: String = digits[digits.len() - 4..].iter().collect();
    format!("****{}", last_four)
}

/// 氏名をマスク
///
/// 空白1文字で分割し、3文字以上のトークンは先頭2文字＋`***`にする。
pub fn mask_name(name: &str) -> String {
    name.split(' ')
        .map(|token| {
            if token.chars().count() > 2 {
                format!("{}{}", prefix(token, 2), MASK)
            } else {
                token.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn prefix(value: &str, len: usize) -> String {
    value.chars().take(len).collect()
}
