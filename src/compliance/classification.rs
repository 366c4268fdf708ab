//! Data classification
//!
//! フィールド名のキーワード照合によるデータカテゴリ判定。
//! 判定は収集時に一度だけ行われ、後から再評価されない。

use super::types::{DataCategory, DataContent, DataType};

/// 特別カテゴリを示すキーワード
const SENSITIVE_TERMS: &[&str] = &[
    "health",
    "medical",
    "disability",
    "religion",
    "political",
    "sexual",
    "ethnicity",
];

/// 財務情報を示すキーワード
const FINANCIAL_TERMS: &[&str] = &["payment", "card", "bank", "financial"];

/// 教育記録を示すキーワード
const EDUCATIONAL_TERMS: &[&str] = &["grade", "exam", "education", "academic", "tutor"];

/// データカテゴリを判定（最初に一致したものを採用）
pub fn categorize(content: &DataContent, data_type: DataType) -> DataCategory {
    if any_key_contains(content, SENSITIVE_TERMS) {
        return DataCategory::Sensitive;
    }

    if data_type == DataType::Payment || any_key_contains(content, FINANCIAL_TERMS) {
        return DataCategory::Financial;
    }

    if data_type == DataType::Educational || any_key_contains(content, EDUCATIONAL_TERMS) {
        return DataCategory::EducationalRecords;
    }

    DataCategory::Personal
}

fn any_key_contains(content: &DataContent, terms: &[&str]) -> bool {
    content.keys().any(|key| {
        let key = key.to_lowercase();
        terms.iter().any(|term| key.contains(term))
    })
}
