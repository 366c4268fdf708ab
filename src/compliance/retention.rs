//! Retention rules
//!
//! 保持期限の算出と削除可否の判定。

use super::types::{DataCategory, LegalBasis, PersonalDataRecord};
use chrono::{DateTime, Duration, Months, Utc};

/// 保持期間の1ヶ月を30日として扱う
const DAYS_PER_RETENTION_MONTH: i64 = 30;

/// 自動削除予定日を算出（収集時に一度だけ計算する）
///
/// 表現可能な日時を超える保持期間は `DateTime::<Utc>::MAX_UTC` に丸める。
pub fn auto_delete_date(collected: DateTime<Utc>, retention_months: u32) -> DateTime<Utc> {
    Duration::try_days(i64::from(retention_months) * DAYS_PER_RETENTION_MONTH)
        .and_then(|retention| collected.checked_add_signed(retention))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// 削除可否の判定結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErasureEligibility {
    /// 削除可能
    Erasable,
    /// 法的義務に基づくため保持
    LegalObligation,
    /// 財務記録の法定保存期間内
    FinancialRetention { until: DateTime<Utc> },
}

impl ErasureEligibility {
    pub fn is_erasable(&self) -> bool {
        matches!(self, ErasureEligibility::Erasable)
    }
}

/// 削除権に対するレコードの削除可否を判定
pub fn erasure_eligibility(
    record: &PersonalDataRecord,
    now: DateTime<Utc>,
    financial_retention_years: u32,
) -> ErasureEligibility {
    if record.legal_basis == LegalBasis::LegalObligation {
        return ErasureEligibility::LegalObligation;
    }

    if record.data_category == DataCategory::Financial {
        let until = record
            .collected_date
            .checked_add_months(Months::new(financial_retention_years.saturating_mul(12)))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        if now < until {
            return ErasureEligibility::FinancialRetention { until };
        }
    }

    ErasureEligibility::Erasable
}

/// 削除可能かどうか
pub fn can_erase_record(
    record: &PersonalDataRecord,
    now: DateTime<Utc>,
    financial_retention_years: u32,
) -> bool {
    erasure_eligibility(record, now, financial_retention_years).is_erasable()
}

/// 目的ごとの保持ポリシー（利用者向けの説明文）
pub fn retention_statement(purpose: &str) -> &'static str {
    match purpose {
        "service_delivery" => "36 months after last tutoring session or account closure",
        "payment_processing" => "7 years for tax and accounting compliance (legal obligation)",
        "communication" => "24 months after last communication or consent withdrawal",
        "marketing" => "24 months after consent withdrawal or last engagement",
        "analytics" => "24 months in pseudonymised form for service improvement",
        _ => "24 months after consent withdrawal",
    }
}
