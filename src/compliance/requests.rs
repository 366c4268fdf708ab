//! Data Subject Requests
//!
//! データ主体リクエストの履行処理（アクセス・削除・ポータビリティ・手動レビュー）

use super::retention::erasure_eligibility;
use super::store::LedgerState;
use super::types::*;
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::hash::Hash;

/// ポータビリティのエクスポート形式
const EXPORT_FORMAT: &str = "JSON";

/// 1データ主体分のスナップショット（読み取り専用）
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubjectData {
    pub data_subject_id: String,
    /// 収集日時順
    pub records: Vec<PersonalDataRecord>,
    /// 同意日時順
    pub consents: Vec<ConsentRecord>,
}

/// リクエスト種別ごとの履行処理を差し替えるハンドラー
///
/// 登録されたハンドラーは組み込みの処理より優先される。
/// `Err` を返すとリクエストは `rejected` になり、再試行はされない。
#[async_trait]
pub trait RequestHandler: Send + Sync {
    async fn handle(
        &self,
        request: &DataSubjectRequest,
        subject: &SubjectData,
    ) -> Result<serde_json::Value>;
}

/// アクセス権（Art.15）: 集計のみを返す
pub(crate) fn access_report(subject: &SubjectData) -> AccessReport {
    let records = &subject.records;

    AccessReport {
        personal_data_records: records.len(),
        data_categories: unique_in_order(records.iter().map(|r| r.data_category)),
        processing_purposes: unique_in_order(records.iter().map(|r| r.purpose)),
        consent_records: subject.consents.len(),
        active_consents: subject.consents.iter().filter(|c| c.is_active()).count(),
        third_party_processors: unique_in_order(
            records
                .iter()
                .flat_map(|r| r.third_parties.iter().map(|tp| tp.name.clone())),
        ),
        retention_periods: records
            .iter()
            .map(|r| RetentionEntry {
                data_type: r.data_type,
                retention_months: r.retention_period_months,
                auto_delete_date: r.auto_delete_date,
            })
            .collect(),
    }
}

/// 削除権（Art.17）: 削除可能なレコードと全ての同意記録を削除する
///
/// 一部のレコードが法定保存で残っても失敗扱いにはせず、件数で報告する。
pub(crate) fn erase_subject(
    state: &mut LedgerState,
    subject_id: &str,
    now: DateTime<Utc>,
    financial_retention_years: u32,
) -> ErasureSummary {
    let mut erased_data_records = 0;
    let mut retained_data_records = 0;

    state.records.retain(|record_id, record| {
        if record.data_subject_id != subject_id {
            return true;
        }

        let eligibility = erasure_eligibility(record, now, financial_retention_years);
        if eligibility.is_erasable() {
            erased_data_records += 1;
            false
        } else {
            tracing::debug!(
                record_id = %record_id,
                reason = ?eligibility,
                "record retained during erasure"
            );
            retained_data_records += 1;
            true
        }
    });

    let consents_before = state.consents.len();
    state
        .consents
        .retain(|_, consent| consent.data_subject_id != subject_id);
    let erased_consent_records = consents_before - state.consents.len();

    ErasureSummary {
        erased_data_records,
        retained_data_records,
        erased_consent_records,
        erasure_completed: now,
    }
}

/// ポータビリティ権（Art.20）: 同意・契約に基づくレコードのみを出力する
///
/// 内容は保存時に仮名化された形のまま出力される（逆変換の経路は無い）。
pub(crate) fn portability_export(subject: &SubjectData, now: DateTime<Utc>) -> PortabilityExport {
    let data_export: Vec<PortableRecord> = subject
        .records
        .iter()
        .filter(|r| matches!(r.legal_basis, LegalBasis::Consent | LegalBasis::Contract))
        .map(|r| PortableRecord {
            data_type: r.data_type,
            purpose: r.purpose,
            collected_date: r.collected_date,
            data_content: r.data_content.clone(),
        })
        .collect();

    PortabilityExport {
        exportable_records: data_export.len(),
        data_export,
        export_format: EXPORT_FORMAT.to_string(),
        export_date: now,
    }
}

/// 自動処理しないリクエストの応答
pub(crate) fn manual_review(request_type: RequestType) -> ManualReview {
    let message = match request_type {
        RequestType::Rectification => "Rectification process initiated - manual review required",
        RequestType::Restriction => "Processing restriction applied - manual review required",
        RequestType::Objection => "Objection recorded - manual review required",
        _ => "Request recorded - manual review required",
    };

    ManualReview {
        message: message.to_string(),
    }
}

fn unique_in_order<T, I>(items: I) -> Vec<T>
where
    T: Clone + Eq + Hash,
    I: IntoIterator<Item = T>,
{
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}
