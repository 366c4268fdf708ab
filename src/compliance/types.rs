//! Compliance Types
//!
//! 個人データ台帳で扱うレコード・列挙型の定義

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 文字列表現を持つ列挙型を定義する
///
/// フォーム等から届く文字列を `FromStr` で検証付きに変換できるようにする。
macro_rules! string_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident => $text:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum $name {
            $( $(#[$vmeta])* #[serde(rename = $text)] $variant ),+
        }

        impl $name {
            /// 全バリアント
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// ワイヤ表現
            pub fn as_str(&self) -> &'static str {
                match self {
                    $( $name::$variant => $text ),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = Error;

            fn from_str(value: &str) -> Result<Self> {
                match value {
                    $( $text => Ok($name::$variant), )+
                    other => Err(Error::Validation(format!(
                        "unknown {} value: {:?}",
                        stringify!($name),
                        other
                    ))),
                }
            }
        }
    };
}

string_enum! {
    /// 収集データの種類
    pub enum DataType {
        Contact => "contact",
        Payment => "payment",
        Educational => "educational",
        Communication => "communication",
        Analytics => "analytics",
    }
}

string_enum! {
    /// 収集時に一度だけ決定されるデータカテゴリ
    pub enum DataCategory {
        Personal => "personal",
        /// 特別カテゴリ（GDPR Art.9）
        Sensitive => "sensitive",
        Financial => "financial",
        EducationalRecords => "educational_records",
    }
}

string_enum! {
    /// 処理目的
    pub enum Purpose {
        ServiceDelivery => "service_delivery",
        PaymentProcessing => "payment_processing",
        Communication => "communication",
        LegalCompliance => "legal_compliance",
        Marketing => "marketing",
    }
}

string_enum! {
    /// 法的根拠（GDPR Art.6）
    pub enum LegalBasis {
        /// 同意（Art.6(1)(a)）
        Consent => "consent",
        /// 契約履行（Art.6(1)(b)）
        Contract => "contract",
        /// 正当な利益（Art.6(1)(f)）
        LegitimateInterest => "legitimate_interest",
        /// 法的義務（Art.6(1)(c)）
        LegalObligation => "legal_obligation",
    }
}

string_enum! {
    /// データレコード側に非正規化された同意状態
    pub enum ConsentStatus {
        Granted => "granted",
        Withdrawn => "withdrawn",
        Pending => "pending",
        NotRequired => "not_required",
    }
}

string_enum! {
    /// 処理活動の種別
    pub enum ProcessingType {
        Collection => "collection",
        Storage => "storage",
        Analysis => "analysis",
        Sharing => "sharing",
        Deletion => "deletion",
    }
}

string_enum! {
    /// 同意の取得方法
    pub enum ConsentMethod {
        ExplicitCheckbox => "explicit_checkbox",
        OptInForm => "opt_in_form",
        Verbal => "verbal",
        ContractSigning => "contract_signing",
    }
}

string_enum! {
    /// 同意記録の状態
    pub enum ConsentState {
        Active => "active",
        Withdrawn => "withdrawn",
        /// 宣言のみ。どの処理経路からも設定されない
        Expired => "expired",
    }
}

string_enum! {
    /// データ主体リクエストの種類（GDPR Art.15-22）
    pub enum RequestType {
        /// アクセス権（Art.15）
        Access => "access",
        /// 訂正権（Art.16）
        Rectification => "rectification",
        /// 削除権（Art.17）
        Erasure => "erasure",
        /// ポータビリティ権（Art.20）
        Portability => "portability",
        /// 処理制限権（Art.18）
        Restriction => "restriction",
        /// 異議申立権（Art.21）
        Objection => "objection",
    }
}

string_enum! {
    /// リクエスト処理ステータス
    pub enum RequestStatus {
        Pending => "pending",
        InProgress => "in_progress",
        Completed => "completed",
        Rejected => "rejected",
    }
}

/// 仮名化済みのデータ本体
pub type DataContent = BTreeMap<String, serde_json::Value>;

/// 処理活動（追記のみの監査証跡）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProcessingActivity {
    pub activity_id: String,
    pub purpose: String,
    pub timestamp: DateTime<Utc>,
    pub processing_type: ProcessingType,
    pub automated: bool,
    pub user_notified: bool,
}

impl ProcessingActivity {
    /// 自動処理・通知済みの活動を作成
    pub fn automated(
        purpose: impl Into<String>,
        processing_type: ProcessingType,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            activity_id: format!("activity_{}", uuid::Uuid::new_v4().simple()),
            purpose: purpose.into(),
            timestamp,
            processing_type,
            automated: true,
            user_notified: true,
        }
    }
}

/// 第三者処理者
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ThirdPartyProcessor {
    pub name: String,
    pub purpose: String,
    pub data_shared: Vec<String>,
    pub privacy_policy_url: String,
    /// 十分性認定の有無
    pub adequacy_decision: bool,
    pub safeguards: Vec<String>,
}

/// 個人データレコード（データ主体 × 収集イベントごとに1件）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PersonalDataRecord {
    pub id: String,
    pub data_subject_id: String,
    pub data_type: DataType,
    pub data_category: DataCategory,
    pub purpose: Purpose,
    pub legal_basis: LegalBasis,
    pub collected_date: DateTime<Utc>,
    pub retention_period_months: u32,
    /// 目標日のみ。自動削除ジョブは存在しない
    pub auto_delete_date: DateTime<Utc>,
    pub consent_status: ConsentStatus,
    pub data_content: DataContent,
    pub processing_activities: Vec<ProcessingActivity>,
    pub third_parties: Vec<ThirdPartyProcessor>,
}

impl PersonalDataRecord {
    /// 保持期限内かどうか
    pub fn is_within_retention(&self, now: DateTime<Utc>) -> bool {
        self.auto_delete_date > now
    }

    /// 同意同期の対象かどうか
    pub(crate) fn tracks_consent_for(&self, subject_id: &str, purpose: &str) -> bool {
        self.data_subject_id == subject_id
            && self.legal_basis == LegalBasis::Consent
            && self.purpose.as_str() == purpose
    }
}

/// 同意記録（同意付与イベントごとに1件）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConsentRecord {
    pub consent_id: String,
    pub data_subject_id: String,
    pub purpose: String,
    pub consent_date: DateTime<Utc>,
    pub consent_method: ConsentMethod,
    pub consent_status: ConsentState,
    pub withdrawal_date: Option<DateTime<Utc>>,
    pub consent_text: String,
    pub version: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl ConsentRecord {
    /// 同意が有効かどうか
    pub fn is_active(&self) -> bool {
        self.consent_status == ConsentState::Active
    }

    /// 同意を撤回
    pub(crate) fn withdraw(&mut self, at: DateTime<Utc>) {
        self.consent_status = ConsentState::Withdrawn;
        self.withdrawal_date = Some(at);
    }
}

/// 同意付与の入力
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsentGrant {
    pub subject_id: String,
    pub purpose: String,
    pub method: ConsentMethod,
    pub text: String,
    pub version: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl ConsentGrant {
    /// バージョン "1.0" の同意付与を作成
    pub fn new(
        subject_id: impl Into<String>,
        purpose: impl Into<String>,
        method: ConsentMethod,
        text: impl Into<String>,
    ) -> Self {
        Self {
            subject_id: subject_id.into(),
            purpose: purpose.into(),
            method,
            text: text.into(),
            version: "1.0".to_string(),
            ip_address: None,
            user_agent: None,
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_ip_address(mut self, ip_address: impl Into<String>) -> Self {
        self.ip_address = Some(ip_address.into());
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }
}

/// データ主体リクエスト
///
/// `response_data` の形が種別ごとに異なるため、出力専用（`Serialize` のみ）。
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DataSubjectRequest {
    pub request_id: String,
    pub data_subject_id: String,
    pub request_type: RequestType,
    pub request_date: DateTime<Utc>,
    pub identity_verified: bool,
    pub verification_method: String,
    pub status: RequestStatus,
    pub completion_date: Option<DateTime<Utc>>,
    pub response_data: Option<RequestResponse>,
    pub rejection_reason: Option<String>,
    /// 情報提供のみ。期限はスケジュールで強制されない
    pub deadline_date: DateTime<Utc>,
}

impl DataSubjectRequest {
    /// 終端状態（completed / rejected）かどうか
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.status,
            RequestStatus::Completed | RequestStatus::Rejected
        )
    }

    /// 期限切れかつ未完了かどうか
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        !self.is_terminal() && self.deadline_date < now
    }
}

/// リクエスト処理結果
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum RequestResponse {
    Access(AccessReport),
    Erasure(ErasureSummary),
    Portability(PortabilityExport),
    ManualReview(ManualReview),
    /// 登録ハンドラーが返した任意の応答
    Custom(serde_json::Value),
}

/// アクセス権の応答（集計のみ）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AccessReport {
    pub personal_data_records: usize,
    pub data_categories: Vec<DataCategory>,
    pub processing_purposes: Vec<Purpose>,
    pub consent_records: usize,
    pub active_consents: usize,
    pub third_party_processors: Vec<String>,
    pub retention_periods: Vec<RetentionEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetentionEntry {
    pub data_type: DataType,
    pub retention_months: u32,
    pub auto_delete_date: DateTime<Utc>,
}

/// 削除権の応答（ベストエフォートの件数）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErasureSummary {
    pub erased_data_records: usize,
    /// 法定保存のため残したレコード数
    pub retained_data_records: usize,
    pub erased_consent_records: usize,
    pub erasure_completed: DateTime<Utc>,
}

/// ポータビリティ権の応答
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PortabilityExport {
    pub exportable_records: usize,
    pub data_export: Vec<PortableRecord>,
    pub export_format: String,
    pub export_date: DateTime<Utc>,
}

/// エクスポート対象レコード（内容は仮名化済みのまま）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PortableRecord {
    pub data_type: DataType,
    pub purpose: Purpose,
    pub collected_date: DateTime<Utc>,
    pub data_content: DataContent,
}

/// 手動レビューが必要なリクエストの応答
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ManualReview {
    pub message: String,
}

/// コンプライアンスレポート
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ComplianceReport {
    pub total_data_records: usize,
    pub records_by_legal_basis: BTreeMap<LegalBasis, usize>,
    pub active_consents: usize,
    /// pending + in_progress
    pub pending_requests: usize,
    pub overdue_requests: usize,
    /// 重複を除いた第三者処理者数
    pub third_party_processors: usize,
    /// 保持期限内レコードの割合（%）。レコードが無い場合は `None`
    pub retention_compliance: Option<u32>,
}
