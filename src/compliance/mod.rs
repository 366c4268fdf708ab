//! GDPR Personal Data Ledger
//!
//! 個人データのライフサイクルを GDPR に沿って管理するインメモリ台帳。
//!
//! ## 主要機能
//!
//! - **データ収集**: 分類・仮名化・保存期間・第三者処理者の付与
//! - **同意管理**: 同意の記録と撤回、レコードの同意状態の同期
//! - **データ主体リクエスト処理**: アクセス権、削除権、ポータビリティ権、手動レビュー
//! - **コンプライアンスレポート**: 集計と評価スコア
//!
//! ## 使用例
//!
//! ```rust
//! use gdpr_ledger::compliance::{
//!     ConsentGrant, ConsentMethod, DataContent, DataType, LegalBasis, PersonalDataStore, Purpose,
//! };
//!
//! # async fn example() -> gdpr_ledger::Result<()> {
//! let store = PersonalDataStore::new();
//!
//! let mut content = DataContent::new();
//! content.insert("email".to_string(), serde_json::json!("jane@example.com"));
//!
//! let record = store
//!     .collect_personal_data(
//!         "S1",
//!         DataType::Contact,
//!         content,
//!         LegalBasis::Consent,
//!         Purpose::Communication,
//!         None,
//!     )
//!     .await?;
//! assert_eq!(record.data_content["email"], "ja***@example.com");
//!
//! store
//!     .record_consent(ConsentGrant::new(
//!         "S1",
//!         "communication",
//!         ConsentMethod::ExplicitCheckbox,
//!         "I agree to receive lesson updates",
//!     ))
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod assessment;
pub mod classification;
pub mod clock;
pub mod processors;
pub mod pseudonymization;
pub mod requests;
pub mod retention;
pub mod store;
pub mod subject;
pub mod types;

pub use assessment::{ComplianceAssessment, ComponentScores, Grade};
pub use clock::{Clock, ManualClock, SystemClock};
pub use requests::{RequestHandler, SubjectData};
pub use store::PersonalDataStore;
pub use types::*;
