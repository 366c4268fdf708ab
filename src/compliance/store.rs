//! Personal Data Store
//!
//! 個人データレコード・同意記録・データ主体リクエストを保持するインメモリ台帳。
//! 全ての更新はこのストアのメソッドを経由し、呼び出し側には常に複製を返す。

use super::classification::categorize;
use super::clock::{Clock, SystemClock};
use super::processors::processors_for;
use super::pseudonymization::pseudonymize;
use super::requests::{self, RequestHandler, SubjectData};
use super::retention::auto_delete_date;
use super::types::*;
use crate::config::ComplianceSettings;
use crate::error::{Error, Result};
use chrono::Duration;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;

/// 台帳の状態（3つのコレクションを1つのロックで保護する）
#[derive(Debug, Default)]
pub(crate) struct LedgerState {
    pub(crate) records: HashMap<String, PersonalDataRecord>,
    pub(crate) consents: HashMap<String, ConsentRecord>,
    pub(crate) requests: HashMap<String, DataSubjectRequest>,
}

impl LedgerState {
    fn subject_data(&self, subject_id: &str) -> SubjectData {
        let mut records: Vec<PersonalDataRecord> = self
            .records
            .values()
            .filter(|r| r.data_subject_id == subject_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| {
            a.collected_date
                .cmp(&b.collected_date)
                .then_with(|| a.id.cmp(&b.id))
        });

        let mut consents: Vec<ConsentRecord> = self
            .consents
            .values()
            .filter(|c| c.data_subject_id == subject_id)
            .cloned()
            .collect();
        consents.sort_by(|a, b| {
            a.consent_date
                .cmp(&b.consent_date)
                .then_with(|| a.consent_id.cmp(&b.consent_id))
        });

        SubjectData {
            data_subject_id: subject_id.to_string(),
            records,
            consents,
        }
    }
}

/// 個人データ台帳
///
/// `Clone` は内部状態を共有する。アプリケーションのコンポジションルートで1つ生成し、
/// 必要な箇所へ渡して使う。
#[derive(Clone)]
pub struct PersonalDataStore {
    /// レコード・同意・リクエスト
    state: Arc<RwLock<LedgerState>>,
    /// 本人確認待ちのタスク（request_id -> handle）
    verifications: Arc<Mutex<HashMap<String, JoinHandle<()>>>>,
    /// リクエスト種別ごとの差し替えハンドラー
    handlers: Arc<RwLock<HashMap<RequestType, Arc<dyn RequestHandler>>>>,
    settings: Arc<ComplianceSettings>,
    clock: Arc<dyn Clock>,
}

impl PersonalDataStore {
    /// デフォルト設定・システム時計で作成
    pub fn new() -> Self {
        Self::from_settings(ComplianceSettings::default())
    }

    /// 設定を指定して作成
    pub fn from_settings(settings: ComplianceSettings) -> Self {
        Self {
            state: Arc::new(RwLock::new(LedgerState::default())),
            verifications: Arc::new(Mutex::new(HashMap::new())),
            handlers: Arc::new(RwLock::new(HashMap::new())),
            settings: Arc::new(settings),
            clock: Arc::new(SystemClock),
        }
    }

    /// 時計を差し替える
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn settings(&self) -> &ComplianceSettings {
        &self.settings
    }

    /// リクエスト種別の履行処理を差し替える
    pub async fn register_handler(
        &self,
        request_type: RequestType,
        handler: Arc<dyn RequestHandler>,
    ) {
        let mut handlers = self.handlers.write().await;
        handlers.insert(request_type, handler);
    }

    /// 個人データを収集
    ///
    /// 内容は保存前に仮名化され、元の値は保持されない。
    /// `retention_months` が `None` の場合は設定のデフォルト（36ヶ月）を使う。
    pub async fn collect_personal_data(
        &self,
        subject_id: &str,
        data_type: DataType,
        content: DataContent,
        legal_basis: LegalBasis,
        purpose: Purpose,
        retention_months: Option<u32>,
    ) -> Result<PersonalDataRecord> {
        require_non_empty("subject id", subject_id)?;

        let retention_months = retention_months.unwrap_or(self.settings.default_retention_months);
        let collected_date = self.clock.now();
        let data_category = categorize(&content, data_type);

        let record = PersonalDataRecord {
            id: format!("data_{}", uuid::Uuid::new_v4().simple()),
            data_subject_id: subject_id.to_string(),
            data_type,
            data_category,
            purpose,
            legal_basis,
            collected_date,
            retention_period_months: retention_months,
            auto_delete_date: auto_delete_date(collected_date, retention_months),
            consent_status: if legal_basis == LegalBasis::Consent {
                ConsentStatus::Pending
            } else {
                ConsentStatus::NotRequired
            },
            data_content: pseudonymize(content),
            processing_activities: vec![ProcessingActivity::automated(
                "initial_collection",
                ProcessingType::Collection,
                collected_date,
            )],
            third_parties: processors_for(data_type, purpose),
        };

        {
            let mut state = self.state.write().await;
            state.records.insert(record.id.clone(), record.clone());
        }

        tracing::info!(
            record_id = %record.id,
            data_subject_id = %subject_id,
            data_type = %data_type,
            data_category = %data_category,
            legal_basis = %legal_basis,
            purpose = %purpose,
            "personal data collected"
        );

        Ok(record)
    }

    /// 同意を記録
    ///
    /// 同じデータ主体・目的で同意を根拠とするレコードの `consent_status` を `granted` に同期する。
    pub async fn record_consent(&self, grant: ConsentGrant) -> Result<ConsentRecord> {
        require_non_empty("subject id", &grant.subject_id)?;
        require_non_empty("consent purpose", &grant.purpose)?;
        require_non_empty("consent text", &grant.text)?;
        require_non_empty("consent version", &grant.version)?;

        let consent = ConsentRecord {
            consent_id: format!("consent_{}", uuid::Uuid::new_v4().simple()),
            data_subject_id: grant.subject_id,
            purpose: grant.purpose,
            consent_date: self.clock.now(),
            consent_method: grant.method,
            consent_status: ConsentState::Active,
            withdrawal_date: None,
            consent_text: grant.text,
            version: grant.version,
            ip_address: grant.ip_address,
            user_agent: grant.user_agent,
        };

        let synced = {
            let mut state = self.state.write().await;
            state
                .consents
                .insert(consent.consent_id.clone(), consent.clone());

            let mut synced = 0;
            for record in state.records.values_mut() {
                if record.tracks_consent_for(&consent.data_subject_id, &consent.purpose) {
                    record.consent_status = ConsentStatus::Granted;
                    synced += 1;
                }
            }
            synced
        };

        tracing::info!(
            consent_id = %consent.consent_id,
            data_subject_id = %consent.data_subject_id,
            purpose = %consent.purpose,
            method = %consent.consent_method,
            "consent recorded"
        );
        tracing::debug!(synced_records = synced, "consent status synced");

        Ok(consent)
    }

    /// 同意を撤回
    ///
    /// 有効な同意が1件以上撤回された場合に `true` を返す。
    /// 対象レコードには `deletion` 種別の処理活動を追記するが、レコード自体は削除しない。
    pub async fn withdraw_consent(&self, subject_id: &str, purpose: &str) -> Result<bool> {
        require_non_empty("subject id", subject_id)?;
        require_non_empty("consent purpose", purpose)?;

        let now = self.clock.now();
        let (withdrawn, synced) = {
            let mut state = self.state.write().await;

            let mut withdrawn = 0;
            for consent in state.consents.values_mut() {
                if consent.data_subject_id == subject_id
                    && consent.purpose == purpose
                    && consent.is_active()
                {
                    consent.withdraw(now);
                    withdrawn += 1;
                }
            }

            let mut synced = 0;
            for record in state.records.values_mut() {
                if record.tracks_consent_for(subject_id, purpose) {
                    record.consent_status = ConsentStatus::Withdrawn;
                    record.processing_activities.push(ProcessingActivity::automated(
                        "consent_withdrawal",
                        ProcessingType::Deletion,
                        now,
                    ));
                    synced += 1;
                }
            }

            (withdrawn, synced)
        };

        if withdrawn > 0 {
            tracing::info!(
                data_subject_id = %subject_id,
                purpose = %purpose,
                withdrawn_consents = withdrawn,
                "consent withdrawn"
            );
        }
        tracing::debug!(synced_records = synced, "consent status synced");

        Ok(withdrawn > 0)
    }

    /// データ主体リクエストを受け付ける
    ///
    /// `pending` のリクエストを即座に返す。本人確認方法がメール確認の場合は、
    /// 一定時間後に本人確認と履行を行うタスクを起動する（結果は照会で確認する）。
    pub async fn process_data_subject_request(
        &self,
        subject_id: &str,
        request_type: RequestType,
        verification_method: Option<&str>,
    ) -> Result<DataSubjectRequest> {
        require_non_empty("subject id", subject_id)?;
        let verification_method =
            verification_method.unwrap_or(&self.settings.email_verification_method);
        require_non_empty("verification method", verification_method)?;

        let request_date = self.clock.now();
        let deadline_date = Duration::try_days(i64::from(self.settings.request_deadline_days))
            .and_then(|window| request_date.checked_add_signed(window))
            .ok_or_else(|| {
                Error::Config(format!(
                    "request deadline of {} days is out of range",
                    self.settings.request_deadline_days
                ))
            })?;
        let request = DataSubjectRequest {
            request_id: format!("request_{}", uuid::Uuid::new_v4().simple()),
            data_subject_id: subject_id.to_string(),
            request_type,
            request_date,
            identity_verified: false,
            verification_method: verification_method.to_string(),
            status: RequestStatus::Pending,
            completion_date: None,
            response_data: None,
            rejection_reason: None,
            deadline_date,
        };

        {
            let mut state = self.state.write().await;
            state
                .requests
                .insert(request.request_id.clone(), request.clone());
        }

        tracing::info!(
            request_id = %request.request_id,
            data_subject_id = %subject_id,
            request_type = %request_type,
            verification_method = %request.verification_method,
            "data subject request received"
        );

        if request.verification_method == self.settings.email_verification_method {
            self.schedule_verification(request.request_id.clone()).await;
        }

        Ok(request)
    }

    /// 本人確認を完了し、リクエストを履行する
    ///
    /// `pending` 以外のリクエストには `InvalidState` を返す。
    /// 履行に失敗した場合は `rejected` として記録し、そのレコードを返す。
    pub async fn verify_request(&self, request_id: &str) -> Result<DataSubjectRequest> {
        let (request_type, subject_id) = {
            let mut state = self.state.write().await;
            let request = state
                .requests
                .get_mut(request_id)
                .ok_or_else(|| Error::NotFound(format!("Request not found: {}", request_id)))?;

            if request.status != RequestStatus::Pending {
                return Err(Error::InvalidState(format!(
                    "Request {} is {}, expected pending",
                    request_id, request.status
                )));
            }

            request.identity_verified = true;
            request.status = RequestStatus::InProgress;
            (request.request_type, request.data_subject_id.clone())
        };

        tracing::debug!(request_id = %request_id, "identity verified");

        let outcome = self.fulfil(request_id, request_type, &subject_id).await;
        let completion_date = self.clock.now();

        let mut state = self.state.write().await;
        let request = state
            .requests
            .get_mut(request_id)
            .ok_or_else(|| Error::NotFound(format!("Request not found: {}", request_id)))?;
        request.completion_date = Some(completion_date);

        match outcome {
            Ok(response) => {
                request.status = RequestStatus::Completed;
                request.response_data = Some(response);
                tracing::info!(
                    request_id = %request_id,
                    request_type = %request_type,
                    data_subject_id = %subject_id,
                    "data subject request completed"
                );
            }
            Err(e) => {
                request.status = RequestStatus::Rejected;
                request.rejection_reason = Some(e.to_string());
                tracing::warn!(
                    request_id = %request_id,
                    request_type = %request_type,
                    error = %e,
                    "data subject request rejected"
                );
            }
        }

        Ok(request.clone())
    }

    /// 本人確認タスクの完了を待ち、現在のリクエストを返す
    ///
    /// タスクが無い（メール確認以外・既に待機済み）場合は即座に現在の状態を返す。
    pub async fn await_request(&self, request_id: &str) -> Result<DataSubjectRequest> {
        let handle = {
            let mut verifications = self.verifications.lock().await;
            verifications.remove(request_id)
        };

        if let Some(handle) = handle {
            handle
                .await
                .map_err(|e| Error::Processing(format!("verification task failed: {}", e)))?;
        }

        self.get_request(request_id).await
    }

    /// コンプライアンスレポートを生成
    pub async fn get_compliance_report(&self) -> ComplianceReport {
        let now = self.clock.now();
        let state = self.state.read().await;

        let mut records_by_legal_basis = BTreeMap::new();
        let mut processor_names = HashSet::new();
        let mut within_retention = 0;

        for record in state.records.values() {
            *records_by_legal_basis.entry(record.legal_basis).or_insert(0) += 1;
            processor_names.extend(record.third_parties.iter().map(|tp| tp.name.as_str()));
            if record.is_within_retention(now) {
                within_retention += 1;
            }
        }

        let total_data_records = state.records.len();
        let retention_compliance = if total_data_records == 0 {
            None
        } else {
            Some(((within_retention as f64 / total_data_records as f64) * 100.0).round() as u32)
        };

        ComplianceReport {
            total_data_records,
            records_by_legal_basis,
            active_consents: state.consents.values().filter(|c| c.is_active()).count(),
            pending_requests: state
                .requests
                .values()
                .filter(|r| {
                    matches!(
                        r.status,
                        RequestStatus::Pending | RequestStatus::InProgress
                    )
                })
                .count(),
            overdue_requests: state.requests.values().filter(|r| r.is_overdue(now)).count(),
            third_party_processors: processor_names.len(),
            retention_compliance,
        }
    }

    /// リクエストを取得
    pub async fn get_request(&self, request_id: &str) -> Result<DataSubjectRequest> {
        let state = self.state.read().await;
        state
            .requests
            .get(request_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("Request not found: {}", request_id)))
    }

    /// データ主体の全リクエストを取得（受付日時順）
    pub async fn requests_for_subject(&self, subject_id: &str) -> Vec<DataSubjectRequest> {
        let state = self.state.read().await;
        let mut requests: Vec<DataSubjectRequest> = state
            .requests
            .values()
            .filter(|r| r.data_subject_id == subject_id)
            .cloned()
            .collect();
        requests.sort_by(|a, b| a.request_date.cmp(&b.request_date));
        requests
    }

    /// レコードを取得
    pub async fn get_record(&self, record_id: &str) -> Result<PersonalDataRecord> {
        let state = self.state.read().await;
        state
            .records
            .get(record_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("Record not found: {}", record_id)))
    }

    /// データ主体のレコードを取得（収集日時順）
    pub async fn records_for_subject(&self, subject_id: &str) -> Vec<PersonalDataRecord> {
        self.state.read().await.subject_data(subject_id).records
    }

    /// データ主体の同意記録を取得（同意日時順）
    pub async fn consents_for_subject(&self, subject_id: &str) -> Vec<ConsentRecord> {
        self.state.read().await.subject_data(subject_id).consents
    }

    /// 有効な同意があるかどうか
    pub async fn has_active_consent(&self, subject_id: &str, purpose: &str) -> bool {
        let state = self.state.read().await;
        state
            .consents
            .values()
            .any(|c| c.data_subject_id == subject_id && c.purpose == purpose && c.is_active())
    }

    async fn schedule_verification(&self, request_id: String) {
        let store = self.clone();
        let delay = self.settings.verification_delay();
        let task_request_id = request_id.clone();

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(e) = store.verify_request(&task_request_id).await {
                tracing::warn!(
                    request_id = %task_request_id,
                    error = %e,
                    "scheduled verification skipped"
                );
            }
        });

        let mut verifications = self.verifications.lock().await;
        verifications.retain(|_, task| !task.is_finished());
        verifications.insert(request_id, handle);
    }

    async fn fulfil(
        &self,
        request_id: &str,
        request_type: RequestType,
        subject_id: &str,
    ) -> Result<RequestResponse> {
        let handler = self.handlers.read().await.get(&request_type).cloned();

        if let Some(handler) = handler {
            let (request, subject) = {
                let state = self.state.read().await;
                let request = state.requests.get(request_id).cloned().ok_or_else(|| {
                    Error::NotFound(format!("Request not found: {}", request_id))
                })?;
                (request, state.subject_data(subject_id))
            };
            // ハンドラーのパニックは rejected として扱う
            let value = tokio::spawn(async move { handler.handle(&request, &subject).await })
                .await
                .map_err(|e| Error::Processing(format!("request handler failed: {}", e)))??;
            return Ok(RequestResponse::Custom(value));
        }

        let now = self.clock.now();
        let response = match request_type {
            RequestType::Access => {
                let state = self.state.read().await;
                RequestResponse::Access(requests::access_report(&state.subject_data(subject_id)))
            }
            RequestType::Erasure => {
                let mut state = self.state.write().await;
                RequestResponse::Erasure(requests::erase_subject(
                    &mut state,
                    subject_id,
                    now,
                    self.settings.financial_retention_years,
                ))
            }
            RequestType::Portability => {
                let state = self.state.read().await;
                RequestResponse::Portability(requests::portability_export(
                    &state.subject_data(subject_id),
                    now,
                ))
            }
            RequestType::Rectification | RequestType::Restriction | RequestType::Objection => {
                RequestResponse::ManualReview(requests::manual_review(request_type))
            }
        };

        Ok(response)
    }
}

impl Default for PersonalDataStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PersonalDataStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersonalDataStore")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

fn require_non_empty(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::validation(format!("{} must not be empty", field)));
    }
    Ok(())
}
