//! GDPR Ledger Integration Tests

use async_trait::async_trait;
use chrono::{Duration, Utc};
use gdpr_ledger::compliance::*;
use gdpr_ledger::config::ComplianceSettings;
use gdpr_ledger::Error;
use serde_json::json;
use std::sync::Arc;
use tokio_test::{assert_err, assert_ok};

fn fast_settings() -> ComplianceSettings {
    ComplianceSettings {
        verification_delay_ms: 10,
        ..ComplianceSettings::default()
    }
}

fn fast_store() -> PersonalDataStore {
    PersonalDataStore::from_settings(fast_settings())
}

fn contact(email: &str) -> DataContent {
    let mut content = DataContent::new();
    content.insert("email".to_string(), json!(email));
    content
}

fn communication_consent(subject_id: &str) -> ConsentGrant {
    ConsentGrant::new(
        subject_id,
        "communication",
        ConsentMethod::ExplicitCheckbox,
        "I agree to receive lesson updates by email",
    )
}

struct FailingHandler;

#[async_trait]
impl RequestHandler for FailingHandler {
    async fn handle(
        &self,
        _request: &DataSubjectRequest,
        _subject: &SubjectData,
    ) -> gdpr_ledger::Result<serde_json::Value> {
        Err(Error::Processing("rectification backend unavailable".to_string()))
    }
}

struct PanickingHandler;

#[async_trait]
impl RequestHandler for PanickingHandler {
    async fn handle(
        &self,
        _request: &DataSubjectRequest,
        _subject: &SubjectData,
    ) -> gdpr_ledger::Result<serde_json::Value> {
        panic!("objection workflow crashed");
    }
}

struct RecordCountHandler;

#[async_trait]
impl RequestHandler for RecordCountHandler {
    async fn handle(
        &self,
        request: &DataSubjectRequest,
        subject: &SubjectData,
    ) -> gdpr_ledger::Result<serde_json::Value> {
        Ok(json!({
            "request_id": request.request_id,
            "records_under_review": subject.records.len(),
        }))
    }
}

#[tokio::test]
async fn test_consent_lifecycle() {
    let store = fast_store();

    let record = store
        .collect_personal_data(
            "S1",
            DataType::Contact,
            contact("jane@example.com"),
            LegalBasis::Consent,
            Purpose::Communication,
            None,
        )
        .await
        .unwrap();

    assert_eq!(record.data_category, DataCategory::Personal);
    assert_eq!(record.consent_status, ConsentStatus::Pending);
    assert_eq!(record.data_content["email"], json!("ja***@example.com"));
    assert_eq!(record.processing_activities.len(), 1);
    assert_eq!(
        record.processing_activities[0].processing_type,
        ProcessingType::Collection
    );

    let consent = store
        .record_consent(communication_consent("S1"))
        .await
        .unwrap();
    assert_eq!(consent.consent_status, ConsentState::Active);
    assert_eq!(consent.version, "1.0");
    assert!(store.has_active_consent("S1", "communication").await);

    let granted = store.get_record(&record.id).await.unwrap();
    assert_eq!(granted.consent_status, ConsentStatus::Granted);

    assert!(store.withdraw_consent("S1", "communication").await.unwrap());
    assert!(!store.has_active_consent("S1", "communication").await);

    // 撤回してもレコード自体は残る
    let withdrawn = store.get_record(&record.id).await.unwrap();
    assert_eq!(withdrawn.consent_status, ConsentStatus::Withdrawn);
    assert_eq!(withdrawn.processing_activities.len(), 2);
    let last = withdrawn.processing_activities.last().unwrap();
    assert_eq!(last.processing_type, ProcessingType::Deletion);
    assert_eq!(last.purpose, "consent_withdrawal");

    let consents = store.consents_for_subject("S1").await;
    assert_eq!(consents.len(), 1);
    assert_eq!(consents[0].consent_status, ConsentState::Withdrawn);
    assert!(consents[0].withdrawal_date.is_some());

    // 2回目は撤回対象が無い
    assert!(!store.withdraw_consent("S1", "communication").await.unwrap());
}

#[tokio::test]
async fn test_regrant_after_withdrawal_restores_granted() {
    let store = fast_store();

    let record = store
        .collect_personal_data(
            "S1",
            DataType::Contact,
            contact("jane@example.com"),
            LegalBasis::Consent,
            Purpose::Communication,
            None,
        )
        .await
        .unwrap();

    store
        .record_consent(communication_consent("S1"))
        .await
        .unwrap();
    assert!(store.withdraw_consent("S1", "communication").await.unwrap());
    store
        .record_consent(communication_consent("S1").with_version("1.1"))
        .await
        .unwrap();

    // 最新の同意記録が反映される
    let record = store.get_record(&record.id).await.unwrap();
    assert_eq!(record.consent_status, ConsentStatus::Granted);
    assert!(store.has_active_consent("S1", "communication").await);

    let consents = store.consents_for_subject("S1").await;
    assert_eq!(consents.len(), 2);
    let active: Vec<&ConsentRecord> = consents.iter().filter(|c| c.is_active()).collect();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].version, "1.1");
    assert_eq!(
        consents
            .iter()
            .filter(|c| c.consent_status == ConsentState::Withdrawn)
            .count(),
        1
    );

    let report = store.get_compliance_report().await;
    assert_eq!(report.active_consents, 1);
}

#[tokio::test]
async fn test_oversized_retention_still_collects() {
    let store = fast_store();

    let record = assert_ok!(
        store
            .collect_personal_data(
                "S1",
                DataType::Contact,
                DataContent::new(),
                LegalBasis::Consent,
                Purpose::Communication,
                Some(10_000_000),
            )
            .await
    );

    assert_eq!(record.retention_period_months, 10_000_000);
    assert_eq!(record.auto_delete_date, chrono::DateTime::<Utc>::MAX_UTC);
    assert_eq!(
        store.get_compliance_report().await.retention_compliance,
        Some(100)
    );
}

#[tokio::test]
async fn test_unrepresentable_deadline_is_an_error() {
    // validate() を通さずに構築した設定
    let store = PersonalDataStore::from_settings(ComplianceSettings {
        request_deadline_days: u32::MAX,
        ..fast_settings()
    });

    let result = store
        .process_data_subject_request("S1", RequestType::Access, None)
        .await;

    assert!(matches!(result, Err(Error::Config(_))));
    assert!(store.requests_for_subject("S1").await.is_empty());
}

#[tokio::test]
async fn test_consent_only_affects_matching_purpose() {
    let store = fast_store();

    let marketing = store
        .collect_personal_data(
            "S1",
            DataType::Analytics,
            contact("jane@example.com"),
            LegalBasis::Consent,
            Purpose::Marketing,
            None,
        )
        .await
        .unwrap();

    store
        .record_consent(communication_consent("S1"))
        .await
        .unwrap();

    let unchanged = store.get_record(&marketing.id).await.unwrap();
    assert_eq!(unchanged.consent_status, ConsentStatus::Pending);
}

#[tokio::test]
async fn test_non_consent_basis_does_not_require_consent() {
    let store = fast_store();

    let mut content = DataContent::new();
    content.insert("card_last4".to_string(), json!("4242"));

    let record = store
        .collect_personal_data(
            "S1",
            DataType::Payment,
            content,
            LegalBasis::Contract,
            Purpose::PaymentProcessing,
            Some(84),
        )
        .await
        .unwrap();

    assert_eq!(record.consent_status, ConsentStatus::NotRequired);
    assert_eq!(record.data_category, DataCategory::Financial);
    assert_eq!(record.retention_period_months, 84);
    assert_eq!(
        record.auto_delete_date,
        record.collected_date + Duration::days(84 * 30)
    );
    assert_eq!(record.third_parties.len(), 1);
    assert_eq!(record.third_parties[0].name, "Stripe Inc.");

    // 同意を記録しても同意根拠でないレコードは変化しない
    store
        .record_consent(ConsentGrant::new(
            "S1",
            "payment_processing",
            ConsentMethod::ContractSigning,
            "I accept the payment terms",
        ))
        .await
        .unwrap();
    let record = store.get_record(&record.id).await.unwrap();
    assert_eq!(record.consent_status, ConsentStatus::NotRequired);
}

#[tokio::test]
async fn test_default_retention_and_sensitive_classification() {
    let store = fast_store();

    let mut content = DataContent::new();
    content.insert("Health_Notes".to_string(), json!("asthma"));
    content.insert("name".to_string(), json!("Jane Doe"));

    let record = store
        .collect_personal_data(
            "S1",
            DataType::Educational,
            content,
            LegalBasis::Consent,
            Purpose::ServiceDelivery,
            None,
        )
        .await
        .unwrap();

    assert_eq!(record.data_category, DataCategory::Sensitive);
    assert_eq!(record.retention_period_months, 36);
    assert_eq!(
        record.auto_delete_date,
        record.collected_date + Duration::days(36 * 30)
    );
    assert_eq!(record.data_content["name"], json!("Ja*** Do***"));
    assert_eq!(record.data_content["Health_Notes"], json!("asthma"));
}

#[tokio::test]
async fn test_erasure_request_completes_after_verification() {
    let store = fast_store();

    for purpose in [Purpose::Communication, Purpose::Marketing] {
        store
            .collect_personal_data(
                "S1",
                DataType::Contact,
                contact("jane@example.com"),
                LegalBasis::Consent,
                purpose,
                None,
            )
            .await
            .unwrap();
    }
    store
        .record_consent(communication_consent("S1"))
        .await
        .unwrap();
    store
        .collect_personal_data(
            "S2",
            DataType::Contact,
            contact("john@example.com"),
            LegalBasis::Consent,
            Purpose::Communication,
            None,
        )
        .await
        .unwrap();

    let request = store
        .process_data_subject_request("S1", RequestType::Erasure, None)
        .await
        .unwrap();

    assert_eq!(request.status, RequestStatus::Pending);
    assert!(!request.identity_verified);
    assert_eq!(request.verification_method, "email_verification");
    assert_eq!(
        request.deadline_date,
        request.request_date + Duration::days(30)
    );

    let completed = store.await_request(&request.request_id).await.unwrap();

    assert_eq!(completed.status, RequestStatus::Completed);
    assert!(completed.identity_verified);
    assert!(completed.completion_date.is_some());
    match completed.response_data {
        Some(RequestResponse::Erasure(summary)) => {
            assert_eq!(summary.erased_data_records, 2);
            assert_eq!(summary.retained_data_records, 0);
            assert_eq!(summary.erased_consent_records, 1);
        }
        other => panic!("unexpected response: {:?}", other),
    }

    assert!(store.records_for_subject("S1").await.is_empty());
    assert!(store.consents_for_subject("S1").await.is_empty());
    assert_eq!(store.records_for_subject("S2").await.len(), 1);
}

#[tokio::test]
async fn test_erasure_keeps_financial_records_within_statutory_period() {
    let now = Utc::now();
    let clock = Arc::new(ManualClock::new(now - Duration::days(365 * 8)));
    let store = fast_store().with_clock(clock.clone());

    let old = store
        .collect_personal_data(
            "S1",
            DataType::Payment,
            DataContent::new(),
            LegalBasis::Contract,
            Purpose::PaymentProcessing,
            Some(120),
        )
        .await
        .unwrap();

    clock.set(now - Duration::days(365 * 2));
    let recent = store
        .collect_personal_data(
            "S1",
            DataType::Payment,
            DataContent::new(),
            LegalBasis::Contract,
            Purpose::PaymentProcessing,
            Some(120),
        )
        .await
        .unwrap();

    clock.set(now);
    let legal = store
        .collect_personal_data(
            "S1",
            DataType::Contact,
            contact("jane@example.com"),
            LegalBasis::LegalObligation,
            Purpose::LegalCompliance,
            None,
        )
        .await
        .unwrap();

    let request = store
        .process_data_subject_request("S1", RequestType::Erasure, Some("manual_review"))
        .await
        .unwrap();
    let completed = store.verify_request(&request.request_id).await.unwrap();

    match completed.response_data {
        Some(RequestResponse::Erasure(summary)) => {
            assert_eq!(summary.erased_data_records, 1);
            assert_eq!(summary.retained_data_records, 2);
        }
        other => panic!("unexpected response: {:?}", other),
    }

    assert_err!(store.get_record(&old.id).await);
    assert_ok!(store.get_record(&recent.id).await);
    assert_ok!(store.get_record(&legal.id).await);
}

#[tokio::test]
async fn test_access_request_summarises_subject_data() {
    let store = fast_store();

    store
        .collect_personal_data(
            "S1",
            DataType::Communication,
            contact("jane@example.com"),
            LegalBasis::Consent,
            Purpose::Communication,
            None,
        )
        .await
        .unwrap();
    store
        .collect_personal_data(
            "S1",
            DataType::Payment,
            DataContent::new(),
            LegalBasis::Contract,
            Purpose::PaymentProcessing,
            Some(84),
        )
        .await
        .unwrap();
    store
        .record_consent(communication_consent("S1"))
        .await
        .unwrap();

    let request = store
        .process_data_subject_request("S1", RequestType::Access, None)
        .await
        .unwrap();
    let completed = store.await_request(&request.request_id).await.unwrap();

    assert_eq!(completed.status, RequestStatus::Completed);
    match completed.response_data {
        Some(RequestResponse::Access(report)) => {
            assert_eq!(report.personal_data_records, 2);
            assert_eq!(report.consent_records, 1);
            assert_eq!(report.active_consents, 1);
            assert!(report.data_categories.contains(&DataCategory::Financial));
            assert!(report
                .third_party_processors
                .contains(&"Stripe Inc.".to_string()));
            assert!(report
                .third_party_processors
                .contains(&"Resend Inc.".to_string()));
            assert_eq!(report.retention_periods.len(), 2);
        }
        other => panic!("unexpected response: {:?}", other),
    }

    // アクセス権は台帳を変更しない
    assert_eq!(store.records_for_subject("S1").await.len(), 2);
}

#[tokio::test]
async fn test_portability_exports_pseudonymised_content() {
    let store = fast_store();

    store
        .collect_personal_data(
            "S1",
            DataType::Contact,
            contact("jane@example.com"),
            LegalBasis::Consent,
            Purpose::Communication,
            None,
        )
        .await
        .unwrap();
    store
        .collect_personal_data(
            "S1",
            DataType::Analytics,
            DataContent::new(),
            LegalBasis::LegitimateInterest,
            Purpose::ServiceDelivery,
            None,
        )
        .await
        .unwrap();

    let request = store
        .process_data_subject_request("S1", RequestType::Portability, None)
        .await
        .unwrap();
    let completed = store.await_request(&request.request_id).await.unwrap();

    match completed.response_data {
        Some(RequestResponse::Portability(export)) => {
            assert_eq!(export.exportable_records, 1);
            assert_eq!(export.export_format, "JSON");
            assert_eq!(
                export.data_export[0].data_content["email"],
                json!("ja***@example.com")
            );
        }
        other => panic!("unexpected response: {:?}", other),
    }
}

#[tokio::test]
async fn test_manual_review_request_types() {
    let store = fast_store();

    let request = store
        .process_data_subject_request("S1", RequestType::Rectification, None)
        .await
        .unwrap();
    let completed = store.await_request(&request.request_id).await.unwrap();

    assert_eq!(completed.status, RequestStatus::Completed);
    assert_eq!(
        completed.response_data,
        Some(RequestResponse::ManualReview(ManualReview {
            message: "Rectification process initiated - manual review required".to_string(),
        }))
    );
}

#[tokio::test]
async fn test_failing_handler_rejects_request() {
    let store = fast_store();
    store
        .register_handler(RequestType::Rectification, Arc::new(FailingHandler))
        .await;

    let request = store
        .process_data_subject_request("S1", RequestType::Rectification, None)
        .await
        .unwrap();
    let rejected = store.await_request(&request.request_id).await.unwrap();

    assert_eq!(rejected.status, RequestStatus::Rejected);
    assert!(rejected.completion_date.is_some());
    assert!(rejected.response_data.is_none());
    assert!(rejected
        .rejection_reason
        .as_deref()
        .unwrap_or_default()
        .contains("rectification backend unavailable"));
}

#[tokio::test]
async fn test_panicking_handler_rejects_request() {
    let store = fast_store();
    store
        .register_handler(RequestType::Objection, Arc::new(PanickingHandler))
        .await;

    let request = store
        .process_data_subject_request("S1", RequestType::Objection, None)
        .await
        .unwrap();
    let rejected = assert_ok!(store.await_request(&request.request_id).await);

    assert_eq!(rejected.status, RequestStatus::Rejected);
    assert!(rejected.completion_date.is_some());
    assert!(rejected.response_data.is_none());
    assert!(rejected
        .rejection_reason
        .as_deref()
        .unwrap_or_default()
        .contains("request handler failed"));

    let report = store.get_compliance_report().await;
    assert_eq!(report.pending_requests, 0);
    assert_eq!(report.overdue_requests, 0);
}

#[tokio::test]
async fn test_registered_handler_overrides_builtin() {
    let store = fast_store();
    store
        .collect_personal_data(
            "S1",
            DataType::Contact,
            contact("jane@example.com"),
            LegalBasis::Consent,
            Purpose::Communication,
            None,
        )
        .await
        .unwrap();
    store
        .register_handler(RequestType::Objection, Arc::new(RecordCountHandler))
        .await;

    let request = store
        .process_data_subject_request("S1", RequestType::Objection, None)
        .await
        .unwrap();
    let completed = store.await_request(&request.request_id).await.unwrap();

    assert_eq!(completed.status, RequestStatus::Completed);
    assert_eq!(
        completed.response_data,
        Some(RequestResponse::Custom(json!({
            "request_id": request.request_id,
            "records_under_review": 1,
        })))
    );
}

#[tokio::test]
async fn test_non_email_verification_waits_for_manual_verification() {
    let store = fast_store();

    let request = store
        .process_data_subject_request("S1", RequestType::Access, Some("id_document"))
        .await
        .unwrap();

    // スケジュールされた確認タスクは無い
    let waiting = store.await_request(&request.request_id).await.unwrap();
    assert_eq!(waiting.status, RequestStatus::Pending);
    assert!(!waiting.identity_verified);

    let completed = store.verify_request(&request.request_id).await.unwrap();
    assert_eq!(completed.status, RequestStatus::Completed);
    assert!(completed.identity_verified);

    let again = store.verify_request(&request.request_id).await;
    assert!(matches!(again, Err(Error::InvalidState(_))));

    assert_eq!(store.requests_for_subject("S1").await.len(), 1);
}

#[tokio::test]
async fn test_unknown_request_is_not_found() {
    let store = fast_store();

    assert!(matches!(
        store.verify_request("request_missing").await,
        Err(Error::NotFound(_))
    ));
    assert!(matches!(
        store.await_request("request_missing").await,
        Err(Error::NotFound(_))
    ));
}

#[tokio::test]
async fn test_empty_store_report() {
    let store = fast_store();

    let report = store.get_compliance_report().await;

    assert_eq!(report.total_data_records, 0);
    assert!(report.records_by_legal_basis.is_empty());
    assert_eq!(report.active_consents, 0);
    assert_eq!(report.pending_requests, 0);
    assert_eq!(report.overdue_requests, 0);
    assert_eq!(report.third_party_processors, 0);
    assert_eq!(report.retention_compliance, None);

    let json = serde_json::to_value(&report).unwrap();
    assert!(json["retention_compliance"].is_null());
}

#[tokio::test]
async fn test_report_counts_overdue_and_retention() {
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let store = fast_store().with_clock(clock.clone());

    store
        .collect_personal_data(
            "S1",
            DataType::Communication,
            contact("jane@example.com"),
            LegalBasis::Consent,
            Purpose::Communication,
            Some(1),
        )
        .await
        .unwrap();
    store
        .collect_personal_data(
            "S1",
            DataType::Payment,
            DataContent::new(),
            LegalBasis::Contract,
            Purpose::PaymentProcessing,
            None,
        )
        .await
        .unwrap();
    store
        .record_consent(communication_consent("S1"))
        .await
        .unwrap();
    store
        .process_data_subject_request("S1", RequestType::Access, Some("id_document"))
        .await
        .unwrap();

    let report = store.get_compliance_report().await;
    assert_eq!(report.total_data_records, 2);
    assert_eq!(report.records_by_legal_basis[&LegalBasis::Consent], 1);
    assert_eq!(report.records_by_legal_basis[&LegalBasis::Contract], 1);
    assert_eq!(report.active_consents, 1);
    assert_eq!(report.pending_requests, 1);
    assert_eq!(report.overdue_requests, 0);
    assert_eq!(report.third_party_processors, 2);
    assert_eq!(report.retention_compliance, Some(100));

    clock.advance(Duration::days(31));

    let report = store.get_compliance_report().await;
    assert_eq!(report.overdue_requests, 1);
    assert_eq!(report.retention_compliance, Some(50));

    let assessment = ComplianceAssessment::from_report(&report);
    assert_eq!(assessment.scores.data_subject_rights, 70);
    assert_eq!(assessment.scores.data_retention, 50);
}

#[tokio::test]
async fn test_validation_errors() {
    let store = fast_store();

    let result = store
        .collect_personal_data(
            "  ",
            DataType::Contact,
            contact("jane@example.com"),
            LegalBasis::Consent,
            Purpose::Communication,
            None,
        )
        .await;
    assert!(matches!(result, Err(Error::Validation(_))));

    let result = store
        .record_consent(ConsentGrant::new(
            "S1",
            "communication",
            ConsentMethod::OptInForm,
            "",
        ))
        .await;
    assert!(matches!(result, Err(Error::Validation(_))));

    let result = store
        .process_data_subject_request("", RequestType::Access, None)
        .await;
    assert!(matches!(result, Err(Error::Validation(_))));

    // 検証エラーでは何も保存されない
    let report = store.get_compliance_report().await;
    assert_eq!(report.total_data_records, 0);
    assert_eq!(report.pending_requests, 0);
}

#[tokio::test]
async fn test_concurrent_collection_through_clones() {
    let store = fast_store();

    let mut handles = Vec::new();
    for i in 0..16 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store
                .collect_personal_data(
                    &format!("S{}", i % 4),
                    DataType::Contact,
                    contact("jane@example.com"),
                    LegalBasis::LegitimateInterest,
                    Purpose::ServiceDelivery,
                    None,
                )
                .await
        }));
    }
    for handle in handles {
        assert_ok!(handle.await.unwrap());
    }

    let report = store.get_compliance_report().await;
    assert_eq!(report.total_data_records, 16);
    assert_eq!(store.records_for_subject("S0").await.len(), 4);
}

#[tokio::test]
async fn test_subject_id_from_email_feeds_the_store() {
    let store = fast_store();
    let subject_id = subject::subject_id_from_email("Jane@Example.com").unwrap();

    store
        .collect_personal_data(
            &subject_id,
            DataType::Contact,
            contact("jane@example.com"),
            LegalBasis::Consent,
            Purpose::Communication,
            None,
        )
        .await
        .unwrap();

    let same = subject::subject_id_from_email("jane@example.com").unwrap();
    assert_eq!(store.records_for_subject(&same).await.len(), 1);
    assert_eq!(subject::redact_subject_id(&same), "amFuZUBleGFt...");
    assert!(matches!(
        subject::subject_id_from_email("not-an-email"),
        Err(Error::Validation(_))
    ));
}
