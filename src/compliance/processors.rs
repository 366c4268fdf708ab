//! Third-party processors
//!
//! データ種別・目的から第三者処理者を引く静的テーブル。

use super::types::{DataType, Purpose, ThirdPartyProcessor};

/// 処理者テーブルの1行
struct ProcessorEntry {
    name: &'static str,
    purpose: &'static str,
    data_shared: &'static [&'static str],
    privacy_policy_url: &'static str,
    adequacy_decision: bool,
    safeguards: &'static [&'static str],
    applies: fn(DataType, Purpose) -> bool,
}

impl ProcessorEntry {
    fn to_processor(&self) -> ThirdPartyProcessor {
        ThirdPartyProcessor {
            name: self.name.to_string(),
            purpose: self.purpose.to_string(),
            data_shared: self.data_shared.iter().map(|s| s.to_string()).collect(),
            privacy_policy_url: self.privacy_policy_url.to_string(),
            adequacy_decision: self.adequacy_decision,
            safeguards: self.safeguards.iter().map(|s| s.to_string()).collect(),
        }
    }
}

// 米国事業者は十分性認定なし（SCCで対応）
const PROCESSORS: &[ProcessorEntry] = &[
    ProcessorEntry {
        name: "Stripe Inc.",
        purpose: "Payment processing and fraud prevention",
        data_shared: &["payment_details", "billing_address", "transaction_history"],
        privacy_policy_url: "https://stripe.com/privacy",
        adequacy_decision: false,
        safeguards: &[
            "Standard Contractual Clauses",
            "Data Processing Agreement",
            "Privacy Shield successor",
        ],
        applies: is_payment,
    },
    ProcessorEntry {
        name: "Resend Inc.",
        purpose: "Email delivery and communication services",
        data_shared: &["email_address", "name", "communication_preferences"],
        privacy_policy_url: "https://resend.com/privacy",
        adequacy_decision: false,
        safeguards: &["Standard Contractual Clauses", "Data Processing Agreement"],
        applies: is_communication,
    },
    ProcessorEntry {
        name: "Vercel Inc.",
        purpose: "Website analytics and performance monitoring",
        data_shared: &["ip_address", "user_agent", "page_views", "session_data"],
        privacy_policy_url: "https://vercel.com/legal/privacy-policy",
        adequacy_decision: false,
        safeguards: &["Standard Contractual Clauses", "Data anonymization"],
        applies: is_analytics,
    },
];

fn is_payment(data_type: DataType, purpose: Purpose) -> bool {
    data_type == DataType::Payment || purpose == Purpose::PaymentProcessing
}

fn is_communication(data_type: DataType, purpose: Purpose) -> bool {
    data_type == DataType::Communication || purpose == Purpose::Communication
}

fn is_analytics(data_type: DataType, _purpose: Purpose) -> bool {
    data_type == DataType::Analytics
}

/// 該当する第三者処理者を取得
pub fn processors_for(data_type: DataType, purpose: Purpose) -> Vec<ThirdPartyProcessor> {
    PROCESSORS
        .iter()
        .filter(|entry| (entry.applies)(data_type, purpose))
        .map(ProcessorEntry::to_processor)
        .collect()
}
