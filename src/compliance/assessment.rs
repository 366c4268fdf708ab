//! Compliance Assessment
//!
//! コンプライアンスレポートから評価スコア・グレード・リスク項目を算出する。

use super::types::{ComplianceReport, LegalBasis};
use serde::{Deserialize, Serialize};

/// 高リスク判定の閾値
const HIGH_RISK_THRESHOLD: u32 = 70;
/// 中リスク判定の上限
const MEDIUM_RISK_CEILING: u32 = 85;

/// 全処理者と DPA を締結済みとした基礎点
const DPA_COMPLIANCE: i32 = 100;

/// 越境移転の保護措置による加減点
const SAFEGUARD_ADJUSTMENTS: &[(&str, i32)] = &[
    ("adequacy_decisions", -10),
    ("scc_implementation", 15),
    ("transfer_impact_assessments", 10),
    ("processor_audits", 5),
];

/// 評価グレード
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Grade {
    #[serde(rename = "A+")]
    APlus,
    A,
    #[serde(rename = "B+")]
    BPlus,
    B,
    #[serde(rename = "C+")]
    CPlus,
    C,
    D,
}

impl Grade {
    pub fn from_score(score: u32) -> Self {
        match score {
            95.. => Grade::APlus,
            90..=94 => Grade::A,
            85..=89 => Grade::BPlus,
            80..=84 => Grade::B,
            75..=79 => Grade::CPlus,
            70..=74 => Grade::C,
            _ => Grade::D,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Grade::APlus => "A+",
            Grade::A => "A",
            Grade::BPlus => "B+",
            Grade::B => "B",
            Grade::CPlus => "C+",
            Grade::C => "C",
            Grade::D => "D",
        }
    }
}

impl std::fmt::Display for Grade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 領域別スコア（0〜100）
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ComponentScores {
    pub consent_management: u32,
    pub data_subject_rights: u32,
    pub data_retention: u32,
    pub third_party_management: u32,
    pub security_measures: u32,
}

/// コンプライアンス評価
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ComplianceAssessment {
    pub overall_score: u32,
    pub grade: Grade,
    pub scores: ComponentScores,
    pub high_risk_items: Vec<String>,
    pub medium_risk_items: Vec<String>,
    /// 継続的な評価が必要な処理
    pub high_risk_processing: Vec<String>,
    pub recommendations: Vec<String>,
    /// 四半期ごとの改善計画
    pub roadmap: Vec<String>,
}

impl ComplianceAssessment {
    /// レポートから評価を算出
    ///
    /// 保存期間遵守率が算出できない（レコード0件）場合は満点として扱う。
    pub fn from_report(report: &ComplianceReport) -> Self {
        let scores = ComponentScores {
            consent_management: consent_score(report),
            data_subject_rights: rights_score(report),
            data_retention: report.retention_compliance.unwrap_or(100).min(100),
            third_party_management: third_party_score(report),
            security_measures: 100,
        };

        let overall_score = (f64::from(scores.consent_management) * 0.25
            + f64::from(scores.data_subject_rights) * 0.25
            + f64::from(scores.data_retention) * 0.20
            + f64::from(scores.third_party_management) * 0.15
            + f64::from(scores.security_measures) * 0.15)
            .round() as u32;

        let mut high_risk_items = Vec::new();
        if scores.consent_management < HIGH_RISK_THRESHOLD {
            high_risk_items
                .push("Consent management system requires immediate attention".to_string());
        }
        if scores.data_subject_rights < HIGH_RISK_THRESHOLD {
            high_risk_items
                .push("Data subject rights fulfillment is below acceptable threshold".to_string());
        }
        if scores.security_measures < HIGH_RISK_THRESHOLD {
            high_risk_items.push("Security measures need urgent strengthening".to_string());
        }

        let mut medium_risk_items = Vec::new();
        if is_medium_risk(scores.data_retention) {
            medium_risk_items.push("Data retention policies need optimization".to_string());
        }
        if is_medium_risk(scores.third_party_management) {
            medium_risk_items
                .push("Third-party processor management requires enhancement".to_string());
        }

        Self {
            overall_score,
            grade: Grade::from_score(overall_score),
            scores,
            high_risk_items,
            medium_risk_items,
            high_risk_processing: high_risk_processing(report),
            recommendations: recommendations(overall_score),
            roadmap: roadmap(overall_score),
        }
    }
}

/// 有効な同意の比率 + 基礎点30
fn consent_score(report: &ComplianceReport) -> u32 {
    let ratio = report.active_consents as f64 / report.total_data_records.max(1) as f64 * 100.0;
    (ratio.min(100.0) + 30.0).min(100.0).round() as u32
}

/// 期限超過の比率による減点 + 基礎点70
fn rights_score(report: &ComplianceReport) -> u32 {
    let overdue = report.overdue_requests as f64 / report.pending_requests.max(1) as f64 * 100.0;
    ((100.0 - overdue).max(0.0) + 70.0).min(100.0).round() as u32
}

fn third_party_score(report: &ComplianceReport) -> u32 {
    if report.third_party_processors == 0 {
        return 100;
    }

    let adjustment: i32 = SAFEGUARD_ADJUSTMENTS.iter().map(|(_, points)| points).sum();
    (DPA_COMPLIANCE + adjustment).clamp(0, 100) as u32
}

fn is_medium_risk(score: u32) -> bool {
    (HIGH_RISK_THRESHOLD..MEDIUM_RISK_CEILING).contains(&score)
}

fn recommendations(overall_score: u32) -> Vec<String> {
    let items: [&str; 2] = if overall_score >= 90 {
        [
            "Maintain excellence through continuous monitoring",
            "Consider privacy certification (ISO 27701)",
        ]
    } else if overall_score >= 80 {
        [
            "Implement advanced privacy technologies",
            "Enhanced staff training programs",
        ]
    } else {
        [
            "Urgent compliance improvement program required",
            "Consider external privacy audit",
        ]
    };

    items.iter().map(|s| s.to_string()).collect()
}

fn high_risk_processing(report: &ComplianceReport) -> Vec<String> {
    let mut items = Vec::new();

    let legitimate_interest = report
        .records_by_legal_basis
        .get(&LegalBasis::LegitimateInterest)
        .copied()
        .unwrap_or(0);
    if legitimate_interest > 0 {
        items.push("Legitimate interest processing requires ongoing balancing test".to_string());
    }

    // 処理者は全て十分性認定のない米国事業者
    items.push("Cross-border data transfers to non-adequate countries".to_string());
    items.push("Processing of educational records (special category potential)".to_string());
    items
}

fn roadmap(overall_score: u32) -> Vec<String> {
    let quarters: [&str; 4] = if overall_score >= 90 {
        [
            "Q1: Privacy certification pursuit (ISO 27701)",
            "Q2: Advanced anonymization techniques implementation",
            "Q3: AI governance framework deployment",
            "Q4: Continuous monitoring automation enhancement",
        ]
    } else if overall_score >= 80 {
        [
            "Q1: Data subject rights automation enhancement",
            "Q2: Third-party processor audit program",
            "Q3: Staff privacy training certification",
            "Q4: Privacy-by-design maturity assessment",
        ]
    } else {
        [
            "Q1: URGENT - Address high-risk compliance gaps",
            "Q2: Implement comprehensive consent management",
            "Q3: Enhance data subject rights processes",
            "Q4: Complete security measures upgrade",
        ]
    };

    quarters.iter().map(|s| s.to_string()).collect()
}
