use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use gdpr_ledger::compliance::retention::retention_statement;
use gdpr_ledger::compliance::subject::{redact_subject_id, subject_id_from_email};
use gdpr_ledger::compliance::{
    ComplianceAssessment, ConsentGrant, ConsentMethod, DataContent, DataType, LegalBasis,
    PersonalDataStore, Purpose, RequestType,
};
use gdpr_ledger::config::{AppConfig, ConfigLoader};
use gdpr_ledger::logging::{init_logging, LogConfig};
use serde_json::json;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "gdpr-ledger",
    about = "Personal data ledger with consent tracking and data subject rights",
    version
)]
struct Cli {
    /// Configuration file (defaults to ./gdpr-ledger.toml when present)
    #[arg(long, short, env = "GDPR_CONFIG")]
    config: Option<PathBuf>,

    /// Override the configured log level
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a walkthrough of collection, consent and data subject requests (default command)
    Demo,
    /// Derive the data subject id for an email address
    Subject { email: String },
    /// Show the retention statement for a processing purpose
    Retention { purpose: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = ConfigLoader::new()
        .load_from_file(cli.config.as_deref())
        .load_from_env()
        .build()?;

    let log_config = LogConfig::from_settings(&config.logging).with_level(cli.log_level);
    let _guard = init_logging(&log_config)?;

    match cli.command.unwrap_or(Command::Demo) {
        Command::Demo => run_demo(config).await,
        Command::Subject { email } => {
            let subject_id = subject_id_from_email(&email)?;
            print_json(&json!({
                "data_subject_id": subject_id,
                "display": redact_subject_id(&subject_id),
            }))
        }
        Command::Retention { purpose } => print_json(&json!({
            "purpose": purpose,
            "retention": retention_statement(&purpose),
        })),
    }
}

async fn run_demo(config: AppConfig) -> Result<()> {
    let store = PersonalDataStore::from_settings(config.compliance);
    let subject_id = subject_id_from_email("jane@example.com")?;

    let mut content = DataContent::new();
    content.insert("email".to_string(), json!("jane@example.com"));
    content.insert("name".to_string(), json!("Jane Doe"));
    store
        .collect_personal_data(
            &subject_id,
            DataType::Contact,
            content,
            LegalBasis::Consent,
            Purpose::Communication,
            None,
        )
        .await?;

    let mut payment = DataContent::new();
    payment.insert("payment_reference".to_string(), json!("pi_3Nf2"));
    payment.insert("phone".to_string(), json!("+44 20 7946 0958"));
    store
        .collect_personal_data(
            &subject_id,
            DataType::Payment,
            payment,
            LegalBasis::Contract,
            Purpose::PaymentProcessing,
            Some(84),
        )
        .await?;

    store
        .record_consent(
            ConsentGrant::new(
                subject_id.as_str(),
                "communication",
                ConsentMethod::ExplicitCheckbox,
                "I agree to receive lesson updates by email",
            )
            .with_user_agent("gdpr-ledger-demo"),
        )
        .await?;

    let access = store
        .process_data_subject_request(&subject_id, RequestType::Access, None)
        .await?;
    let portability = store
        .process_data_subject_request(&subject_id, RequestType::Portability, None)
        .await?;

    let access = store.await_request(&access.request_id).await?;
    let portability = store.await_request(&portability.request_id).await?;

    store.withdraw_consent(&subject_id, "communication").await?;

    let erasure = store
        .process_data_subject_request(&subject_id, RequestType::Erasure, None)
        .await?;
    let erasure = store.await_request(&erasure.request_id).await?;

    let report = store.get_compliance_report().await;
    let assessment = ComplianceAssessment::from_report(&report);

    print_json(&json!({
        "data_subject_id": redact_subject_id(&subject_id),
        "requests": [access, portability, erasure],
        "report": report,
        "assessment": assessment,
    }))
}

fn print_json(value: &serde_json::Value) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("failed to render output")?;
    println!("{}", rendered);
    Ok(())
}
