//! Runs the fixed demo questions through one chat session and prints the
//! answers.

use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;
use umkm_advisor::{knowledge::KnowledgeStore, AdvisorConfig, SessionManager, SessionServices};

const DEMO_QUESTIONS: &[&str] = &[
    "Saya mau buka usaha bakso, bantu analisis SWOT",
    "Modal saya 20 juta, margin 25%, hitung proyeksi",
    "Usaha fashion cocoknya di platform apa?",
    "Cara daftar KUR yang mudah",
    "Berapa lama proses perizinan UMKM?",
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let config = AdvisorConfig::from_env()?;
    let knowledge = Arc::new(KnowledgeStore::initialize(&config).await?);
    let services = SessionServices::initialize(&config, knowledge.clone()).await?;
    let profiles = services.profiles.clone();
    let sessions = SessionManager::from_config(services, &config);

    info!(questions = DEMO_QUESTIONS.len(), "INA demo starting");

    let session = sessions.get_or_create(None).await;
    let mut session = session.lock().await;

    for question in DEMO_QUESTIONS {
        let reply = session.send(question).await;
        println!("Q: {}", question);
        println!("A: {}", reply.run.answer);
        println!("{}", "-".repeat(50));
    }

    knowledge.shutdown().await?;
    profiles.shutdown().await;

    Ok(())
}
