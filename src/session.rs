//! Chat sessions
//!
//! A `ChatSession` owns one conversation memory. The `SessionManager` hands
//! out sessions behind a per-session mutex, so turns of the same chat run
//! one at a time while different chats proceed independently.
//!
//! Sessions idle for longer than the idle timeout are dropped, and the
//! least recently used one makes room once the manager is full. A session
//! whose handle is still held elsewhere is never evicted.

use crate::agent::{AgentOrchestrator, AgentSettings};
use crate::audit::{AuditLog, RunRecord};
use crate::config::AdvisorConfig;
use crate::error::AdvisorError;
use crate::knowledge::KnowledgeStore;
use crate::llm::model_from_settings;
use crate::memory::ConversationMemory;
use crate::models::{AgentRun, Profile, Utterance};
use crate::store::ProfileStore;
use crate::tools::create_default_registry;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const DEFAULT_SESSION_IDLE_TIMEOUT: Duration = Duration::from_secs(60 * 60);
pub const DEFAULT_MAX_SESSIONS: usize = 1000;

const FALLBACK_BUSINESS_TYPE: &str = "umum";
const FALLBACK_LOCATION: &str = "Indonesia";

/// Canned requests offered by the chat front-end
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum QuickAction {
    Swot,
    #[serde(alias = "keuangan")]
    Finance,
    Platform,
}

impl QuickAction {
    /// Render the utterance for this action from the saved profile
    pub fn prompt(&self, profile: Option<&Profile>) -> String {
        let business_type = profile
            .map(|p| p.business_type.as_str())
            .filter(|s| !s.is_empty())
            .unwrap_or(FALLBACK_BUSINESS_TYPE);
        let location = profile
            .map(|p| p.location.as_str())
            .filter(|s| !s.is_empty())
            .unwrap_or(FALLBACK_LOCATION);

        match self {
            QuickAction::Swot => format!(
                "Buat analisis SWOT untuk usaha {} di {}",
                business_type, location
            ),
            QuickAction::Finance => {
                "Hitung proyeksi keuangan dengan modal 10000000 dan margin 30%".to_string()
            }
            QuickAction::Platform => format!(
                "Rekomendasi platform digital untuk usaha {}",
                business_type
            ),
        }
    }
}

impl FromStr for QuickAction {
    type Err = AdvisorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "swot" => Ok(QuickAction::Swot),
            "finance" | "keuangan" => Ok(QuickAction::Finance),
            "platform" => Ok(QuickAction::Platform),
            other => Err(AdvisorError::InvalidInput(format!(
                "unknown quick action '{}'; expected swot, finance or platform",
                other
            ))),
        }
    }
}

/// Result of one chat turn as returned to front-ends
#[derive(Debug, Clone, Serialize)]
pub struct ChatReply {
    pub session_id: Uuid,
    pub run_id: Uuid,
    pub question: String,
    #[serde(flatten)]
    pub run: AgentRun,
}

/// Shared services every session talks to
#[derive(Clone)]
pub struct SessionServices {
    pub orchestrator: Arc<AgentOrchestrator>,
    pub profiles: Arc<ProfileStore>,
    pub audit: Arc<AuditLog>,
}

impl SessionServices {
    /// Wire the tool registry, language model, orchestrator and profile
    /// store from configuration. Fails on duplicate tools or a bad database.
    pub async fn initialize(config: &AdvisorConfig, knowledge: Arc<KnowledgeStore>) -> crate::Result<Self> {
        let registry = Arc::new(create_default_registry(knowledge)?);
        let model = model_from_settings(&config.llm)?;
        let orchestrator = Arc::new(AgentOrchestrator::new(
            model,
            registry,
            AgentSettings::from_config(config),
        ));
        let profiles = Arc::new(ProfileStore::initialize(config.database_url.as_deref()).await?);

        Ok(Self {
            orchestrator,
            profiles,
            audit: Arc::new(AuditLog::with_capacity(config.audit_capacity)),
        })
    }
}

pub struct ChatSession {
    id: Uuid,
    memory: ConversationMemory,
    services: SessionServices,
}

impl ChatSession {
    pub fn new(id: Uuid, memory_window: usize, services: SessionServices) -> Self {
        Self {
            id,
            memory: ConversationMemory::new(memory_window),
            services,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn history(&self) -> Vec<Utterance> {
        self.memory.snapshot()
    }

    pub fn memory_window(&self) -> usize {
        self.memory.window()
    }

    /// Forget the conversation so far. The interaction log is kept.
    pub fn clear_history(&mut self) {
        self.memory.clear();
        info!(session_id = %self.id, "Chat history cleared");
    }

    /// Run one user turn. Logging the interaction and the audit record is
    /// best effort and never changes the reply.
    pub async fn send(&mut self, text: &str) -> ChatReply {
        let started = Instant::now();
        let run = self.services.orchestrator.chat(&mut self.memory, text).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        info!(
            session_id = %self.id,
            state = %run.state,
            iterations = run.iterations,
            elapsed_ms,
            "Chat turn finished"
        );

        let profile_id = match self.services.profiles.load().await {
            Ok(profile) => profile.map(|p| p.id),
            Err(e) => {
                warn!("Could not load profile for interaction log: {}", e);
                None
            }
        };
        if let Err(e) = self
            .services
            .profiles
            .record_interaction(profile_id, text, &run.answer)
            .await
        {
            warn!("Failed to record interaction: {}", e);
        }

        let record = RunRecord::from_run(self.id, text, &run, elapsed_ms);
        let run_id = match self.services.audit.record(record).await {
            Ok(id) => id,
            Err(e) => {
                warn!("Failed to store audit record: {}", e);
                Uuid::nil()
            }
        };

        ChatReply {
            session_id: self.id,
            run_id,
            question: text.to_string(),
            run,
        }
    }

    /// Turn a quick action into an utterance and send it like any other
    pub async fn quick_action(&mut self, action: QuickAction) -> ChatReply {
        let profile = match self.services.profiles.load().await {
            Ok(profile) => profile.map(|p| p.profile),
            Err(e) => {
                warn!("Could not load profile for quick action: {}", e);
                None
            }
        };

        let prompt = action.prompt(profile.as_ref());
        self.send(&prompt).await
    }
}

struct SessionSlot {
    session: Arc<Mutex<ChatSession>>,
    last_used: Instant,
}

impl SessionSlot {
    fn in_use(&self) -> bool {
        Arc::strong_count(&self.session) > 1
    }
}

/// Registry of live chat sessions
pub struct SessionManager {
    sessions: RwLock<HashMap<Uuid, SessionSlot>>,
    services: SessionServices,
    memory_window: usize,
    idle_timeout: Duration,
    max_sessions: usize,
}

impl SessionManager {
    pub fn new(services: SessionServices, memory_window: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            services,
            memory_window,
            idle_timeout: DEFAULT_SESSION_IDLE_TIMEOUT,
            max_sessions: DEFAULT_MAX_SESSIONS,
        }
    }

    pub fn from_config(services: SessionServices, config: &AdvisorConfig) -> Self {
        Self::new(services, config.memory_window)
            .with_limits(config.session_idle_timeout, config.max_sessions)
    }

    pub fn with_limits(mut self, idle_timeout: Duration, max_sessions: usize) -> Self {
        self.idle_timeout = idle_timeout;
        self.max_sessions = max_sessions.max(1);
        self
    }

    pub fn services(&self) -> &SessionServices {
        &self.services
    }

    /// Fetch a session, creating it when the id is new or absent. Creating
    /// one sweeps out idle sessions first.
    pub async fn get_or_create(&self, session_id: Option<Uuid>) -> Arc<Mutex<ChatSession>> {
        let id = session_id.unwrap_or_else(Uuid::new_v4);
        let now = Instant::now();
        let mut sessions = self.sessions.write().await;

        if let Some(slot) = sessions.get_mut(&id) {
            slot.last_used = now;
            return slot.session.clone();
        }

        self.evict(&mut sessions, now);

        info!(session_id = %id, "New chat session");
        let session = Arc::new(Mutex::new(ChatSession::new(
            id,
            self.memory_window,
            self.services.clone(),
        )));
        sessions.insert(
            id,
            SessionSlot {
                session: session.clone(),
                last_used: now,
            },
        );
        session
    }

    pub async fn get(&self, session_id: Uuid) -> Option<Arc<Mutex<ChatSession>>> {
        let mut sessions = self.sessions.write().await;
        let slot = sessions.get_mut(&session_id)?;
        slot.last_used = Instant::now();
        Some(slot.session.clone())
    }

    /// Drop idle sessions, then the least recently used ones until there
    /// is room for one more
    fn evict(&self, sessions: &mut HashMap<Uuid, SessionSlot>, now: Instant) {
        let before = sessions.len();

        sessions.retain(|_, slot| {
            slot.in_use() || now.duration_since(slot.last_used) < self.idle_timeout
        });

        while sessions.len() >= self.max_sessions {
            let oldest = sessions
                .iter()
                .filter(|(_, slot)| !slot.in_use())
                .min_by_key(|(_, slot)| slot.last_used)
                .map(|(id, _)| *id);

            match oldest {
                Some(id) => {
                    sessions.remove(&id);
                }
                None => break,
            }
        }

        let evicted = before - sessions.len();
        if evicted > 0 {
            debug!(evicted, remaining = sessions.len(), "Chat sessions evicted");
        }
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::{seed, HashedEmbedder};
    use crate::llm::KeywordModel;
    use crate::models::{AgentState, Role};

    async fn services() -> SessionServices {
        let store = KnowledgeStore::new(Box::new(HashedEmbedder::default()));
        store.add(seed::seed_documents()).await.unwrap();
        let registry = Arc::new(create_default_registry(Arc::new(store)).unwrap());

        SessionServices {
            orchestrator: Arc::new(AgentOrchestrator::new(
                Arc::new(KeywordModel),
                registry,
                AgentSettings::default(),
            )),
            profiles: Arc::new(ProfileStore::in_memory()),
            audit: Arc::new(AuditLog::new()),
        }
    }

    #[test]
    fn test_quick_action_prompts() {
        let profile = Profile {
            owner_name: "Siti".to_string(),
            business_type: "kuliner".to_string(),
            location: "Bandung".to_string(),
        };

        assert_eq!(
            QuickAction::Swot.prompt(Some(&profile)),
            "Buat analisis SWOT untuk usaha kuliner di Bandung"
        );
        assert_eq!(
            QuickAction::Swot.prompt(None),
            "Buat analisis SWOT untuk usaha umum di Indonesia"
        );
        assert_eq!(
            QuickAction::Platform.prompt(None),
            "Rekomendasi platform digital untuk usaha umum"
        );
        assert_eq!(
            QuickAction::Finance.prompt(Some(&profile)),
            "Hitung proyeksi keuangan dengan modal 10000000 dan margin 30%"
        );
    }

    #[test]
    fn test_quick_action_parsing() {
        assert_eq!("SWOT".parse::<QuickAction>().unwrap(), QuickAction::Swot);
        assert_eq!("keuangan".parse::<QuickAction>().unwrap(), QuickAction::Finance);
        assert!(matches!(
            "laporan".parse::<QuickAction>(),
            Err(AdvisorError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_send_records_history_interaction_and_audit() {
        let services = services().await;
        let manager = SessionManager::new(services.clone(), 10);

        let session = manager.get_or_create(None).await;
        let mut session = session.lock().await;
        let reply = session.send("Cara daftar KUR yang mudah").await;

        assert_eq!(reply.run.state, AgentState::Done);
        assert_eq!(reply.session_id, session.id());

        let history = session.history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role(), Role::User);
        assert_eq!(history[0].text(), "Cara daftar KUR yang mudah");

        let logged = services.profiles.interactions(10).await.unwrap();
        assert_eq!(logged.len(), 1);
        assert_eq!(logged[0].answer, reply.run.answer);

        assert!(services.audit.verify_integrity(reply.run_id).await.unwrap());
        assert_eq!(
            services.audit.list_for_session(session.id()).await.unwrap(),
            vec![reply.run_id]
        );
    }

    #[tokio::test]
    async fn test_quick_action_uses_saved_profile() {
        let services = services().await;
        services
            .profiles
            .save(Profile {
                owner_name: "Budi".to_string(),
                business_type: "fashion".to_string(),
                location: "Surabaya".to_string(),
            })
            .await
            .unwrap();

        let mut session = ChatSession::new(Uuid::new_v4(), 10, services.clone());
        let reply = session.quick_action(QuickAction::Platform).await;

        assert_eq!(reply.question, "Rekomendasi platform digital untuk usaha fashion");
        assert!(reply.run.answer.contains("TikTok Shop"));

        let interactions = services.profiles.interactions(1).await.unwrap();
        assert!(interactions[0].profile_id.is_some());
    }

    #[tokio::test]
    async fn test_sessions_are_independent() {
        let manager = SessionManager::new(services().await, 10);
        let a = manager.get_or_create(None).await;
        let b = manager.get_or_create(None).await;

        a.lock().await.send("Halo, usaha fashion cocoknya di platform apa?").await;

        assert_eq!(a.lock().await.history().len(), 2);
        assert!(b.lock().await.history().is_empty());
        assert_eq!(manager.len().await, 2);

        let id = a.lock().await.id();
        let again = manager.get_or_create(Some(id)).await;
        assert!(Arc::ptr_eq(&a, &again));
    }

    #[tokio::test]
    async fn test_capacity_evicts_least_recently_used() {
        let manager = SessionManager::new(services().await, 10)
            .with_limits(DEFAULT_SESSION_IDLE_TIMEOUT, 100);

        let first = manager.get_or_create(None).await.lock().await.id();
        for _ in 0..500 {
            let session = manager.get_or_create(None).await;
            session.lock().await.send("Halo").await;
        }

        assert_eq!(manager.len().await, 100);
        assert!(manager.get(first).await.is_none());
    }

    #[tokio::test]
    async fn test_recently_used_session_survives_capacity() {
        let manager = SessionManager::new(services().await, 10)
            .with_limits(DEFAULT_SESSION_IDLE_TIMEOUT, 2);

        let a = manager.get_or_create(None).await.lock().await.id();
        tokio::time::sleep(Duration::from_millis(5)).await;
        let b = manager.get_or_create(None).await.lock().await.id();
        tokio::time::sleep(Duration::from_millis(5)).await;
        manager.get(a).await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        manager.get_or_create(None).await;

        assert!(manager.get(a).await.is_some());
        assert!(manager.get(b).await.is_none());
    }

    #[tokio::test]
    async fn test_idle_sessions_expire_but_held_ones_stay() {
        let manager = SessionManager::new(services().await, 10)
            .with_limits(Duration::from_millis(20), DEFAULT_MAX_SESSIONS);

        let idle = manager.get_or_create(None).await.lock().await.id();
        let held = manager.get_or_create(None).await;
        let held_id = held.lock().await.id();

        tokio::time::sleep(Duration::from_millis(50)).await;
        manager.get_or_create(None).await;

        assert!(manager.get(idle).await.is_none());
        assert!(manager.get(held_id).await.is_some());
        assert_eq!(manager.len().await, 2);
    }

    #[tokio::test]
    async fn test_clear_history() {
        let manager = SessionManager::new(services().await, 4);
        let session = manager.get_or_create(None).await;
        let mut session = session.lock().await;

        session.send("Halo").await;
        assert_eq!(session.history().len(), 2);

        session.clear_history();
        assert!(session.history().is_empty());
        assert_eq!(session.memory_window(), 4);
    }
}
