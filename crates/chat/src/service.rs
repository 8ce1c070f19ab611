//! The chat service: one request in, one reply out.
//!
//! For each turn:
//! 1. load and order the conversation
//! 2. resolve the image and subject
//! 3. compose the prompt and call the generator
//! 4. persist the user and assistant turns (attributed requests only)
//!
//! Every step runs strictly in order, each under its own deadline. Nothing
//! is retried. The reply is only returned once persistence has committed.

use serde::{Deserialize, Serialize};
use skald_config::AppConfig;
use skald_core::{
    DecodePolicy, Error, GenerationRequest, Generator, InpaintRequest, Result, Turn, TurnStore,
    non_empty,
};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::history::History;
use crate::locks::{ConversationGuard, ConversationLocks};
use crate::prompt;
use crate::reconcile::{self, Persistence};

/// Content of the assistant turn recorded for an image edit.
pub const INPAINT_REPLY: &str = "Here is your inpainted image.";

/// Run `fut` under a deadline, mapping expiry to [`Error::Timeout`].
pub(crate) async fn with_deadline<F, T>(stage: &'static str, limit: Duration, fut: F) -> Result<T>
where
    F: Future<Output = T>,
{
    tokio::time::timeout(limit, fut).await.map_err(|_| {
        warn!(stage, secs = limit.as_secs(), "Deadline expired");
        Error::Timeout {
            stage,
            secs: limit.as_secs(),
        }
    })
}

/// An incoming conversational turn.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub chat_id: String,

    /// The new instruction
    #[serde(default, alias = "message")]
    pub content: String,

    #[serde(default)]
    pub user_id: String,

    /// Explicit subject; falls back to the most recent participant
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object: Option<String>,

    /// Explicit image; falls back to the most recent image in the conversation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_name: Option<String>,
}

impl ChatRequest {
    pub fn new(chat_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            chat_id: chat_id.into(),
            content: content.into(),
            ..Default::default()
        }
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = user_id.into();
        self
    }

    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }
}

/// The result of a handled turn.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    /// The assistant turn returned to the caller
    pub reply: Turn,
    pub persistence: Persistence,
    /// History records dropped as undecodable
    pub skipped: usize,
}

/// The result of a handled image edit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InpaintOutcome {
    #[serde(rename = "img")]
    pub image: String,

    #[serde(rename = "img_name", skip_serializing_if = "Option::is_none")]
    pub image_name: Option<String>,

    #[serde(skip)]
    pub persistence: Persistence,
}

/// Deadlines and policies for the service.
#[derive(Debug, Clone)]
pub struct ChatOptions {
    pub store_timeout: Duration,
    pub generation_timeout: Duration,
    pub decode_policy: DecodePolicy,
    pub serialize_conversations: bool,
    /// Longest wait for another turn on the same conversation
    pub lock_timeout: Duration,
}

impl Default for ChatOptions {
    fn default() -> Self {
        Self {
            store_timeout: Duration::from_secs(5),
            generation_timeout: Duration::from_secs(60),
            decode_policy: DecodePolicy::default(),
            serialize_conversations: true,
            lock_timeout: Duration::from_secs(60),
        }
    }
}

impl ChatOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            store_timeout: Duration::from_secs(config.chat.store_timeout_secs),
            generation_timeout: Duration::from_secs(config.chat.generation_timeout_secs),
            decode_policy: config.store.decode_policy,
            serialize_conversations: config.chat.serialize_conversations,
            lock_timeout: Duration::from_secs(config.chat.lock_timeout_secs),
        }
    }
}

/// Orchestrates history, generation and persistence for each request.
pub struct ChatService {
    store: Arc<dyn TurnStore>,
    generator: Arc<dyn Generator>,
    options: ChatOptions,
    locks: Option<ConversationLocks>,
}

impl ChatService {
    pub fn new(
        store: Arc<dyn TurnStore>,
        generator: Arc<dyn Generator>,
        options: ChatOptions,
    ) -> Self {
        let locks = options
            .serialize_conversations
            .then(ConversationLocks::new);
        Self {
            store,
            generator,
            options,
            locks,
        }
    }

    pub fn store(&self) -> &Arc<dyn TurnStore> {
        &self.store
    }

    /// Check the store answers within the store deadline.
    pub async fn ping(&self) -> Result<()> {
        with_deadline("store ping", self.options.store_timeout, self.store.ping()).await??;
        Ok(())
    }

    /// Wait for exclusive access to a conversation, if serialization is on.
    async fn lock(&self, chat_id: &str) -> Result<Option<ConversationGuard>> {
        match &self.locks {
            Some(locks) => {
                let guard = with_deadline(
                    "conversation lock",
                    self.options.lock_timeout,
                    locks.acquire(chat_id),
                )
                .await?;
                Ok(Some(guard))
            }
            None => Ok(None),
        }
    }

    /// Handle one conversational turn.
    pub async fn handle_turn(&self, request: ChatRequest) -> Result<TurnOutcome> {
        if request.chat_id.is_empty() {
            return Err(Error::BadRequest("chat_id is required".into()));
        }
        let started = Instant::now();
        let chat_id = request.chat_id.as_str();

        let _guard = self.lock(chat_id).await?;

        let history = with_deadline(
            "history read",
            self.options.store_timeout,
            History::load(self.store.as_ref(), chat_id, self.options.decode_policy),
        )
        .await??;

        let resolved_image = history
            .resolve_image(request.image.as_deref())
            .map(str::to_string);

        let user_turn = Turn::user(chat_id, request.content.as_str())
            .with_user_id(request.user_id.as_str())
            .with_image(resolved_image.as_deref())
            .with_image_name(request.image_name.as_deref());

        let object = history
            .resolve_subject(request.object.as_deref(), &user_turn)
            .to_string();

        let generation_request = GenerationRequest {
            prompt: prompt::compose(history.turns(), &user_turn, &request.content),
            object,
            chat_id: chat_id.to_string(),
            user_id: request.user_id.clone(),
            image: resolved_image.clone(),
        };

        debug!(
            chat_id,
            history_len = history.len(),
            resolved_image = resolved_image.as_deref().unwrap_or(""),
            object = %generation_request.object,
            "Calling generator"
        );

        let reply = with_deadline(
            "generation",
            self.options.generation_timeout,
            self.generator.generate(generation_request),
        )
        .await??;

        let assistant_turn =
            reconcile::assistant_turn(chat_id, &request.user_id, &reply, user_turn.timestamp);

        let persistence = with_deadline(
            "persistence",
            self.options.store_timeout,
            reconcile::persist(
                self.store.as_ref(),
                &request.user_id,
                &[user_turn, assistant_turn.clone()],
            ),
        )
        .await??;

        info!(
            chat_id,
            user_id = %request.user_id,
            persisted = persistence.is_written(),
            skipped = history.skipped(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Turn handled"
        );

        Ok(TurnOutcome {
            reply: assistant_turn,
            persistence,
            skipped: history.skipped(),
        })
    }

    /// Handle an image edit and record its result in the conversation.
    pub async fn handle_inpaint(&self, request: InpaintRequest) -> Result<InpaintOutcome> {
        if request.chat_id.is_empty() {
            return Err(Error::BadRequest("chat_id is required".into()));
        }
        if request.image.is_empty() {
            return Err(Error::BadRequest("image is required".into()));
        }
        let started = Instant::now();

        let _guard = self.lock(&request.chat_id).await?;

        let chat_id = request.chat_id.clone();
        let user_id = request.user_id.clone();
        let image_name = non_empty(request.image_name.as_deref()).map(str::to_string);

        let reply = with_deadline(
            "inpaint",
            self.options.generation_timeout,
            self.generator.inpaint(request),
        )
        .await??;

        let turn = Turn::assistant(chat_id.as_str(), INPAINT_REPLY)
            .with_user_id(user_id.as_str())
            .with_image(Some(reply.image.as_str()))
            .with_image_name(image_name.as_deref());

        let persistence = with_deadline(
            "persistence",
            self.options.store_timeout,
            reconcile::persist(self.store.as_ref(), &user_id, std::slice::from_ref(&turn)),
        )
        .await??;

        info!(
            chat_id = %chat_id,
            user_id = %user_id,
            persisted = persistence.is_written(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Inpaint handled"
        );

        Ok(InpaintOutcome {
            image: reply.image,
            image_name,
            persistence,
        })
    }
}
