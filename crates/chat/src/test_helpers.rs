//! Shared fakes for chat tests.

use skald_core::{
    GenerationError, GenerationReply, GenerationRequest, Generator, InpaintReply, InpaintRequest,
    RecordBatch, StoreError, Turn, TurnStore,
};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// A generator that replies from a script and records every request.
pub struct ScriptedGenerator {
    replies: Mutex<Vec<Result<GenerationReply, GenerationError>>>,
    requests: Mutex<Vec<GenerationRequest>>,
    inpaints: Mutex<Vec<InpaintRequest>>,
    delay: Duration,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl ScriptedGenerator {
    pub fn new(replies: Vec<Result<GenerationReply, GenerationError>>) -> Self {
        Self {
            replies: Mutex::new(replies),
            requests: Mutex::new(Vec::new()),
            inpaints: Mutex::new(Vec::new()),
            delay: Duration::ZERO,
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    /// Reply with `text` (and an optional image) once.
    pub fn text(text: &str, image: Option<&str>) -> Self {
        Self::new(vec![Ok(reply(text, image))])
    }

    pub fn failing(error: GenerationError) -> Self {
        Self::new(vec![Err(error)])
    }

    /// Sleep this long inside each call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn inpaint_requests(&self) -> Vec<InpaintRequest> {
        self.inpaints.lock().unwrap().clone()
    }

    /// Most calls ever running at the same time.
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

pub fn reply(text: &str, image: Option<&str>) -> GenerationReply {
    GenerationReply {
        content: text.into(),
        image: image.map(String::from),
        image_name: None,
    }
}

#[async_trait::async_trait]
impl Generator for ScriptedGenerator {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(
        &self,
        request: GenerationRequest,
    ) -> Result<GenerationReply, GenerationError> {
        self.requests.lock().unwrap().push(request);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let mut replies = self.replies.lock().unwrap();
        if replies.is_empty() {
            panic!("ScriptedGenerator: no more replies");
        }
        replies.remove(0)
    }

    async fn inpaint(&self, request: InpaintRequest) -> Result<InpaintReply, GenerationError> {
        let image = format!("inpainted-{}", request.image);
        self.inpaints.lock().unwrap().push(request);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(InpaintReply { image })
    }
}

/// A store whose every operation fails as unreachable.
pub struct UnreachableStore;

#[async_trait::async_trait]
impl TurnStore for UnreachableStore {
    fn name(&self) -> &str {
        "unreachable"
    }

    async fn find_by_chat(&self, _chat_id: &str) -> Result<RecordBatch, StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }

    async fn find_by_user(&self, _user_id: &str) -> Result<RecordBatch, StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }

    async fn insert_many(&self, _turns: &[Turn]) -> Result<(), StoreError> {
        Err(StoreError::WriteFailed("connection refused".into()))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }
}

/// A store that reads fine (always empty) but rejects writes.
pub struct ReadOnlyStore;

#[async_trait::async_trait]
impl TurnStore for ReadOnlyStore {
    fn name(&self) -> &str {
        "read_only"
    }

    async fn find_by_chat(&self, _chat_id: &str) -> Result<RecordBatch, StoreError> {
        Ok(RecordBatch::default())
    }

    async fn find_by_user(&self, _user_id: &str) -> Result<RecordBatch, StoreError> {
        Ok(RecordBatch::default())
    }

    async fn insert_many(&self, _turns: &[Turn]) -> Result<(), StoreError> {
        Err(StoreError::WriteFailed("read-only".into()))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// An empty store that answers only after a delay.
pub struct SlowStore {
    read_delay: Duration,
    write_delay: Duration,
    completed_writes: AtomicUsize,
}

impl SlowStore {
    /// Reads and pings take `delay`; writes are immediate.
    pub fn reads(delay: Duration) -> Self {
        Self {
            read_delay: delay,
            write_delay: Duration::ZERO,
            completed_writes: AtomicUsize::new(0),
        }
    }

    /// Writes take `delay`; reads are immediate.
    pub fn writes(delay: Duration) -> Self {
        Self {
            read_delay: Duration::ZERO,
            write_delay: delay,
            completed_writes: AtomicUsize::new(0),
        }
    }

    pub fn completed_writes(&self) -> usize {
        self.completed_writes.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl TurnStore for SlowStore {
    fn name(&self) -> &str {
        "slow"
    }

    async fn find_by_chat(&self, _chat_id: &str) -> Result<RecordBatch, StoreError> {
        tokio::time::sleep(self.read_delay).await;
        Ok(RecordBatch::default())
    }

    async fn find_by_user(&self, _user_id: &str) -> Result<RecordBatch, StoreError> {
        tokio::time::sleep(self.read_delay).await;
        Ok(RecordBatch::default())
    }

    async fn insert_many(&self, _turns: &[Turn]) -> Result<(), StoreError> {
        tokio::time::sleep(self.write_delay).await;
        self.completed_writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        tokio::time::sleep(self.read_delay).await;
        Ok(())
    }
}
