use std::sync::atomic::{AtomicBool, Ordering};

use application::MessageRepository;
use async_trait::async_trait;
use domain::{Message, MessageId, RepositoryError, RoomName, UserId};
use infrastructure::InMemoryMessageRepository;
use tokio::sync::Notify;

/// 可以按需让读或写失败的消息日志，其余情况委托给内存实现。
#[derive(Default)]
pub struct FailingMessageRepository {
    inner: InMemoryMessageRepository,
    fail_writes: AtomicBool,
    fail_reads: AtomicBool,
}

impl FailingMessageRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), RepositoryError> {
        Self::unavailable(&self.fail_writes)
    }

    fn check_read(&self) -> Result<(), RepositoryError> {
        Self::unavailable(&self.fail_reads)
    }

    fn unavailable(flag: &AtomicBool) -> Result<(), RepositoryError> {
        if flag.load(Ordering::SeqCst) {
            Err(RepositoryError::storage("message log unavailable"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl MessageRepository for FailingMessageRepository {
    async fn append(&self, message: Message) -> Result<Message, RepositoryError> {
        self.check()?;
        self.inner.append(message).await
    }

    async fn find_by_id(&self, id: MessageId) -> Result<Option<Message>, RepositoryError> {
        self.check_read()?;
        self.inner.find_by_id(id).await
    }

    async fn list_room(
        &self,
        room: &RoomName,
        limit: usize,
    ) -> Result<Vec<Message>, RepositoryError> {
        self.check_read()?;
        self.inner.list_room(room, limit).await
    }

    async fn list_direct(
        &self,
        a: UserId,
        b: UserId,
        limit: usize,
    ) -> Result<Vec<Message>, RepositoryError> {
        self.check_read()?;
        self.inner.list_direct(a, b, limit).await
    }

    async fn update(&self, message: Message) -> Result<Message, RepositoryError> {
        self.check()?;
        self.inner.update(message).await
    }

    async fn delete(&self, id: MessageId) -> Result<(), RepositoryError> {
        self.check()?;
        self.inner.delete(id).await
    }
}

/// 追加消息时可以被挂起的消息日志，用来在操作中途制造取消。
#[derive(Default)]
pub struct GatedMessageRepository {
    inner: InMemoryMessageRepository,
    holding: AtomicBool,
    entered: Notify,
    released: Notify,
}

impl GatedMessageRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// 之后的 `append` 会停在写入之前，直到 `release_appends`
    pub fn hold_appends(&self) {
        self.holding.store(true, Ordering::SeqCst);
    }

    pub fn release_appends(&self) {
        self.holding.store(false, Ordering::SeqCst);
        self.released.notify_one();
    }

    /// 等待某次 `append` 进入挂起状态
    pub async fn append_started(&self) {
        self.entered.notified().await;
    }
}

#[async_trait]
impl MessageRepository for GatedMessageRepository {
    async fn append(&self, message: Message) -> Result<Message, RepositoryError> {
        if self.holding.load(Ordering::SeqCst) {
            self.entered.notify_one();
            self.released.notified().await;
        }
        self.inner.append(message).await
    }

    async fn find_by_id(&self, id: MessageId) -> Result<Option<Message>, RepositoryError> {
        self.inner.find_by_id(id).await
    }

    async fn list_room(
        &self,
        room: &RoomName,
        limit: usize,
    ) -> Result<Vec<Message>, RepositoryError> {
        self.inner.list_room(room, limit).await
    }

    async fn list_direct(
        &self,
        a: UserId,
        b: UserId,
        limit: usize,
    ) -> Result<Vec<Message>, RepositoryError> {
        self.inner.list_direct(a, b, limit).await
    }

    async fn update(&self, message: Message) -> Result<Message, RepositoryError> {
        self.inner.update(message).await
    }

    async fn delete(&self, id: MessageId) -> Result<(), RepositoryError> {
        self.inner.delete(id).await
    }
}
