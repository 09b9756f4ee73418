//! 实时中继核心
//!
//! 负责连接生命周期、房间加入/离开、消息扇出、私信、昵称修改、
//! 输入状态以及编辑/删除的传播。
//!
//! 所有操作都在同一把异步互斥锁下执行：在线连接表、订阅关系的修改
//! 以及操作内部对消息日志和凭据库的调用都被串行化，因此每个房间的
//! 事件只有一个权威顺序，落库顺序与广播顺序一致。

mod command;
mod event;
mod sanitize;

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use config::RelayConfig;
use domain::{ConnectionId, Message, MessageId, MessageTarget, RepositoryError, RoomName, UserId};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
    clock::Clock,
    dto::{MessageDto, RoomDto, UserSummary},
    error::{ApplicationError, AuthError, NotFoundError, PermissionError},
    outbound::{Delivery, Frame, Outbound},
    presence::PresenceRegistry,
    repository::MessageRepository,
    services::{RoomDirectory, UserService},
    session::{SessionAuthenticator, SessionIdentity},
};

pub use command::{
    ChannelMessage, ClientCommand, DirectMessage, MessageEdit, Operation, TypingUpdate,
};
pub use event::{
    ChannelMembership, ErrorPayload, MessageRemoval, NickChange, PresenceNotice, PrivateHistory,
    RoomHistory, RoomRef, ServerEvent, TypingNotice,
};
pub use sanitize::sanitize_content;

pub struct ChatRelayDependencies {
    pub user_service: Arc<UserService>,
    pub room_directory: Arc<RoomDirectory>,
    pub message_repository: Arc<dyn MessageRepository>,
    pub authenticator: Arc<dyn SessionAuthenticator>,
    pub clock: Arc<dyn Clock>,
}

#[derive(Default)]
struct RelayState {
    presence: PresenceRegistry,
    /// 发送队列已满、等待驱逐的连接
    lagging: Vec<ConnectionId>,
}

pub struct ChatRelay {
    deps: ChatRelayDependencies,
    config: RelayConfig,
    state: Mutex<RelayState>,
}

impl ChatRelay {
    pub fn new(deps: ChatRelayDependencies, config: RelayConfig) -> Self {
        Self {
            deps,
            config,
            state: Mutex::new(RelayState::default()),
        }
    }

    /// 按配置容量创建一条连接的发送队列。
    pub fn open_outbound(&self) -> (Outbound, mpsc::Receiver<Frame>) {
        Outbound::channel(self.config.outbound_capacity)
    }

    /// 握手校验。令牌里的用户名可能已过时，身份以凭据库为准。
    pub async fn authenticate(
        &self,
        token: Option<&str>,
    ) -> Result<SessionIdentity, ApplicationError> {
        let token = token
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or(AuthError::MissingToken)?;
        let claimed = self.deps.authenticator.verify(token)?;
        let user = self.deps.user_service.find_by_id(claimed.user_id).await?;
        Ok(SessionIdentity {
            user_id: user.id,
            username: user.username,
        })
    }

    /// 校验令牌并登记连接。失败时不会留下任何在线记录。
    pub async fn connect(
        &self,
        token: Option<&str>,
        outbound: Outbound,
    ) -> Result<ConnectionId, ApplicationError> {
        let identity = self.authenticate(token).await?;
        self.attach(identity, outbound).await
    }

    /// 登记已认证的连接：加入 `general`，订阅用户的全部房间，
    /// 向所有连接广播 `userJoined`，并推送各房间的历史消息。
    pub async fn attach(
        &self,
        identity: SessionIdentity,
        outbound: Outbound,
    ) -> Result<ConnectionId, ApplicationError> {
        let connection = ConnectionId::generate();
        let general = RoomName::general();
        let mut state = self.state.lock().await;

        self.deps
            .room_directory
            .add_member(&general, identity.user_id)
            .await?;
        let mut rooms = self.deps.room_directory.rooms_of(identity.user_id).await?;
        rooms.sort_by_key(|room| (!room.is_general(), room.clone()));

        state
            .presence
            .register(connection, identity.clone(), outbound);
        for room in &rooms {
            state.presence.subscribe(connection, room.clone());
        }
        info!(
            connection_id = %connection,
            user_id = %identity.user_id,
            username = %identity.username,
            rooms = rooms.len(),
            "连接已登记"
        );

        let notice = ServerEvent::UserJoined(PresenceNotice {
            user: UserSummary::from(&identity),
            connections: state.presence.connections_of(identity.user_id).len(),
        });
        self.broadcast_all(&mut state, &notice);

        for room in &rooms {
            match self.room_history(room).await {
                Ok(history) => {
                    self.send_to(&mut state, [connection], &ServerEvent::PreviousMessages(history))
                }
                Err(err) => {
                    error!(room = %room, error = %err, "加载历史消息失败");
                }
            }
        }

        self.reap(&mut state);
        Ok(connection)
    }

    /// 处理一条客户端指令。失败只以 `<operation>Error` 事件回给发起连接。
    pub async fn handle(&self, connection: ConnectionId, command: ClientCommand) {
        let operation = command.operation();
        let mut state = self.state.lock().await;
        let Some(caller) = state
            .presence
            .lookup(connection)
            .map(|presence| presence.identity.clone())
        else {
            debug!(connection_id = %connection, "忽略来自未登记连接的指令");
            return;
        };

        let result = match command {
            ClientCommand::JoinRoom(room) => {
                self.join_room(&mut state, connection, &caller, &room).await
            }
            ClientCommand::LeaveRoom(room) => self.leave_room(&mut state, &caller, &room).await,
            ClientCommand::Message(payload) => {
                self.send_message(&mut state, &caller, payload).await
            }
            ClientCommand::PrivateMessage(payload) => {
                self.send_private_message(&mut state, connection, &caller, payload)
                    .await
            }
            ClientCommand::Typing(payload) => self.typing(&mut state, &caller, payload).await,
            ClientCommand::EditMessage(payload) => {
                self.edit_message(&mut state, &caller, payload).await
            }
            ClientCommand::DeleteMessage(message_id) => {
                self.delete_message(&mut state, &caller, MessageId::from(message_id))
                    .await
            }
            ClientCommand::CreateRoom(name) => self.create_room(&mut state, &caller, &name).await,
            ClientCommand::DeleteRoom(name) => self.delete_room(&mut state, &name).await,
            ClientCommand::SetNickname(name) => {
                self.set_nickname(&mut state, connection, &caller, &name)
                    .await
            }
            ClientCommand::ListRooms(query) => {
                self.list_rooms(&mut state, connection, query.as_deref())
                    .await
            }
            ClientCommand::GetUserList => {
                let users = state
                    .presence
                    .online_users()
                    .iter()
                    .map(UserSummary::from)
                    .collect();
                self.send_to(&mut state, [connection], &ServerEvent::UserList(users));
                Ok(())
            }
            ClientCommand::PrivateHistory(with) => {
                self.private_history(&mut state, connection, &caller, &with)
                    .await
            }
        };

        if let Err(err) = result {
            if err.is_internal() {
                error!(connection_id = %connection, ?operation, error = %err, "操作失败");
            } else {
                debug!(connection_id = %connection, ?operation, error = %err, "操作被拒绝");
            }
            self.send_to(
                &mut state,
                [connection],
                &ServerEvent::failure(operation, &err),
            );
        }
        self.reap(&mut state);
    }

    /// 在独立任务中处理指令。调用方被取消时，已开始的操作仍会执行完毕，
    /// 不会在存储写入与广播之间中断。
    pub fn dispatch(
        self: &Arc<Self>,
        connection: ConnectionId,
        command: ClientCommand,
    ) -> JoinHandle<()> {
        let relay = Arc::clone(self);
        tokio::spawn(async move { relay.handle(connection, command).await })
    }

    /// 回复无法解析的指令。
    pub async fn reject(&self, connection: ConnectionId, reason: impl Into<String>) {
        let mut state = self.state.lock().await;
        self.send_to(
            &mut state,
            [connection],
            &ServerEvent::invalid_command(reason),
        );
        self.reap(&mut state);
    }

    /// 传输层关闭时调用。只移除连接，用户在房间目录中的成员身份保留。
    pub async fn disconnect(&self, connection: ConnectionId) {
        let mut state = self.state.lock().await;
        if let Some(presence) = state.presence.unregister(connection) {
            info!(
                connection_id = %connection,
                user_id = %presence.identity.user_id,
                "连接已注销"
            );
            self.announce_departure(&mut state, &presence.identity);
        }
        self.reap(&mut state);
    }

    pub async fn online_connections(&self) -> usize {
        self.state.lock().await.presence.len()
    }

    async fn join_room(
        &self,
        state: &mut RelayState,
        connection: ConnectionId,
        caller: &SessionIdentity,
        room: &str,
    ) -> Result<(), ApplicationError> {
        let name = RoomName::parse(room)?;
        // 任何会失败的读取都先于成员变更完成
        self.deps.room_directory.find_by_name(&name).await?;
        let history = self.room_history(&name).await?;

        let newly_added = self
            .deps
            .room_directory
            .add_member(&name, caller.user_id)
            .await?;
        state.presence.subscribe_user(caller.user_id, &name);
        self.send_to(state, [connection], &ServerEvent::PreviousMessages(history));

        if newly_added {
            let event = ServerEvent::UserJoinedChannel(ChannelMembership {
                room: name.to_string(),
                user: UserSummary::from(caller),
            });
            let targets = state.presence.subscribers(&name);
            self.send_to(state, targets, &event);
        }
        Ok(())
    }

    async fn leave_room(
        &self,
        state: &mut RelayState,
        caller: &SessionIdentity,
        room: &str,
    ) -> Result<(), ApplicationError> {
        let name = RoomName::parse(room)?;
        if name.is_general() {
            return Err(PermissionError::ProtectedRoom.into());
        }
        let was_member = self
            .deps
            .room_directory
            .remove_member(&name, caller.user_id)
            .await?;
        if !was_member {
            return Err(PermissionError::NotMember.into());
        }

        // 先通知房间（包括离开者自己），再取消订阅
        let event = ServerEvent::UserLeftChannel(ChannelMembership {
            room: name.to_string(),
            user: UserSummary::from(caller),
        });
        let targets = state.presence.subscribers(&name);
        self.send_to(state, targets, &event);
        state.presence.unsubscribe_user(caller.user_id, &name);
        Ok(())
    }

    async fn send_message(
        &self,
        state: &mut RelayState,
        caller: &SessionIdentity,
        payload: ChannelMessage,
    ) -> Result<(), ApplicationError> {
        let name = RoomName::parse(payload.room)?;
        let room = self.deps.room_directory.find_by_name(&name).await?;
        if !room.is_member(caller.user_id) {
            return Err(PermissionError::NotMember.into());
        }
        let content = sanitize_content(&payload.content, self.config.max_message_length)?;

        let message = Message::new(
            MessageId::from(Uuid::new_v4()),
            caller.user_id,
            content,
            MessageTarget::Room(name.clone()),
            self.deps.clock.now(),
        );
        let stored = self.deps.message_repository.append(message).await?;

        let event = ServerEvent::Message(MessageDto::new(&stored, UserSummary::from(caller), None));
        let targets = state.presence.subscribers(&name);
        self.send_to(state, targets, &event);
        Ok(())
    }

    async fn send_private_message(
        &self,
        state: &mut RelayState,
        connection: ConnectionId,
        caller: &SessionIdentity,
        payload: DirectMessage,
    ) -> Result<(), ApplicationError> {
        let recipient = self.deps.user_service.find_by_username(&payload.to).await?;
        let content = sanitize_content(&payload.content, self.config.max_message_length)?;

        let message = Message::new(
            MessageId::from(Uuid::new_v4()),
            caller.user_id,
            content,
            MessageTarget::Direct(recipient.id),
            self.deps.clock.now(),
        );
        let stored = self.deps.message_repository.append(message).await?;

        let event = ServerEvent::PrivateMessage(MessageDto::new(
            &stored,
            UserSummary::from(caller),
            Some(UserSummary::from(&recipient)),
        ));
        // 收件人离线时消息仍已入库，可通过 privateHistory 取回
        let mut targets: BTreeSet<ConnectionId> =
            state.presence.connections_of(recipient.id).into_iter().collect();
        targets.insert(connection);
        self.send_to(state, targets, &event);
        Ok(())
    }

    async fn typing(
        &self,
        state: &mut RelayState,
        caller: &SessionIdentity,
        payload: TypingUpdate,
    ) -> Result<(), ApplicationError> {
        let name = RoomName::parse(payload.room)?;
        let room = self.deps.room_directory.find_by_name(&name).await?;
        if !room.is_member(caller.user_id) {
            return Err(PermissionError::NotMember.into());
        }

        let own: BTreeSet<ConnectionId> = state
            .presence
            .connections_of(caller.user_id)
            .into_iter()
            .collect();
        let targets: Vec<ConnectionId> = state
            .presence
            .subscribers(&name)
            .into_iter()
            .filter(|id| !own.contains(id))
            .collect();
        let event = ServerEvent::Typing(TypingNotice {
            room: name.to_string(),
            username: caller.username.to_string(),
            is_typing: payload.is_typing,
        });
        self.send_to(state, targets, &event);
        Ok(())
    }

    async fn edit_message(
        &self,
        state: &mut RelayState,
        caller: &SessionIdentity,
        payload: MessageEdit,
    ) -> Result<(), ApplicationError> {
        let mut message = self
            .owned_message(caller, MessageId::from(payload.message_id))
            .await?;
        let content = sanitize_content(&payload.content, self.config.max_message_length)?;
        message.edit(content);

        let stored = self
            .deps
            .message_repository
            .update(message)
            .await
            .map_err(Self::missing_message)?;

        let dto = self.message_dto(&stored).await?;
        let targets = self.audience(state, &stored);
        self.send_to(state, targets, &ServerEvent::MessageUpdated(dto));
        Ok(())
    }

    async fn delete_message(
        &self,
        state: &mut RelayState,
        caller: &SessionIdentity,
        message_id: MessageId,
    ) -> Result<(), ApplicationError> {
        let message = self.owned_message(caller, message_id).await?;
        self.deps
            .message_repository
            .delete(message.id)
            .await
            .map_err(Self::missing_message)?;

        let event = ServerEvent::MessageDeleted(MessageRemoval {
            message_id: message.id.0,
            room: message.room().map(ToString::to_string),
        });
        let targets = self.audience(state, &message);
        self.send_to(state, targets, &event);
        Ok(())
    }

    async fn create_room(
        &self,
        state: &mut RelayState,
        caller: &SessionIdentity,
        name: &str,
    ) -> Result<(), ApplicationError> {
        let created = self.deps.room_directory.create(name).await?;
        // 创建者成为首个成员
        self.deps
            .room_directory
            .add_member(&created.name, caller.user_id)
            .await?;
        state.presence.subscribe_user(caller.user_id, &created.name);
        let room = self.deps.room_directory.find_by_name(&created.name).await?;
        info!(room = %room.name, user_id = %caller.user_id, "房间已创建");

        let event = ServerEvent::ChannelCreated(RoomDto::from(&room));
        self.broadcast_all(state, &event);
        Ok(())
    }

    async fn delete_room(&self, state: &mut RelayState, name: &str) -> Result<(), ApplicationError> {
        let name = RoomName::parse(name)?;
        let room = self.deps.room_directory.delete(&name).await?;
        state.presence.unsubscribe_all(&room.name);
        info!(room = %room.name, "房间已删除");

        let event = ServerEvent::ChannelDeleted(RoomRef {
            name: room.name.to_string(),
        });
        self.broadcast_all(state, &event);
        Ok(())
    }

    async fn set_nickname(
        &self,
        state: &mut RelayState,
        connection: ConnectionId,
        caller: &SessionIdentity,
        name: &str,
    ) -> Result<(), ApplicationError> {
        let (old, user) = self.deps.user_service.rename(caller.user_id, name).await?;
        state.presence.rename(user.id, &user.username);

        // 只通知该连接所在房间的订阅者，每个连接一次
        let rooms = state
            .presence
            .lookup(connection)
            .map(|presence| presence.rooms.clone())
            .unwrap_or_default();
        let mut targets = BTreeSet::from([connection]);
        for room in &rooms {
            targets.extend(state.presence.subscribers(room));
        }

        let event = ServerEvent::UserNickChanged(NickChange {
            user_id: user.id.0,
            old: old.to_string(),
            new: user.username.to_string(),
        });
        self.send_to(state, targets, &event);
        Ok(())
    }

    async fn list_rooms(
        &self,
        state: &mut RelayState,
        connection: ConnectionId,
        query: Option<&str>,
    ) -> Result<(), ApplicationError> {
        let rooms = self.deps.room_directory.search(query, true).await?;
        let event = ServerEvent::ChannelList(rooms.iter().map(RoomDto::from).collect());
        self.send_to(state, [connection], &event);
        Ok(())
    }

    async fn private_history(
        &self,
        state: &mut RelayState,
        connection: ConnectionId,
        caller: &SessionIdentity,
        with: &str,
    ) -> Result<(), ApplicationError> {
        let other = self.deps.user_service.find_by_username(with).await?;
        let messages = self
            .deps
            .message_repository
            .list_direct(caller.user_id, other.id, self.config.history_limit)
            .await?;

        let me = UserSummary::from(caller);
        let them = UserSummary::from(&other);
        let messages = messages
            .iter()
            .map(|message| {
                if message.is_sent_by(caller.user_id) {
                    MessageDto::new(message, me.clone(), Some(them.clone()))
                } else {
                    MessageDto::new(message, them.clone(), Some(me.clone()))
                }
            })
            .collect();

        let event = ServerEvent::PreviousPrivateMessages(PrivateHistory {
            with: them,
            messages,
        });
        self.send_to(state, [connection], &event);
        Ok(())
    }

    /// 取出消息并确认调用者是发送者。
    async fn owned_message(
        &self,
        caller: &SessionIdentity,
        message_id: MessageId,
    ) -> Result<Message, ApplicationError> {
        let message = self
            .deps
            .message_repository
            .find_by_id(message_id)
            .await?
            .ok_or(NotFoundError::Message)?;
        if !message.is_sent_by(caller.user_id) {
            return Err(PermissionError::NotSender.into());
        }
        Ok(message)
    }

    async fn room_history(&self, room: &RoomName) -> Result<RoomHistory, ApplicationError> {
        let messages = self
            .deps
            .message_repository
            .list_room(room, self.config.history_limit)
            .await?;
        let users = self
            .resolve_users(messages.iter().map(|message| message.sender_id))
            .await?;
        let messages = messages
            .iter()
            .map(|message| MessageDto::new(message, Self::summary(&users, message.sender_id), None))
            .collect();
        Ok(RoomHistory {
            room: room.to_string(),
            messages,
        })
    }

    async fn message_dto(&self, message: &Message) -> Result<MessageDto, ApplicationError> {
        let ids = std::iter::once(message.sender_id).chain(message.recipient());
        let users = self.resolve_users(ids).await?;
        let recipient = message
            .recipient()
            .map(|recipient| Self::summary(&users, recipient));
        Ok(MessageDto::new(
            message,
            Self::summary(&users, message.sender_id),
            recipient,
        ))
    }

    /// 批量查询用户名，已不存在的用户跳过。
    async fn resolve_users(
        &self,
        ids: impl Iterator<Item = UserId>,
    ) -> Result<HashMap<UserId, UserSummary>, ApplicationError> {
        let ids: BTreeSet<UserId> = ids.collect();
        let mut users = HashMap::with_capacity(ids.len());
        for id in ids {
            match self.deps.user_service.find_by_id(id).await {
                Ok(user) => {
                    users.insert(id, UserSummary::from(&user));
                }
                Err(ApplicationError::NotFound(_)) => {}
                Err(err) => return Err(err),
            }
        }
        Ok(users)
    }

    fn summary(users: &HashMap<UserId, UserSummary>, id: UserId) -> UserSummary {
        users
            .get(&id)
            .cloned()
            .unwrap_or_else(|| UserSummary::unknown(id))
    }

    /// 房间消息发给房间订阅者；私信发给双方的所有连接。
    fn audience(&self, state: &RelayState, message: &Message) -> BTreeSet<ConnectionId> {
        match &message.target {
            MessageTarget::Room(room) => state.presence.subscribers(room).into_iter().collect(),
            MessageTarget::Direct(recipient) => state
                .presence
                .connections_of(message.sender_id)
                .into_iter()
                .chain(state.presence.connections_of(*recipient))
                .collect(),
        }
    }

    fn missing_message(err: RepositoryError) -> ApplicationError {
        match err {
            RepositoryError::NotFound => NotFoundError::Message.into(),
            other => ApplicationError::Persistence(other),
        }
    }

    fn announce_departure(&self, state: &mut RelayState, identity: &SessionIdentity) {
        let notice = ServerEvent::UserLeft(PresenceNotice {
            user: UserSummary::from(identity),
            connections: state.presence.connections_of(identity.user_id).len(),
        });
        self.broadcast_all(state, &notice);
    }

    fn broadcast_all(&self, state: &mut RelayState, event: &ServerEvent) {
        let targets = state.presence.all();
        self.send_to(state, targets, event);
    }

    /// 事件只序列化一次；投递不阻塞，队列满的连接记入待驱逐列表。
    fn send_to(
        &self,
        state: &mut RelayState,
        targets: impl IntoIterator<Item = ConnectionId>,
        event: &ServerEvent,
    ) {
        let frame: Frame = match serde_json::to_string(event) {
            Ok(json) => Arc::from(json),
            Err(err) => {
                warn!(error = %err, "事件序列化失败");
                return;
            }
        };

        for id in targets {
            let delivery = match state.presence.outbound(id) {
                Some(outbound) => outbound.deliver(&frame),
                None => continue,
            };
            match delivery {
                Delivery::Sent => {}
                Delivery::Lagging => {
                    warn!(connection_id = %id, "发送队列已满");
                    state.lagging.push(id);
                }
                Delivery::Closed => {
                    debug!(connection_id = %id, "连接已关闭，丢弃事件");
                }
            }
        }
    }

    /// 驱逐慢速连接。丢弃其发送端会关闭队列，套接字写任务随之结束。
    fn reap(&self, state: &mut RelayState) {
        while let Some(id) = state.lagging.pop() {
            let Some(presence) = state.presence.unregister(id) else {
                continue;
            };
            warn!(
                connection_id = %id,
                user_id = %presence.identity.user_id,
                "慢速连接已被驱逐"
            );
            self.announce_departure(state, &presence.identity);
        }
    }
}
