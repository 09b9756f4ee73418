//! 故障路径：消息日志读写失败、操作中途取消、慢速客户端驱逐、无法解析的指令。

use std::sync::Arc;

use application::relay::{ChannelMessage, ErrorPayload, MessageEdit};
use application::{ClientCommand, MessageRepository, ServerEvent, UNKNOWN_USERNAME};
use chrono::Utc;
use config::RelayConfig;
use domain::{Message, MessageContent, MessageId, MessageTarget, RoomName, UserId};
use infrastructure::InMemoryMessageRepository;
use tests::{FailingMessageRepository, GatedMessageRepository, TestClient, TestEnvironment};
use uuid::Uuid;

fn say(content: &str) -> ClientCommand {
    ClientCommand::Message(ChannelMessage {
        room: "general".into(),
        content: content.into(),
    })
}

fn single_error(events: &[ServerEvent]) -> &ErrorPayload {
    match events {
        [ServerEvent::JoinRoomError(payload)]
        | [ServerEvent::EditMessageError(payload)]
        | [ServerEvent::DeleteMessageError(payload)] => payload,
        other => panic!("unexpected events: {other:?}"),
    }
}

async fn post(client: &mut TestClient, content: &str) -> Uuid {
    client.send(say(content)).await;
    client
        .drain()
        .into_iter()
        .find_map(|event| match event {
            ServerEvent::Message(message) => Some(message.id),
            _ => None,
        })
        .expect("message")
}

#[tokio::test]
async fn failed_append_reports_error_and_broadcasts_nothing() {
    let messages = Arc::new(FailingMessageRepository::new());
    let env = TestEnvironment::with_message_repository(messages.clone()).await;
    let mut alice = env.join("alice").await;
    let mut bob = env.join("bob").await;
    alice.drain();

    messages.fail_writes(true);
    alice.send(say("lost")).await;

    let events = alice.drain();
    assert_eq!(events.len(), 1);
    match &events[0] {
        ServerEvent::MessageError(payload) => {
            assert_eq!(payload.code, "INTERNAL_ERROR");
            assert!(!payload.message.contains("unavailable"));
        }
        other => panic!("unexpected event: {other:?}"),
    }
    assert!(bob.drain().is_empty());

    messages.fail_writes(false);
    alice.send(say("delivered")).await;
    assert!(bob
        .drain()
        .iter()
        .any(|event| matches!(event, ServerEvent::Message(m) if m.content == "delivered")));
}

#[tokio::test]
async fn slow_consumer_is_evicted_and_announced() {
    let env = TestEnvironment::with_relay_config(RelayConfig {
        outbound_capacity: 4,
        ..RelayConfig::default()
    })
    .await;
    let mut alice = env.join("alice").await;

    // bob 从不读取：握手阶段的 userJoined 和 previousMessages 已占用两格
    env.register("bob").await;
    let mut bob = env.connect("bob").await;
    alice.drain();
    assert_eq!(env.relay().online_connections().await, 2);

    for n in 0..3 {
        alice.send(say(&format!("message {n}"))).await;
        let events = alice.drain();
        assert!(events
            .iter()
            .any(|event| matches!(event, ServerEvent::Message(_))));
        if n == 2 {
            assert!(events.iter().any(|event| matches!(
                event,
                ServerEvent::UserLeft(notice) if notice.user.username == "bob"
            )));
        }
    }

    assert_eq!(env.relay().online_connections().await, 1);
    assert!(bob.is_evicted());
    assert!(!alice.is_evicted());
}

#[tokio::test]
async fn unparseable_command_is_answered_to_sender_only() {
    let env = TestEnvironment::start().await;
    let mut alice = env.join("alice").await;
    let mut bob = env.join("bob").await;
    alice.drain();

    env.relay()
        .reject(alice.connection, "unrecognised command")
        .await;

    match alice.drain().as_slice() {
        [ServerEvent::InvalidCommand(payload)] => assert_eq!(payload.code, "INVALID_COMMAND"),
        other => panic!("unexpected events: {other:?}"),
    }
    assert!(bob.drain().is_empty());
}

#[tokio::test]
async fn commands_from_unknown_connections_are_ignored() {
    let env = TestEnvironment::start().await;
    let mut alice = env.join("alice").await;
    alice.disconnect().await;

    alice.send(say("ghost")).await;
    assert!(alice.is_evicted());
    assert_eq!(env.relay().online_connections().await, 0);
}

#[tokio::test]
async fn failed_history_read_leaves_join_uncommitted() {
    let messages = Arc::new(FailingMessageRepository::new());
    let env = TestEnvironment::with_message_repository(messages.clone()).await;
    let mut alice = env.join("alice").await;
    let mut bob = env.join("bob").await;
    alice.send(ClientCommand::CreateRoom("tech".into())).await;
    alice.drain();
    bob.drain();

    messages.fail_reads(true);
    bob.send(ClientCommand::JoinRoom("tech".into())).await;
    assert_eq!(single_error(&bob.drain()).code, "INTERNAL_ERROR");
    assert!(alice.drain().is_empty());

    bob.send(ClientCommand::Message(ChannelMessage {
        room: "tech".into(),
        content: "am I in?".into(),
    }))
    .await;
    match bob.drain().as_slice() {
        [ServerEvent::MessageError(payload)] => assert_eq!(payload.code, "NOT_MEMBER"),
        other => panic!("unexpected events: {other:?}"),
    }

    messages.fail_reads(false);
    bob.send(ClientCommand::JoinRoom("tech".into())).await;
    assert!(bob
        .drain()
        .iter()
        .any(|event| matches!(event, ServerEvent::PreviousMessages(history) if history.room == "tech")));
    assert!(alice.drain().iter().any(|event| matches!(
        event,
        ServerEvent::UserJoinedChannel(joined)
            if joined.room == "tech" && joined.user.username == "bob"
    )));
}

#[tokio::test]
async fn failed_history_read_on_connect_keeps_the_connection() {
    let messages = Arc::new(FailingMessageRepository::new());
    let env = TestEnvironment::with_message_repository(messages.clone()).await;
    let mut alice = env.join("alice").await;
    env.register("bob").await;

    messages.fail_reads(true);
    let mut bob = env.connect("bob").await;

    let events = bob.drain();
    assert!(!events
        .iter()
        .any(|event| matches!(event, ServerEvent::PreviousMessages(_))));
    assert!(events.iter().any(|event| matches!(
        event,
        ServerEvent::UserJoined(notice) if notice.user.username == "bob"
    )));
    assert!(alice.drain().iter().any(|event| matches!(
        event,
        ServerEvent::UserJoined(notice) if notice.user.username == "bob"
    )));
    assert_eq!(env.relay().online_connections().await, 2);

    messages.fail_reads(false);
    bob.send(say("still here")).await;
    assert!(alice
        .drain()
        .iter()
        .any(|event| matches!(event, ServerEvent::Message(m) if m.content == "still here")));
}

#[tokio::test]
async fn failed_update_reports_error_and_broadcasts_nothing() {
    let messages = Arc::new(FailingMessageRepository::new());
    let env = TestEnvironment::with_message_repository(messages.clone()).await;
    let mut alice = env.join("alice").await;
    let mut bob = env.join("bob").await;
    alice.drain();
    let message_id = post(&mut alice, "draft").await;
    bob.drain();

    messages.fail_writes(true);
    alice
        .send(ClientCommand::EditMessage(MessageEdit {
            message_id,
            content: "revised".into(),
        }))
        .await;

    let events = alice.drain();
    let payload = single_error(&events);
    assert!(matches!(&events[0], ServerEvent::EditMessageError(_)));
    assert_eq!(payload.code, "INTERNAL_ERROR");
    assert!(bob.drain().is_empty());

    let stored = messages
        .find_by_id(MessageId::new(message_id))
        .await
        .unwrap()
        .expect("stored message");
    assert_eq!(stored.content.as_str(), "draft");
    assert!(!stored.edited);
}

#[tokio::test]
async fn failed_delete_reports_error_and_broadcasts_nothing() {
    let messages = Arc::new(FailingMessageRepository::new());
    let env = TestEnvironment::with_message_repository(messages.clone()).await;
    let mut alice = env.join("alice").await;
    let mut bob = env.join("bob").await;
    alice.drain();
    let message_id = post(&mut alice, "keep me").await;
    bob.drain();

    messages.fail_writes(true);
    alice.send(ClientCommand::DeleteMessage(message_id)).await;

    let events = alice.drain();
    let payload = single_error(&events);
    assert!(matches!(&events[0], ServerEvent::DeleteMessageError(_)));
    assert_eq!(payload.code, "INTERNAL_ERROR");
    assert!(bob.drain().is_empty());
    assert!(messages
        .find_by_id(MessageId::new(message_id))
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn failed_lookup_reports_edit_error() {
    let messages = Arc::new(FailingMessageRepository::new());
    let env = TestEnvironment::with_message_repository(messages.clone()).await;
    let mut alice = env.join("alice").await;
    let mut bob = env.join("bob").await;
    alice.drain();
    let message_id = post(&mut alice, "draft").await;
    bob.drain();

    messages.fail_reads(true);
    alice
        .send(ClientCommand::EditMessage(MessageEdit {
            message_id,
            content: "revised".into(),
        }))
        .await;

    assert_eq!(single_error(&alice.drain()).code, "INTERNAL_ERROR");
    assert!(bob.drain().is_empty());
}

#[tokio::test]
async fn cancelled_caller_does_not_interrupt_a_dispatched_command() {
    let messages = Arc::new(GatedMessageRepository::new());
    let env = TestEnvironment::with_message_repository(messages.clone()).await;
    let mut alice = env.join("alice").await;
    let mut bob = env.join("bob").await;
    alice.drain();

    messages.hold_appends();
    let caller = tokio::spawn({
        let relay = env.relay().clone();
        let connection = alice.connection;
        async move { relay.dispatch(connection, say("in flight")).await }
    });
    messages.append_started().await;
    caller.abort();
    assert!(caller.await.unwrap_err().is_cancelled());
    messages.release_appends();

    // 状态锁按先来先得分配，取得锁时派发的指令已经完成
    assert_eq!(env.relay().online_connections().await, 2);

    for events in [alice.drain(), bob.drain()] {
        assert!(events
            .iter()
            .any(|event| matches!(event, ServerEvent::Message(m) if m.content == "in flight")));
    }
    let general = messages
        .list_room(&RoomName::general(), 10)
        .await
        .unwrap();
    assert_eq!(general.len(), 1);
}

#[tokio::test]
async fn history_from_a_deleted_sender_uses_the_placeholder_name() {
    let messages = Arc::new(InMemoryMessageRepository::new());
    let ghost = UserId::new(Uuid::new_v4());
    messages
        .append(Message::new(
            MessageId::new(Uuid::new_v4()),
            ghost,
            MessageContent::new("left behind", 500).unwrap(),
            MessageTarget::Room(RoomName::general()),
            Utc::now(),
        ))
        .await
        .unwrap();

    let env = TestEnvironment::with_message_repository(messages).await;
    env.register("alice").await;
    let mut alice = env.connect("alice").await;

    let history = alice
        .drain()
        .into_iter()
        .find_map(|event| match event {
            ServerEvent::PreviousMessages(history) if history.room == "general" => Some(history),
            _ => None,
        })
        .expect("general history");
    assert_eq!(history.messages.len(), 1);
    assert_eq!(history.messages[0].sender.id, Uuid::from(ghost));
    assert_eq!(history.messages[0].sender.username, UNKNOWN_USERNAME);
}
