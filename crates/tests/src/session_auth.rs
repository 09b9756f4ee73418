//! 握手认证：缺失、过期、伪造的令牌都不会留下在线记录。

use std::sync::Arc;

use application::{ApplicationError, AuthError, Clock, NotFoundError, SessionAuthenticator};
use chrono::{Duration, Utc};
use domain::Timestamp;
use infrastructure::JwtSessionAuthenticator;
use tests::TestEnvironment;

struct FixedClock(Timestamp);

impl Clock for FixedClock {
    fn now(&self) -> Timestamp {
        self.0
    }
}

async fn assert_rejected(env: &TestEnvironment, token: Option<&str>, expected: AuthError) {
    let (outbound, _frames) = env.relay().open_outbound();
    match env.relay().connect(token, outbound).await {
        Err(ApplicationError::Auth(err)) => assert_eq!(err, expected),
        other => panic!("expected {expected:?}, got {other:?}"),
    }
    assert_eq!(env.relay().online_connections().await, 0);
}

#[tokio::test]
async fn missing_or_blank_token_is_rejected() {
    let env = TestEnvironment::start().await;
    assert_rejected(&env, None, AuthError::MissingToken).await;
    assert_rejected(&env, Some("   "), AuthError::MissingToken).await;
}

#[tokio::test]
async fn forged_token_is_rejected() {
    let env = TestEnvironment::start().await;
    assert_rejected(&env, Some("not.a.jwt"), AuthError::InvalidSignature).await;

    let user = env.register("alice").await;
    let mut foreign = env.config.jwt.clone();
    foreign.secret = "some-other-secret-that-is-long-enough-too".into();
    let forger = JwtSessionAuthenticator::new(&foreign, Arc::new(application::SystemClock));
    let token = forger.issue(user.id, &user.username).expect("issue");
    assert_rejected(&env, Some(&token), AuthError::InvalidSignature).await;
}

#[tokio::test]
async fn expired_token_is_rejected() {
    let env = TestEnvironment::start().await;
    let user = env.register("alice").await;

    let two_hours_ago = Utc::now() - Duration::hours(2);
    let issuer = JwtSessionAuthenticator::new(&env.config.jwt, Arc::new(FixedClock(two_hours_ago)));
    let token = issuer.issue(user.id, &user.username).expect("issue");

    assert_rejected(&env, Some(&token), AuthError::Expired).await;
}

#[tokio::test]
async fn token_for_deleted_user_is_rejected() {
    let env = TestEnvironment::start().await;
    let ghost = env.register("ghost").await;
    let other = TestEnvironment::start().await;

    // 用相同密钥签发，但该用户只存在于另一个环境
    let issuer = JwtSessionAuthenticator::new(&other.config.jwt, Arc::new(application::SystemClock));
    let token = issuer.issue(ghost.id, &ghost.username).expect("issue");

    let (outbound, _frames) = other.relay().open_outbound();
    let result = other.relay().connect(Some(&token), outbound).await;
    assert!(matches!(
        result,
        Err(ApplicationError::NotFound(NotFoundError::User))
    ));
    assert_eq!(other.relay().online_connections().await, 0);
}

#[tokio::test]
async fn identity_comes_from_the_store_not_the_token() {
    let env = TestEnvironment::start().await;
    env.register("alice").await;
    let stale_token = env.token("alice").await;

    let mut first = env.connect("alice").await;
    first
        .send(application::ClientCommand::SetNickname("alicia".into()))
        .await;
    first.disconnect().await;
    first.drain();

    let identity = env
        .relay()
        .authenticate(Some(&stale_token))
        .await
        .expect("authenticate");
    assert_eq!(identity.username.as_str(), "alicia");
}
