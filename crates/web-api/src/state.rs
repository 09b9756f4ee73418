use std::sync::Arc;

use application::{ChatRelay, UserService};

#[derive(Clone)]
pub struct AppState {
    pub user_service: Arc<UserService>,
    pub relay: Arc<ChatRelay>,
}

impl AppState {
    pub fn new(user_service: Arc<UserService>, relay: Arc<ChatRelay>) -> Self {
        Self {
            user_service,
            relay,
        }
    }
}
