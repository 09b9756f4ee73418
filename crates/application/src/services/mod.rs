mod room_directory;
mod user_service;

pub use room_directory::RoomDirectory;
pub use user_service::{
    LoginRequest, RegisterUserRequest, UserService, UserServiceDependencies, PASSWORD_MIN_CHARS,
};
