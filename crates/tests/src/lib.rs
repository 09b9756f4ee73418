//! 中继集成测试框架
//!
//! 提供基于内存存储的测试环境、模拟客户端连接以及故障注入工具。

pub mod fault_injection;
pub mod test_environment;

pub use fault_injection::{FailingMessageRepository, GatedMessageRepository};
pub use test_environment::*;
