//! Protector Adapter - 数据保护服务客户端实现

mod fake_protector_client;
mod http_protector_client;

pub use fake_protector_client::{FakeProtectorClient, FakeProtectorConfig};
pub use http_protector_client::{HttpProtectorClient, HttpProtectorClientConfig};
