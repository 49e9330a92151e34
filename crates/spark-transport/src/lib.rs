#![deny(unsafe_code)]
#![allow(clippy::result_large_err)]
#![doc = "spark-transport: 可插拔点对点传输的宿主契约层。"]
#![doc = ""]
#![doc = "== 使命概述 =="]
#![doc = "- **Why**：宿主网络栈把 TCP、VSOCK 等传输视为同一能力集的可替换实现，本 crate 提供它们共享的语言。"]
#![doc = "- **What**：定义结构化地址 `Multiaddr`、对端身份、拨号上下文、资源管理器/连接作用域、原始与可用连接、升级器以及 `Transport` 能力 trait。"]
#![doc = "- **How**：所有外部协作者（资源管理、安全/多路复用升级、套接字原语）都以窄接口 trait 表达，具体实现 crate 只负责组装生命周期。"]

/// 协作者（资源管理器、升级器等）返回的类型擦除错误。
///
/// # 设计背景（Why）
/// - 传输层不解释协作者的失败原因，只负责原样向上传递；
/// - 使用 `Box<dyn Error>` 保留完整的 `source` 链，调用方仍可 `downcast_ref` 还原具体类型。
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub mod addr;
pub mod connection;
pub mod context;
pub mod error;
pub mod listener;
pub mod peer;
pub mod resource;
pub mod transport;
pub mod upgrader;

pub use addr::{Component, Multiaddr, Protocol};
pub use connection::{AsyncStream, CapableConnection, RawConnection};
pub use context::{Cancellation, DialContext, SimultaneousConnect};
pub use error::TransportError;
pub use listener::{Listener, RawListener};
pub use peer::PeerId;
pub use resource::{
    ConnectionScope, Direction, NullResourceManager, NullScope, ResourceManager, ScopeGuard,
    ScopeHandle,
};
pub use transport::{Transport, TransportDescriptor};
pub use upgrader::Upgrader;
