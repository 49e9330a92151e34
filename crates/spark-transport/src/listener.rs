use std::io;

use async_trait::async_trait;

use crate::{BoxError, CapableConnection, Multiaddr, RawConnection};

/// 套接字原语返回的原始监听器。
///
/// # 教案级注释
///
/// ## 意图（Why）
/// - 让普通绑定与端口复用绑定产出同一种监听器，升级器无需区分来源；
///
/// ## 契约说明（What）
/// - `accept` 可被多个任务并发调用，每次返回一条原始连接；
/// - `multiaddr` 返回实际绑定地址（端口 0 绑定后为分配到的端口）；
/// - `close` 之后挂起与后续的 `accept` 都应尽快返回错误。
#[async_trait]
pub trait RawListener: Send + Sync + 'static {
    /// 接受一条原始连接。
    async fn accept(&self) -> io::Result<RawConnection>;

    /// 实际绑定地址。
    fn multiaddr(&self) -> Multiaddr;

    /// 停止接受新连接。
    fn close(&self) -> io::Result<()>;
}

/// 升级后的监听器，逐次接受并升级入站连接。
///
/// 升级是惰性的：只有调用 `accept` 时才对下一条原始连接执行握手，
/// 单条连接的握手失败由升级器内部处理，不影响监听器本身。
#[async_trait]
pub trait Listener: Send + Sync + 'static {
    /// 接受下一条已升级的连接。
    async fn accept(&self) -> Result<Box<dyn CapableConnection>, BoxError>;

    /// 实际绑定地址。
    fn multiaddr(&self) -> Multiaddr;

    /// 关闭监听器。
    fn close(&self) -> io::Result<()>;
}
