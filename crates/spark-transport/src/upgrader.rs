use async_trait::async_trait;

use crate::{
    BoxError, CapableConnection, DialContext, Direction, Listener, PeerId, RawConnection,
    RawListener, ScopeGuard, TransportDescriptor,
};

/// 安全/多路复用升级器。
///
/// # 教案级注释
///
/// ## 意图（Why）
/// - 握手与多路复用协议完全由宿主提供，传输层只把建立好的原始字节流交给它；
/// - 升级器同时服务拨号路径（逐连接、可失败）与监听路径（包装监听器、惰性升级）。
///
/// ## 契约说明（What）
/// - `upgrade`：消费原始连接与作用域守卫；成功时守卫的生命周期归属返回的连接，
///   失败时原始连接被关闭或丢弃，守卫随之析构（调用方仍会兜底归还）；
/// - `direction` 可能因同时打开协商而为 `Inbound`，升级器必须按该方向执行握手；
/// - `upgrade_listener`：同步包装，不会失败；单条入站连接的升级失败由升级器内部吸收；
/// - 取消语义：`upgrade` 对 `ctx` 的响应方式由升级器自行决定，传输层原样继承。
#[async_trait]
pub trait Upgrader: Send + Sync + 'static {
    /// 升级一条拨号得到的原始连接。
    async fn upgrade(
        &self,
        ctx: &DialContext,
        transport: TransportDescriptor,
        raw: RawConnection,
        direction: Direction,
        peer: &PeerId,
        scope: ScopeGuard,
    ) -> Result<Box<dyn CapableConnection>, BoxError>;

    /// 包装原始监听器，使其在每次 `accept` 时升级入站连接。
    fn upgrade_listener(
        &self,
        transport: TransportDescriptor,
        listener: Box<dyn RawListener>,
    ) -> Box<dyn Listener>;
}
