use spark_transport::{
    CapableConnection, DialContext, Direction, Listener, Multiaddr, PeerId, RawConnection,
    RawListener, ScopeGuard, TransportDescriptor, TransportError, Upgrader,
};
use tracing::debug;

/// 拨号路径的升级交接。
///
/// # 教案级注释
///
/// ## 意图（Why）
/// - 这是拨号路径上资源作用域的唯一兜底点：原始连接已建立、作用域已移交给升级器，
///   一旦升级失败，必须在错误抵达宿主之前归还作用域；
/// - 成功时作用域随连接一起交给宿主，本层不再触碰。
///
/// ## 逻辑（How）
/// 1. 在移交守卫之前派生 [`ScopeHandle`](spark_transport::ScopeHandle)；
/// 2. 调用升级器；失败时通过句柄归还（若升级器已析构守卫，归还为空操作）；
/// 3. 成功时丢弃句柄，作用域生命周期归属返回的连接。
#[allow(clippy::too_many_arguments)]
pub(crate) async fn upgrade_outbound(
    upgrader: &dyn Upgrader,
    ctx: &DialContext,
    transport: TransportDescriptor,
    raw: RawConnection,
    direction: Direction,
    peer: &PeerId,
    raddr: &Multiaddr,
    scope: ScopeGuard,
) -> Result<Box<dyn CapableConnection>, TransportError> {
    let handle = scope.handle();
    match upgrader
        .upgrade(ctx, transport, raw, direction, peer, scope)
        .await
    {
        Ok(conn) => Ok(conn),
        Err(source) => {
            handle.release();
            debug!(%peer, addr = %raddr, %direction, error = %source, "failed to upgrade vsock connection");
            Err(TransportError::UpgradeFailed {
                peer: peer.clone(),
                addr: raddr.clone(),
                source,
            })
        }
    }
}

/// 监听路径的升级交接：包装为惰性逐次升级的监听器，不会失败。
pub(crate) fn upgrade_inbound(
    upgrader: &dyn Upgrader,
    transport: TransportDescriptor,
    listener: Box<dyn RawListener>,
) -> Box<dyn Listener> {
    upgrader.upgrade_listener(transport, listener)
}
