use spark_transport::{
    CapableConnection, DialContext, Direction, Multiaddr, PeerId, ResourceManager, ScopeGuard,
    TransportDescriptor, TransportError, Upgrader,
};
use tracing::debug;

use crate::socket::VsockSocket;
use crate::upgrade::upgrade_outbound;

/// 在资源预算约束下执行一次出站连接尝试。
///
/// # 教案式注释
///
/// ## 意图 (Why)
/// - 每次拨号恰好开出一个连接作用域，并保证它在每条退出路径上被归还或移交，且只发生一次；
/// - 把准入、对端绑定、建连、方向判定与升级串成一条线性流程，便于逐段注入故障验证。
///
/// ## 逻辑 (How)
/// 1. 向资源管理器申请出站、非临时的连接作用域；拒绝即返回，无需归还；
/// 2. 绑定对端身份；失败时归还作用域；
/// 3. 调用 VSOCK 建连原语；失败时归还作用域并原样携带 `io::Error`；
/// 4. 按同时打开协商判定方向；
/// 5. 交给升级交接，其结果原样返回（升级失败的归还由交接负责）。
///
/// ## 注意事项 (Trade-offs)
/// - 建连原语不接收 `ctx`：VSOCK 建连被视为足够快，进行中的取消与截止不会生效；
///   升级阶段的取消语义由升级器继承。
pub(crate) struct ScopedDialer<'a> {
    pub(crate) rcmgr: &'a dyn ResourceManager,
    pub(crate) socket: &'a dyn VsockSocket,
    pub(crate) upgrader: &'a dyn Upgrader,
    pub(crate) transport: TransportDescriptor,
}

impl ScopedDialer<'_> {
    pub(crate) async fn dial(
        &self,
        ctx: &DialContext,
        raddr: &Multiaddr,
        peer: &PeerId,
    ) -> Result<Box<dyn CapableConnection>, TransportError> {
        let scope = match self.rcmgr.open_connection(Direction::Outbound, false, raddr) {
            Ok(scope) => ScopeGuard::new(scope),
            Err(source) => {
                debug!(%peer, addr = %raddr, error = %source, "resource manager blocked outgoing connection");
                return Err(TransportError::AdmissionRejected {
                    addr: raddr.clone(),
                    source,
                });
            }
        };

        if let Err(source) = scope.set_peer(peer) {
            scope.release();
            debug!(%peer, addr = %raddr, error = %source, "resource manager blocked outgoing connection for peer");
            return Err(TransportError::PeerBindingRejected {
                peer: peer.clone(),
                addr: raddr.clone(),
                source,
            });
        }

        let raw = match self.socket.dial(raddr).await {
            Ok(raw) => raw,
            Err(source) => {
                scope.release();
                debug!(%peer, addr = %raddr, error = %source, "vsock dial failed");
                return Err(TransportError::DialFailed {
                    addr: raddr.clone(),
                    source,
                });
            }
        };

        let direction = select_direction(ctx);
        upgrade_outbound(
            self.upgrader,
            ctx,
            self.transport,
            raw,
            direction,
            peer,
            raddr,
            scope,
        )
        .await
    }
}

/// 判定升级方向：同时打开协商中且本端不是发起客户端时为入站，其余为出站。
pub(crate) fn select_direction(ctx: &DialContext) -> Direction {
    match ctx.simultaneous_connect() {
        Some((false, _)) => Direction::Inbound,
        _ => Direction::Outbound,
    }
}
