use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use spark_transport::{
    CapableConnection, DialContext, Listener, Multiaddr, NullResourceManager, PeerId, Protocol,
    ResourceManager, Transport, TransportError, Upgrader,
};
use tracing::debug;

use crate::carrier::{Carrier, TcpCarrier, XtcpCarrier};
use crate::config::{TransportConfig, TransportOption};
use crate::dialer::ScopedDialer;
use crate::listener::listen_raw;
use crate::matcher::AddressMatcher;
use crate::reuse::{ReusePool, ReuseportListen};
use crate::socket::{VsockSocket, default_socket};
use crate::upgrade::upgrade_inbound;

/// 以 TCP 分段承载的 VSOCK 传输（支持端口复用）。
pub type VsockTcpTransport = VsockTransport<TcpCarrier>;

/// 以 XTCP 分段承载的 VSOCK 传输（不支持端口复用）。
pub type VsockXtcpTransport = VsockTransport<XtcpCarrier>;

/// VSOCK 传输门面：宿主网络栈面向的能力集实现。
///
/// # 教案式注释
///
/// ## 意图 (Why)
/// - 让宿主以调度 IP 传输的同一契约拨号与监听 VSOCK 地址；
/// - 门面只持有构造时确定的只读配置，组合匹配器、资源受控拨号、端口复用监听与升级交接。
///
/// ## 契约 (What)
/// - `new`：依次应用配置项，任一失败即返回错误且不产生实例；未提供资源管理器时注入
///   [`NullResourceManager`]；
/// - `can_dial`：地址协议码序列恰为 `[VSOCK, 承载协议]`；
/// - `dial`：每次调用恰好开出并处理一个资源作用域；
/// - `listen`：[`use_reuseport`](Self::use_reuseport) 为真时经共享工厂绑定，否则走普通原语；
/// - `protocols` 为承载协议，`proxy` 恒为 `false`，名称为 `"VSOCK"`。
///
/// ## 注意事项 (Trade-offs)
/// - 构造后没有任何可变状态，实例可被多个任务并发调用；端口复用工厂自行同步其内部簿记；
/// - 端口复用可用性在 `new` 时快照（可被配置项覆盖），运行期修改环境变量不会生效。
pub struct VsockTransport<C: Carrier> {
    upgrader: Arc<dyn Upgrader>,
    rcmgr: Arc<dyn ResourceManager>,
    socket: Arc<dyn VsockSocket>,
    reuse: Option<Arc<dyn ReuseportListen>>,
    disable_reuseport: bool,
    reuseport_available: bool,
    _carrier: PhantomData<fn() -> C>,
}

impl<C: Carrier> VsockTransport<C> {
    const MATCHER: AddressMatcher = AddressMatcher::new(C::DIAL_PATTERN);

    /// 构造传输实例。
    pub fn new<I>(
        upgrader: Arc<dyn Upgrader>,
        rcmgr: Option<Arc<dyn ResourceManager>>,
        options: I,
    ) -> Result<Self, TransportError>
    where
        I: IntoIterator<Item = TransportOption>,
    {
        let mut config = TransportConfig::new(C::SUPPORTS_REUSEPORT);
        for option in options {
            let name = option.name();
            if let Err(err) = option.apply(&mut config) {
                debug!(option = name, error = %err, "vsock transport option rejected");
                return Err(err);
            }
        }

        let rcmgr =
            rcmgr.unwrap_or_else(|| Arc::new(NullResourceManager) as Arc<dyn ResourceManager>);
        let socket = config
            .socket
            .unwrap_or_else(|| default_socket(C::PROTOCOL));
        let reuse = if C::SUPPORTS_REUSEPORT {
            Some(
                config.reuse.unwrap_or_else(|| {
                    Arc::new(ReusePool::new(Arc::clone(&socket))) as Arc<dyn ReuseportListen>
                }),
            )
        } else {
            None
        };

        Ok(Self {
            upgrader,
            rcmgr,
            socket,
            reuse,
            disable_reuseport: config.disable_reuseport,
            reuseport_available: config.reuseport_available,
            _carrier: PhantomData,
        })
    }

    /// 端口复用是否生效：未被显式关闭，且机制在当前变体与平台上可用。
    pub fn use_reuseport(&self) -> bool {
        !self.disable_reuseport && self.reuseport_available && self.reuse.is_some()
    }

    fn reuse_factory(&self) -> Option<&dyn ReuseportListen> {
        if self.use_reuseport() {
            self.reuse.as_deref()
        } else {
            None
        }
    }
}

#[async_trait]
impl<C: Carrier> Transport for VsockTransport<C> {
    fn can_dial(&self, addr: &Multiaddr) -> bool {
        Self::MATCHER.matches(addr)
    }

    async fn dial(
        &self,
        ctx: &DialContext,
        raddr: &Multiaddr,
        peer: &PeerId,
    ) -> Result<Box<dyn CapableConnection>, TransportError> {
        let dialer = ScopedDialer {
            rcmgr: self.rcmgr.as_ref(),
            socket: self.socket.as_ref(),
            upgrader: self.upgrader.as_ref(),
            transport: self.descriptor(),
        };
        dialer.dial(ctx, raddr, peer).await
    }

    fn listen(&self, laddr: &Multiaddr) -> Result<Box<dyn Listener>, TransportError> {
        let raw = listen_raw(self.socket.as_ref(), self.reuse_factory(), laddr).map_err(
            |source| {
                debug!(addr = %laddr, error = %source, "vsock listen failed");
                TransportError::ListenFailed {
                    addr: laddr.clone(),
                    source,
                }
            },
        )?;
        Ok(upgrade_inbound(
            self.upgrader.as_ref(),
            self.descriptor(),
            raw,
        ))
    }

    fn protocols(&self) -> &'static [Protocol] {
        C::PROTOCOLS
    }

    fn proxy(&self) -> bool {
        false
    }

    fn name(&self) -> &'static str {
        C::NAME
    }
}

impl<C: Carrier> fmt::Display for VsockTransport<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(C::NAME)
    }
}

impl<C: Carrier> fmt::Debug for VsockTransport<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VsockTransport")
            .field("carrier", &C::PROTOCOL)
            .field("disable_reuseport", &self.disable_reuseport)
            .field("use_reuseport", &self.use_reuseport())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spark_transport::{BoxError, Direction, RawConnection, RawListener, ScopeGuard};

    struct RefusingUpgrader;

    #[async_trait]
    impl Upgrader for RefusingUpgrader {
        async fn upgrade(
            &self,
            _ctx: &DialContext,
            _transport: spark_transport::TransportDescriptor,
            _raw: RawConnection,
            _direction: Direction,
            _peer: &PeerId,
            _scope: ScopeGuard,
        ) -> Result<Box<dyn CapableConnection>, BoxError> {
            Err("refused".into())
        }

        fn upgrade_listener(
            &self,
            _transport: spark_transport::TransportDescriptor,
            _listener: Box<dyn RawListener>,
        ) -> Box<dyn Listener> {
            unreachable!("监听路径不在本测试范围内")
        }
    }

    fn transport<C: Carrier>(options: Vec<TransportOption>) -> VsockTransport<C> {
        VsockTransport::<C>::new(Arc::new(RefusingUpgrader), None, options).expect("construct")
    }

    #[test]
    fn facade_constants_follow_the_carrier() {
        let tcp = transport::<TcpCarrier>(Vec::new());
        assert_eq!(tcp.protocols(), &[Protocol::TCP]);
        assert!(!tcp.proxy());
        assert_eq!(tcp.to_string(), "VSOCK");
        assert_eq!(tcp.name(), "VSOCK");

        let xtcp = transport::<XtcpCarrier>(Vec::new());
        assert_eq!(xtcp.protocols(), &[Protocol::XTCP]);
        assert!(!xtcp.proxy());
        assert!(!xtcp.use_reuseport(), "XTCP 变体不提供端口复用");
    }

    #[test]
    fn can_dial_follows_the_carrier() {
        let tcp_addr = Multiaddr::empty()
            .with(Protocol::VSOCK, "3")
            .with(Protocol::TCP, "0");
        let xtcp_addr = Multiaddr::empty()
            .with(Protocol::VSOCK, "3")
            .with(Protocol::XTCP, "0");

        let tcp = transport::<TcpCarrier>(Vec::new());
        let xtcp = transport::<XtcpCarrier>(Vec::new());
        assert!(tcp.can_dial(&tcp_addr));
        assert!(!tcp.can_dial(&xtcp_addr));
        assert!(xtcp.can_dial(&xtcp_addr));
        assert!(!xtcp.can_dial(&tcp_addr));
    }

    #[test]
    fn disable_reuseport_turns_reuse_off() {
        let tcp = transport::<TcpCarrier>(vec![crate::disable_reuseport()]);
        assert!(!tcp.use_reuseport());
    }

    #[test]
    fn descriptor_reports_facade_metadata() {
        let tcp = transport::<TcpCarrier>(Vec::new());
        let descriptor = tcp.descriptor();
        assert_eq!(descriptor.name, "VSOCK");
        assert_eq!(descriptor.protocols, &[Protocol::TCP]);
        assert!(!descriptor.proxy);
    }
}
