use std::io;
use std::sync::Arc;

use async_trait::async_trait;
use spark_transport::{Multiaddr, Protocol, RawConnection, RawListener};

/// VSOCK 地址族的套接字原语。
///
/// # 教案级注释
///
/// ## 意图（Why）
/// - 系统调用层面的建连与绑定属于外部能力，传输只通过这组窄接口消费它；
/// - 宿主或测试可以注入自己的实现（例如运行在不支持 AF_VSOCK 的平台上时的桥接层）。
///
/// ## 契约说明（What）
/// - `dial` 不接受上下文：VSOCK 建连被视为足够快，进行中的取消不被支持；
/// - `listen` 同步绑定，返回的监听器必须报告实际绑定地址；
/// - 失败以 `io::Error` 原样返回，传输层不改写。
#[async_trait]
pub trait VsockSocket: Send + Sync + 'static {
    /// 建立到远端地址的原始连接。
    async fn dial(&self, raddr: &Multiaddr) -> io::Result<RawConnection>;

    /// 在本地地址上绑定监听。
    fn listen(&self, laddr: &Multiaddr) -> io::Result<Box<dyn RawListener>>;
}

/// 从 VSOCK 地址中提取的 `(cid, port)` 二元组。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct VsockEndpoint {
    /// 上下文 ID（CID）。
    pub cid: u32,
    /// 端口号。
    pub port: u32,
}

impl VsockEndpoint {
    /// 从 `/vsock/<cid>/<carrier>/<port>` 形态的地址中提取端点。
    ///
    /// 地址形态不符或取值不是十进制数字时返回 `InvalidInput`。
    pub fn from_multiaddr(addr: &Multiaddr, carrier: Protocol) -> io::Result<Self> {
        let mut components = addr.iter();
        let (Some(vsock), Some(port), None) =
            (components.next(), components.next(), components.next())
        else {
            return Err(invalid_addr(addr));
        };
        if vsock.protocol() != Protocol::VSOCK || port.protocol() != carrier {
            return Err(invalid_addr(addr));
        }
        let cid = vsock.value().parse().map_err(|_| invalid_addr(addr))?;
        let port = port.value().parse().map_err(|_| invalid_addr(addr))?;
        Ok(Self { cid, port })
    }

    /// 还原为结构化地址。
    pub fn to_multiaddr(self, carrier: Protocol) -> Multiaddr {
        Multiaddr::empty()
            .with(Protocol::VSOCK, self.cid.to_string())
            .with(carrier, self.port.to_string())
    }
}

fn invalid_addr(addr: &Multiaddr) -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidInput,
        format!("not a vsock address: {addr}"),
    )
}

/// 当前构建不提供 VSOCK 能力时使用的原语，所有操作返回 `Unsupported`。
#[derive(Clone, Copy, Debug, Default)]
pub struct UnsupportedSocket;

#[async_trait]
impl VsockSocket for UnsupportedSocket {
    async fn dial(&self, raddr: &Multiaddr) -> io::Result<RawConnection> {
        Err(unsupported(raddr))
    }

    fn listen(&self, laddr: &Multiaddr) -> io::Result<Box<dyn RawListener>> {
        Err(unsupported(laddr))
    }
}

fn unsupported(addr: &Multiaddr) -> io::Error {
    io::Error::new(
        io::ErrorKind::Unsupported,
        format!("vsock is not available in this build: {addr}"),
    )
}

/// 根据编译特性选择默认套接字原语。
pub(crate) fn default_socket(carrier: Protocol) -> Arc<dyn VsockSocket> {
    #[cfg(feature = "runtime-tokio")]
    {
        Arc::new(crate::tokio_socket::TokioVsockSocket::new(carrier))
    }
    #[cfg(not(feature = "runtime-tokio"))]
    {
        let _ = carrier;
        Arc::new(UnsupportedSocket)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_round_trips_through_multiaddr() {
        let addr = Multiaddr::empty()
            .with(Protocol::VSOCK, "3")
            .with(Protocol::TCP, "1024");
        let endpoint = VsockEndpoint::from_multiaddr(&addr, Protocol::TCP).expect("valid");
        assert_eq!(endpoint, VsockEndpoint { cid: 3, port: 1024 });
        assert_eq!(endpoint.to_multiaddr(Protocol::TCP), addr);
    }

    #[test]
    fn endpoint_rejects_wrong_carrier_and_garbage() {
        let xtcp = Multiaddr::empty()
            .with(Protocol::VSOCK, "3")
            .with(Protocol::XTCP, "1024");
        let garbage = Multiaddr::empty()
            .with(Protocol::VSOCK, "host")
            .with(Protocol::TCP, "1024");

        for addr in [xtcp, garbage] {
            let err = VsockEndpoint::from_multiaddr(&addr, Protocol::TCP).unwrap_err();
            assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        }
    }

    #[tokio::test]
    async fn unsupported_socket_reports_unsupported() {
        let addr = Multiaddr::empty()
            .with(Protocol::VSOCK, "3")
            .with(Protocol::TCP, "0");
        let err = UnsupportedSocket.dial(&addr).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Unsupported);
        assert!(UnsupportedSocket.listen(&addr).is_err());
    }
}
