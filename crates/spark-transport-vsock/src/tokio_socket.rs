use std::io;

use async_trait::async_trait;
use spark_transport::{Multiaddr, Protocol, RawConnection, RawListener};
use tokio::sync::{Mutex as AsyncMutex, watch};
use tokio_vsock::{VsockAddr, VsockListener, VsockStream};

use crate::socket::{VsockEndpoint, VsockSocket};

/// 基于 `tokio-vsock` 的默认套接字原语。
///
/// # 教案式注释
///
/// ## 意图 (Why)
/// - 在 Tokio 运行时上提供开箱即用的 AF_VSOCK 建连与监听，宿主无需自行桥接系统调用；
///
/// ## 逻辑 (How)
/// - `dial`：从结构化地址提取 `(cid, port)`，调用 `VsockStream::connect`，
///   并以流的本地地址与调用方给出的远端地址构造 [`RawConnection`]；
/// - `listen`：`VsockListener::bind` 后读取实际绑定地址，包装为 [`TokioVsockListener`]。
///
/// ## 契约 (What)
/// - **前置条件**：`listen` 需在 Tokio 运行时上下文中调用（监听器注册到反应器）；
/// - **错误语义**：地址形态错误返回 `InvalidInput`，其余为系统调用的原始错误。
#[derive(Clone, Copy, Debug)]
pub struct TokioVsockSocket {
    carrier: Protocol,
}

impl TokioVsockSocket {
    /// 以承载协议构造，决定地址中端口分段的协议码。
    pub fn new(carrier: Protocol) -> Self {
        Self { carrier }
    }
}

fn to_multiaddr(addr: VsockAddr, carrier: Protocol) -> Multiaddr {
    VsockEndpoint {
        cid: addr.cid(),
        port: addr.port(),
    }
    .to_multiaddr(carrier)
}

#[async_trait]
impl VsockSocket for TokioVsockSocket {
    async fn dial(&self, raddr: &Multiaddr) -> io::Result<RawConnection> {
        let endpoint = VsockEndpoint::from_multiaddr(raddr, self.carrier)?;
        let stream = VsockStream::connect(VsockAddr::new(endpoint.cid, endpoint.port)).await?;
        let local = to_multiaddr(stream.local_addr()?, self.carrier);
        Ok(RawConnection::new(stream, local, raddr.clone()))
    }

    fn listen(&self, laddr: &Multiaddr) -> io::Result<Box<dyn RawListener>> {
        let endpoint = VsockEndpoint::from_multiaddr(laddr, self.carrier)?;
        let listener = VsockListener::bind(VsockAddr::new(endpoint.cid, endpoint.port))?;
        let local = to_multiaddr(listener.local_addr()?, self.carrier);
        let (closed, _) = watch::channel(false);
        Ok(Box::new(TokioVsockListener {
            inner: AsyncMutex::new(Some(listener)),
            closed,
            local,
            carrier: self.carrier,
        }))
    }
}

/// `tokio-vsock` 监听器的原始监听包装。
///
/// 并发的 `accept` 通过内部异步互斥锁串行化；`close` 置位关闭标记，
/// 持锁等待中的 `accept` 观察到标记后释放底层套接字并返回 `NotConnected`。
pub struct TokioVsockListener {
    inner: AsyncMutex<Option<VsockListener>>,
    closed: watch::Sender<bool>,
    local: Multiaddr,
    carrier: Protocol,
}

fn closed_error() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "vsock listener closed")
}

#[async_trait]
impl RawListener for TokioVsockListener {
    async fn accept(&self) -> io::Result<RawConnection> {
        let mut closed = self.closed.subscribe();
        let mut guard = self.inner.lock().await;
        if *closed.borrow_and_update() {
            guard.take();
            return Err(closed_error());
        }
        let Some(listener) = guard.as_mut() else {
            return Err(closed_error());
        };

        let accepted = tokio::select! {
            accepted = listener.accept() => Some(accepted),
            _ = closed.wait_for(|closed| *closed) => None,
        };
        let Some(accepted) = accepted else {
            guard.take();
            return Err(closed_error());
        };

        let (stream, peer) = accepted?;
        let local = to_multiaddr(stream.local_addr()?, self.carrier);
        Ok(RawConnection::new(
            stream,
            local,
            to_multiaddr(peer, self.carrier),
        ))
    }

    fn multiaddr(&self) -> Multiaddr {
        self.local.clone()
    }

    fn close(&self) -> io::Result<()> {
        self.closed.send_replace(true);
        Ok(())
    }
}
