use std::borrow::Cow;
use std::fmt;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

use crate::{BoxError, Direction, Multiaddr, PeerId, TransportDescriptor};

/// 可双向读写的异步字节流。
pub trait AsyncStream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T> AsyncStream for T where T: AsyncRead + AsyncWrite + Send + Unpin {}

/// 套接字原语建立的原始连接：字节流加上两端的结构化地址。
///
/// # 教案级注释
///
/// ## 意图（Why）
/// - 拨号/监听原语与升级器之间需要一个与具体套接字类型无关的交接物；
/// - 擦除流类型后，VSOCK、内存管道或测试桩都能走同一条升级路径。
///
/// ## 契约说明（What）
/// - 原始连接只会被升级器消费一次，升级失败时由升级器关闭或丢弃；
/// - `local_addr`/`remote_addr` 在构造后不变；
/// - 自身实现 `AsyncRead`/`AsyncWrite`，直接委托给内部流。
pub struct RawConnection {
    io: Box<dyn AsyncStream>,
    local_addr: Multiaddr,
    remote_addr: Multiaddr,
}

impl RawConnection {
    /// 由任意异步流和两端地址构造。
    pub fn new<S>(io: S, local_addr: Multiaddr, remote_addr: Multiaddr) -> Self
    where
        S: AsyncStream + 'static,
    {
        Self {
            io: Box::new(io),
            local_addr,
            remote_addr,
        }
    }

    /// 本端地址。
    pub fn local_addr(&self) -> &Multiaddr {
        &self.local_addr
    }

    /// 对端地址。
    pub fn remote_addr(&self) -> &Multiaddr {
        &self.remote_addr
    }

    /// 拆出内部流与两端地址。
    pub fn into_parts(self) -> (Box<dyn AsyncStream>, Multiaddr, Multiaddr) {
        (self.io, self.local_addr, self.remote_addr)
    }
}

impl fmt::Debug for RawConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawConnection")
            .field("local_addr", &self.local_addr)
            .field("remote_addr", &self.remote_addr)
            .finish_non_exhaustive()
    }
}

impl AsyncRead for RawConnection {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut *self.io).poll_read(cx, buf)
    }
}

impl AsyncWrite for RawConnection {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut *self.io).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut *self.io).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut *self.io).poll_shutdown(cx)
    }
}

/// 完成安全握手与多路复用协商后、交还给宿主的连接。
///
/// # 教案级注释
///
/// ## 意图（Why）
/// - 对传输层而言它是不透明的返回值，但宿主需要统一读取身份、方向与地址元数据；
/// - 连接持有拨号时开出的资源作用域，`close` 或析构时归还。
///
/// ## 契约说明（What）
/// - `id` 用于日志与追踪关联；
/// - `direction` 是升级时协商使用的逻辑方向，同时打开场景下可能与物理拨号方向相反；
/// - `close` 幂等，多次调用不应重复归还资源。
#[async_trait]
pub trait CapableConnection: Send + Sync + 'static {
    /// 连接 ID。
    fn id(&self) -> Cow<'_, str>;

    /// 本端地址。
    fn local_addr(&self) -> &Multiaddr;

    /// 对端地址。
    fn remote_addr(&self) -> &Multiaddr;

    /// 对端身份。
    fn remote_peer(&self) -> &PeerId;

    /// 协商方向。
    fn direction(&self) -> Direction;

    /// 产生该连接的传输描述。
    fn transport(&self) -> TransportDescriptor;

    /// 关闭连接并归还资源。
    async fn close(&self) -> Result<(), BoxError>;
}
