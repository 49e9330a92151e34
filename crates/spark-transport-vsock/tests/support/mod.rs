//! VSOCK 传输场景测试的公共伪实现。
//!
//! # 模块定位（Why）
//! - 传输的核心契约是“资源作用域恰好归还一次”，需要能逐段注入失败并计数归还次数的协作者；
//! - 套接字原语以内存 `duplex` 管道代替 AF_VSOCK，测试无需真实虚拟机环境即可跑通完整拨号链路。
//!
//! # 使用说明（How）
//! - 各测试文件通过 `mod support;` 引入，按需组合 [`CountingResourceManager`]、[`FakeSocket`]、
//!   [`FakeUpgrader`] 与 [`FakeReuse`]；
//! - 所有计数器都是 `Arc<AtomicUsize>`，断言时直接读取。
#![allow(dead_code)]

use std::borrow::Cow;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use spark_transport::{
    BoxError, CapableConnection, ConnectionScope, DialContext, Direction, Listener, Multiaddr,
    PeerId, Protocol, RawConnection, RawListener, ResourceManager, ScopeGuard,
    TransportDescriptor, Upgrader,
};
use spark_transport_vsock::{ReuseportListen, VsockSocket};

/// 构造 `/vsock/<cid>/tcp/<port>` 地址。
pub fn vsock_tcp(cid: u32, port: u32) -> Multiaddr {
    Multiaddr::empty()
        .with(Protocol::VSOCK, cid.to_string())
        .with(Protocol::TCP, port.to_string())
}

/// 构造 `/vsock/<cid>/xtcp/<port>` 地址。
pub fn vsock_xtcp(cid: u32, port: u32) -> Multiaddr {
    Multiaddr::empty()
        .with(Protocol::VSOCK, cid.to_string())
        .with(Protocol::XTCP, port.to_string())
}

pub fn peer() -> PeerId {
    PeerId::new("12D3KooWVsockTestPeer")
}

/// 资源管理器伪实现：记录开出、绑定与归还次数，可注入准入或对端绑定失败。
#[derive(Default)]
pub struct CountingResourceManager {
    pub opened: AtomicUsize,
    pub released: Arc<AtomicUsize>,
    pub peers_set: Arc<AtomicUsize>,
    pub reject_open: AtomicBool,
    pub reject_peer: Arc<AtomicBool>,
    pub last_request: Mutex<Option<(Direction, bool, Multiaddr)>>,
}

impl CountingResourceManager {
    pub fn rejecting_open() -> Self {
        let rcmgr = Self::default();
        rcmgr.reject_open.store(true, Ordering::SeqCst);
        rcmgr
    }

    pub fn rejecting_peer() -> Self {
        let rcmgr = Self::default();
        rcmgr.reject_peer.store(true, Ordering::SeqCst);
        rcmgr
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}

impl ResourceManager for CountingResourceManager {
    fn open_connection(
        &self,
        direction: Direction,
        transient: bool,
        endpoint: &Multiaddr,
    ) -> Result<Box<dyn ConnectionScope>, BoxError> {
        *self.last_request.lock() = Some((direction, transient, endpoint.clone()));
        if self.reject_open.load(Ordering::SeqCst) {
            return Err("connection limit exceeded".into());
        }
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(CountingScope {
            released: Arc::clone(&self.released),
            peers_set: Arc::clone(&self.peers_set),
            reject_peer: Arc::clone(&self.reject_peer),
        }))
    }
}

struct CountingScope {
    released: Arc<AtomicUsize>,
    peers_set: Arc<AtomicUsize>,
    reject_peer: Arc<AtomicBool>,
}

impl ConnectionScope for CountingScope {
    fn set_peer(&self, _peer: &PeerId) -> Result<(), BoxError> {
        if self.reject_peer.load(Ordering::SeqCst) {
            return Err("peer limit exceeded".into());
        }
        self.peers_set.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn done(&self) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

/// 套接字原语伪实现：拨号返回内存管道，监听返回可手动喂入连接的监听器。
#[derive(Default)]
pub struct FakeSocket {
    pub dials: AtomicUsize,
    pub listens: AtomicUsize,
    pub fail_dial: AtomicBool,
    pub fail_listen: AtomicBool,
}

impl FakeSocket {
    pub fn failing_dial() -> Self {
        let socket = Self::default();
        socket.fail_dial.store(true, Ordering::SeqCst);
        socket
    }

    pub fn dials(&self) -> usize {
        self.dials.load(Ordering::SeqCst)
    }

    pub fn listens(&self) -> usize {
        self.listens.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VsockSocket for FakeSocket {
    async fn dial(&self, raddr: &Multiaddr) -> io::Result<RawConnection> {
        self.dials.fetch_add(1, Ordering::SeqCst);
        if self.fail_dial.load(Ordering::SeqCst) {
            return Err(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "no listener on port",
            ));
        }
        let (client, _server) = tokio::io::duplex(64);
        Ok(RawConnection::new(client, vsock_tcp(2, 49152), raddr.clone()))
    }

    fn listen(&self, laddr: &Multiaddr) -> io::Result<Box<dyn RawListener>> {
        self.listens.fetch_add(1, Ordering::SeqCst);
        if self.fail_listen.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::AddrInUse, "port taken"));
        }
        Ok(Box::new(FakeRawListener::new(laddr.clone())))
    }
}

/// 原始监听伪实现，`accept` 产出一条内存管道连接。
pub struct FakeRawListener {
    addr: Multiaddr,
    closed: AtomicBool,
}

impl FakeRawListener {
    pub fn new(addr: Multiaddr) -> Self {
        Self {
            addr,
            closed: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl RawListener for FakeRawListener {
    async fn accept(&self) -> io::Result<RawConnection> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "closed"));
        }
        let (server, _client) = tokio::io::duplex(64);
        Ok(RawConnection::new(server, self.addr.clone(), vsock_tcp(3, 50000)))
    }

    fn multiaddr(&self) -> Multiaddr {
        self.addr.clone()
    }

    fn close(&self) -> io::Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// 端口复用工厂伪实现，只记录调用次数。
#[derive(Default)]
pub struct FakeReuse {
    pub listens: AtomicUsize,
}

impl FakeReuse {
    pub fn listens(&self) -> usize {
        self.listens.load(Ordering::SeqCst)
    }
}

impl ReuseportListen for FakeReuse {
    fn listen(&self, laddr: &Multiaddr) -> io::Result<Box<dyn RawListener>> {
        self.listens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeRawListener::new(laddr.clone())))
    }
}

/// 升级器失败方式。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpgradeMode {
    Succeed,
    /// 失败且仍持有守卫：守卫随升级器栈帧析构。
    Fail,
    /// 失败前先自行归还作用域。
    FailAfterRelease,
}

/// 升级器伪实现：记录传入的方向与描述，成功时返回持有作用域的 [`FakeConn`]。
pub struct FakeUpgrader {
    mode: UpgradeMode,
    pub upgrades: AtomicUsize,
    pub last_direction: Mutex<Option<Direction>>,
    pub last_transport: Mutex<Option<TransportDescriptor>>,
    pub listeners: AtomicUsize,
}

impl FakeUpgrader {
    pub fn new(mode: UpgradeMode) -> Self {
        Self {
            mode,
            upgrades: AtomicUsize::new(0),
            last_direction: Mutex::new(None),
            last_transport: Mutex::new(None),
            listeners: AtomicUsize::new(0),
        }
    }

    pub fn succeeding() -> Self {
        Self::new(UpgradeMode::Succeed)
    }

    pub fn last_direction(&self) -> Option<Direction> {
        *self.last_direction.lock()
    }
}

#[async_trait]
impl Upgrader for FakeUpgrader {
    async fn upgrade(
        &self,
        _ctx: &DialContext,
        transport: TransportDescriptor,
        raw: RawConnection,
        direction: Direction,
        peer: &PeerId,
        scope: ScopeGuard,
    ) -> Result<Box<dyn CapableConnection>, BoxError> {
        self.upgrades.fetch_add(1, Ordering::SeqCst);
        *self.last_direction.lock() = Some(direction);
        *self.last_transport.lock() = Some(transport);
        match self.mode {
            UpgradeMode::Succeed => Ok(Box::new(FakeConn::new(
                raw,
                direction,
                peer.clone(),
                transport,
                scope,
            ))),
            UpgradeMode::Fail => Err("handshake failed".into()),
            UpgradeMode::FailAfterRelease => {
                scope.release();
                Err("handshake failed".into())
            }
        }
    }

    fn upgrade_listener(
        &self,
        transport: TransportDescriptor,
        listener: Box<dyn RawListener>,
    ) -> Box<dyn Listener> {
        self.listeners.fetch_add(1, Ordering::SeqCst);
        Box::new(FakeListener {
            transport,
            inner: listener,
        })
    }
}

/// 升级后的连接伪实现；关闭或析构时归还作用域。
pub struct FakeConn {
    local: Multiaddr,
    remote: Multiaddr,
    peer: PeerId,
    direction: Direction,
    transport: TransportDescriptor,
    raw: Mutex<Option<RawConnection>>,
    scope: ScopeGuard,
}

impl FakeConn {
    fn new(
        raw: RawConnection,
        direction: Direction,
        peer: PeerId,
        transport: TransportDescriptor,
        scope: ScopeGuard,
    ) -> Self {
        Self {
            local: raw.local_addr().clone(),
            remote: raw.remote_addr().clone(),
            peer,
            direction,
            transport,
            raw: Mutex::new(Some(raw)),
            scope,
        }
    }
}

#[async_trait]
impl CapableConnection for FakeConn {
    fn id(&self) -> Cow<'_, str> {
        Cow::Owned(format!("{}->{}", self.local, self.remote))
    }

    fn local_addr(&self) -> &Multiaddr {
        &self.local
    }

    fn remote_addr(&self) -> &Multiaddr {
        &self.remote
    }

    fn remote_peer(&self) -> &PeerId {
        &self.peer
    }

    fn direction(&self) -> Direction {
        self.direction
    }

    fn transport(&self) -> TransportDescriptor {
        self.transport
    }

    async fn close(&self) -> Result<(), BoxError> {
        self.raw.lock().take();
        self.scope.release();
        Ok(())
    }
}

/// 入站监听伪实现：每次 `accept` 以 NullScope 包装原始连接。
struct FakeListener {
    transport: TransportDescriptor,
    inner: Box<dyn RawListener>,
}

#[async_trait]
impl Listener for FakeListener {
    async fn accept(&self) -> Result<Box<dyn CapableConnection>, BoxError> {
        let raw = self.inner.accept().await?;
        let scope = ScopeGuard::new(Box::new(spark_transport::NullScope));
        Ok(Box::new(FakeConn::new(
            raw,
            Direction::Inbound,
            peer(),
            self.transport,
            scope,
        )))
    }

    fn multiaddr(&self) -> Multiaddr {
        self.inner.multiaddr()
    }

    fn close(&self) -> io::Result<()> {
        self.inner.close()
    }
}
