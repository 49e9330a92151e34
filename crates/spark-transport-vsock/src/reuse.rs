use std::env;
use std::io;
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use spark_transport::{Multiaddr, RawConnection, RawListener};
use tokio::sync::watch;
use tracing::trace;

use crate::socket::VsockSocket;

/// 控制端口复用可用性的环境变量，取值 `0`/`false`（不区分大小写）时关闭。
pub const REUSEPORT_ENV: &str = "SPARK_VSOCK_REUSEPORT";

/// 端口复用能力是否在当前进程可用。
///
/// 仅在 Unix 目标上可用，且可被 [`REUSEPORT_ENV`] 关闭；传输在构造时读取一次并保存结果。
pub fn reuseport_is_available() -> bool {
    cfg!(unix) && reuseport_env_allows(env::var(REUSEPORT_ENV).ok().as_deref())
}

/// 解析环境变量取值；未设置视为允许。
pub(crate) fn reuseport_env_allows(value: Option<&str>) -> bool {
    match value {
        Some(value) => {
            let value = value.trim();
            !(value == "0" || value.eq_ignore_ascii_case("false"))
        }
        None => true,
    }
}

/// 支持端口复用的共享监听工厂。
///
/// # 教案级注释
///
/// ## 意图（Why）
/// - 重复的监听/拨号周期可以共享或回收本地端口状态，减少建连成本并避免端口耗尽；
/// - 工厂在同一传输实例的所有 `listen` 调用之间共享，内部簿记的并发安全由实现自行保证。
///
/// ## 契约说明（What）
/// - `listen` 与普通原语语义一致：返回绑定到（或共享）本地地址的原始监听器；
/// - 绑定失败以原始 `io::Error` 返回。
pub trait ReuseportListen: Send + Sync + 'static {
    /// 通过共享端口状态绑定监听。
    fn listen(&self, laddr: &Multiaddr) -> io::Result<Box<dyn RawListener>>;
}

type Registry = DashMap<Multiaddr, Weak<SharedListener>>;

/// 默认的端口复用工厂：按本地地址共享仍存活的原始监听器。
///
/// # 教案级注释
///
/// ## 逻辑（How）
/// - 注册表以实际绑定地址为键，保存底层监听器的弱引用；
/// - 对同一地址的再次 `listen` 若命中存活监听器，则返回共享同一底层套接字的新句柄，
///   多个句柄上的 `accept` 分摊同一个接受队列；
/// - 端口 `0` 表示临时端口，总是重新绑定，并以分配到的地址登记；
/// - 最后一个句柄析构时关闭底层监听器并移除登记。
///
/// ## 风险提示（Trade-offs）
/// - 绑定在注册表分片锁内同步完成，同一分片上的并发 `listen` 会短暂串行。
pub struct ReusePool {
    socket: Arc<dyn VsockSocket>,
    listeners: Arc<Registry>,
}

impl ReusePool {
    /// 基于套接字原语构造。
    pub fn new(socket: Arc<dyn VsockSocket>) -> Self {
        Self {
            socket,
            listeners: Arc::new(DashMap::new()),
        }
    }

    /// 当前登记的存活监听地址数量。
    pub fn active(&self) -> usize {
        self.listeners
            .iter()
            .filter(|entry| entry.value().strong_count() > 0)
            .count()
    }

    /// 绑定新的底层监听器；`key` 为 `None` 时以实际绑定地址登记。
    fn bind(
        &self,
        laddr: &Multiaddr,
        key: Option<&Multiaddr>,
    ) -> io::Result<Arc<SharedListener>> {
        let inner = self.socket.listen(laddr)?;
        let bound = inner.multiaddr();
        Ok(Arc::new(SharedListener {
            key: key.cloned().unwrap_or_else(|| bound.clone()),
            bound,
            inner,
            registry: Arc::downgrade(&self.listeners),
        }))
    }
}

fn is_ephemeral(laddr: &Multiaddr) -> bool {
    laddr.iter().last().is_some_and(|port| port.value() == "0")
}

impl ReuseportListen for ReusePool {
    fn listen(&self, laddr: &Multiaddr) -> io::Result<Box<dyn RawListener>> {
        if is_ephemeral(laddr) {
            let shared = self.bind(laddr, None)?;
            self.listeners
                .insert(shared.key.clone(), Arc::downgrade(&shared));
            trace!(addr = %shared.bound, "reuse pool bound ephemeral listener");
            return Ok(Box::new(PooledListener::new(shared)));
        }

        let shared = match self.listeners.entry(laddr.clone()) {
            Entry::Occupied(mut entry) => match entry.get().upgrade() {
                Some(shared) => {
                    trace!(addr = %laddr, "reuse pool shares live listener");
                    shared
                }
                None => {
                    let shared = self.bind(laddr, Some(laddr))?;
                    entry.insert(Arc::downgrade(&shared));
                    shared
                }
            },
            Entry::Vacant(entry) => {
                let shared = self.bind(laddr, Some(laddr))?;
                entry.insert(Arc::downgrade(&shared));
                shared
            }
        };
        Ok(Box::new(PooledListener::new(shared)))
    }
}

/// 注册表中的底层监听器。
///
/// `key` 是登记用的地址（显式端口时为请求地址，临时端口时为分配到的地址），
/// `bound` 是底层监听器报告的实际绑定地址；两者可能不同（例如绑定到任意 CID）。
struct SharedListener {
    key: Multiaddr,
    bound: Multiaddr,
    inner: Box<dyn RawListener>,
    registry: Weak<Registry>,
}

impl Drop for SharedListener {
    fn drop(&mut self) {
        if let Err(err) = self.inner.close() {
            trace!(addr = %self.bound, error = %err, "closing pooled listener failed");
        }
        if let Some(registry) = self.registry.upgrade() {
            registry.remove_if(&self.key, |_, weak| weak.strong_count() == 0);
        }
    }
}

/// 共享监听器上的单个句柄；`close` 只影响本句柄。
///
/// 关闭信号经 `watch` 通道广播：已挂起的 `accept` 与之后的调用都会立即返回 `NotConnected`，
/// 底层监听器保持打开，直到最后一个句柄析构。
struct PooledListener {
    shared: Arc<SharedListener>,
    closed: watch::Sender<bool>,
}

impl PooledListener {
    fn new(shared: Arc<SharedListener>) -> Self {
        let (closed, _) = watch::channel(false);
        Self { shared, closed }
    }
}

fn closed_error() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "pooled listener closed")
}

#[async_trait]
impl RawListener for PooledListener {
    async fn accept(&self) -> io::Result<RawConnection> {
        let mut closed = self.closed.subscribe();
        if *closed.borrow_and_update() {
            return Err(closed_error());
        }
        tokio::select! {
            accepted = self.shared.inner.accept() => accepted,
            _ = closed.wait_for(|closed| *closed) => Err(closed_error()),
        }
    }

    fn multiaddr(&self) -> Multiaddr {
        self.shared.bound.clone()
    }

    fn close(&self) -> io::Result<()> {
        self.closed.send_replace(true);
        Ok(())
    }
}
