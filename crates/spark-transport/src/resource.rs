use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::{BoxError, Multiaddr, PeerId};

/// 连接方向。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    /// 对端发起的连接。
    Inbound,
    /// 本端发起的连接。
    Outbound,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Inbound => f.write_str("inbound"),
            Direction::Outbound => f.write_str("outbound"),
        }
    }
}

/// 资源管理器：决定是否接纳一条新连接，并为其开出连接作用域。
///
/// # 教案级注释
///
/// ## 意图（Why）
/// - 准入策略（全局连接上限、单对端上限等）属于宿主，传输层只负责在正确的时机申请与归还预算；
/// - 以 trait 暴露，便于宿主替换为自己的限流实现或在测试中注入计数伪实现。
///
/// ## 契约说明（What）
/// - `open_connection` 成功返回的作用域必须被调用方恰好 `done` 一次；
/// - 失败表示准入被拒绝，调用方不持有任何需要归还的资源；
/// - `transient` 表示连接是否为临时（例如中继探测）连接。
pub trait ResourceManager: Send + Sync + 'static {
    /// 为一条连接申请作用域。
    fn open_connection(
        &self,
        direction: Direction,
        transient: bool,
        endpoint: &Multiaddr,
    ) -> Result<Box<dyn ConnectionScope>, BoxError>;
}

/// 单条连接占用的资源作用域。
pub trait ConnectionScope: Send + Sync + 'static {
    /// 将作用域绑定到对端身份；对端级限额超出时返回错误。
    fn set_peer(&self, peer: &PeerId) -> Result<(), BoxError>;

    /// 归还作用域占用的全部预算。
    fn done(&self);
}

/// 始终准入的资源管理器，宿主未提供实现时使用。
#[derive(Clone, Copy, Debug, Default)]
pub struct NullResourceManager;

impl ResourceManager for NullResourceManager {
    fn open_connection(
        &self,
        _direction: Direction,
        _transient: bool,
        _endpoint: &Multiaddr,
    ) -> Result<Box<dyn ConnectionScope>, BoxError> {
        Ok(Box::new(NullScope))
    }
}

/// [`NullResourceManager`] 开出的空作用域，`set_peer`/`done` 均为空操作。
#[derive(Clone, Copy, Debug, Default)]
pub struct NullScope;

impl ConnectionScope for NullScope {
    fn set_peer(&self, _peer: &PeerId) -> Result<(), BoxError> {
        Ok(())
    }

    fn done(&self) {}
}

struct ScopeState {
    scope: Box<dyn ConnectionScope>,
    released: AtomicBool,
}

impl ScopeState {
    fn release(&self) -> bool {
        let first = self
            .released
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if first {
            self.scope.done();
        }
        first
    }
}

/// 连接作用域的生命周期守卫，保证底层 `done` 恰好执行一次。
///
/// # 教案级注释
///
/// ## 意图（Why）
/// - 拨号路径上存在多个失败出口（绑定对端、建连、升级），任何一个出口遗漏或重复归还都会让预算漂移；
/// - 守卫把“恰好一次”变成结构性保证：显式 `release` 与 `Drop` 共享同一个原子标记。
///
/// ## 契约说明（What）
/// - `release` 首次调用时执行 `done` 并返回 `true`，之后的调用（包括 `Drop`）都是空操作；
/// - 守卫移交给升级器后，成功升级的连接持有它，连接关闭或析构时归还；
/// - [`ScopeHandle`] 与守卫共享状态，但析构时不会归还，只用于在移交后仍能兜底释放。
///
/// ## 风险提示（Trade-offs）
/// - 若持有者通过 `mem::forget` 泄漏守卫且无人调用 `ScopeHandle::release`，预算将无法归还。
pub struct ScopeGuard {
    state: Arc<ScopeState>,
}

impl ScopeGuard {
    /// 接管资源管理器开出的作用域。
    pub fn new(scope: Box<dyn ConnectionScope>) -> Self {
        Self {
            state: Arc::new(ScopeState {
                scope,
                released: AtomicBool::new(false),
            }),
        }
    }

    /// 将作用域绑定到对端身份。
    pub fn set_peer(&self, peer: &PeerId) -> Result<(), BoxError> {
        self.state.scope.set_peer(peer)
    }

    /// 归还作用域，返回本次调用是否真正执行了归还。
    pub fn release(&self) -> bool {
        self.state.release()
    }

    /// 作用域是否已经归还。
    pub fn is_released(&self) -> bool {
        self.state.released.load(Ordering::Acquire)
    }

    /// 派生一个不随析构归还的句柄。
    pub fn handle(&self) -> ScopeHandle {
        ScopeHandle {
            state: Arc::clone(&self.state),
        }
    }
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        self.state.release();
    }
}

impl fmt::Debug for ScopeGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeGuard")
            .field("released", &self.is_released())
            .finish()
    }
}

/// 与 [`ScopeGuard`] 共享归还标记的弱持有句柄。
pub struct ScopeHandle {
    state: Arc<ScopeState>,
}

impl ScopeHandle {
    /// 归还作用域（若尚未归还）。
    pub fn release(&self) -> bool {
        self.state.release()
    }

    /// 作用域是否已经归还。
    pub fn is_released(&self) -> bool {
        self.state.released.load(Ordering::Acquire)
    }
}

impl fmt::Debug for ScopeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeHandle")
            .field("released", &self.is_released())
            .finish()
    }
}
