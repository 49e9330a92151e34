use std::fmt;

use async_trait::async_trait;

use crate::{CapableConnection, DialContext, Listener, Multiaddr, PeerId, Protocol, TransportError};

/// 传输的静态描述，随连接与监听器一起交给升级器。
///
/// 宿主据此把连接归属到具体传输（例如按名称打指标标签），而无需持有传输对象本身。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransportDescriptor {
    /// 传输名称，例如 `"VSOCK"`。
    pub name: &'static str,
    /// 传输声明可承载的终端协议。
    pub protocols: &'static [Protocol],
    /// 是否经由中间代理转发流量。
    pub proxy: bool,
}

impl fmt::Display for TransportDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// 宿主网络栈调用的传输能力集。
///
/// # 教案级注释
///
/// ## 意图（Why）
/// - 宿主把 TCP、VSOCK 等传输视为同一契约的可替换实现，通过 `dyn Transport` 统一调度；
/// - trait 只描述能力集，不包含任何继承层次或基类状态。
///
/// ## 架构定位（Architecture）
/// - 宿主先用 `can_dial` 过滤候选地址，再调用 `dial`（出站）或 `listen`（入站）；
/// - `protocols` 参与宿主的地址构造逻辑，`proxy` 决定是否视为隧道传输。
///
/// ## 契约说明（What）
/// - `can_dial`：纯函数，不做 I/O；
/// - `dial`：失败时绝不返回半成品连接，且本次调用开出的资源作用域已处理完毕；
/// - `listen`：同步绑定，返回惰性升级的监听器；
/// - 实现必须 `Send + Sync`，可被宿主从多个任务并发调用。
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// 判断地址是否属于本传输的地址族。
    fn can_dial(&self, addr: &Multiaddr) -> bool;

    /// 拨号到远端对等节点。
    async fn dial(
        &self,
        ctx: &DialContext,
        raddr: &Multiaddr,
        peer: &PeerId,
    ) -> Result<Box<dyn CapableConnection>, TransportError>;

    /// 在本地地址上监听。
    fn listen(&self, laddr: &Multiaddr) -> Result<Box<dyn Listener>, TransportError>;

    /// 传输声明可承载的终端协议。
    fn protocols(&self) -> &'static [Protocol];

    /// 是否经由中间代理转发流量。
    fn proxy(&self) -> bool;

    /// 人类可读的传输名称。
    fn name(&self) -> &'static str;

    /// 传输描述。
    fn descriptor(&self) -> TransportDescriptor {
        TransportDescriptor {
            name: self.name(),
            protocols: self.protocols(),
            proxy: self.proxy(),
        }
    }
}
