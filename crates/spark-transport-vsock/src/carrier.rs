use spark_transport::Protocol;

/// VSOCK 地址之上的承载协议变体。
///
/// # 教案级注释
///
/// ## 意图（Why）
/// - VSOCK 传输存在两种几乎相同的变体：以通用 TCP 分段承载，或以 VSOCK 专用的扩展 TCP（XTCP）分段承载；
/// - 两者只在“接受的地址形态”“声明的终端协议”“是否支持端口复用”上不同，
///   因此抽象为编译期参数，由同一个 [`VsockTransport`](crate::VsockTransport) 核心实现，避免两份代码漂移。
///
/// ## 契约说明（What）
/// - `PROTOCOL`：承载分段的协议码，也是 `Transport::protocols` 的唯一元素；
/// - `DIAL_PATTERN`：`can_dial` 接受的完整协议码序列，恒为 `[VSOCK, PROTOCOL]`；
/// - `SUPPORTS_REUSEPORT`：变体是否提供共享端口复用工厂；
/// - 变体之间不存在运行期切换，宿主在类型层面二选一。
pub trait Carrier: Send + Sync + 'static {
    /// 承载分段协议码。
    const PROTOCOL: Protocol;
    /// 可拨号地址的协议码序列。
    const DIAL_PATTERN: &'static [Protocol];
    /// 终端协议声明。
    const PROTOCOLS: &'static [Protocol];
    /// 是否支持端口复用。
    const SUPPORTS_REUSEPORT: bool;
    /// 传输名称。
    const NAME: &'static str = "VSOCK";
}

/// `/vsock/<cid>/tcp/<port>` 变体，支持端口复用。
#[derive(Clone, Copy, Debug, Default)]
pub struct TcpCarrier;

impl Carrier for TcpCarrier {
    const PROTOCOL: Protocol = Protocol::TCP;
    const DIAL_PATTERN: &'static [Protocol] = &[Protocol::VSOCK, Protocol::TCP];
    const PROTOCOLS: &'static [Protocol] = &[Protocol::TCP];
    const SUPPORTS_REUSEPORT: bool = true;
}

/// `/vsock/<cid>/xtcp/<port>` 变体，不支持端口复用。
#[derive(Clone, Copy, Debug, Default)]
pub struct XtcpCarrier;

impl Carrier for XtcpCarrier {
    const PROTOCOL: Protocol = Protocol::XTCP;
    const DIAL_PATTERN: &'static [Protocol] = &[Protocol::VSOCK, Protocol::XTCP];
    const PROTOCOLS: &'static [Protocol] = &[Protocol::XTCP];
    const SUPPORTS_REUSEPORT: bool = false;
}
