use std::fmt;

/// 结构化地址中单个分段的协议码。
///
/// # 教案级注释
///
/// ## 意图（Why）
/// - 地址匹配只比较协议码序列，不关心分段取值，因此协议码需要是可比较、可拷贝的轻量值；
/// - 以 newtype 包裹 `u32`，避免与端口、CID 等同为整数的取值混用。
///
/// ## 契约说明（What）
/// - `IP4`/`TCP`/`UDP` 沿用 multicodec 注册表中的协议码；
/// - `VSOCK`/`XTCP` 尚无公开注册码，取自 multicodec 私有区间（`0x300000` 起），
///   仅保证在本工作区内稳定；
/// - 未知协议码在 `Display` 中以十六进制输出。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Protocol(u32);

impl Protocol {
    /// IPv4 地址分段。
    pub const IP4: Protocol = Protocol(0x0004);
    /// TCP 端口分段。
    pub const TCP: Protocol = Protocol(0x0006);
    /// UDP 端口分段。
    pub const UDP: Protocol = Protocol(0x0111);
    /// 虚拟套接字（VSOCK）CID 分段。
    pub const VSOCK: Protocol = Protocol(0x30_0056);
    /// VSOCK 专用的扩展 TCP 承载分段。
    pub const XTCP: Protocol = Protocol(0x30_0058);

    /// 由原始协议码构造。
    pub const fn from_code(code: u32) -> Self {
        Self(code)
    }

    /// 返回原始协议码。
    pub const fn code(self) -> u32 {
        self.0
    }

    /// 返回协议的文本名称，未知协议返回 `None`。
    pub const fn name(self) -> Option<&'static str> {
        match self {
            Self::IP4 => Some("ip4"),
            Self::TCP => Some("tcp"),
            Self::UDP => Some("udp"),
            Self::VSOCK => Some("vsock"),
            Self::XTCP => Some("xtcp"),
            _ => None,
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "0x{:x}", self.0),
        }
    }
}

/// 结构化地址的一个 `(协议码, 取值)` 分段。
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Component {
    protocol: Protocol,
    value: String,
}

impl Component {
    /// 构造分段。
    pub fn new(protocol: Protocol, value: impl Into<String>) -> Self {
        Self {
            protocol,
            value: value.into(),
        }
    }

    /// 分段协议码。
    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    /// 分段的文本取值（例如 CID、端口号）。
    pub fn value(&self) -> &str {
        &self.value
    }
}

/// 有序、带类型的结构化地址，例如 `/vsock/3/tcp/1024`。
///
/// # 教案级注释
///
/// ## 意图（Why）
/// - 宿主网络栈以“协议分段序列”描述如何抵达一个端点，本类型是各传输共享的地址表达；
/// - 地址在传输内部只读，匹配与拨号均不会修改它。
///
/// ## 契约说明（What）
/// - 只提供程序化构造（`empty().with(..)`、`FromIterator`），字符串解析由宿主负责；
/// - `Display` 输出 `/name/value` 形式的稳定文本，适合作为日志字段；
/// - `protocols()` 按顺序给出协议码序列，是地址匹配的唯一依据。
///
/// ## 风险提示（Trade-offs）
/// - 取值以文本保存，数值分段在使用处解析；解析失败由使用方决定如何报错。
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Multiaddr {
    components: Vec<Component>,
}

impl Multiaddr {
    /// 构造空地址。
    pub fn empty() -> Self {
        Self::default()
    }

    /// 追加一个分段并返回新地址。
    pub fn with(mut self, protocol: Protocol, value: impl Into<String>) -> Self {
        self.components.push(Component::new(protocol, value));
        self
    }

    /// 按顺序遍历分段。
    pub fn iter(&self) -> impl Iterator<Item = &Component> {
        self.components.iter()
    }

    /// 按顺序遍历协议码。
    pub fn protocols(&self) -> impl Iterator<Item = Protocol> + '_ {
        self.components.iter().map(Component::protocol)
    }

    /// 返回首个匹配协议的取值。
    pub fn value_for(&self, protocol: Protocol) -> Option<&str> {
        self.components
            .iter()
            .find(|component| component.protocol == protocol)
            .map(Component::value)
    }

    /// 分段数量。
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// 是否为空地址。
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

impl FromIterator<Component> for Multiaddr {
    fn from_iter<I: IntoIterator<Item = Component>>(iter: I) -> Self {
        Self {
            components: iter.into_iter().collect(),
        }
    }
}

impl fmt::Display for Multiaddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for component in &self.components {
            write!(f, "/{}/{}", component.protocol, component.value)?;
        }
        Ok(())
    }
}
