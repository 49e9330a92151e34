use spark_transport::{Multiaddr, Protocol};

/// 按协议码序列判定地址是否属于本传输。
///
/// 匹配是结构化且区分顺序的：地址的协议码序列必须与模式逐项相等且长度一致，
/// 前缀、后缀扩展或重排都不算匹配。纯函数，不做任何 I/O。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AddressMatcher {
    pattern: &'static [Protocol],
}

impl AddressMatcher {
    /// 以协议码序列构造匹配器。
    pub const fn new(pattern: &'static [Protocol]) -> Self {
        Self { pattern }
    }

    /// 匹配模式。
    pub fn pattern(&self) -> &'static [Protocol] {
        self.pattern
    }

    /// 判定地址是否匹配。
    pub fn matches(&self, addr: &Multiaddr) -> bool {
        addr.protocols().eq(self.pattern.iter().copied())
    }
}
