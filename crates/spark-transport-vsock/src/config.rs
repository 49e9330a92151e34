use std::fmt;
use std::sync::Arc;

use serde::Deserialize;
use spark_transport::TransportError;

use crate::reuse::{ReuseportListen, reuseport_is_available};
use crate::socket::VsockSocket;

/// 构造期间被配置项逐个修改的可变配置。
///
/// 只在 [`VsockTransport::new`](crate::VsockTransport::new) 内部存在；任一配置项失败时整体丢弃，
/// 不会产生部分配置的传输实例。
pub struct TransportConfig {
    pub(crate) disable_reuseport: bool,
    pub(crate) socket: Option<Arc<dyn VsockSocket>>,
    pub(crate) reuse: Option<Arc<dyn ReuseportListen>>,
    pub(crate) reuseport_available: bool,
    supports_reuseport: bool,
}

impl TransportConfig {
    pub(crate) fn new(supports_reuseport: bool) -> Self {
        Self {
            disable_reuseport: false,
            socket: None,
            reuse: None,
            reuseport_available: reuseport_is_available(),
            supports_reuseport,
        }
    }

    /// 显式关闭端口复用。
    pub fn set_disable_reuseport(&mut self, disable: bool) {
        self.disable_reuseport = disable;
    }

    /// 当前是否显式关闭了端口复用。
    pub fn reuseport_disabled(&self) -> bool {
        self.disable_reuseport
    }

    /// 覆盖端口复用可用性探测结果。
    ///
    /// 初值取自 [`reuseport_is_available`]；宿主明确知道平台不支持端口复用时可将其置为 `false`。
    pub fn set_reuseport_available(&mut self, available: bool) {
        self.reuseport_available = available;
    }

    /// 端口复用机制在当前平台上是否可用。
    pub fn reuseport_available(&self) -> bool {
        self.reuseport_available
    }

    /// 当前承载变体是否支持端口复用。
    pub fn supports_reuseport(&self) -> bool {
        self.supports_reuseport
    }
}

type ApplyFn = Box<dyn FnOnce(&mut TransportConfig) -> Result<(), TransportError> + Send>;

/// 命名的构造期配置项。
///
/// # 教案级注释
///
/// ## 意图（Why）
/// - 以有序的变更函数列表表达配置：后出现的配置项可覆盖先前的设置；
/// - 每个配置项都可以校验自身前提，失败时中止整个构造流程。
///
/// ## 契约说明（What）
/// - 配置项按传入顺序执行，首个失败之后的配置项不会被执行；
/// - `name` 出现在日志与校验错误中。
pub struct TransportOption {
    name: &'static str,
    apply: ApplyFn,
}

impl TransportOption {
    /// 以名称和变更函数构造自定义配置项。
    pub fn new<F>(name: &'static str, apply: F) -> Self
    where
        F: FnOnce(&mut TransportConfig) -> Result<(), TransportError> + Send + 'static,
    {
        Self {
            name,
            apply: Box::new(apply),
        }
    }

    /// 配置项名称。
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub(crate) fn apply(self, config: &mut TransportConfig) -> Result<(), TransportError> {
        (self.apply)(config)
    }
}

impl fmt::Debug for TransportOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportOption")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// 显式关闭端口复用。
pub fn disable_reuseport() -> TransportOption {
    TransportOption::new("disable_reuseport", |config| {
        config.set_disable_reuseport(true);
        Ok(())
    })
}

/// 替换默认的套接字原语。
pub fn with_socket(socket: Arc<dyn VsockSocket>) -> TransportOption {
    TransportOption::new("with_socket", move |config| {
        config.socket = Some(socket);
        Ok(())
    })
}

/// 替换默认的端口复用工厂；承载变体不支持端口复用时校验失败。
pub fn with_reuseport(reuse: Arc<dyn ReuseportListen>) -> TransportOption {
    TransportOption::new("with_reuseport", move |config| {
        if !config.supports_reuseport() {
            return Err(TransportError::invalid_option(
                "with_reuseport",
                "carrier does not support port reuse",
            ));
        }
        config.reuse = Some(reuse);
        Ok(())
    })
}

/// 可从配置文件加载的传输设置。
///
/// ```toml
/// disable_reuseport = true
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VsockSettings {
    /// 显式关闭端口复用。
    pub disable_reuseport: bool,
}

impl VsockSettings {
    /// 转换为等价的配置项序列。
    pub fn into_options(self) -> Vec<TransportOption> {
        let mut options = Vec::new();
        if self.disable_reuseport {
            options.push(disable_reuseport());
        }
        options
    }
}
