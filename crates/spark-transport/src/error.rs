use std::borrow::Cow;
use std::io;

use crate::{BoxError, Multiaddr, PeerId};

/// 传输层对宿主暴露的错误分类。
///
/// # 教案式注释
///
/// ## 意图（Why）
/// - **统一分类**：拨号/监听生命周期中每个失败出口都对应一个变体，宿主可据此决定退避、换地址或放弃；
/// - **原样传递**：协作者（资源管理器、套接字原语、升级器）的错误作为 `source` 保留，不改写内容；
/// - **稳定错误码**：`code()` 沿用 `spark.transport.*` 命名，便于日志聚合与告警规则。
///
/// ## 契约（What）
/// - `AdmissionRejected`：资源管理器拒绝开出作用域，本层未持有任何资源；
/// - `PeerBindingRejected`：作用域绑定对端失败，作用域已归还；
/// - `DialFailed`：底层建连失败，作用域已归还；
/// - `UpgradeFailed`：原始连接已建立但升级失败，作用域已归还；
/// - `ListenFailed`：绑定监听地址失败，监听阶段不涉及作用域；
/// - `InvalidOption`：构造阶段的配置项校验失败，传输实例不会被创建。
///
/// ## 风险与注意（Trade-offs）
/// - 本层从不重试；`is_retryable` 只是给宿主的提示，重试策略仍归宿主所有；
/// - 错误信息统一使用英文，便于跨团队排障。
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum TransportError {
    /// 资源管理器拒绝准入。
    #[error("resource manager rejected outbound connection to {addr}: {source}")]
    AdmissionRejected {
        addr: Multiaddr,
        #[source]
        source: BoxError,
    },
    /// 资源管理器拒绝绑定对端。
    #[error("resource manager rejected peer {peer} at {addr}: {source}")]
    PeerBindingRejected {
        peer: PeerId,
        addr: Multiaddr,
        #[source]
        source: BoxError,
    },
    /// 底层建连失败。
    #[error("dial {addr} failed: {source}")]
    DialFailed {
        addr: Multiaddr,
        #[source]
        source: io::Error,
    },
    /// 升级失败。
    #[error("upgrade of connection to {peer} at {addr} failed: {source}")]
    UpgradeFailed {
        peer: PeerId,
        addr: Multiaddr,
        #[source]
        source: BoxError,
    },
    /// 监听失败。
    #[error("listen on {addr} failed: {source}")]
    ListenFailed {
        addr: Multiaddr,
        #[source]
        source: io::Error,
    },
    /// 配置项校验失败。
    #[error("invalid transport option `{option}`: {reason}")]
    InvalidOption {
        option: &'static str,
        reason: Cow<'static, str>,
    },
}

pub(crate) const ADMISSION_REJECTED: &str = "spark.transport.admission_rejected";
pub(crate) const PEER_BINDING_REJECTED: &str = "spark.transport.peer_binding_rejected";
pub(crate) const DIAL_FAILED: &str = "spark.transport.dial_failed";
pub(crate) const UPGRADE_FAILED: &str = "spark.transport.upgrade_failed";
pub(crate) const LISTEN_FAILED: &str = "spark.transport.listen_failed";
pub(crate) const INVALID_OPTION: &str = "spark.transport.invalid_option";

impl TransportError {
    /// 构造配置校验错误。
    pub fn invalid_option(option: &'static str, reason: impl Into<Cow<'static, str>>) -> Self {
        Self::InvalidOption {
            option,
            reason: reason.into(),
        }
    }

    /// 稳定错误码。
    pub fn code(&self) -> &'static str {
        match self {
            Self::AdmissionRejected { .. } => ADMISSION_REJECTED,
            Self::PeerBindingRejected { .. } => PEER_BINDING_REJECTED,
            Self::DialFailed { .. } => DIAL_FAILED,
            Self::UpgradeFailed { .. } => UPGRADE_FAILED,
            Self::ListenFailed { .. } => LISTEN_FAILED,
            Self::InvalidOption { .. } => INVALID_OPTION,
        }
    }

    /// 宿主是否可以在退避后重试。
    ///
    /// 只有准入类拒绝属于暂时性的预算压力；其余失败重试同一地址通常没有意义。
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::AdmissionRejected { .. } | Self::PeerBindingRejected { .. }
        )
    }
}
