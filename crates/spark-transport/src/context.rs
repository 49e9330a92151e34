use std::borrow::Cow;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

/// 取消原语，表达拨号调用的可中断性。
///
/// # 设计背景（Why）
/// - 宿主可以在拨号进行中放弃一次连接尝试，需要一个可跨任务共享的取消位；
/// - 传输实现与升级器按各自能力决定是否响应，本原语不强制终止任何 Future。
///
/// # 逻辑解析（How）
/// - 内部为 `Arc<AtomicBool>`；`cancel` 首次成功置位时返回 `true`，重复调用返回 `false`；
/// - `child` 派生共享同一原子位的实例。
#[derive(Clone, Debug, Default)]
pub struct Cancellation {
    flag: Arc<AtomicBool>,
}

impl Cancellation {
    /// 创建处于“未取消”状态的令牌。
    pub fn new() -> Self {
        Self::default()
    }

    /// 查询是否已被取消。
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// 标记取消，返回是否为首次触发。
    pub fn cancel(&self) -> bool {
        self.flag
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// 派生共享同一取消位的子令牌。
    pub fn child(&self) -> Self {
        self.clone()
    }
}

/// 同时打开（simultaneous connect）协商的状态。
///
/// 双方同时互相拨号时，协商会指定其中一方为逻辑上的发起客户端；
/// 非发起方在升级时必须以入站方向参与安全/多路复用握手。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SimultaneousConnect {
    /// 本端是否为协商选出的发起客户端。
    pub is_client: bool,
    /// 触发协商的原因，例如 `"hole-punching"`。
    pub reason: Cow<'static, str>,
}

/// 单次拨号调用的上下文。
///
/// # 教案级注释
///
/// ## 意图（Why）
/// - 把取消、截止时间与同时打开协商这三类调用级信息随 `dial` 一起传递，
///   使传输实现不依赖任何全局状态；
/// - 升级器会拿到同一个上下文，从而继承宿主的取消语义。
///
/// ## 契约说明（What）
/// - `simultaneous_connect()` 返回 `Some((is_client, reason))` 表示协商进行中；
/// - `deadline()` 为空代表调用方未设置硬超时；
/// - 上下文在构造后只读，可安全地跨任务共享引用。
///
/// ## 风险提示（Trade-offs）
/// - 具体传输是否在建连阶段响应取消由实现自行声明，例如 VSOCK 拨号会忽略它。
#[derive(Clone, Debug, Default)]
pub struct DialContext {
    cancellation: Cancellation,
    deadline: Option<Instant>,
    simultaneous_connect: Option<SimultaneousConnect>,
}

impl DialContext {
    /// 创建不带取消、截止与协商信息的上下文。
    pub fn new() -> Self {
        Self::default()
    }

    /// 替换取消令牌。
    pub fn with_cancellation(mut self, cancellation: Cancellation) -> Self {
        self.cancellation = cancellation;
        self
    }

    /// 设置截止时间。
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// 标记本次拨号处于同时打开协商中。
    pub fn with_simultaneous_connect(
        mut self,
        is_client: bool,
        reason: impl Into<Cow<'static, str>>,
    ) -> Self {
        self.simultaneous_connect = Some(SimultaneousConnect {
            is_client,
            reason: reason.into(),
        });
        self
    }

    /// 取消令牌。
    pub fn cancellation(&self) -> &Cancellation {
        &self.cancellation
    }

    /// 截止时间。
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// 查询同时打开协商：`Some((is_client, reason))` 表示协商进行中。
    pub fn simultaneous_connect(&self) -> Option<(bool, &str)> {
        self.simultaneous_connect
            .as_ref()
            .map(|negotiation| (negotiation.is_client, negotiation.reason.as_ref()))
    }
}
