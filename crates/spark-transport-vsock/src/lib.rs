#![deny(unsafe_code)]
#![allow(clippy::result_large_err)]
#![doc = r#"
spark-transport-vsock：基于虚拟套接字（VSOCK）地址族的可插拔传输。

== 使命概述 ==
- **Why**：宿主与虚拟机、飞地之间的通信走 VSOCK 地址族，宿主网络栈需要像调度 IP 传输一样拨号与监听这些地址；
- **What**：实现 [`spark_transport::Transport`]，接受 `/vsock/<cid>/tcp/<port>` 或 `/vsock/<cid>/xtcp/<port>`
  两种地址形态，负责资源准入、可选的端口复用监听以及把原始连接移交给升级器；
- **How**：门面 [`VsockTransport`] 以 [`Carrier`] 为编译期参数，组合地址匹配器、资源受控拨号器、
  端口复用感知的监听绑定与升级交接四个内部部件。

== 生命周期契约 ==
1. 每次 `dial` 恰好开出一个连接作用域；准入被拒时没有作用域需要归还；
2. 其后的任何失败（对端绑定、建连、升级）都会在错误返回前把作用域归还恰好一次；
3. 成功时作用域随升级后的连接交给宿主。

== 运行时特性 ==
- `runtime-tokio`（默认）：提供基于 `tokio-vsock` 的 [`TokioVsockSocket`]；
- 关闭后默认原语为 [`UnsupportedSocket`]，宿主可通过 [`with_socket`] 注入自己的实现。
"#]

mod carrier;
mod config;
mod dialer;
mod listener;
mod matcher;
mod reuse;
mod socket;
#[cfg(feature = "runtime-tokio")]
mod tokio_socket;
mod transport;
mod upgrade;

pub use carrier::{Carrier, TcpCarrier, XtcpCarrier};
pub use config::{
    TransportConfig, TransportOption, VsockSettings, disable_reuseport, with_reuseport,
    with_socket,
};
pub use matcher::AddressMatcher;
pub use reuse::{REUSEPORT_ENV, ReusePool, ReuseportListen, reuseport_is_available};
pub use socket::{UnsupportedSocket, VsockEndpoint, VsockSocket};
#[cfg(feature = "runtime-tokio")]
pub use tokio_socket::{TokioVsockListener, TokioVsockSocket};
pub use transport::{VsockTcpTransport, VsockTransport, VsockXtcpTransport};
