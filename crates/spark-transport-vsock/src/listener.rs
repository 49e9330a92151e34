use std::io;

use spark_transport::{Multiaddr, RawListener};
use tracing::trace;

use crate::reuse::ReuseportListen;
use crate::socket::VsockSocket;

/// 感知端口复用的原始监听绑定。
///
/// `reuse` 为 `Some` 表示端口复用已启用且可用，此时经由共享工厂绑定；
/// 否则直接调用普通监听原语。绑定失败的 `io::Error` 原样返回，监听阶段不涉及资源作用域。
pub(crate) fn listen_raw(
    socket: &dyn VsockSocket,
    reuse: Option<&dyn ReuseportListen>,
    laddr: &Multiaddr,
) -> io::Result<Box<dyn RawListener>> {
    match reuse {
        Some(reuse) => {
            trace!(addr = %laddr, "listening through reuseport factory");
            reuse.listen(laddr)
        }
        None => {
            trace!(addr = %laddr, "listening through plain vsock socket");
            socket.listen(laddr)
        }
    }
}
