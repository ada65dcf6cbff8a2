//! Reachability check: can a connection to `target` be established?

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;
use tokio::net::{TcpStream, UdpSocket, lookup_host};
use tokio::time::timeout;

use super::require;
use crate::params::{Defaults, ResolvedParams};
use crate::registry::{TaskArgs, TaskHandler};
use crate::task::{Task, TaskResult, Update};

/// Dial `target` with `method` (tcp, tcp4, tcp6, udp, udp4, udp6)
pub struct PortCheck;

#[async_trait]
impl TaskHandler for PortCheck {
    async fn run(&self, args: &TaskArgs<'_>) -> TaskResult {
        let params = ResolvedParams::new(
            &args.task.params,
            Defaults::new().with("method", "tcp").with("timeout", 10),
        );
        let target = require!(args.task, params.non_empty_string("target"));
        let method = require!(args.task, params.string("method"));
        let timeout_secs = require!(args.task, params.int("timeout")).max(0);

        let outcome = dial(&method, &target, Duration::from_secs(timeout_secs as u64)).await;
        reachability_result(args.task, &method, timeout_secs, outcome.err())
    }
}

/// Build the reachability result; any dial error means not connected
pub(crate) fn reachability_result(
    task: &Task,
    method: &str,
    timeout_secs: i64,
    error: Option<anyhow::Error>,
) -> TaskResult {
    let connected = error.is_none();
    let mut result = TaskResult::new(task).with_update(Update::Connected { connected });
    if let Some(error) = error {
        result = result.with_error(error).with_warning(unreachable_notice(method, timeout_secs));
    }
    result
}

pub(crate) fn unreachable_notice(method: &str, timeout_secs: i64) -> String {
    format!("Port checker could not connect to {} target within {} seconds!", method, timeout_secs)
}

/// Open (and immediately drop) a connection to `target`.
///
/// A zero timeout waits for the operating system to give up.
pub async fn dial(method: &str, target: &str, limit: Duration) -> Result<()> {
    if limit.is_zero() {
        return try_dial(method, target).await;
    }
    timeout(limit, try_dial(method, target))
        .await
        .map_err(|_| anyhow!("{} connection timeout", method))?
}

async fn try_dial(method: &str, target: &str) -> Result<()> {
    let (udp, family) = match method {
        "tcp" => (false, None),
        "tcp4" => (false, Some(true)),
        "tcp6" => (false, Some(false)),
        "udp" => (true, None),
        "udp4" => (true, Some(true)),
        "udp6" => (true, Some(false)),
        other => bail!("unknown network {}", other),
    };

    let addrs: Vec<SocketAddr> = lookup_host(target)
        .await
        .map_err(|e| anyhow!("failed to resolve {}: {}", target, e))?
        .filter(|addr| family.is_none_or(|v4| addr.is_ipv4() == v4))
        .collect();

    let mut last_error = anyhow!("no suitable address found for {}", target);
    for addr in addrs {
        let connected = if udp { connect_udp(addr).await } else { connect_tcp(addr).await };
        match connected {
            Ok(()) => return Ok(()),
            Err(e) => last_error = e,
        }
    }
    Err(last_error)
}

async fn connect_tcp(addr: SocketAddr) -> Result<()> {
    TcpStream::connect(addr).await.map_err(|e| anyhow!("TCP connection failed: {}", e))?;
    Ok(())
}

async fn connect_udp(addr: SocketAddr) -> Result<()> {
    let local = if addr.is_ipv4() {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0)
    } else {
        SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), 0)
    };
    let socket = UdpSocket::bind(local).await?;
    socket.connect(addr).await.map_err(|e| anyhow!("UDP connection failed: {}", e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unknown_method_is_an_error() {
        let err = dial("sctp", "127.0.0.1:80", Duration::from_secs(1)).await.unwrap_err();
        assert!(err.to_string().contains("unknown network sctp"));
    }

    #[tokio::test]
    async fn test_family_filter_rejects_mismatch() {
        assert!(dial("tcp6", "127.0.0.1:80", Duration::from_secs(1)).await.is_err());
    }

    #[tokio::test]
    async fn test_udp_dial_to_loopback() {
        assert!(dial("udp", "127.0.0.1:53", Duration::from_secs(1)).await.is_ok());
    }

    #[test]
    fn test_result_shape() {
        let task = Task::new("port", "SSH");

        let ok = reachability_result(&task, "tcp", 10, None);
        assert!(!ok.warn);
        assert_eq!(ok.update, Some(Update::Connected { connected: true }));

        let failed = reachability_result(&task, "udp", 3, Some(anyhow!("refused")));
        assert!(failed.warn);
        assert_eq!(failed.error.as_deref(), Some("refused"));
        assert_eq!(
            failed.notification.as_deref(),
            Some("Port checker could not connect to udp target within 3 seconds!")
        );
        assert_eq!(failed.update, Some(Update::Connected { connected: false }));
    }
}
