//! ICMP echo latency check.

use std::net::IpAddr;
use std::time::Duration;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use surge_ping::SurgeError;
use tokio::net::lookup_host;
use tracing::debug;

use super::require;
use crate::params::{Defaults, ResolvedParams};
use crate::registry::{TaskArgs, TaskHandler};
use crate::task::{PingUpdate, Task, TaskResult, Update};

const PAYLOAD: [u8; 56] = [0; 56];

/// Ping `target` `count` times and flag latency at or above `high` ms.
///
/// Raw ICMP sockets need elevated privileges; without them every run
/// reports an error.
pub struct PingCheck;

#[async_trait]
impl TaskHandler for PingCheck {
    async fn run(&self, args: &TaskArgs<'_>) -> TaskResult {
        let params = ResolvedParams::new(
            &args.task.params,
            Defaults::new().with("count", 3).with("high", 75),
        );
        let target = require!(args.task, params.non_empty_string("target"));
        let count = require!(args.task, params.int("count")).clamp(1, 100) as u32;
        let high = require!(args.task, params.int("high"));

        match send_pings(&target, count).await {
            Ok(rtts) => ping_result(args.task, summarize(count, &rtts), high),
            Err(e) => TaskResult::failure(args.task, e),
        }
    }
}

/// Round trip times of the echoes that came back
async fn send_pings(target: &str, count: u32) -> Result<Vec<Duration>> {
    let host = resolve(target).await?;
    let mut rtts = Vec::with_capacity(count as usize);
    for seq in 0..count {
        match surge_ping::ping(host, &PAYLOAD).await {
            Ok((_, rtt)) => rtts.push(rtt),
            Err(SurgeError::Timeout { .. }) => debug!(target, seq, "Ping timed out"),
            Err(e) => return Err(anyhow!("ping to {} failed: {}", target, e)),
        }
    }
    Ok(rtts)
}

async fn resolve(target: &str) -> Result<IpAddr> {
    if let Ok(ip) = target.parse() {
        return Ok(ip);
    }
    lookup_host((target, 0))
        .await
        .map_err(|e| anyhow!("failed to resolve {}: {}", target, e))?
        .map(|addr| addr.ip())
        .next()
        .ok_or_else(|| anyhow!("no address found for {}", target))
}

/// Reduce raw round trips into the ping payload
pub fn summarize(sent: u32, rtts: &[Duration]) -> PingUpdate {
    let recv = rtts.len() as u32;
    let loss = if sent == 0 { 0.0 } else { f64::from(sent - recv.min(sent)) * 100.0 / f64::from(sent) };

    let millis: Vec<f64> = rtts.iter().map(|rtt| rtt.as_micros() as f64 / 1000.0).collect();
    let (avg, jitt) = if millis.is_empty() {
        (0.0, 0.0)
    } else {
        let mean = millis.iter().sum::<f64>() / millis.len() as f64;
        let variance = millis.iter().map(|m| (m - mean).powi(2)).sum::<f64>() / millis.len() as f64;
        (mean, variance.sqrt())
    };

    PingUpdate { sent, recv, loss, avg: avg as i64, jitt: jitt as i64 }
}

/// Apply the latency and loss thresholds shared by real and demo pings
pub(crate) fn ping_result(task: &Task, update: PingUpdate, high: i64) -> TaskResult {
    let warn = update.avg >= high || update.loss > 0.0;
    let mut result = TaskResult::new(task).with_spark(update.avg, warn);
    if warn {
        result = result.with_warning(format!(
            "ping of {}ms detected with {:.1}% packet loss!",
            update.avg, update.loss
        ));
    }
    result.with_update(Update::Ping(update))
}
