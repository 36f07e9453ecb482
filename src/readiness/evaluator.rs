use std::time::Duration;

use tokio::time;
use tracing::debug;
use tracing::error;
use tracing::warn;

use crate::Connection;
use crate::Error;
use crate::ReadinessCondition;
use crate::Result;
use crate::StatusDocument;
use crate::TableRef;
use crate::WaitOutcome;

/// Waits for a table to satisfy a readiness condition.
///
/// The server's own wait primitive does the polling; the evaluator bounds it
/// client-side as well and, on failure, fetches the table status so the
/// caller can see which shard or replica is behind.
#[derive(Debug, Clone, Copy)]
pub struct ReadinessEvaluator {
    /// Client-side slack beyond the server-side timeout
    grace: Duration,
}

impl ReadinessEvaluator {
    pub fn new(grace: Duration) -> Self {
        Self { grace }
    }

    /// Fails with [`Error::ReadinessTimeout`] carrying the status document
    /// when `condition` is not observed within `timeout`.
    pub async fn wait_for(
        &self,
        conn: &dyn Connection,
        table: &TableRef,
        condition: ReadinessCondition,
        timeout: Duration,
    ) -> Result<()> {
        self.wait_until(conn, table, Some(condition), timeout).await
    }

    /// Like [`wait_for`](Self::wait_for) but `None` waits for the server's
    /// default condition.
    pub async fn wait_until(
        &self,
        conn: &dyn Connection,
        table: &TableRef,
        condition: Option<ReadinessCondition>,
        timeout: Duration,
    ) -> Result<()> {
        let wanted = condition.map(|c| c.as_str()).unwrap_or("default");
        debug!(%table, condition = wanted, ?timeout, "waiting for table");

        let bound = timeout.saturating_add(self.grace);
        let outcome = match time::timeout(bound, conn.wait(table, condition, Some(timeout))).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => {
                error!(%table, condition = wanted, "wait failed: {}", e);
                match conn.status(table).await {
                    Ok(status) => dump_status(&status, "wait failed"),
                    Err(status_err) => warn!(%table, "status unavailable after failed wait: {}", status_err),
                }
                return Err(e);
            }
            Err(_) => {
                warn!(%table, condition = wanted, "server did not answer wait within {:?}", bound);
                WaitOutcome::TimedOut
            }
        };

        match outcome {
            WaitOutcome::Ready => {
                debug!(%table, condition = wanted, "table ready");
                Ok(())
            }
            WaitOutcome::TimedOut => {
                let status = match conn.status(table).await {
                    Ok(status) => status,
                    Err(e) => {
                        error!(
                            "Table {} did not reach {} within {:?}; status unavailable: {}",
                            table, wanted, timeout, e
                        );
                        return Err(e);
                    }
                };
                dump_status(&status, &format!("{table} not {wanted} after {timeout:?}"));
                Err(Error::ReadinessTimeout {
                    table: table.clone(),
                    condition,
                    timeout,
                    status: Box::new(status),
                })
            }
        }
    }
}

/// Logs the full status document for diagnosis.
pub fn dump_status(
    status: &StatusDocument,
    context: &str,
) {
    for (shard, replica) in status.lagging_replicas() {
        warn!(shard, server = %replica.server, state = ?replica.state, "replica not ready");
    }
    error!("{}; table status:\n{}", context, status.to_pretty_json());
}
