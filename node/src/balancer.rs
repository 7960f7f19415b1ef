//! Downstream transaction consumers and the dispatcher that feeds them.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::Instrument;

use hummingbird_types::TxEnvelope;

use crate::tracing_spans::dispatch_span;
use crate::BalancerError;

/// A consumer that builds application state from the transaction stream.
///
/// Confirmed transactions (crawled or from live blocks) carry `blk`; mempool
/// transactions do not. Delivery is at-least-once: after a crash the block
/// being processed is replayed.
#[async_trait]
pub trait Balancer: Send + Sync {
    /// Name used when reporting failures.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    async fn ontransaction(&self, tx: &TxEnvelope) -> Result<(), BalancerError>;
}

/// One balancer's failure during a dispatch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BalancerFailure {
    pub name: String,
    pub error: BalancerError,
}

/// Outcome of dispatching one transaction.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Balancers whose `ontransaction` returned `Ok`.
    pub delivered: usize,
    pub failures: Vec<BalancerFailure>,
}

impl DispatchReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Names of the balancers that failed, in dispatch order.
    pub fn failed(&self) -> impl Iterator<Item = &str> {
        self.failures.iter().map(|f| f.name.as_str())
    }
}

/// Fans transactions out to a fixed, ordered list of balancers.
#[derive(Clone, Default)]
pub struct Dispatcher {
    balancers: Vec<Arc<dyn Balancer>>,
}

impl Dispatcher {
    pub fn new(balancers: Vec<Arc<dyn Balancer>>) -> Self {
        Self { balancers }
    }

    pub fn len(&self) -> usize {
        self.balancers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.balancers.is_empty()
    }

    /// Invoke every balancer in order, awaiting each before the next.
    ///
    /// A failing balancer is recorded in the report; the remaining balancers
    /// still receive the transaction.
    pub async fn dispatch(&self, tx: &TxEnvelope) -> DispatchReport {
        let mut report = DispatchReport::default();
        if self.balancers.is_empty() {
            return report;
        }

        async {
            for balancer in &self.balancers {
                match balancer.ontransaction(tx).await {
                    Ok(()) => report.delivered += 1,
                    Err(error) => {
                        tracing::debug!(balancer = balancer.name(), %error, "balancer failed");
                        report.failures.push(BalancerFailure {
                            name: balancer.name().to_string(),
                            error,
                        });
                    }
                }
            }
        }
        .instrument(dispatch_span(tx.hash(), self.balancers.len()))
        .await;

        report
    }
}
