//! The poll loop: fetch, normalize, map, publish, sleep.
//!
//! A cycle either publishes both documents (raw first, then standard) or
//! publishes nothing. Both payloads are built before the first publish so an
//! unmappable feed never leaves a lone raw update behind.

use std::future::Future;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::broker::{Publish, Topics};
use crate::config::{DiscoveryConf, InvalidFeedPolicy, PollConf};
use crate::discovery::publish_discovery;
use crate::error::{BridgeError, Result};
use crate::feed::RawFeedTree;
use crate::fetcher::FeedSource;
use crate::record::StandardRecord;

/// How a cycle ended, when it did not stop the bridge.
#[derive(Debug)]
pub enum CycleOutcome {
    /// Both documents went out.
    Published { warnings: usize },
    /// The fetch produced no data.
    NoData(BridgeError),
    /// The feed could not be mapped and was skipped.
    Invalid(BridgeError),
}

impl CycleOutcome {
    /// Wait before the next cycle.
    pub fn delay(&self, poll: &PollConf) -> Duration {
        match self {
            CycleOutcome::Published { .. } => poll.interval(),
            CycleOutcome::NoData(_) | CycleOutcome::Invalid(_) => poll.retry(),
        }
    }
}

/// Payloads of one cycle, ready to publish.
struct Prepared {
    raw: Vec<u8>,
    standard: Vec<u8>,
    warnings: usize,
}

pub struct FeedBridge<F, P> {
    source: F,
    publisher: P,
    topics: Topics,
    poll: PollConf,
}

impl<F: FeedSource, P: Publish> FeedBridge<F, P> {
    pub fn new(source: F, publisher: P, topics: Topics, poll: PollConf) -> Self {
        Self {
            source,
            publisher,
            topics,
            poll,
        }
    }

    pub fn topics(&self) -> &Topics {
        &self.topics
    }

    fn prepare(raw: &[u8]) -> Result<Prepared> {
        let tree = RawFeedTree::parse(raw)?;
        let record = StandardRecord::from_tree(&tree)?;
        Ok(Prepared {
            raw: serde_json::to_vec(&tree)?,
            standard: serde_json::to_vec(&record)?,
            warnings: tree.warnings().len(),
        })
    }

    /// Run a single cycle. `Err` means the bridge must stop.
    pub async fn run_cycle(&self) -> Result<CycleOutcome> {
        let raw = match self.source.fetch().await {
            Ok(raw) => raw,
            Err(e) if e.is_recoverable() => {
                warn!("No feed data: {}", e);
                return Ok(CycleOutcome::NoData(e));
            }
            Err(e) => return Err(e),
        };

        let prepared = match Self::prepare(&raw) {
            Ok(prepared) => prepared,
            Err(e) if e.is_invalid_feed() => {
                return match self.poll.on_invalid_feed {
                    InvalidFeedPolicy::Skip => {
                        error!("Skipping invalid feed: {}", e);
                        Ok(CycleOutcome::Invalid(e))
                    }
                    InvalidFeedPolicy::Exit => Err(e),
                };
            }
            Err(e) => return Err(e),
        };

        self.publisher
            .publish(&self.topics.raw(), prepared.raw, false)
            .await?;
        self.publisher
            .publish(&self.topics.standard(), prepared.standard, false)
            .await?;

        info!(warnings = prepared.warnings, "Published feed update");
        Ok(CycleOutcome::Published {
            warnings: prepared.warnings,
        })
    }

    /// Poll forever. Returns only with the error that stopped the bridge.
    pub async fn run(&self) -> Result<()> {
        info!(
            raw = %self.topics.raw(),
            standard = %self.topics.standard(),
            interval_secs = self.poll.interval_secs,
            retry_secs = self.poll.retry_secs,
            "Starting poll loop"
        );
        loop {
            let outcome = self.run_cycle().await?;
            tokio::time::sleep(outcome.delay(&self.poll)).await;
        }
    }

    async fn serve(&self, discovery: Option<&DiscoveryConf>) -> Result<()> {
        if let Some(conf) = discovery {
            publish_discovery(&self.publisher, &self.topics, conf).await?;
        }
        self.run().await
    }

    /// Publish discovery configs (when given), then poll until `shutdown`
    /// resolves. Shutdown wins even while a publish waits on the broker.
    pub async fn run_until<S>(&self, discovery: Option<&DiscoveryConf>, shutdown: S) -> Result<()>
    where
        S: Future<Output = ()>,
    {
        tokio::select! {
            res = self.serve(discovery) => res,
            _ = shutdown => {
                info!("Shutdown requested");
                Ok(())
            }
        }
    }
}
