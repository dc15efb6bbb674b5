//! Target reservation service configuration

use crate::error::ConfigResult;
use crate::validation::{validate_positive, validate_required_string, validate_url, Validatable};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Marker the distributed-lock backends put in a 400 body when the lock
/// could not be acquired in time.
pub const DEFAULT_LOCK_TIMEOUT_MARKER: &str = "예매 처리 중입니다";

/// Server-side concurrency-control mechanism under test.
///
/// The characteristics listed on each variant are reference notes for
/// operators choosing a strategy; nothing in the harness depends on them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyId {
    /// In-process mutual exclusion (a single monitor inside one service
    /// instance). Simple, but offers no protection once more than one
    /// instance serves traffic, and serialises every request.
    #[serde(alias = "synchronized")]
    InProcessLock,

    /// Database row lock (`SELECT ... FOR UPDATE`). Consistent across
    /// instances; lock waits become the bottleneck and deadlocks are possible.
    #[serde(alias = "pessimistic")]
    RowLock,

    /// Optimistic versioning with bounded retries on version conflict.
    /// Cheap when contention is low, degrades into retry storms when it is high.
    #[serde(alias = "optimistic")]
    OptimisticLock,

    /// Distributed lock held in an external store. Works across instances and
    /// covers duplicate-purchase checks, but lock waits remain and the lock
    /// store is a single point of failure. Rejects with the lock-timeout
    /// marker when the lock cannot be acquired.
    #[serde(alias = "redisson")]
    DistributedLock,

    /// Requests are accepted immediately and processed later by a queue
    /// consumer. Absorbs spikes, but results are only eventually consistent,
    /// so verification needs a settling wait.
    #[serde(alias = "kafka")]
    QueuedAsync,
}

impl StrategyId {
    /// Every supported strategy, in the order operators usually test them
    pub const ALL: [StrategyId; 5] = [
        StrategyId::InProcessLock,
        StrategyId::RowLock,
        StrategyId::OptimisticLock,
        StrategyId::DistributedLock,
        StrategyId::QueuedAsync,
    ];

    /// Canonical identifier
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyId::InProcessLock => "in-process-lock",
            StrategyId::RowLock => "row-lock",
            StrategyId::OptimisticLock => "optimistic-lock",
            StrategyId::DistributedLock => "distributed-lock",
            StrategyId::QueuedAsync => "queued-async",
        }
    }

    /// Alternative identifier accepted on input
    pub fn alias(&self) -> &'static str {
        match self {
            StrategyId::InProcessLock => "synchronized",
            StrategyId::RowLock => "pessimistic",
            StrategyId::OptimisticLock => "optimistic",
            StrategyId::DistributedLock => "redisson",
            StrategyId::QueuedAsync => "kafka",
        }
    }

    /// Whether the backend acknowledges before the reservation is applied
    pub fn is_asynchronous(&self) -> bool {
        matches!(self, StrategyId::QueuedAsync)
    }

    /// Resolve a raw identifier once, at configuration time.
    ///
    /// An absent or blank identifier selects the default strategy. An
    /// unrecognised one selects `fallback` instead of failing the run.
    pub fn resolve(raw: Option<&str>, fallback: StrategyId) -> ResolvedStrategy {
        let requested = raw.map(str::trim).filter(|s| !s.is_empty());

        match requested {
            None => ResolvedStrategy {
                strategy: StrategyId::default(),
                requested: None,
                fell_back: false,
            },
            Some(name) => match name.parse::<StrategyId>() {
                Ok(strategy) => ResolvedStrategy {
                    strategy,
                    requested: Some(name.to_string()),
                    fell_back: false,
                },
                Err(_) => {
                    tracing::warn!(
                        requested = name,
                        fallback = fallback.as_str(),
                        "Unrecognised strategy identifier, using fallback strategy"
                    );
                    ResolvedStrategy {
                        strategy: fallback,
                        requested: Some(name.to_string()),
                        fell_back: true,
                    }
                }
            },
        }
    }
}

impl Default for StrategyId {
    fn default() -> Self {
        StrategyId::OptimisticLock
    }
}

impl fmt::Display for StrategyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        StrategyId::ALL
            .into_iter()
            .find(|id| {
                id.as_str().eq_ignore_ascii_case(needle) || id.alias().eq_ignore_ascii_case(needle)
            })
            .ok_or_else(|| format!("Invalid strategy: {}", s))
    }
}

/// Outcome of resolving the configured strategy identifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedStrategy {
    /// Strategy the run will exercise
    pub strategy: StrategyId,
    /// Identifier as supplied, if any
    pub requested: Option<String>,
    /// True when `requested` was not recognised and the fallback was used
    pub fell_back: bool,
}

/// Target reservation service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    /// Base URL of the reservation service
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Ticket whose inventory is exercised
    #[serde(default = "default_ticket_id")]
    pub ticket_id: u64,

    /// Raw strategy identifier; resolved once when the run is configured
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,

    /// Strategy used when `strategy` is not recognised
    #[serde(default = "default_fallback_strategy")]
    pub fallback_strategy: StrategyId,

    /// Body marker that refines a 400 into a lock-timeout rejection
    #[serde(default = "default_lock_timeout_marker")]
    pub lock_timeout_marker: String,
}

impl TargetConfig {
    /// Resolve the configured strategy identifier
    pub fn resolve_strategy(&self) -> ResolvedStrategy {
        StrategyId::resolve(self.strategy.as_deref(), self.fallback_strategy)
    }
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            ticket_id: default_ticket_id(),
            strategy: None,
            fallback_strategy: default_fallback_strategy(),
            lock_timeout_marker: default_lock_timeout_marker(),
        }
    }
}

impl Validatable for TargetConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_url(&self.base_url, "base_url", self.domain_name())?;
        validate_positive(self.ticket_id, "ticket_id", self.domain_name())?;
        validate_required_string(
            &self.lock_timeout_marker,
            "lock_timeout_marker",
            self.domain_name(),
        )?;
        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "target"
    }
}

fn default_base_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_ticket_id() -> u64 {
    1
}

fn default_fallback_strategy() -> StrategyId {
    StrategyId::RowLock
}

fn default_lock_timeout_marker() -> String {
    DEFAULT_LOCK_TIMEOUT_MARKER.to_string()
}
