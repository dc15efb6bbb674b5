//! In-memory reservation service for tests
//!
//! Enabled with the `testing` feature. Each [`SimulationMode`] reproduces
//! one way a real backend behaves under contention.

use crate::error::ServiceError;
use crate::router::RequestTemplate;
use crate::service::{ReservationResponse, TicketService};
use crate::snapshot::TicketSnapshot;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Duration;
use ticketcheck_config::DEFAULT_LOCK_TIMEOUT_MARKER;

pub const SOLD_OUT_BODY: &str = "재고가 부족합니다";
pub const DUPLICATE_BODY: &str = "이미 예매한 사용자입니다";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimulationMode {
    /// Atomic check-and-decrement; one reservation per user
    Correct,
    /// Never refuses: reservations keep growing once stock is gone, while
    /// stock stops at zero
    Overselling,
    /// Every `every`-th accepted reservation is recorded without moving stock
    SkewedStock { every: u64 },
    /// Every `every`-th request loses the lock race and is rejected with the
    /// lock-timeout marker
    LockContended { every: u64 },
}

#[derive(Debug)]
struct Inventory {
    stock: i64,
    reservation_count: i64,
    reserved_users: HashSet<String>,
    users_seen: Vec<String>,
    requests: u64,
    accepted: u64,
}

#[derive(Debug)]
pub struct SimulatedTicketService {
    mode: SimulationMode,
    latency: Duration,
    inventory: Mutex<Inventory>,
    failing_snapshot_reads: AtomicU32,
    remaining_snapshot_reads: AtomicU64,
}

impl SimulatedTicketService {
    pub fn new(stock: i64, mode: SimulationMode) -> Self {
        Self {
            mode,
            latency: Duration::ZERO,
            inventory: Mutex::new(Inventory {
                stock,
                reservation_count: 0,
                reserved_users: HashSet::new(),
                users_seen: Vec::new(),
                requests: 0,
                accepted: 0,
            }),
            failing_snapshot_reads: AtomicU32::new(0),
            remaining_snapshot_reads: AtomicU64::new(u64::MAX),
        }
    }

    /// Delay applied to every request
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Make the next `count` snapshot reads fail as unreachable
    pub fn fail_snapshot_reads(&self, count: u32) {
        self.failing_snapshot_reads.store(count, Ordering::SeqCst);
    }

    /// Let `count` more snapshot reads succeed, then fail every later one
    pub fn limit_snapshot_reads(&self, count: u64) {
        self.remaining_snapshot_reads.store(count, Ordering::SeqCst);
    }

    pub fn state(&self) -> TicketSnapshot {
        let inventory = self.inventory.lock();
        TicketSnapshot::new(inventory.stock, inventory.reservation_count)
    }

    /// User ids of every reservation request, in arrival order
    pub fn users_seen(&self) -> Vec<String> {
        self.inventory.lock().users_seen.clone()
    }

    async fn delay(&self) {
        if self.latency.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(self.latency).await;
        }
    }

    fn apply(&self, inventory: &mut Inventory, user_id: &str) -> ReservationResponse {
        inventory.requests += 1;

        if let SimulationMode::LockContended { every } = self.mode {
            if every > 0 && inventory.requests % every == 0 {
                return ReservationResponse::new(400, DEFAULT_LOCK_TIMEOUT_MARKER);
            }
        }

        if inventory.reserved_users.contains(user_id) {
            return ReservationResponse::new(400, DUPLICATE_BODY);
        }

        let in_stock = inventory.stock > 0;
        if !in_stock && self.mode != SimulationMode::Overselling {
            return ReservationResponse::new(400, SOLD_OUT_BODY);
        }

        inventory.accepted += 1;
        inventory.reservation_count += 1;
        inventory.reserved_users.insert(user_id.to_string());

        let skip_stock = match self.mode {
            SimulationMode::SkewedStock { every } => every > 0 && inventory.accepted % every == 0,
            _ => false,
        };
        if in_stock && !skip_stock {
            inventory.stock -= 1;
        }

        ReservationResponse::new(200, "")
    }
}

#[async_trait]
impl TicketService for SimulatedTicketService {
    async fn fetch_snapshot(&self, _ticket_id: u64) -> Result<TicketSnapshot, ServiceError> {
        self.delay().await;

        let failing = self
            .failing_snapshot_reads
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        let exhausted = self
            .remaining_snapshot_reads
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_err();
        if failing.is_ok() || exhausted {
            return Err(ServiceError::UnreachableService(
                "simulated connection refused".to_string(),
            ));
        }

        Ok(self.state())
    }

    async fn reserve(
        &self,
        _ticket_id: u64,
        _template: &RequestTemplate,
        user_id: &str,
    ) -> Result<ReservationResponse, ServiceError> {
        self.delay().await;

        let mut inventory = self.inventory.lock();
        inventory.users_seen.push(user_id.to_string());
        Ok(self.apply(&mut inventory, user_id))
    }
}
