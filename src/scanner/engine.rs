//! Batch scan scheduler
//!
//! Ports are probed in consecutive batches of `concurrency`. All probes in a
//! batch run concurrently on the current task and the batch is a barrier: the
//! next batch starts only after every probe of the previous one resolved, so
//! no more than `concurrency` sockets are ever in flight. Each probe carries
//! its own timeout, so one hung peer delays its batch by at most that window.

use futures::future::join_all;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Instant;

use crate::network::protocol::ServiceDatabase;
use crate::network::{PortResult, PortState, ProbeMode, Prober};
use crate::ports::dedup_preserving_order;
use crate::scanner::{create_batches, duration_ms, ScanBatch, ScanStats};

/// Bounded-concurrency connect sweep
pub struct ScanScheduler<P: Prober> {
    prober: Arc<P>,
    concurrency: usize,
    service_db: ServiceDatabase,
}

impl<P: Prober> ScanScheduler<P> {
    /// A concurrency of zero is treated as one.
    pub fn new(prober: Arc<P>, concurrency: usize) -> Self {
        Self {
            prober,
            concurrency: concurrency.max(1),
            service_db: ServiceDatabase::new(),
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Open ports only, in input order.
    pub async fn scan(&self, target: IpAddr, ports: &[u16]) -> Vec<PortResult> {
        self.sweep(target, ports)
            .await
            .0
            .into_iter()
            .filter(PortResult::is_open)
            .collect()
    }

    /// Every deduplicated port with its state, in input order, plus counters.
    pub async fn sweep(&self, target: IpAddr, ports: &[u16]) -> (Vec<PortResult>, ScanStats) {
        let start_time = Instant::now();
        let ports = dedup_preserving_order(ports.to_vec());
        let batches = create_batches(&ports, target, self.concurrency);

        let mut stats = ScanStats {
            ports_scanned: ports.len(),
            batches: batches.len(),
            ..ScanStats::default()
        };
        let mut results = Vec::with_capacity(ports.len());

        for batch in batches {
            let batch_results = self.scan_batch(&batch).await;
            let open = batch_results.iter().filter(|r| r.is_open()).count();
            log::debug!(
                "batch {} done: {}/{} open",
                batch.batch_id,
                open,
                batch.size()
            );
            results.extend(batch_results);
        }

        stats.open = results.iter().filter(|r| r.is_open()).count();
        stats.closed = results.len() - stats.open;
        stats.duration_ms = duration_ms(start_time.elapsed());

        (results, stats)
    }

    /// Probe one batch concurrently. `join_all` yields results in input order
    /// regardless of completion order.
    async fn scan_batch(&self, batch: &ScanBatch) -> Vec<PortResult> {
        let probes = batch.ports.iter().map(|&port| self.scan_port(batch.target, port));
        join_all(probes).await
    }

    async fn scan_port(&self, target: IpAddr, port: u16) -> PortResult {
        let outcome = self.prober.probe(target, port, ProbeMode::ConnectOnly).await;

        if outcome.reachable {
            log::info!("OPEN: {}:{}", target, port);
            PortResult::new(port, PortState::Open)
                .with_service(self.service_db.service_name(port).to_string())
        } else {
            PortResult::new(port, PortState::Closed)
        }
    }
}
