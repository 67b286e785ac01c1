//! Lookup candidate ranking.
//!
//! Plain Kademlia queries the candidates closest to the target by XOR distance. With latency
//! consideration enabled, candidates are instead ranked by the estimated time a lookup through
//! them takes to converge: the round trip to the candidate itself, plus the steps still needed to
//! close the remaining distance, each costing a number of round trips at the average latency.
//!
//! ```text
//! cost(p) = rtt(p) + (BITS - cpl(p, target)) / avg_bits_improved_per_step
//!                    * avg_round_trip_per_step * mean_rtt
//! ```

use std::{sync::Arc, time::Duration};

use tracing::debug;

use crate::{
    config::Config,
    core::id::{PeerId, PeerInfo},
};

// Used when the configured coefficients can't produce meaningful costs.
const FALLBACK_BITS_IMPROVED_PER_STEP: f64 = 1.3327 + 4.321_928_094_887_363;
const FALLBACK_ROUND_TRIP_PER_STEP: f64 = 4.0;

/// A peer that may be queried, with its measured round trip time if there is one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub info: PeerInfo,
    pub latency: Option<Duration>,
}

impl Candidate {
    pub fn new(info: PeerInfo, latency: Option<Duration>) -> Self {
        Self { info, latency }
    }

    pub fn id(&self) -> PeerId {
        self.info.id
    }
}

/// Estimates the time to convergence of a lookup continued through a candidate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatencyCostModel {
    avg_bits_improved_per_step: f64,
    avg_round_trip_per_step: f64,
    // Stands in for the latency of candidates that were never measured.
    latency_tolerance: Duration,
}

impl LatencyCostModel {
    /// Creates a model, replacing coefficients that are not finite, as well as a non-positive
    /// bits-per-step or a negative round-trips-per-step, with the defaults.
    pub fn new(
        avg_bits_improved_per_step: f64,
        avg_round_trip_per_step: f64,
        latency_tolerance: Duration,
    ) -> Self {
        let avg_bits_improved_per_step =
            if avg_bits_improved_per_step.is_finite() && avg_bits_improved_per_step > 0.0 {
                avg_bits_improved_per_step
            } else {
                debug!(avg_bits_improved_per_step, "unusable coefficient, using the default");
                FALLBACK_BITS_IMPROVED_PER_STEP
            };

        let avg_round_trip_per_step =
            if avg_round_trip_per_step.is_finite() && avg_round_trip_per_step >= 0.0 {
                avg_round_trip_per_step
            } else {
                debug!(avg_round_trip_per_step, "unusable coefficient, using the default");
                FALLBACK_ROUND_TRIP_PER_STEP
            };

        Self {
            avg_bits_improved_per_step,
            avg_round_trip_per_step,
            latency_tolerance,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let rt = config.routing_table();

        Self::new(
            rt.avg_bits_improved_per_step(),
            rt.avg_round_trip_per_step(),
            rt.latency_tolerance(),
        )
    }

    /// The expected number of lookup steps left once a peer sharing `cpl` bits with the target
    /// is reached.
    pub fn expected_steps(&self, cpl: u32) -> f64 {
        f64::from(PeerId::BITS.saturating_sub(cpl)) / self.avg_bits_improved_per_step
    }

    /// The estimated cost, in seconds, of continuing the lookup through a peer sharing `cpl` bits
    /// with the target.
    pub fn cost(&self, cpl: u32, latency: Option<Duration>, mean_latency: Duration) -> f64 {
        let first_hop = latency.unwrap_or(self.latency_tolerance).as_secs_f64();

        first_hop
            + self.expected_steps(cpl) * self.avg_round_trip_per_step * mean_latency.as_secs_f64()
    }

    /// The mean of the measured latencies, or the latency tolerance if none were measured.
    ///
    /// The sum saturates at [`Duration::MAX`], so very large latencies (e.g. used to mark a peer
    /// unreachable) skew the mean down rather than overflow.
    pub fn mean_latency(&self, candidates: &[Candidate]) -> Duration {
        let (sum, count) = candidates
            .iter()
            .filter_map(|c| c.latency)
            .fold((Duration::ZERO, 0u32), |(sum, count), latency| {
                (sum.saturating_add(latency), count.saturating_add(1))
            });

        if count == 0 {
            return self.latency_tolerance;
        }

        sum / count
    }
}

/// Chooses which peers a lookup queries next, according to the configuration.
#[derive(Debug, Clone)]
pub struct CandidateSelector {
    config: Arc<Config>,
    model: LatencyCostModel,
}

impl CandidateSelector {
    pub fn new(config: Arc<Config>) -> Self {
        let model = LatencyCostModel::from_config(&config);

        Self { config, model }
    }

    pub fn model(&self) -> &LatencyCostModel {
        &self.model
    }

    /// The number of peers to query in parallel, at least 1.
    pub fn alpha(&self) -> usize {
        self.config.concurrency().max(1)
    }

    /// The number of closest peers that must respond for the lookup to end, at least 1.
    pub fn beta(&self) -> usize {
        self.config.resiliency().max(1)
    }

    /// Returns up to `count` of the candidates approved by the query filter, best first.
    pub fn nearest(
        &self,
        target: &PeerId,
        candidates: Vec<Candidate>,
        count: usize,
    ) -> Vec<Candidate> {
        let filter = self.config.query_peer_filter();
        let mut candidates: Vec<_> = candidates.into_iter().filter(|c| filter(&c.info)).collect();

        if self.config.routing_table().consider_latency() {
            let mean_latency = self.model.mean_latency(&candidates);
            let mut scored: Vec<_> = candidates
                .into_iter()
                .map(|c| {
                    let cpl = c.id().common_prefix_len(target);
                    (self.model.cost(cpl, c.latency, mean_latency), c)
                })
                .collect();

            // Ties are broken by distance to keep the order deterministic.
            scored.sort_by(|(cost_a, a), (cost_b, b)| {
                cost_a
                    .total_cmp(cost_b)
                    .then_with(|| a.id().distance(target).cmp(&b.id().distance(target)))
            });
            scored.truncate(count);

            return scored.into_iter().map(|(_, c)| c).collect();
        }

        candidates.sort_unstable_by_key(|c| c.id().distance(target));
        candidates.truncate(count);

        candidates
    }

    /// The candidates to query in the next round, [`alpha`](Self::alpha) of them at most.
    pub fn next_round(&self, target: &PeerId, candidates: Vec<Candidate>) -> Vec<Candidate> {
        self.nearest(target, candidates, self.alpha())
    }
}
