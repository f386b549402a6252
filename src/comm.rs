/// Per-communicator cost tables.
///
/// Built once by `CostModel::build` and read-only afterwards, so any number
/// of threads may query a shared `&Communicator` without locking.
use serde::{Deserialize, Serialize};

use crate::collective::{Algorithm, CollFunc, NUM_ALGORITHMS, NUM_FUNCTIONS, NUM_PROTOCOLS, Protocol};
use crate::threads::DeviceLimits;

pub type CostTable = [[[f64; NUM_PROTOCOLS]; NUM_ALGORITHMS]; NUM_FUNCTIONS];
pub type ThreadTable<T> = [[T; NUM_PROTOCOLS]; NUM_ALGORITHMS];

/// Compute capabilities present in the communicator, as `major * 10 + minor`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompCapRange {
    pub min: i32,
    pub max: i32,
}

impl CompCapRange {
    pub fn new(min: i32, max: i32) -> Self {
        CompCapRange { min, max }
    }

    /// Every device has the same compute capability `cc`.
    pub fn uniform(cc: i32) -> Self {
        CompCapRange { min: cc, max: cc }
    }

    /// True when every device is exactly generation `cc`.
    pub fn is_only(&self, cc: i32) -> bool {
        self.min == cc && self.max == cc
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Communicator {
    /// This process' rank (only rank 0 dumps the cost table)
    pub rank: usize,
    pub n_ranks: usize,
    pub n_nodes: usize,
    /// Channels available to the ring, used as the starting launch width
    pub n_channels: usize,
    pub limits: DeviceLimits,
    /// Algorithm bandwidth in GB/s; 0 marks an unusable combination
    pub bandwidths: CostTable,
    /// Startup latency in µs
    pub latencies: CostTable,
    /// Threads-per-block ceiling
    pub max_threads: ThreadTable<i32>,
    /// Bytes of work per thread before more threads/channels are used
    pub thread_thresholds: ThreadTable<i64>,
}

impl Communicator {
    /// Empty tables: every combination starts out unusable.
    pub fn new(rank: usize, n_ranks: usize, n_nodes: usize) -> Self {
        Communicator {
            rank,
            n_ranks,
            n_nodes,
            n_channels: 1,
            limits: DeviceLimits::default(),
            bandwidths: [[[0.0; NUM_PROTOCOLS]; NUM_ALGORITHMS]; NUM_FUNCTIONS],
            latencies: [[[0.0; NUM_PROTOCOLS]; NUM_ALGORITHMS]; NUM_FUNCTIONS],
            max_threads: [[0; NUM_PROTOCOLS]; NUM_ALGORITHMS],
            thread_thresholds: [[0; NUM_PROTOCOLS]; NUM_ALGORITHMS],
        }
    }

    pub fn bandwidth(&self, coll: CollFunc, algo: Algorithm, proto: Protocol) -> f64 {
        self.bandwidths[coll.index()][algo.index()][proto.index()]
    }

    pub fn latency(&self, coll: CollFunc, algo: Algorithm, proto: Protocol) -> f64 {
        self.latencies[coll.index()][algo.index()][proto.index()]
    }

    pub fn max_threads(&self, algo: Algorithm, proto: Protocol) -> i32 {
        self.max_threads[algo.index()][proto.index()]
    }

    pub fn thread_threshold(&self, algo: Algorithm, proto: Protocol) -> i64 {
        self.thread_thresholds[algo.index()][proto.index()]
    }

    pub fn is_feasible(&self, coll: CollFunc, algo: Algorithm, proto: Protocol) -> bool {
        self.bandwidth(coll, algo, proto) != 0.0
    }
}
