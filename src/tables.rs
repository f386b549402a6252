/// Empirical cost constants.
///
/// Latencies in µs, bandwidths in GB/s. Rows are indexed by `Algorithm`,
/// columns by `Protocol`, in declaration order.
use crate::collective::{NUM_ALGORITHMS, NUM_FUNCTIONS, NUM_PROTOCOLS};

/// Number of hardware classes (NVLink, PCI, network).
pub const NUM_HW: usize = 3;

/// Fixed startup cost per (algorithm, protocol).
pub const BASE_LAT: [[f64; NUM_PROTOCOLS]; NUM_ALGORITHMS] = [
    /* Tree    */ [37.9, 37.9, 40.4],
    /* Ring    */ [20.5, 20.5, 27.9],
    /* CollNet */ [37.9, 37.9, 40.4],
];

/// Per-hop latency by hardware class.
/// Tree/Simple is the latency of a 256 kB chunk: base + 256k/12 GB/s
/// (plus another 256k/12 GB/s over the network).
pub const HW_LAT: [[[f64; NUM_PROTOCOLS]; NUM_ALGORITHMS]; NUM_HW] = [
    /* NVLink */
    [[1.2, 1.2, 3.8], [2.3, 2.3, 2.7], [1.2, 1.2, 3.8]],
    /* PCI */
    [[2.2, 2.2, 5.7], [1.3, 1.3, 1.9], [2.2, 2.2, 5.7]],
    /* Network */
    [[9.8, 9.8, 19.5], [2.0, 2.0, 4.5], [9.8, 9.8, 19.5]],
];

/// LL128 ring bandwidth ceiling per collective.
pub const LL128_MAX_BW: [f64; NUM_FUNCTIONS] = [113.0, 72.0, 110.0, 91.0, 100.0];

/// Tree bus bandwidth ceilings.
pub const TREE_MAX_BW_SINGLE_NODE: f64 = 90.0;
pub const TREE_MAX_BW_MULTI_NODE: f64 = 70.0;

// ---------------------------------------------------------------------------
// Thread thresholds (bytes of work per thread before parallelism grows)
// ---------------------------------------------------------------------------

pub const LL_THREAD_THRESHOLD: i64 = 8;
pub const LL128_THREAD_THRESHOLD: i64 = 16;
pub const SIMPLE_THREAD_THRESHOLD: i64 = 64;

pub const THREAD_THRESHOLDS: [i64; NUM_PROTOCOLS] =
    [LL_THREAD_THRESHOLD, LL128_THREAD_THRESHOLD, SIMPLE_THREAD_THRESHOLD];

// ---------------------------------------------------------------------------
// Correction curves
// ---------------------------------------------------------------------------

/// Buckets covered by the correction curves: powers of two from 64 B to 128 MB
/// of `bytes >> 6`, i.e. up to ~1 GB of payload. Larger sizes use factor 1.0.
pub const CORRECTION_BUCKETS: usize = 22;

/// Trees do not follow the model for medium sizes; a static factor per size
/// bucket works well enough.
pub const TREE_CORRECTION: [[f64; CORRECTION_BUCKETS]; NUM_PROTOCOLS] = [
    [1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 0.84, 0.49, 0.42, 0.60, 0.75, 0.87, 0.94, 0.94, 0.99, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0],
    [1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 0.84, 0.49, 0.42, 0.60, 0.75, 0.87, 0.94, 0.94, 0.99, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0],
    [1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 0.41, 0.27, 0.25, 0.39, 0.46, 0.72, 0.76, 0.87, 0.92, 0.97, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0],
];

pub const RING_CORRECTION: [[f64; CORRECTION_BUCKETS]; NUM_PROTOCOLS] = [
    [1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 0.25, 0.41, 0.55, 0.56, 0.78, 0.94, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0],
    [1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 0.25, 0.41, 0.55, 0.56, 0.78, 0.94, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0],
    [1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 0.04, 0.08, 0.09, 0.09, 0.11, 0.13, 0.25, 0.40, 0.59, 0.76, 0.86, 1.0, 1.0, 1.0, 1.0, 1.0],
];
