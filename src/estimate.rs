/// Algorithm time estimation.
///
/// time_µs = latency_µs + bytes / (1000 · bw_GB/s · correction(bytes))
///
/// Unit note: 1 GB/s = 10⁹ bytes/s = 10³ bytes/µs
use serde::{Deserialize, Serialize};

use crate::collective::{Algorithm, CollFunc, Protocol};
use crate::comm::Communicator;
use crate::tables::{CORRECTION_BUCKETS, RING_CORRECTION, TREE_CORRECTION};
use crate::tuning::log2i;

/// Outcome of an estimate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum AlgoTime {
    /// Predicted completion time in µs
    Feasible(f64),
    /// Disabled or unsupported: exclude it from selection
    Infeasible,
}

impl AlgoTime {
    pub fn time_us(self) -> Option<f64> {
        match self {
            AlgoTime::Feasible(t) => Some(t),
            AlgoTime::Infeasible => None,
        }
    }

    pub fn is_feasible(self) -> bool {
        matches!(self, AlgoTime::Feasible(_))
    }

    /// Legacy encoding: a negative time means "not usable".
    pub fn as_sentinel(self) -> f64 {
        self.time_us().unwrap_or(-1.0)
    }
}

/// Size bucket of the correction curves: `log2(bytes >> 6)`.
pub fn size_bucket(n_bytes: u64) -> usize {
    log2i(n_bytes >> 6)
}

/// Bandwidth derating for a message of `n_bytes`. Only tree and ring are
/// corrected; sizes past the last bucket get the full modeled bandwidth.
pub fn correction_factor(algo: Algorithm, proto: Protocol, n_bytes: u64) -> f64 {
    let bucket = size_bucket(n_bytes);
    if bucket >= CORRECTION_BUCKETS {
        return 1.0;
    }
    match algo {
        Algorithm::Tree => TREE_CORRECTION[proto.index()][bucket],
        Algorithm::Ring => RING_CORRECTION[proto.index()][bucket],
        Algorithm::CollNet => 1.0,
    }
}

impl Communicator {
    /// Predicted time of `coll` over `n_bytes` with the given algorithm and
    /// protocol. Reads the tables only, so it is safe to call concurrently.
    pub fn algo_time(&self, coll: CollFunc, algo: Algorithm, proto: Protocol, n_bytes: u64) -> AlgoTime {
        let bw = self.bandwidth(coll, algo, proto);
        if bw == 0.0 {
            return AlgoTime::Infeasible;
        }
        let bw = bw * correction_factor(algo, proto, n_bytes);
        AlgoTime::Feasible(self.latency(coll, algo, proto) + n_bytes as f64 / (1000.0 * bw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::CompCapRange;
    use crate::topology::{TopoGraph, TopoGraphs};
    use crate::tuning::CostModel;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    fn eight_rank_nvlink() -> Communicator {
        let mut comm = Communicator::new(0, 8, 1);
        let graphs = TopoGraphs::uniform(TopoGraph::nvlink(2, 20.0));
        CostModel::default().build(&mut comm, CompCapRange::uniform(70), &graphs);
        comm
    }

    #[test]
    fn buckets() {
        assert_eq!(size_bucket(0), 0);
        assert_eq!(size_bucket(64), 0);
        assert_eq!(size_bucket(128), 1);
        assert_eq!(size_bucket(1 << 20), 14);
        assert_eq!(size_bucket(1 << 30), 24);
    }

    #[test]
    fn correction_lookup() {
        assert_relative_eq!(correction_factor(Algorithm::Ring, Protocol::Simple, 1 << 20), 0.59);
        assert_relative_eq!(correction_factor(Algorithm::Tree, Protocol::Simple, 1 << 14), 0.25);
        assert_relative_eq!(correction_factor(Algorithm::CollNet, Protocol::Simple, 1 << 14), 1.0);
        assert_relative_eq!(correction_factor(Algorithm::Ring, Protocol::Simple, 1 << 34), 1.0);
    }

    #[test]
    fn one_mib_ring_allreduce_simple() {
        let comm = eight_rank_nvlink();
        let size = 1u64 << 20;
        let bw = 40.0 * 8.0 / 14.0 * 0.59;
        let expected = 27.9 + 14.0 * 2.7 + size as f64 / (1000.0 * bw);
        let got = comm.algo_time(CollFunc::AllReduce, Algorithm::Ring, Protocol::Simple, size);
        assert_relative_eq!(got.time_us().unwrap(), expected, epsilon = 1e-9);
    }

    #[test]
    fn infeasible_is_tagged_and_sentinel_negative() {
        let comm = eight_rank_nvlink();
        let t = comm.algo_time(CollFunc::Broadcast, Algorithm::Tree, Protocol::Simple, 4096);
        assert_eq!(t, AlgoTime::Infeasible);
        assert_eq!(t.as_sentinel(), -1.0);
        assert!(!t.is_feasible());
    }

    proptest! {
        /// A zeroed entry is never usable, whatever the size.
        #[test]
        fn zero_bandwidth_always_infeasible(size in any::<u64>(), c in 0usize..5, a in 0usize..3, p in 0usize..3) {
            let mut comm = eight_rank_nvlink();
            comm.bandwidths[c][a][p] = 0.0;
            let t = comm.algo_time(CollFunc::ALL[c], Algorithm::ALL[a], Protocol::ALL[p], size);
            prop_assert_eq!(t, AlgoTime::Infeasible);
        }

        /// Past the correction curves, doubling the size never lowers the time.
        #[test]
        fn large_sizes_are_monotonic(shift in 28u32..40, c in 0usize..5, a in 0usize..3, p in 0usize..3) {
            let comm = eight_rank_nvlink();
            let (coll, algo, proto) = (CollFunc::ALL[c], Algorithm::ALL[a], Protocol::ALL[p]);
            let small = comm.algo_time(coll, algo, proto, 1u64 << shift);
            let large = comm.algo_time(coll, algo, proto, 1u64 << (shift + 1));
            match (small, large) {
                (AlgoTime::Feasible(s), AlgoTime::Feasible(l)) => prop_assert!(l >= s),
                (AlgoTime::Infeasible, AlgoTime::Infeasible) => {}
                _ => prop_assert!(false, "feasibility changed with size"),
            }
        }
    }
}
