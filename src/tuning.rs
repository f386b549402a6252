/// Cost model builder.
///
/// Turns topology graphs into per-communicator latency/bandwidth tables,
/// thread ceilings and thread thresholds. Runs once per communicator,
/// single-threaded, after topology discovery has finished.
///
/// For every (collective, algorithm, protocol):
///   busBw   = channels · speed          (intra speed on ≤2 nodes or CollNet, inter otherwise)
///   busBw  ← empirical derating by (algorithm, protocol)
///   algBw   = busBw · ratio             (ring: N/nsteps, others: 0.5)
///   latency = base + hop term           (depends on algorithm and hardware class)
use tracing::info;

use crate::collective::{Algorithm, CollFunc, NUM_ALGORITHMS, Protocol};
use crate::comm::{CompCapRange, Communicator};
use crate::config::{ENV_LL128_NTHREADS, ENV_NTHREADS, Toggle, TuningConfig, default_protocol_toggles, parse_list};
use crate::report::{cost_table_lines, threshold_line};
use crate::tables::{
    BASE_LAT, HW_LAT, LL128_MAX_BW, THREAD_THRESHOLDS, TREE_MAX_BW_MULTI_NODE, TREE_MAX_BW_SINGLE_NODE,
};
use crate::threads::DeviceLimits;
use crate::topology::{HwClass, LinkType, PCI_WIDTH, TopoGraphs};

/// The only compute capability LL128 is enabled on by default (Volta).
pub const LL128_VALIDATED_COMP_CAP: i32 = 70;

/// Rank that dumps the cost table.
const REPORTING_RANK: usize = 0;

/// Resolved build parameters. Holds no per-communicator state, so one
/// `CostModel` can build any number of communicators.
#[derive(Debug, Clone, Default)]
pub struct CostModel {
    pub config: TuningConfig,
    pub limits: DeviceLimits,
}

impl CostModel {
    pub fn new(config: TuningConfig, limits: DeviceLimits) -> Self {
        CostModel { config, limits }
    }

    /// Configuration taken from the process environment, CUDA limits.
    pub fn from_env() -> Self {
        Self::new(TuningConfig::from_env(), DeviceLimits::cuda())
    }

    /// Populate every table of `comm`. Single-rank communicators only get
    /// thread ceilings: nothing is ever sent, so nothing else is modeled.
    pub fn build(&self, comm: &mut Communicator, comp_cap: CompCapRange, graphs: &TopoGraphs) {
        comm.limits = self.limits;
        comm.n_channels = graphs.ring.n_channels.max(1);
        self.set_max_threads(comm, graphs);

        if comm.n_ranks <= 1 {
            return;
        }

        self.estimate(comm, graphs);
        self.apply_enables(comm, comp_cap, graphs);

        if comm.rank == REPORTING_RANK {
            for line in cost_table_lines(comm) {
                info!(target: "colltune::tuning", "{line}");
            }
        }

        self.set_thread_thresholds(comm);
        info!(target: "colltune::init", "{}", threshold_line(comm));
    }

    // -----------------------------------------------------------------------
    // Thread ceilings
    // -----------------------------------------------------------------------

    fn set_max_threads(&self, comm: &mut Communicator, graphs: &TopoGraphs) {
        let l = &self.limits;
        let name = ENV_NTHREADS;
        let requested = self.config.nthreads;

        let simple_default = if graphs.ring.intra_bandwidth() <= PCI_WIDTH { 256 } else { l.max_nthreads };
        let ring_simple = l.resolve_nthreads(name, requested, l.min_nthreads(), l.max_nthreads, simple_default);
        let other_simple = l.resolve_nthreads(name, requested, l.min_nthreads(), l.max_nthreads, l.max_nthreads);
        let ll = l.resolve_nthreads(name, requested, l.min_nthreads(), l.max_nthreads, l.max_nthreads);
        let ll128 = l.resolve_nthreads(
            ENV_LL128_NTHREADS,
            self.config.ll128_nthreads,
            l.ll128_min_nthreads(),
            l.ll128_max_nthreads,
            l.ll128_max_nthreads,
        );

        for a in Algorithm::ALL {
            let row = &mut comm.max_threads[a.index()];
            row[Protocol::Simple.index()] = if a == Algorithm::Ring { ring_simple } else { other_simple };
            row[Protocol::Ll.index()] = ll;
            row[Protocol::Ll128.index()] = ll128;
        }
    }

    // -----------------------------------------------------------------------
    // Latency / bandwidth estimation
    // -----------------------------------------------------------------------

    fn estimate(&self, comm: &mut Communicator, graphs: &TopoGraphs) {
        let n_ranks = comm.n_ranks;
        let n_nodes = comm.n_nodes.max(1);

        let mut intra_hw = [HwClass::Pci; NUM_ALGORITHMS];
        let mut hw = [HwClass::Pci; NUM_ALGORITHMS];
        for a in Algorithm::ALL {
            intra_hw[a.index()] = HwClass::intra(graphs.get(a).type_intra);
            hw[a.index()] = HwClass::bottleneck(graphs.get(a).type_intra, n_nodes);
        }

        for coll in CollFunc::ALL {
            let nsteps = coll.nsteps(n_ranks);

            for a in Algorithm::ALL {
                // Only AllReduce has tree and CollNet implementations.
                if coll != CollFunc::AllReduce && a != Algorithm::Ring {
                    continue;
                }
                let graph = graphs.get(a);

                for p in Protocol::ALL {
                    let speed = if n_nodes <= 2 || a == Algorithm::CollNet {
                        graph.speed_intra
                    } else {
                        graph.speed_inter
                    };
                    let bus_bw = derate(coll, a, p, graph.n_channels as f64 * speed, n_nodes);

                    let ratio = if a == Algorithm::Ring { n_ranks as f64 / nsteps as f64 } else { 0.5 };
                    comm.bandwidths[coll.index()][a.index()][p.index()] = bus_bw * ratio;

                    let hop = match a {
                        Algorithm::Ring => {
                            let mut lat = HW_LAT[hw[a.index()].index()][a.index()][p.index()];
                            let rooted = matches!(coll, CollFunc::Broadcast | CollFunc::Reduce);
                            if rooted && graphs.ring.same_channels {
                                lat
                            } else {
                                if rooted && p == Protocol::Simple {
                                    // Approximates the chunk latency until chunks are modeled.
                                    lat = HW_LAT[hw[a.index()].index()][Algorithm::Tree.index()][p.index()];
                                }
                                nsteps as f64 * lat
                            }
                        }
                        Algorithm::Tree => {
                            let intra = HW_LAT[intra_hw[a.index()].index()][a.index()][p.index()];
                            let inter = HW_LAT[HwClass::Network.index()][a.index()][p.index()];
                            let local_ranks = (n_ranks / n_nodes) as f64 - 1.0;
                            2.0 * (local_ranks * intra + log2i(n_nodes as u64) as f64 * inter)
                        }
                        Algorithm::CollNet => {
                            let intra = HW_LAT[intra_hw[a.index()].index()][a.index()][p.index()];
                            let inter = HW_LAT[HwClass::Network.index()][a.index()][p.index()];
                            let local_ranks = (n_ranks / n_nodes) as f64 - 1.0;
                            2.0 * local_ranks * intra + inter
                        }
                    };
                    comm.latencies[coll.index()][a.index()][p.index()] = BASE_LAT[a.index()][p.index()] + hop;
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Algorithm / protocol enables
    // -----------------------------------------------------------------------

    /// Zero the bandwidth of every disabled combination.
    fn apply_enables(&self, comm: &mut Communicator, comp_cap: CompCapRange, graphs: &TopoGraphs) {
        let mut proto_enable = default_protocol_toggles();
        if let Some(s) = &self.config.proto {
            proto_enable = parse_list(s, &Protocol::NAMES).map(Toggle::from);
        }
        let mut algo_enable = [true; NUM_ALGORITHMS];
        if let Some(s) = &self.config.algo {
            algo_enable = parse_list(s, &Algorithm::NAMES);
        }

        for a in Algorithm::ALL {
            let graph = graphs.get(a);
            for p in Protocol::ALL {
                let enabled = match proto_enable[p.index()] {
                    Toggle::On => true,
                    Toggle::Off => false,
                    // Untested combinations risk silent data corruption.
                    Toggle::Auto => {
                        graph.type_inter <= LinkType::Pci
                            && graph.type_intra == LinkType::NvLink
                            && comp_cap.is_only(LL128_VALIDATED_COMP_CAP)
                    }
                };
                if enabled && algo_enable[a.index()] {
                    continue;
                }
                for coll in CollFunc::ALL {
                    comm.bandwidths[coll.index()][a.index()][p.index()] = 0.0;
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Thread thresholds
    // -----------------------------------------------------------------------

    fn set_thread_thresholds(&self, comm: &mut Communicator) {
        for row in comm.thread_thresholds.iter_mut() {
            *row = THREAD_THRESHOLDS;
        }
        // Per-rank chunks shrink as the ring grows.
        comm.thread_thresholds[Algorithm::Ring.index()][Protocol::Ll.index()] *= comm.n_ranks as i64;

        let overrides = self.config.threshold_overrides();
        for (a, row) in overrides.iter().enumerate() {
            for (p, &t) in row.iter().enumerate() {
                if t >= 0 {
                    comm.thread_thresholds[a][p] = t;
                }
            }
        }
    }
}

/// Bus bandwidth after the empirical refinements for (algorithm, protocol).
fn derate(coll: CollFunc, a: Algorithm, p: Protocol, bus_bw: f64, n_nodes: usize) -> f64 {
    match a {
        Algorithm::Ring => match p {
            Protocol::Ll => bus_bw / 5.0,
            Protocol::Ll128 => (bus_bw * 120.0 / 128.0).min(LL128_MAX_BW[coll.index()]),
            Protocol::Simple => bus_bw,
        },
        Algorithm::Tree => {
            let cap = if n_nodes > 1 { TREE_MAX_BW_MULTI_NODE } else { TREE_MAX_BW_SINGLE_NODE };
            let bw = (bus_bw * 0.27).min(cap);
            match p {
                Protocol::Ll => bw / 2.3,
                Protocol::Ll128 => bw * 7.0 / 9.0,
                Protocol::Simple => bw,
            }
        }
        Algorithm::CollNet => {
            let bw = bus_bw * 0.9;
            match p {
                // GPU Direct RDMA reads are disabled on both sides.
                Protocol::Ll => bw / 6.0,
                Protocol::Ll128 => 0.0,
                Protocol::Simple => bw,
            }
        }
    }
}

/// Floor of log2, with `log2i(0) == 0`.
pub fn log2i(n: u64) -> usize {
    if n == 0 { 0 } else { n.ilog2() as usize }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::TopoGraph;
    use approx::assert_relative_eq;

    fn nvlink_node() -> TopoGraphs {
        TopoGraphs::uniform(TopoGraph::nvlink(2, 20.0))
    }

    fn built(model: &CostModel, n_ranks: usize, n_nodes: usize, cc: i32, graphs: &TopoGraphs) -> Communicator {
        let mut comm = Communicator::new(0, n_ranks, n_nodes);
        model.build(&mut comm, CompCapRange::uniform(cc), graphs);
        comm
    }

    #[test]
    fn log2i_floors() {
        assert_eq!(log2i(0), 0);
        assert_eq!(log2i(1), 0);
        assert_eq!(log2i(2), 1);
        assert_eq!(log2i(3), 1);
        assert_eq!(log2i(1 << 14), 14);
    }

    #[test]
    fn single_rank_only_sets_thread_ceilings() {
        let comm = built(&CostModel::default(), 1, 1, 70, &nvlink_node());
        let fresh = Communicator::new(0, 1, 1);
        assert_eq!(comm.bandwidths, fresh.bandwidths);
        assert_eq!(comm.latencies, fresh.latencies);
        assert_eq!(comm.thread_thresholds, fresh.thread_thresholds);
        assert_eq!(comm.max_threads(Algorithm::Ring, Protocol::Simple), 512);
        assert_eq!(comm.max_threads(Algorithm::Tree, Protocol::Ll128), 640);
    }

    #[test]
    fn ring_allreduce_simple_on_nvlink() {
        let comm = built(&CostModel::default(), 8, 1, 80, &nvlink_node());
        let bw = comm.bandwidth(CollFunc::AllReduce, Algorithm::Ring, Protocol::Simple);
        let lat = comm.latency(CollFunc::AllReduce, Algorithm::Ring, Protocol::Simple);
        assert_relative_eq!(bw, 40.0 * 8.0 / 14.0, epsilon = 1e-9);
        assert_relative_eq!(lat, 27.9 + 14.0 * 2.7, epsilon = 1e-9);

        let ll = comm.bandwidth(CollFunc::AllReduce, Algorithm::Ring, Protocol::Ll);
        assert_relative_eq!(ll, 8.0 * 8.0 / 14.0, epsilon = 1e-9);
    }

    #[test]
    fn tree_and_collnet_allreduce() {
        let comm = built(&CostModel::default(), 8, 1, 80, &nvlink_node());
        let tree = comm.bandwidth(CollFunc::AllReduce, Algorithm::Tree, Protocol::Simple);
        assert_relative_eq!(tree, 40.0 * 0.27 * 0.5, epsilon = 1e-9);
        let tree_ll = comm.bandwidth(CollFunc::AllReduce, Algorithm::Tree, Protocol::Ll);
        assert_relative_eq!(tree_ll, 40.0 * 0.27 / 2.3 * 0.5, epsilon = 1e-9);
        let tree_lat = comm.latency(CollFunc::AllReduce, Algorithm::Tree, Protocol::Simple);
        assert_relative_eq!(tree_lat, 40.4 + 2.0 * (7.0 * 3.8 + 0.0 * 19.5), epsilon = 1e-9);

        let cn = comm.bandwidth(CollFunc::AllReduce, Algorithm::CollNet, Protocol::Simple);
        assert_relative_eq!(cn, 40.0 * 0.9 * 0.5, epsilon = 1e-9);
        let cn_lat = comm.latency(CollFunc::AllReduce, Algorithm::CollNet, Protocol::Ll);
        assert_relative_eq!(cn_lat, 37.9 + 2.0 * 7.0 * 1.2 + 9.8, epsilon = 1e-9);
        assert_eq!(comm.bandwidth(CollFunc::AllReduce, Algorithm::CollNet, Protocol::Ll128), 0.0);
    }

    #[test]
    fn only_allreduce_gets_tree_and_collnet() {
        let comm = built(&CostModel::default(), 8, 1, 70, &nvlink_node());
        for coll in [CollFunc::Broadcast, CollFunc::Reduce, CollFunc::AllGather, CollFunc::ReduceScatter] {
            for p in Protocol::ALL {
                assert_eq!(comm.bandwidth(coll, Algorithm::Tree, p), 0.0);
                assert_eq!(comm.bandwidth(coll, Algorithm::CollNet, p), 0.0);
                assert!(comm.bandwidth(coll, Algorithm::Ring, p) > 0.0);
            }
        }
    }

    #[test]
    fn rooted_ring_latency_depends_on_channel_uniformity() {
        let same = built(&CostModel::default(), 4, 1, 80, &nvlink_node());
        assert_relative_eq!(
            same.latency(CollFunc::Broadcast, Algorithm::Ring, Protocol::Simple),
            27.9 + 2.7,
            epsilon = 1e-9
        );

        let mut graphs = nvlink_node();
        graphs.ring = graphs.ring.with_same_channels(false);
        let mixed = built(&CostModel::default(), 4, 1, 80, &graphs);
        assert_relative_eq!(
            mixed.latency(CollFunc::Broadcast, Algorithm::Ring, Protocol::Simple),
            27.9 + 4.0 * 3.8,
            epsilon = 1e-9
        );
        assert_relative_eq!(
            mixed.latency(CollFunc::Reduce, Algorithm::Ring, Protocol::Ll),
            20.5 + 4.0 * 2.3,
            epsilon = 1e-9
        );
    }

    #[test]
    fn multi_node_uses_network_hops_and_inter_speed() {
        let graphs = TopoGraphs::uniform(TopoGraph::nvlink(4, 20.0).with_network(12.0));
        let comm = built(&CostModel::default(), 32, 4, 80, &graphs);

        let ring = comm.bandwidth(CollFunc::AllGather, Algorithm::Ring, Protocol::Simple);
        assert_relative_eq!(ring, 48.0 * 32.0 / 31.0, epsilon = 1e-9);
        let ring_lat = comm.latency(CollFunc::AllGather, Algorithm::Ring, Protocol::Simple);
        assert_relative_eq!(ring_lat, 27.9 + 31.0 * 4.5, epsilon = 1e-9);

        let tree = comm.bandwidth(CollFunc::AllReduce, Algorithm::Tree, Protocol::Simple);
        assert_relative_eq!(tree, 48.0 * 0.27 * 0.5, epsilon = 1e-9);
        let tree_lat = comm.latency(CollFunc::AllReduce, Algorithm::Tree, Protocol::Simple);
        assert_relative_eq!(tree_lat, 40.4 + 2.0 * (7.0 * 3.8 + 2.0 * 19.5), epsilon = 1e-9);

        // CollNet always uses the intra-node speed.
        let cn = comm.bandwidth(CollFunc::AllReduce, Algorithm::CollNet, Protocol::Simple);
        assert_relative_eq!(cn, 80.0 * 0.9 * 0.5, epsilon = 1e-9);
    }

    #[test]
    fn tree_bandwidth_is_capped() {
        let graphs = TopoGraphs::uniform(TopoGraph::nvlink(12, 40.0));
        let comm = built(&CostModel::default(), 8, 1, 80, &graphs);
        let tree = comm.bandwidth(CollFunc::AllReduce, Algorithm::Tree, Protocol::Simple);
        assert_relative_eq!(tree, 90.0 * 0.5, epsilon = 1e-9);
    }

    #[test]
    fn ll128_auto_needs_volta_and_nvlink() {
        let volta = built(&CostModel::default(), 8, 1, 70, &nvlink_node());
        let ll128 = volta.bandwidth(CollFunc::AllReduce, Algorithm::Ring, Protocol::Ll128);
        assert_relative_eq!(ll128, 40.0 * 120.0 / 128.0 * 8.0 / 14.0, epsilon = 1e-9);

        for cc in [60, 75, 80, 90] {
            let comm = built(&CostModel::default(), 8, 1, cc, &nvlink_node());
            for c in CollFunc::ALL {
                for a in Algorithm::ALL {
                    assert_eq!(comm.bandwidth(c, a, Protocol::Ll128), 0.0);
                }
            }
        }

        let mut mixed = Communicator::new(0, 8, 1);
        CostModel::default().build(&mut mixed, CompCapRange::new(70, 80), &nvlink_node());
        assert_eq!(mixed.bandwidth(CollFunc::AllReduce, Algorithm::Ring, Protocol::Ll128), 0.0);

        let pci = built(&CostModel::default(), 8, 1, 70, &TopoGraphs::uniform(TopoGraph::pci(2, 12.0)));
        assert_eq!(pci.bandwidth(CollFunc::AllReduce, Algorithm::Ring, Protocol::Ll128), 0.0);
    }

    #[test]
    fn ll128_bandwidth_capped_per_collective() {
        let graphs = TopoGraphs::uniform(TopoGraph::nvlink(12, 20.0));
        let comm = built(&CostModel::default(), 2, 1, 70, &graphs);
        // Reduce: 240·120/128 = 225 > 72; ratio 2/2.
        let reduce = comm.bandwidth(CollFunc::Reduce, Algorithm::Ring, Protocol::Ll128);
        assert_relative_eq!(reduce, 72.0, epsilon = 1e-9);
    }

    #[test]
    fn protocol_and_algorithm_overrides() {
        let config = TuningConfig {
            proto: Some("ll128,simple".into()),
            algo: Some("^tree".into()),
            ..Default::default()
        };
        let model = CostModel::new(config, DeviceLimits::cuda());
        let comm = built(&model, 8, 1, 80, &nvlink_node());

        // Explicit LL128 bypasses the generation check.
        assert!(comm.bandwidth(CollFunc::AllReduce, Algorithm::Ring, Protocol::Ll128) > 0.0);
        assert_eq!(comm.bandwidth(CollFunc::AllReduce, Algorithm::Ring, Protocol::Ll), 0.0);
        for p in Protocol::ALL {
            assert_eq!(comm.bandwidth(CollFunc::AllReduce, Algorithm::Tree, p), 0.0);
        }
        assert!(comm.bandwidth(CollFunc::AllReduce, Algorithm::CollNet, Protocol::Simple) > 0.0);
        // Latencies survive; only bandwidth marks infeasibility.
        assert!(comm.latency(CollFunc::AllReduce, Algorithm::Tree, Protocol::Simple) > 0.0);
    }

    #[test]
    fn simple_threads_drop_on_slow_rings() {
        let slow = built(&CostModel::default(), 4, 1, 80, &TopoGraphs::uniform(TopoGraph::pci(1, 12.0)));
        assert_eq!(slow.max_threads(Algorithm::Ring, Protocol::Simple), 256);
        assert_eq!(slow.max_threads(Algorithm::Tree, Protocol::Simple), 512);
        assert_eq!(slow.max_threads(Algorithm::CollNet, Protocol::Ll), 512);

        let fast = built(&CostModel::default(), 4, 1, 80, &nvlink_node());
        assert_eq!(fast.max_threads(Algorithm::Ring, Protocol::Simple), 512);
    }

    #[test]
    fn thread_overrides_are_resolved() {
        let config = TuningConfig { nthreads: 200, ll128_nthreads: 64, ..Default::default() };
        let comm = built(&CostModel::new(config, DeviceLimits::cuda()), 4, 1, 80, &nvlink_node());
        // 200 is not a warp multiple: falls back to the maximum.
        assert_eq!(comm.max_threads(Algorithm::Ring, Protocol::Simple), 512);
        assert_eq!(comm.max_threads(Algorithm::Tree, Protocol::Ll), 512);
        // 64 is below the LL128 minimum of 160.
        assert_eq!(comm.max_threads(Algorithm::Ring, Protocol::Ll128), 160);

        let config = TuningConfig { nthreads: 256, ..Default::default() };
        let comm = built(&CostModel::new(config, DeviceLimits::cuda()), 4, 1, 80, &nvlink_node());
        for a in Algorithm::ALL {
            assert_eq!(comm.max_threads(a, Protocol::Simple), 256);
            assert_eq!(comm.max_threads(a, Protocol::Ll), 256);
        }
    }

    #[test]
    fn default_thread_thresholds() {
        let comm = built(&CostModel::default(), 8, 1, 80, &nvlink_node());
        assert_eq!(comm.thread_thresholds, [[8, 16, 64], [64, 16, 64], [8, 16, 64]]);
    }

    #[test]
    fn thread_threshold_overrides() {
        let config = TuningConfig {
            thread_thresholds: Some("1 -1 3 4 oops 6".into()),
            ..Default::default()
        };
        let comm = built(&CostModel::new(config, DeviceLimits::cuda()), 8, 1, 80, &nvlink_node());
        assert_eq!(comm.thread_thresholds[Algorithm::Tree.index()], [1, 16, 3]);
        assert_eq!(comm.thread_thresholds[Algorithm::Ring.index()], [4, 16, 64]);
        // CollNet is never overridden.
        assert_eq!(comm.thread_thresholds[Algorithm::CollNet.index()], [8, 16, 64]);
    }

    #[test]
    fn rocm_limits_flow_into_ceilings() {
        let model = CostModel::new(TuningConfig::default(), DeviceLimits::rocm());
        let comm = built(&model, 4, 1, 90, &nvlink_node());
        assert_eq!(comm.limits.warp_size, 64);
        assert_eq!(comm.max_threads(Algorithm::Ring, Protocol::Simple), 256);
        assert_eq!(comm.max_threads(Algorithm::Ring, Protocol::Ll128), 256);
    }
}
