use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use colltune::report::cost_table_lines;
use colltune::snapshot::{SNAPSHOT_PATH, TuningSnapshot, sweep, write_snapshot};
use colltune::{
    CollFunc, CommTopology, Communicator, CompCapRange, CostModel, DeviceLimits, TopoGraph, TopoGraphs, TuningConfig,
};

#[derive(Parser, Debug)]
#[command(name = "colltune")]
#[command(version, about = "Collective cost model: predicted latency/bandwidth and algorithm choice per message size")]
struct Cli {
    // =========================================================================
    // Topology
    // =========================================================================

    /// JSON topology description (overrides every inline topology flag)
    #[arg(long, help_heading = "Topology")]
    topo: Option<String>,

    /// Number of ranks in the communicator
    #[arg(long, default_value = "8", help_heading = "Topology")]
    ranks: usize,

    /// Number of nodes the ranks are spread over
    #[arg(long, default_value = "1", help_heading = "Topology")]
    nodes: usize,

    /// Rank of this process (rank 0 logs the cost table)
    #[arg(long, default_value = "0", help_heading = "Topology")]
    rank: usize,

    /// Channels per algorithm graph
    #[arg(long, default_value = "2", help_heading = "Topology")]
    channels: usize,

    /// Per-channel intra-node bandwidth in GB/s
    #[arg(long, default_value = "20.0", help_heading = "Topology")]
    speed_intra: f64,

    /// Per-channel inter-node bandwidth in GB/s (used when nodes > 1)
    #[arg(long, default_value = "12.0", help_heading = "Topology")]
    speed_inter: f64,

    /// Intra-node link type
    #[arg(long, value_enum, default_value = "nvlink", help_heading = "Topology")]
    link: LinkArg,

    /// Device family, sets warp size and thread ceilings
    #[arg(long, value_enum, default_value = "cuda", help_heading = "Topology")]
    device: DeviceArg,

    /// Compute capability of every device, e.g. 70 for sm_70
    #[arg(long, default_value = "70", help_heading = "Topology")]
    comp_cap: i32,

    // =========================================================================
    // Query
    // =========================================================================

    /// Collective to report choices for
    #[arg(long, value_enum, default_value = "all-reduce", help_heading = "Query")]
    coll: CollArg,

    /// Single message size in bytes (default: sweep 64 B .. 1 GiB)
    #[arg(long, help_heading = "Query")]
    size: Option<u64>,

    /// Write a snapshot for the viz binary
    #[arg(long, default_value = "false", help_heading = "Query")]
    snapshot: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LinkArg {
    Nvlink,
    Pci,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum DeviceArg {
    Cuda,
    Rocm,
}

impl From<DeviceArg> for DeviceLimits {
    fn from(d: DeviceArg) -> Self {
        match d {
            DeviceArg::Cuda => DeviceLimits::cuda(),
            DeviceArg::Rocm => DeviceLimits::rocm(),
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum CollArg {
    Broadcast,
    Reduce,
    AllGather,
    ReduceScatter,
    AllReduce,
}

impl From<CollArg> for CollFunc {
    fn from(c: CollArg) -> Self {
        match c {
            CollArg::Broadcast     => CollFunc::Broadcast,
            CollArg::Reduce        => CollFunc::Reduce,
            CollArg::AllGather     => CollFunc::AllGather,
            CollArg::ReduceScatter => CollFunc::ReduceScatter,
            CollArg::AllReduce     => CollFunc::AllReduce,
        }
    }
}

impl Cli {
    fn topology(&self) -> colltune::error::Result<CommTopology> {
        if let Some(path) = &self.topo {
            return CommTopology::from_json_file(path);
        }
        let mut graph = match self.link {
            LinkArg::Nvlink => TopoGraph::nvlink(self.channels, self.speed_intra),
            LinkArg::Pci => TopoGraph::pci(self.channels, self.speed_intra),
        };
        if self.nodes > 1 {
            graph = graph.with_network(self.speed_inter);
        }
        let topo = CommTopology {
            rank: self.rank,
            n_ranks: self.ranks,
            n_nodes: self.nodes,
            comp_cap: CompCapRange::uniform(self.comp_cap),
            graphs: TopoGraphs::uniform(graph),
        };
        topo.validate()?;
        Ok(topo)
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Cli::parse();
    let topo = args.topology()?;
    let coll = CollFunc::from(args.coll);

    let mut comm = Communicator::new(topo.rank, topo.n_ranks, topo.n_nodes);
    CostModel::new(TuningConfig::from_env(), args.device.into()).build(&mut comm, topo.comp_cap, &topo.graphs);

    println!(
        "Communicator: {} ranks on {} nodes, {} channels, compute capability {}-{}",
        comm.n_ranks, comm.n_nodes, comm.n_channels, topo.comp_cap.min, topo.comp_cap.max,
    );
    for line in cost_table_lines(&comm) {
        println!("{line}");
    }
    println!();

    let points = match args.size {
        Some(bytes) => vec![bytes],
        None => sweep(&comm, coll).into_iter().map(|p| p.bytes).collect(),
    };

    println!("{:>12} | {:>8} | {:>6} | {:>12} | {:>8} | {:>7}", "bytes", "algo", "proto", "time (us)", "channels", "threads");
    for bytes in points {
        match comm.select(coll, bytes) {
            Some(sel) => {
                let shape = comm.launch_shape(&sel, bytes);
                println!(
                    "{:>12} | {:>8} | {:>6} | {:>12.2} | {:>8} | {:>7}",
                    bytes, sel.algorithm, sel.protocol, sel.time_us, shape.n_channels, shape.n_threads,
                );
            }
            None => println!("{:>12} | no feasible algorithm/protocol for {}", bytes, coll),
        }
    }

    if args.snapshot {
        write_snapshot(SNAPSHOT_PATH, &TuningSnapshot::capture(&comm, coll))?;
        println!("\nSnapshot written to {SNAPSHOT_PATH}");
    }

    Ok(())
}
