/// Topology facts consumed by the cost model.
///
/// Topology discovery happens elsewhere; this module only describes its
/// results: one graph per algorithm family, each carrying channel count,
/// link speeds and link types.
///
/// Bandwidth reference (per channel, as measured by discovery):
///   NVLink 2.0:  ~20 GB/s per link
///   PCIe Gen3 x16:  ~12 GB/s
///   EDR/HDR InfiniBand:  ~12 / ~24 GB/s per NIC
use serde::{Deserialize, Serialize};

use crate::collective::Algorithm;
use crate::comm::CompCapRange;
use crate::error::{Result, TuneError};

/// Bandwidth of a PCIe Gen3 x16 link in GB/s. Ring topologies whose
/// aggregate intra-node speed stays at or under this get fewer Simple threads.
pub const PCI_WIDTH: f64 = 12.0;

// ---------------------------------------------------------------------------
// Link types
// ---------------------------------------------------------------------------

/// Physical link category, ordered from closest to farthest.
/// The order matters: "at most PCI" comparisons rely on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkType {
    Local,
    NvLink,
    Pci,
    System,
    Network,
}

impl std::fmt::Display for LinkType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LinkType::Local   => write!(f, "LOC"),
            LinkType::NvLink  => write!(f, "NVL"),
            LinkType::Pci     => write!(f, "PCI"),
            LinkType::System  => write!(f, "SYS"),
            LinkType::Network => write!(f, "NET"),
        }
    }
}

/// Hardware class used to index the hop-latency table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwClass {
    NvLink,
    Pci,
    Network,
}

impl HwClass {
    pub fn index(self) -> usize {
        self as usize
    }

    /// Intra-node class: anything that is not NVLink is treated as a bus.
    pub fn intra(link: LinkType) -> Self {
        if link == LinkType::NvLink { HwClass::NvLink } else { HwClass::Pci }
    }

    /// Class of the slowest hop an algorithm crosses.
    pub fn bottleneck(link: LinkType, n_nodes: usize) -> Self {
        if n_nodes == 1 { Self::intra(link) } else { HwClass::Network }
    }
}

// ---------------------------------------------------------------------------
// Graphs
// ---------------------------------------------------------------------------

/// Communication graph discovered for one algorithm family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopoGraph {
    /// Number of parallel channels the graph provides
    pub n_channels: usize,
    /// Per-channel intra-node bandwidth in GB/s
    pub speed_intra: f64,
    /// Per-channel inter-node bandwidth in GB/s
    pub speed_inter: f64,
    /// Slowest link type used inside a node
    pub type_intra: LinkType,
    /// Slowest link type used between nodes
    pub type_inter: LinkType,
    /// Whether every channel follows the same path
    #[serde(default = "default_same_channels")]
    pub same_channels: bool,
}

fn default_same_channels() -> bool {
    true
}

impl TopoGraph {
    /// Single-node graph over NVLink.
    pub fn nvlink(n_channels: usize, speed: f64) -> Self {
        TopoGraph {
            n_channels,
            speed_intra: speed,
            speed_inter: speed,
            type_intra: LinkType::NvLink,
            type_inter: LinkType::Pci,
            same_channels: true,
        }
    }

    /// Single-node graph over PCIe switches.
    pub fn pci(n_channels: usize, speed: f64) -> Self {
        TopoGraph {
            n_channels,
            speed_intra: speed,
            speed_inter: speed,
            type_intra: LinkType::Pci,
            type_inter: LinkType::Pci,
            same_channels: true,
        }
    }

    /// Replace the inter-node side with a network hop of `speed` GB/s.
    pub fn with_network(mut self, speed: f64) -> Self {
        self.speed_inter = speed;
        self.type_inter = LinkType::Network;
        self
    }

    pub fn with_same_channels(mut self, same: bool) -> Self {
        self.same_channels = same;
        self
    }

    /// Ring aggregate intra-node bandwidth; compared to `PCI_WIDTH` when
    /// choosing the default Simple thread count.
    pub fn intra_bandwidth(&self) -> f64 {
        self.speed_intra * self.n_channels as f64
    }
}

/// One graph per algorithm family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopoGraphs {
    pub tree: TopoGraph,
    pub ring: TopoGraph,
    pub coll_net: TopoGraph,
}

impl TopoGraphs {
    /// Same graph for every family, the common case on a single node.
    pub fn uniform(graph: TopoGraph) -> Self {
        TopoGraphs { tree: graph.clone(), ring: graph.clone(), coll_net: graph }
    }

    pub fn get(&self, algorithm: Algorithm) -> &TopoGraph {
        match algorithm {
            Algorithm::Tree    => &self.tree,
            Algorithm::Ring    => &self.ring,
            Algorithm::CollNet => &self.coll_net,
        }
    }
}

// ---------------------------------------------------------------------------
// Serialized topology description
// ---------------------------------------------------------------------------

/// Everything the cost model needs about a communicator, as loaded from a
/// JSON description written by a discovery tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommTopology {
    #[serde(default)]
    pub rank: usize,
    pub n_ranks: usize,
    pub n_nodes: usize,
    pub comp_cap: CompCapRange,
    pub graphs: TopoGraphs,
}

impl CommTopology {
    pub fn from_json_str(path: &str, data: &str) -> Result<Self> {
        let topo: CommTopology = serde_json::from_str(data)
            .map_err(|source| TuneError::Json { path: path.to_string(), source })?;
        topo.validate()?;
        Ok(topo)
    }

    pub fn from_json_file(path: &str) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .map_err(|source| TuneError::Io { path: path.to_string(), source })?;
        Self::from_json_str(path, &data)
    }

    /// Reject descriptions the cost model cannot interpret.
    pub fn validate(&self) -> Result<()> {
        if self.n_ranks == 0 || self.n_nodes == 0 {
            return Err(TuneError::InvalidTopology {
                reason: format!("{} ranks on {} nodes", self.n_ranks, self.n_nodes),
            });
        }
        if self.n_nodes > self.n_ranks {
            return Err(TuneError::InvalidTopology {
                reason: format!("more nodes ({}) than ranks ({})", self.n_nodes, self.n_ranks),
            });
        }
        if self.rank >= self.n_ranks {
            return Err(TuneError::InvalidTopology {
                reason: format!("rank {} out of range for {} ranks", self.rank, self.n_ranks),
            });
        }
        for algorithm in Algorithm::ALL {
            let graph = self.graphs.get(algorithm);
            for (side, speed) in [("intra", graph.speed_intra), ("inter", graph.speed_inter)] {
                if !speed.is_finite() || speed < 0.0 {
                    return Err(TuneError::InvalidTopology {
                        reason: format!("{algorithm} graph has {side}-node speed {speed} GB/s"),
                    });
                }
            }
        }
        Ok(())
    }
}
