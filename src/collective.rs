/// Collective functions, algorithm families and wire protocols.
///
/// The declaration order of every enum is the index order of the cost
/// tables in `Communicator`, so variants must never be reordered.
use serde::{Deserialize, Serialize};

pub const NUM_FUNCTIONS: usize = 5;
pub const NUM_ALGORITHMS: usize = 3;
pub const NUM_PROTOCOLS: usize = 3;

// ---------------------------------------------------------------------------
// Collective functions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CollFunc {
    Broadcast,
    Reduce,
    AllGather,
    ReduceScatter,
    AllReduce,
}

impl CollFunc {
    pub const ALL: [CollFunc; NUM_FUNCTIONS] = [
        CollFunc::Broadcast,
        CollFunc::Reduce,
        CollFunc::AllGather,
        CollFunc::ReduceScatter,
        CollFunc::AllReduce,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            CollFunc::Broadcast     => "Broadcast",
            CollFunc::Reduce        => "Reduce",
            CollFunc::AllGather     => "AllGather",
            CollFunc::ReduceScatter => "ReduceScatter",
            CollFunc::AllReduce     => "AllReduce",
        }
    }

    /// Number of pipeline steps a ring needs to complete this collective.
    ///   AllReduce               → 2·(N-1)  (reduce-scatter + all-gather)
    ///   AllGather/ReduceScatter → N-1
    ///   Broadcast/Reduce        → N
    pub fn nsteps(self, n_ranks: usize) -> usize {
        match self {
            CollFunc::AllReduce => 2 * n_ranks.saturating_sub(1),
            CollFunc::AllGather | CollFunc::ReduceScatter => n_ranks.saturating_sub(1),
            CollFunc::Broadcast | CollFunc::Reduce => n_ranks,
        }
    }
}

impl std::fmt::Display for CollFunc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Algorithm families
// ---------------------------------------------------------------------------

/// Structural strategy used to realize a collective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Algorithm {
    /// Double binary tree: log-depth across nodes, chain within a node.
    Tree,
    /// Pipelined ring through every rank.
    Ring,
    /// In-network reduction offload (switch-side collectives).
    CollNet,
}

impl Algorithm {
    pub const ALL: [Algorithm; NUM_ALGORITHMS] =
        [Algorithm::Tree, Algorithm::Ring, Algorithm::CollNet];

    pub const NAMES: [&'static str; NUM_ALGORITHMS] = ["Tree", "Ring", "CollNet"];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        Self::NAMES[self.index()]
    }
}

impl std::fmt::Display for Algorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Protocols
// ---------------------------------------------------------------------------

/// Wire-level data transfer scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Protocol {
    /// Low-latency: 8-byte stores carrying a 4-byte flag, half the link bandwidth at best.
    Ll,
    /// Low-latency over 128-byte lines: 120 of every 128 bytes are payload.
    Ll128,
    /// Plain bulk copies with explicit synchronisation.
    Simple,
}

impl Protocol {
    pub const ALL: [Protocol; NUM_PROTOCOLS] = [Protocol::Ll, Protocol::Ll128, Protocol::Simple];

    pub const NAMES: [&'static str; NUM_PROTOCOLS] = ["LL", "LL128", "Simple"];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        Self::NAMES[self.index()]
    }
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
