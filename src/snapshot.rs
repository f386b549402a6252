/// Cost-table snapshots for the TUI viewer.
///
/// The CLI writes a JSON snapshot of a built communicator plus a sweep of
/// the best choice per message size. The viz binary reads it back.
/// Writes are atomic (write to .tmp then rename) to avoid torn reads.
use serde::{Deserialize, Serialize};

use crate::collective::CollFunc;
use crate::comm::Communicator;
use crate::error::{Result, TuneError};
use crate::select::{LaunchShape, Selection};

pub const SNAPSHOT_PATH: &str = "/tmp/colltune_table.json";

/// Smallest and largest swept sizes, as powers of two (64 B .. 1 GiB).
pub const SWEEP_MIN_LOG2: u32 = 6;
pub const SWEEP_MAX_LOG2: u32 = 30;

/// Best choice for one message size.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SweepPoint {
    pub bytes: u64,
    /// `None` when no combination is feasible
    pub selection: Option<Selection>,
    pub launch: Option<LaunchShape>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct TuningSnapshot {
    pub comm: Communicator,
    /// Collective the sweep was computed for
    pub coll: CollFunc,
    pub sweep: Vec<SweepPoint>,
    /// Unix timestamp in ms when this snapshot was written
    pub timestamp_ms: u64,
}

impl TuningSnapshot {
    pub fn capture(comm: &Communicator, coll: CollFunc) -> Self {
        TuningSnapshot {
            comm: comm.clone(),
            coll,
            sweep: sweep(comm, coll),
            timestamp_ms: now_ms(),
        }
    }
}

/// Best choice for every power of two between 64 B and 1 GiB.
pub fn sweep(comm: &Communicator, coll: CollFunc) -> Vec<SweepPoint> {
    (SWEEP_MIN_LOG2..=SWEEP_MAX_LOG2)
        .map(|log2| {
            let bytes = 1u64 << log2;
            let selection = comm.select(coll, bytes);
            let launch = selection.as_ref().map(|s| comm.launch_shape(s, bytes));
            SweepPoint { bytes, selection, launch }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// I/O helpers
// ---------------------------------------------------------------------------

/// Atomically write `snapshot` to `path` via a .tmp sibling + rename.
pub fn write_snapshot(path: &str, snapshot: &TuningSnapshot) -> Result<()> {
    let json = serde_json::to_string(snapshot)?;
    let tmp = format!("{}.tmp", path);
    std::fs::write(&tmp, &json).map_err(|source| TuneError::Io { path: tmp.clone(), source })?;
    std::fs::rename(&tmp, path).map_err(|source| TuneError::Io { path: path.to_string(), source })
}

/// Read the latest snapshot. Returns None if the file doesn't exist or
/// can't be parsed (e.g. the CLI has not run yet).
pub fn read_snapshot(path: &str) -> Option<TuningSnapshot> {
    let data = std::fs::read_to_string(path).ok()?;
    serde_json::from_str(&data).ok()
}

/// Returns current Unix time in milliseconds.
pub fn now_ms() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::CompCapRange;
    use crate::topology::{TopoGraph, TopoGraphs};
    use crate::tuning::CostModel;

    fn built() -> Communicator {
        let mut comm = Communicator::new(0, 4, 1);
        CostModel::default().build(&mut comm, CompCapRange::uniform(80), &TopoGraphs::uniform(TopoGraph::nvlink(2, 20.0)));
        comm
    }

    #[test]
    fn sweep_covers_every_power_of_two() {
        let points = sweep(&built(), CollFunc::AllReduce);
        assert_eq!(points.len(), 25);
        assert_eq!(points.first().unwrap().bytes, 64);
        assert_eq!(points.last().unwrap().bytes, 1 << 30);
        assert!(points.iter().all(|p| p.selection.is_some() && p.launch.is_some()));
    }

    #[test]
    fn write_then_read() {
        let path = std::env::temp_dir().join(format!("colltune_snapshot_{}.json", std::process::id()));
        let path = path.to_str().unwrap();
        let snap = TuningSnapshot::capture(&built(), CollFunc::AllGather);
        write_snapshot(path, &snap).unwrap();
        let back = read_snapshot(path).unwrap();
        assert_eq!(back.coll, CollFunc::AllGather);
        assert_eq!(back.comm.max_threads, snap.comm.max_threads);
        assert_eq!(back.sweep.len(), snap.sweep.len());
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn missing_snapshot_reads_as_none() {
        assert!(read_snapshot("/nonexistent/colltune.json").is_none());
    }
}
