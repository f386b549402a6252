/// Dispatcher-side selection: pick the fastest feasible (algorithm, protocol)
/// for a call, then shrink the launch until every thread has enough work.
use serde::{Deserialize, Serialize};

use crate::collective::{Algorithm, CollFunc, Protocol};
use crate::comm::Communicator;

/// Threads are only halved while they remain a multiple of this.
const THREAD_HALVING_GRANULARITY: i32 = 128;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    pub algorithm: Algorithm,
    pub protocol: Protocol,
    /// Predicted completion time in µs
    pub time_us: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchShape {
    pub n_channels: usize,
    pub n_threads: i32,
}

impl Communicator {
    /// Fastest feasible combination; ties go to the earlier algorithm, then
    /// the earlier protocol. `None` when nothing is usable (e.g. one rank).
    pub fn select(&self, coll: CollFunc, n_bytes: u64) -> Option<Selection> {
        let mut best: Option<Selection> = None;
        for algorithm in Algorithm::ALL {
            for protocol in Protocol::ALL {
                let Some(time_us) = self.algo_time(coll, algorithm, protocol, n_bytes).time_us() else {
                    continue;
                };
                if best.is_none_or(|b| time_us < b.time_us) {
                    best = Some(Selection { algorithm, protocol, time_us });
                }
            }
        }
        best
    }

    /// Channels and threads for a launch of `n_bytes` with `sel`.
    ///
    /// Starts from every ring channel and the protocol's thread ceiling, then
    /// while `bytes < channels · threads · threshold` drops a channel (not for
    /// CollNet), or failing that halves the threads.
    pub fn launch_shape(&self, sel: &Selection, n_bytes: u64) -> LaunchShape {
        let mut nc = self.n_channels.max(1);
        let mut nt = self.max_threads(sel.algorithm, sel.protocol);
        let threshold = self.thread_threshold(sel.algorithm, sel.protocol);

        while (n_bytes as i128) < nc as i128 * nt as i128 * threshold as i128 {
            if sel.algorithm != Algorithm::CollNet && nc >= 2 {
                nc -= 1;
            } else if nt % THREAD_HALVING_GRANULARITY == 0 {
                nt /= 2;
            } else {
                break;
            }
        }
        // Extra warp for synchronisation.
        if sel.protocol == Protocol::Simple {
            nt += self.limits.warp_size;
        }
        LaunchShape { n_channels: nc, n_threads: nt }
    }
}
