/// Human-readable dump of a communicator's cost tables.
///
/// Layout (one column per algorithm/protocol pair):
///   Latency/AlgBw |    Tree/    LL |    Tree/ LL128 | ...
///    Max NThreads |            512 |            640 | ...
///        Broadcast |     0.0/   0.0 |     0.0/   0.0 | ...
use std::fmt::Write;

use crate::collective::{Algorithm, CollFunc, Protocol};
use crate::comm::Communicator;

/// Header, thread-ceiling row, then one row per collective.
pub fn cost_table_lines(comm: &Communicator) -> Vec<String> {
    let mut lines = Vec::with_capacity(2 + CollFunc::ALL.len());

    let mut line = String::from("Latency/AlgBw |");
    for a in Algorithm::ALL {
        for p in Protocol::ALL {
            let _ = write!(line, " {:>7}/{:>6} |", a.name(), p.name());
        }
    }
    lines.push(line);

    let mut line = String::from(" Max NThreads |");
    for a in Algorithm::ALL {
        for p in Protocol::ALL {
            let _ = write!(line, " {:>14} |", comm.max_threads(a, p));
        }
    }
    lines.push(line);

    for c in CollFunc::ALL {
        let mut line = format!("{:>13} |", c.name());
        for a in Algorithm::ALL {
            for p in Protocol::ALL {
                let _ = write!(line, "{:>8.1}/{:>6.1} |", comm.latency(c, a, p), comm.bandwidth(c, a, p));
            }
        }
        lines.push(line);
    }

    lines
}

/// One-line summary of the thread thresholds, grouped by algorithm.
pub fn threshold_line(comm: &Communicator) -> String {
    let groups: Vec<String> = Algorithm::ALL
        .iter()
        .map(|&a| {
            Protocol::ALL
                .iter()
                .map(|&p| comm.thread_threshold(a, p).to_string())
                .collect::<Vec<_>>()
                .join("/")
        })
        .collect();
    format!("threadThresholds {}", groups.join(" | "))
}
