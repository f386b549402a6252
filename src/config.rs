/// User overrides for the cost model, resolved once before building.
///
/// The overrides mirror the knobs an operator sets through the environment:
///   COLLTUNE_ALGO              e.g. "Ring" or "^Tree,CollNet"
///   COLLTUNE_PROTO             e.g. "LL,Simple" or "^LL128"
///   COLLTUNE_NTHREADS          threads per block for LL/Simple
///   COLLTUNE_LL128_NTHREADS    threads per block for LL128
///   COLLTUNE_THREAD_THRESHOLDS "treeLL treeLL128 treeSimple ringLL ringLL128 ringSimple"
use serde::{Deserialize, Serialize};

use crate::collective::{NUM_PROTOCOLS, Protocol};

pub const ENV_ALGO: &str = "COLLTUNE_ALGO";
pub const ENV_PROTO: &str = "COLLTUNE_PROTO";
pub const ENV_NTHREADS: &str = "COLLTUNE_NTHREADS";
pub const ENV_LL128_NTHREADS: &str = "COLLTUNE_LL128_NTHREADS";
pub const ENV_THREAD_THRESHOLDS: &str = "COLLTUNE_THREAD_THRESHOLDS";

/// Value of an integer knob that was never set.
pub const UNSET: i32 = -2;

/// Number of algorithm rows the threshold string can override (tree, ring).
pub const THRESHOLD_ROWS: usize = 2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TuningConfig {
    /// Algorithm inclusion/exclusion list
    pub algo: Option<String>,
    /// Protocol inclusion/exclusion list
    pub proto: Option<String>,
    /// Requested threads per block for LL and Simple (≤ 0 means unset)
    pub nthreads: i32,
    /// Requested threads per block for LL128 (≤ 0 means unset)
    pub ll128_nthreads: i32,
    /// Six-integer thread threshold override
    pub thread_thresholds: Option<String>,
}

impl Default for TuningConfig {
    fn default() -> Self {
        TuningConfig {
            algo: None,
            proto: None,
            nthreads: UNSET,
            ll128_nthreads: UNSET,
            thread_thresholds: None,
        }
    }
}

impl TuningConfig {
    /// Read every knob from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read every knob through `lookup`. Integer knobs that do not parse
    /// keep their default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let d = TuningConfig::default();
        let int = |key: &str, def: i32| {
            lookup(key)
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(def)
        };
        TuningConfig {
            algo: lookup(ENV_ALGO),
            proto: lookup(ENV_PROTO),
            nthreads: int(ENV_NTHREADS, d.nthreads),
            ll128_nthreads: int(ENV_LL128_NTHREADS, d.ll128_nthreads),
            thread_thresholds: lookup(ENV_THREAD_THRESHOLDS),
        }
    }

    /// Parsed threshold override; unfilled slots hold `UNSET`.
    pub fn threshold_overrides(&self) -> [[i64; NUM_PROTOCOLS]; THRESHOLD_ROWS] {
        match &self.thread_thresholds {
            Some(s) => parse_thread_thresholds(s),
            None => [[UNSET as i64; NUM_PROTOCOLS]; THRESHOLD_ROWS],
        }
    }
}

// ---------------------------------------------------------------------------
// Parsers
// ---------------------------------------------------------------------------

/// Turn a comma-separated name list into an enable vector over `names`.
///
/// A leading `^` makes the list an exclusion list: everything starts enabled
/// and listed names are disabled. Otherwise everything starts disabled and
/// listed names are enabled. Matching is case-insensitive; unknown tokens
/// are ignored.
pub fn parse_list<const N: usize>(s: &str, names: &[&str; N]) -> [bool; N] {
    let (default, set, list) = match s.strip_prefix('^') {
        Some(rest) => (true, false, rest),
        None => (false, true, s),
    };
    let mut out = [default; N];
    for token in list.split(',').filter(|t| !t.is_empty()) {
        for (slot, name) in out.iter_mut().zip(names) {
            if token.eq_ignore_ascii_case(name) {
                *slot = set;
            }
        }
    }
    out
}

/// Scan up to six integers: tree {LL, LL128, Simple} then ring {LL, LL128, Simple}.
/// Each token contributes its leading integer; scanning stops at the first
/// token without one, or right after a token with trailing characters.
pub fn parse_thread_thresholds(s: &str) -> [[i64; NUM_PROTOCOLS]; THRESHOLD_ROWS] {
    let mut out = [[UNSET as i64; NUM_PROTOCOLS]; THRESHOLD_ROWS];
    let mut slots = out.iter_mut().flatten();
    for token in s.split_whitespace() {
        let Some((value, rest)) = leading_integer(token) else { break };
        let Some(slot) = slots.next() else { break };
        *slot = value;
        if !rest.is_empty() {
            break;
        }
    }
    out
}

/// Split `token` into an optionally signed decimal prefix and the remainder.
fn leading_integer(token: &str) -> Option<(i64, &str)> {
    let sign = usize::from(token.starts_with(['+', '-']));
    let digits = token[sign..].bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return None;
    }
    let (number, rest) = token.split_at(sign + digits);
    number.parse().ok().map(|v| (v, rest))
}

/// Protocol enable state before overrides are applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggle {
    Off,
    On,
    /// Decided per algorithm from link types and compute capability.
    Auto,
}

impl From<bool> for Toggle {
    fn from(on: bool) -> Self {
        if on { Toggle::On } else { Toggle::Off }
    }
}

/// Default protocol toggles: LL128 is only enabled where it has been validated.
pub fn default_protocol_toggles() -> [Toggle; NUM_PROTOCOLS] {
    let mut t = [Toggle::On; NUM_PROTOCOLS];
    t[Protocol::Ll128.index()] = Toggle::Auto;
    t
}
