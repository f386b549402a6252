/// Thread-block size limits and validation of user thread-count requests.
///
/// A request is a number of threads per block. It is accepted only when it
/// is a positive multiple of the warp size inside `[min, max]`; anything else
/// is repaired to a usable value and reported with a warning.
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

/// Hardware limits for the device family the kernels run on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceLimits {
    /// Threads executing in lockstep
    pub warp_size: i32,
    /// Largest block the collective kernels are compiled for
    pub max_nthreads: i32,
    /// Largest block for the LL128 protocol
    pub ll128_max_nthreads: i32,
}

impl DeviceLimits {
    /// NVIDIA GPUs: 32-thread warps.
    pub fn cuda() -> Self {
        DeviceLimits { warp_size: 32, max_nthreads: 512, ll128_max_nthreads: 640 }
    }

    /// AMD GPUs: 64-thread wavefronts.
    pub fn rocm() -> Self {
        DeviceLimits { warp_size: 64, max_nthreads: 256, ll128_max_nthreads: 256 }
    }

    /// Lower bound for LL/Simple requests.
    pub fn min_nthreads(&self) -> i32 {
        4 * self.warp_size
    }

    /// Lower bound for LL128 requests.
    pub fn ll128_min_nthreads(&self) -> i32 {
        self.ll128_max_nthreads / 4
    }

    /// Check a request without side effects.
    /// Non-positive requests mean "unset" and yield `default`.
    pub fn check_nthreads(
        &self,
        name: &str,
        requested: i32,
        min: i32,
        max: i32,
        default: i32,
    ) -> Result<i32, NThreadsError> {
        if requested <= 0 {
            return Ok(default);
        }
        let name = name.to_string();
        if requested % self.warp_size != 0 {
            Err(NThreadsError::NotWarpMultiple { name, value: requested, warp_size: self.warp_size, max })
        } else if requested > max {
            Err(NThreadsError::AboveMax { name, value: requested, max })
        } else if requested < min {
            Err(NThreadsError::BelowMin { name, value: requested, min })
        } else {
            Ok(requested)
        }
    }

    /// Resolve a request to a usable thread count. Never fails: rejected
    /// requests are logged and replaced by their fallback.
    pub fn resolve_nthreads(&self, name: &str, requested: i32, min: i32, max: i32, default: i32) -> i32 {
        match self.check_nthreads(name, requested, min, max, default) {
            Ok(n) => n,
            Err(err) => {
                warn!(target: "colltune::threads", "{err}");
                err.fallback()
            }
        }
    }
}

impl Default for DeviceLimits {
    fn default() -> Self {
        Self::cuda()
    }
}

/// A rejected thread-count request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NThreadsError {
    #[error("Invalid {name} {value} (must be a multiple of {warp_size})")]
    NotWarpMultiple { name: String, value: i32, warp_size: i32, max: i32 },

    #[error("Invalid {name} {value} (maximum {max}).")]
    AboveMax { name: String, value: i32, max: i32 },

    #[error("Invalid {name} {value} (minimum {min}).")]
    BelowMin { name: String, value: i32, min: i32 },
}

impl NThreadsError {
    /// Value used in place of the rejected request.
    pub fn fallback(&self) -> i32 {
        match self {
            NThreadsError::NotWarpMultiple { max, .. } => *max,
            NThreadsError::AboveMax { max, .. } => *max,
            NThreadsError::BelowMin { min, .. } => *min,
        }
    }
}
