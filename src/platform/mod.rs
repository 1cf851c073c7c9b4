//! Platform Abstraction Layer for the scheduling advisor
//!
//! ```text
//! src/platform/
//! +-- mod.rs      <- This file (module definitions, privilege check)
//! +-- traits.rs   <- Platform-agnostic collaborator traits
//! +-- host.rs     <- sysinfo host probe (+ /proc and sysfs on Linux)
//! ```

pub mod host;
pub mod traits;

pub use host::HostProbe;
pub use traits::{
    ComputeUnitSource, PlatformError, PlatformResult, ProcessEntry, ProcessSource, RawSample,
    UnitCategory,
};

/// Whether the current process runs with root privileges.
///
/// Without them, foreign processes' IO counters are unreadable and are
/// reported as zero.
pub fn is_elevated() -> bool {
    #[cfg(unix)]
    {
        // SAFETY: geteuid has no preconditions and cannot fail.
        unsafe { libc::geteuid() == 0 }
    }

    #[cfg(not(unix))]
    {
        false
    }
}
