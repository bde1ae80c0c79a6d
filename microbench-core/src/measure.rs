//! Timing Primitives
//!
//! Monotonic clock used by every generated timing routine, plus CPU pinning
//! for worker processes.

use std::time::Duration;

/// Monotonic high-resolution instant
#[derive(Debug, Clone, Copy)]
pub struct Instant {
    instant: std::time::Instant,
}

impl Instant {
    /// Capture current instant
    #[inline(always)]
    pub fn now() -> Self {
        Self {
            instant: std::time::Instant::now(),
        }
    }

    /// Compute elapsed time since this instant
    #[inline(always)]
    pub fn elapsed(&self) -> Duration {
        self.instant.elapsed()
    }

    /// Elapsed time since this instant in seconds
    #[inline(always)]
    pub fn elapsed_secs(&self) -> f64 {
        self.instant.elapsed().as_secs_f64()
    }
}

/// Set CPU affinity to pin the current thread to a specific core
///
/// Keeps a worker on one core so repeated values are not skewed by migrations.
#[cfg(target_os = "linux")]
pub fn pin_to_cpu(cpu: usize) -> Result<(), std::io::Error> {
    use std::mem::MaybeUninit;

    unsafe {
        let mut set = MaybeUninit::<libc::cpu_set_t>::zeroed();
        let set_ref = set.assume_init_mut();

        libc::CPU_ZERO(set_ref);
        libc::CPU_SET(cpu, set_ref);

        let result = libc::sched_setaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), set_ref);

        if result == 0 {
            Ok(())
        } else {
            Err(std::io::Error::last_os_error())
        }
    }
}

/// CPU pinning is only available on Linux; elsewhere this is a no-op.
#[cfg(not(target_os = "linux"))]
pub fn pin_to_cpu(_cpu: usize) -> Result<(), std::io::Error> {
    Ok(())
}
