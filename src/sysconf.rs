//! System constants obtained through `sysconf(3)`.

use once_cell::sync::Lazy;

/// Get system clock ticks per second (usually 100, but can vary).
fn get_clk_tck() -> f64 {
    // SAFETY: sysconf is safe to call with _SC_CLK_TCK
    // Returns -1 on error, 0 if undefined - both are handled by the > 0 check
    let tck = unsafe { libc::sysconf(libc::_SC_CLK_TCK) };
    if tck > 0 {
        return tck as f64;
    }
    // Fallback to common default for error cases
    100.0
}

fn get_page_size() -> u64 {
    // SAFETY: sysconf is safe to call with _SC_PAGESIZE
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if size > 0 {
        return size as u64;
    }
    4096
}

/// System clock ticks per second (for CPU time calculation).
pub static CLK_TCK: Lazy<f64> = Lazy::new(get_clk_tck);

/// Memory page size in bytes.
pub static PAGE_SIZE: Lazy<u64> = Lazy::new(get_page_size);

/// Number of online processors as reported by the OS, `None` when the
/// query is unsupported or fails.
pub fn online_cpus() -> Option<usize> {
    // SAFETY: sysconf is safe to call with _SC_NPROCESSORS_ONLN
    let n = unsafe { libc::sysconf(libc::_SC_NPROCESSORS_ONLN) };
    if n > 0 {
        Some(n as usize)
    } else {
        None
    }
}

/// Converts a tick counter to seconds.
pub fn ticks_to_secs(ticks: u64) -> f64 {
    ticks as f64 / *CLK_TCK
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constants_are_positive() {
        assert!(*CLK_TCK > 0.0);
        assert!(*PAGE_SIZE > 0);
        assert!(PAGE_SIZE.is_power_of_two());
    }

    #[test]
    fn test_ticks_to_secs() {
        assert_eq!(ticks_to_secs(0), 0.0);
        let secs = ticks_to_secs(*CLK_TCK as u64 * 3);
        assert!((secs - 3.0).abs() < 1e-9);
    }
}
