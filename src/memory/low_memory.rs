use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, warn};

type MemoryProbe = Box<dyn Fn() -> Option<u64> + Send + Sync>;

/// Admission gate comparing available system memory against a floor.
///
/// Callers consult it before buffering more documents. It never blocks and
/// never fails; when memory cannot be measured the gate stays open.
pub struct MemoryGate {
    pub floor_bytes: u64,
    low: AtomicBool,
    probe: MemoryProbe,
}

impl MemoryGate {
    pub fn new(floor_mb: u64) -> Self {
        MemoryGate::with_probe(floor_mb, Box::new(available_memory))
    }

    pub fn with_probe(floor_mb: u64, probe: MemoryProbe) -> Self {
        MemoryGate {
            floor_bytes: floor_mb * 1024 * 1024,
            low: AtomicBool::new(false),
            probe,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.floor_bytes > 0
    }

    /// Measure now. Returns true when memory is low.
    pub fn check(&self) -> bool {
        if !self.is_enabled() {
            return false;
        }

        let low = match (self.probe)() {
            Some(available) => available < self.floor_bytes,
            None => false,
        };

        let was_low = self.low.swap(low, Ordering::AcqRel);
        if low && !was_low {
            warn!(floor_mb = self.floor_bytes / (1024 * 1024), "available memory below floor, refusing new documents");
        } else if !low && was_low {
            info!("available memory recovered, accepting documents again");
        }
        low
    }

    /// Result of the last `check`.
    pub fn is_low(&self) -> bool {
        self.low.load(Ordering::Acquire)
    }

    /// Hint the allocator to hand freed pages back to the system.
    pub fn release_memory(&self) {
        #[cfg(all(target_os = "linux", target_env = "gnu"))]
        // SAFETY: malloc_trim only walks allocator state.
        unsafe {
            libc::malloc_trim(0);
        }
    }
}

/// Bytes of memory available to new allocations, if the platform says.
pub fn available_memory() -> Option<u64> {
    #[cfg(target_os = "linux")]
    {
        if let Ok(meminfo) = std::fs::read_to_string("/proc/meminfo") {
            if let Some(kb) = parse_mem_available(&meminfo) {
                return Some(kb * 1024);
            }
        }

        // SAFETY: sysconf has no memory-safety preconditions.
        let (pages, page_size) = unsafe {
            (libc::sysconf(libc::_SC_AVPHYS_PAGES), libc::sysconf(libc::_SC_PAGESIZE))
        };
        if pages > 0 && page_size > 0 {
            return Some(pages as u64 * page_size as u64);
        }
    }

    None
}

/// `MemAvailable` in kB from a /proc/meminfo dump.
fn parse_mem_available(meminfo: &str) -> Option<u64> {
    meminfo
        .lines()
        .find(|line| line.starts_with("MemAvailable:"))
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|kb| kb.parse().ok())
}
