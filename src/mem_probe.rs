//! Advisory memory probe, used by the dispatcher's admission check and the
//! solver's `mem_delta_mib` observability field (§4.6, §9).
//!
//! Grounded on `sysinfo`'s use in the broader example pack for RSS/available-
//! memory sampling. The probe is advisory only: a failed or unavailable read
//! never blocks a request, it only gets logged.

use std::sync::Mutex;

use sysinfo::{Pid, System};

static SYSTEM: Mutex<Option<System>> = Mutex::new(None);

fn with_system<F, T>(f: F) -> Option<T>
where
    F: FnOnce(&mut System) -> T,
{
    let mut guard = SYSTEM.lock().ok()?;
    if guard.is_none() {
        *guard = Some(System::new_all());
    }
    let system = guard.as_mut()?;
    system.refresh_memory();
    Some(f(system))
}

/// System-wide free memory, in MiB. Returns `0.0` if the probe is
/// unavailable on this platform, never an error (§9: "the memory check
/// never blocks admission").
pub fn free_mib() -> f64 {
    with_system(|s| s.available_memory() as f64 / (1024.0 * 1024.0)).unwrap_or(0.0)
}

/// Resident set size of the current process, in MiB. Used to compute
/// `mem_delta_mib` before/after a solver run. Returns `0.0` when the current
/// process cannot be located in the snapshot.
pub fn current_rss_mib() -> f64 {
    with_system(|s| {
        let pid = Pid::from_u32(std::process::id());
        s.refresh_processes(sysinfo::ProcessesToUpdate::Some(&[pid]), true);
        s.process(pid)
            .map(|p| p.memory() as f64 / (1024.0 * 1024.0))
            .unwrap_or(0.0)
    })
    .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn free_mib_does_not_panic_and_is_nonnegative() {
        let v = free_mib();
        assert!(v >= 0.0);
    }

    #[test]
    fn current_rss_mib_is_nonnegative() {
        let v = current_rss_mib();
        assert!(v >= 0.0);
    }
}
