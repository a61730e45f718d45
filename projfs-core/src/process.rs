//! Best-effort lookup of the command name behind a triggering process id.

/// Reads the initiating process's command name.
///
/// # Implementation
/// * **Linux**: read `/proc/{pid}/cmdline` and take the first NUL-delimited segment.
/// * **Other platforms**: fall back to `sysinfo`.
///
/// Any failure (the process has already exited, permission denied) yields the empty string; this
/// lookup is never fatal to event dispatch.
pub fn process_name(pid: u32) -> String {
    #[cfg(target_os = "linux")]
    {
        process_name_linux(pid)
    }

    #[cfg(not(target_os = "linux"))]
    {
        process_name_fallback(pid)
    }
}

#[cfg(target_os = "linux")]
fn process_name_linux(pid: u32) -> String {
    use std::fs;

    let cmdline_path = format!("/proc/{}/cmdline", pid);

    match fs::read_to_string(&cmdline_path) {
        Ok(cmdline) => cmdline.split('\0').next().unwrap_or_default().to_string(),
        Err(_) => String::new(),
    }
}

#[cfg(not(target_os = "linux"))]
fn process_name_fallback(pid: u32) -> String {
    use sysinfo::{Pid, System};

    let mut sys = System::new();
    let pid_obj = Pid::from_u32(pid);
    sys.refresh_process(pid_obj);

    sys.process(pid_obj)
        .map(|p| p.name().to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_process_has_a_name() {
        let current_pid = std::process::id();
        assert!(!process_name(current_pid).is_empty());
    }

    #[test]
    fn nonexistent_process_yields_empty_string() {
        assert_eq!(process_name(999999999), "");
    }
}
