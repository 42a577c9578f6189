//! Producer terminators
//!
//! Both send `SIGKILL`. A producer that is already gone is not an error.

use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use sigwatch_core::{ProducerHandle, TerminateError};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Terminate a producer by process id
#[derive(Debug, Clone, Copy)]
pub(crate) struct PidHandle {
    pid: i32,
}

impl PidHandle {
    pub(crate) fn new(pid: i32) -> Self {
        Self { pid }
    }
}

impl ProducerHandle for PidHandle {
    fn terminate(&self) -> Result<(), TerminateError> {
        kill_pid(self.pid)
    }

    fn describe(&self) -> String {
        format!("pid {}", self.pid)
    }
}

/// Terminate the first process whose command line contains `name`
#[derive(Debug, Clone)]
pub(crate) struct ProcessNameHandle {
    name: String,
    proc_root: PathBuf,
}

impl ProcessNameHandle {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            proc_root: PathBuf::from("/proc"),
        }
    }
}

impl ProducerHandle for ProcessNameHandle {
    fn terminate(&self) -> Result<(), TerminateError> {
        match find_pid(&self.proc_root, &self.name, std::process::id())? {
            Some(pid) => kill_pid(pid),
            None => {
                info!(name = %self.name, "No running producer matches, nothing to terminate");
                Ok(())
            }
        }
    }

    fn describe(&self) -> String {
        format!("process matching {:?}", self.name)
    }
}

fn kill_pid(pid: i32) -> Result<(), TerminateError> {
    match kill(Pid::from_raw(pid), Signal::SIGKILL) {
        Ok(()) => {
            warn!(pid, "Sent SIGKILL to producer");
            Ok(())
        }
        Err(Errno::ESRCH) => {
            info!(pid, "Producer already exited");
            Ok(())
        }
        Err(errno) => Err(TerminateError::Signal {
            target: format!("pid {pid}"),
            reason: errno.desc().to_string(),
        }),
    }
}

/// Scan `<proc_root>/<pid>/cmdline` for `name`, skipping `own_pid`
///
/// Entries that vanish or cannot be read while scanning are skipped.
fn find_pid(proc_root: &Path, name: &str, own_pid: u32) -> io::Result<Option<i32>> {
    let mut pids: Vec<i32> = fs::read_dir(proc_root)?
        .filter_map(Result::ok)
        .filter_map(|entry| entry.file_name().to_str()?.parse().ok())
        .filter(|pid: &i32| u32::try_from(*pid).map_or(true, |p| p != own_pid))
        .collect();
    pids.sort_unstable();

    for pid in pids {
        let Ok(raw) = fs::read(proc_root.join(pid.to_string()).join("cmdline")) else {
            continue;
        };
        let cmdline = String::from_utf8_lossy(&raw).replace('\0', " ");
        if cmdline.contains(name) {
            return Ok(Some(pid));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_proc(entries: &[(&str, &[u8])]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for (name, cmdline) in entries {
            let entry = dir.path().join(name);
            fs::create_dir(&entry).unwrap();
            fs::write(entry.join("cmdline"), cmdline).unwrap();
        }
        dir
    }

    #[test]
    fn finds_lowest_matching_pid() {
        let proc = fake_proc(&[
            ("12", b"/usr/bin/python3\0lvmdbustest.py\0-v\0"),
            ("7", b"bash\0"),
            ("30", b"python3\0lvmdbustest.py\0"),
            ("self", b"lvmdbustest.py\0"),
        ]);
        assert_eq!(find_pid(proc.path(), "lvmdbustest.py", 1).unwrap(), Some(12));
    }

    #[test]
    fn skips_own_pid() {
        let proc = fake_proc(&[("5", b"sigwatch\0simulate\0")]);
        assert_eq!(find_pid(proc.path(), "sigwatch", 5).unwrap(), None);
    }

    #[test]
    fn no_match_is_silent_noop() {
        let proc = fake_proc(&[("3", b"init\0")]);
        let handle = ProcessNameHandle {
            name: "lvmdbustest.py".into(),
            proc_root: proc.path().to_path_buf(),
        };
        assert!(handle.terminate().is_ok());
    }

    #[test]
    fn missing_proc_root_is_lookup_error() {
        let handle = ProcessNameHandle {
            name: "x".into(),
            proc_root: PathBuf::from("/nonexistent/proc"),
        };
        assert!(matches!(handle.terminate(), Err(TerminateError::Lookup(_))));
    }

    #[test]
    fn exited_pid_is_not_an_error() {
        // Above any configurable pid_max
        assert!(PidHandle::new(i32::MAX).terminate().is_ok());
    }
}
