use nix::sys::wait::{WaitPidFlag, WaitStatus, waitpid};
use nix::unistd::Pid;
use std::io::Write;

/// Default number of background jobs the registry can track at once.
pub const DEFAULT_CAPACITY: usize = 10;

/// One detached background process tracked by the registry.
///
/// The display name is owned by the job so it stays valid after the argument
/// vector it was tokenized from has been dropped.
#[derive(Debug, Clone)]
struct Job {
    pid: Pid,
    name: String,
}

/// Fixed-capacity table of live background jobs.
///
/// Slots are identified by their index, stay stable for a job's lifetime and
/// are reused once the job has been reaped. Reaping is lazy: a finished job is
/// still reported as running until the next registry operation performs a reap
/// pass. The registry is only ever touched from the shell's single thread, so
/// reap-before-insert inside [`JobRegistry::add`] is enough to keep the
/// capacity invariant.
pub struct JobRegistry {
    slots: Vec<Option<Job>>,
}

impl JobRegistry {
    /// Create a registry with [`DEFAULT_CAPACITY`] slots.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a registry with a custom number of slots.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: (0..capacity).map(|_| None).collect(),
        }
    }

    /// Record a freshly launched background job.
    ///
    /// Runs a reap pass first so slots freed by finished jobs can be reused,
    /// then occupies the first empty slot and announces the assignment on
    /// `out`. Returns `Ok(false)` when every slot is taken; the table is left
    /// untouched and nothing is printed in that case.
    pub fn add(&mut self, pid: Pid, name: &str, out: &mut dyn Write) -> std::io::Result<bool> {
        self.reap_all();
        for (slot, entry) in self.slots.iter_mut().enumerate() {
            if entry.is_none() {
                *entry = Some(Job {
                    pid,
                    name: name.to_owned(),
                });
                writeln!(out, "\t\t[{slot}] {pid}\n")?;
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Snapshot of every live job as `(slot, pid, name)`, in slot order.
    ///
    /// Performs a reap pass first, so the snapshot never contains a process
    /// that has already terminated.
    pub fn list(&mut self) -> Vec<(usize, Pid, String)> {
        self.reap_all();
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(slot, entry)| {
                entry
                    .as_ref()
                    .map(|job| (slot, job.pid, job.name.clone()))
            })
            .collect()
    }

    /// Non-blocking status check of every tracked job.
    ///
    /// Jobs whose process has terminated (or can no longer be waited on) have
    /// their slot cleared; everything else counts as still running. Returns
    /// the number of jobs still running after the pass.
    pub fn reap_all(&mut self) -> usize {
        let mut running = 0;
        for entry in self.slots.iter_mut() {
            let pid = match entry {
                Some(job) => job.pid,
                None => continue,
            };
            match waitpid(pid, Some(WaitPidFlag::WNOHANG)) {
                Ok(WaitStatus::Exited(..)) | Ok(WaitStatus::Signaled(..)) => *entry = None,
                // ECHILD: already collected elsewhere, nothing left to track.
                Err(_) => *entry = None,
                Ok(_) => running += 1,
            }
        }
        running
    }

    /// Number of slots, i.e. the maximum number of concurrently tracked jobs.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::new()
    }
}
