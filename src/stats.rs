use nix::sys::resource::{UsageWho, getrusage};
use std::io::Write;
use std::time::Instant;

/// Timestamps bracketing one foreground execution.
///
/// Taken immediately before the grandchild is forked and immediately after the
/// wait for it returns. Consumed by [`Statistics::collect`] and then dropped;
/// nothing here is persisted.
#[derive(Debug, Clone, Copy)]
pub struct ExecutionOutcome {
    pub started: Instant,
    pub finished: Instant,
}

impl ExecutionOutcome {
    /// Start the clock. Call right before forking the child to be measured.
    pub fn begin() -> Self {
        let now = Instant::now();
        Self {
            started: now,
            finished: now,
        }
    }

    /// Stop the clock. Call right after the wait for the child returns.
    pub fn finish(mut self) -> Self {
        self.finished = Instant::now();
        self
    }

    /// Elapsed wall-clock time in microseconds.
    pub fn wall_micros(&self) -> u128 {
        self.finished.duration_since(self.started).as_micros()
    }
}

/// Resource-usage metrics for the terminated children of the calling process.
///
/// Collected with `getrusage(RUSAGE_CHILDREN)`, so it must be read from the
/// process that waited on the measured child, right after that wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Statistics {
    pub wall_micros: u128,
    pub cpu_micros: i64,
    pub voluntary_ctx_switches: i64,
    pub involuntary_ctx_switches: i64,
    pub major_page_faults: i64,
    pub minor_page_faults: i64,
}

impl Statistics {
    /// Combine the wall-clock outcome with the children's resource usage.
    pub fn collect(outcome: &ExecutionOutcome) -> nix::Result<Self> {
        let usage = getrusage(UsageWho::RUSAGE_CHILDREN)?;
        let user = usage.user_time();
        let system = usage.system_time();
        let cpu_micros =
            (user.tv_sec() + system.tv_sec()) * 1_000_000 + user.tv_usec() + system.tv_usec();
        Ok(Self {
            wall_micros: outcome.wall_micros(),
            cpu_micros,
            voluntary_ctx_switches: usage.voluntary_context_switches(),
            involuntary_ctx_switches: usage.involuntary_context_switches(),
            major_page_faults: usage.major_page_faults(),
            minor_page_faults: usage.minor_page_faults(),
        })
    }

    /// Write the six-metric statistics block.
    ///
    /// The text, including the "ms" labels on values that are actually
    /// microseconds, is kept exactly as users of this shell have always seen
    /// it.
    pub fn render(&self, out: &mut dyn Write) -> std::io::Result<()> {
        writeln!(out, "\n----------------------------------------")?;
        writeln!(out, "Statistics")?;
        writeln!(out, "----------------------------------------")?;
        writeln!(out, "\tWall-clock time: {} ms", self.wall_micros)?;
        writeln!(
            out,
            "\tCPU time used (user and Kernel): {} ms",
            self.cpu_micros
        )?;
        writeln!(
            out,
            "\tVoluntary context switches: {}",
            self.voluntary_ctx_switches
        )?;
        writeln!(
            out,
            "\tInvoluntary context switches: {}",
            self.involuntary_ctx_switches
        )?;
        writeln!(out, "\tPage faults: {}", self.major_page_faults)?;
        writeln!(
            out,
            "\tPage faults satisfied by cache read: {}",
            self.minor_page_faults
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_wall_micros_tracks_elapsed_time() {
        let outcome = ExecutionOutcome::begin();
        std::thread::sleep(Duration::from_millis(50));
        let outcome = outcome.finish();
        assert!(outcome.wall_micros() >= 50_000);
    }

    #[test]
    fn test_collect_reads_children_usage() {
        // Give RUSAGE_CHILDREN something to account for.
        let mut child = std::process::Command::new("true").spawn().expect("spawn");
        child.wait().expect("wait");

        let outcome = ExecutionOutcome::begin().finish();
        let stats = Statistics::collect(&outcome).expect("rusage");
        assert!(stats.cpu_micros >= 0);
        assert!(stats.voluntary_ctx_switches >= 0);
    }

    #[test]
    fn test_wall_clock_dominates_cpu_time_for_sleeping_child() {
        let outcome = ExecutionOutcome::begin();
        let mut child = std::process::Command::new("sleep")
            .arg("1")
            .spawn()
            .expect("spawn sleep");
        child.wait().expect("wait");
        let outcome = outcome.finish();

        let stats = Statistics::collect(&outcome).expect("rusage");
        // A ~1s sleep must report ~1s of wall-clock time, with slack for
        // scheduling, and a single-threaded sleeper cannot burn more CPU
        // time than wall-clock time.
        assert!(stats.wall_micros >= 1_000_000, "wall = {}", stats.wall_micros);
        assert!(stats.wall_micros < 5_000_000, "wall = {}", stats.wall_micros);
        assert!(stats.wall_micros as i64 >= stats.cpu_micros);
    }

    #[test]
    fn test_render_matches_expected_block() {
        let stats = Statistics {
            wall_micros: 1_234_567,
            cpu_micros: 7_890,
            voluntary_ctx_switches: 12,
            involuntary_ctx_switches: 3,
            major_page_faults: 0,
            minor_page_faults: 451,
        };

        let mut out = Vec::new();
        stats.render(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "\n----------------------------------------\n\
             Statistics\n\
             ----------------------------------------\n\
             \tWall-clock time: 1234567 ms\n\
             \tCPU time used (user and Kernel): 7890 ms\n\
             \tVoluntary context switches: 12\n\
             \tInvoluntary context switches: 3\n\
             \tPage faults: 0\n\
             \tPage faults satisfied by cache read: 451\n"
        );
    }
}
