//! Sample sources backed by `sysinfo`.
//!
//! Each source owns its own [`System`] handle so the CPU usage deltas it
//! reports are measured between two of its own refreshes.

use crate::accumulator::{GroupReading, RawSample, RUNTIME_GROUP, SYSTEM_GROUP};
use sysinfo::{Pid, ProcessesToUpdate, System};

/// A source of raw samples belonging to one group.
pub trait SampleSource: Send {
    /// Group the samples are reported under.
    fn group(&self) -> &'static str;

    /// Reads a fresh set of samples.
    fn sample(&mut self) -> Vec<(String, RawSample)>;

    /// Reads a fresh set of samples tagged with the group.
    fn read(&mut self) -> GroupReading {
        GroupReading::new(self.group(), self.sample())
    }
}

/// Statistics of the agent process itself.
pub struct RuntimeSource {
    system: System,
    pid: Option<Pid>,
}

impl RuntimeSource {
    /// Creates a source for the current process.
    #[must_use]
    pub fn new() -> Self {
        let pid = match sysinfo::get_current_pid() {
            Ok(pid) => Some(pid),
            Err(err) => {
                tracing::warn!(error = err, "Cannot determine agent pid, process stats disabled");
                None
            }
        };
        Self {
            system: System::new(),
            pid,
        }
    }
}

impl Default for RuntimeSource {
    fn default() -> Self {
        Self::new()
    }
}

impl SampleSource for RuntimeSource {
    fn group(&self) -> &'static str {
        RUNTIME_GROUP
    }

    fn sample(&mut self) -> Vec<(String, RawSample)> {
        let Some(pid) = self.pid else {
            return Vec::new();
        };
        self.system
            .refresh_processes(ProcessesToUpdate::Some(&[pid]), true);

        let Some(process) = self.system.process(pid) else {
            tracing::warn!(%pid, "Agent process not found in process table");
            return Vec::new();
        };

        vec![
            named("ProcessResidentMemory", RawSample::Unsigned(process.memory())),
            named(
                "ProcessVirtualMemory",
                RawSample::Unsigned(process.virtual_memory()),
            ),
            named(
                "ProcessCPUUsage",
                RawSample::Float(f64::from(process.cpu_usage())),
            ),
            named("ProcessUptime", RawSample::Unsigned(process.run_time())),
        ]
    }
}

/// Host memory, swap, load and per-CPU statistics.
pub struct SystemSource {
    system: System,
}

impl SystemSource {
    /// Creates a host statistics source.
    #[must_use]
    pub fn new() -> Self {
        Self {
            system: System::new(),
        }
    }
}

impl Default for SystemSource {
    fn default() -> Self {
        Self::new()
    }
}

impl SampleSource for SystemSource {
    fn group(&self) -> &'static str {
        SYSTEM_GROUP
    }

    fn sample(&mut self) -> Vec<(String, RawSample)> {
        self.system.refresh_memory();
        self.system.refresh_cpu_usage();

        let load = System::load_average();
        let mut samples = vec![
            named("TotalMemory", RawSample::Unsigned(self.system.total_memory())),
            named("FreeMemory", RawSample::Unsigned(self.system.free_memory())),
            named(
                "AvailableMemory",
                RawSample::Unsigned(self.system.available_memory()),
            ),
            named("UsedMemory", RawSample::Unsigned(self.system.used_memory())),
            named("TotalSwap", RawSample::Unsigned(self.system.total_swap())),
            named("FreeSwap", RawSample::Unsigned(self.system.free_swap())),
            named("LoadAverage1", RawSample::Float(load.one)),
            named("LoadAverage5", RawSample::Float(load.five)),
            named("LoadAverage15", RawSample::Float(load.fifteen)),
        ];

        samples.extend(self.system.cpus().iter().enumerate().map(|(i, cpu)| {
            named(
                &format!("CPUutilization{}", i + 1),
                RawSample::Float(f64::from(cpu.cpu_usage())),
            )
        }));

        samples
    }
}

fn named(name: &str, sample: RawSample) -> (String, RawSample) {
    (name.to_string(), sample)
}

/// The sources the agent polls by default.
#[must_use]
pub fn default_sources() -> Vec<Box<dyn SampleSource>> {
    vec![
        Box::new(RuntimeSource::new()),
        Box::new(SystemSource::new()),
    ]
}
