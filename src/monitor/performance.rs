use std::{
    ops::ControlFlow,
    path::Path,
    sync::{Arc, Mutex, RwLock},
    time::SystemTime,
};

use futures::executor::block_on;
use sysinfo::{Components, Disks, System};
use tracing::debug;

use crate::{
    fakers::{Command, CommandRunner, FdMode, HostFs},
    hardware::{CpuType, GpuType, memory::bytes_to_gib},
};

use super::{MonitorState, PollLoop, PollSettings, Publisher, lock};

const CPU_SENSOR_LABELS: &[&str] = &["coretemp", "k10temp", "cpu_thermal", "Package", "Tctl"];
const AMD_GPU_BUSY: &str = "/sys/class/drm/card0/device/gpu_busy_percent";
const AMD_GPU_TEMP: &str = "/sys/class/drm/card0/device/hwmon/hwmon0/temp1_input";

#[derive(Debug, Clone, PartialEq)]
pub struct PerformanceSnapshot {
    pub cpu_usage: f32,
    pub cpu_temp: f32,
    pub cpu_type: CpuType,
    pub memory_usage: f32,
    pub memory_total_gb: u64,
    pub gpu_usage: f32,
    pub gpu_temp: f32,
    pub gpu_memory_usage: f32,
    pub gpu_memory_total_gb: u64,
    pub gpu_type: GpuType,
    pub disk_usage: f32,
    pub disk_total_gb: u64,
    pub disk_used_gb: u64,
    pub sampled_at: Option<SystemTime>,
}

impl PerformanceSnapshot {
    pub fn empty(cpu_type: CpuType, gpu_type: GpuType) -> Self {
        PerformanceSnapshot {
            cpu_usage: 0.0,
            cpu_temp: 0.0,
            cpu_type,
            memory_usage: 0.0,
            memory_total_gb: 0,
            gpu_usage: 0.0,
            gpu_temp: 0.0,
            gpu_memory_usage: 0.0,
            gpu_memory_total_gb: 0,
            gpu_type,
            disk_usage: 0.0,
            disk_total_gb: 0,
            disk_used_gb: 0,
            sampled_at: None,
        }
    }
}

/// One reading of the host counters. `None` means the counter could not be
/// read this time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HostSample {
    pub cpu_usage: Option<f32>,
    pub cpu_temp: Option<f32>,
    pub memory_used_bytes: Option<u64>,
    pub memory_total_bytes: Option<u64>,
    pub disk_used_bytes: Option<u64>,
    pub disk_total_bytes: Option<u64>,
}

pub trait HostSampler: Send {
    fn sample(&mut self) -> HostSample;
}

pub struct SysinfoSampler {
    sys: System,
    disks: Disks,
    components: Components,
}

impl SysinfoSampler {
    pub fn new() -> Self {
        let mut sys = System::new();
        // usage is computed between two refreshes
        sys.refresh_cpu_usage();
        SysinfoSampler {
            sys,
            disks: Disks::new_with_refreshed_list(),
            components: Components::new_with_refreshed_list(),
        }
    }
}

impl Default for SysinfoSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl HostSampler for SysinfoSampler {
    fn sample(&mut self) -> HostSample {
        self.sys.refresh_cpu_usage();
        self.sys.refresh_memory();
        self.disks.refresh(false);
        self.components.refresh(false);

        let cpu_temp = self
            .components
            .list()
            .iter()
            .filter(|c| CPU_SENSOR_LABELS.iter().any(|label| c.label().contains(label)))
            .find_map(|c| c.temperature());

        let root = self
            .disks
            .list()
            .iter()
            .find(|d| d.mount_point() == Path::new("/"))
            .or_else(|| self.disks.list().first());

        let memory_total = self.sys.total_memory();
        HostSample {
            cpu_usage: Some(self.sys.global_cpu_usage()),
            cpu_temp,
            memory_used_bytes: Some(self.sys.used_memory()),
            memory_total_bytes: Some(memory_total).filter(|t| *t > 0),
            disk_used_bytes: root.map(|d| d.total_space().saturating_sub(d.available_space())),
            disk_total_bytes: root.map(|d| d.total_space()).filter(|t| *t > 0),
        }
    }
}

/// Returns the same reading forever.
#[derive(Debug, Clone, Default)]
pub struct NullSampler {
    pub sample: HostSample,
}

impl HostSampler for NullSampler {
    fn sample(&mut self) -> HostSample {
        self.sample.clone()
    }
}

fn percent(used: u64, total: u64) -> f32 {
    if total == 0 {
        0.0
    } else {
        (used as f64 / total as f64 * 100.0) as f32
    }
}

#[derive(Debug, Default, PartialEq)]
struct GpuSample {
    usage: Option<f32>,
    temp: Option<f32>,
    memory_usage: Option<f32>,
    memory_total_gb: Option<u64>,
}

struct Inner {
    sampler: Mutex<Box<dyn HostSampler>>,
    runner: CommandRunner,
    fs: HostFs,
    latest: RwLock<Arc<PerformanceSnapshot>>,
    publisher: Publisher<Arc<PerformanceSnapshot>>,
    poll_loop: PollLoop,
}

/// Samples CPU, memory, disk and GPU usage on a fixed interval.
#[derive(Clone)]
pub struct PerformanceMonitor {
    inner: Arc<Inner>,
}

impl PerformanceMonitor {
    pub fn new(
        sampler: Box<dyn HostSampler>,
        runner: CommandRunner,
        fs: HostFs,
        cpu_type: CpuType,
        gpu_type: GpuType,
        settings: PollSettings,
    ) -> Self {
        PerformanceMonitor {
            inner: Arc::new(Inner {
                sampler: Mutex::new(sampler),
                runner,
                fs,
                latest: RwLock::new(Arc::new(PerformanceSnapshot::empty(cpu_type, gpu_type))),
                publisher: Publisher::default(),
                poll_loop: PollLoop::new("performance-monitor", settings),
            }),
        }
    }

    pub fn start(&self) -> bool {
        let weak = Arc::downgrade(&self.inner);
        self.inner.poll_loop.start(move || match weak.upgrade() {
            Some(inner) => {
                PerformanceMonitor { inner }.sample_now();
                ControlFlow::Continue(())
            }
            None => ControlFlow::Break(()),
        })
    }

    pub fn stop(&self) -> bool {
        self.inner.poll_loop.stop()
    }

    pub fn state(&self) -> MonitorState {
        self.inner.poll_loop.state()
    }

    pub fn latest(&self) -> Arc<PerformanceSnapshot> {
        self.inner
            .latest
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn subscribe(&self) -> async_channel::Receiver<Arc<PerformanceSnapshot>> {
        self.inner.publisher.subscribe()
    }

    fn nvidia_sample(&self) -> Option<GpuSample> {
        let mut cmd = Command::new("nvidia-smi");
        cmd.args([
            "--query-gpu=utilization.gpu,temperature.gpu,utilization.memory,memory.total",
            "--format=csv,noheader,nounits",
        ]);
        cmd.stdout = FdMode::Pipe;
        cmd.stderr = FdMode::Pipe;
        let output = block_on(self.inner.runner.output(cmd)).ok()?;
        if !output.status.success() {
            return None;
        }
        let text = String::from_utf8_lossy(&output.stdout);
        let fields: Vec<f32> = text
            .lines()
            .next()?
            .split(',')
            .map(|f| f.trim().parse::<f32>())
            .collect::<Result<_, _>>()
            .ok()?;
        match fields[..] {
            [usage, temp, memory_usage, memory_total_mib] => Some(GpuSample {
                usage: Some(usage),
                temp: Some(temp),
                memory_usage: Some(memory_usage),
                memory_total_gb: Some((memory_total_mib / 1024.0).round() as u64),
            }),
            _ => None,
        }
    }

    fn read_number(&self, path: &str) -> Option<f32> {
        self.inner.fs.read_to_string(path).ok()?.trim().parse().ok()
    }

    fn gpu_sample(&self, gpu_type: GpuType) -> GpuSample {
        match gpu_type {
            GpuType::Nvidia => self.nvidia_sample().unwrap_or_default(),
            GpuType::Amd => GpuSample {
                usage: self.read_number(AMD_GPU_BUSY),
                temp: self.read_number(AMD_GPU_TEMP).map(|millis| millis / 1000.0),
                ..Default::default()
            },
            GpuType::Apple | GpuType::Cpu => GpuSample {
                usage: Some(0.0),
                temp: Some(0.0),
                memory_usage: Some(0.0),
                memory_total_gb: Some(0),
            },
        }
    }

    /// Takes one sample, merges it over the previous snapshot and publishes it.
    pub fn sample_now(&self) -> Arc<PerformanceSnapshot> {
        let host = lock(&self.inner.sampler).sample();
        let previous = self.latest();
        let gpu = self.gpu_sample(previous.gpu_type);

        let mut next = (*previous).clone();
        if let Some(v) = host.cpu_usage {
            next.cpu_usage = v;
        }
        if let Some(v) = host.cpu_temp {
            next.cpu_temp = v;
        }
        if let Some(total) = host.memory_total_bytes {
            next.memory_total_gb = bytes_to_gib(total);
            if let Some(used) = host.memory_used_bytes {
                next.memory_usage = percent(used, total);
            }
        }
        if let Some(total) = host.disk_total_bytes {
            next.disk_total_gb = bytes_to_gib(total);
            if let Some(used) = host.disk_used_bytes {
                next.disk_used_gb = bytes_to_gib(used);
                next.disk_usage = percent(used, total);
            }
        }
        if let Some(v) = gpu.usage {
            next.gpu_usage = v;
        }
        if let Some(v) = gpu.temp {
            next.gpu_temp = v;
        }
        if let Some(v) = gpu.memory_usage {
            next.gpu_memory_usage = v;
        }
        if let Some(v) = gpu.memory_total_gb {
            next.gpu_memory_total_gb = v;
        }
        next.sampled_at = Some(SystemTime::now());
        debug!(cpu = next.cpu_usage, memory = next.memory_usage, gpu = next.gpu_usage, "Performance sample");

        let next = Arc::new(next);
        *self.inner.latest.write().unwrap_or_else(|e| e.into_inner()) = next.clone();
        self.inner.publisher.publish(next.clone());
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakers::{NullCommandRunnerBuilder, NullHostFsBuilder};
    use std::time::Duration;

    const GIB: u64 = 1024 * 1024 * 1024;

    fn settings() -> PollSettings {
        PollSettings {
            interval: Duration::from_millis(10),
            join_timeout: Duration::from_secs(1),
        }
    }

    fn host_sample() -> HostSample {
        HostSample {
            cpu_usage: Some(12.5),
            cpu_temp: Some(48.0),
            memory_used_bytes: Some(8 * GIB),
            memory_total_bytes: Some(32 * GIB),
            disk_used_bytes: Some(250 * GIB),
            disk_total_bytes: Some(1000 * GIB),
        }
    }

    #[test]
    fn nvidia_metrics() {
        let runner = NullCommandRunnerBuilder::new()
            .cmd(
                &[
                    "nvidia-smi",
                    "--query-gpu=utilization.gpu,temperature.gpu,utilization.memory,memory.total",
                    "--format=csv,noheader,nounits",
                ],
                "37, 61, 12, 24564\n",
            )
            .build();
        let monitor = PerformanceMonitor::new(
            Box::new(NullSampler { sample: host_sample() }),
            runner,
            HostFs::new_null(),
            CpuType::Intel,
            GpuType::Nvidia,
            settings(),
        );
        let snapshot = monitor.sample_now();
        assert_eq!(snapshot.cpu_usage, 12.5);
        assert_eq!(snapshot.memory_usage, 25.0);
        assert_eq!(snapshot.memory_total_gb, 32);
        assert_eq!(snapshot.disk_usage, 25.0);
        assert_eq!(snapshot.disk_used_gb, 250);
        assert_eq!(snapshot.gpu_usage, 37.0);
        assert_eq!(snapshot.gpu_temp, 61.0);
        assert_eq!(snapshot.gpu_memory_usage, 12.0);
        assert_eq!(snapshot.gpu_memory_total_gb, 24);
        assert!(snapshot.sampled_at.is_some());
    }

    #[test]
    fn amd_metrics_from_sysfs() {
        let fs = NullHostFsBuilder::new()
            .file(AMD_GPU_BUSY, "83\n")
            .file(AMD_GPU_TEMP, "54000\n")
            .build();
        let monitor = PerformanceMonitor::new(
            Box::new(NullSampler::default()),
            CommandRunner::new_null(),
            fs,
            CpuType::Amd,
            GpuType::Amd,
            settings(),
        );
        let snapshot = monitor.sample_now();
        assert_eq!(snapshot.gpu_usage, 83.0);
        assert_eq!(snapshot.gpu_temp, 54.0);
    }

    #[test]
    fn failed_sub_probes_keep_previous_values() {
        let calls = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = calls.clone();
        let mut builder = NullCommandRunnerBuilder::new();
        builder.cmd_full(
            Command::new_with_args(
                "nvidia-smi",
                [
                    "--query-gpu=utilization.gpu,temperature.gpu,utilization.memory,memory.total",
                    "--format=csv,noheader,nounits",
                ],
            ),
            move || {
                if counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst) == 0 {
                    Ok("50, 70, 20, 8192".into())
                } else {
                    Ok("[N/A], [N/A], [N/A], [N/A]".into())
                }
            },
        );

        struct Flaky(usize);
        impl HostSampler for Flaky {
            fn sample(&mut self) -> HostSample {
                self.0 += 1;
                if self.0 == 1 {
                    host_sample()
                } else {
                    HostSample {
                        cpu_usage: Some(90.0),
                        ..Default::default()
                    }
                }
            }
        }

        let monitor = PerformanceMonitor::new(
            Box::new(Flaky(0)),
            builder.build(),
            HostFs::new_null(),
            CpuType::Intel,
            GpuType::Nvidia,
            settings(),
        );
        monitor.sample_now();
        let second = monitor.sample_now();
        assert_eq!(second.cpu_usage, 90.0);
        assert_eq!(second.cpu_temp, 48.0);
        assert_eq!(second.memory_usage, 25.0);
        assert_eq!(second.gpu_usage, 50.0);
        assert_eq!(second.gpu_memory_total_gb, 8);
    }

    #[test]
    fn cpu_only_host_reports_zero_gpu() {
        let monitor = PerformanceMonitor::new(
            Box::new(NullSampler { sample: host_sample() }),
            CommandRunner::new_null(),
            HostFs::new_null(),
            CpuType::Arm,
            GpuType::Cpu,
            settings(),
        );
        let snapshot = monitor.sample_now();
        assert_eq!(snapshot.gpu_usage, 0.0);
        assert_eq!(snapshot.gpu_type, GpuType::Cpu);
        assert_eq!(snapshot.cpu_type, CpuType::Arm);
    }

    #[test]
    fn background_sampling_publishes() {
        let monitor = PerformanceMonitor::new(
            Box::new(NullSampler { sample: host_sample() }),
            CommandRunner::new_null(),
            HostFs::new_null(),
            CpuType::Intel,
            GpuType::Cpu,
            settings(),
        );
        let updates = monitor.subscribe();
        assert!(monitor.start());
        let first = smol::block_on(updates.recv()).unwrap();
        assert_eq!(first.cpu_usage, 12.5);
        assert!(monitor.stop());
        assert_eq!(monitor.state(), MonitorState::Stopped);
    }
}
