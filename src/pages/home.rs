use std::sync::Arc;

use adw::prelude::*;

use crate::{
    app_state::AppState,
    backends::ContainerRecord,
    gettext_f,
    hardware::SystemInfo,
    i18n::gettext,
    monitor::{CommandOutcome, ContainerSnapshot, PerformanceSnapshot},
    widgets::LauncherWindow,
};

use super::{follow, follow_changes, icon_button, report_outcome, status_dot};

pub(crate) fn system_rows(system: &SystemInfo) -> Vec<(String, String)> {
    let mut rows = vec![
        (
            gettext("Operating System"),
            format!(
                "{} {} ({})",
                system.os_name,
                system.os_version,
                system.os_family.as_str()
            )
            .replace("  ", " "),
        ),
        (
            gettext("CPU"),
            format!(
                "{} ({} cores, {})",
                system.cpu.brand, system.cpu.cores, system.cpu.arch
            ),
        ),
        (
            gettext("GPU"),
            if system.gpu.memory_gb > 0 {
                format!("{} ({} GB)", system.gpu.name, system.gpu.memory_gb)
            } else {
                system.gpu.name.clone()
            },
        ),
        (gettext("Memory"), format!("{} GB", system.memory_gb)),
        (gettext("Platform"), system.platform.as_str().to_uppercase()),
    ];
    if let Some(variant) = system.apple_variant {
        rows.push((gettext("Apple Silicon"), variant.to_string()));
    }
    if let Some(model) = system.jetson_model {
        rows.push((gettext("Jetson Model"), model.to_string()));
    }
    rows.push((
        gettext("Container Engine"),
        if system.engine.available {
            format!("{} {}", system.engine.name, system.engine.version)
        } else {
            gettext("Not available")
        },
    ));
    rows
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Metric {
    pub title: String,
    /// 0.0 to 1.0
    pub fraction: f64,
    pub detail: String,
}

fn fraction(percent: f32) -> f64 {
    (f64::from(percent) / 100.0).clamp(0.0, 1.0)
}

pub(crate) fn metrics(perf: &PerformanceSnapshot) -> Vec<Metric> {
    vec![
        Metric {
            title: gettext("CPU"),
            fraction: fraction(perf.cpu_usage),
            detail: format!("{:.0}% · {:.0}°C", perf.cpu_usage, perf.cpu_temp),
        },
        Metric {
            title: gettext("Memory"),
            fraction: fraction(perf.memory_usage),
            detail: format!("{:.0}% of {} GB", perf.memory_usage, perf.memory_total_gb),
        },
        Metric {
            title: gettext("GPU"),
            fraction: fraction(perf.gpu_usage),
            detail: format!(
                "{:.0}% · {:.0}°C · VRAM {:.0}% of {} GB",
                perf.gpu_usage, perf.gpu_temp, perf.gpu_memory_usage, perf.gpu_memory_total_gb
            ),
        },
        Metric {
            title: gettext("Disk"),
            fraction: fraction(perf.disk_usage),
            detail: format!(
                "{:.0}% · {} of {} GB",
                perf.disk_usage, perf.disk_used_gb, perf.disk_total_gb
            ),
        },
    ]
}

pub(crate) fn container_subtitle(record: &ContainerRecord) -> String {
    let mut parts = vec![record.image.clone()];
    if !record.status_text.is_empty() {
        parts.push(record.status_text.clone());
    } else if !record.state.is_empty() {
        parts.push(record.state.clone());
    }
    if !record.ports.is_empty() {
        parts.push(record.ports.join(", "));
    }
    parts.join(" · ")
}

fn build_performance_group(state: &AppState) -> adw::PreferencesGroup {
    let group = adw::PreferencesGroup::builder()
        .title(gettext("Performance"))
        .build();

    let initial = metrics(&state.performance.latest());
    let rows: Vec<(adw::ActionRow, gtk::LevelBar)> = initial
        .iter()
        .map(|metric| {
            let row = adw::ActionRow::builder()
                .title(metric.title.as_str())
                .subtitle(metric.detail.as_str())
                .build();
            let bar = gtk::LevelBar::builder()
                .min_value(0.0)
                .max_value(1.0)
                .value(metric.fraction)
                .width_request(220)
                .valign(gtk::Align::Center)
                .build();
            row.add_suffix(&bar);
            group.add(&row);
            (row, bar)
        })
        .collect();

    follow(
        state.performance.subscribe(),
        &group,
        move |_, perf: Arc<PerformanceSnapshot>| {
            for ((row, bar), metric) in rows.iter().zip(metrics(&perf)) {
                row.set_subtitle(&metric.detail);
                bar.set_value(metric.fraction);
            }
        },
    );
    group
}

type ContainerAction = fn(&AppState, &str) -> CommandOutcome;

fn container_row(state: &AppState, window: &LauncherWindow, record: &ContainerRecord) -> adw::ActionRow {
    let row = adw::ActionRow::builder()
        .title(record.name.as_str())
        .subtitle(container_subtitle(record))
        .build();
    row.add_prefix(&status_dot(record.status));

    let actions: [(&str, &str, bool, ContainerAction); 3] = [
        ("media-playback-start-symbolic", "Start", !record.is_running(), |s: &AppState, id: &str| {
            s.containers.start_container(id)
        }),
        ("media-playback-stop-symbolic", "Stop", record.is_running(), |s: &AppState, id: &str| {
            s.containers.stop_container(id)
        }),
        ("view-refresh-symbolic", "Restart", true, |s: &AppState, id: &str| {
            s.containers.restart_container(id)
        }),
    ];
    for (icon, label, visible, action) in actions {
        if !visible {
            continue;
        }
        let button = icon_button(icon, &gettext(label));
        let id = record.id.clone();
        let name = record.name.clone();
        let state = state.clone();
        let window = window.downgrade();
        button.connect_clicked(move |button| {
            let Some(window) = window.upgrade() else {
                return;
            };
            if state.containers.container(&id).is_none() {
                window.toast(&gettext_f!("{name} no longer exists", "name" => name));
                return;
            }
            button.set_sensitive(false);
            let button = button.downgrade();
            let (state, id, name) = (state.clone(), id.clone(), name.clone());
            window.run_blocking(
                move || action(&state, &id),
                move |window, outcome| {
                    if let Some(button) = button.upgrade() {
                        button.set_sensitive(true);
                    }
                    report_outcome(window, &gettext(label), &name, &outcome);
                },
            );
        });
        row.add_suffix(&button);
    }

    let logs_button = icon_button("utilities-terminal-symbolic", &gettext("Logs"));
    let id = record.id.clone();
    let name = record.name.clone();
    let state = state.clone();
    let window = window.downgrade();
    logs_button.connect_clicked(move |_| {
        let Some(window) = window.upgrade() else {
            return;
        };
        let (state, id, name) = (state.clone(), id.clone(), name.clone());
        let lines = state.config.log_tail_lines;
        window.run_blocking(
            move || state.containers.logs(&id, lines),
            move |window, outcome| {
                if outcome.success {
                    window.show_output(&gettext_f!("Logs: {name}", "name" => name), &outcome.output);
                } else {
                    report_outcome(window, &gettext("Logs"), &name, &outcome);
                }
            },
        );
    });
    row.add_suffix(&logs_button);
    row
}

fn fill_container_list(
    list: &gtk::ListBox,
    state: &AppState,
    window: &LauncherWindow,
    snapshot: &ContainerSnapshot,
) {
    list.remove_all();
    if snapshot.is_empty() {
        let message = if state.containers.engine().is_some() {
            gettext("No containers found")
        } else {
            gettext("No container engine available. Install Docker or Podman.")
        };
        list.append(&adw::ActionRow::builder().title(message).build());
        return;
    }
    for record in snapshot.values() {
        list.append(&container_row(state, window, record));
    }
}

fn build_containers_group(state: &AppState, window: &LauncherWindow) -> adw::PreferencesGroup {
    let group = adw::PreferencesGroup::builder()
        .title(gettext("Containers"))
        .description(gettext_f!("Engine: {engine}", "engine" => state.containers.engine_name()))
        .build();

    let refresh = icon_button("view-refresh-symbolic", &gettext("Refresh"));
    refresh.set_action_name(Some("win.refresh"));
    group.set_header_suffix(Some(&refresh));

    let list = gtk::ListBox::new();
    list.set_selection_mode(gtk::SelectionMode::None);
    list.add_css_class("boxed-list");
    fill_container_list(&list, state, window, &state.containers.snapshot());
    group.add(&list);

    let state = state.clone();
    let window = window.downgrade();
    follow_changes(
        state.containers.subscribe(),
        &list,
        state.containers.snapshot(),
        move |list, snapshot: &ContainerSnapshot| {
            if let Some(window) = window.upgrade() {
                fill_container_list(list, &state, &window, snapshot);
            }
        },
    );
    group
}

pub fn build(state: &AppState, window: &LauncherWindow) -> gtk::Widget {
    let page = adw::PreferencesPage::new();

    let welcome = adw::PreferencesGroup::builder()
        .title(gettext("Welcome to Singularity Launcher"))
        .description(gettext(
            "Check your hardware, watch its load and manage the containers running your local AI services.",
        ))
        .build();
    page.add(&welcome);

    let system_group = adw::PreferencesGroup::builder()
        .title(gettext("System Information"))
        .build();
    for (title, value) in system_rows(&state.system) {
        let row = adw::ActionRow::builder()
            .title(title)
            .subtitle(value)
            .subtitle_selectable(true)
            .build();
        row.add_css_class("property");
        system_group.add(&row);
    }
    page.add(&system_group);

    page.add(&build_performance_group(state));
    page.add(&build_containers_group(state, window));
    page.upcast()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        backends::{ContainerStatus, EngineKind},
        hardware::{CpuType, EngineInfo, GpuType, HostFacts, HostOs, HostProbe},
        fakers::{CommandRunner, HostFs, NullCommandRunnerBuilder},
    };

    fn system(runner: CommandRunner, engine: EngineInfo) -> SystemInfo {
        let probe = HostProbe::new(runner, HostFs::new_null(), HostOs::Linux, "x86_64").with_facts(
            HostFacts {
                total_memory_bytes: Some(32 * 1024 * 1024 * 1024),
                cpu_brand: Some("Intel(R) Core(TM) i9-13900K".into()),
                cpu_vendor: Some("GenuineIntel".into()),
                cpu_cores: Some(24),
                os_name: Some("Fedora Linux".into()),
                os_version: Some("41".into()),
                kernel_version: None,
            },
        );
        smol::block_on(SystemInfo::detect(&probe, engine))
    }

    #[test]
    fn system_rows_for_nvidia_desktop() {
        let runner = NullCommandRunnerBuilder::new()
            .cmd(&["nvidia-smi"], "")
            .cmd(
                &["nvidia-smi", "--query-gpu=name,memory.total", "--format=csv,noheader,nounits"],
                "NVIDIA GeForce RTX 3090, 24576",
            )
            .build();
        let engine = EngineInfo {
            name: "podman".into(),
            version: "5.2.0".into(),
            available: true,
        };
        let rows = system_rows(&system(runner, engine));
        let value = |title: &str| {
            rows.iter()
                .find(|(t, _)| t == title)
                .map(|(_, v)| v.clone())
                .unwrap()
        };
        assert_eq!(value("CPU"), "Intel(R) Core(TM) i9-13900K (24 cores, x86_64)");
        assert_eq!(value("GPU"), "NVIDIA GeForce RTX 3090 (24 GB)");
        assert_eq!(value("Memory"), "32 GB");
        assert_eq!(value("Platform"), "NVIDIA");
        assert_eq!(value("Container Engine"), "podman 5.2.0");
        assert!(rows.iter().all(|(t, _)| t != "Jetson Model"));
    }

    #[test]
    fn missing_engine_row() {
        let rows = system_rows(&system(CommandRunner::new_null(), EngineInfo::none()));
        assert_eq!(rows.last().unwrap().1, "Not available");
    }

    #[test]
    fn metric_details() {
        let mut perf = PerformanceSnapshot::empty(CpuType::Amd, GpuType::Nvidia);
        perf.cpu_usage = 42.4;
        perf.cpu_temp = 61.0;
        perf.disk_usage = 150.0;
        perf.disk_used_gb = 100;
        perf.disk_total_gb = 500;
        let metrics = metrics(&perf);
        assert_eq!(metrics[0].detail, "42% · 61°C");
        assert!((metrics[0].fraction - 0.424).abs() < 1e-6);
        assert_eq!(metrics[3].fraction, 1.0);
        assert_eq!(metrics[3].detail, "150% · 100 of 500 GB");
    }

    #[test]
    fn subtitles() {
        let record = ContainerRecord {
            id: "abc".into(),
            name: "ollama".into(),
            status: ContainerStatus::Running,
            state: "running".into(),
            status_text: "Up 2 hours".into(),
            image: "ollama/ollama".into(),
            ports: vec!["0.0.0.0:11434->11434/tcp".into()],
            engine: EngineKind::Docker,
        };
        assert_eq!(
            container_subtitle(&record),
            "ollama/ollama · Up 2 hours · 0.0.0.0:11434->11434/tcp"
        );
    }
}
