use adw::prelude::*;
use gtk::glib;
use tracing::info;

use crate::{
    app_state::AppState, env_file::expand_home, gettext_f, hardware::OsFamily, i18n::gettext,
    widgets::LauncherWindow,
};

/// (name, description, enabled by default)
type Item = (&'static str, &'static str, bool);

const LANGUAGES: &[(Item, &[&str])] = &[
    (
        (
            "Python",
            "Python development environment with common data science and ML libraries.",
            true,
        ),
        &["3.8", "3.9", "3.10", "3.11", "3.12"],
    ),
    (
        (
            "JavaScript/Node.js",
            "Node.js development environment with npm and common packages.",
            false,
        ),
        &["16.x", "18.x", "20.x"],
    ),
    (
        (
            "Rust",
            "Rust development environment with cargo and common crates.",
            false,
        ),
        &["stable", "nightly"],
    ),
];

const DEV_TOOLS: &[Item] = &[
    ("Git", "", true),
    ("Docker", "", false),
    ("Podman", "", true),
    ("VS Code", "", false),
    ("Jupyter", "", false),
    ("Vim/Neovim", "", false),
    ("CMake", "", false),
    ("Make", "", false),
    ("GCC/Clang", "", false),
];

const MONITORING_TOOLS: &[Item] = &[
    ("htop", "Interactive process viewer for Unix systems.", false),
    ("Glances", "Cross-platform system monitoring tool.", false),
    ("btop++", "Resource monitor with advanced features.", false),
    ("nvtop", "NVIDIA GPU process monitoring.", false),
];

const NETWORK_TOOLS: &[Item] = &[
    ("Nmap", "Network discovery and security auditing.", false),
    ("Wireshark", "Network protocol analyzer.", false),
    ("iperf", "Network performance measurement tool.", false),
    ("mtr", "Network diagnostic tool combining ping and traceroute.", false),
];

const PACKAGE_MANAGERS: &[&str] = &[
    "apt (Debian/Ubuntu)",
    "dnf (Fedora/RHEL)",
    "pacman (Arch)",
    "brew (macOS)",
    "chocolatey (Windows)",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SetupOutcome {
    Initiated(String),
    Warning(String),
}

pub(crate) fn default_package_manager(family: OsFamily) -> u32 {
    match family {
        OsFamily::Fedora => 1,
        OsFamily::Arch => 2,
        OsFamily::Mac => 3,
        OsFamily::Windows => 4,
        _ => 0,
    }
}

/// One package per line, blank lines ignored.
pub(crate) fn parse_packages(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

pub(crate) fn custom_setup_outcome(packages: &str, script: &str) -> SetupOutcome {
    if parse_packages(packages).is_empty() && script.trim().is_empty() {
        SetupOutcome::Warning(gettext("Please specify packages or a script to execute."))
    } else {
        SetupOutcome::Initiated(gettext(
            "Custom setup initiated. This may take a few minutes.",
        ))
    }
}

fn show_outcome(window: &LauncherWindow, outcome: SetupOutcome) {
    match outcome {
        SetupOutcome::Initiated(message) => window.toast(&message),
        SetupOutcome::Warning(message) => {
            let toast = adw::Toast::new(&message);
            toast.set_priority(adw::ToastPriority::High);
            window.add_toast(toast);
        }
    }
}

fn switch_rows(group: &adw::PreferencesGroup, items: &[Item]) -> Vec<adw::SwitchRow> {
    items
        .iter()
        .map(|(name, description, active)| {
            let row = adw::SwitchRow::builder().title(*name).active(*active).build();
            if !description.is_empty() {
                row.set_subtitle(&gettext(*description));
            }
            group.add(&row);
            row
        })
        .collect()
}

fn selected(rows: &[adw::SwitchRow]) -> Vec<String> {
    rows.iter()
        .filter(|row| row.is_active())
        .map(|row| row.title().to_string())
        .collect()
}

fn apply_button(label: &str) -> gtk::Button {
    let button = gtk::Button::with_label(label);
    button.add_css_class("suggested-action");
    button.add_css_class("pill");
    button.set_halign(gtk::Align::Center);
    button.set_margin_top(12);
    button
}

fn button_group(button: &gtk::Button) -> adw::PreferencesGroup {
    let group = adw::PreferencesGroup::new();
    group.add(button);
    group
}

fn build_drive_group(state: &AppState, window: &LauncherWindow) -> adw::PreferencesGroup {
    let group = adw::PreferencesGroup::builder()
        .title(gettext("Singularity Drive Configuration"))
        .description(gettext(
            "Directory holding models, service data and build logs. Saved to the environment file.",
        ))
        .build();
    let entry = adw::EntryRow::builder()
        .title(gettext("Singularity Drive path"))
        .text(&*state.drive_path().to_string_lossy())
        .show_apply_button(true)
        .build();

    let state = state.clone();
    let window = window.downgrade();
    entry.connect_apply(move |entry| {
        let Some(window) = window.upgrade() else {
            return;
        };
        let path = expand_home(entry.text().trim(), &glib::home_dir());
        let state = state.clone();
        window.run_blocking(
            move || {
                let result = state.save_drive_path(&path);
                (path, result)
            },
            |window, (path, result)| match result {
                Ok(created) => {
                    if created {
                        window.toast(&gettext_f!(
                            "Created Singularity Drive directory at {path}",
                            "path" => path.display()
                        ));
                    }
                    window.toast(&gettext("Saved Singularity Drive path to environment file"));
                }
                Err(e) => window.toast(&gettext_f!(
                    "Failed to save Singularity Drive path: {error}",
                    "error" => e
                )),
            },
        );
    });
    group.add(&entry);
    group
}

fn build_dev_environment_page(window: &LauncherWindow) -> adw::PreferencesPage {
    let group = adw::PreferencesGroup::builder()
        .title(gettext("Development Environment"))
        .description(gettext("Programming languages and development tools"))
        .build();

    let mut languages = Vec::new();
    for ((name, description, active), versions) in LANGUAGES {
        let expander = adw::ExpanderRow::builder()
            .title(*name)
            .subtitle(gettext(*description))
            .show_enable_switch(true)
            .enable_expansion(*active)
            .build();
        let version_row = adw::ComboRow::builder()
            .title(gettext_f!("{name} Version", "name" => name))
            .model(&gtk::StringList::new(versions))
            .selected(versions.len().saturating_sub(1) as u32)
            .build();
        expander.add_row(&version_row);
        group.add(&expander);
        languages.push((expander, version_row));
    }

    let tools_group = adw::PreferencesGroup::builder()
        .title(gettext("Development Tools"))
        .build();
    let tools = switch_rows(&tools_group, DEV_TOOLS);

    let apply = apply_button(&gettext("Apply Development Environment Setup"));
    let window = window.downgrade();
    apply.connect_clicked(move |_| {
        let Some(window) = window.upgrade() else {
            return;
        };
        let chosen_languages: Vec<String> = languages
            .iter()
            .filter(|(expander, _)| expander.enables_expansion())
            .map(|(expander, versions)| {
                let version = versions
                    .selected_item()
                    .and_downcast::<gtk::StringObject>()
                    .map(|s| s.string().to_string())
                    .unwrap_or_default();
                format!("{} {}", expander.title(), version)
            })
            .collect();
        info!(languages = ?chosen_languages, tools = ?selected(&tools), "Development environment setup requested");
        show_outcome(
            &window,
            SetupOutcome::Initiated(gettext(
                "Development environment setup initiated. This may take a few minutes.",
            )),
        );
    });

    let page = adw::PreferencesPage::new();
    page.add(&group);
    page.add(&tools_group);
    page.add(&button_group(&apply));
    page
}

fn build_system_tools_page(window: &LauncherWindow) -> adw::PreferencesPage {
    let monitoring = adw::PreferencesGroup::builder()
        .title(gettext("System Monitoring"))
        .build();
    let monitoring_rows = switch_rows(&monitoring, MONITORING_TOOLS);
    let network = adw::PreferencesGroup::builder()
        .title(gettext("Network Tools"))
        .build();
    let network_rows = switch_rows(&network, NETWORK_TOOLS);

    let apply = apply_button(&gettext("Apply System Tools Setup"));
    let window = window.downgrade();
    apply.connect_clicked(move |_| {
        let Some(window) = window.upgrade() else {
            return;
        };
        info!(
            monitoring = ?selected(&monitoring_rows),
            network = ?selected(&network_rows),
            "System tools setup requested"
        );
        show_outcome(
            &window,
            SetupOutcome::Initiated(gettext(
                "System tools setup initiated. This may take a few minutes.",
            )),
        );
    });

    let page = adw::PreferencesPage::new();
    page.add(&monitoring);
    page.add(&network);
    page.add(&button_group(&apply));
    page
}

fn text_area(group: &adw::PreferencesGroup, title: &str) -> gtk::TextView {
    let label = gtk::Label::new(Some(title));
    label.set_xalign(0.0);
    label.add_css_class("heading");
    label.set_margin_top(12);
    label.set_margin_bottom(6);

    let view = gtk::TextView::builder()
        .monospace(true)
        .top_margin(8)
        .bottom_margin(8)
        .left_margin(8)
        .right_margin(8)
        .height_request(120)
        .build();
    let frame = gtk::Frame::new(None);
    frame.add_css_class("output");
    frame.set_child(Some(&view));

    let container = gtk::Box::new(gtk::Orientation::Vertical, 0);
    container.append(&label);
    container.append(&frame);
    group.add(&container);
    view
}

fn buffer_text(view: &gtk::TextView) -> String {
    let buffer = view.buffer();
    buffer
        .text(&buffer.start_iter(), &buffer.end_iter(), false)
        .to_string()
}

fn build_custom_setup_page(state: &AppState, window: &LauncherWindow) -> adw::PreferencesPage {
    let group = adw::PreferencesGroup::builder()
        .title(gettext("Custom Package Installation"))
        .build();
    let manager = adw::ComboRow::builder()
        .title(gettext("Package Manager"))
        .model(&gtk::StringList::new(PACKAGE_MANAGERS))
        .selected(default_package_manager(state.system.os_family))
        .build();
    group.add(&manager);

    let packages = text_area(&group, &gettext("Packages (one per line)"));
    let script = text_area(&group, &gettext("Shell Script"));

    let apply = apply_button(&gettext("Apply Custom Setup"));
    let window = window.downgrade();
    apply.connect_clicked(move |_| {
        let Some(window) = window.upgrade() else {
            return;
        };
        let (packages, script) = (buffer_text(&packages), buffer_text(&script));
        let outcome = custom_setup_outcome(&packages, &script);
        if let SetupOutcome::Initiated(_) = &outcome {
            info!(
                manager = PACKAGE_MANAGERS.get(manager.selected() as usize).copied().unwrap_or_default(),
                packages = ?parse_packages(&packages),
                script_lines = script.lines().count(),
                "Custom setup requested"
            );
        }
        show_outcome(&window, outcome);
    });

    let page = adw::PreferencesPage::new();
    page.add(&group);
    page.add(&button_group(&apply));
    page
}

pub fn build(state: &AppState, window: &LauncherWindow) -> gtk::Widget {
    let drive = adw::Clamp::builder()
        .child(&build_drive_group(state, window))
        .margin_top(24)
        .margin_start(12)
        .margin_end(12)
        .build();

    let tabs = adw::ViewStack::new();
    tabs.add_titled(
        &build_dev_environment_page(window),
        Some("dev"),
        &gettext("Development Environment"),
    );
    tabs.add_titled(&build_system_tools_page(window), Some("tools"), &gettext("System Tools"));
    tabs.add_titled(
        &build_custom_setup_page(state, window),
        Some("custom"),
        &gettext("Custom Setup"),
    );
    tabs.set_vexpand(true);

    let switcher = adw::InlineViewSwitcher::builder()
        .stack(&tabs)
        .halign(gtk::Align::Center)
        .margin_top(12)
        .build();

    let container = gtk::Box::new(gtk::Orientation::Vertical, 6);
    container.append(&drive);
    container.append(&switcher);
    container.append(&tabs);
    container.upcast()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn custom_setup_requires_packages_or_script() {
        assert!(matches!(custom_setup_outcome("", "  \n"), SetupOutcome::Warning(_)));
        assert!(matches!(custom_setup_outcome("\n\n", ""), SetupOutcome::Warning(_)));
        assert_eq!(
            custom_setup_outcome("htop\n", ""),
            SetupOutcome::Initiated("Custom setup initiated. This may take a few minutes.".into())
        );
        assert!(matches!(
            custom_setup_outcome("", "echo hi"),
            SetupOutcome::Initiated(_)
        ));
    }

    #[test]
    fn packages_are_one_per_line() {
        assert_eq!(parse_packages(" git \n\ncurl\n"), vec!["git", "curl"]);
    }

    #[test]
    fn package_manager_follows_os() {
        assert_eq!(PACKAGE_MANAGERS[default_package_manager(OsFamily::Fedora) as usize], "dnf (Fedora/RHEL)");
        assert_eq!(PACKAGE_MANAGERS[default_package_manager(OsFamily::PopOs) as usize], "apt (Debian/Ubuntu)");
        assert_eq!(PACKAGE_MANAGERS[default_package_manager(OsFamily::Mac) as usize], "brew (macOS)");
    }

    #[test]
    fn defaults_match_a_typical_lab() {
        let on: Vec<_> = DEV_TOOLS.iter().filter(|(_, _, on)| *on).map(|(n, _, _)| *n).collect();
        assert_eq!(on, vec!["Git", "Podman"]);
        let ((python, _, python_on), _) = LANGUAGES[0];
        assert_eq!(python, "Python");
        assert!(python_on);
    }
}
