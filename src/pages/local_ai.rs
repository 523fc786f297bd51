use adw::prelude::*;
use gtk::glib;
use tracing::info;

use crate::{
    app_state::AppState,
    backends::ContainerStatus,
    gettext_f,
    i18n::gettext,
    monitor::{CommandOutcome, ContainerSnapshot},
    services::{AiService, CATALOG, ServiceAction},
    widgets::LauncherWindow,
};

use super::{follow_changes, icon_button, report_outcome, scrolled, status_dot};

/// Cards only distinguish running from everything else.
pub(crate) fn card_status(service: &AiService, snapshot: &ContainerSnapshot) -> ContainerStatus {
    if service.is_running(snapshot) {
        ContainerStatus::Running
    } else {
        ContainerStatus::Stopped
    }
}

fn run_action(
    window: &LauncherWindow,
    state: &AppState,
    service: &'static AiService,
    label: &'static str,
    action: impl FnOnce(&AppState) -> CommandOutcome + Send + 'static,
) {
    let state = state.clone();
    window.run_blocking(
        move || action(&state),
        move |window, outcome| report_outcome(window, &gettext(label), service.name, &outcome),
    );
}

fn build_service(window: &LauncherWindow, state: &AppState, service: &'static AiService) {
    info!(service = service.name, platform = state.system.platform.as_str(), "Building service");
    window.toast(&gettext_f!(
        "Building {name} for {platform}…",
        "name" => service.name,
        "platform" => state.system.platform.as_str()
    ));
    let state = state.clone();
    window.run_blocking(
        move || state.build_service(service),
        move |window, outcome| {
            if outcome.success {
                window.toast(&gettext_f!("Successfully built {name}!", "name" => service.name));
            } else {
                let toast = adw::Toast::new(&gettext_f!("Failed to build {name}", "name" => service.name));
                toast.set_button_label(Some(&gettext("Show Output")));
                let output = outcome.output.clone();
                let weak = window.downgrade();
                toast.connect_button_clicked(move |_| {
                    if let Some(window) = weak.upgrade() {
                        window.show_output(
                            &gettext_f!("Build: {name}", "name" => service.name),
                            &output,
                        );
                    }
                });
                window.add_toast(toast);
            }
        },
    );
}

fn configure_url(window: &LauncherWindow, state: &AppState, service: &'static AiService) {
    let entry = gtk::Entry::builder()
        .text(state.service_url(service))
        .activates_default(true)
        .build();
    let dialog = adw::AlertDialog::builder()
        .heading(gettext_f!("{name} URL", "name" => service.name))
        .body(gettext("Address opened by the launch button"))
        .extra_child(&entry)
        .close_response("cancel")
        .default_response("save")
        .build();
    dialog.add_response("cancel", &gettext("Cancel"));
    dialog.add_response("save", &gettext("Save"));
    dialog.set_response_appearance("save", adw::ResponseAppearance::Suggested);

    let state = state.clone();
    dialog.connect_response(Some("save"), move |_, _| {
        state.set_service_url(service, &entry.text());
    });
    dialog.present(Some(window));
}

fn service_card(
    state: &AppState,
    window: &LauncherWindow,
    service: &'static AiService,
    snapshot: &ContainerSnapshot,
) -> gtk::Widget {
    let card = gtk::Box::new(gtk::Orientation::Vertical, 6);
    card.add_css_class("card");
    card.add_css_class("service-card");

    let header = gtk::CenterBox::new();
    let title = gtk::Label::new(Some(service.name));
    title.add_css_class("title-4");
    header.set_center_widget(Some(&title));
    let gear = icon_button("emblem-system-symbolic", &gettext("Configure service URL"));
    gear.add_css_class("xs");
    gear.connect_clicked(glib::clone!(
        #[weak]
        window,
        #[strong]
        state,
        move |_| configure_url(&window, &state, service)
    ));
    header.set_end_widget(Some(&gear));
    card.append(&header);

    let action = service.action(snapshot);
    let logo = gtk::Label::new(Some(service.logo));
    logo.add_css_class("service-logo");
    if let ServiceAction::Launch { .. } = action {
        let launch = gtk::Button::builder()
            .child(&logo)
            .tooltip_text(gettext("Launch Web UI"))
            .halign(gtk::Align::Center)
            .build();
        launch.add_css_class("flat");
        launch.connect_clicked(glib::clone!(
            #[weak]
            window,
            #[strong]
            state,
            move |_| window.open_uri(&state.service_url(service))
        ));
        card.append(&launch);
    } else {
        card.append(&logo);
    }

    let description = gtk::Label::new(Some(&gettext(service.description)));
    description.set_wrap(true);
    description.set_justify(gtk::Justification::Center);
    description.add_css_class("dim-label");
    card.append(&description);

    let status = card_status(service, snapshot);
    let status_box = gtk::Box::new(gtk::Orientation::Horizontal, 6);
    status_box.set_halign(gtk::Align::Center);
    status_box.append(&status_dot(status));
    status_box.append(&gtk::Label::new(Some(&match status {
        ContainerStatus::Running => gettext("Running"),
        _ => gettext("Stopped"),
    })));
    card.append(&status_box);

    let buttons = gtk::Box::new(gtk::Orientation::Horizontal, 6);
    buttons.set_halign(gtk::Align::Center);
    match action {
        ServiceAction::Launch { container_id } => {
            let open = icon_button("web-browser-symbolic", &gettext("Launch Web UI"));
            open.connect_clicked(glib::clone!(
                #[weak]
                window,
                #[strong]
                state,
                move |_| window.open_uri(&state.service_url(service))
            ));
            buttons.append(&open);

            let restart = icon_button("view-refresh-symbolic", &gettext("Restart"));
            let id = container_id.clone();
            restart.connect_clicked(glib::clone!(
                #[weak]
                window,
                #[strong]
                state,
                move |_| {
                    let id = id.clone();
                    run_action(&window, &state, service, "Restart", move |s| {
                        s.containers.restart_container(&id)
                    })
                }
            ));
            buttons.append(&restart);

            let stop = icon_button("media-playback-stop-symbolic", &gettext("Stop"));
            stop.connect_clicked(glib::clone!(
                #[weak]
                window,
                #[strong]
                state,
                move |_| {
                    let id = container_id.clone();
                    run_action(&window, &state, service, "Stop", move |s| {
                        s.containers.stop_container(&id)
                    })
                }
            ));
            buttons.append(&stop);
        }
        ServiceAction::Start { container_id } => {
            let start = icon_button("media-playback-start-symbolic", &gettext("Start container"));
            start.connect_clicked(glib::clone!(
                #[weak]
                window,
                #[strong]
                state,
                move |_| {
                    let id = container_id.clone();
                    run_action(&window, &state, service, "Start", move |s| {
                        s.containers.start_container(&id)
                    })
                }
            ));
            buttons.append(&start);
        }
        ServiceAction::Build => {
            let build = icon_button("media-playback-start-symbolic", &gettext("Start service"));
            build.connect_clicked(glib::clone!(
                #[weak]
                window,
                #[strong]
                state,
                move |button| {
                    button.set_sensitive(false);
                    build_service(&window, &state, service);
                }
            ));
            buttons.append(&build);
        }
    }
    card.append(&buttons);
    card.upcast()
}

fn fill_cards(
    flow_box: &gtk::FlowBox,
    state: &AppState,
    window: &LauncherWindow,
    snapshot: &ContainerSnapshot,
) {
    flow_box.remove_all();
    for service in CATALOG {
        flow_box.append(&service_card(state, window, service, snapshot));
    }
}

pub fn build(state: &AppState, window: &LauncherWindow) -> gtk::Widget {
    let flow_box = gtk::FlowBox::builder()
        .selection_mode(gtk::SelectionMode::None)
        .homogeneous(true)
        .min_children_per_line(1)
        .max_children_per_line(5)
        .column_spacing(12)
        .row_spacing(12)
        .valign(gtk::Align::Start)
        .margin_top(24)
        .margin_bottom(24)
        .margin_start(24)
        .margin_end(24)
        .build();
    let initial = state.containers.snapshot();
    fill_cards(&flow_box, state, window, &initial);

    let state = state.clone();
    let window = window.downgrade();
    follow_changes(
        state.containers.subscribe(),
        &flow_box,
        initial,
        move |flow_box, snapshot: &ContainerSnapshot| {
            if let Some(window) = window.upgrade() {
                fill_cards(flow_box, &state, &window, snapshot);
            }
        },
    );

    let clamp = adw::Clamp::builder()
        .maximum_size(1200)
        .child(&flow_box)
        .build();
    scrolled(&clamp).upcast()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        backends::{ContainerRecord, EngineKind},
        services::find_service,
    };

    fn record(id: &str, name: &str, status: ContainerStatus) -> (String, ContainerRecord) {
        (
            id.to_string(),
            ContainerRecord {
                id: id.into(),
                name: name.into(),
                status,
                state: String::new(),
                status_text: String::new(),
                image: String::new(),
                ports: vec![],
                engine: EngineKind::Podman,
            },
        )
    }

    #[test]
    fn unknown_counts_as_stopped() {
        let snapshot: ContainerSnapshot = [
            record("1", "sillytavern", ContainerStatus::Unknown),
            record("2", "supabase-db", ContainerStatus::Running),
        ]
        .into_iter()
        .collect();
        let tavern = find_service("sillytavern").unwrap();
        let supabase = find_service("supabase").unwrap();
        let archon = find_service("archon").unwrap();
        assert_eq!(card_status(tavern, &snapshot), ContainerStatus::Stopped);
        assert_eq!(card_status(supabase, &snapshot), ContainerStatus::Running);
        assert_eq!(card_status(archon, &snapshot), ContainerStatus::Stopped);
    }
}
