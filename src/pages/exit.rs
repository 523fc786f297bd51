use adw::prelude::*;
use gtk::glib;
use tracing::{info, warn};

use crate::{
    app_state::AppState, gettext_f, i18n::gettext, monitor::CommandOutcome,
    widgets::LauncherWindow,
};

/// Summary toast after stopping everything before exit.
pub(crate) fn stop_all_summary(results: &[(String, CommandOutcome)]) -> String {
    let failed = results.iter().filter(|(_, o)| !o.success).count();
    if results.is_empty() {
        gettext("No running containers")
    } else if failed == 0 {
        gettext_f!("Stopped {count} containers", "count" => results.len())
    } else {
        gettext_f!(
            "Stopped {ok} of {count} containers",
            "ok" => results.len() - failed,
            "count" => results.len()
        )
    }
}

fn stop_all_and_quit(window: &LauncherWindow, state: &AppState, button: &gtk::Button) {
    button.set_sensitive(false);
    window.toast(&gettext("Stopping all containers…"));
    let state = state.clone();
    window.run_blocking(
        move || state.containers.stop_all_running(),
        |window, results| {
            for (id, outcome) in &results {
                if outcome.success {
                    info!(container = %id, "Stopped container before exit");
                } else {
                    warn!(container = %id, output = %outcome.output, "Failed to stop container");
                }
            }
            info!("{}", stop_all_summary(&results));
            window.close();
        },
    );
}

pub fn build(state: &AppState, window: &LauncherWindow) -> gtk::Widget {
    let keep = gtk::Button::builder()
        .label(gettext("Keep Containers Running"))
        .build();
    keep.add_css_class("pill");
    keep.add_css_class("suggested-action");
    keep.connect_clicked(glib::clone!(
        #[weak]
        window,
        move |_| {
            info!("Exiting, containers keep running");
            window.close();
        }
    ));

    let stop = gtk::Button::builder()
        .label(gettext("Stop All Containers"))
        .build();
    stop.add_css_class("pill");
    stop.add_css_class("destructive-action");
    stop.connect_clicked(glib::clone!(
        #[weak]
        window,
        #[strong]
        state,
        move |button| stop_all_and_quit(&window, &state, button)
    ));

    let cancel = gtk::Button::builder().label(gettext("Cancel")).build();
    cancel.add_css_class("pill");
    cancel.connect_clicked(glib::clone!(
        #[weak]
        window,
        move |_| window.show_page("home")
    ));

    let buttons = gtk::Box::new(gtk::Orientation::Vertical, 12);
    buttons.set_halign(gtk::Align::Center);
    buttons.append(&keep);
    buttons.append(&stop);
    buttons.append(&cancel);

    adw::StatusPage::builder()
        .icon_name("system-log-out-symbolic")
        .title(gettext("Exit Singularity Launcher"))
        .description(gettext(
            "Containers can keep running in the background, or be stopped before exiting.",
        ))
        .child(&buttons)
        .build()
        .upcast()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(success: bool) -> CommandOutcome {
        CommandOutcome {
            success,
            output: String::new(),
        }
    }

    #[test]
    fn summarizes_stop_results() {
        assert_eq!(stop_all_summary(&[]), "No running containers");
        assert_eq!(
            stop_all_summary(&[("a".into(), outcome(true)), ("b".into(), outcome(true))]),
            "Stopped 2 containers"
        );
        assert_eq!(
            stop_all_summary(&[("a".into(), outcome(true)), ("b".into(), outcome(false))]),
            "Stopped 1 of 2 containers"
        );
    }
}
