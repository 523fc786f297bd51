//! Page builders. Each takes the application state explicitly and returns
//! the page widget; control calls go through `LauncherWindow::run_blocking`.

pub mod exit;
pub mod home;
pub mod lab_setup;
pub mod local_ai;

use std::{cell::RefCell, sync::Arc};

use adw::prelude::*;
use gtk::glib;

use crate::{
    backends::ContainerStatus, gettext_f, i18n::gettext, monitor::CommandOutcome,
    widgets::LauncherWindow,
};

pub(crate) fn status_dot(status: ContainerStatus) -> gtk::Widget {
    let dot = gtk::Box::new(gtk::Orientation::Horizontal, 0);
    dot.add_css_class("status-dot");
    dot.add_css_class(status.as_str());
    dot.set_valign(gtk::Align::Center);
    dot.set_tooltip_text(Some(status.as_str()));
    dot.upcast()
}

pub(crate) fn icon_button(icon_name: &str, tooltip: &str) -> gtk::Button {
    let button = gtk::Button::from_icon_name(icon_name);
    button.set_tooltip_text(Some(tooltip));
    button.set_valign(gtk::Align::Center);
    button.add_css_class("flat");
    button
}

pub(crate) fn scrolled(child: &impl IsA<gtk::Widget>) -> gtk::ScrolledWindow {
    gtk::ScrolledWindow::builder()
        .hscrollbar_policy(gtk::PolicyType::Never)
        .vexpand(true)
        .child(child)
        .build()
}

/// Toast text for the result of a control call on `target`.
pub(crate) fn outcome_message(action: &str, target: &str, outcome: &CommandOutcome) -> String {
    if outcome.success {
        gettext_f!("{action} {target}: done", "action" => action, "target" => target)
    } else {
        let reason = outcome.output.lines().next().unwrap_or_default();
        gettext_f!(
            "{action} {target} failed: {reason}",
            "action" => action,
            "target" => target,
            "reason" => reason
        )
    }
}

pub(crate) fn report_outcome(
    window: &LauncherWindow,
    action: &str,
    target: &str,
    outcome: &CommandOutcome,
) {
    window.toast(&outcome_message(action, target, outcome));
}

/// Drains `receiver` on the main loop while `widget` is alive.
pub(crate) fn follow<T: 'static, W: IsA<glib::Object>>(
    receiver: async_channel::Receiver<T>,
    widget: &W,
    update: impl Fn(&W, T) + 'static,
) {
    let weak = widget.downgrade();
    glib::spawn_future_local(async move {
        while let Ok(value) = receiver.recv().await {
            let Some(widget) = weak.upgrade() else {
                break;
            };
            update(&widget, value);
        }
    });
}

/// Like [`follow`], but skips values equal to the last one seen.
pub(crate) fn follow_changes<T: PartialEq + 'static, W: IsA<glib::Object>>(
    receiver: async_channel::Receiver<Arc<T>>,
    widget: &W,
    initial: Arc<T>,
    update: impl Fn(&W, &T) + 'static,
) {
    let last = RefCell::new(initial);
    follow(receiver, widget, move |widget, value: Arc<T>| {
        if *last.borrow() == value {
            return;
        }
        update(widget, &value);
        last.replace(value);
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_messages() {
        let ok = CommandOutcome {
            success: true,
            output: "abc".into(),
        };
        assert_eq!(outcome_message("Start", "ollama", &ok), "Start ollama: done");
        let failed = CommandOutcome {
            success: false,
            output: "Error: No such container: nope\nmore".into(),
        };
        assert_eq!(
            outcome_message("Stop", "nope", &failed),
            "Stop nope failed: Error: No such container: nope"
        );
    }
}
