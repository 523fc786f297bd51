use crate::fakers::{CommandRunner, CommandRunnerEvent};
use crate::i18n::gettext;
use adw::prelude::*;
use adw::subclass::prelude::*;
use gtk::{gdk, glib};
use std::cell::OnceCell;

/// Title, icon and css class of a command log row.
pub fn describe_event(event: &CommandRunnerEvent) -> (String, &'static str, &'static str) {
    match event {
        CommandRunnerEvent::Started(id, _) => {
            (format!("Started [{id}]"), "system-run-symbolic", "started")
        }
        CommandRunnerEvent::Output(id, Ok(Some(0))) => (
            format!("Completed [{id}]"),
            "object-select-symbolic",
            "success",
        ),
        CommandRunnerEvent::Output(id, Ok(Some(code))) => (
            format!("Exited with {code} [{id}]"),
            "dialog-warning-symbolic",
            "warning",
        ),
        CommandRunnerEvent::Output(id, Ok(None)) => (
            format!("Killed by a signal [{id}]"),
            "dialog-warning-symbolic",
            "warning",
        ),
        CommandRunnerEvent::Output(id, Err(())) => {
            (format!("Failed [{id}]"), "dialog-error-symbolic", "error")
        }
    }
}

mod imp {
    use super::*;

    #[derive(Default)]
    pub struct CommandLogDialog {
        pub runner: OnceCell<CommandRunner>,
        pub toast_overlay: adw::ToastOverlay,
        pub list_box: gtk::ListBox,
    }

    #[glib::object_subclass]
    impl ObjectSubclass for CommandLogDialog {
        const NAME: &'static str = "CommandLogDialog";
        type Type = super::CommandLogDialog;
        type ParentType = adw::Dialog;
    }

    impl ObjectImpl for CommandLogDialog {
        fn constructed(&self) {
            self.parent_constructed();
            let obj = self.obj();

            obj.set_title(&gettext("Command Log"));
            obj.set_content_width(800);
            obj.set_content_height(600);

            let toolbar_view = adw::ToolbarView::new();
            let header_bar = adw::HeaderBar::new();
            header_bar.set_title_widget(Some(&adw::WindowTitle::new(&gettext("Command Log"), "")));
            toolbar_view.add_top_bar(&header_bar);

            let scrolled_window = gtk::ScrolledWindow::new();
            scrolled_window.set_policy(gtk::PolicyType::Never, gtk::PolicyType::Automatic);
            scrolled_window.set_vexpand(true);

            let content_box = gtk::Box::new(gtk::Orientation::Vertical, 6);
            content_box.set_margin_start(12);
            content_box.set_margin_end(12);
            content_box.set_margin_top(12);
            content_box.set_margin_bottom(12);

            let description = gtk::Label::new(Some(&gettext(
                "Every engine and hardware probe command run by the application, in order. Click a command to copy it.",
            )));
            description.set_wrap(true);
            description.set_xalign(0.0);
            description.add_css_class("dim-label");
            content_box.append(&description);

            self.list_box.set_selection_mode(gtk::SelectionMode::None);
            self.list_box.add_css_class("boxed-list");
            content_box.append(&self.list_box);

            scrolled_window.set_child(Some(&content_box));
            self.toast_overlay.set_child(Some(&scrolled_window));
            toolbar_view.set_content(Some(&self.toast_overlay));
            obj.set_child(Some(&toolbar_view));
        }
    }

    impl WidgetImpl for CommandLogDialog {}
    impl AdwDialogImpl for CommandLogDialog {}
}

glib::wrapper! {
    pub struct CommandLogDialog(ObjectSubclass<imp::CommandLogDialog>)
        @extends adw::Dialog, gtk::Widget,
        @implements gtk::Accessible, gtk::Buildable, gtk::ConstraintTarget;
}

impl CommandLogDialog {
    pub fn new(runner: CommandRunner) -> Self {
        let this: Self = glib::Object::new();
        let _ = this.imp().runner.set(runner);
        this.populate_command_list();
        this
    }

    fn populate_command_list(&self) {
        let Some(runner) = self.imp().runner.get() else {
            return;
        };
        let events = runner.output_tracker().items();
        if events.is_empty() {
            let row = adw::ActionRow::builder()
                .title(gettext("No commands recorded yet"))
                .build();
            self.imp().list_box.append(&row);
        }
        for event in &events {
            self.imp().list_box.append(&self.build_event_row(event));
        }
    }

    fn build_event_row(&self, event: &CommandRunnerEvent) -> gtk::ListBoxRow {
        let (title, icon_name, css_class) = describe_event(event);

        let row = gtk::ListBoxRow::new();
        let row_box = gtk::Box::new(gtk::Orientation::Horizontal, 8);
        row_box.set_margin_start(6);
        row_box.set_margin_end(6);
        row_box.set_margin_top(3);
        row_box.set_margin_bottom(3);

        let status_icon = gtk::Image::from_icon_name(icon_name);
        status_icon.add_css_class(css_class);
        status_icon.set_pixel_size(12);
        row_box.append(&status_icon);

        let label_box = gtk::Box::new(gtk::Orientation::Vertical, 0);
        let title_label = gtk::Label::new(Some(&title));
        title_label.set_xalign(0.0);
        title_label.add_css_class("caption");
        label_box.append(&title_label);

        if let Some(command) = event.command() {
            let command_str = command.to_string();
            let subtitle_label = gtk::Label::new(Some(&command_str));
            subtitle_label.set_xalign(0.0);
            subtitle_label.add_css_class("caption");
            subtitle_label.add_css_class("dim-label");
            subtitle_label.set_ellipsize(gtk::pango::EllipsizeMode::End);
            label_box.append(&subtitle_label);

            let toast_overlay = &self.imp().toast_overlay;
            let gesture = gtk::GestureClick::new();
            gesture.connect_pressed(glib::clone!(
                #[weak]
                toast_overlay,
                move |_, _, _, _| {
                    if let Some(display) = gdk::Display::default() {
                        display.clipboard().set_text(&command_str);
                        toast_overlay
                            .add_toast(adw::Toast::new(&gettext("Command copied to clipboard")));
                    }
                }
            ));
            row.add_controller(gesture);
        }

        row_box.append(&label_box);
        row.set_child(Some(&row_box));
        row
    }
}
