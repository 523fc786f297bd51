/* window.rs
 *
 * Copyright 2025 The Singularity Launcher Authors
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with this program.  If not, see <https://www.gnu.org/licenses/>.
 *
 * SPDX-License-Identifier: GPL-3.0-or-later
 */

use crate::app_state::AppState;
use crate::dialogs::{CommandLogDialog, OutputDialog};
use crate::i18n::gettext;
use crate::pages;
use adw::prelude::*;
use adw::subclass::prelude::*;
use gtk::gio::ActionEntry;
use gtk::{gdk, gio, glib};
use std::cell::OnceCell;
use tracing::info;

mod imp {
    use super::*;

    #[derive(Default)]
    pub struct LauncherWindow {
        pub state: OnceCell<AppState>,
        pub toast_overlay: adw::ToastOverlay,
        pub view_stack: adw::ViewStack,
    }

    #[glib::object_subclass]
    impl ObjectSubclass for LauncherWindow {
        const NAME: &'static str = "LauncherWindow";
        type Type = super::LauncherWindow;
        type ParentType = adw::ApplicationWindow;

        fn class_init(klass: &mut Self::Class) {
            klass.add_binding_action(gdk::Key::F5, gdk::ModifierType::empty(), "win.refresh");
            klass.add_binding_action(
                gdk::Key::L,
                gdk::ModifierType::CONTROL_MASK,
                "win.command-log",
            );
        }
    }

    impl ObjectImpl for LauncherWindow {}
    impl WidgetImpl for LauncherWindow {}
    impl WindowImpl for LauncherWindow {}
    impl ApplicationWindowImpl for LauncherWindow {}
    impl AdwApplicationWindowImpl for LauncherWindow {}
}

glib::wrapper! {
    pub struct LauncherWindow(ObjectSubclass<imp::LauncherWindow>)
        @extends gtk::Widget, gtk::Window, gtk::ApplicationWindow, adw::ApplicationWindow, gtk::ShortcutManager, gtk::Root, gtk::Native,
        @implements gio::ActionGroup, gio::ActionMap, gtk::Accessible, gtk::Buildable, gtk::ConstraintTarget;
}

impl LauncherWindow {
    pub fn new<P: IsA<gtk::Application>>(application: &P, state: AppState) -> Self {
        let this: Self = glib::Object::builder()
            .property("application", application)
            .property("title", "Singularity Launcher")
            .build();
        this.set_default_size(1100, 800);
        let _ = this.imp().state.set(state);

        this.setup_gactions();
        this.build_ui();

        this.state().start_polling();
        this.connect_close_request(move |this| {
            this.state().stop_polling();
            glib::Propagation::Proceed
        });

        this
    }

    pub fn state(&self) -> &AppState {
        self.imp()
            .state
            .get()
            .expect("LauncherWindow is always constructed with a state")
    }

    fn build_ui(&self) {
        let imp = self.imp();
        let state = self.state();
        let view_stack = &imp.view_stack;

        let home = pages::home::build(state, self);
        view_stack
            .add_titled_with_icon(&home, Some("home"), &gettext("Home"), "go-home-symbolic");
        let lab_setup = pages::lab_setup::build(state, self);
        view_stack.add_titled_with_icon(
            &lab_setup,
            Some("lab-setup"),
            &gettext("Lab Setup"),
            "applications-engineering-symbolic",
        );
        let local_ai = pages::local_ai::build(state, self);
        view_stack.add_titled_with_icon(
            &local_ai,
            Some("local-ai"),
            &gettext("Local AI"),
            "applications-science-symbolic",
        );
        let exit = pages::exit::build(state, self);
        view_stack.add_titled_with_icon(
            &exit,
            Some("exit"),
            &gettext("Exit"),
            "application-exit-symbolic",
        );

        let header_bar = adw::HeaderBar::new();
        let switcher = adw::ViewSwitcher::builder()
            .stack(view_stack)
            .policy(adw::ViewSwitcherPolicy::Wide)
            .build();
        header_bar.set_title_widget(Some(&switcher));

        let menu = gio::Menu::new();
        menu.append(Some(&gettext("Refresh Containers")), Some("win.refresh"));
        menu.append(Some(&gettext("Command Log")), Some("win.command-log"));
        menu.append(Some(&gettext("About Singularity Launcher")), Some("app.about"));
        let menu_button = gtk::MenuButton::builder()
            .icon_name("open-menu-symbolic")
            .menu_model(&menu)
            .primary(true)
            .build();
        header_bar.pack_end(&menu_button);

        let engine = &state.system.engine;
        let engine_label = gtk::Label::new(Some(&if engine.available {
            format!("{} {}", engine.name, engine.version)
        } else {
            gettext("No container engine")
        }));
        engine_label.add_css_class("dim-label");
        engine_label.add_css_class("caption");
        header_bar.pack_start(&engine_label);

        let toolbar_view = adw::ToolbarView::new();
        toolbar_view.add_top_bar(&header_bar);
        imp.toast_overlay.set_child(Some(view_stack));
        toolbar_view.set_content(Some(&imp.toast_overlay));
        self.set_content(Some(&toolbar_view));
    }

    fn setup_gactions(&self) {
        let a = ActionEntry::builder;

        let actions = [
            a("refresh").activate(move |this: &LauncherWindow, _, _| {
                let state = this.state().clone();
                this.run_blocking(
                    move || state.containers.refresh(),
                    |this, refreshed| {
                        if !refreshed {
                            this.add_toast(adw::Toast::new(&gettext("Could not list containers")));
                        }
                    },
                );
            }),
            a("command-log").activate(|this: &LauncherWindow, _, _| {
                CommandLogDialog::new(this.state().runner.clone()).present(Some(this));
            }),
        ];
        self.add_action_entries(actions.into_iter().map(|entry| entry.build()));
    }

    pub fn add_toast(&self, toast: adw::Toast) {
        self.imp().toast_overlay.add_toast(toast);
    }

    pub fn toast(&self, message: &str) {
        self.add_toast(adw::Toast::new(message));
    }

    pub fn show_page(&self, name: &str) {
        self.imp().view_stack.set_visible_child_name(name);
    }

    pub fn show_output(&self, title: &str, output: &str) {
        OutputDialog::new(title, output).present(Some(self));
    }

    /// Runs `work` on a worker thread, then `done` on the main loop if the
    /// window is still alive.
    pub fn run_blocking<T: Send + 'static>(
        &self,
        work: impl FnOnce() -> T + Send + 'static,
        done: impl FnOnce(&LauncherWindow, T) + 'static,
    ) {
        let weak = self.downgrade();
        glib::spawn_future_local(async move {
            match gio::spawn_blocking(work).await {
                Ok(value) => {
                    if let Some(this) = weak.upgrade() {
                        done(&this, value);
                    }
                }
                Err(_) => tracing::error!("Background task panicked"),
            }
        });
    }

    pub fn open_uri(&self, uri: &str) {
        info!(uri, "Opening service");
        let weak = self.downgrade();
        gtk::UriLauncher::new(uri).launch(
            Some(self),
            None::<&gio::Cancellable>,
            move |res| {
                if let Err(e) = res {
                    tracing::error!(error = %e, "Failed to open URL");
                    if let Some(this) = weak.upgrade() {
                        this.toast(&gettext("Could not open the service URL"));
                    }
                }
            },
        );
    }
}
