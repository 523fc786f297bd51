/* application.rs
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

use std::cell::{OnceCell, RefCell};

use adw::prelude::*;
use adw::subclass::prelude::*;
use gettextrs::gettext;
use gtk::{gdk, gio, glib};
use tracing::error;

use crate::app_state::{AppState, Backend};
use crate::config::{APP_ID, AppConfig, VERSION};
use crate::widgets::LauncherWindow;

const CSS: &str = "
    .status-dot {
        min-width: 10px;
        min-height: 10px;
        border-radius: 9999px;
        background-color: alpha(@borders, 0.5);
    }
    .status-dot.running {
        background-color: @success_color;
    }
    .status-dot.stopped {
        background-color: @error_color;
    }

    .service-card {
        padding: 12px;
        min-width: 200px;
    }
    .service-logo {
        font-size: 36px;
    }

    .output {
        border-radius: 12px;
        border: 1px solid @borders;
    }
    .output-terminal {
        padding: 12px;
    }

    button.xs {
        font-size: 0.8em;
        padding: 0.2em 0.2em;
    }
";

mod imp {
    use super::*;

    #[derive(Default)]
    pub struct SingularityLauncherApplication {
        pub config: OnceCell<AppConfig>,
        pub backend: OnceCell<Backend>,
        pub state: RefCell<Option<AppState>>,
    }

    #[glib::object_subclass]
    impl ObjectSubclass for SingularityLauncherApplication {
        const NAME: &'static str = "SingularityLauncherApplication";
        type Type = super::SingularityLauncherApplication;
        type ParentType = adw::Application;
    }

    impl ObjectImpl for SingularityLauncherApplication {
        fn constructed(&self) {
            self.parent_constructed();
            let obj = self.obj();
            obj.setup_gactions();
            obj.set_accels_for_action("app.quit", &["<primary>q"]);
        }
    }

    impl ApplicationImpl for SingularityLauncherApplication {
        // Creates the window on first launch; a second instance only
        // presents the existing one.
        fn activate(&self) {
            let provider = gtk::CssProvider::new();
            provider.load_from_string(CSS);
            match gdk::Display::default() {
                Some(display) => gtk::style_context_add_provider_for_display(
                    &display,
                    &provider,
                    gtk::STYLE_PROVIDER_PRIORITY_APPLICATION,
                ),
                None => error!("Could not connect to a display"),
            }

            let this = self.obj().clone();
            let window = this
                .active_window()
                .unwrap_or_else(|| this.recreate_window().upcast());
            window.present();
        }

        fn shutdown(&self) {
            if let Some(state) = self.state.borrow().as_ref() {
                state.stop_polling();
            }
            self.parent_shutdown();
        }
    }

    impl GtkApplicationImpl for SingularityLauncherApplication {}
    impl AdwApplicationImpl for SingularityLauncherApplication {}
}

glib::wrapper! {
    pub struct SingularityLauncherApplication(ObjectSubclass<imp::SingularityLauncherApplication>)
        @extends gio::Application, gtk::Application, adw::Application,
        @implements gio::ActionGroup, gio::ActionMap;
}

impl SingularityLauncherApplication {
    pub fn new(
        application_id: &str,
        flags: &gio::ApplicationFlags,
        config: AppConfig,
        backend: Backend,
    ) -> Self {
        let this: Self = glib::Object::builder()
            .property("application-id", application_id)
            .property("flags", flags)
            .build();
        let _ = this.imp().config.set(config);
        let _ = this.imp().backend.set(backend);
        this
    }

    fn recreate_window(&self) -> adw::ApplicationWindow {
        let imp = self.imp();
        let config = imp.config.get().cloned().unwrap_or_default();
        let backend = imp.backend.get().copied().unwrap_or_default();

        if let Some(old) = imp.state.take() {
            old.stop_polling();
        }
        let state = AppState::new(config, backend);
        imp.state.replace(Some(state.clone()));

        let window = LauncherWindow::new(self.upcast_ref::<adw::Application>(), state);
        window.upcast()
    }

    fn setup_gactions(&self) {
        let quit_action = gio::ActionEntry::builder("quit")
            .activate(move |app: &Self, _, _| app.quit())
            .build();
        let about_action = gio::ActionEntry::builder("about")
            .activate(move |app: &Self, _, _| app.show_about())
            .build();
        self.add_action_entries([quit_action, about_action]);
    }

    fn show_about(&self) {
        let Some(window) = self.active_window() else {
            return;
        };
        let about = adw::AboutDialog::builder()
            .application_name("Singularity Launcher")
            .application_icon(APP_ID)
            .version(VERSION)
            .comments(gettext(
                "Hardware overview, live performance and local AI containers in one place",
            ))
            // Translators: Replace "translator-credits" with your name/username, and optionally an email or URL.
            .translator_credits(gettext("translator-credits"))
            .license_type(gtk::License::Gpl30)
            .build();

        about.present(Some(&window));
    }
}
