/* main.rs
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

mod app_state;
mod application;
mod backends;
mod config;
mod dialogs;
mod env_file;
mod fakers;
mod hardware;
mod i18n;
mod monitor;
mod pages;
mod services;
mod widgets;

use std::{fs::OpenOptions, sync::Mutex};

use anyhow::Context;

use self::application::SingularityLauncherApplication;
use app_state::Backend;
use config::{APP_ID, AppConfig, ConfigError, GETTEXT_PACKAGE, LOCALEDIR, LOG_FILE_NAME};
use gettextrs::{bind_textdomain_codeset, bindtextdomain, textdomain};
use gtk::prelude::*;
use gtk::{gio, glib};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

fn init_tracing(debug_mode: bool) {
    let default_level = if debug_mode { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let log_dir = glib::user_data_dir();
    let file_layer = std::fs::create_dir_all(&log_dir)
        .and_then(|_| {
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(log_dir.join(LOG_FILE_NAME))
        })
        .ok()
        .map(|file| fmt::layer().with_ansi(false).with_writer(Mutex::new(file)));

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(file_layer)
        .with(filter)
        .init();
}

fn setup_translations() -> anyhow::Result<()> {
    bindtextdomain(GETTEXT_PACKAGE, LOCALEDIR)
        .with_context(|| format!("binding {GETTEXT_PACKAGE} to {LOCALEDIR}"))?;
    bind_textdomain_codeset(GETTEXT_PACKAGE, "UTF-8").context("setting the codeset")?;
    textdomain(GETTEXT_PACKAGE).context("selecting the text domain")?;
    Ok(())
}

fn main() -> glib::ExitCode {
    // Read the configuration first, the debug flag decides the log level
    let config_path = AppConfig::default_path();
    let loaded: Result<Option<AppConfig>, ConfigError> = AppConfig::from_file(&config_path);
    let config = match &loaded {
        Ok(Some(config)) => config.clone(),
        _ => AppConfig::default(),
    };

    init_tracing(config.debug_mode);
    info!(version = config::VERSION, "Starting Singularity Launcher");
    match loaded {
        Ok(Some(_)) => info!(path = %config_path.display(), "Loaded configuration"),
        Ok(None) => info!(path = %config_path.display(), "No configuration file, using defaults"),
        Err(e) => warn!(error = %e, "Ignoring configuration file"),
    }

    if let Err(e) = setup_translations() {
        warn!(error = %format!("{e:#}"), "Translations unavailable");
    }

    let app = SingularityLauncherApplication::new(
        APP_ID,
        &gio::ApplicationFlags::empty(),
        config,
        Backend::from_env(),
    );

    app.run()
}
