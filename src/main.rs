mod audio;
mod calculator;
mod config;
mod error;
mod tone;
mod ui;

use gtk::prelude::*;
use gtk::{gio, glib, Application};
use tracing::warn;
use tracing_subscriber::EnvFilter;

const APP_ID: &str = "com.keypad_calc.Calculator";

fn main() -> glib::ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = config::Config::load().unwrap_or_else(|e| {
        warn!(error = %e, "could not load config, using defaults");
        config::Config::default()
    });

    let app = Application::builder()
        .application_id(APP_ID)
        .flags(gio::ApplicationFlags::NON_UNIQUE)
        .build();

    app.connect_activate(move |app| {
        if let Some(window) = app.active_window() {
            window.present();
            return;
        }

        ui::build_ui(app, config.clone());
    });

    app.run()
}
