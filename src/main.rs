// Prevents additional console window on Windows in release, DO NOT REMOVE!!
#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

fn main() {
    daybook_lib::init_logging();
    tracing::debug!(target: "daybook", "app booted");
    daybook_lib::run()
}
