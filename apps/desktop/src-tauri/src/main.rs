//! # Stride Desktop Application Entry Point
//!
//! The actual setup is in lib.rs so tests can drive the host without a
//! window.

// Prevents an additional console window on Windows in release
#![cfg_attr(
    all(not(debug_assertions), target_os = "windows"),
    windows_subsystem = "windows"
)]

fn main() {
    if let Err(e) = stride_desktop_lib::run() {
        eprintln!("stride: {e}");
        std::process::exit(1);
    }
}
