//! Computer use - desktop automation MCP server for Linux
//!
//! This library provides an MCP (Model Context Protocol) server that lets
//! AI assistants see and drive a desktop the way a person would.
//!
//! ## Features
//!
//! - Mouse input (click, right-click, move, drag) and keyboard input
//! - Full-screen and per-window screenshots, downscaled to a response budget
//! - OCR with absolute screen coordinates
//! - Window listing and activation by fuzzy or regex title match
//!
//! ## Supported Environments
//!
//! - X11 (native)
//! - XWayland, with KWin scripting for activation on KDE Plasma
//!
//! Input goes through `ydotool` and OCR through the `tesseract` CLI.

pub mod backend;
pub mod core;
pub mod desktop;
pub mod input;
pub mod ocr;
pub mod screenshot;
pub mod server;
