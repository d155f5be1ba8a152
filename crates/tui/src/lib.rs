mod app;
mod confirm;
pub mod event;
mod ui;

pub use app::{App, Notice};
pub use confirm::ConfirmDialog;
