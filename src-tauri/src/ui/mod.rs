#[cfg(feature = "desktop")]
pub mod commands;
pub mod selection;
pub mod view;

pub use selection::{Choices, Control, Selection};
pub use view::{LogView, MeterView};
