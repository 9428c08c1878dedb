pub mod json_file;
pub mod reminders;
pub mod information;

pub use information::{InformationStats, InformationStore};
pub use json_file::JsonArrayFile;
pub use reminders::{ReminderStats, ReminderStore};
