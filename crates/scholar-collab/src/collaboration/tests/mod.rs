mod common;
mod history;
mod reminders;
