pub mod client;

pub use client::CalendarClient;
