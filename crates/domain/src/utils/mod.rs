//! Domain utility modules

pub mod ical;
