//! 🚌 Trips -- the part of the pipeline with actual opinions.
//!
//! A [`TripRecord`] is everything we know about one vehicle run: which stop it last confirmed,
//! the attributes that never change (route, direction, vehicle), and a time series of stop
//! arrivals. The feed only ever tells us about one stop at a time and happily skips a few between
//! polls, so the record fills in the gaps by interpolation against the timetable's stop list.
//!
//! The [`TripRegistry`] keeps the records alive across cycles and decides, every cycle, which
//! trips have vanished from the feed and are therefore finished.
//!
//! 🦆 The duck has a monthly pass.

mod record;
mod registry;

pub use record::{SerializedTrip, TripRecord, TripSeries};
pub use registry::TripRegistry;
