//! Deterministic virtual time utilities used by emulated devices.
//!
//! # Design
//!
//! This module provides a [`Clock`] (monotonic virtual time) and a [`TimerQueue`]
//! (one-shot deadlines driven by that virtual time).
//!
//! The queue uses **event delivery** rather than storing callbacks. Devices schedule a
//! deadline with a small copyable payload (a tag naming the device timer) and keep the returned
//! [`TimerId`]. The platform loop pops due [`TimerEvent`]s and routes each payload back to the
//! owning device, which compares the event id with the one it is holding so a stale event
//! can never fire twice.

mod clock;
mod timers;

pub use clock::{Clock, ClockState};
pub use timers::{TickRate, TimerEvent, TimerId, TimerQueue, NANOS_PER_SEC};
