#![forbid(unsafe_code)]

//! Platform plumbing shared by the MT6765 peripheral models: deterministic virtual time,
//! interrupt lines, reset requests and MMIO register decoding.

pub mod irq;
pub mod mmio;
pub mod reset;
pub mod time;
