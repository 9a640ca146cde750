//! Killer: a dead-man's switch for the host it runs on.
//!
//! Samples Bluetooth, USB, mains power, battery, optical tray and wired
//! link state on a fixed interval, compares each against an operator
//! whitelist, and forces an immediate power-off on the first deviation.
//!
//! See `DESIGN.md` for the module map.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod canonical;
pub mod channel;
pub mod config;
pub mod logging;

pub mod matcher;
pub mod probes;

pub mod guard;
pub mod kill;

pub mod inspect;
