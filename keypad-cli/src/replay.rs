//! Run the real scanner against the simulated expander.
//!
//! Time is virtual: only the debounce waits advance the clock, bus traffic
//! is treated as instantaneous.

use anyhow::{anyhow, Result};
use keypad_core::keypad::RELEASED;
use keypad_core::pca9555::PCA9555_ADDRESS;
use keypad_core::sim::{BusStats, SimTwi, VirtualClock};
use keypad_core::{Pca9555, Scanner, TwiConfig, TwiMaster};

/// Keys reported by one rising-edge scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event {
    /// Virtual time at which the scan returned.
    pub at_ms: u64,
    /// Edge mask, 0 = newly pressed.
    pub edges: u16,
}

#[derive(Debug)]
pub struct Report {
    pub events: Vec<Event>,
    /// Number of rising-edge scans performed.
    pub scans: usize,
    pub stats: BusStats,
}

/// Feed `frames` through `scan_keypad_rising_edge`, two frames per call.
///
/// `busy` makes the expander NACK that many address phases first.
pub fn replay(frames: &[u16], busy: u32) -> Result<Report> {
    let mut sim = SimTwi::with_keypad(PCA9555_ADDRESS, frames);
    sim.set_busy(busy);

    let mut bus = TwiMaster::new(sim);
    bus.init(&TwiConfig::default())
        .map_err(|err| anyhow!("configuring TWI: {}", err))?;

    let mut scanner = Scanner::new(Pca9555::new(bus), VirtualClock::new());
    scanner
        .init()
        .map_err(|err| anyhow!("configuring PCA9555: {}", err))?;

    let scans = frames.len().div_ceil(2);
    let mut events = Vec::new();
    for _ in 0..scans {
        let edges = scanner.scan_keypad_rising_edge();
        if edges != RELEASED {
            events.push(Event {
                at_ms: scanner.delay().elapsed_ms(),
                edges,
            });
        }
    }

    Ok(Report {
        events,
        scans,
        stats: scanner.expander().bus().registers().stats(),
    })
}
