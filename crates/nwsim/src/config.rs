// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Device-wide configuration - single source of truth.
//!
//! This module centralizes the physical constants of the modelled SoC and
//! the runtime knobs taken from the command line. Peripheral code must take
//! its constants from here rather than re-deriving them locally.

use crate::time::Instant;

/// Fractional bits of the sub-microsecond fixed-point representation used
/// by the RTC (and anything else that must track the 32.768 kHz domain
/// without accumulating rounding error).
pub const SUB_US_BITS: u32 = 9;

/// One LF clock period (1e6 / 32768 us) in sub-microsecond units.
pub const LF_CLOCK_PERIOD_SUBUS: u64 = 15625;

/// The RTC counter width mask (24 bits).
pub const RTC_COUNTER_MASK: u32 = 0x00FF_FFFF;

/// Counter value loaded by the RTC TRIGOVRFLW task.
pub const RTC_TRIGGER_OVERFLOW_COUNTER_VALUE: u32 = 0x00FF_FFF0;

/// Default inter-frame space, microseconds (the RADIO TIFS register reset).
pub const DEFAULT_TIFS: u32 = 0;

/// 802.15.4 symbol time in microseconds (used by the CCA/ED procedures).
pub const SYMBOL_TIME_154: u64 = 16;

/// How far (in device microseconds) the device may run ahead of the last
/// known Phy sync point before an explicit `wait` is sent.
pub const DEFAULT_MAX_RESYNC_OFFSET: u64 = 1_000_000;

/// Base of the simulated RAM image pointer-valued MMIO fields resolve into.
pub const DEV_RAM_BASE: u32 = 0x2000_0000;

/// Size of the simulated RAM image, bytes.
pub const DEV_RAM_SIZE: usize = 256 * 1024;

/// Which event-routing fabric the device variant carries.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum FabricKind {
    /// Fixed 1:1 channels with EEP/TEP address registers (older variants).
    Ppi,
    /// Distributed publish/subscribe channels (newer variants).
    Dppi,
}

/// Runtime arguments of one simulated device (the command-line surface).
#[derive(Clone, Debug)]
pub struct DeviceArgs {
    /// Device-local clock offset relative to Phy time at boot, in
    /// microseconds (sub-microsecond precision allowed).
    pub start_offset: f64,
    /// Linear crystal-oscillator drift coefficient (e.g. -30e-6 for -30ppm).
    pub xo_drift: f64,
    /// Run the real AES primitives for CCM/AAR. When off, a pass-through
    /// keystream is substituted: payloads cross the air in plain text with
    /// an all-zeros MIC, but every length and timing stays identical.
    pub real_encryption: bool,
    /// Do not talk to a Phy at all. Any attempted radio activity is a
    /// fatal error; useful to run firmware with no on-air traffic.
    pub nosim: bool,
}

impl Default for DeviceArgs {
    fn default() -> Self {
        Self {
            start_offset: 0.0,
            xo_drift: 0.0,
            real_encryption: false,
            nosim: false,
        }
    }
}

/// Full configuration of one simulated device.
#[derive(Clone, Debug)]
pub struct DeviceConfig {
    pub args: DeviceArgs,
    pub fabric: FabricKind,
    /// Explicit `wait` threshold towards the Phy, device microseconds.
    pub max_resync_offset: Instant,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            args: DeviceArgs::default(),
            fabric: FabricKind::Ppi,
            max_resync_offset: DEFAULT_MAX_RESYNC_OFFSET,
        }
    }
}
