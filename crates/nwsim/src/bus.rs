// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The MMIO front: peripheral base addresses of the modelled variant and
//! the 32-bit word access dispatch firmware goes through.
//!
//! The CCM and AAR are one hardware block sharing a base address and an
//! interrupt; their task/event offsets overlap, and the shared ENABLE
//! register selects which personality the block currently has. Accesses to
//! the overlapping offsets are routed by the live ENABLE value.

use crate::fabric::{dppi, ppi};
use crate::periph::{aar, ccm, clock, egu, radio, rng, rtc, temp, timer};
use crate::sim::Simulator;
use crate::Result;

pub const CLOCK_BASE: u32 = 0x4000_0000;
pub const RADIO_BASE: u32 = 0x4000_1000;
pub const TIMER0_BASE: u32 = 0x4000_8000;
pub const TIMER1_BASE: u32 = 0x4000_9000;
pub const TIMER2_BASE: u32 = 0x4000_A000;
pub const RTC0_BASE: u32 = 0x4000_B000;
pub const TEMP_BASE: u32 = 0x4000_C000;
pub const RNG_BASE: u32 = 0x4000_D000;
pub const CCM_AAR_BASE: u32 = 0x4000_F000;
pub const RTC1_BASE: u32 = 0x4001_1000;
pub const EGU0_BASE: u32 = 0x4001_4000;
pub const TIMER3_BASE: u32 = 0x4001_A000;
pub const TIMER4_BASE: u32 = 0x4001_B000;
/// PPI on the PPI variant, DPPIC on the DPPI variant.
pub const PPI_BASE: u32 = 0x4001_F000;
pub const DPPIC_BASE: u32 = PPI_BASE;
pub const RTC2_BASE: u32 = 0x4002_4000;

pub fn rtc_index(base: u32) -> Option<usize> {
    match base {
        RTC0_BASE => Some(0),
        RTC1_BASE => Some(1),
        RTC2_BASE => Some(2),
        _ => None,
    }
}

pub fn timer_index(base: u32) -> Option<usize> {
    match base {
        TIMER0_BASE => Some(0),
        TIMER1_BASE => Some(1),
        TIMER2_BASE => Some(2),
        TIMER3_BASE => Some(3),
        TIMER4_BASE => Some(4),
        _ => None,
    }
}

pub fn egu_index(base: u32) -> Option<usize> {
    if (EGU0_BASE..EGU0_BASE + 0x6000).contains(&base) && base & 0xFFF == 0 {
        Some(((base - EGU0_BASE) >> 12) as usize)
    } else {
        None
    }
}

fn split(addr: u32) -> (u32, u32) {
    (addr & 0xFFFF_F000, addr & 0xFFF)
}

/// One 32-bit register write, side effects included.
pub fn write32(sim: &mut Simulator, addr: u32, value: u32) -> Result {
    if addr & 3 != 0 {
        log::warn!("bus: unaligned register write at 0x{addr:08x} ignored");
        return Ok(());
    }
    let (base, off) = split(addr);
    match base {
        CLOCK_BASE => clock::regw(sim, off, value),
        RADIO_BASE => radio::regs::regw(sim, off, value),
        TEMP_BASE => temp::regw(sim, off, value),
        RNG_BASE => rng::regw(sim, off, value),
        CCM_AAR_BASE => {
            if sim.ccm.regs.enable == aar::ENABLE_AAR && aar::handles(off) {
                aar::regw(sim, off, value)
            } else {
                ccm::regw(sim, off, value)
            }
        }
        PPI_BASE => match sim.fabric {
            crate::fabric::Fabric::Ppi(_) => ppi::regw(sim, off, value),
            crate::fabric::Fabric::Dppi(_) => dppi::regw(sim, off, value),
        },
        _ => {
            if let Some(i) = rtc_index(base) {
                rtc::regw(sim, i, off, value)
            } else if let Some(i) = timer_index(base) {
                timer::regw(sim, i, off, value)
            } else if let Some(i) = egu_index(base) {
                egu::regw(sim, i, off, value)
            } else {
                log::warn!("bus: write to unmapped address 0x{addr:08x} ignored");
                Ok(())
            }
        }
    }
}

/// One 32-bit register read.
pub fn read32(sim: &mut Simulator, addr: u32) -> u32 {
    if addr & 3 != 0 {
        log::warn!("bus: unaligned register read at 0x{addr:08x} returns 0");
        return 0;
    }
    let (base, off) = split(addr);
    match base {
        CLOCK_BASE => clock::regr(sim, off),
        RADIO_BASE => radio::regs::regr(sim, off),
        TEMP_BASE => temp::regr(sim, off),
        RNG_BASE => rng::regr(sim, off),
        CCM_AAR_BASE => {
            if sim.ccm.regs.enable == aar::ENABLE_AAR && aar::handles(off) {
                aar::regr(sim, off)
            } else {
                ccm::regr(sim, off)
            }
        }
        PPI_BASE => match sim.fabric {
            crate::fabric::Fabric::Ppi(_) => ppi::regr(sim, off),
            crate::fabric::Fabric::Dppi(_) => dppi::regr(sim, off),
        },
        _ => {
            if let Some(i) = rtc_index(base) {
                rtc::regr(sim, i, off)
            } else if let Some(i) = timer_index(base) {
                timer::regr(sim, i, off)
            } else if let Some(i) = egu_index(base) {
                egu::regr(sim, i, off)
            } else {
                log::warn!("bus: read from unmapped address 0x{addr:08x} returns 0");
                0
            }
        }
    }
}
