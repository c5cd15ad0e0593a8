// SPDX-License-Identifier: Apache-2.0 OR MIT

//! RADIO bit counter, treated as a sub-peripheral with its own scheduler
//! slot. It counts air bits from BCSTART at the current data rate and
//! raises BCMATCH when BCC bits have elapsed.

use crate::periph::radio::signals;
use crate::sched::Slot;
use crate::sim::Simulator;
use crate::time::NEVER;
use crate::Result;

pub fn task_bcstart(sim: &mut Simulator) -> Result {
    // Whether the address end was actually received is not validated.
    if sim.radio.bc_running {
        log::warn!("RADIO: BCSTART while the bit counter is already running, ignored");
        return Ok(());
    }
    sim.radio.bc_running = true;
    sim.radio.bc_started_at = sim.sched.now();
    let t = sim.radio.bc_started_at
        + (f64::from(sim.radio.regs.bcc) / sim.radio.bits_per_us) as u64;
    sim.sched.set(Slot::RadioBitcounter, t);
    Ok(())
}

pub fn stop_bit_counter(sim: &mut Simulator) {
    if !sim.radio.bc_running {
        return;
    }
    sim.radio.bc_running = false;
    sim.sched.set(Slot::RadioBitcounter, NEVER);
}

pub fn task_bcstop(sim: &mut Simulator) -> Result {
    stop_bit_counter(sim);
    Ok(())
}

/// Slot::RadioBitcounter callback.
pub fn timer_triggered(sim: &mut Simulator) -> Result {
    // The counter stays running so a new BCC can re-arm a later match.
    sim.sched.set(Slot::RadioBitcounter, NEVER);
    signals::signal_bcmatch(sim)
}

pub fn regw_bcc(sim: &mut Simulator, value: u32) {
    sim.radio.regs.bcc = value;
    if !sim.radio.bc_running {
        return;
    }
    let t = sim.radio.bc_started_at + (f64::from(value) / sim.radio.bits_per_us) as u64;
    if t < sim.sched.now() {
        log::warn!("RADIO: BCC reprogrammed to a bit count that has already passed, ignored");
        sim.sched.set(Slot::RadioBitcounter, NEVER);
        return;
    }
    sim.sched.set(Slot::RadioBitcounter, t);
}
