// SPDX-License-Identifier: Apache-2.0 OR MIT

//! RNG - random number generator.
//!
//! Stub model: one byte per generation interval from the host PRNG. Bias
//! correction only changes the generation time, not the distribution.

use crate::fabric::EventId;
use crate::irq::RNG_IRQ;
use crate::sched::Slot;
use crate::sim::Simulator;
use crate::time::NEVER;
use crate::Result;

/// Generation time per byte, us (bias correction off / on).
const T_RNG_RAW: u64 = 30;
const T_RNG_BIAS: u64 = 120;

const SHORTS_VALRDY_STOP: u32 = 1 << 0;
const INTEN_VALRDY: u32 = 1 << 0;
const CONFIG_DERCEN: u32 = 1 << 0;

pub mod offs {
    pub const TASKS_START: u32 = 0x000;
    pub const TASKS_STOP: u32 = 0x004;
    pub const EVENTS_VALRDY: u32 = 0x100;
    pub const SHORTS: u32 = 0x200;
    pub const INTENSET: u32 = 0x304;
    pub const INTENCLR: u32 = 0x308;
    pub const CONFIG: u32 = 0x504;
    pub const VALUE: u32 = 0x508;
}

#[derive(Default)]
pub struct Rng {
    pub events_valrdy: u32,
    pub shorts: u32,
    pub config: u32,
    pub value: u32,
    pub inten: u32,
    int_line: bool,
    running: bool,
}

fn generation_time(sim: &Simulator) -> u64 {
    if sim.rng.config & CONFIG_DERCEN != 0 {
        T_RNG_BIAS
    } else {
        T_RNG_RAW
    }
}

fn eval_interrupt(sim: &mut Simulator) {
    let new_line = sim.rng.events_valrdy != 0 && sim.rng.inten & INTEN_VALRDY != 0;
    let mut line = sim.rng.int_line;
    sim.irq.toggle_level_irq_line_if(&mut line, new_line, RNG_IRQ);
    sim.rng.int_line = line;
}

pub fn task_start(sim: &mut Simulator) {
    if sim.rng.running {
        return;
    }
    sim.rng.running = true;
    let t = sim.sched.now() + generation_time(sim);
    sim.sched.set(Slot::Rng, t);
}

pub fn task_stop(sim: &mut Simulator) {
    sim.rng.running = false;
    sim.sched.set(Slot::Rng, NEVER);
}

pub fn timer_triggered(sim: &mut Simulator) -> Result {
    sim.rng.value = u32::from(fastrand::u8(..));
    sim.rng.events_valrdy = 1;
    eval_interrupt(sim);
    sim.fabric_event(EventId::RngValrdy)?;
    if sim.rng.shorts & SHORTS_VALRDY_STOP != 0 {
        task_stop(sim);
    } else if sim.rng.running {
        let t = sim.sched.now() + generation_time(sim);
        sim.sched.set(Slot::Rng, t);
    }
    Ok(())
}

pub fn regw(sim: &mut Simulator, off: u32, value: u32) -> Result {
    match off {
        offs::TASKS_START => {
            if value != 0 {
                task_start(sim);
            }
        }
        offs::TASKS_STOP => {
            if value != 0 {
                task_stop(sim);
            }
        }
        offs::EVENTS_VALRDY => {
            sim.rng.events_valrdy = value;
            eval_interrupt(sim);
        }
        offs::SHORTS => sim.rng.shorts = value,
        offs::INTENSET => {
            if value != 0 {
                sim.rng.inten |= value;
                eval_interrupt(sim);
            }
        }
        offs::INTENCLR => {
            if value != 0 {
                sim.rng.inten &= !value;
                eval_interrupt(sim);
            }
        }
        offs::CONFIG => sim.rng.config = value,
        _ => log::warn!("RNG: write to unknown offset 0x{off:03x} ignored"),
    }
    Ok(())
}

pub fn regr(sim: &Simulator, off: u32) -> u32 {
    match off {
        offs::EVENTS_VALRDY => sim.rng.events_valrdy,
        offs::SHORTS => sim.rng.shorts,
        offs::INTENSET => sim.rng.inten,
        offs::INTENCLR => 0,
        offs::CONFIG => sim.rng.config,
        offs::VALUE => sim.rng.value,
        _ => 0,
    }
}
