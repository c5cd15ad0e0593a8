// SPDX-License-Identifier: Apache-2.0 OR MIT

//! TEMP - temperature sensor stub.
//!
//! A measurement takes a fixed 36us and always reads a comfortable room
//! temperature (0.25 degC units in the TEMP register).

use crate::fabric::EventId;
use crate::irq::TEMP_IRQ;
use crate::sched::Slot;
use crate::sim::Simulator;
use crate::time::NEVER;
use crate::Result;

const T_TEMP: u64 = 36;

/// 25.25 degC in units of 0.25 degC.
const ROOM_TEMP: u32 = 101;

const INTEN_DATARDY: u32 = 1 << 0;

pub mod offs {
    pub const TASKS_START: u32 = 0x000;
    pub const TASKS_STOP: u32 = 0x004;
    pub const EVENTS_DATARDY: u32 = 0x100;
    pub const INTENSET: u32 = 0x304;
    pub const INTENCLR: u32 = 0x308;
    pub const TEMP: u32 = 0x508;
}

#[derive(Default)]
pub struct Temp {
    pub events_datardy: u32,
    pub temp: u32,
    pub inten: u32,
    int_line: bool,
    measuring: bool,
}

fn eval_interrupt(sim: &mut Simulator) {
    let new_line = sim.temp.events_datardy != 0 && sim.temp.inten & INTEN_DATARDY != 0;
    let mut line = sim.temp.int_line;
    sim.irq.toggle_level_irq_line_if(&mut line, new_line, TEMP_IRQ);
    sim.temp.int_line = line;
}

pub fn task_start(sim: &mut Simulator) {
    if sim.temp.measuring {
        return;
    }
    sim.temp.measuring = true;
    let t = sim.sched.now() + T_TEMP;
    sim.sched.set(Slot::Temp, t);
}

pub fn task_stop(sim: &mut Simulator) {
    sim.temp.measuring = false;
    sim.sched.set(Slot::Temp, NEVER);
}

pub fn timer_triggered(sim: &mut Simulator) -> Result {
    sim.temp.measuring = false;
    sim.sched.set(Slot::Temp, NEVER);
    sim.temp.temp = ROOM_TEMP;
    sim.temp.events_datardy = 1;
    eval_interrupt(sim);
    sim.fabric_event(EventId::TempDatardy)
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
        offs::EVENTS_DATARDY => {
            sim.temp.events_datardy = value;
            eval_interrupt(sim);
        }
        offs::INTENSET => {
            if value != 0 {
                sim.temp.inten |= value;
                eval_interrupt(sim);
            }
        }
        offs::INTENCLR => {
            if value != 0 {
                sim.temp.inten &= !value;
                eval_interrupt(sim);
            }
        }
        _ => log::warn!("TEMP: write to unknown offset 0x{off:03x} ignored"),
    }
    Ok(())
}

pub fn regr(sim: &Simulator, off: u32) -> u32 {
    match off {
        offs::EVENTS_DATARDY => sim.temp.events_datardy,
        offs::INTENSET => sim.temp.inten,
        offs::INTENCLR => 0,
        offs::TEMP => sim.temp.temp,
        _ => 0,
    }
}
