// SPDX-License-Identifier: Apache-2.0 OR MIT

//! EGU - event generator unit.
//!
//! A software bridge into the fabric: each TRIGGER task raises the matching
//! TRIGGERED event, nothing more.

use crate::fabric::EventId;
use crate::irq::{EGU0_IRQ, EGU1_IRQ, EGU2_IRQ, EGU3_IRQ, EGU4_IRQ, EGU5_IRQ};
use crate::sim::Simulator;
use crate::Result;

pub const N_EGU: usize = 6;
pub const N_EGU_LINES: usize = 16;

const EGU_IRQ_MAP: [u32; N_EGU] = [EGU0_IRQ, EGU1_IRQ, EGU2_IRQ, EGU3_IRQ, EGU4_IRQ, EGU5_IRQ];

pub mod offs {
    pub const TASKS_TRIGGER0: u32 = 0x000;
    pub const EVENTS_TRIGGERED0: u32 = 0x100;
    pub const INTEN: u32 = 0x300;
    pub const INTENSET: u32 = 0x304;
    pub const INTENCLR: u32 = 0x308;
}

#[derive(Default)]
pub struct Egu {
    pub events_triggered: [u32; N_EGU_LINES],
    pub inten: u32,
    int_line: bool,
}

fn eval_interrupt(sim: &mut Simulator, inst: usize) {
    let egu = &sim.egu[inst];
    let mut new_line = false;
    for (i, ev) in egu.events_triggered.iter().enumerate() {
        if *ev != 0 && egu.inten & (1 << i) != 0 {
            new_line = true;
            break;
        }
    }
    let mut line = egu.int_line;
    sim.irq
        .toggle_level_irq_line_if(&mut line, new_line, EGU_IRQ_MAP[inst]);
    sim.egu[inst].int_line = line;
}

pub fn task_trigger(sim: &mut Simulator, inst: usize, line: usize) -> Result {
    sim.egu[inst].events_triggered[line] = 1;
    eval_interrupt(sim, inst);
    sim.fabric_event(EventId::EguTriggered(inst as u8, line as u8))
}

pub fn regw(sim: &mut Simulator, inst: usize, off: u32, value: u32) -> Result {
    match off {
        o if (offs::TASKS_TRIGGER0..offs::TASKS_TRIGGER0 + 4 * N_EGU_LINES as u32).contains(&o)
            && o & 3 == 0 =>
        {
            if value != 0 {
                task_trigger(sim, inst, ((o - offs::TASKS_TRIGGER0) / 4) as usize)?;
            }
        }
        o if (offs::EVENTS_TRIGGERED0..offs::EVENTS_TRIGGERED0 + 4 * N_EGU_LINES as u32)
            .contains(&o)
            && o & 3 == 0 =>
        {
            sim.egu[inst].events_triggered[((o - offs::EVENTS_TRIGGERED0) / 4) as usize] = value;
            eval_interrupt(sim, inst);
        }
        offs::INTEN => {
            sim.egu[inst].inten = value;
            eval_interrupt(sim, inst);
        }
        offs::INTENSET => {
            if value != 0 {
                sim.egu[inst].inten |= value;
                eval_interrupt(sim, inst);
            }
        }
        offs::INTENCLR => {
            if value != 0 {
                sim.egu[inst].inten &= !value;
                eval_interrupt(sim, inst);
            }
        }
        _ => log::warn!("EGU{inst}: write to unknown offset 0x{off:03x} ignored"),
    }
    Ok(())
}

pub fn regr(sim: &Simulator, inst: usize, off: u32) -> u32 {
    match off {
        o if (offs::EVENTS_TRIGGERED0..offs::EVENTS_TRIGGERED0 + 4 * N_EGU_LINES as u32)
            .contains(&o)
            && o & 3 == 0 =>
        {
            sim.egu[inst].events_triggered[((o - offs::EVENTS_TRIGGERED0) / 4) as usize]
        }
        offs::INTEN | offs::INTENSET => sim.egu[inst].inten,
        offs::INTENCLR => 0,
        _ => 0,
    }
}
