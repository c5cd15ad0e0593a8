// SPDX-License-Identifier: Apache-2.0 OR MIT

//! CLOCK - clock control.
//!
//! Mostly a stub: the oscillators are "ready" one scheduler delta after the
//! start task, debounce times and power-up delays are not modelled, and the
//! 32.768 kHz domain is assumed drift-free relative to the 64 MHz one.
//!
//! Its one load-bearing duty is anchoring the RTC: the first LF clock edge
//! is reported through `rtc::notify_first_lf_tick` and becomes the zero
//! reference of all LF-tick arithmetic. The model assumes the LF clock is
//! never stopped once started.

use crate::fabric::{ClockTask, EventId};
use crate::irq::POWER_CLOCK_IRQ;
use crate::periph::rtc;
use crate::sched::Slot;
use crate::sim::Simulator;
use crate::time::{Instant, NEVER};
use crate::Result;

pub mod offs {
    pub const TASKS_HFCLKSTART: u32 = 0x000;
    pub const TASKS_HFCLKSTOP: u32 = 0x004;
    pub const TASKS_LFCLKSTART: u32 = 0x008;
    pub const TASKS_LFCLKSTOP: u32 = 0x00C;
    pub const TASKS_CAL: u32 = 0x010;
    pub const TASKS_CTSTART: u32 = 0x014;
    pub const TASKS_CTSTOP: u32 = 0x018;
    pub const EVENTS_HFCLKSTARTED: u32 = 0x100;
    pub const EVENTS_LFCLKSTARTED: u32 = 0x104;
    pub const EVENTS_DONE: u32 = 0x10C;
    pub const EVENTS_CTTO: u32 = 0x110;
    pub const EVENTS_CTSTARTED: u32 = 0x128;
    pub const EVENTS_CTSTOPPED: u32 = 0x12C;
    pub const INTENSET: u32 = 0x304;
    pub const INTENCLR: u32 = 0x308;
    pub const HFCLKRUN: u32 = 0x408;
    pub const HFCLKSTAT: u32 = 0x40C;
    pub const LFCLKRUN: u32 = 0x414;
    pub const LFCLKSTAT: u32 = 0x418;
    pub const LFCLKSRCCOPY: u32 = 0x41C;
    pub const LFCLKSRC: u32 = 0x518;
    pub const CTIV: u32 = 0x538;
}

const INTEN_HFCLKSTARTED: u32 = 1 << 0;
const INTEN_LFCLKSTARTED: u32 = 1 << 1;
const INTEN_DONE: u32 = 1 << 3;
const INTEN_CTTO: u32 = 1 << 4;
const INTEN_CTSTARTED: u32 = 1 << 10;
const INTEN_CTSTOPPED: u32 = 1 << 11;

const STAT_STATE: u32 = 1 << 16;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum ClkState {
    Stopped,
    Starting,
    Started,
    Stopping,
}

#[derive(Default)]
pub struct ClockRegs {
    pub events_hfclkstarted: u32,
    pub events_lfclkstarted: u32,
    pub events_done: u32,
    pub events_ctto: u32,
    pub events_ctstarted: u32,
    pub events_ctstopped: u32,
    pub hfclkrun: u32,
    pub hfclkstat: u32,
    pub lfclkrun: u32,
    pub lfclkstat: u32,
    pub lfclksrccopy: u32,
    pub lfclksrc: u32,
    pub ctiv: u32,
}

pub struct Clock {
    pub regs: ClockRegs,
    pub inten: u32,
    int_line: bool,
    lf_state: ClkState,
    hf_state: ClkState,
    ct_running: bool,
    timer_lf: Instant,
    timer_hf: Instant,
    timer_ct: Instant,
}

impl Default for Clock {
    fn default() -> Self {
        Self {
            regs: ClockRegs::default(),
            inten: 0,
            int_line: false,
            lf_state: ClkState::Stopped,
            hf_state: ClkState::Stopped,
            ct_running: false,
            timer_lf: NEVER,
            timer_hf: NEVER,
            timer_ct: NEVER,
        }
    }
}

impl Clock {
    pub fn lf_started(&self) -> bool {
        self.lf_state == ClkState::Started
    }
}

fn update_timers(sim: &mut Simulator) {
    sim.sched.set(Slot::ClockLf, sim.clock.timer_lf);
    sim.sched
        .set(Slot::ClockHf, sim.clock.timer_hf.min(sim.clock.timer_ct));
}

fn eval_interrupt(sim: &mut Simulator) {
    let c = &sim.clock;
    let new_line = (c.regs.events_hfclkstarted != 0 && c.inten & INTEN_HFCLKSTARTED != 0)
        || (c.regs.events_lfclkstarted != 0 && c.inten & INTEN_LFCLKSTARTED != 0)
        || (c.regs.events_done != 0 && c.inten & INTEN_DONE != 0)
        || (c.regs.events_ctto != 0 && c.inten & INTEN_CTTO != 0)
        || (c.regs.events_ctstarted != 0 && c.inten & INTEN_CTSTARTED != 0)
        || (c.regs.events_ctstopped != 0 && c.inten & INTEN_CTSTOPPED != 0);
    let mut line = sim.clock.int_line;
    sim.irq
        .toggle_level_irq_line_if(&mut line, new_line, POWER_CLOCK_IRQ);
    sim.clock.int_line = line;
}

fn signal_lfclkstarted(sim: &mut Simulator) -> Result {
    sim.clock.regs.events_lfclkstarted = 1;
    eval_interrupt(sim);
    sim.fabric_event(EventId::ClockLfStarted)
}

fn signal_hfclkstarted(sim: &mut Simulator) -> Result {
    sim.clock.regs.events_hfclkstarted = 1;
    eval_interrupt(sim);
    sim.fabric_event(EventId::ClockHfStarted)
}

fn signal_done(sim: &mut Simulator) -> Result {
    sim.clock.regs.events_done = 1;
    eval_interrupt(sim);
    sim.fabric_event(EventId::ClockDone)
}

fn signal_ctto(sim: &mut Simulator) -> Result {
    sim.clock.regs.events_ctto = 1;
    eval_interrupt(sim);
    sim.fabric_event(EventId::ClockCtto)
}

fn signal_ctstarted(sim: &mut Simulator) -> Result {
    sim.clock.regs.events_ctstarted = 1;
    eval_interrupt(sim);
    sim.fabric_event(EventId::ClockCtStarted)
}

fn signal_ctstopped(sim: &mut Simulator) -> Result {
    sim.clock.regs.events_ctstopped = 1;
    eval_interrupt(sim);
    sim.fabric_event(EventId::ClockCtStopped)
}

pub fn task_lfclkstart(sim: &mut Simulator) {
    let c = &mut sim.clock;
    c.regs.lfclksrccopy = c.regs.lfclksrc & 3;
    c.regs.lfclkrun = 1;
    if c.lf_state == ClkState::Started || c.lf_state == ClkState::Starting {
        return;
    }
    c.lf_state = ClkState::Starting;
    c.timer_lf = sim.sched.now();
    update_timers(sim);
}

pub fn task_lfclkstop(sim: &mut Simulator) {
    let c = &mut sim.clock;
    if c.lf_state != ClkState::Started && c.lf_state != ClkState::Starting {
        return;
    }
    log::warn!("CLOCK: stopping the LF clock; the RTC model assumes it never stops");
    c.regs.lfclkrun = 0;
    c.lf_state = ClkState::Stopping;
    c.timer_lf = sim.sched.now();
    update_timers(sim);
}

pub fn task_hfclkstart(sim: &mut Simulator) {
    let c = &mut sim.clock;
    c.regs.hfclkrun = 1;
    if c.hf_state == ClkState::Started || c.hf_state == ClkState::Starting {
        return;
    }
    c.hf_state = ClkState::Starting;
    c.timer_hf = sim.sched.now();
    update_timers(sim);
}

pub fn task_hfclkstop(sim: &mut Simulator) {
    let c = &mut sim.clock;
    c.regs.hfclkrun = 0;
    if c.hf_state != ClkState::Started && c.hf_state != ClkState::Starting {
        return;
    }
    c.hf_state = ClkState::Stopping;
    c.timer_hf = sim.sched.now();
    update_timers(sim);
}

/// LFRC calibration finishes in one delta; nothing is calibrated.
pub fn task_cal(sim: &mut Simulator) -> Result {
    if sim.clock.hf_state != ClkState::Started {
        log::warn!("CLOCK: TASK_CAL without the HF clock running");
    }
    signal_done(sim)
}

pub fn task_ctstart(sim: &mut Simulator) -> Result {
    if sim.clock.ct_running {
        log::warn!("CLOCK: TASK_CTSTART while the calibration timer is running");
        return Ok(());
    }
    sim.clock.ct_running = true;
    sim.clock.timer_ct = sim
        .sched
        .now()
        .saturating_add(u64::from(sim.clock.regs.ctiv) * 250_000);
    update_timers(sim);
    signal_ctstarted(sim)
}

pub fn task_ctstop(sim: &mut Simulator) -> Result {
    sim.clock.ct_running = false;
    sim.clock.timer_ct = NEVER;
    update_timers(sim);
    signal_ctstopped(sim)
}

pub fn run_task(sim: &mut Simulator, task: ClockTask) -> Result {
    match task {
        ClockTask::LfClkStart => task_lfclkstart(sim),
        ClockTask::LfClkStop => task_lfclkstop(sim),
        ClockTask::HfClkStart => task_hfclkstart(sim),
        ClockTask::HfClkStop => task_hfclkstop(sim),
        ClockTask::Cal => return task_cal(sim),
        ClockTask::CtStart => return task_ctstart(sim),
        ClockTask::CtStop => return task_ctstop(sim),
    }
    Ok(())
}

/// Slot::ClockLf callback.
pub fn lf_timer_triggered(sim: &mut Simulator) -> Result {
    sim.clock.timer_lf = NEVER;
    match sim.clock.lf_state {
        ClkState::Starting => {
            sim.clock.lf_state = ClkState::Started;
            sim.clock.regs.lfclkstat = STAT_STATE | sim.clock.regs.lfclksrccopy;
            update_timers(sim);
            signal_lfclkstarted(sim)?;
            // The clock enable is assumed to coincide with the first tick.
            rtc::notify_first_lf_tick(sim);
            Ok(())
        }
        ClkState::Stopping => {
            sim.clock.lf_state = ClkState::Stopped;
            sim.clock.regs.lfclkstat &= !STAT_STATE;
            update_timers(sim);
            Ok(())
        }
        _ => {
            update_timers(sim);
            Ok(())
        }
    }
}

/// Slot::ClockHf callback (HF start/stop and the calibration timer).
pub fn hf_timer_triggered(sim: &mut Simulator) -> Result {
    let now = sim.sched.now();
    if sim.clock.timer_hf == now {
        sim.clock.timer_hf = NEVER;
        match sim.clock.hf_state {
            ClkState::Starting => {
                sim.clock.hf_state = ClkState::Started;
                sim.clock.regs.hfclkstat = STAT_STATE | (1 << 0); // Xtal
                update_timers(sim);
                signal_hfclkstarted(sim)?;
            }
            ClkState::Stopping => {
                sim.clock.hf_state = ClkState::Stopped;
                sim.clock.regs.hfclkstat = 0;
                update_timers(sim);
            }
            _ => update_timers(sim),
        }
    }
    if sim.clock.timer_ct == now {
        sim.clock.timer_ct = NEVER;
        sim.clock.ct_running = false;
        update_timers(sim);
        signal_ctto(sim)?;
    }
    update_timers(sim);
    Ok(())
}

pub fn regw(sim: &mut Simulator, off: u32, value: u32) -> Result {
    match off {
        offs::TASKS_HFCLKSTART => {
            if value != 0 {
                task_hfclkstart(sim);
            }
        }
        offs::TASKS_HFCLKSTOP => {
            if value != 0 {
                task_hfclkstop(sim);
            }
        }
        offs::TASKS_LFCLKSTART => {
            if value != 0 {
                task_lfclkstart(sim);
            }
        }
        offs::TASKS_LFCLKSTOP => {
            if value != 0 {
                task_lfclkstop(sim);
            }
        }
        offs::TASKS_CAL => {
            if value != 0 {
                task_cal(sim)?;
            }
        }
        offs::TASKS_CTSTART => {
            if value != 0 {
                task_ctstart(sim)?;
            }
        }
        offs::TASKS_CTSTOP => {
            if value != 0 {
                task_ctstop(sim)?;
            }
        }
        offs::EVENTS_HFCLKSTARTED => {
            sim.clock.regs.events_hfclkstarted = value;
            eval_interrupt(sim);
        }
        offs::EVENTS_LFCLKSTARTED => {
            sim.clock.regs.events_lfclkstarted = value;
            eval_interrupt(sim);
        }
        offs::EVENTS_DONE => {
            sim.clock.regs.events_done = value;
            eval_interrupt(sim);
        }
        offs::EVENTS_CTTO => {
            sim.clock.regs.events_ctto = value;
            eval_interrupt(sim);
        }
        offs::EVENTS_CTSTARTED => {
            sim.clock.regs.events_ctstarted = value;
            eval_interrupt(sim);
        }
        offs::EVENTS_CTSTOPPED => {
            sim.clock.regs.events_ctstopped = value;
            eval_interrupt(sim);
        }
        offs::INTENSET => {
            if value != 0 {
                sim.clock.inten |= value;
                eval_interrupt(sim);
            }
        }
        offs::INTENCLR => {
            if value != 0 {
                sim.clock.inten &= !value;
                eval_interrupt(sim);
            }
        }
        offs::LFCLKSRC => sim.clock.regs.lfclksrc = value,
        offs::CTIV => sim.clock.regs.ctiv = value & 0x7F,
        _ => log::warn!("CLOCK: write to unknown offset 0x{off:03x} ignored"),
    }
    Ok(())
}

pub fn regr(sim: &Simulator, off: u32) -> u32 {
    let c = &sim.clock;
    match off {
        offs::EVENTS_HFCLKSTARTED => c.regs.events_hfclkstarted,
        offs::EVENTS_LFCLKSTARTED => c.regs.events_lfclkstarted,
        offs::EVENTS_DONE => c.regs.events_done,
        offs::EVENTS_CTTO => c.regs.events_ctto,
        offs::EVENTS_CTSTARTED => c.regs.events_ctstarted,
        offs::EVENTS_CTSTOPPED => c.regs.events_ctstopped,
        offs::INTENSET => c.inten,
        offs::INTENCLR => 0,
        offs::HFCLKRUN => c.regs.hfclkrun,
        offs::HFCLKSTAT => c.regs.hfclkstat,
        offs::LFCLKRUN => c.regs.lfclkrun,
        offs::LFCLKSTAT => c.regs.lfclkstat,
        offs::LFCLKSRCCOPY => c.regs.lfclksrccopy,
        offs::LFCLKSRC => c.regs.lfclksrc,
        offs::CTIV => c.regs.ctiv,
        _ => 0,
    }
}
