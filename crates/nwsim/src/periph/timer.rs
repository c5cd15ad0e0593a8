// SPDX-License-Identifier: Apache-2.0 OR MIT

//! TIMER - timer/counter instances.
//!
//! In Timer mode the counter is not actually counting: compare match times
//! are predicted from the 16 MHz base clock and the prescaler whenever the
//! timer is started, stopped or a CC register changes, and the shared
//! scheduler slot is programmed with the earliest one. In Counter mode the
//! internal count advances on each COUNT task only.
//!
//! Tasks have no synchronization delay and never happen "simultaneously";
//! hardware task priority is therefore not modelled. TASK_SHUTDOWN behaves
//! as STOP + CLEAR (its exact silicon behaviour is undocumented).

use crate::fabric::{EventId, TimerTask};
use crate::irq::{TIMER0_IRQ, TIMER1_IRQ, TIMER2_IRQ, TIMER3_IRQ, TIMER4_IRQ};
use crate::sched::Slot;
use crate::sim::Simulator;
use crate::time::{Instant, NEVER};
use crate::Result;

pub const N_TIMERS: usize = 5;
pub const N_MAX_CC: usize = 6;

const TIMER_N_CC: [usize; N_TIMERS] = [4, 4, 4, 6, 6];
const TIMER_IRQ_MAP: [u32; N_TIMERS] =
    [TIMER0_IRQ, TIMER1_IRQ, TIMER2_IRQ, TIMER3_IRQ, TIMER4_IRQ];

const SHORTS_COMPARE0_CLEAR: u32 = 1 << 0;
const SHORTS_COMPARE0_STOP: u32 = 1 << 8;
const INTEN_COMPARE0: u32 = 1 << 16;

pub mod offs {
    pub const TASKS_START: u32 = 0x000;
    pub const TASKS_STOP: u32 = 0x004;
    pub const TASKS_COUNT: u32 = 0x008;
    pub const TASKS_CLEAR: u32 = 0x00C;
    pub const TASKS_SHUTDOWN: u32 = 0x010;
    pub const TASKS_CAPTURE0: u32 = 0x040;
    pub const EVENTS_COMPARE0: u32 = 0x140;
    pub const SHORTS: u32 = 0x200;
    pub const INTENSET: u32 = 0x304;
    pub const INTENCLR: u32 = 0x308;
    pub const MODE: u32 = 0x504;
    pub const BITMODE: u32 = 0x508;
    pub const PRESCALER: u32 = 0x510;
    pub const CC0: u32 = 0x540;
}

#[derive(Default)]
pub struct TimerRegs {
    pub events_compare: [u32; N_MAX_CC],
    pub shorts: u32,
    pub mode: u32,
    pub bitmode: u32,
    pub prescaler: u32,
    pub cc: [u32; N_MAX_CC],
}

pub struct TimerInst {
    pub regs: TimerRegs,
    pub inten: u32,
    int_line: bool,
    n_cc: usize,
    running: bool,
    start_t: Instant,
    counter: u32,
    cc_timers: [Instant; N_MAX_CC],
}

impl TimerInst {
    fn new(n_cc: usize) -> Self {
        Self {
            regs: TimerRegs::default(),
            inten: 0,
            int_line: false,
            n_cc,
            running: false,
            start_t: NEVER,
            counter: 0,
            cc_timers: [NEVER; N_MAX_CC],
        }
    }
}

pub struct TimerSet {
    pub inst: [TimerInst; N_TIMERS],
}

impl Default for TimerSet {
    fn default() -> Self {
        Self {
            inst: [
                TimerInst::new(TIMER_N_CC[0]),
                TimerInst::new(TIMER_N_CC[1]),
                TimerInst::new(TIMER_N_CC[2]),
                TimerInst::new(TIMER_N_CC[3]),
                TimerInst::new(TIMER_N_CC[4]),
            ],
        }
    }
}

fn time_to_counter(inst: &TimerInst, delta: Instant) -> u64 {
    (delta << 4) >> inst.regs.prescaler
}

fn counter_to_time(inst: &TimerInst, counter: u64) -> Instant {
    (counter << inst.regs.prescaler) >> 4
}

fn mask_from_bitmode(inst: &TimerInst) -> u32 {
    match inst.regs.bitmode {
        0 => 0xFFFF,
        1 => 0xFF,
        2 => 0x00FF_FFFF,
        _ => 0xFFFF_FFFF,
    }
}

fn time_of_1_counter_wrap(inst: &TimerInst) -> Instant {
    counter_to_time(inst, u64::from(mask_from_bitmode(inst)) + 1)
}

fn update_master_timer(sim: &mut Simulator) {
    let mut next = NEVER;
    for inst in &sim.timers.inst {
        if inst.running && inst.regs.mode == 0 {
            for cc in 0..inst.n_cc {
                next = next.min(inst.cc_timers[cc]);
            }
        }
    }
    sim.sched.set(Slot::Timer, next);
}

fn update_cc_timer(sim: &mut Simulator, t: usize, cc: usize) {
    let now = sim.sched.now();
    let inst = &mut sim.timers.inst[t];
    if inst.running && inst.regs.mode == 0 {
        let mut next_match = inst
            .start_t
            .saturating_add(counter_to_time(inst, u64::from(inst.regs.cc[cc])));
        while next_match <= now {
            next_match = next_match.saturating_add(time_of_1_counter_wrap(inst));
        }
        inst.cc_timers[cc] = next_match;
    } else {
        inst.cc_timers[cc] = NEVER;
    }
}

fn update_all_cc_timers(sim: &mut Simulator, t: usize) {
    for cc in 0..sim.timers.inst[t].n_cc {
        update_cc_timer(sim, t, cc);
    }
}

fn eval_interrupts(sim: &mut Simulator, t: usize) {
    let inst = &sim.timers.inst[t];
    let mut new_line = false;
    for cc in 0..inst.n_cc {
        if inst.regs.events_compare[cc] != 0 && inst.inten & (INTEN_COMPARE0 << cc) != 0 {
            new_line = true;
            break;
        }
    }
    let mut line = inst.int_line;
    sim.irq
        .toggle_level_irq_line_if(&mut line, new_line, TIMER_IRQ_MAP[t]);
    sim.timers.inst[t].int_line = line;
}

fn signal_compare(sim: &mut Simulator, t: usize, cc: usize) -> Result {
    let shorts = sim.timers.inst[t].regs.shorts;
    if shorts & (SHORTS_COMPARE0_CLEAR << cc) != 0 {
        task_clear(sim, t);
    }
    if shorts & (SHORTS_COMPARE0_STOP << cc) != 0 {
        task_stop(sim, t);
    }
    sim.timers.inst[t].regs.events_compare[cc] = 1;
    eval_interrupts(sim, t);
    sim.fabric_event(EventId::TimerCompare(t as u8, cc as u8))
}

pub fn task_start(sim: &mut Simulator, t: usize) {
    if sim.timers.inst[t].running {
        return;
    }
    let now = sim.sched.now();
    let inst = &mut sim.timers.inst[t];
    inst.running = true;
    if inst.regs.mode == 0 {
        // A non-zero count at start behaves as an earlier start time.
        inst.start_t = now - counter_to_time(inst, u64::from(inst.counter));
        update_all_cc_timers(sim, t);
        update_master_timer(sim);
    }
}

pub fn task_stop(sim: &mut Simulator, t: usize) {
    if !sim.timers.inst[t].running {
        return;
    }
    let now = sim.sched.now();
    let inst = &mut sim.timers.inst[t];
    inst.running = false;
    if inst.regs.mode == 0 {
        inst.counter = time_to_counter(inst, now - inst.start_t) as u32;
    }
    for cc in 0..N_MAX_CC {
        inst.cc_timers[cc] = NEVER;
    }
    update_master_timer(sim);
}

pub fn task_shutdown(sim: &mut Simulator, t: usize) {
    let inst = &mut sim.timers.inst[t];
    inst.running = false;
    inst.counter = 0;
    inst.start_t = NEVER;
    for cc in 0..N_MAX_CC {
        inst.cc_timers[cc] = NEVER;
    }
    update_master_timer(sim);
}

pub fn task_clear(sim: &mut Simulator, t: usize) {
    let now = sim.sched.now();
    let inst = &mut sim.timers.inst[t];
    inst.counter = 0;
    if inst.regs.mode == 0 {
        inst.start_t = now;
        update_all_cc_timers(sim, t);
        update_master_timer(sim);
    }
}

pub fn task_capture(sim: &mut Simulator, t: usize, cc: usize) {
    if cc >= sim.timers.inst[t].n_cc {
        log::warn!("TIMER{t}: CAPTURE[{cc}] beyond the instance CC count, ignored");
        return;
    }
    let now = sim.sched.now();
    let inst = &mut sim.timers.inst[t];
    if inst.regs.mode != 0 {
        inst.regs.cc[cc] = inst.counter & mask_from_bitmode(inst);
    } else {
        if inst.start_t == NEVER {
            log::warn!("TIMER{t}: CAPTURE[{cc}] on a timer that was never started, you get garbage");
            return;
        }
        let elapsed = now - inst.start_t;
        inst.regs.cc[cc] = (time_to_counter(inst, elapsed) as u32) & mask_from_bitmode(inst);
        update_cc_timer(sim, t, cc);
        update_master_timer(sim);
    }
}

pub fn task_count(sim: &mut Simulator, t: usize) -> Result {
    if sim.timers.inst[t].regs.mode == 0 || !sim.timers.inst[t].running {
        return Ok(());
    }
    let inst = &mut sim.timers.inst[t];
    inst.counter = (inst.counter + 1) & mask_from_bitmode(inst);
    let count = inst.counter;
    for cc in 0..sim.timers.inst[t].n_cc {
        let inst = &sim.timers.inst[t];
        if count == inst.regs.cc[cc] & mask_from_bitmode(inst) {
            signal_compare(sim, t, cc)?;
        }
    }
    Ok(())
}

pub fn run_task(sim: &mut Simulator, t: usize, task: TimerTask) -> Result {
    match task {
        TimerTask::Start => task_start(sim, t),
        TimerTask::Stop => task_stop(sim, t),
        TimerTask::Count => return task_count(sim, t),
        TimerTask::Clear => task_clear(sim, t),
        TimerTask::Shutdown => task_shutdown(sim, t),
        TimerTask::Capture(cc) => task_capture(sim, t, cc as usize),
    }
    Ok(())
}

/// Slot::Timer callback: fire every compare matching `now`.
pub fn timer_triggered(sim: &mut Simulator) -> Result {
    let t_now = sim.sched.now();
    let mut matches: Vec<(usize, usize)> = Vec::new();
    for t in 0..N_TIMERS {
        let inst = &sim.timers.inst[t];
        if !(inst.running && inst.regs.mode == 0) {
            continue;
        }
        for cc in 0..inst.n_cc {
            if inst.cc_timers[cc] == t_now {
                matches.push((t, cc));
            }
        }
    }
    for (t, cc) in matches {
        update_cc_timer(sim, t, cc);
        signal_compare(sim, t, cc)?;
    }
    update_master_timer(sim);
    Ok(())
}

pub fn regw(sim: &mut Simulator, t: usize, off: u32, value: u32) -> Result {
    match off {
        offs::TASKS_START => {
            if value != 0 {
                task_start(sim, t);
            }
        }
        offs::TASKS_STOP => {
            if value != 0 {
                task_stop(sim, t);
            }
        }
        offs::TASKS_COUNT => {
            if value != 0 {
                task_count(sim, t)?;
            }
        }
        offs::TASKS_CLEAR => {
            if value != 0 {
                task_clear(sim, t);
            }
        }
        offs::TASKS_SHUTDOWN => {
            if value != 0 {
                task_shutdown(sim, t);
            }
        }
        o if (offs::TASKS_CAPTURE0..offs::TASKS_CAPTURE0 + 4 * N_MAX_CC as u32).contains(&o)
            && o & 3 == 0 =>
        {
            if value != 0 {
                task_capture(sim, t, ((o - offs::TASKS_CAPTURE0) / 4) as usize);
            }
        }
        o if (offs::EVENTS_COMPARE0..offs::EVENTS_COMPARE0 + 4 * N_MAX_CC as u32).contains(&o)
            && o & 3 == 0 =>
        {
            let cc = ((o - offs::EVENTS_COMPARE0) / 4) as usize;
            sim.timers.inst[t].regs.events_compare[cc] = value;
            eval_interrupts(sim, t);
        }
        offs::SHORTS => sim.timers.inst[t].regs.shorts = value,
        offs::INTENSET => {
            if value != 0 {
                sim.timers.inst[t].inten |= value;
                eval_interrupts(sim, t);
            }
        }
        offs::INTENCLR => {
            if value != 0 {
                sim.timers.inst[t].inten &= !value;
                eval_interrupts(sim, t);
            }
        }
        offs::MODE => sim.timers.inst[t].regs.mode = value & 3,
        offs::BITMODE => sim.timers.inst[t].regs.bitmode = value & 3,
        offs::PRESCALER => {
            if value > 9 {
                log::warn!("TIMER{t}: PRESCALER {value} out of range, capped to 9");
            }
            sim.timers.inst[t].regs.prescaler = value.min(9);
        }
        o if (offs::CC0..offs::CC0 + 4 * N_MAX_CC as u32).contains(&o) && o & 3 == 0 => {
            let cc = ((o - offs::CC0) / 4) as usize;
            if cc >= sim.timers.inst[t].n_cc {
                log::warn!("TIMER{t}: CC[{cc}] beyond the instance CC count, ignored");
                return Ok(());
            }
            sim.timers.inst[t].regs.cc[cc] = value;
            if sim.timers.inst[t].running && sim.timers.inst[t].regs.mode == 0 {
                update_cc_timer(sim, t, cc);
                update_master_timer(sim);
            }
        }
        _ => log::warn!("TIMER{t}: write to unknown offset 0x{off:03x} ignored"),
    }
    Ok(())
}

pub fn regr(sim: &Simulator, t: usize, off: u32) -> u32 {
    let inst = &sim.timers.inst[t];
    match off {
        o if (offs::EVENTS_COMPARE0..offs::EVENTS_COMPARE0 + 4 * N_MAX_CC as u32).contains(&o)
            && o & 3 == 0 =>
        {
            inst.regs.events_compare[((o - offs::EVENTS_COMPARE0) / 4) as usize]
        }
        offs::SHORTS => inst.regs.shorts,
        offs::INTENSET => inst.inten,
        offs::INTENCLR => 0,
        offs::MODE => inst.regs.mode,
        offs::BITMODE => inst.regs.bitmode,
        offs::PRESCALER => inst.regs.prescaler,
        o if (offs::CC0..offs::CC0 + 4 * N_MAX_CC as u32).contains(&o) && o & 3 == 0 => {
            inst.regs.cc[((o - offs::CC0) / 4) as usize]
        }
        _ => 0,
    }
}
