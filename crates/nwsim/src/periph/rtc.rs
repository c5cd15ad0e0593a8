// SPDX-License-Identifier: Apache-2.0 OR MIT

//! RTC - real-time counter instances.
//!
//! A 24-bit counter ticked at `32768 Hz / (PRESCALER+1)`, with compare
//! channels, overflow, and the COMPARE[n]->CLEAR shortcut.
//!
//! Rather than ticking 32768 times a second, the model predicts the next
//! compare/overflow wall-clock time whenever the counter/time relationship
//! changes, and programs the shared scheduler slot with the earliest one.
//!
//! Time is tracked in a sub-microsecond fixed point representation (9
//! fractional bits) so LF clock ticks stay exact and no rounding error
//! accumulates across counter wraps. Deadlines handed to the scheduler are
//! rounded *up*: an event must never be signalled before its logical time.
//!
//! Known deviations from silicon, kept deliberately:
//! * tasks and events have no LFCLK-domain synchronization delay, so a
//!   COMPARE[n]->CLEAR shortcut clears instantaneously (one tick earlier
//!   than hardware; a warning is logged when the shortcut fires),
//! * COUNTER reads are instantaneous (the backing register is reconciled
//!   right before the read returns),
//! * TICK events are not modelled.

use crate::config::{
    LF_CLOCK_PERIOD_SUBUS, RTC_COUNTER_MASK, RTC_TRIGGER_OVERFLOW_COUNTER_VALUE, SUB_US_BITS,
};
use crate::fabric::{EventId, Fabric, RtcTask, TaskId};
use crate::irq::{RTC0_IRQ, RTC1_IRQ, RTC2_IRQ};
use crate::sched::Slot;
use crate::sim::Simulator;
use crate::time::{Instant, NEVER};
use crate::Result;

pub const N_RTC: usize = 3;
pub const N_CC: usize = 4;

/// CC register count per instance (RTC0 has 3 on the modelled variant).
const RTC_N_CC: [usize; N_RTC] = [3, 4, 4];

const RTC_IRQ_MAP: [u32; N_RTC] = [RTC0_IRQ, RTC1_IRQ, RTC2_IRQ];

pub mod offs {
    pub const TASKS_START: u32 = 0x000;
    pub const TASKS_STOP: u32 = 0x004;
    pub const TASKS_CLEAR: u32 = 0x008;
    pub const TASKS_TRIGOVRFLW: u32 = 0x00C;
    pub const TASKS_CAPTURE0: u32 = 0x040;
    pub const EVENTS_TICK: u32 = 0x100;
    pub const EVENTS_OVRFLW: u32 = 0x104;
    pub const EVENTS_COMPARE0: u32 = 0x140;
    pub const SHORTS: u32 = 0x200;
    pub const INTENSET: u32 = 0x304;
    pub const INTENCLR: u32 = 0x308;
    pub const EVTEN: u32 = 0x340;
    pub const EVTENSET: u32 = 0x344;
    pub const EVTENCLR: u32 = 0x348;
    pub const COUNTER: u32 = 0x504;
    pub const PRESCALER: u32 = 0x508;
    pub const CC0: u32 = 0x540;
}

pub const EVTEN_TICK: u32 = 1 << 0;
pub const EVTEN_OVRFLW: u32 = 1 << 1;
pub const EVTEN_COMPARE0: u32 = 1 << 16;
pub const SHORTS_COMPARE0_CLEAR: u32 = 1 << 0;

/// The firmware-visible register file of one instance.
#[derive(Default)]
pub struct RtcRegs {
    pub events_tick: u32,
    pub events_ovrflw: u32,
    pub events_compare: [u32; N_CC],
    pub shorts: u32,
    pub evten: u32,
    pub counter: u32,
    pub prescaler: u32,
    pub cc: [u32; N_CC],
}

/// One RTC instance: registers plus prediction state.
pub struct RtcInst {
    pub regs: RtcRegs,
    pub inten: u32,
    int_line: bool,
    n_cc: usize,
    /// PRESCALER as latched on START/CLEAR/TRIGOVRFLW.
    presc: u32,
    running: bool,
    cc_timers: [Instant; N_CC],
    overflow_timer: Instant,
    overflow_timer_subus: u64,
    /// Wall time (sub-us) corresponding to COUNTER == 0. Split into a
    /// non-negative part and a "negative" part so TRIGOVRFLW can place the
    /// virtual start before boot.
    start_subus: u64,
    start_neg_subus: u64,
    counter_at_stop: u32,
}

impl RtcInst {
    fn new(n_cc: usize) -> Self {
        Self {
            regs: RtcRegs::default(),
            inten: 0,
            int_line: false,
            n_cc,
            presc: 0,
            running: false,
            cc_timers: [NEVER; N_CC],
            overflow_timer: NEVER,
            overflow_timer_subus: u64::MAX,
            start_subus: u64::MAX,
            start_neg_subus: 0,
            counter_at_stop: 0,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }
}

/// All RTC instances plus the shared LF-tick anchor.
pub struct RtcSet {
    pub inst: [RtcInst; N_RTC],
    first_lf_tick_subus: u64,
}

impl Default for RtcSet {
    fn default() -> Self {
        Self {
            inst: [
                RtcInst::new(RTC_N_CC[0]),
                RtcInst::new(RTC_N_CC[1]),
                RtcInst::new(RTC_N_CC[2]),
            ],
            first_lf_tick_subus: 0,
        }
    }
}

fn subus_to_us_ceil(subus: u64) -> Instant {
    let us = subus >> SUB_US_BITS;
    if subus & ((1 << SUB_US_BITS) - 1) != 0 {
        us + 1
    } else {
        us
    }
}

fn us_to_subus(us: Instant) -> u64 {
    us << SUB_US_BITS
}

fn now_subus(sim: &Simulator) -> u64 {
    let now = sim.sched.now();
    // 2^64 sub-us units bound the model runtime to ~1142 years.
    debug_assert!(now < (u64::MAX >> SUB_US_BITS));
    us_to_subus(now)
}

fn last_lf_tick_subus(sim: &Simulator) -> u64 {
    let now = now_subus(sim);
    let anchor = sim.rtc.first_lf_tick_subus;
    let ticks = (now - anchor) / LF_CLOCK_PERIOD_SUBUS;
    anchor + ticks * LF_CLOCK_PERIOD_SUBUS
}

fn subus_to_counter(inst: &RtcInst, delta_subus: u64) -> u64 {
    delta_subus / (LF_CLOCK_PERIOD_SUBUS * u64::from(inst.presc + 1))
}

fn counter_to_subus(inst: &RtcInst, counter: u64) -> u64 {
    counter * LF_CLOCK_PERIOD_SUBUS * u64::from(inst.presc + 1)
}

fn wrap_subus(inst: &RtcInst) -> u64 {
    counter_to_subus(inst, u64::from(RTC_COUNTER_MASK) + 1)
}

/// The next wall time (us, and exact sub-us) at which the counter reaches
/// `counter_match`, or NEVER while stopped.
fn counter_match_time(sim: &Simulator, rtc: usize, counter_match: u64) -> (Instant, u64) {
    let inst = &sim.rtc.inst[rtc];
    if !inst.running {
        return (NEVER, u64::MAX);
    }
    let now = now_subus(sim);
    let match_subus = counter_to_subus(inst, counter_match);

    let mut next = if inst.start_subus > 0 {
        inst.start_subus.wrapping_add(match_subus)
    } else if match_subus > inst.start_neg_subus {
        match_subus - inst.start_neg_subus
    } else {
        wrap_subus(inst) + match_subus - inst.start_neg_subus
    };
    while next <= now {
        next += wrap_subus(inst);
    }
    (subus_to_us_ceil(next), next)
}

fn update_cc_timer(sim: &mut Simulator, rtc: usize, cc: usize) {
    let cc_val = u64::from(sim.rtc.inst[rtc].regs.cc[cc]);
    let (us, _) = counter_match_time(sim, rtc, cc_val);
    sim.rtc.inst[rtc].cc_timers[cc] = us;
}

fn update_overflow_timer(sim: &mut Simulator, rtc: usize) {
    let (us, subus) = counter_match_time(sim, rtc, u64::from(RTC_COUNTER_MASK) + 1);
    let inst = &mut sim.rtc.inst[rtc];
    inst.overflow_timer = us;
    inst.overflow_timer_subus = subus;
}

fn update_master_timer(sim: &mut Simulator) {
    let mut next = NEVER;
    for inst in &sim.rtc.inst {
        if !inst.running {
            continue;
        }
        for cc in 0..inst.n_cc {
            next = next.min(inst.cc_timers[cc]);
        }
        next = next.min(inst.overflow_timer);
    }
    sim.sched.set(Slot::Rtc, next);
}

fn update_timers(sim: &mut Simulator, rtc: usize) {
    for cc in 0..sim.rtc.inst[rtc].n_cc {
        update_cc_timer(sim, rtc, cc);
    }
    update_overflow_timer(sim, rtc);
    update_master_timer(sim);
}

/// Rewind/forward the counter to `counter_val` by moving the virtual
/// counter-start time, possibly before boot ("negative" start).
fn set_counter(sim: &mut Simulator, rtc: usize, counter_val: u32) {
    let counter_val = counter_val & RTC_COUNTER_MASK;
    let last_tick = last_lf_tick_subus(sim);
    let inst = &mut sim.rtc.inst[rtc];
    let counter_subus = counter_to_subus(inst, u64::from(counter_val));
    if last_tick >= counter_subus {
        inst.start_subus = last_tick - counter_subus;
        inst.start_neg_subus = 0;
    } else {
        inst.start_subus = 0;
        inst.start_neg_subus = counter_subus - last_tick;
    }
    inst.regs.counter = counter_val;
    update_timers(sim, rtc);
}

/// Reconcile the COUNTER register with virtual time (done on register read).
pub fn update_counter_reg(sim: &mut Simulator, rtc: usize) {
    let now = now_subus(sim);
    let inst = &mut sim.rtc.inst[rtc];
    if inst.running {
        let elapsed = now - inst.start_subus + inst.start_neg_subus;
        let count = subus_to_counter(inst, elapsed);
        inst.regs.counter = (count as u32) & RTC_COUNTER_MASK;
    } else {
        inst.regs.counter = inst.counter_at_stop & RTC_COUNTER_MASK;
    }
}

/// The CLOCK model reports the first LF clock edge; it anchors all sub-us
/// tick arithmetic from then on.
pub fn notify_first_lf_tick(sim: &mut Simulator) {
    sim.rtc.first_lf_tick_subus = now_subus(sim);
    log::trace!("RTC: first LF tick at {}us", sim.sched.now());
}

fn check_not_supported_tick(mask: u32) {
    if mask & EVTEN_TICK != 0 {
        log::warn!("RTC: the TICK functionality is not modelled");
    }
}

fn eval_interrupts(sim: &mut Simulator, rtc: usize) {
    let inst = &mut sim.rtc.inst[rtc];
    let mut new_line = false;
    for cc in 0..inst.n_cc {
        if inst.regs.events_compare[cc] != 0 && inst.inten & (EVTEN_COMPARE0 << cc) != 0 {
            new_line = true;
            break;
        }
    }
    if inst.regs.events_tick != 0 && inst.inten & EVTEN_TICK != 0 {
        new_line = true;
    }
    if inst.regs.events_ovrflw != 0 && inst.inten & EVTEN_OVRFLW != 0 {
        new_line = true;
    }
    let mut line = inst.int_line;
    sim.irq
        .toggle_level_irq_line_if(&mut line, new_line, RTC_IRQ_MAP[rtc]);
    sim.rtc.inst[rtc].int_line = line;
}

fn signal_compare(sim: &mut Simulator, rtc: usize, cc: usize) -> Result {
    if sim.rtc.inst[rtc].regs.shorts & (SHORTS_COMPARE0_CLEAR << cc) != 0 {
        task_clear(sim, rtc);
        log::warn!(
            "RTC{rtc}: COMPARE{cc}->CLEAR short used, but CLEAR is instantaneous. \
             A periodic event generated this way runs one count short per period"
        );
    }

    let mask = EVTEN_COMPARE0 << cc;
    let inst = &mut sim.rtc.inst[rtc];
    if (inst.regs.evten | inst.inten) & mask == 0 {
        return Ok(());
    }
    inst.regs.events_compare[cc] = 1;
    let publish = inst.regs.evten & mask != 0;
    eval_interrupts(sim, rtc);
    if publish {
        sim.fabric_event(EventId::RtcCompare(rtc as u8, cc as u8))?;
    }
    Ok(())
}

fn signal_ovrflw(sim: &mut Simulator, rtc: usize) -> Result {
    let inst = &mut sim.rtc.inst[rtc];
    if (inst.regs.evten | inst.inten) & EVTEN_OVRFLW == 0 {
        return Ok(());
    }
    inst.regs.events_ovrflw = 1;
    let publish = inst.regs.evten & EVTEN_OVRFLW != 0;
    eval_interrupts(sim, rtc);
    if publish {
        sim.fabric_event(EventId::RtcOvrflw(rtc as u8))?;
    }
    Ok(())
}

fn handle_overflow_event(sim: &mut Simulator, rtc: usize) -> Result {
    // The exact sub-us time of this overflow becomes the new counter start.
    let overflow_subus = sim.rtc.inst[rtc].overflow_timer_subus;
    update_overflow_timer(sim, rtc);
    log::trace!("RTC{rtc}: counter overflow");
    let inst = &mut sim.rtc.inst[rtc];
    inst.start_subus = overflow_subus;
    inst.start_neg_subus = 0;
    signal_ovrflw(sim, rtc)
}

/// Shared scheduler slot callback: fire every CC/overflow matching `now`.
pub fn timer_triggered(sim: &mut Simulator) -> Result {
    let t_now = sim.sched.now();
    for rtc in 0..N_RTC {
        if !sim.rtc.inst[rtc].running {
            continue;
        }
        for cc in 0..sim.rtc.inst[rtc].n_cc {
            if sim.rtc.inst[rtc].cc_timers[cc] == t_now {
                update_cc_timer(sim, rtc, cc);
                signal_compare(sim, rtc, cc)?;
            }
        }
        // Overflow handled last: it moves the counter start time.
        if sim.rtc.inst[rtc].overflow_timer == t_now {
            handle_overflow_event(sim, rtc)?;
        }
    }
    update_master_timer(sim);
    Ok(())
}

pub fn task_start(sim: &mut Simulator, rtc: usize) {
    if sim.rtc.inst[rtc].running {
        return;
    }
    log::debug!("RTC{rtc}: TASK_START");
    let inst = &mut sim.rtc.inst[rtc];
    inst.running = true;
    // Pre-scaler latches on START, CLEAR and TRIGOVRFLW.
    inst.presc = inst.regs.prescaler;
    let resume = inst.counter_at_stop;
    // A non-zero counter at start behaves as if the counter started earlier.
    set_counter(sim, rtc, resume);
}

pub fn task_stop(sim: &mut Simulator, rtc: usize) {
    if !sim.rtc.inst[rtc].running {
        return;
    }
    log::debug!("RTC{rtc}: TASK_STOP");
    let now = now_subus(sim);
    let inst = &mut sim.rtc.inst[rtc];
    inst.running = false;
    let elapsed = now - inst.start_subus + inst.start_neg_subus;
    inst.counter_at_stop = (subus_to_counter(inst, elapsed) as u32) & RTC_COUNTER_MASK;
    inst.regs.counter = inst.counter_at_stop;
    for cc in 0..N_CC {
        inst.cc_timers[cc] = NEVER;
    }
    inst.overflow_timer = NEVER;
    update_master_timer(sim);
}

pub fn task_clear(sim: &mut Simulator, rtc: usize) {
    log::debug!("RTC{rtc}: TASK_CLEAR");
    let inst = &mut sim.rtc.inst[rtc];
    inst.presc = inst.regs.prescaler;
    inst.counter_at_stop = 0;
    set_counter(sim, rtc, 0);
}

pub fn task_trigovrflw(sim: &mut Simulator, rtc: usize) {
    log::debug!("RTC{rtc}: TASK_TRIGOVRFLW");
    let inst = &mut sim.rtc.inst[rtc];
    inst.presc = inst.regs.prescaler;
    inst.counter_at_stop = RTC_TRIGGER_OVERFLOW_COUNTER_VALUE;
    set_counter(sim, rtc, RTC_TRIGGER_OVERFLOW_COUNTER_VALUE);
}

pub fn task_capture(sim: &mut Simulator, rtc: usize, cc: usize) {
    if cc >= sim.rtc.inst[rtc].n_cc {
        log::warn!("RTC{rtc}: CAPTURE[{cc}] beyond the instance CC count, ignored");
        return;
    }
    update_counter_reg(sim, rtc);
    let inst = &mut sim.rtc.inst[rtc];
    inst.regs.cc[cc] = inst.regs.counter;
    if sim.rtc.inst[rtc].running {
        update_cc_timer(sim, rtc, cc);
        update_master_timer(sim);
    }
}

pub fn run_task(sim: &mut Simulator, rtc: usize, task: RtcTask) {
    match task {
        RtcTask::Start => task_start(sim, rtc),
        RtcTask::Stop => task_stop(sim, rtc),
        RtcTask::Clear => task_clear(sim, rtc),
        RtcTask::TrigOvrflw => task_trigovrflw(sim, rtc),
        RtcTask::Capture(cc) => task_capture(sim, rtc, cc as usize),
    }
}

/// Register write with side effects.
pub fn regw(sim: &mut Simulator, rtc: usize, off: u32, value: u32) -> Result {
    match off {
        offs::TASKS_START => {
            if value != 0 {
                task_start(sim, rtc);
            }
        }
        offs::TASKS_STOP => {
            if value != 0 {
                task_stop(sim, rtc);
            }
        }
        offs::TASKS_CLEAR => {
            if value != 0 {
                task_clear(sim, rtc);
            }
        }
        offs::TASKS_TRIGOVRFLW => {
            if value != 0 {
                task_trigovrflw(sim, rtc);
            }
        }
        o if (offs::TASKS_CAPTURE0..offs::TASKS_CAPTURE0 + 4 * N_CC as u32).contains(&o)
            && o & 3 == 0 =>
        {
            if value != 0 {
                task_capture(sim, rtc, ((o - offs::TASKS_CAPTURE0) / 4) as usize);
            }
        }
        offs::EVENTS_TICK => {
            sim.rtc.inst[rtc].regs.events_tick = value;
            eval_interrupts(sim, rtc);
        }
        offs::EVENTS_OVRFLW => {
            sim.rtc.inst[rtc].regs.events_ovrflw = value;
            eval_interrupts(sim, rtc);
        }
        o if (offs::EVENTS_COMPARE0..offs::EVENTS_COMPARE0 + 4 * N_CC as u32).contains(&o)
            && o & 3 == 0 =>
        {
            let cc = ((o - offs::EVENTS_COMPARE0) / 4) as usize;
            sim.rtc.inst[rtc].regs.events_compare[cc] = value;
            eval_interrupts(sim, rtc);
        }
        offs::SHORTS => sim.rtc.inst[rtc].regs.shorts = value,
        offs::INTENSET => {
            if value != 0 {
                sim.rtc.inst[rtc].inten |= value;
                check_not_supported_tick(sim.rtc.inst[rtc].inten);
                eval_interrupts(sim, rtc);
            }
        }
        offs::INTENCLR => {
            if value != 0 {
                sim.rtc.inst[rtc].inten &= !value;
                eval_interrupts(sim, rtc);
            }
        }
        offs::EVTEN => {
            sim.rtc.inst[rtc].regs.evten = value;
            check_not_supported_tick(value);
        }
        offs::EVTENSET => {
            if value != 0 {
                sim.rtc.inst[rtc].regs.evten |= value;
                check_not_supported_tick(sim.rtc.inst[rtc].regs.evten);
            }
        }
        offs::EVTENCLR => {
            if value != 0 {
                sim.rtc.inst[rtc].regs.evten &= !value;
            }
        }
        offs::PRESCALER => {
            // Not latched until START/CLEAR/TRIGOVRFLW; writing while
            // running is not prevented (unlike hardware).
            sim.rtc.inst[rtc].regs.prescaler = value & 0xFFF;
        }
        o if (offs::CC0..offs::CC0 + 4 * N_CC as u32).contains(&o) && o & 3 == 0 => {
            let cc = ((o - offs::CC0) / 4) as usize;
            sim.rtc.inst[rtc].regs.cc[cc] = value & RTC_COUNTER_MASK;
            if sim.rtc.inst[rtc].running {
                update_cc_timer(sim, rtc, cc);
                update_master_timer(sim);
            }
        }
        _ => {
            if !dppi_regw(sim, rtc, off, value) {
                log::warn!("RTC{rtc}: write to unknown offset 0x{off:03x} ignored");
            }
        }
    }
    Ok(())
}

/// DPPI SUBSCRIBE/PUBLISH registers (task offset + 0x80 / event + 0x80).
fn dppi_regw(sim: &mut Simulator, rtc: usize, off: u32, value: u32) -> bool {
    let Fabric::Dppi(dppi) = &mut sim.fabric else {
        return false;
    };
    let r = rtc as u8;
    match off {
        0x080 => dppi.write_subscribe(TaskId::Rtc(r, RtcTask::Start), value),
        0x084 => dppi.write_subscribe(TaskId::Rtc(r, RtcTask::Stop), value),
        0x088 => dppi.write_subscribe(TaskId::Rtc(r, RtcTask::Clear), value),
        0x08C => dppi.write_subscribe(TaskId::Rtc(r, RtcTask::TrigOvrflw), value),
        o if (0x0C0..0x0C0 + 4 * N_CC as u32).contains(&o) && o & 3 == 0 => {
            let cc = ((o - 0x0C0) / 4) as u8;
            dppi.write_subscribe(TaskId::Rtc(r, RtcTask::Capture(cc)), value);
        }
        0x184 => dppi.write_publish(EventId::RtcOvrflw(r), value),
        o if (0x1C0..0x1C0 + 4 * N_CC as u32).contains(&o) && o & 3 == 0 => {
            let cc = ((o - 0x1C0) / 4) as u8;
            dppi.write_publish(EventId::RtcCompare(r, cc), value);
        }
        _ => return false,
    }
    true
}

/// Register read (COUNTER reconciles with virtual time first).
pub fn regr(sim: &mut Simulator, rtc: usize, off: u32) -> u32 {
    match off {
        offs::EVENTS_TICK => sim.rtc.inst[rtc].regs.events_tick,
        offs::EVENTS_OVRFLW => sim.rtc.inst[rtc].regs.events_ovrflw,
        o if (offs::EVENTS_COMPARE0..offs::EVENTS_COMPARE0 + 4 * N_CC as u32).contains(&o)
            && o & 3 == 0 =>
        {
            sim.rtc.inst[rtc].regs.events_compare[((o - offs::EVENTS_COMPARE0) / 4) as usize]
        }
        offs::SHORTS => sim.rtc.inst[rtc].regs.shorts,
        offs::INTENSET => sim.rtc.inst[rtc].inten,
        offs::INTENCLR => 0,
        offs::EVTEN | offs::EVTENSET => sim.rtc.inst[rtc].regs.evten,
        offs::EVTENCLR => 0,
        offs::COUNTER => {
            update_counter_reg(sim, rtc);
            sim.rtc.inst[rtc].regs.counter
        }
        offs::PRESCALER => sim.rtc.inst[rtc].regs.prescaler,
        o if (offs::CC0..offs::CC0 + 4 * N_CC as u32).contains(&o) && o & 3 == 0 => {
            sim.rtc.inst[rtc].regs.cc[((o - offs::CC0) / 4) as usize]
        }
        _ => 0,
    }
}
