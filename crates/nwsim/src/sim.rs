// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The simulator context: every peripheral's state, the scheduler, the
//! fabric and the Phy connection, advanced by a single-threaded,
//! run-to-completion event loop.
//!
//! Peripheral callbacks never preempt each other; virtual time only moves
//! between callbacks. Whenever the device is about to run far ahead of the
//! last point the Phy knows about, an explicit `wait` is issued so the
//! rest of the simulation can make progress.

use crate::bus;
use crate::config::{DeviceConfig, FabricKind};
use crate::crypto::BleCrypt;
use crate::fabric::{Dppi, EventId, Fabric, Ppi, TaskId, TaskQueue};
use crate::irq::IrqCtl;
use crate::mem::DevMem;
use crate::periph::aar::Aar;
use crate::periph::ccm::Ccm;
use crate::periph::clock::Clock;
use crate::periph::egu::{Egu, N_EGU};
use crate::periph::radio::Radio;
use crate::periph::rng::Rng;
use crate::periph::rtc::RtcSet;
use crate::periph::temp::Temp;
use crate::periph::timer::TimerSet;
use crate::periph::{aar, ccm, clock, egu, radio, rng, rtc, temp, timer};
use crate::phy::{PhyLink, TimeXlat};
use crate::sched::{Scheduler, Slot};
use crate::time::{Instant, NEVER};
use crate::{Result, SimError};

/// Iterations allowed at a single microsecond before the loop is declared
/// stuck (a peripheral forgot to move or cancel its slot).
const MAX_DISPATCHES_PER_US: u32 = 100_000;

pub struct Simulator {
    pub cfg: DeviceConfig,
    pub sched: Scheduler,
    pub irq: IrqCtl,
    pub fabric: Fabric,
    pub taskq: TaskQueue,
    pub mem: DevMem,
    pub phy: Box<dyn PhyLink>,
    pub xlat: TimeXlat,
    last_phy_sync: Instant,
    pub crypt: BleCrypt,
    pub radio: Radio,
    pub rtc: RtcSet,
    pub timers: TimerSet,
    pub ccm: Ccm,
    pub aar: Aar,
    pub clock: Clock,
    pub egu: [Egu; N_EGU],
    pub rng: Rng,
    pub temp: Temp,
}

impl Simulator {
    /// Bring up all hardware models with their reset values.
    pub fn new(cfg: DeviceConfig, phy: Box<dyn PhyLink>) -> Self {
        let fabric = match cfg.fabric {
            FabricKind::Ppi => Fabric::Ppi(Ppi::new()),
            FabricKind::Dppi => Fabric::Dppi(Dppi::new()),
        };
        let xlat = TimeXlat::new(cfg.args.start_offset, cfg.args.xo_drift);
        let crypt = BleCrypt::new(cfg.args.real_encryption);
        Self {
            cfg,
            sched: Scheduler::new(),
            irq: IrqCtl::new(),
            fabric,
            taskq: TaskQueue::default(),
            mem: DevMem::default(),
            phy,
            xlat,
            last_phy_sync: 0,
            crypt,
            radio: Radio::default(),
            rtc: RtcSet::default(),
            timers: TimerSet::default(),
            ccm: Ccm::default(),
            aar: Aar::default(),
            clock: Clock::default(),
            egu: Default::default(),
            rng: Rng::default(),
            temp: Temp::default(),
        }
    }

    pub fn now(&self) -> Instant {
        self.sched.now()
    }

    /// Record the latest virtual time the Phy is known to have processed.
    pub fn set_last_phy_sync(&mut self, t: Instant) {
        if t != NEVER && t > self.last_phy_sync {
            self.last_phy_sync = t;
        }
    }

    /// An event fired: route it through the fabric and run every triggered
    /// task exactly once. Events raised inside tasks are folded into the
    /// same round; the dedup set breaks event->task->event cycles.
    pub fn fabric_event(&mut self, ev: EventId) -> Result {
        let mut tasks = Vec::new();
        self.fabric.collect(ev, &mut tasks);
        for task in tasks {
            self.taskq.enqueue(task);
        }
        if self.taskq.draining {
            return Ok(());
        }
        self.taskq.draining = true;
        let result = self.drain_tasks();
        self.taskq.finish_round();
        result
    }

    fn drain_tasks(&mut self) -> Result {
        while let Some(task) = self.taskq.pop() {
            self.run_task(task)?;
        }
        Ok(())
    }

    /// Trigger one hardware task, exactly as the fabric (or a test) would.
    pub fn run_task(&mut self, task: TaskId) -> Result {
        match task {
            TaskId::Clock(t) => clock::run_task(self, t),
            TaskId::Radio(t) => radio::run_task(self, t),
            TaskId::Rtc(i, t) => {
                rtc::run_task(self, i as usize, t);
                Ok(())
            }
            TaskId::Timer(i, t) => timer::run_task(self, i as usize, t),
            TaskId::Ccm(t) => ccm::run_task(self, t),
            TaskId::Aar(t) => aar::run_task(self, t),
            TaskId::RngStart => {
                rng::task_start(self);
                Ok(())
            }
            TaskId::RngStop => {
                rng::task_stop(self);
                Ok(())
            }
            TaskId::TempStart => {
                temp::task_start(self);
                Ok(())
            }
            TaskId::TempStop => {
                temp::task_stop(self);
                Ok(())
            }
            TaskId::EguTrigger(i, line) => egu::task_trigger(self, i as usize, line as usize),
        }
    }

    fn dispatch_slot(&mut self, slot: Slot) -> Result {
        match slot {
            Slot::Rng => rng::timer_triggered(self),
            Slot::Temp => temp::timer_triggered(self),
            Slot::Aar => aar::timer_triggered(self),
            Slot::ClockLf => clock::lf_timer_triggered(self),
            Slot::ClockHf => clock::hf_timer_triggered(self),
            Slot::Rtc => rtc::timer_triggered(self),
            Slot::Timer => timer::timer_triggered(self),
            Slot::Radio => radio::timer_triggered(self),
            Slot::RadioBitcounter => radio::bitcounter::timer_triggered(self),
            Slot::RadioAbortReeval => radio::abort_reeval_triggered(self),
        }
    }

    /// Advance to the next pending event and dispatch it.
    /// Returns false when nothing is pending.
    pub fn step(&mut self) -> Result<bool> {
        let next = self.sched.next_event_time();
        if next == NEVER {
            return Ok(false);
        }
        // Keep the Phy moving when we idle long without radio traffic.
        if next > self.last_phy_sync.saturating_add(self.cfg.max_resync_offset) {
            // Wait slightly short of the target: margin for the rounding
            // of the clock drift, plus the next activity may start here.
            let end = self.xlat.phy_from_dev(next.saturating_sub(2));
            self.phy.wait(end)?;
            self.last_phy_sync = next;
        }
        let Some(slot) = self.sched.pop_due() else {
            return Ok(false);
        };
        self.dispatch_slot(slot)?;
        Ok(true)
    }

    /// Run every event up to and including `t`, then let time rest at `t`.
    pub fn run_until(&mut self, t: Instant) -> Result {
        let mut last_now = self.sched.now();
        let mut same_us_dispatches: u32 = 0;
        while self.sched.next_event_time() <= t {
            if !self.step()? {
                break;
            }
            if self.sched.now() == last_now {
                same_us_dispatches += 1;
                if same_us_dispatches > MAX_DISPATCHES_PER_US {
                    return Err(SimError::Internal(format!(
                        "scheduler stuck at {last_now}us"
                    )));
                }
            } else {
                last_now = self.sched.now();
                same_us_dispatches = 0;
            }
        }
        self.sched.advance_to(t);
        Ok(())
    }

    /// One 32-bit MMIO write with side effects, as the CPU model would
    /// issue it.
    pub fn write32(&mut self, addr: u32, value: u32) -> Result {
        bus::write32(self, addr, value)
    }

    /// One 32-bit MMIO read.
    pub fn read32(&mut self, addr: u32) -> u32 {
        bus::read32(self, addr)
    }

    /// Tear the device down: detach from the Phy, letting the rest of the
    /// simulation continue.
    pub fn shutdown(&mut self) {
        if let Err(e) = self.phy.disconnect() {
            log::debug!("phy disconnect at shutdown failed: {e}");
        }
    }
}
