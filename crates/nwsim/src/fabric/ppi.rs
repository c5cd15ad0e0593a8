// SPDX-License-Identifier: Apache-2.0 OR MIT

//! PPI - programmable peripheral interconnect.
//!
//! 32 channels routing one event each onto a task (plus an optional fork
//! task). Channels 0..20 are programmable through the CH[n].EEP/TEP and
//! FORK[n].TEP address registers; 20..31 are fixed-function. A 32-bit CHEN
//! mask gates dispatch, and six CHG groups can be flipped atomically
//! through the PPI's own TASKS_CHG[n].EN/DIS.
//!
//! The EEP/TEP registers hold MMIO addresses of event/task registers; a
//! write rebuilds the affected routing row by looking the address up in a
//! sorted table of every routable register. Unknown addresses log a
//! warning and the row routes to nothing.
//!
//! In real hardware two events hitting the same task within one 16 MHz
//! clock edge trigger it only once; the task queue models that by eliding
//! duplicates within a dispatch round.

use crate::bus;
use crate::fabric::{AarTask, AddrTarget, CcmTask, ClockTask, EventId, RadioEvent, RadioTask, RtcTask, TaskId, TimerTask};
use crate::periph::{aar, clock, egu, radio, rng, rtc, temp, timer};
use std::collections::HashMap;

pub const N_CH: usize = 32;
pub const N_PROG_CH: usize = 20;
pub const N_CHG: usize = 6;

pub mod offs {
    pub const TASKS_CHG0_EN: u32 = 0x000;
    pub const TASKS_CHG0_DIS: u32 = 0x004;
    pub const CHEN: u32 = 0x500;
    pub const CHENSET: u32 = 0x504;
    pub const CHENCLR: u32 = 0x508;
    pub const CH0_EEP: u32 = 0x510;
    pub const CH0_TEP: u32 = 0x514;
    pub const CHG0: u32 = 0x800;
    pub const FORK0_TEP: u32 = 0x910;
}

pub struct Ppi {
    pub chen: u32,
    pub chg: [u32; N_CHG],
    pub ch_eep: [u32; N_PROG_CH],
    pub ch_tep: [u32; N_PROG_CH],
    pub fork_tep: [u32; N_CH],
    evt_to_ch: HashMap<EventId, u32>,
    ch_task: [Option<TaskId>; N_CH],
    ch_fork: [Option<TaskId>; N_CH],
}

impl Default for Ppi {
    fn default() -> Self {
        Self::new()
    }
}

impl Ppi {
    pub fn new() -> Self {
        let mut ppi = Self {
            chen: 0,
            chg: [0; N_CHG],
            ch_eep: [0; N_PROG_CH],
            ch_tep: [0; N_PROG_CH],
            fork_tep: [0; N_CH],
            evt_to_ch: HashMap::new(),
            ch_task: [None; N_CH],
            ch_fork: [None; N_CH],
        };
        ppi.install_fixed_routes();
        ppi
    }

    /// The fixed-function channels of the modelled variant.
    fn install_fixed_routes(&mut self) {
        let fixed: [(EventId, usize, TaskId); 12] = [
            (EventId::TimerCompare(0, 0), 20, TaskId::Radio(RadioTask::TxEn)),
            (EventId::TimerCompare(0, 0), 21, TaskId::Radio(RadioTask::RxEn)),
            (EventId::TimerCompare(0, 1), 22, TaskId::Radio(RadioTask::Disable)),
            (EventId::Radio(RadioEvent::Bcmatch), 23, TaskId::Aar(AarTask::Start)),
            (EventId::Radio(RadioEvent::Ready), 24, TaskId::Ccm(CcmTask::KsGen)),
            (EventId::Radio(RadioEvent::Address), 25, TaskId::Ccm(CcmTask::Crypt)),
            (EventId::Radio(RadioEvent::Address), 26, TaskId::Timer(0, TimerTask::Capture(1))),
            (EventId::Radio(RadioEvent::End), 27, TaskId::Timer(0, TimerTask::Capture(2))),
            (EventId::RtcCompare(0, 0), 28, TaskId::Radio(RadioTask::TxEn)),
            (EventId::RtcCompare(0, 0), 29, TaskId::Radio(RadioTask::RxEn)),
            (EventId::RtcCompare(0, 0), 30, TaskId::Timer(0, TimerTask::Clear)),
            (EventId::RtcCompare(0, 0), 31, TaskId::Timer(0, TimerTask::Start)),
        ];
        for (ev, ch, task) in fixed {
            *self.evt_to_ch.entry(ev).or_insert(0) |= 1 << ch;
            self.ch_task[ch] = Some(task);
        }
    }

    /// Append the tasks of every enabled channel this event is wired to.
    pub fn collect(&self, ev: EventId, out: &mut Vec<TaskId>) {
        let Some(&mask) = self.evt_to_ch.get(&ev) else {
            return;
        };
        let mut mask = mask & self.chen;
        while mask != 0 {
            let ch = mask.trailing_zeros() as usize;
            mask &= mask - 1;
            if let Some(task) = self.ch_task[ch] {
                out.push(task);
            }
            if let Some(fork) = self.ch_fork[ch] {
                out.push(fork);
            }
        }
    }

    pub fn chg_endis(&mut self, group: usize, enable: bool) {
        if enable {
            log::trace!("ppi: channel group {group} enabled");
            self.chen |= self.chg[group];
        } else {
            log::trace!("ppi: channel group {group} disabled");
            self.chen &= !self.chg[group];
        }
    }

    fn set_eep(&mut self, ch: usize, addr: u32, target: Option<AddrTarget>) {
        self.ch_eep[ch] = addr;
        // Drop this channel from every event mask, then re-add it.
        for mask in self.evt_to_ch.values_mut() {
            *mask &= !(1u32 << ch);
        }
        if addr == 0 {
            return;
        }
        match target {
            Some(AddrTarget::Event(ev)) => {
                *self.evt_to_ch.entry(ev).or_insert(0) |= 1 << ch;
            }
            _ => log::warn!(
                "PPI: CH[{ch}].EEP=0x{addr:08x} does not match any modelled event, \
                 the channel will not fire"
            ),
        }
    }

    fn set_tep(&mut self, ch: usize, addr: u32, target: Option<AddrTarget>, fork: bool) {
        if fork {
            self.fork_tep[ch] = addr;
        } else {
            self.ch_tep[ch] = addr;
        }
        let slot = if fork {
            &mut self.ch_fork[ch]
        } else {
            &mut self.ch_task[ch]
        };
        if addr == 0 {
            *slot = None;
            return;
        }
        match target {
            Some(AddrTarget::Task(task)) => *slot = Some(task),
            _ => {
                log::warn!(
                    "PPI: {}[{ch}].TEP=0x{addr:08x} does not match any modelled task, \
                     it will be ignored",
                    if fork { "FORK" } else { "CH" }
                );
                *slot = None;
            }
        }
    }
}

/// Resolve an MMIO address to the event or task register it names.
///
/// `aar_selected` disambiguates the CCM/AAR shared block: both peripherals
/// live at the same base and overlap task/event offsets; the ENABLE
/// register decides which personality the block currently has.
pub fn resolve_addr(addr: u32, aar_selected: bool) -> Option<AddrTarget> {
    use AddrTarget::{Event, Task};

    let base = addr & 0xFFFF_F000;
    let off = addr & 0xFFF;

    if base == bus::RADIO_BASE {
        use radio::offs as r;
        return match off {
            r::TASKS_TXEN => Some(Task(TaskId::Radio(RadioTask::TxEn))),
            r::TASKS_RXEN => Some(Task(TaskId::Radio(RadioTask::RxEn))),
            r::TASKS_START => Some(Task(TaskId::Radio(RadioTask::Start))),
            r::TASKS_STOP => Some(Task(TaskId::Radio(RadioTask::Stop))),
            r::TASKS_DISABLE => Some(Task(TaskId::Radio(RadioTask::Disable))),
            r::TASKS_RSSISTART => Some(Task(TaskId::Radio(RadioTask::RssiStart))),
            r::TASKS_RSSISTOP => Some(Task(TaskId::Radio(RadioTask::RssiStop))),
            r::TASKS_BCSTART => Some(Task(TaskId::Radio(RadioTask::BcStart))),
            r::TASKS_BCSTOP => Some(Task(TaskId::Radio(RadioTask::BcStop))),
            r::TASKS_EDSTART => Some(Task(TaskId::Radio(RadioTask::EdStart))),
            r::TASKS_EDSTOP => Some(Task(TaskId::Radio(RadioTask::EdStop))),
            r::TASKS_CCASTART => Some(Task(TaskId::Radio(RadioTask::CcaStart))),
            r::TASKS_CCASTOP => Some(Task(TaskId::Radio(RadioTask::CcaStop))),
            r::EVENTS_READY => Some(Event(EventId::Radio(RadioEvent::Ready))),
            r::EVENTS_ADDRESS => Some(Event(EventId::Radio(RadioEvent::Address))),
            r::EVENTS_PAYLOAD => Some(Event(EventId::Radio(RadioEvent::Payload))),
            r::EVENTS_END => Some(Event(EventId::Radio(RadioEvent::End))),
            r::EVENTS_DISABLED => Some(Event(EventId::Radio(RadioEvent::Disabled))),
            r::EVENTS_DEVMATCH => Some(Event(EventId::Radio(RadioEvent::Devmatch))),
            r::EVENTS_DEVMISS => Some(Event(EventId::Radio(RadioEvent::Devmiss))),
            r::EVENTS_RSSIEND => Some(Event(EventId::Radio(RadioEvent::RssiEnd))),
            r::EVENTS_BCMATCH => Some(Event(EventId::Radio(RadioEvent::Bcmatch))),
            r::EVENTS_CRCOK => Some(Event(EventId::Radio(RadioEvent::CrcOk))),
            r::EVENTS_CRCERROR => Some(Event(EventId::Radio(RadioEvent::CrcError))),
            r::EVENTS_FRAMESTART => Some(Event(EventId::Radio(RadioEvent::Framestart))),
            r::EVENTS_EDEND => Some(Event(EventId::Radio(RadioEvent::EdEnd))),
            r::EVENTS_EDSTOPPED => Some(Event(EventId::Radio(RadioEvent::EdStopped))),
            r::EVENTS_CCAIDLE => Some(Event(EventId::Radio(RadioEvent::CcaIdle))),
            r::EVENTS_CCABUSY => Some(Event(EventId::Radio(RadioEvent::CcaBusy))),
            r::EVENTS_CCASTOPPED => Some(Event(EventId::Radio(RadioEvent::CcaStopped))),
            r::EVENTS_RATEBOOST => Some(Event(EventId::Radio(RadioEvent::Rateboost))),
            r::EVENTS_TXREADY => Some(Event(EventId::Radio(RadioEvent::TxReady))),
            r::EVENTS_RXREADY => Some(Event(EventId::Radio(RadioEvent::RxReady))),
            r::EVENTS_SYNC => Some(Event(EventId::Radio(RadioEvent::Sync))),
            r::EVENTS_PHYEND => Some(Event(EventId::Radio(RadioEvent::PhyEnd))),
            _ => None,
        };
    }

    if let Some(inst) = bus::rtc_index(base) {
        use rtc::offs as r;
        let i = inst as u8;
        return match off {
            r::TASKS_START => Some(Task(TaskId::Rtc(i, RtcTask::Start))),
            r::TASKS_STOP => Some(Task(TaskId::Rtc(i, RtcTask::Stop))),
            r::TASKS_CLEAR => Some(Task(TaskId::Rtc(i, RtcTask::Clear))),
            r::TASKS_TRIGOVRFLW => Some(Task(TaskId::Rtc(i, RtcTask::TrigOvrflw))),
            r::EVENTS_OVRFLW => Some(Event(EventId::RtcOvrflw(i))),
            r::EVENTS_TICK => Some(Event(EventId::RtcTick(i))),
            o if (r::EVENTS_COMPARE0..r::EVENTS_COMPARE0 + 16).contains(&o) && o & 3 == 0 => {
                Some(Event(EventId::RtcCompare(i, ((o - r::EVENTS_COMPARE0) / 4) as u8)))
            }
            _ => None,
        };
    }

    if let Some(inst) = bus::timer_index(base) {
        use timer::offs as t;
        let i = inst as u8;
        return match off {
            t::TASKS_START => Some(Task(TaskId::Timer(i, TimerTask::Start))),
            t::TASKS_STOP => Some(Task(TaskId::Timer(i, TimerTask::Stop))),
            t::TASKS_COUNT => Some(Task(TaskId::Timer(i, TimerTask::Count))),
            t::TASKS_CLEAR => Some(Task(TaskId::Timer(i, TimerTask::Clear))),
            t::TASKS_SHUTDOWN => Some(Task(TaskId::Timer(i, TimerTask::Shutdown))),
            o if (t::TASKS_CAPTURE0..t::TASKS_CAPTURE0 + 24).contains(&o) && o & 3 == 0 => {
                Some(Task(TaskId::Timer(i, TimerTask::Capture(((o - t::TASKS_CAPTURE0) / 4) as u8))))
            }
            o if (t::EVENTS_COMPARE0..t::EVENTS_COMPARE0 + 24).contains(&o) && o & 3 == 0 => {
                Some(Event(EventId::TimerCompare(i, ((o - t::EVENTS_COMPARE0) / 4) as u8)))
            }
            _ => None,
        };
    }

    if base == bus::CCM_AAR_BASE {
        use crate::periph::{aar::offs as a, ccm::offs as c};
        return if aar_selected {
            match off {
                a::TASKS_START => Some(Task(TaskId::Aar(AarTask::Start))),
                a::TASKS_STOP => Some(Task(TaskId::Aar(AarTask::Stop))),
                a::EVENTS_END => Some(Event(EventId::AarEnd)),
                a::EVENTS_RESOLVED => Some(Event(EventId::AarResolved)),
                a::EVENTS_NOTRESOLVED => Some(Event(EventId::AarNotResolved)),
                _ => None,
            }
        } else {
            match off {
                c::TASKS_KSGEN => Some(Task(TaskId::Ccm(CcmTask::KsGen))),
                c::TASKS_CRYPT => Some(Task(TaskId::Ccm(CcmTask::Crypt))),
                c::TASKS_STOP => Some(Task(TaskId::Ccm(CcmTask::Stop))),
                c::EVENTS_ENDKSGEN => Some(Event(EventId::CcmEndKsgen)),
                c::EVENTS_ENDCRYPT => Some(Event(EventId::CcmEndCrypt)),
                c::EVENTS_ERROR => Some(Event(EventId::CcmError)),
                _ => None,
            }
        };
    }

    if base == bus::CLOCK_BASE {
        use clock::offs as c;
        return match off {
            c::TASKS_HFCLKSTART => Some(Task(TaskId::Clock(ClockTask::HfClkStart))),
            c::TASKS_HFCLKSTOP => Some(Task(TaskId::Clock(ClockTask::HfClkStop))),
            c::TASKS_LFCLKSTART => Some(Task(TaskId::Clock(ClockTask::LfClkStart))),
            c::TASKS_LFCLKSTOP => Some(Task(TaskId::Clock(ClockTask::LfClkStop))),
            c::TASKS_CAL => Some(Task(TaskId::Clock(ClockTask::Cal))),
            c::TASKS_CTSTART => Some(Task(TaskId::Clock(ClockTask::CtStart))),
            c::TASKS_CTSTOP => Some(Task(TaskId::Clock(ClockTask::CtStop))),
            c::EVENTS_HFCLKSTARTED => Some(Event(EventId::ClockHfStarted)),
            c::EVENTS_LFCLKSTARTED => Some(Event(EventId::ClockLfStarted)),
            c::EVENTS_DONE => Some(Event(EventId::ClockDone)),
            c::EVENTS_CTTO => Some(Event(EventId::ClockCtto)),
            c::EVENTS_CTSTARTED => Some(Event(EventId::ClockCtStarted)),
            c::EVENTS_CTSTOPPED => Some(Event(EventId::ClockCtStopped)),
            _ => None,
        };
    }

    if base == bus::RNG_BASE {
        use rng::offs as r;
        return match off {
            r::TASKS_START => Some(Task(TaskId::RngStart)),
            r::TASKS_STOP => Some(Task(TaskId::RngStop)),
            r::EVENTS_VALRDY => Some(Event(EventId::RngValrdy)),
            _ => None,
        };
    }

    if base == bus::TEMP_BASE {
        use temp::offs as t;
        return match off {
            t::TASKS_START => Some(Task(TaskId::TempStart)),
            t::TASKS_STOP => Some(Task(TaskId::TempStop)),
            t::EVENTS_DATARDY => Some(Event(EventId::TempDatardy)),
            _ => None,
        };
    }

    if let Some(inst) = bus::egu_index(base) {
        use egu::offs as e;
        let i = inst as u8;
        if (e::TASKS_TRIGGER0..e::TASKS_TRIGGER0 + 64).contains(&off) && off & 3 == 0 {
            return Some(Task(TaskId::EguTrigger(i, ((off - e::TASKS_TRIGGER0) / 4) as u8)));
        }
        if (e::EVENTS_TRIGGERED0..e::EVENTS_TRIGGERED0 + 64).contains(&off) && off & 3 == 0 {
            return Some(Event(EventId::EguTriggered(
                i,
                ((off - e::EVENTS_TRIGGERED0) / 4) as u8,
            )));
        }
        return None;
    }

    None
}

/// PPI register write (MMIO side effects included).
pub fn regw(sim: &mut crate::sim::Simulator, off: u32, value: u32) -> crate::Result {
    use crate::fabric::Fabric;

    // CCM/AAR personality for EEP/TEP resolution, sampled at write time.
    let aar_selected = sim.ccm.regs.enable == aar::ENABLE_AAR;

    let Fabric::Ppi(ppi) = &mut sim.fabric else {
        log::warn!("PPI registers written on a DPPI device variant, ignored");
        return Ok(());
    };

    match off {
        o if o < 8 * N_CHG as u32 => {
            let group = (o / 8) as usize;
            if value != 0 {
                ppi.chg_endis(group, o % 8 == 0);
            }
        }
        offs::CHEN => ppi.chen = value,
        offs::CHENSET => ppi.chen |= value,
        offs::CHENCLR => ppi.chen &= !value,
        o if (offs::CH0_EEP..offs::CH0_EEP + 8 * N_PROG_CH as u32).contains(&o) && o & 7 == 0 => {
            let ch = ((o - offs::CH0_EEP) / 8) as usize;
            let target = resolve_addr(value, aar_selected);
            ppi.set_eep(ch, value, target);
        }
        o if (offs::CH0_TEP..offs::CH0_TEP + 8 * N_PROG_CH as u32).contains(&o) && o & 7 == 4 => {
            let ch = ((o - offs::CH0_TEP) / 8) as usize;
            let target = resolve_addr(value, aar_selected);
            ppi.set_tep(ch, value, target, false);
        }
        o if (offs::CHG0..offs::CHG0 + 4 * N_CHG as u32).contains(&o) && o & 3 == 0 => {
            ppi.chg[((o - offs::CHG0) / 4) as usize] = value;
        }
        o if (offs::FORK0_TEP..offs::FORK0_TEP + 4 * N_CH as u32).contains(&o) && o & 3 == 0 => {
            let ch = ((o - offs::FORK0_TEP) / 4) as usize;
            let target = resolve_addr(value, aar_selected);
            ppi.set_tep(ch, value, target, true);
        }
        _ => log::warn!("PPI: write to unknown offset 0x{off:03x} ignored"),
    }
    Ok(())
}

/// PPI register read.
pub fn regr(sim: &crate::sim::Simulator, off: u32) -> u32 {
    use crate::fabric::Fabric;
    let Fabric::Ppi(ppi) = &sim.fabric else {
        return 0;
    };
    match off {
        offs::CHEN => ppi.chen,
        // CHEN is not readable through the SET/CLR views.
        offs::CHENSET | offs::CHENCLR => 0,
        o if (offs::CH0_EEP..offs::CH0_EEP + 8 * N_PROG_CH as u32).contains(&o) && o & 7 == 0 => {
            ppi.ch_eep[((o - offs::CH0_EEP) / 8) as usize]
        }
        o if (offs::CH0_TEP..offs::CH0_TEP + 8 * N_PROG_CH as u32).contains(&o) && o & 7 == 4 => {
            ppi.ch_tep[((o - offs::CH0_TEP) / 8) as usize]
        }
        o if (offs::CHG0..offs::CHG0 + 4 * N_CHG as u32).contains(&o) && o & 3 == 0 => {
            ppi.chg[((o - offs::CHG0) / 4) as usize]
        }
        o if (offs::FORK0_TEP..offs::FORK0_TEP + 4 * N_CH as u32).contains(&o) && o & 3 == 0 => {
            ppi.fork_tep[((o - offs::FORK0_TEP) / 4) as usize]
        }
        _ => 0,
    }
}
