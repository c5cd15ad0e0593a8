// SPDX-License-Identifier: Apache-2.0 OR MIT

//! DPPI - distributed programmable peripheral interconnect.
//!
//! Instead of central channel slots, every routable event register has a
//! sibling PUBLISH register and every task register a SUBSCRIBE register,
//! each holding `{channel index | enable bit}`. The DPPIC block itself only
//! carries the channel-enable mask and the channel groups.
//!
//! The per-peripheral PUBLISH/SUBSCRIBE values are stored here, keyed by
//! the event/task identity; peripherals forward their `+0x80` register
//! writes to [`Dppi::write_publish`] / [`Dppi::write_subscribe`].

use crate::fabric::{EventId, TaskId};
use std::collections::HashMap;

pub const N_DPPI_CH: usize = 32;
pub const N_CHG: usize = 6;

/// Enable bit of PUBLISH/SUBSCRIBE registers.
pub const SUBSCRIBE_EN: u32 = 1 << 31;

const CH_MASK: u32 = 0xFF;

pub mod offs {
    pub const TASKS_CHG0_EN: u32 = 0x000;
    pub const TASKS_CHG0_DIS: u32 = 0x004;
    pub const CHEN: u32 = 0x500;
    pub const CHENSET: u32 = 0x504;
    pub const CHENCLR: u32 = 0x508;
    pub const CHG0: u32 = 0x800;
}

pub struct Dppi {
    pub chen: u32,
    pub chg: [u32; N_CHG],
    publish: HashMap<EventId, u32>,
    subscribe: HashMap<TaskId, u32>,
    subs: Vec<Vec<TaskId>>,
}

impl Default for Dppi {
    fn default() -> Self {
        Self::new()
    }
}

impl Dppi {
    pub fn new() -> Self {
        Self {
            chen: 0,
            chg: [0; N_CHG],
            publish: HashMap::new(),
            subscribe: HashMap::new(),
            subs: vec![Vec::new(); N_DPPI_CH],
        }
    }

    pub fn write_publish(&mut self, ev: EventId, value: u32) {
        if value & SUBSCRIBE_EN == 0 {
            self.publish.remove(&ev);
        } else {
            self.publish.insert(ev, value);
        }
    }

    pub fn read_publish(&self, ev: EventId) -> u32 {
        self.publish.get(&ev).copied().unwrap_or(0)
    }

    pub fn write_subscribe(&mut self, task: TaskId, value: u32) {
        // Detach from the previously subscribed channel, if any.
        if let Some(old) = self.subscribe.remove(&task) {
            if old & SUBSCRIBE_EN != 0 {
                let ch = (old & CH_MASK) as usize;
                if ch < N_DPPI_CH {
                    self.subs[ch].retain(|t| *t != task);
                }
            }
        }
        if value & SUBSCRIBE_EN != 0 {
            let ch = (value & CH_MASK) as usize;
            if ch >= N_DPPI_CH {
                log::warn!("DPPI: subscription to nonexistent channel {ch} ignored");
                return;
            }
            self.subscribe.insert(task, value);
            self.subs[ch].push(task);
        }
    }

    pub fn read_subscribe(&self, task: TaskId) -> u32 {
        self.subscribe.get(&task).copied().unwrap_or(0)
    }

    /// Append the subscribers of the event's published channel.
    pub fn collect(&self, ev: EventId, out: &mut Vec<TaskId>) {
        let Some(&publish) = self.publish.get(&ev) else {
            return;
        };
        let ch = (publish & CH_MASK) as usize;
        if ch >= N_DPPI_CH || self.chen & (1 << ch) == 0 {
            return;
        }
        out.extend_from_slice(&self.subs[ch]);
    }

    pub fn chg_endis(&mut self, group: usize, enable: bool) {
        if enable {
            log::trace!("dppi: channel group {group} enabled");
            self.chen |= self.chg[group];
        } else {
            log::trace!("dppi: channel group {group} disabled");
            self.chen &= !self.chg[group];
        }
    }
}

/// DPPIC register write.
pub fn regw(sim: &mut crate::sim::Simulator, off: u32, value: u32) -> crate::Result {
    use crate::fabric::Fabric;
    let Fabric::Dppi(dppi) = &mut sim.fabric else {
        log::warn!("DPPIC registers written on a PPI device variant, ignored");
        return Ok(());
    };
    match off {
        o if o < 8 * N_CHG as u32 => {
            let group = (o / 8) as usize;
            if value != 0 {
                dppi.chg_endis(group, o % 8 == 0);
            }
        }
        offs::CHEN => dppi.chen = value,
        offs::CHENSET => dppi.chen |= value,
        offs::CHENCLR => dppi.chen &= !value,
        o if (offs::CHG0..offs::CHG0 + 4 * N_CHG as u32).contains(&o) && o & 3 == 0 => {
            dppi.chg[((o - offs::CHG0) / 4) as usize] = value;
        }
        _ => log::warn!("DPPIC: write to unknown offset 0x{off:03x} ignored"),
    }
    Ok(())
}

/// DPPIC register read.
pub fn regr(sim: &crate::sim::Simulator, off: u32) -> u32 {
    use crate::fabric::Fabric;
    let Fabric::Dppi(dppi) = &sim.fabric else {
        return 0;
    };
    match off {
        offs::CHEN => dppi.chen,
        offs::CHENSET | offs::CHENCLR => 0,
        o if (offs::CHG0..offs::CHG0 + 4 * N_CHG as u32).contains(&o) && o & 3 == 0 => {
            dppi.chg[((o - offs::CHG0) / 4) as usize]
        }
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fabric::{AarTask, RadioEvent};

    #[test]
    fn publish_subscribe_routing() {
        let mut d = Dppi::new();
        d.write_publish(EventId::Radio(RadioEvent::End), SUBSCRIBE_EN | 4);
        d.write_subscribe(TaskId::Aar(AarTask::Start), SUBSCRIBE_EN | 4);
        d.chen = 1 << 4;

        let mut out = Vec::new();
        d.collect(EventId::Radio(RadioEvent::End), &mut out);
        assert_eq!(out, vec![TaskId::Aar(AarTask::Start)]);

        // Disabled channel: no dispatch.
        d.chen = 0;
        out.clear();
        d.collect(EventId::Radio(RadioEvent::End), &mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn resubscription_moves_the_task() {
        let mut d = Dppi::new();
        d.chen = 0b11;
        d.write_publish(EventId::CcmEndCrypt, SUBSCRIBE_EN);
        d.write_subscribe(TaskId::Aar(AarTask::Start), SUBSCRIBE_EN);
        d.write_subscribe(TaskId::Aar(AarTask::Start), SUBSCRIBE_EN | 1);
        let mut out = Vec::new();
        d.collect(EventId::CcmEndCrypt, &mut out);
        assert!(out.is_empty(), "channel 0 subscription must be gone");
        assert_eq!(d.read_subscribe(TaskId::Aar(AarTask::Start)), SUBSCRIBE_EN | 1);
    }

    #[test]
    fn chg_groups_flip_chen_atomically() {
        let mut d = Dppi::new();
        d.chg[1] = 0b1010;
        d.chg_endis(1, true);
        assert_eq!(d.chen, 0b1010);
        d.chg_endis(1, false);
        assert_eq!(d.chen, 0);
    }
}
