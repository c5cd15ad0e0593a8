// SPDX-License-Identifier: Apache-2.0 OR MIT

//! AAR - accelerated address resolver.
//!
//! On TASK_START the whole IRK table is checked immediately and the END
//! time is charged as `1 + 6us * keys visited`; the events fire when the
//! timer expires, as the silicon would. The block shares its base address,
//! ENABLE register and interrupt line with the CCM (the ENABLE value
//! selects which personality the register file exposes).

use crate::fabric::{AarTask, EventId};
use crate::sched::Slot;
use crate::sim::Simulator;
use crate::time::NEVER;
use crate::Result;

pub const ENABLE_AAR: u32 = 3;

const INTEN_END: u32 = 1 << 0;
const INTEN_RESOLVED: u32 = 1 << 1;
const INTEN_NOTRESOLVED: u32 = 1 << 2;

pub mod offs {
    pub const TASKS_START: u32 = 0x000;
    pub const TASKS_STOP: u32 = 0x008;
    pub const EVENTS_END: u32 = 0x100;
    pub const EVENTS_RESOLVED: u32 = 0x104;
    pub const EVENTS_NOTRESOLVED: u32 = 0x108;
    pub const INTENSET: u32 = 0x304;
    pub const INTENCLR: u32 = 0x308;
    pub const STATUS: u32 = 0x400;
    pub const ENABLE: u32 = 0x500;
    pub const NIRK: u32 = 0x504;
    pub const IRKPTR: u32 = 0x508;
    pub const ADDRPTR: u32 = 0x510;
    pub const SCRATCHPTR: u32 = 0x514;
}

#[derive(Default)]
pub struct Aar {
    pub events_end: u32,
    pub events_resolved: u32,
    pub events_notresolved: u32,
    pub status: u32,
    pub nirk: u32,
    pub irkptr: u32,
    pub addrptr: u32,
    pub scratchptr: u32,
    pub inten: u32,
    running: bool,
    matching_irk: Option<u32>,
}

/// Level contribution to the shared CCM/AAR interrupt line.
pub(crate) fn int_line_level(sim: &Simulator) -> bool {
    let a = &sim.aar;
    (a.events_end != 0 && a.inten & INTEN_END != 0)
        || (a.events_resolved != 0 && a.inten & INTEN_RESOLVED != 0)
        || (a.events_notresolved != 0 && a.inten & INTEN_NOTRESOLVED != 0)
}

fn signal_end(sim: &mut Simulator) -> Result {
    sim.aar.events_end = 1;
    crate::periph::ccm::eval_interrupt(sim);
    sim.fabric_event(EventId::AarEnd)
}

fn signal_resolved(sim: &mut Simulator) -> Result {
    sim.aar.events_resolved = 1;
    crate::periph::ccm::eval_interrupt(sim);
    sim.fabric_event(EventId::AarResolved)
}

fn signal_notresolved(sim: &mut Simulator) -> Result {
    sim.aar.events_notresolved = 1;
    crate::periph::ccm::eval_interrupt(sim);
    sim.fabric_event(EventId::AarNotResolved)
}

/// Scan the IRK table against the received resolvable private address.
///
/// Returns the number of IRKs visited before a match (the full NIRK count
/// when nothing matched or the address is not resolvable) and the matching
/// index, if any.
fn resolve(sim: &mut Simulator) -> (u32, Option<u32>) {
    let nirk = sim.aar.nirk & 0x1F;

    // The S0+Length+S1 prefix is always assumed to occupy 3 bytes,
    // independently of the RADIO configuration.
    let mut addr = [0u8; 6];
    if !sim.mem.read(sim.aar.addrptr + 3, &mut addr) {
        return (nirk, None);
    }
    log::trace!(
        "AAR: address to match {:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
        addr[5],
        addr[4],
        addr[3],
        addr[2],
        addr[1],
        addr[0]
    );

    let hash = u32::from(addr[0]) | u32::from(addr[1]) << 8 | u32::from(addr[2]) << 16;
    let prand = u32::from(addr[3]) | u32::from(addr[4]) << 8 | u32::from(addr[5]) << 16;

    if prand >> 22 != 0b01 {
        log::debug!("AAR: address 0x{prand:06X} is not resolvable");
        return (nirk, None);
    }

    let mut prand_be = [0u8; 16];
    prand_be[15] = (prand & 0xFF) as u8;
    prand_be[14] = ((prand >> 8) & 0xFF) as u8;
    prand_be[13] = ((prand >> 16) & 0xFF) as u8;

    for i in 0..nirk {
        // IRKs are stored big-endian, 16 bytes each.
        let mut irk = [0u8; 16];
        if !sim.mem.read(sim.aar.irkptr + 16 * i, &mut irk) {
            return (nirk, None);
        }
        let out = sim.crypt.aes128(&irk, &prand_be);
        let hash_check =
            u32::from(out[15]) | u32::from(out[14]) << 8 | u32::from(out[13]) << 16;
        log::trace!("AAR ({i}): prand=0x{prand:06X} hash=0x{hash:06X} check=0x{hash_check:06X}");
        if hash == hash_check {
            log::debug!("AAR: matched IRK {i} (of {nirk})");
            return (i + 1, Some(i));
        }
    }
    log::debug!("AAR: no IRK of {nirk} matched");
    (nirk, None)
}

pub fn task_start(sim: &mut Simulator) {
    if sim.ccm.regs.enable != ENABLE_AAR {
        return;
    }
    sim.aar.running = true;
    let (visited, matching) = resolve(sim);
    sim.aar.matching_irk = matching;
    let t = sim.sched.now() + 1 + 6 * u64::from(visited);
    sim.sched.set(Slot::Aar, t);
}

pub fn task_stop(sim: &mut Simulator) -> Result {
    if !sim.aar.running {
        return Ok(());
    }
    sim.aar.running = false;
    sim.sched.set(Slot::Aar, NEVER);
    // Cut short: only END is signalled.
    signal_end(sim)
}

pub fn run_task(sim: &mut Simulator, task: AarTask) -> Result {
    match task {
        AarTask::Start => {
            task_start(sim);
            Ok(())
        }
        AarTask::Stop => task_stop(sim),
    }
}

/// Slot::Aar callback: the search is over, publish the verdict.
pub fn timer_triggered(sim: &mut Simulator) -> Result {
    sim.aar.running = false;
    sim.sched.set(Slot::Aar, NEVER);
    match sim.aar.matching_irk {
        Some(i) => {
            sim.aar.status = i;
            signal_resolved(sim)?;
        }
        None => signal_notresolved(sim)?,
    }
    signal_end(sim)
}

/// Offsets the AAR personality of the shared CCM/AAR block owns.
pub fn handles(off: u32) -> bool {
    matches!(
        off,
        offs::TASKS_START
            | offs::TASKS_STOP
            | offs::EVENTS_END
            | offs::EVENTS_RESOLVED
            | offs::EVENTS_NOTRESOLVED
            | offs::INTENSET
            | offs::INTENCLR
            | offs::STATUS
            | offs::ENABLE
            | offs::NIRK
            | offs::IRKPTR
            | offs::ADDRPTR
            | offs::SCRATCHPTR
            // DPPI SUBSCRIBE/PUBLISH siblings
            | 0x080
            | 0x088
            | 0x180
            | 0x184
            | 0x188
    )
}

pub fn regw(sim: &mut Simulator, off: u32, value: u32) -> Result {
    use crate::fabric::{EventId, Fabric, TaskId};
    if let Fabric::Dppi(dppi) = &mut sim.fabric {
        match off {
            0x080 => {
                dppi.write_subscribe(TaskId::Aar(AarTask::Start), value);
                return Ok(());
            }
            0x088 => {
                dppi.write_subscribe(TaskId::Aar(AarTask::Stop), value);
                return Ok(());
            }
            0x180 => {
                dppi.write_publish(EventId::AarEnd, value);
                return Ok(());
            }
            0x184 => {
                dppi.write_publish(EventId::AarResolved, value);
                return Ok(());
            }
            0x188 => {
                dppi.write_publish(EventId::AarNotResolved, value);
                return Ok(());
            }
            _ => {}
        }
    }
    match off {
        offs::TASKS_START => {
            if value != 0 {
                task_start(sim);
            }
        }
        offs::TASKS_STOP => {
            if value != 0 {
                task_stop(sim)?;
            }
        }
        offs::EVENTS_END => {
            sim.aar.events_end = value;
            crate::periph::ccm::eval_interrupt(sim);
        }
        offs::EVENTS_RESOLVED => {
            sim.aar.events_resolved = value;
            crate::periph::ccm::eval_interrupt(sim);
        }
        offs::EVENTS_NOTRESOLVED => {
            sim.aar.events_notresolved = value;
            crate::periph::ccm::eval_interrupt(sim);
        }
        offs::INTENSET => {
            if value != 0 {
                sim.aar.inten |= value;
                crate::periph::ccm::eval_interrupt(sim);
            }
        }
        offs::INTENCLR => {
            if value != 0 {
                sim.aar.inten &= !value;
                crate::periph::ccm::eval_interrupt(sim);
            }
        }
        offs::ENABLE => sim.ccm.regs.enable = value & 3,
        offs::NIRK => sim.aar.nirk = value & 0x1F,
        offs::IRKPTR => sim.aar.irkptr = value,
        offs::ADDRPTR => sim.aar.addrptr = value,
        offs::SCRATCHPTR => sim.aar.scratchptr = value,
        _ => log::warn!("AAR: write to unknown offset 0x{off:03x} ignored"),
    }
    Ok(())
}

pub fn regr(sim: &Simulator, off: u32) -> u32 {
    let a = &sim.aar;
    match off {
        offs::EVENTS_END => a.events_end,
        offs::EVENTS_RESOLVED => a.events_resolved,
        offs::EVENTS_NOTRESOLVED => a.events_notresolved,
        offs::INTENSET => a.inten,
        offs::INTENCLR => 0,
        offs::STATUS => a.status,
        offs::ENABLE => sim.ccm.regs.enable,
        offs::NIRK => a.nirk,
        offs::IRKPTR => a.irkptr,
        offs::ADDRPTR => a.addrptr,
        offs::SCRATCHPTR => a.scratchptr,
        _ => 0,
    }
}
