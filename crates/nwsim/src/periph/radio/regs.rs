// SPDX-License-Identifier: Apache-2.0 OR MIT

//! RADIO register file: offsets, bit fields, reset values and the MMIO
//! dispatch. The behavioural side effects live in the sibling modules.

use crate::fabric::{EventId, Fabric, RadioEvent, RadioTask, TaskId};
use crate::periph::radio::{self, bitcounter, signals};
use crate::sim::Simulator;
use crate::Result;

pub mod offs {
    pub const TASKS_TXEN: u32 = 0x000;
    pub const TASKS_RXEN: u32 = 0x004;
    pub const TASKS_START: u32 = 0x008;
    pub const TASKS_STOP: u32 = 0x00C;
    pub const TASKS_DISABLE: u32 = 0x010;
    pub const TASKS_RSSISTART: u32 = 0x014;
    pub const TASKS_RSSISTOP: u32 = 0x018;
    pub const TASKS_BCSTART: u32 = 0x01C;
    pub const TASKS_BCSTOP: u32 = 0x020;
    pub const TASKS_EDSTART: u32 = 0x024;
    pub const TASKS_EDSTOP: u32 = 0x028;
    pub const TASKS_CCASTART: u32 = 0x02C;
    pub const TASKS_CCASTOP: u32 = 0x030;
    pub const EVENTS_READY: u32 = 0x100;
    pub const EVENTS_ADDRESS: u32 = 0x104;
    pub const EVENTS_PAYLOAD: u32 = 0x108;
    pub const EVENTS_END: u32 = 0x10C;
    pub const EVENTS_DISABLED: u32 = 0x110;
    pub const EVENTS_DEVMATCH: u32 = 0x114;
    pub const EVENTS_DEVMISS: u32 = 0x118;
    pub const EVENTS_RSSIEND: u32 = 0x11C;
    pub const EVENTS_BCMATCH: u32 = 0x128;
    pub const EVENTS_CRCOK: u32 = 0x130;
    pub const EVENTS_CRCERROR: u32 = 0x134;
    pub const EVENTS_FRAMESTART: u32 = 0x138;
    pub const EVENTS_EDEND: u32 = 0x13C;
    pub const EVENTS_EDSTOPPED: u32 = 0x140;
    pub const EVENTS_CCAIDLE: u32 = 0x144;
    pub const EVENTS_CCABUSY: u32 = 0x148;
    pub const EVENTS_CCASTOPPED: u32 = 0x14C;
    pub const EVENTS_RATEBOOST: u32 = 0x150;
    pub const EVENTS_TXREADY: u32 = 0x154;
    pub const EVENTS_RXREADY: u32 = 0x158;
    pub const EVENTS_MHRMATCH: u32 = 0x15C;
    pub const EVENTS_SYNC: u32 = 0x168;
    pub const EVENTS_PHYEND: u32 = 0x16C;
    pub const SHORTS: u32 = 0x200;
    pub const INTENSET: u32 = 0x304;
    pub const INTENCLR: u32 = 0x308;
    pub const CRCSTATUS: u32 = 0x400;
    pub const RXMATCH: u32 = 0x408;
    pub const RXCRC: u32 = 0x40C;
    pub const DAI: u32 = 0x410;
    pub const PDUSTAT: u32 = 0x414;
    pub const PACKETPTR: u32 = 0x504;
    pub const FREQUENCY: u32 = 0x508;
    pub const TXPOWER: u32 = 0x50C;
    pub const MODE: u32 = 0x510;
    pub const PCNF0: u32 = 0x514;
    pub const PCNF1: u32 = 0x518;
    pub const BASE0: u32 = 0x51C;
    pub const BASE1: u32 = 0x520;
    pub const PREFIX0: u32 = 0x524;
    pub const PREFIX1: u32 = 0x528;
    pub const TXADDRESS: u32 = 0x52C;
    pub const RXADDRESSES: u32 = 0x530;
    pub const CRCCNF: u32 = 0x534;
    pub const CRCPOLY: u32 = 0x538;
    pub const CRCINIT: u32 = 0x53C;
    pub const TIFS: u32 = 0x544;
    pub const RSSISAMPLE: u32 = 0x548;
    pub const STATE: u32 = 0x550;
    pub const DATAWHITEIV: u32 = 0x554;
    pub const BCC: u32 = 0x560;
    pub const DAB0: u32 = 0x600;
    pub const DAP0: u32 = 0x620;
    pub const DACNF: u32 = 0x640;
    pub const MODECNF0: u32 = 0x650;
    pub const SFD: u32 = 0x660;
    pub const EDCNT: u32 = 0x664;
    pub const EDSAMPLE: u32 = 0x668;
    pub const CCACTRL: u32 = 0x66C;
    pub const POWER: u32 = 0xFFC;
}

/// MODE register values.
pub mod mode {
    pub const BLE_1MBIT: u32 = 0;
    pub const BLE_2MBIT: u32 = 1;
    pub const BLE_LR125KBIT: u32 = 5;
    pub const BLE_LR500KBIT: u32 = 6;
    pub const IEEE802154_250KBIT: u32 = 15;
}

/// SHORTS register bits.
pub mod shorts {
    pub const READY_START: u32 = 1 << 0;
    pub const END_DISABLE: u32 = 1 << 1;
    pub const DISABLED_TXEN: u32 = 1 << 2;
    pub const DISABLED_RXEN: u32 = 1 << 3;
    pub const ADDRESS_RSSISTART: u32 = 1 << 4;
    pub const END_START: u32 = 1 << 5;
    pub const ADDRESS_BCSTART: u32 = 1 << 6;
    pub const DISABLED_RSSISTOP: u32 = 1 << 8;
    pub const RXREADY_CCASTART: u32 = 1 << 11;
    pub const CCAIDLE_TXEN: u32 = 1 << 12;
    pub const CCABUSY_DISABLE: u32 = 1 << 13;
    pub const FRAMESTART_BCSTART: u32 = 1 << 14;
    pub const READY_EDSTART: u32 = 1 << 15;
    pub const EDEND_DISABLE: u32 = 1 << 16;
    pub const CCAIDLE_STOP: u32 = 1 << 17;
    pub const TXREADY_START: u32 = 1 << 19;
    pub const RXREADY_START: u32 = 1 << 20;
    pub const PHYEND_DISABLE: u32 = 1 << 21;
    pub const PHYEND_START: u32 = 1 << 22;
}

/// PCNF0 fields.
pub mod pcnf0 {
    pub const LFLEN_POS: u32 = 0;
    pub const LFLEN_MASK: u32 = 0x0F;
    pub const S0LEN_POS: u32 = 8;
    pub const S0LEN_MASK: u32 = 1 << 8;
    pub const S1LEN_POS: u32 = 16;
    pub const S1LEN_MASK: u32 = 0x0F << 16;
    pub const S1INCL: u32 = 1 << 20;
    pub const CILEN_POS: u32 = 22;
    pub const CILEN_MASK: u32 = 0x3 << 22;
    pub const PLEN_POS: u32 = 24;
    pub const PLEN_MASK: u32 = 0x3 << 24;
    pub const PLEN_8BIT: u32 = 0;
    pub const PLEN_16BIT: u32 = 1;
    pub const PLEN_32BIT_ZERO: u32 = 2;
    pub const PLEN_LONG_RANGE: u32 = 3;
    pub const CRCINC: u32 = 1 << 26;
    pub const TERMLEN_POS: u32 = 29;
    pub const TERMLEN_MASK: u32 = 0x3 << 29;
}

/// PCNF1 fields.
pub mod pcnf1 {
    pub const MAXLEN_POS: u32 = 0;
    pub const MAXLEN_MASK: u32 = 0xFF;
    pub const STATLEN_POS: u32 = 8;
    pub const STATLEN_MASK: u32 = 0xFF << 8;
    pub const BALEN_POS: u32 = 16;
    pub const BALEN_MASK: u32 = 0x7 << 16;
    pub const ENDIAN_BIG: u32 = 1 << 24;
    pub const WHITEEN: u32 = 1 << 25;
}

/// INTEN bits (one per event).
pub mod inten {
    pub const READY: u32 = 1 << 0;
    pub const ADDRESS: u32 = 1 << 1;
    pub const PAYLOAD: u32 = 1 << 2;
    pub const END: u32 = 1 << 3;
    pub const DISABLED: u32 = 1 << 4;
    pub const DEVMATCH: u32 = 1 << 5;
    pub const DEVMISS: u32 = 1 << 6;
    pub const RSSIEND: u32 = 1 << 7;
    pub const BCMATCH: u32 = 1 << 10;
    pub const CRCOK: u32 = 1 << 12;
    pub const CRCERROR: u32 = 1 << 13;
    pub const FRAMESTART: u32 = 1 << 14;
    pub const EDEND: u32 = 1 << 15;
    pub const EDSTOPPED: u32 = 1 << 16;
    pub const CCAIDLE: u32 = 1 << 17;
    pub const CCABUSY: u32 = 1 << 18;
    pub const CCASTOPPED: u32 = 1 << 19;
    pub const RATEBOOST: u32 = 1 << 20;
    pub const TXREADY: u32 = 1 << 21;
    pub const RXREADY: u32 = 1 << 22;
    pub const SYNC: u32 = 1 << 26;
    pub const PHYEND: u32 = 1 << 27;
}

/// CCACTRL fields and CCAMODE values.
pub mod ccactrl {
    pub const CCAMODE_MASK: u32 = 0x7;
    pub const ED_MODE: u32 = 0;
    pub const CARRIER_MODE: u32 = 1;
    pub const CARRIER_AND_ED_MODE: u32 = 2;
    pub const CARRIER_OR_ED_MODE: u32 = 3;
    pub const ED_MODE_TEST1: u32 = 4;
    pub const CCAEDTHRES_POS: u32 = 8;
    pub const CCAEDTHRES_MASK: u32 = 0xFF << 8;
}

/// PDUSTAT fields.
pub mod pdustat {
    pub const PDUSTAT: u32 = 1 << 0;
    pub const CISTAT_POS: u32 = 1;
    pub const CISTAT_MASK: u32 = 0x3 << 1;
}

/// MODECNF0 fields.
pub mod modecnf0 {
    pub const RU_FAST: u32 = 1 << 0;
}

/// The firmware-visible RADIO registers.
pub struct RadioRegs {
    pub events_ready: u32,
    pub events_address: u32,
    pub events_payload: u32,
    pub events_end: u32,
    pub events_disabled: u32,
    pub events_devmatch: u32,
    pub events_devmiss: u32,
    pub events_rssiend: u32,
    pub events_bcmatch: u32,
    pub events_crcok: u32,
    pub events_crcerror: u32,
    pub events_framestart: u32,
    pub events_edend: u32,
    pub events_edstopped: u32,
    pub events_ccaidle: u32,
    pub events_ccabusy: u32,
    pub events_ccastopped: u32,
    pub events_rateboost: u32,
    pub events_txready: u32,
    pub events_rxready: u32,
    pub events_sync: u32,
    pub events_phyend: u32,
    pub shorts: u32,
    pub crcstatus: u32,
    pub rxmatch: u32,
    pub rxcrc: u32,
    pub dai: u32,
    pub pdustat: u32,
    pub packetptr: u32,
    pub frequency: u32,
    pub txpower: u32,
    pub mode: u32,
    pub pcnf0: u32,
    pub pcnf1: u32,
    pub base0: u32,
    pub base1: u32,
    pub prefix0: u32,
    pub prefix1: u32,
    pub txaddress: u32,
    pub rxaddresses: u32,
    pub crccnf: u32,
    pub crcpoly: u32,
    pub crcinit: u32,
    pub tifs: u32,
    pub rssisample: u32,
    pub state: u32,
    pub datawhiteiv: u32,
    pub bcc: u32,
    pub dab: [u32; 8],
    pub dap: [u32; 8],
    pub dacnf: u32,
    pub modecnf0: u32,
    pub sfd: u32,
    pub edcnt: u32,
    pub edsample: u32,
    pub ccactrl: u32,
    pub power: u32,
}

impl Default for RadioRegs {
    fn default() -> Self {
        Self::reset_values()
    }
}

impl RadioRegs {
    /// Datasheet reset values.
    pub fn reset_values() -> Self {
        Self {
            events_ready: 0,
            events_address: 0,
            events_payload: 0,
            events_end: 0,
            events_disabled: 0,
            events_devmatch: 0,
            events_devmiss: 0,
            events_rssiend: 0,
            events_bcmatch: 0,
            events_crcok: 0,
            events_crcerror: 0,
            events_framestart: 0,
            events_edend: 0,
            events_edstopped: 0,
            events_ccaidle: 0,
            events_ccabusy: 0,
            events_ccastopped: 0,
            events_rateboost: 0,
            events_txready: 0,
            events_rxready: 0,
            events_sync: 0,
            events_phyend: 0,
            shorts: 0,
            crcstatus: 0,
            rxmatch: 0,
            rxcrc: 0,
            dai: 0,
            pdustat: 0,
            packetptr: 0,
            frequency: 0x0000_0002,
            txpower: 0,
            mode: 0,
            pcnf0: 0,
            pcnf1: 0,
            base0: 0,
            base1: 0,
            prefix0: 0,
            prefix1: 0,
            txaddress: 0,
            rxaddresses: 0,
            crccnf: 0,
            crcpoly: 0,
            crcinit: 0,
            tifs: 0,
            rssisample: 0,
            state: 0,
            datawhiteiv: 0x0000_0040,
            bcc: 0,
            dab: [0; 8],
            dap: [0; 8],
            dacnf: 0,
            modecnf0: 0x0000_0200,
            sfd: 0xA7,
            edcnt: 0,
            edsample: 0,
            ccactrl: 0x052D_0000,
            power: 1,
        }
    }

    pub fn event_reg(&self, ev: RadioEvent) -> u32 {
        match ev {
            RadioEvent::Ready => self.events_ready,
            RadioEvent::Address => self.events_address,
            RadioEvent::Payload => self.events_payload,
            RadioEvent::End => self.events_end,
            RadioEvent::Disabled => self.events_disabled,
            RadioEvent::Devmatch => self.events_devmatch,
            RadioEvent::Devmiss => self.events_devmiss,
            RadioEvent::RssiEnd => self.events_rssiend,
            RadioEvent::Bcmatch => self.events_bcmatch,
            RadioEvent::CrcOk => self.events_crcok,
            RadioEvent::CrcError => self.events_crcerror,
            RadioEvent::Framestart => self.events_framestart,
            RadioEvent::EdEnd => self.events_edend,
            RadioEvent::EdStopped => self.events_edstopped,
            RadioEvent::CcaIdle => self.events_ccaidle,
            RadioEvent::CcaBusy => self.events_ccabusy,
            RadioEvent::CcaStopped => self.events_ccastopped,
            RadioEvent::Rateboost => self.events_rateboost,
            RadioEvent::TxReady => self.events_txready,
            RadioEvent::RxReady => self.events_rxready,
            RadioEvent::Sync => self.events_sync,
            RadioEvent::PhyEnd => self.events_phyend,
        }
    }

    pub fn event_reg_mut(&mut self, ev: RadioEvent) -> &mut u32 {
        match ev {
            RadioEvent::Ready => &mut self.events_ready,
            RadioEvent::Address => &mut self.events_address,
            RadioEvent::Payload => &mut self.events_payload,
            RadioEvent::End => &mut self.events_end,
            RadioEvent::Disabled => &mut self.events_disabled,
            RadioEvent::Devmatch => &mut self.events_devmatch,
            RadioEvent::Devmiss => &mut self.events_devmiss,
            RadioEvent::RssiEnd => &mut self.events_rssiend,
            RadioEvent::Bcmatch => &mut self.events_bcmatch,
            RadioEvent::CrcOk => &mut self.events_crcok,
            RadioEvent::CrcError => &mut self.events_crcerror,
            RadioEvent::Framestart => &mut self.events_framestart,
            RadioEvent::EdEnd => &mut self.events_edend,
            RadioEvent::EdStopped => &mut self.events_edstopped,
            RadioEvent::CcaIdle => &mut self.events_ccaidle,
            RadioEvent::CcaBusy => &mut self.events_ccabusy,
            RadioEvent::CcaStopped => &mut self.events_ccastopped,
            RadioEvent::Rateboost => &mut self.events_rateboost,
            RadioEvent::TxReady => &mut self.events_txready,
            RadioEvent::RxReady => &mut self.events_rxready,
            RadioEvent::Sync => &mut self.events_sync,
            RadioEvent::PhyEnd => &mut self.events_phyend,
        }
    }
}

fn event_for_offset(off: u32) -> Option<RadioEvent> {
    Some(match off {
        offs::EVENTS_READY => RadioEvent::Ready,
        offs::EVENTS_ADDRESS => RadioEvent::Address,
        offs::EVENTS_PAYLOAD => RadioEvent::Payload,
        offs::EVENTS_END => RadioEvent::End,
        offs::EVENTS_DISABLED => RadioEvent::Disabled,
        offs::EVENTS_DEVMATCH => RadioEvent::Devmatch,
        offs::EVENTS_DEVMISS => RadioEvent::Devmiss,
        offs::EVENTS_RSSIEND => RadioEvent::RssiEnd,
        offs::EVENTS_BCMATCH => RadioEvent::Bcmatch,
        offs::EVENTS_CRCOK => RadioEvent::CrcOk,
        offs::EVENTS_CRCERROR => RadioEvent::CrcError,
        offs::EVENTS_FRAMESTART => RadioEvent::Framestart,
        offs::EVENTS_EDEND => RadioEvent::EdEnd,
        offs::EVENTS_EDSTOPPED => RadioEvent::EdStopped,
        offs::EVENTS_CCAIDLE => RadioEvent::CcaIdle,
        offs::EVENTS_CCABUSY => RadioEvent::CcaBusy,
        offs::EVENTS_CCASTOPPED => RadioEvent::CcaStopped,
        offs::EVENTS_RATEBOOST => RadioEvent::Rateboost,
        offs::EVENTS_TXREADY => RadioEvent::TxReady,
        offs::EVENTS_RXREADY => RadioEvent::RxReady,
        offs::EVENTS_SYNC => RadioEvent::Sync,
        offs::EVENTS_PHYEND => RadioEvent::PhyEnd,
        _ => return None,
    })
}

fn task_for_offset(off: u32) -> Option<RadioTask> {
    Some(match off {
        offs::TASKS_TXEN => RadioTask::TxEn,
        offs::TASKS_RXEN => RadioTask::RxEn,
        offs::TASKS_START => RadioTask::Start,
        offs::TASKS_STOP => RadioTask::Stop,
        offs::TASKS_DISABLE => RadioTask::Disable,
        offs::TASKS_RSSISTART => RadioTask::RssiStart,
        offs::TASKS_RSSISTOP => RadioTask::RssiStop,
        offs::TASKS_BCSTART => RadioTask::BcStart,
        offs::TASKS_BCSTOP => RadioTask::BcStop,
        offs::TASKS_EDSTART => RadioTask::EdStart,
        offs::TASKS_EDSTOP => RadioTask::EdStop,
        offs::TASKS_CCASTART => RadioTask::CcaStart,
        offs::TASKS_CCASTOP => RadioTask::CcaStop,
        _ => return None,
    })
}

/// Register write with side effects.
pub fn regw(sim: &mut Simulator, off: u32, value: u32) -> Result {
    if let Some(task) = task_for_offset(off) {
        if value != 0 {
            radio::run_task(sim, task)?;
        }
        return Ok(());
    }
    if let Some(ev) = event_for_offset(off) {
        *sim.radio.regs.event_reg_mut(ev) = value;
        signals::eval_interrupt(sim);
        return Ok(());
    }
    // DPPI sibling registers: SUBSCRIBE at task+0x80, PUBLISH at event+0x80.
    if (0x080..0x100).contains(&off) || (0x180..0x200).contains(&off) {
        if let Fabric::Dppi(dppi) = &mut sim.fabric {
            if let Some(task) = task_for_offset(off - 0x80) {
                dppi.write_subscribe(TaskId::Radio(task), value);
                return Ok(());
            }
            if let Some(ev) = event_for_offset(off - 0x80) {
                dppi.write_publish(EventId::Radio(ev), value);
                return Ok(());
            }
        }
    }
    match off {
        offs::SHORTS => sim.radio.regs.shorts = value,
        offs::INTENSET => signals::regw_intenset(sim, value),
        offs::INTENCLR => signals::regw_intenclr(sim, value),
        offs::PACKETPTR => sim.radio.regs.packetptr = value,
        offs::FREQUENCY => sim.radio.regs.frequency = value,
        offs::TXPOWER => sim.radio.regs.txpower = value,
        offs::MODE => sim.radio.regs.mode = value,
        offs::PCNF0 => sim.radio.regs.pcnf0 = value,
        offs::PCNF1 => sim.radio.regs.pcnf1 = value,
        offs::BASE0 => sim.radio.regs.base0 = value,
        offs::BASE1 => sim.radio.regs.base1 = value,
        offs::PREFIX0 => sim.radio.regs.prefix0 = value,
        offs::PREFIX1 => sim.radio.regs.prefix1 = value,
        offs::TXADDRESS => sim.radio.regs.txaddress = value & 0x7,
        offs::RXADDRESSES => sim.radio.regs.rxaddresses = value & 0xFF,
        offs::CRCCNF => sim.radio.regs.crccnf = value,
        offs::CRCPOLY => sim.radio.regs.crcpoly = value,
        offs::CRCINIT => sim.radio.regs.crcinit = value & 0x00FF_FFFF,
        offs::TIFS => sim.radio.regs.tifs = value & 0x3FF,
        offs::DATAWHITEIV => sim.radio.regs.datawhiteiv = value & 0x7F,
        offs::BCC => bitcounter::regw_bcc(sim, value),
        o if (offs::DAB0..offs::DAB0 + 32).contains(&o) && o & 3 == 0 => {
            sim.radio.regs.dab[((o - offs::DAB0) / 4) as usize] = value;
        }
        o if (offs::DAP0..offs::DAP0 + 32).contains(&o) && o & 3 == 0 => {
            sim.radio.regs.dap[((o - offs::DAP0) / 4) as usize] = value & 0xFFFF;
        }
        offs::DACNF => sim.radio.regs.dacnf = value,
        offs::MODECNF0 => sim.radio.regs.modecnf0 = value,
        offs::SFD => sim.radio.regs.sfd = value & 0xFF,
        offs::EDCNT => sim.radio.regs.edcnt = value & 0x001F_FFFF,
        offs::CCACTRL => sim.radio.regs.ccactrl = value,
        offs::POWER => radio::regw_power(sim, value)?,
        _ => log::warn!("RADIO: write to unknown offset 0x{off:03x} ignored"),
    }
    Ok(())
}

/// Register read.
pub fn regr(sim: &Simulator, off: u32) -> u32 {
    if let Some(ev) = event_for_offset(off) {
        return sim.radio.regs.event_reg(ev);
    }
    if (0x080..0x100).contains(&off) || (0x180..0x200).contains(&off) {
        if let Fabric::Dppi(dppi) = &sim.fabric {
            if let Some(task) = task_for_offset(off - 0x80) {
                return dppi.read_subscribe(TaskId::Radio(task));
            }
            if let Some(ev) = event_for_offset(off - 0x80) {
                return dppi.read_publish(EventId::Radio(ev));
            }
        }
    }
    let r = &sim.radio.regs;
    match off {
        offs::SHORTS => r.shorts,
        offs::INTENSET => sim.radio.inten,
        offs::INTENCLR => 0,
        offs::CRCSTATUS => r.crcstatus,
        offs::RXMATCH => r.rxmatch,
        offs::RXCRC => r.rxcrc,
        offs::DAI => r.dai,
        offs::PDUSTAT => r.pdustat,
        offs::PACKETPTR => r.packetptr,
        offs::FREQUENCY => r.frequency,
        offs::TXPOWER => r.txpower,
        offs::MODE => r.mode,
        offs::PCNF0 => r.pcnf0,
        offs::PCNF1 => r.pcnf1,
        offs::BASE0 => r.base0,
        offs::BASE1 => r.base1,
        offs::PREFIX0 => r.prefix0,
        offs::PREFIX1 => r.prefix1,
        offs::TXADDRESS => r.txaddress,
        offs::RXADDRESSES => r.rxaddresses,
        offs::CRCCNF => r.crccnf,
        offs::CRCPOLY => r.crcpoly,
        offs::CRCINIT => r.crcinit,
        offs::TIFS => r.tifs,
        offs::RSSISAMPLE => r.rssisample,
        offs::STATE => r.state,
        offs::DATAWHITEIV => r.datawhiteiv,
        offs::BCC => r.bcc,
        o if (offs::DAB0..offs::DAB0 + 32).contains(&o) && o & 3 == 0 => {
            r.dab[((o - offs::DAB0) / 4) as usize]
        }
        o if (offs::DAP0..offs::DAP0 + 32).contains(&o) && o & 3 == 0 => {
            r.dap[((o - offs::DAP0) / 4) as usize]
        }
        offs::DACNF => r.dacnf,
        offs::MODECNF0 => r.modecnf0,
        offs::SFD => r.sfd,
        offs::EDCNT => r.edcnt,
        offs::EDSAMPLE => r.edsample,
        offs::CCACTRL => r.ccactrl,
        offs::POWER => r.power,
        _ => 0,
    }
}
