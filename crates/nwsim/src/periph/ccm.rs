// SPDX-License-Identifier: Apache-2.0 OR MIT

//! CCM - AES CCM mode encryption.
//!
//! The real block's processing delay is not modelled:
//! * key-stream generation is a no-op finishing instantly,
//! * in encryption mode the whole packet is encrypted the moment
//!   TASKS_CRYPT fires,
//! * in decryption mode TASKS_CRYPT only arms the block; the RADIO calls
//!   [`radio_received_packet`] at the end of the reception and the packet
//!   is then decrypted in one go (or, on a CRC error, MICSTATUS is cleared
//!   and nothing is touched).
//!
//! Consequently RATE, RATEOVERRIDE and MODE.LENGTH are ignored, and
//! MAXPACKETSIZE is not enforced (packets decrypt according to their
//! length field). TASKS_STOP only disarms a pending decryption.

use crate::crypto::{ccm_nonce, MIC_LEN};
use crate::fabric::{CcmTask, EventId};
use crate::irq::CCM_AAR_IRQ;
use crate::periph::aar;
use crate::sim::Simulator;
use crate::Result;

pub const ENABLE_CCM: u32 = 2;

const MODE_DECRYPTION: u32 = 1 << 0;
const SHORTS_ENDKSGEN_CRYPT: u32 = 1 << 0;

const INTEN_ENDKSGEN: u32 = 1 << 0;
const INTEN_ENDCRYPT: u32 = 1 << 1;
const INTEN_ERROR: u32 = 1 << 2;

/// Bytes of the CNFPTR configuration block: 16B key, 5B counter (39 bits)
/// + 3B padding, 1B direction, 8B IV.
const CNF_LEN: usize = 33;

pub mod offs {
    pub const TASKS_KSGEN: u32 = 0x000;
    pub const TASKS_CRYPT: u32 = 0x004;
    pub const TASKS_STOP: u32 = 0x008;
    pub const TASKS_RATEOVERRIDE: u32 = 0x00C;
    pub const EVENTS_ENDKSGEN: u32 = 0x100;
    pub const EVENTS_ENDCRYPT: u32 = 0x104;
    pub const EVENTS_ERROR: u32 = 0x108;
    pub const SHORTS: u32 = 0x200;
    pub const INTENSET: u32 = 0x304;
    pub const INTENCLR: u32 = 0x308;
    pub const MICSTATUS: u32 = 0x400;
    pub const ENABLE: u32 = 0x500;
    pub const MODE: u32 = 0x504;
    pub const CNFPTR: u32 = 0x508;
    pub const INPTR: u32 = 0x50C;
    pub const OUTPTR: u32 = 0x510;
    pub const SCRATCHPTR: u32 = 0x514;
    pub const MAXPACKETSIZE: u32 = 0x518;
    pub const RATEOVERRIDE: u32 = 0x51C;
    pub const HEADERMASK: u32 = 0x524;
}

pub struct CcmRegs {
    pub events_endksgen: u32,
    pub events_endcrypt: u32,
    pub events_error: u32,
    pub shorts: u32,
    pub micstatus: u32,
    /// Shared with the AAR: this register selects the block personality.
    pub enable: u32,
    pub mode: u32,
    pub cnfptr: u32,
    pub inptr: u32,
    pub outptr: u32,
    pub scratchptr: u32,
    pub maxpacketsize: u32,
    pub rateoverride: u32,
    pub headermask: u32,
}

impl Default for CcmRegs {
    fn default() -> Self {
        Self {
            events_endksgen: 0,
            events_endcrypt: 0,
            events_error: 0,
            shorts: 0,
            micstatus: 0,
            enable: 0,
            mode: 0x01,
            cnfptr: 0,
            inptr: 0,
            outptr: 0,
            scratchptr: 0,
            maxpacketsize: 0xFB,
            rateoverride: 0,
            headermask: 0xE3,
        }
    }
}

#[derive(Default)]
pub struct Ccm {
    pub regs: CcmRegs,
    pub inten: u32,
    pub(crate) int_line: bool,
    decryption_ongoing: bool,
}

/// The CCM and AAR share one interrupt line; the combined level is
/// evaluated here and cached on the CCM side.
pub fn eval_interrupt(sim: &mut Simulator) {
    let c = &sim.ccm;
    let mut new_line = (c.regs.events_endksgen != 0 && c.inten & INTEN_ENDKSGEN != 0)
        || (c.regs.events_endcrypt != 0 && c.inten & INTEN_ENDCRYPT != 0)
        || (c.regs.events_error != 0 && c.inten & INTEN_ERROR != 0);
    new_line |= aar::int_line_level(sim);
    let mut line = sim.ccm.int_line;
    sim.irq
        .toggle_level_irq_line_if(&mut line, new_line, CCM_AAR_IRQ);
    sim.ccm.int_line = line;
}

fn signal_endksgen(sim: &mut Simulator) -> Result {
    sim.ccm.regs.events_endksgen = 1;
    eval_interrupt(sim);
    sim.fabric_event(EventId::CcmEndKsgen)?;
    if sim.ccm.regs.shorts & SHORTS_ENDKSGEN_CRYPT != 0 {
        task_crypt(sim)?;
    }
    Ok(())
}

fn signal_endcrypt(sim: &mut Simulator) -> Result {
    sim.ccm.regs.events_endcrypt = 1;
    eval_interrupt(sim);
    sim.fabric_event(EventId::CcmEndCrypt)
}

struct CnfBlock {
    key: [u8; 16],
    packet_counter: u64,
    direction: u8,
    iv: [u8; 8],
}

fn read_cnf(sim: &Simulator) -> Option<CnfBlock> {
    let raw = sim.mem.get(sim.ccm.regs.cnfptr, CNF_LEN)?;
    let mut key = [0u8; 16];
    key.copy_from_slice(&raw[0..16]);
    let mut ctr = [0u8; 8];
    ctr.copy_from_slice(&raw[16..24]);
    let packet_counter = u64::from_le_bytes(ctr) & 0x7F_FFFF_FFFF;
    let direction = raw[24] & 1;
    let mut iv = [0u8; 8];
    iv.copy_from_slice(&raw[25..33]);
    Some(CnfBlock {
        key,
        packet_counter,
        direction,
        iv,
    })
}

fn encrypt_tx(sim: &mut Simulator) -> Result {
    let Some(cnf) = read_cnf(sim) else {
        log::warn!("CCM: CNFPTR points outside the device memory, CRYPT skipped");
        return Ok(());
    };
    let Some(header) = sim.mem.get(sim.ccm.regs.inptr, 2) else {
        log::warn!("CCM: INPTR points outside the device memory, CRYPT skipped");
        return Ok(());
    };
    let h = header[0];
    let len = header[1] as usize;

    let nonce = ccm_nonce(&cnf.iv, cnf.packet_counter, cnf.direction);
    let aad = h & (sim.ccm.regs.headermask as u8);
    let out_len = if len > 0 { len + MIC_LEN } else { 0 };

    // Byte 2 of the output is reserved for the (unused) S1 slot.
    let header_out = [h, out_len as u8];
    if !sim.mem.write(sim.ccm.regs.outptr, &header_out) {
        return Ok(());
    }

    if len > 0 {
        let Some(payload) = sim.mem.get(sim.ccm.regs.inptr + 3, len) else {
            log::warn!("CCM: Tx payload outside the device memory, CRYPT skipped");
            return Ok(());
        };
        let payload = payload.to_vec();
        let mut out = vec![0u8; out_len];
        sim.crypt
            .encrypt_packet(aad, &payload, &mut out, &cnf.key, &nonce)?;
        sim.mem.write(sim.ccm.regs.outptr + 3, &out);
    }

    signal_endcrypt(sim)
}

fn decrypt_rx(sim: &mut Simulator, crc_error: bool) -> Result {
    if crc_error {
        sim.ccm.regs.micstatus = 0;
        return signal_endcrypt(sim);
    }
    let Some(cnf) = read_cnf(sim) else {
        log::warn!("CCM: CNFPTR points outside the device memory, decryption skipped");
        return Ok(());
    };
    let Some(header) = sim.mem.get(sim.ccm.regs.inptr, 2) else {
        log::warn!("CCM: INPTR points outside the device memory, decryption skipped");
        return Ok(());
    };
    let h = header[0];
    let len = header[1] as usize;

    let nonce = ccm_nonce(&cnf.iv, cnf.packet_counter, cnf.direction);
    let aad = h & (sim.ccm.regs.headermask as u8);

    if len == 0 {
        // Empty PDUs cross unencrypted and carry no MIC.
        sim.mem.write(sim.ccm.regs.outptr, &[h, 0]);
        sim.ccm.regs.micstatus = 1;
        return signal_endcrypt(sim);
    }
    if len <= MIC_LEN {
        log::warn!("CCM: received an encrypted PDU shorter than the MIC ({len} bytes)");
        sim.mem.write(sim.ccm.regs.outptr, &[h, len as u8]);
        sim.ccm.regs.micstatus = 0;
        return signal_endcrypt(sim);
    }

    let out_len = len - MIC_LEN;
    let Some(cipher) = sim.mem.get(sim.ccm.regs.inptr + 3, len) else {
        log::warn!("CCM: Rx payload outside the device memory, decryption skipped");
        return Ok(());
    };
    let cipher = cipher.to_vec();
    let mut clear = vec![0u8; out_len];
    let mic_ok = sim
        .crypt
        .decrypt_packet(aad, &cipher, &mut clear, &cnf.key, &nonce)?;

    sim.mem.write(sim.ccm.regs.outptr, &[h, out_len as u8]);
    sim.mem.write(sim.ccm.regs.outptr + 3, &clear);
    sim.ccm.regs.micstatus = u32::from(mic_ok);
    signal_endcrypt(sim)
}

pub fn task_ksgen(sim: &mut Simulator) -> Result {
    if sim.ccm.regs.enable != ENABLE_CCM {
        return Ok(());
    }
    // Nothing to actually generate; the "delay" is zero.
    signal_endksgen(sim)
}

pub fn task_crypt(sim: &mut Simulator) -> Result {
    if sim.ccm.regs.enable != ENABLE_CCM {
        return Ok(());
    }
    if sim.ccm.regs.mode & MODE_DECRYPTION == 0 {
        encrypt_tx(sim)
    } else {
        sim.ccm.decryption_ongoing = true;
        Ok(())
    }
}

pub fn task_stop(sim: &mut Simulator) {
    if sim.ccm.decryption_ongoing {
        log::warn!("CCM: TASK_STOP only disarms the pending decryption in this model");
    }
    sim.ccm.decryption_ongoing = false;
}

pub fn task_rateoverride(sim: &mut Simulator) {
    let _ = sim;
    log::warn!("CCM: TASK_RATEOVERRIDE is not modelled, ignored");
}

pub fn run_task(sim: &mut Simulator, task: CcmTask) -> Result {
    match task {
        CcmTask::KsGen => task_ksgen(sim),
        CcmTask::Crypt => task_crypt(sim),
        CcmTask::Stop => {
            task_stop(sim);
            Ok(())
        }
        CcmTask::RateOverride => {
            task_rateoverride(sim);
            Ok(())
        }
    }
}

/// RADIO hook: the current reception finished (with or without CRC error).
pub fn radio_received_packet(sim: &mut Simulator, crc_error: bool) -> Result {
    if !sim.ccm.decryption_ongoing {
        return Ok(());
    }
    sim.ccm.decryption_ongoing = false;
    decrypt_rx(sim, crc_error)
}

pub fn regw(sim: &mut Simulator, off: u32, value: u32) -> Result {
    use crate::fabric::{EventId, Fabric, TaskId};
    if let Fabric::Dppi(dppi) = &mut sim.fabric {
        match off {
            0x080 => {
                dppi.write_subscribe(TaskId::Ccm(CcmTask::KsGen), value);
                return Ok(());
            }
            0x084 => {
                dppi.write_subscribe(TaskId::Ccm(CcmTask::Crypt), value);
                return Ok(());
            }
            0x088 => {
                dppi.write_subscribe(TaskId::Ccm(CcmTask::Stop), value);
                return Ok(());
            }
            0x180 => {
                dppi.write_publish(EventId::CcmEndKsgen, value);
                return Ok(());
            }
            0x184 => {
                dppi.write_publish(EventId::CcmEndCrypt, value);
                return Ok(());
            }
            0x188 => {
                dppi.write_publish(EventId::CcmError, value);
                return Ok(());
            }
            _ => {}
        }
    }
    match off {
        offs::TASKS_KSGEN => {
            if value != 0 {
                task_ksgen(sim)?;
            }
        }
        offs::TASKS_CRYPT => {
            if value != 0 {
                task_crypt(sim)?;
            }
        }
        offs::TASKS_STOP => {
            if value != 0 {
                task_stop(sim);
            }
        }
        offs::TASKS_RATEOVERRIDE => {
            if value != 0 {
                task_rateoverride(sim);
            }
        }
        offs::EVENTS_ENDKSGEN => {
            sim.ccm.regs.events_endksgen = value;
            eval_interrupt(sim);
        }
        offs::EVENTS_ENDCRYPT => {
            sim.ccm.regs.events_endcrypt = value;
            eval_interrupt(sim);
        }
        offs::EVENTS_ERROR => {
            sim.ccm.regs.events_error = value;
            eval_interrupt(sim);
        }
        offs::SHORTS => sim.ccm.regs.shorts = value,
        offs::INTENSET => {
            if value != 0 {
                sim.ccm.inten |= value;
                eval_interrupt(sim);
            }
        }
        offs::INTENCLR => {
            if value != 0 {
                sim.ccm.inten &= !value;
                eval_interrupt(sim);
            }
        }
        offs::ENABLE => sim.ccm.regs.enable = value & 3,
        offs::MODE => sim.ccm.regs.mode = value,
        offs::CNFPTR => sim.ccm.regs.cnfptr = value,
        offs::INPTR => sim.ccm.regs.inptr = value,
        offs::OUTPTR => sim.ccm.regs.outptr = value,
        offs::SCRATCHPTR => sim.ccm.regs.scratchptr = value,
        offs::MAXPACKETSIZE => sim.ccm.regs.maxpacketsize = value & 0xFF,
        offs::RATEOVERRIDE => sim.ccm.regs.rateoverride = value,
        offs::HEADERMASK => sim.ccm.regs.headermask = value & 0xFF,
        _ => log::warn!("CCM: write to unknown offset 0x{off:03x} ignored"),
    }
    Ok(())
}

pub fn regr(sim: &Simulator, off: u32) -> u32 {
    let c = &sim.ccm;
    match off {
        offs::EVENTS_ENDKSGEN => c.regs.events_endksgen,
        offs::EVENTS_ENDCRYPT => c.regs.events_endcrypt,
        offs::EVENTS_ERROR => c.regs.events_error,
        offs::SHORTS => c.regs.shorts,
        offs::INTENSET => c.inten,
        offs::INTENCLR => 0,
        offs::MICSTATUS => c.regs.micstatus,
        offs::ENABLE => c.regs.enable,
        offs::MODE => c.regs.mode,
        offs::CNFPTR => c.regs.cnfptr,
        offs::INPTR => c.regs.inptr,
        offs::OUTPTR => c.regs.outptr,
        offs::SCRATCHPTR => c.regs.scratchptr,
        offs::MAXPACKETSIZE => c.regs.maxpacketsize,
        offs::RATEOVERRIDE => c.regs.rateoverride,
        offs::HEADERMASK => c.regs.headermask,
        _ => 0,
    }
}
