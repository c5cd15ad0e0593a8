// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Framed, little-endian codec of the Phy protocol.
//!
//! Every message is `[u32 id][u32 payload length][payload]`. The payload
//! layouts mirror the request/response structs field by field; variable
//! parts (Tx packet bytes, Rx sync addresses, received packets) follow the
//! fixed part, length-prefixed where the count is not implied.

use super::{Abort, CcaRequest, Modulation, Power, PhyTime, RxRequest, RxStatusCode, TxRequest};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};

// Device -> Phy
pub const MSG_DISCONNECT: u32 = 0x01;
pub const MSG_TERMINATE: u32 = 0x02;
pub const MSG_WAIT: u32 = 0x03;
pub const MSG_TX: u32 = 0x11;
pub const MSG_RX: u32 = 0x12;
pub const MSG_CCA: u32 = 0x13;
pub const MSG_RX_CONT: u32 = 0x14;
pub const MSG_NEW_TX_ABORT: u32 = 0x15;
pub const MSG_NEW_RX_ABORT: u32 = 0x16;
pub const MSG_NEW_CCA_ABORT: u32 = 0x17;

// Phy -> Device
pub const MSG_TX_END: u32 = 0x81;
pub const MSG_ABORT_REEVAL: u32 = 0x82;
pub const MSG_RX_ADDRESSFOUND: u32 = 0x83;
pub const MSG_RX_END: u32 = 0x84;
pub const MSG_CCA_END: u32 = 0x85;
pub const MSG_WAIT_DONE: u32 = 0x86;

pub fn mod_to_wire(m: Modulation) -> u8 {
    match m {
        Modulation::Ble1M => 0x10,
        Modulation::Ble2M => 0x20,
        Modulation::BleCoded => 0x30,
        Modulation::Ieee154 => 0x40,
    }
}

pub fn status_from_wire(v: u8) -> Option<RxStatusCode> {
    match v {
        0 => Some(RxStatusCode::Ok),
        1 => Some(RxStatusCode::CrcError),
        2 => Some(RxStatusCode::HeaderError),
        3 => Some(RxStatusCode::NoSync),
        _ => None,
    }
}

pub fn write_frame<W: Write>(w: &mut W, id: u32, payload: &[u8]) -> io::Result<()> {
    w.write_u32::<LittleEndian>(id)?;
    w.write_u32::<LittleEndian>(payload.len() as u32)?;
    w.write_all(payload)?;
    w.flush()
}

/// Read one `[id][len][payload]` frame.
pub fn read_frame<R: Read>(r: &mut R) -> io::Result<(u32, Vec<u8>)> {
    let id = r.read_u32::<LittleEndian>()?;
    let len = r.read_u32::<LittleEndian>()? as usize;
    let mut payload = vec![0u8; len];
    r.read_exact(&mut payload)?;
    Ok((id, payload))
}

fn put_u16(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn put_i16(out: &mut Vec<u8>, v: Power) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn put_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn put_u64(out: &mut Vec<u8>, v: u64) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn put_abort(out: &mut Vec<u8>, abort: Abort) {
    put_u64(out, abort.abort_time);
    put_u64(out, abort.recheck_time);
}

pub fn encode_abort(abort: Abort) -> Vec<u8> {
    let mut out = Vec::with_capacity(16);
    put_abort(&mut out, abort);
    out
}

pub fn encode_wait(end: PhyTime) -> Vec<u8> {
    let mut out = Vec::with_capacity(8);
    put_u64(&mut out, end);
    out
}

pub fn encode_tx(req: &TxRequest, packet: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(64 + packet.len());
    put_u64(&mut out, req.start_time);
    put_u64(&mut out, req.end_time);
    put_u64(&mut out, req.phy_address);
    out.push(mod_to_wire(req.modulation));
    put_u16(&mut out, req.center_freq);
    put_i16(&mut out, req.power_level);
    put_u16(&mut out, req.packet_size);
    out.push(req.coding_rate);
    put_abort(&mut out, req.abort);
    out.extend_from_slice(packet);
    out
}

pub fn encode_rx(req: &RxRequest, addresses: &[u64]) -> Vec<u8> {
    let mut out = Vec::with_capacity(96);
    put_u64(&mut out, req.start_time);
    put_u32(&mut out, req.scan_duration);
    out.push(mod_to_wire(req.modulation));
    put_u16(&mut out, req.center_freq);
    put_i16(&mut out, req.antenna_gain);
    put_u32(&mut out, req.pream_and_addr_duration);
    put_u32(&mut out, req.header_duration);
    put_u16(&mut out, req.header_threshold);
    put_u16(&mut out, req.sync_threshold);
    put_u32(&mut out, req.acceptable_pre_truncation);
    put_u32(&mut out, req.error_calc_rate);
    out.push(req.coding_rate);
    put_u32(&mut out, req.forced_packet_duration);
    out.push(u8::from(req.prelocked_tx));
    put_abort(&mut out, req.abort);
    out.push(addresses.len() as u8);
    for addr in addresses {
        put_u64(&mut out, *addr);
    }
    out
}

pub fn encode_rx_cont(accept: bool, abort: Option<Abort>) -> Vec<u8> {
    let mut out = Vec::with_capacity(18);
    out.push(u8::from(accept));
    match abort {
        Some(a) => {
            out.push(1);
            put_abort(&mut out, a);
        }
        None => out.push(0),
    }
    out
}

pub fn encode_cca(req: &CcaRequest) -> Vec<u8> {
    let mut out = Vec::with_capacity(48);
    put_u64(&mut out, req.start_time);
    put_u32(&mut out, req.scan_duration);
    put_u32(&mut out, req.scan_period);
    out.push(mod_to_wire(req.modulation));
    put_u16(&mut out, req.center_freq);
    put_i16(&mut out, req.rssi_threshold);
    put_i16(&mut out, req.mod_threshold);
    out.push(req.stop_when_found);
    put_abort(&mut out, req.abort);
    out
}

pub struct TxEndFields {
    pub end_time: PhyTime,
}

pub fn decode_tx_end(p: &[u8]) -> io::Result<TxEndFields> {
    let mut r = p;
    Ok(TxEndFields {
        end_time: r.read_u64::<LittleEndian>()?,
    })
}

pub struct RxAddressFoundFields {
    pub rx_time_stamp: PhyTime,
    pub rssi: Power,
    pub packet: Vec<u8>,
}

pub fn decode_rx_addressfound(p: &[u8]) -> io::Result<RxAddressFoundFields> {
    let mut r = p;
    let rx_time_stamp = r.read_u64::<LittleEndian>()?;
    let rssi = r.read_i16::<LittleEndian>()?;
    let len = r.read_u16::<LittleEndian>()? as usize;
    let mut packet = vec![0u8; len];
    r.read_exact(&mut packet)?;
    Ok(RxAddressFoundFields {
        rx_time_stamp,
        rssi,
        packet,
    })
}

pub struct RxEndFields {
    pub end_time: PhyTime,
    pub status: u8,
}

pub fn decode_rx_end(p: &[u8]) -> io::Result<RxEndFields> {
    let mut r = p;
    Ok(RxEndFields {
        end_time: r.read_u64::<LittleEndian>()?,
        status: r.read_u8()?,
    })
}

pub struct CcaEndFields {
    pub end_time: PhyTime,
    pub rssi_ave: Power,
    pub rssi_max: Power,
    pub mod_found: bool,
    pub rssi_overthreshold: bool,
}

pub fn decode_cca_end(p: &[u8]) -> io::Result<CcaEndFields> {
    let mut r = p;
    Ok(CcaEndFields {
        end_time: r.read_u64::<LittleEndian>()?,
        rssi_ave: r.read_i16::<LittleEndian>()?,
        rssi_max: r.read_i16::<LittleEndian>()?,
        mod_found: r.read_u8()? != 0,
        rssi_overthreshold: r.read_u8()? != 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn frame_round_trip() {
        let mut buf = Vec::new();
        write_frame(&mut buf, MSG_WAIT, &encode_wait(12345)).unwrap();
        let (id, payload) = read_frame(&mut Cursor::new(buf)).unwrap();
        assert_eq!(id, MSG_WAIT);
        assert_eq!(payload.len(), 8);
    }

    #[test]
    fn rx_addressfound_round_trip() {
        let mut payload = Vec::new();
        put_u64(&mut payload, 777);
        put_i16(&mut payload, -70 * 256);
        put_u16(&mut payload, 3);
        payload.extend_from_slice(&[0xAA, 0xBB, 0xCC]);
        let f = decode_rx_addressfound(&payload).unwrap();
        assert_eq!(f.rx_time_stamp, 777);
        assert_eq!(f.rssi, -70 * 256);
        assert_eq!(f.packet, vec![0xAA, 0xBB, 0xCC]);
    }

    #[test]
    fn tx_request_layout_is_stable() {
        let req = TxRequest {
            start_time: 100,
            end_time: 179,
            phy_address: 0x8E89_BED6,
            packet_size: 5,
            ..TxRequest::default()
        };
        let bytes = encode_tx(&req, &[1, 2, 3, 4, 5]);
        assert_eq!(bytes.len(), 8 + 8 + 8 + 1 + 2 + 2 + 2 + 1 + 16 + 5);
        assert_eq!(&bytes[0..8], &100u64.to_le_bytes());
    }
}
