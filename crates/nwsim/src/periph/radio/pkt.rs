// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Packet-configuration checks, air-packet assembly and Phy request
//! preparation for the RADIO model.
//!
//! Only the BLE (1M/2M/Coded) and 802.15.4 packet formats are supported;
//! START-like tasks validate the configuration registers against the
//! format the selected MODE implies and refuse anything else. Logical
//! address 0 and the default frequency map are the only ones handled.

use crate::mem::DevMem;
use crate::periph::radio::regs::{ccactrl, mode, pcnf0, pcnf1, pdustat, RadioRegs};
use crate::phy::{
    power_from_dbm, Abort, CcaRequest, Modulation, PhyTime, RxRequest, TxRequest,
};
use crate::time::Instant;
use crate::{Result, SimError};

/// Worst-case air packet kept in the model buffers: header + 256B payload
/// + CRC.
pub const MAX_PACKET_SIZE: usize = 256 + 2 + 4;

/// Energy-detect RSSI offset of the modelled SoC (PRF\[dBm\] =
/// ED_RSSIOFFS + VALHARDWARE).
const ED_RSSIOFFS: f64 = -93.0;

pub fn is_ble_mode(mode_reg: u32) -> bool {
    matches!(
        mode_reg,
        mode::BLE_1MBIT | mode::BLE_2MBIT | mode::BLE_LR125KBIT | mode::BLE_LR500KBIT
    )
}

pub fn modulation_from_mode(mode_reg: u32) -> Result<Modulation> {
    match mode_reg {
        mode::BLE_1MBIT => Ok(Modulation::Ble1M),
        mode::BLE_2MBIT => Ok(Modulation::Ble2M),
        mode::BLE_LR125KBIT | mode::BLE_LR500KBIT => Ok(Modulation::BleCoded),
        mode::IEEE802154_250KBIT => Ok(Modulation::Ieee154),
        other => Err(SimError::BadConfig(format!(
            "RADIO: unsupported MODE {other}"
        ))),
    }
}

/// CRC length in bytes from CRCCNF.
pub fn crc_len(regs: &RadioRegs) -> u32 {
    regs.crccnf & 0x3
}

pub fn maxlen(regs: &RadioRegs) -> u32 {
    (regs.pcnf1 & pcnf1::MAXLEN_MASK) >> pcnf1::MAXLEN_POS
}

fn check_crc_conf_ble(regs: &RadioRegs) -> Result {
    if crc_len(regs) != 3 {
        return Err(SimError::BadConfig(format!(
            "RADIO: only a 3-byte CRC is supported in BLE modes (CRCCNF={})",
            regs.crccnf & 0x3
        )));
    }
    Ok(())
}

fn check_pcnf1_ble(regs: &RadioRegs) -> Result {
    let checked = regs.pcnf1
        & (pcnf1::WHITEEN | pcnf1::ENDIAN_BIG | pcnf1::BALEN_MASK | pcnf1::STATLEN_MASK);
    let expected = pcnf1::WHITEEN | (3 << pcnf1::BALEN_POS);
    if checked != expected {
        return Err(SimError::BadConfig(format!(
            "RADIO: only the BLE packet format is supported with BLE modulations (PCNF1={:#x})",
            regs.pcnf1
        )));
    }
    check_crc_conf_ble(regs)
}

fn check_ble_1m_conf(regs: &RadioRegs) -> Result {
    let checked = regs.pcnf0
        & (pcnf0::PLEN_MASK | pcnf0::S1LEN_MASK | pcnf0::S0LEN_MASK | pcnf0::LFLEN_MASK);
    let expected = (8 << pcnf0::LFLEN_POS)
        | (1 << pcnf0::S0LEN_POS)
        | (pcnf0::PLEN_8BIT << pcnf0::PLEN_POS);
    if checked != expected {
        return Err(SimError::BadConfig(format!(
            "RADIO: for 1 Mbps only the BLE packet format is supported (PCNF0={:#x})",
            regs.pcnf0
        )));
    }
    check_pcnf1_ble(regs)
}

fn check_ble_2m_conf(regs: &RadioRegs) -> Result {
    let checked = regs.pcnf0
        & (pcnf0::PLEN_MASK | pcnf0::S1LEN_MASK | pcnf0::S0LEN_MASK | pcnf0::LFLEN_MASK);
    let expected = (8 << pcnf0::LFLEN_POS)
        | (1 << pcnf0::S0LEN_POS)
        | (pcnf0::PLEN_16BIT << pcnf0::PLEN_POS);
    if checked != expected {
        return Err(SimError::BadConfig(format!(
            "RADIO: for 2 Mbps only the BLE packet format is supported (PCNF0={:#x})",
            regs.pcnf0
        )));
    }
    check_pcnf1_ble(regs)
}

fn check_ble_lr_conf(regs: &RadioRegs) -> Result {
    let checked = regs.pcnf0
        & (pcnf0::TERMLEN_MASK
            | pcnf0::PLEN_MASK
            | pcnf0::CILEN_MASK
            | pcnf0::S1LEN_MASK
            | pcnf0::S0LEN_MASK
            | pcnf0::LFLEN_MASK);
    let expected = (8 << pcnf0::LFLEN_POS)
        | (1 << pcnf0::S0LEN_POS)
        | (2 << pcnf0::CILEN_POS)
        | (pcnf0::PLEN_LONG_RANGE << pcnf0::PLEN_POS)
        | (3 << pcnf0::TERMLEN_POS);
    if checked != expected {
        return Err(SimError::BadConfig(format!(
            "RADIO: for coded BLE only the BLE packet format is supported (PCNF0={:#x})",
            regs.pcnf0
        )));
    }
    check_pcnf1_ble(regs)
}

fn check_154_conf(regs: &RadioRegs) -> Result {
    let checked = regs.pcnf0
        & (pcnf0::TERMLEN_MASK
            | pcnf0::CRCINC
            | pcnf0::PLEN_MASK
            | pcnf0::CILEN_MASK
            | pcnf0::S1INCL
            | pcnf0::S1LEN_MASK
            | pcnf0::S0LEN_MASK
            | pcnf0::LFLEN_MASK);
    let expected = pcnf0::CRCINC
        | (pcnf0::PLEN_32BIT_ZERO << pcnf0::PLEN_POS)
        | (8 << pcnf0::LFLEN_POS);
    if checked != expected {
        return Err(SimError::BadConfig(format!(
            "RADIO: with 15.4 modulation only the 802.15.4 frame format is supported (PCNF0={:#x})",
            regs.pcnf0
        )));
    }
    let checked = regs.pcnf1
        & (pcnf1::WHITEEN | pcnf1::ENDIAN_BIG | pcnf1::BALEN_MASK | pcnf1::STATLEN_MASK);
    if checked != 0 {
        return Err(SimError::BadConfig(format!(
            "RADIO: with 15.4 modulation only the 802.15.4 frame format is supported (PCNF1={:#x})",
            regs.pcnf1
        )));
    }
    if crc_len(regs) != 2 {
        return Err(SimError::BadConfig(format!(
            "RADIO: only a 2-byte CRC is supported in 15.4 mode (CRCCNF={})",
            regs.crccnf & 0x3
        )));
    }
    Ok(())
}

/// Validate the packet configuration against the selected MODE.
pub fn check_packet_conf(regs: &RadioRegs) -> Result {
    match regs.mode {
        mode::BLE_1MBIT => check_ble_1m_conf(regs),
        mode::BLE_2MBIT => check_ble_2m_conf(regs),
        mode::BLE_LR125KBIT | mode::BLE_LR500KBIT => check_ble_lr_conf(regs),
        mode::IEEE802154_250KBIT => check_154_conf(regs),
        other => Err(SimError::BadConfig(format!(
            "RADIO: only BLE and 802.15.4 packet formats are supported (MODE={other})"
        ))),
    }
}

/// The on-air sync word for a logical address (or the SFD in 15.4 mode).
pub fn get_address(regs: &RadioRegs, logical: u32) -> u64 {
    if regs.mode == mode::IEEE802154_250KBIT {
        return u64::from(regs.sfd & 0xFF);
    }
    let logical = logical & 0x7;
    let balen_bits = 8 * ((regs.pcnf1 & pcnf1::BALEN_MASK) >> pcnf1::BALEN_POS);
    let base = if logical == 0 { regs.base0 } else { regs.base1 };
    let prefix_reg = if logical < 4 { regs.prefix0 } else { regs.prefix1 };
    let prefix = u64::from((prefix_reg >> (8 * (logical & 0x3))) & 0xFF);
    (prefix << balen_bits) | u64::from(base >> (32 - balen_bits))
}

/// Payload length out of the packet header bytes, not counting the CRC and
/// not adding S0/S1.
pub fn payload_length(regs: &RadioRegs, buf: &[u8]) -> usize {
    let s0_len = ((regs.pcnf0 & pcnf0::S0LEN_MASK) >> pcnf0::S0LEN_POS) as usize;
    let lf_bits = ((regs.pcnf0 & pcnf0::LFLEN_MASK) >> pcnf0::LFLEN_POS) as usize;
    let lf_bytes = (lf_bits + 7) / 8;

    let mut len = 0usize;
    for i in 0..lf_bytes {
        len += (buf[s0_len + i] as usize) << (i * 8);
    }
    if regs.pcnf0 & pcnf0::CRCINC != 0 {
        let crc = crc_len(regs) as usize;
        if len >= crc {
            len -= crc;
        } else {
            log::warn!(
                "RADIO: length field ({len}) smaller than the included CRC length ({crc})"
            );
            len = 0;
        }
    }
    len
}

pub fn capped_payload_length(regs: &RadioRegs, buf: &[u8]) -> usize {
    payload_length(regs, buf).min(maxlen(regs) as usize)
}

/// Extract the received CRC from the wire bytes.
pub fn rx_crc_value(regs: &RadioRegs, buf: &[u8], packet_size: usize) -> u32 {
    let crc_len = crc_len(regs) as usize;
    let payload_len = capped_payload_length(regs, buf);
    let crc_off = if is_ble_mode(regs.mode) {
        if packet_size < 5 {
            return 0;
        }
        2 + payload_len
    } else if regs.mode == mode::IEEE802154_250KBIT {
        if packet_size < 3 {
            return 0;
        }
        1 + payload_len
    } else {
        return 0;
    };
    let mut crc = 0u32;
    for i in 0..crc_len.min(4) {
        if let Some(b) = buf.get(crc_off + i) {
            crc |= u32::from(*b) << (8 * i);
        }
    }
    crc
}

/// Assemble the air packet (from the header on, preamble and sync word
/// excluded) into `tx_buf`, reading the PDU from PACKETPTR.
///
/// Returns the payload length (after S0+LEN+S1, before the CRC). A PDU
/// longer than PCNF1.MAXLEN is truncated and PDUSTAT is set.
pub fn tx_copy_payload(regs: &mut RadioRegs, mem: &DevMem, tx_buf: &mut [u8]) -> usize {
    let s0_len = ((regs.pcnf0 & pcnf0::S0LEN_MASK) >> pcnf0::S0LEN_POS) as usize;
    let s1_air_bits = ((regs.pcnf0 & pcnf0::S1LEN_MASK) >> pcnf0::S1LEN_POS) as usize;
    let s1_bytes = (s1_air_bits + 7) / 8;
    let lf_bits = ((regs.pcnf0 & pcnf0::LFLEN_MASK) >> pcnf0::LFLEN_POS) as usize;
    let lf_bytes = (lf_bits + 7) / 8;

    let mut ram = [0u8; MAX_PACKET_SIZE];
    let hdr_ram_len = s0_len + lf_bytes + 2;
    if !mem.read(regs.packetptr, &mut ram[..hdr_ram_len.min(MAX_PACKET_SIZE)]) {
        return 0;
    }

    let mut i = 0usize;
    if s0_len != 0 {
        tx_buf[0] = ram[0];
        i += 1;
    }
    for _ in 0..lf_bytes {
        tx_buf[i] = ram[i];
        i += 1;
    }
    // When S1INCL is set with S1LEN == 0, one S1 byte in RAM is skipped.
    let s1_skip = usize::from(regs.pcnf0 & pcnf0::S1INCL != 0 && s1_bytes == 0);

    let mut payload_len = payload_length(regs, tx_buf);
    let max_len = maxlen(regs) as usize;
    if payload_len > max_len {
        log::warn!(
            "RADIO: transmitting a packet longer than the configured MAXLEN ({payload_len}>{max_len}), \
             truncating it; a corrupted packet goes on air"
        );
        payload_len = max_len;
        regs.pdustat = pdustat::PDUSTAT;
    } else {
        regs.pdustat = 0;
    }

    let copy_len = payload_len + s1_bytes;
    let mut body = vec![0u8; copy_len];
    if copy_len > 0 && !mem.read(regs.packetptr + (i + s1_skip) as u32, &mut body) {
        return 0;
    }
    tx_buf[i..i + copy_len].copy_from_slice(&body);
    payload_len
}

/// Device RSSI register format (positive quarter of dB below 0 dBm,
/// saturated).
pub fn rssi_value_to_modem_format(rssi_dbm: f64) -> u32 {
    let v = -rssi_dbm.max(-127.0);
    v.max(0.0) as u32
}

/// ED/LQI register format.
pub fn dbm_to_modem_lqi_format(rssi_dbm: f64) -> u8 {
    let v = rssi_dbm - ED_RSSIOFFS;
    v.clamp(0.0, 255.0) as u8
}

pub fn lqi_format_to_dbm(value: u32) -> f64 {
    f64::from(value) + ED_RSSIOFFS
}

fn center_freq(regs: &RadioRegs) -> u16 {
    (regs.frequency & 0x3F) as u16
}

/// Prepare a Phy Tx request (the abort substructure is left for the
/// caller to fill).
pub fn prep_tx_request(
    regs: &RadioRegs,
    packet_size: usize,
    packet_duration: Instant,
    start_time: PhyTime,
    coding_rate: u8,
) -> Result<TxRequest> {
    let tx_power_dbm = f64::from((regs.txpower & 0xFF) as u8 as i8);
    Ok(TxRequest {
        start_time,
        end_time: start_time + packet_duration - 1,
        phy_address: get_address(regs, regs.txaddress),
        modulation: modulation_from_mode(regs.mode)?,
        center_freq: center_freq(regs),
        power_level: power_from_dbm(tx_power_dbm),
        packet_size: packet_size as u16,
        coding_rate,
        abort: Abort::default(),
    })
}

/// Prepare a Phy Rx request for a plain packet (or the FEC2 part of a
/// CodedPhy packet, provisionally assuming S=8).
pub fn prep_rx_request(regs: &RadioRegs, start_time: PhyTime) -> Result<RxRequest> {
    let (preamble_len, address_len, header_len, bits_per_us, pre_trunc, sync_threshold) =
        match regs.mode {
            mode::BLE_1MBIT => (1u32, 4u32, 2u32, 1.0f64, 0u32, 2u16),
            mode::BLE_2MBIT => (2, 4, 2, 2.0, 0, 2),
            // FEC2 part: the preamble/CI belong to the FEC1 request.
            mode::BLE_LR125KBIT | mode::BLE_LR500KBIT => (0, 0, 2, 0.125, 0, 0xFFFF),
            mode::IEEE802154_250KBIT => (4, 1, 0, 0.25, 104, 0),
            other => {
                return Err(SimError::BadConfig(format!(
                    "RADIO: unsupported MODE {other}"
                )))
            }
        };
    Ok(RxRequest {
        start_time,
        scan_duration: u32::MAX,
        modulation: modulation_from_mode(regs.mode)?,
        center_freq: center_freq(regs),
        antenna_gain: 0,
        pream_and_addr_duration: ((preamble_len + address_len) as f64 * 8.0 / bits_per_us) as u32,
        header_duration: (header_len as f64 * 8.0 / bits_per_us) as u32,
        header_threshold: 0,
        sync_threshold,
        acceptable_pre_truncation: pre_trunc,
        error_calc_rate: (bits_per_us * 1e6) as u32,
        coding_rate: 0,
        forced_packet_duration: u32::MAX,
        prelocked_tx: false,
        abort: Abort::default(),
    })
}

/// Prepare a Phy Rx request for the FEC1 part of a CodedPhy packet.
pub fn prep_rx_request_fec1(regs: &RadioRegs, start_time: PhyTime) -> Result<RxRequest> {
    Ok(RxRequest {
        start_time,
        scan_duration: u32::MAX,
        modulation: modulation_from_mode(regs.mode)?,
        center_freq: center_freq(regs),
        antenna_gain: 0,
        pream_and_addr_duration: 80 + 256,
        header_duration: 16, // the CI
        // CI errors are handled via the packet-error result instead.
        header_threshold: 0xFFFF,
        sync_threshold: 2,
        // The modem manages with ~15us of coded preamble in good conditions.
        acceptable_pre_truncation: 65,
        error_calc_rate: 125_000,
        coding_rate: 8,
        forced_packet_duration: u32::MAX,
        prelocked_tx: false,
        abort: Abort::default(),
    })
}

/// Prepare a Phy CCA/ED request from CCACTRL/EDCNT.
pub fn prep_cca_request(
    regs: &RadioRegs,
    start_time: PhyTime,
    cca_not_ed: bool,
    rx_pow_offset: f64,
) -> Result<CcaRequest> {
    if regs.mode != mode::IEEE802154_250KBIT {
        return Err(SimError::BadConfig(
            "RADIO: CCA/ED procedures are only supported with 15.4 modulation".into(),
        ));
    }
    let symbol_time = crate::config::SYMBOL_TIME_154 as u32;
    let mut req = CcaRequest {
        start_time,
        scan_duration: 8 * symbol_time,
        scan_period: 2 * symbol_time, // 4 measurements per window
        modulation: Modulation::Ieee154,
        center_freq: center_freq(regs),
        rssi_threshold: power_from_dbm(100.0),
        mod_threshold: power_from_dbm(100.0),
        stop_when_found: 0,
        abort: Abort::default(),
    };
    if cca_not_ed {
        let ed_thres =
            (regs.ccactrl & ccactrl::CCAEDTHRES_MASK) >> ccactrl::CCAEDTHRES_POS;
        let cca_mode = regs.ccactrl & ccactrl::CCAMODE_MASK;
        // Any signal the modem can detect at all.
        let carrier_detect_level = -110.0 - rx_pow_offset;
        let ed_threshold_dbm = lqi_format_to_dbm(ed_thres) - rx_pow_offset;
        match cca_mode {
            ccactrl::ED_MODE => {
                req.rssi_threshold = power_from_dbm(ed_threshold_dbm);
                req.stop_when_found = 0;
            }
            ccactrl::CARRIER_MODE => {
                req.stop_when_found = 1;
                req.mod_threshold = power_from_dbm(carrier_detect_level);
                // The Phy cannot detect on correlator output alone;
                // CCACORRCNT/CCACORRTHRES are ignored.
            }
            ccactrl::CARRIER_AND_ED_MODE | ccactrl::CARRIER_OR_ED_MODE => {
                req.stop_when_found = 1;
                req.rssi_threshold = power_from_dbm(ed_threshold_dbm);
                req.mod_threshold = power_from_dbm(carrier_detect_level);
            }
            ccactrl::ED_MODE_TEST1 => {
                req.rssi_threshold = power_from_dbm(ed_threshold_dbm);
                req.stop_when_found = 2;
            }
            other => {
                return Err(SimError::BadConfig(format!(
                    "RADIO: CCAMODE={other} is not supported"
                )))
            }
        }
    } else {
        req.scan_duration = 8 * symbol_time * ((regs.edcnt & 0x001F_FFFF) + 1);
        req.scan_period = 2 * symbol_time;
    }
    Ok(req)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::periph::radio::regs::RadioRegs;

    fn ble_1m_regs() -> RadioRegs {
        let mut regs = RadioRegs::reset_values();
        regs.mode = mode::BLE_1MBIT;
        regs.pcnf0 = (8 << pcnf0::LFLEN_POS) | (1 << pcnf0::S0LEN_POS);
        regs.pcnf1 = pcnf1::WHITEEN | (3 << pcnf1::BALEN_POS) | 37;
        regs.crccnf = 3;
        regs.base0 = 0x89BE_D600;
        regs.prefix0 = 0x0000_008E;
        regs
    }

    #[test]
    fn ble_advertising_configuration_passes_the_check() {
        let regs = ble_1m_regs();
        check_packet_conf(&regs).unwrap();
    }

    #[test]
    fn wrong_crc_length_is_rejected() {
        let mut regs = ble_1m_regs();
        regs.crccnf = 2;
        assert!(check_packet_conf(&regs).is_err());
    }

    #[test]
    fn access_address_assembly() {
        let regs = ble_1m_regs();
        // BALEN=3 -> base is the top 3 bytes of BASE0, prefix on top.
        assert_eq!(get_address(&regs, 0), 0x8E89_BED6);
    }

    #[test]
    fn payload_length_reads_the_length_byte() {
        let regs = ble_1m_regs();
        let buf = [0x42u8, 0x11, 0, 0];
        assert_eq!(payload_length(&regs, &buf), 0x11);
    }

    #[test]
    fn crcinc_deducts_the_crc() {
        let mut regs = RadioRegs::reset_values();
        regs.mode = mode::IEEE802154_250KBIT;
        regs.pcnf0 = pcnf0::CRCINC
            | (pcnf0::PLEN_32BIT_ZERO << pcnf0::PLEN_POS)
            | (8 << pcnf0::LFLEN_POS);
        regs.pcnf1 = 127;
        regs.crccnf = 2;
        let buf = [0x0Au8, 0, 0, 0];
        assert_eq!(payload_length(&regs, &buf), 8);
    }

    #[test]
    fn rssi_formats() {
        assert_eq!(rssi_value_to_modem_format(-60.0), 60);
        assert_eq!(rssi_value_to_modem_format(-200.0), 127);
        assert_eq!(dbm_to_modem_lqi_format(-93.0), 0);
        assert_eq!(dbm_to_modem_lqi_format(-63.0), 30);
    }
}
