// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Receive-side scenario: an encrypted BLE data PDU arrives with a good
//! CRC and the CCM (armed through the ENDKSGEN->CRYPT shortcut) verifies
//! and decrypts it at the packet end.

mod common;

use common::device;
use nwsim::bus::{CCM_AAR_BASE, RADIO_BASE};
use nwsim::config::FabricKind;
use nwsim::crypto::{ccm_nonce, BleCrypt};
use nwsim::periph::ccm::offs as ccm_offs;
use nwsim::periph::radio::regs::offs;
use nwsim::phy::{power_from_dbm, RxResponse, RxStatusCode};

const RX_RAM: u32 = 0x2000_0200;
const OUT_RAM: u32 = 0x2000_0300;
const CNF_RAM: u32 = 0x2000_0100;

const KEY: [u8; 16] = [
    0xBF, 0x01, 0xFB, 0x9D, 0x4E, 0xF3, 0xBC, 0x36, 0xD8, 0x74, 0xF5, 0x39, 0x41, 0x38, 0x68,
    0x4C,
];
const IV: [u8; 8] = [0x99, 0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF, 0x11];
const PKT_CTR: u64 = 5;
const DIRECTION: u8 = 1;

fn setup_ccm_decrypt(sim: &mut nwsim::Simulator) {
    let mut cnf = Vec::new();
    cnf.extend_from_slice(&KEY);
    cnf.extend_from_slice(&PKT_CTR.to_le_bytes()); // 39-bit counter + padding
    cnf.push(DIRECTION);
    cnf.extend_from_slice(&IV);
    assert_eq!(cnf.len(), 33);
    sim.mem.write(CNF_RAM, &cnf);

    sim.write32(CCM_AAR_BASE + ccm_offs::ENABLE, 2).unwrap();
    sim.write32(CCM_AAR_BASE + ccm_offs::MODE, 1).unwrap(); // decryption
    sim.write32(CCM_AAR_BASE + ccm_offs::CNFPTR, CNF_RAM).unwrap();
    sim.write32(CCM_AAR_BASE + ccm_offs::INPTR, RX_RAM).unwrap();
    sim.write32(CCM_AAR_BASE + ccm_offs::OUTPTR, OUT_RAM).unwrap();
    sim.write32(CCM_AAR_BASE + ccm_offs::SHORTS, 1).unwrap(); // ENDKSGEN->CRYPT

    sim.write32(CCM_AAR_BASE + ccm_offs::TASKS_KSGEN, 1).unwrap();
    assert_eq!(sim.read32(CCM_AAR_BASE + ccm_offs::EVENTS_ENDKSGEN), 1);
}

/// Build the on-air packet: header, length, ciphertext+MIC, CRC bytes.
fn wire_packet(header: u8, clear: &[u8]) -> Vec<u8> {
    let crypt = BleCrypt::new(true);
    let nonce = ccm_nonce(&IV, PKT_CTR, DIRECTION);
    let mut cipher = vec![0u8; clear.len() + 4];
    crypt
        .encrypt_packet(header & 0xE3, clear, &mut cipher, &KEY, &nonce)
        .unwrap();

    let mut pkt = vec![header, (clear.len() + 4) as u8];
    pkt.extend_from_slice(&cipher);
    pkt.extend_from_slice(&[0xAA, 0xBB, 0xCC]); // CRC as received
    pkt
}

fn run_rx(sim: &mut nwsim::Simulator, phy: &common::ScriptedPhy, packet: Vec<u8>) {
    let air_len = packet.len();
    phy.push_rx(RxResponse::AddressFound {
        rx_time_stamp: 200,
        rssi: power_from_dbm(-60.0),
        packet,
    });
    // End = sync end + (header + payload) * 8us + CRC (24us at 1 Mbps).
    let end_time = 200 + ((air_len - 3) * 8) as u64 + 24;
    phy.push_rx(RxResponse::End {
        end_time,
        status: RxStatusCode::Ok,
    });

    sim.write32(RADIO_BASE + offs::TASKS_RXEN, 1).unwrap();
    sim.run_until(129).unwrap();
    assert_eq!(sim.read32(RADIO_BASE + offs::EVENTS_RXREADY), 1);
    sim.write32(RADIO_BASE + offs::TASKS_START, 1).unwrap();
    sim.run_until(500).unwrap();
}

#[test]
fn rx_with_ccm_decrypt_good_mic() {
    let (mut sim, phy) = device(FabricKind::Ppi, true);
    common::config_radio_ble_adv(&mut sim);
    // S1 byte skipped in RAM so the payload lands at +3 as the CCM expects.
    let pcnf0 = sim.read32(RADIO_BASE + offs::PCNF0) | (1 << 20);
    sim.write32(RADIO_BASE + offs::PCNF0, pcnf0).unwrap();
    sim.write32(RADIO_BASE + offs::PACKETPTR, RX_RAM).unwrap();
    setup_ccm_decrypt(&mut sim);

    let clear = [0x10u8, 0x20, 0x30, 0x40, 0x50];
    run_rx(&mut sim, &phy, wire_packet(0x03, &clear));

    assert_eq!(sim.read32(RADIO_BASE + offs::EVENTS_CRCOK), 1);
    assert_eq!(sim.read32(RADIO_BASE + offs::EVENTS_CRCERROR), 0);
    assert_eq!(sim.read32(RADIO_BASE + offs::EVENTS_END), 1);
    assert_eq!(sim.read32(RADIO_BASE + offs::RXCRC), 0x00CC_BBAA);
    assert_eq!(sim.read32(RADIO_BASE + offs::CRCSTATUS), 1);

    // ENDCRYPT fired with a verified MIC and the payload decrypted.
    assert_eq!(sim.read32(CCM_AAR_BASE + ccm_offs::EVENTS_ENDCRYPT), 1);
    assert_eq!(sim.read32(CCM_AAR_BASE + ccm_offs::MICSTATUS), 1);
    let mut out = [0u8; 8];
    assert!(sim.mem.read(OUT_RAM, &mut out));
    assert_eq!(out[0], 0x03);
    assert_eq!(out[1], clear.len() as u8);
    assert_eq!(&out[3..8], &clear);
}

#[test]
fn rx_with_ccm_decrypt_corrupted_mic() {
    let (mut sim, phy) = device(FabricKind::Ppi, true);
    common::config_radio_ble_adv(&mut sim);
    let pcnf0 = sim.read32(RADIO_BASE + offs::PCNF0) | (1 << 20);
    sim.write32(RADIO_BASE + offs::PCNF0, pcnf0).unwrap();
    sim.write32(RADIO_BASE + offs::PACKETPTR, RX_RAM).unwrap();
    setup_ccm_decrypt(&mut sim);

    let clear = [0x10u8, 0x20, 0x30, 0x40, 0x50];
    let mut pkt = wire_packet(0x03, &clear);
    pkt[4] ^= 0x80; // one flipped ciphertext bit
    run_rx(&mut sim, &phy, pkt);

    assert_eq!(sim.read32(CCM_AAR_BASE + ccm_offs::EVENTS_ENDCRYPT), 1);
    assert_eq!(sim.read32(CCM_AAR_BASE + ccm_offs::MICSTATUS), 0);
}

#[test]
fn rx_crc_error_skips_the_decryption() {
    let (mut sim, phy) = device(FabricKind::Ppi, true);
    common::config_radio_ble_adv(&mut sim);
    let pcnf0 = sim.read32(RADIO_BASE + offs::PCNF0) | (1 << 20);
    sim.write32(RADIO_BASE + offs::PCNF0, pcnf0).unwrap();
    sim.write32(RADIO_BASE + offs::PACKETPTR, RX_RAM).unwrap();
    setup_ccm_decrypt(&mut sim);

    let clear = [0x10u8, 0x20, 0x30];
    let pkt = wire_packet(0x03, &clear);
    let air_len = pkt.len();
    phy.push_rx(RxResponse::AddressFound {
        rx_time_stamp: 200,
        rssi: power_from_dbm(-60.0),
        packet: pkt,
    });
    phy.push_rx(RxResponse::End {
        end_time: 200 + ((air_len - 3) * 8) as u64 + 24,
        status: RxStatusCode::CrcError,
    });

    sim.write32(RADIO_BASE + offs::TASKS_RXEN, 1).unwrap();
    sim.run_until(129).unwrap();
    sim.write32(RADIO_BASE + offs::TASKS_START, 1).unwrap();
    sim.run_until(500).unwrap();

    assert_eq!(sim.read32(RADIO_BASE + offs::EVENTS_CRCERROR), 1);
    assert_eq!(sim.read32(RADIO_BASE + offs::EVENTS_CRCOK), 0);
    // MICSTATUS cleared, ENDCRYPT still raised for firmware compatibility.
    assert_eq!(sim.read32(CCM_AAR_BASE + ccm_offs::EVENTS_ENDCRYPT), 1);
    assert_eq!(sim.read32(CCM_AAR_BASE + ccm_offs::MICSTATUS), 0);
}
