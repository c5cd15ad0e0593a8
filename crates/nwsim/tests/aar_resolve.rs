// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Address-resolver scenarios: a hit at the second IRK, a non-resolvable
//! address, and a mid-search STOP.

mod common;

use common::ppi_device;
use nwsim::bus::CCM_AAR_BASE;
use nwsim::crypto::BleCrypt;
use nwsim::periph::aar::offs;

const IRK_RAM: u32 = 0x2000_0400;
const ADDR_RAM: u32 = 0x2000_0500;

const MATCHING_IRK: [u8; 16] = [
    0x0C, 0x0D, 0x0E, 0x0F, 0x10, 0x11, 0x12, 0x13, 0x14, 0x15, 0x16, 0x17, 0x18, 0x19, 0x1A,
    0x1B,
];

/// A resolvable private address (prand top bits 0b01) whose hash matches
/// `irk`, laid out as it sits in RAM after the 3-byte S0/LEN/S1 prefix.
fn resolvable_address_for(irk: &[u8; 16]) -> [u8; 6] {
    let prand: u32 = (0b01 << 22) | 0x02345;
    let mut prand_be = [0u8; 16];
    prand_be[15] = (prand & 0xFF) as u8;
    prand_be[14] = ((prand >> 8) & 0xFF) as u8;
    prand_be[13] = ((prand >> 16) & 0xFF) as u8;
    let out = BleCrypt::new(true).aes128(irk, &prand_be);
    [
        out[15],
        out[14],
        out[13],
        (prand & 0xFF) as u8,
        ((prand >> 8) & 0xFF) as u8,
        ((prand >> 16) & 0xFF) as u8,
    ]
}

fn setup_aar(sim: &mut nwsim::Simulator, nirk: u32, address: &[u8; 6]) {
    // Three IRKs; only index 1 is the generating key.
    let mut table = Vec::new();
    table.extend_from_slice(&[0x55u8; 16]);
    table.extend_from_slice(&MATCHING_IRK);
    table.extend_from_slice(&[0xAAu8; 16]);
    sim.mem.write(IRK_RAM, &table);

    let mut pdu = [0u8; 9];
    pdu[3..9].copy_from_slice(address);
    sim.mem.write(ADDR_RAM, &pdu);

    sim.write32(CCM_AAR_BASE + offs::ENABLE, 3).unwrap();
    sim.write32(CCM_AAR_BASE + offs::NIRK, nirk).unwrap();
    sim.write32(CCM_AAR_BASE + offs::IRKPTR, IRK_RAM).unwrap();
    sim.write32(CCM_AAR_BASE + offs::ADDRPTR, ADDR_RAM).unwrap();
}

/// Hit at index 1: two keys visited, END at 1 + 6*2 us, STATUS=1.
#[test]
fn resolves_at_the_second_irk() {
    let (mut sim, _phy) = ppi_device();
    let addr = resolvable_address_for(&MATCHING_IRK);
    setup_aar(&mut sim, 3, &addr);

    sim.write32(CCM_AAR_BASE + offs::TASKS_START, 1).unwrap();
    sim.run_until(12).unwrap();
    assert_eq!(sim.read32(CCM_AAR_BASE + offs::EVENTS_END), 0);
    sim.run_until(13).unwrap();

    assert_eq!(sim.read32(CCM_AAR_BASE + offs::EVENTS_END), 1);
    assert_eq!(sim.read32(CCM_AAR_BASE + offs::EVENTS_RESOLVED), 1);
    assert_eq!(sim.read32(CCM_AAR_BASE + offs::EVENTS_NOTRESOLVED), 0);
    assert_eq!(sim.read32(CCM_AAR_BASE + offs::STATUS), 1);
}

/// An address without the 0b01 marker is not resolvable: no AES runs, the
/// full NIRK count is still charged, NOTRESOLVED is raised.
#[test]
fn non_resolvable_address() {
    let (mut sim, _phy) = ppi_device();
    let mut addr = resolvable_address_for(&MATCHING_IRK);
    addr[5] |= 0xC0; // prand top bits 0b11
    setup_aar(&mut sim, 3, &addr);

    sim.write32(CCM_AAR_BASE + offs::TASKS_START, 1).unwrap();
    sim.run_until(1 + 6 * 3).unwrap();

    assert_eq!(sim.read32(CCM_AAR_BASE + offs::EVENTS_END), 1);
    assert_eq!(sim.read32(CCM_AAR_BASE + offs::EVENTS_RESOLVED), 0);
    assert_eq!(sim.read32(CCM_AAR_BASE + offs::EVENTS_NOTRESOLVED), 1);
}

/// A wrong key set never matches.
#[test]
fn no_irk_matches() {
    let (mut sim, _phy) = ppi_device();
    let other_irk = [0x77u8; 16];
    let addr = resolvable_address_for(&other_irk);
    setup_aar(&mut sim, 3, &addr);

    sim.write32(CCM_AAR_BASE + offs::TASKS_START, 1).unwrap();
    sim.run_until(100).unwrap();
    assert_eq!(sim.read32(CCM_AAR_BASE + offs::EVENTS_NOTRESOLVED), 1);
    assert_eq!(sim.read32(CCM_AAR_BASE + offs::EVENTS_RESOLVED), 0);
}

/// STOP cuts the search short: END alone, no verdict events.
#[test]
fn stop_ends_the_search_with_end_only() {
    let (mut sim, _phy) = ppi_device();
    let addr = resolvable_address_for(&MATCHING_IRK);
    setup_aar(&mut sim, 3, &addr);

    sim.write32(CCM_AAR_BASE + offs::TASKS_START, 1).unwrap();
    sim.run_until(5).unwrap();
    sim.write32(CCM_AAR_BASE + offs::TASKS_STOP, 1).unwrap();
    sim.run_until(100).unwrap();

    assert_eq!(sim.read32(CCM_AAR_BASE + offs::EVENTS_END), 1);
    assert_eq!(sim.read32(CCM_AAR_BASE + offs::EVENTS_RESOLVED), 0);
    assert_eq!(sim.read32(CCM_AAR_BASE + offs::EVENTS_NOTRESOLVED), 0);
}
