// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Transmit-side scenarios: a full BLE advertising transmission and a
//! mid-packet abort driven through the fixed PPI channels.

mod common;

use common::{ppi_device, PhyCall};
use nwsim::bus::{RADIO_BASE, TIMER0_BASE};
use nwsim::periph::radio::regs::offs;
use nwsim::phy::TxResponse;
use nwsim::time::NEVER;

const PACKET_RAM: u32 = 0x2000_0000;

/// BLE 1 Mbps Tx of an empty advertising PDU: ramp-up 130us, chain delay
/// 1us, 40us of preamble+access address, empty payload, 24us of CRC.
#[test]
fn ble_1mbps_empty_adv_pdu_tx() {
    let (mut sim, phy) = ppi_device();
    common::config_radio_ble_adv(&mut sim);
    sim.write32(RADIO_BASE + offs::PACKETPTR, PACKET_RAM).unwrap();
    sim.mem.write(PACKET_RAM, &[0x02, 0x00]);

    phy.push_tx(TxResponse::End { end_time: 210 });

    sim.write32(RADIO_BASE + offs::TASKS_TXEN, 1).unwrap();
    assert_eq!(sim.read32(RADIO_BASE + offs::STATE), 9); // TXRU

    sim.run_until(130).unwrap();
    assert_eq!(sim.read32(RADIO_BASE + offs::EVENTS_READY), 1);
    assert_eq!(sim.read32(RADIO_BASE + offs::EVENTS_TXREADY), 1);
    assert_eq!(sim.read32(RADIO_BASE + offs::STATE), 10); // TXIDLE

    sim.write32(RADIO_BASE + offs::TASKS_START, 1).unwrap();

    // ADDRESS at 130 + 1 (chain delay) + 40 (preamble+AA) - 1 (chain delay
    // already on air).
    sim.run_until(169).unwrap();
    assert_eq!(sim.read32(RADIO_BASE + offs::EVENTS_ADDRESS), 0);
    sim.run_until(170).unwrap();
    assert_eq!(sim.read32(RADIO_BASE + offs::EVENTS_ADDRESS), 1);
    assert_eq!(sim.read32(RADIO_BASE + offs::EVENTS_FRAMESTART), 1);

    // PAYLOAD 16us later (2 header bytes), END 24us after that (CRC-3).
    sim.run_until(186).unwrap();
    assert_eq!(sim.read32(RADIO_BASE + offs::EVENTS_PAYLOAD), 1);
    sim.run_until(210).unwrap();
    assert_eq!(sim.read32(RADIO_BASE + offs::EVENTS_END), 1);
    assert_eq!(sim.read32(RADIO_BASE + offs::EVENTS_PHYEND), 1);
    assert_eq!(sim.read32(RADIO_BASE + offs::STATE), 10); // back to TXIDLE

    // The Phy saw one transmission: header(2) + payload(0) + CRC(3) bytes
    // after the 5 bytes of preamble+address, 80us on air.
    let script = phy.0.borrow();
    let txs: Vec<_> = script
        .calls
        .iter()
        .filter_map(|c| match c {
            PhyCall::Tx(req, packet) => Some((req.clone(), packet.clone())),
            _ => None,
        })
        .collect();
    assert_eq!(txs.len(), 1);
    let (req, packet) = &txs[0];
    assert_eq!(packet.len(), 5);
    assert_eq!(packet[0], 0x02);
    assert_eq!(packet[1], 0x00);
    assert_eq!(req.end_time - req.start_time + 1, 80);
    assert_eq!(req.phy_address, 0x8E89_BED6);
}

/// A task stopping the radio mid-Tx is converted into a Phy abort at the
/// abort reevaluation point, and the reevaluation runs after the task that
/// requested it (it is the last callback of its microsecond).
#[test]
fn tx_abort_midway_through_fixed_ppi_channel() {
    let (mut sim, phy) = ppi_device();
    common::config_radio_ble_adv(&mut sim);
    sim.write32(RADIO_BASE + offs::PACKETPTR, PACKET_RAM).unwrap();
    sim.mem.write(PACKET_RAM, &[0x02, 0x00]);

    // TIMER0 CC[1] fires at 150us and reaches RADIO.TASKS_DISABLE through
    // fixed PPI channel 22.
    sim.write32(TIMER0_BASE + 0x544, 150).unwrap(); // CC[1] (1us/tick @ presc 4)
    sim.write32(TIMER0_BASE + 0x510, 4).unwrap(); // PRESCALER: 1 MHz
    sim.write32(TIMER0_BASE + 0x000, 1).unwrap(); // START
    sim.write32(nwsim::bus::PPI_BASE + 0x504, 1 << 22).unwrap(); // CHENSET

    // The Phy answers the Tx request with an abort reevaluation, then the
    // abort decision with the (shortened) end.
    phy.push_tx(TxResponse::AbortReeval);
    phy.push_tx(TxResponse::End { end_time: 150 });

    sim.write32(RADIO_BASE + offs::TASKS_TXEN, 1).unwrap();
    sim.run_until(130).unwrap();
    sim.write32(RADIO_BASE + offs::TASKS_START, 1).unwrap();

    sim.run_until(400).unwrap();

    // No events from the aborted packet...
    assert_eq!(sim.read32(RADIO_BASE + offs::EVENTS_ADDRESS), 0);
    assert_eq!(sim.read32(RADIO_BASE + offs::EVENTS_END), 0);
    // ...but DISABLED after the Tx rampdown (6us for BLE 1M).
    assert_eq!(sim.read32(RADIO_BASE + offs::EVENTS_DISABLED), 1);
    assert_eq!(sim.read32(RADIO_BASE + offs::STATE), 0); // DISABLED

    let script = phy.0.borrow();
    // Call order proves the reeval ran after the DISABLE task: the abort
    // the Phy got carries abort_time == 150 (decided in the same
    // microsecond the TIMER task fired).
    let aborts: Vec<_> = script
        .calls
        .iter()
        .filter_map(|c| match c {
            PhyCall::TxAbort(a) => Some(*a),
            _ => None,
        })
        .collect();
    assert_eq!(aborts.len(), 1);
    assert_eq!(aborts[0].abort_time, 150);
    assert_ne!(aborts[0].abort_time, NEVER);
}
