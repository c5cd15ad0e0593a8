// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Fabric scenarios: DPPI publish/subscribe fan-out with channel groups,
//! and PPI dispatch dedup (one event, several channels, one task firing).

mod common;

use common::{device, ppi_device};
use nwsim::bus::{CCM_AAR_BASE, CLOCK_BASE, PPI_BASE, RADIO_BASE, RTC0_BASE, TIMER0_BASE};
use nwsim::config::FabricKind;
use nwsim::periph::aar::offs as aar_offs;
use nwsim::periph::radio::regs::offs;
use nwsim::phy::TxResponse;

const PACKET_RAM: u32 = 0x2000_0000;
const ADDR_RAM: u32 = 0x2000_0500;

const SUBSCRIBE_EN: u32 = 1 << 31;

fn run_one_tx(sim: &mut nwsim::Simulator, phy: &common::ScriptedPhy, end: u64) {
    phy.push_tx(TxResponse::End { end_time: end });
    if sim.read32(RADIO_BASE + offs::STATE) == 0 {
        sim.write32(RADIO_BASE + offs::TASKS_TXEN, 1).unwrap();
        let t = sim.now() + 130;
        sim.run_until(t).unwrap();
    }
    sim.write32(RADIO_BASE + offs::TASKS_START, 1).unwrap();
    let t = sim.now() + 100;
    sim.run_until(t).unwrap();
}

/// RADIO.EVENTS_END publishes on DPPI channel 4, AAR.TASKS_START
/// subscribes to it: the resolver starts in the END microsecond. Disabling
/// the channel through a CHG group stops the fan-out.
#[test]
fn dppi_end_to_aar_start_fan_out() {
    let (mut sim, phy) = device(FabricKind::Dppi, false);
    common::config_radio_ble_adv(&mut sim);
    sim.write32(RADIO_BASE + offs::PACKETPTR, PACKET_RAM).unwrap();
    sim.mem.write(PACKET_RAM, &[0x02, 0x00]);

    // A valid (non-resolvable) address so the AAR search is trivial.
    sim.mem.write(ADDR_RAM, &[0u8; 9]);
    sim.write32(CCM_AAR_BASE + aar_offs::ENABLE, 3).unwrap();
    sim.write32(CCM_AAR_BASE + aar_offs::NIRK, 0).unwrap();
    sim.write32(CCM_AAR_BASE + aar_offs::ADDRPTR, ADDR_RAM).unwrap();

    // PUBLISH_END = {ch 4, enabled}; SUBSCRIBE_START = {ch 4, enabled}.
    sim.write32(RADIO_BASE + offs::EVENTS_END + 0x80, SUBSCRIBE_EN | 4)
        .unwrap();
    sim.write32(CCM_AAR_BASE + aar_offs::TASKS_START + 0x80, SUBSCRIBE_EN | 4)
        .unwrap();
    sim.write32(PPI_BASE + 0x504, 1 << 4).unwrap(); // CHENSET

    run_one_tx(&mut sim, &phy, 210);
    assert_eq!(sim.read32(RADIO_BASE + offs::EVENTS_END), 1);
    // The AAR was started in the END microsecond; its END lands +1us
    // (zero keys visited).
    sim.run_until(sim.now() + 20).unwrap();
    assert_eq!(sim.read32(CCM_AAR_BASE + aar_offs::EVENTS_END), 1);

    // Put channel 4 into group 0 and disable the group atomically.
    sim.write32(PPI_BASE + 0x800, 1 << 4).unwrap(); // CHG[0]
    sim.write32(PPI_BASE + 0x004, 1).unwrap(); // TASKS_CHG[0].DIS

    sim.write32(CCM_AAR_BASE + aar_offs::EVENTS_END, 0).unwrap();
    sim.write32(RADIO_BASE + offs::EVENTS_END, 0).unwrap();

    run_one_tx(&mut sim, &phy, 1000);
    assert_eq!(sim.read32(RADIO_BASE + offs::EVENTS_END), 1);
    sim.run_until(sim.now() + 20).unwrap();
    assert_eq!(
        sim.read32(CCM_AAR_BASE + aar_offs::EVENTS_END),
        0,
        "a disabled channel must not dispatch"
    );
}

/// The same task wired to one event through two channels and a fork fires
/// exactly once per event (TIMER0 in counter mode counts invocations).
#[test]
fn ppi_dedups_one_task_from_many_channels() {
    let (mut sim, _phy) = ppi_device();

    // TIMER0 as an invocation counter.
    sim.write32(TIMER0_BASE + 0x504, 1).unwrap(); // MODE = counter
    sim.write32(TIMER0_BASE + 0x508, 3).unwrap(); // BITMODE = 32 bit
    sim.write32(TIMER0_BASE + 0x000, 1).unwrap(); // START

    // RTC0 CC0 event, routed to the fabric via EVTEN.
    sim.write32(CLOCK_BASE + 0x008, 1).unwrap(); // LFCLKSTART
    sim.run_until(0).unwrap();
    sim.write32(RTC0_BASE + 0x508, 0).unwrap(); // PRESCALER
    sim.write32(RTC0_BASE + 0x540, 32).unwrap(); // CC[0]
    sim.write32(RTC0_BASE + 0x344, 1 << 16).unwrap(); // EVTENSET COMPARE0
    sim.write32(RTC0_BASE + 0x000, 1).unwrap(); // START

    let eep = RTC0_BASE + 0x140; // EVENTS_COMPARE[0]
    let tep = TIMER0_BASE + 0x008; // TASKS_COUNT
    sim.write32(PPI_BASE + 0x510, eep).unwrap(); // CH[0].EEP
    sim.write32(PPI_BASE + 0x514, tep).unwrap(); // CH[0].TEP
    sim.write32(PPI_BASE + 0x518, eep).unwrap(); // CH[1].EEP
    sim.write32(PPI_BASE + 0x51C, tep).unwrap(); // CH[1].TEP
    sim.write32(PPI_BASE + 0x910, tep).unwrap(); // FORK[0].TEP
    sim.write32(PPI_BASE + 0x504, 0b11).unwrap(); // CHENSET ch0+ch1

    sim.run_until(977).unwrap();
    assert_eq!(sim.read32(RTC0_BASE + 0x140), 1, "compare event fired");

    // Capture the count: the task must have run exactly once.
    sim.write32(TIMER0_BASE + 0x040, 1).unwrap(); // TASKS_CAPTURE[0]
    assert_eq!(sim.read32(TIMER0_BASE + 0x540), 1);
}

/// Reprogramming a channel detaches it from its previous event.
#[test]
fn ppi_eep_rewrite_moves_the_channel() {
    let (mut sim, _phy) = ppi_device();

    sim.write32(TIMER0_BASE + 0x504, 1).unwrap(); // counter mode
    sim.write32(TIMER0_BASE + 0x508, 3).unwrap();
    sim.write32(TIMER0_BASE + 0x000, 1).unwrap();

    sim.write32(CLOCK_BASE + 0x008, 1).unwrap();
    sim.run_until(0).unwrap();
    sim.write32(RTC0_BASE + 0x540, 32).unwrap();
    sim.write32(RTC0_BASE + 0x344, 1 << 16).unwrap();
    sim.write32(RTC0_BASE + 0x000, 1).unwrap();

    sim.write32(PPI_BASE + 0x510, RTC0_BASE + 0x140).unwrap();
    sim.write32(PPI_BASE + 0x514, TIMER0_BASE + 0x008).unwrap();
    sim.write32(PPI_BASE + 0x504, 1).unwrap();

    // Rewire the channel to a different (never firing) event.
    sim.write32(PPI_BASE + 0x510, RTC0_BASE + 0x144).unwrap(); // COMPARE[1]

    sim.run_until(2000).unwrap();
    assert_eq!(sim.read32(RTC0_BASE + 0x140), 1);
    sim.write32(TIMER0_BASE + 0x040, 1).unwrap();
    assert_eq!(
        sim.read32(TIMER0_BASE + 0x540),
        0,
        "the rewired channel must not dispatch the old event"
    );
}
