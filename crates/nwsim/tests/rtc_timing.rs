// SPDX-License-Identifier: Apache-2.0 OR MIT

//! RTC timing scenarios: CC match prediction, the COMPARE->CLEAR shortcut,
//! counter/wall-time reconciliation, overflow periodicity, and the
//! level-sensitive interrupt line.

mod common;

use common::ppi_device;
use nwsim::bus::{CLOCK_BASE, RTC0_BASE};
use nwsim::irq::RTC0_IRQ;
use nwsim::periph::clock::offs as clk;
use nwsim::periph::rtc::offs;

fn start_lf_clock(sim: &mut nwsim::Simulator) {
    sim.write32(CLOCK_BASE + clk::TASKS_LFCLKSTART, 1).unwrap();
    sim.run_until(0).unwrap();
    assert_eq!(sim.read32(CLOCK_BASE + clk::EVENTS_LFCLKSTARTED), 1);
}

/// One LF tick is 1e6/32768 us; 32 ticks land at 976.5625us, rounded up
/// to the next whole microsecond.
#[test]
fn cc_match_at_32_ticks() {
    let (mut sim, _phy) = ppi_device();
    start_lf_clock(&mut sim);

    sim.write32(RTC0_BASE + offs::PRESCALER, 0).unwrap();
    sim.write32(RTC0_BASE + offs::CC0, 32).unwrap();
    sim.write32(RTC0_BASE + offs::INTENSET, 1 << 16).unwrap(); // COMPARE0
    sim.write32(RTC0_BASE + offs::TASKS_START, 1).unwrap();

    sim.run_until(976).unwrap();
    assert_eq!(sim.read32(RTC0_BASE + offs::EVENTS_COMPARE0), 0);
    sim.run_until(977).unwrap();
    assert_eq!(sim.read32(RTC0_BASE + offs::EVENTS_COMPARE0), 1);

    // Level-sensitive line: high while EVENTS && INTEN, low once cleared.
    assert!(sim.irq.line(RTC0_IRQ));
    sim.write32(RTC0_BASE + offs::EVENTS_COMPARE0, 0).unwrap();
    assert!(!sim.irq.line(RTC0_IRQ));
    sim.write32(RTC0_BASE + offs::EVENTS_COMPARE0, 1).unwrap();
    assert!(sim.irq.line(RTC0_IRQ));
    sim.write32(RTC0_BASE + offs::INTENCLR, 1 << 16).unwrap();
    assert!(!sim.irq.line(RTC0_IRQ));
}

/// With the COMPARE0->CLEAR shortcut the counter restarts at the match and
/// the next event comes one full CC period later.
#[test]
fn compare_clear_short_repeats_the_period() {
    let (mut sim, _phy) = ppi_device();
    start_lf_clock(&mut sim);

    sim.write32(RTC0_BASE + offs::PRESCALER, 0).unwrap();
    sim.write32(RTC0_BASE + offs::CC0, 32).unwrap();
    sim.write32(RTC0_BASE + offs::SHORTS, 1).unwrap(); // COMPARE0_CLEAR
    sim.write32(RTC0_BASE + offs::EVTENSET, 1 << 16).unwrap();
    sim.write32(RTC0_BASE + offs::TASKS_START, 1).unwrap();

    sim.run_until(977).unwrap();
    assert_eq!(sim.read32(RTC0_BASE + offs::EVENTS_COMPARE0), 1);
    sim.write32(RTC0_BASE + offs::EVENTS_COMPARE0, 0).unwrap();

    sim.run_until(1953).unwrap();
    assert_eq!(sim.read32(RTC0_BASE + offs::EVENTS_COMPARE0), 0);
    sim.run_until(1954).unwrap();
    assert_eq!(sim.read32(RTC0_BASE + offs::EVENTS_COMPARE0), 1);
}

/// COUNTER reads reconcile with virtual time:
/// floor((now - start) / tick).
#[test]
fn counter_register_reconciliation() {
    let (mut sim, _phy) = ppi_device();
    start_lf_clock(&mut sim);

    sim.write32(RTC0_BASE + offs::PRESCALER, 0).unwrap();
    sim.write32(RTC0_BASE + offs::TASKS_START, 1).unwrap();

    sim.run_until(500).unwrap();
    // 500us elapsed = 16.38 ticks.
    assert_eq!(sim.read32(RTC0_BASE + offs::COUNTER), 16);

    sim.run_until(1000).unwrap();
    assert_eq!(sim.read32(RTC0_BASE + offs::COUNTER), 32);

    // Stopping freezes the value.
    sim.write32(RTC0_BASE + offs::TASKS_STOP, 1).unwrap();
    sim.run_until(5000).unwrap();
    assert_eq!(sim.read32(RTC0_BASE + offs::COUNTER), 32);

    // A prescaler keeps the same wall clock but divides the count.
    sim.write32(RTC0_BASE + offs::TASKS_CLEAR, 1).unwrap();
    sim.write32(RTC0_BASE + offs::PRESCALER, 3).unwrap();
    sim.write32(RTC0_BASE + offs::TASKS_STOP, 1).unwrap();
    // PRESCALER latches on CLEAR/START.
    sim.write32(RTC0_BASE + offs::TASKS_CLEAR, 1).unwrap();
    sim.write32(RTC0_BASE + offs::TASKS_START, 1).unwrap();
    let t0 = sim.now();
    sim.run_until(t0 + 1000).unwrap();
    // 1000us = 32.7 LF ticks = 8.19 counter increments at PRESCALER=3.
    assert_eq!(sim.read32(RTC0_BASE + offs::COUNTER), 8);
}

/// TRIGOVRFLW primes the counter to 0xFFFFF0; the overflow fires 16 ticks
/// later and then repeats every 2^24 ticks exactly.
#[test]
fn overflow_period_is_monotone_and_exact() {
    let (mut sim, _phy) = ppi_device();
    start_lf_clock(&mut sim);

    sim.write32(RTC0_BASE + offs::INTENSET, 1 << 1).unwrap(); // OVRFLW
    sim.write32(RTC0_BASE + offs::TASKS_TRIGOVRFLW, 1).unwrap();
    sim.write32(RTC0_BASE + offs::TASKS_START, 1).unwrap();

    // 16 ticks = 488.28us, rounded up.
    sim.run_until(488).unwrap();
    assert_eq!(sim.read32(RTC0_BASE + offs::EVENTS_OVRFLW), 0);
    sim.run_until(489).unwrap();
    assert_eq!(sim.read32(RTC0_BASE + offs::EVENTS_OVRFLW), 1);
    sim.write32(RTC0_BASE + offs::EVENTS_OVRFLW, 0).unwrap();

    // Next overflow exactly 2^24 * LF_PERIOD = 512000000us later
    // (sub-us bookkeeping keeps the wrap drift-free).
    let second = 489 + 512_000_000;
    sim.run_until(second - 1).unwrap();
    assert_eq!(sim.read32(RTC0_BASE + offs::EVENTS_OVRFLW), 0);
    sim.run_until(second).unwrap();
    assert_eq!(sim.read32(RTC0_BASE + offs::EVENTS_OVRFLW), 1);
}

/// A capture task latches the reconciled counter into CC.
#[test]
fn capture_task_latches_counter() {
    let (mut sim, _phy) = ppi_device();
    start_lf_clock(&mut sim);
    sim.write32(RTC0_BASE + offs::PRESCALER, 0).unwrap();
    sim.write32(RTC0_BASE + offs::TASKS_START, 1).unwrap();
    sim.run_until(1000).unwrap();
    sim.write32(RTC0_BASE + offs::TASKS_CAPTURE0, 1).unwrap();
    assert_eq!(sim.read32(RTC0_BASE + offs::CC0), 32);
}
