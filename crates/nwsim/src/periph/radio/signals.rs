// SPDX-License-Identifier: Apache-2.0 OR MIT

//! RADIO event signalling: setting the EVENTS registers, routing to the
//! fabric, reevaluating the interrupt line and running the shortcuts wired
//! in SHORTS.

use crate::fabric::{EventId, RadioEvent};
use crate::irq::RADIO_IRQ;
use crate::periph::radio::regs::{inten, shorts};
use crate::periph::radio::{self, bitcounter, timings};
use crate::sim::Simulator;
use crate::Result;

/// (event, interrupt-enable bit) pairs of the level evaluation.
const INT_SOURCES: [(RadioEvent, u32); 22] = [
    (RadioEvent::Ready, inten::READY),
    (RadioEvent::Address, inten::ADDRESS),
    (RadioEvent::Payload, inten::PAYLOAD),
    (RadioEvent::End, inten::END),
    (RadioEvent::Disabled, inten::DISABLED),
    (RadioEvent::Devmatch, inten::DEVMATCH),
    (RadioEvent::Devmiss, inten::DEVMISS),
    (RadioEvent::RssiEnd, inten::RSSIEND),
    (RadioEvent::Bcmatch, inten::BCMATCH),
    (RadioEvent::CrcOk, inten::CRCOK),
    (RadioEvent::CrcError, inten::CRCERROR),
    (RadioEvent::Framestart, inten::FRAMESTART),
    (RadioEvent::EdEnd, inten::EDEND),
    (RadioEvent::EdStopped, inten::EDSTOPPED),
    (RadioEvent::CcaIdle, inten::CCAIDLE),
    (RadioEvent::CcaBusy, inten::CCABUSY),
    (RadioEvent::CcaStopped, inten::CCASTOPPED),
    (RadioEvent::Rateboost, inten::RATEBOOST),
    (RadioEvent::TxReady, inten::TXREADY),
    (RadioEvent::RxReady, inten::RXREADY),
    (RadioEvent::Sync, inten::SYNC),
    (RadioEvent::PhyEnd, inten::PHYEND),
];

pub fn eval_interrupt(sim: &mut Simulator) {
    let mut new_line = false;
    for (ev, mask) in INT_SOURCES {
        if sim.radio.regs.event_reg(ev) != 0 && sim.radio.inten & mask != 0 {
            new_line = true;
            break;
        }
    }
    let mut line = sim.radio.int_line;
    sim.irq
        .toggle_level_irq_line_if(&mut line, new_line, RADIO_IRQ);
    sim.radio.int_line = line;
}

pub fn regw_intenset(sim: &mut Simulator, value: u32) {
    if value != 0 {
        sim.radio.inten |= value;
        eval_interrupt(sim);
    }
}

pub fn regw_intenclr(sim: &mut Simulator, value: u32) {
    if value != 0 {
        sim.radio.inten &= !value;
        eval_interrupt(sim);
    }
}

/// Set the event register, reevaluate the line and publish to the fabric.
fn route(sim: &mut Simulator, ev: RadioEvent) -> Result {
    if !sim.radio.powered {
        return Ok(());
    }
    *sim.radio.regs.event_reg_mut(ev) = 1;
    eval_interrupt(sim);
    sim.fabric_event(EventId::Radio(ev))
}

macro_rules! short {
    ($sim:ident, $bit:ident, $task:expr) => {
        if $sim.radio.regs.shorts & shorts::$bit != 0 {
            $task?;
        }
    };
}

pub fn signal_ready(sim: &mut Simulator) -> Result {
    route(sim, RadioEvent::Ready)?;
    short!(sim, READY_START, radio::task_start(sim));
    short!(sim, READY_EDSTART, radio::task_edstart(sim));
    Ok(())
}

pub fn signal_address(sim: &mut Simulator) -> Result {
    route(sim, RadioEvent::Address)?;
    short!(sim, ADDRESS_RSSISTART, radio::task_rssistart(sim));
    short!(sim, ADDRESS_BCSTART, bitcounter::task_bcstart(sim));
    Ok(())
}

pub fn signal_payload(sim: &mut Simulator) -> Result {
    route(sim, RadioEvent::Payload)
}

pub fn signal_end(sim: &mut Simulator) -> Result {
    route(sim, RadioEvent::End)?;
    short!(sim, END_DISABLE, radio::task_disable(sim));
    short!(sim, END_START, radio::task_start(sim));
    Ok(())
}

pub fn signal_disabled(sim: &mut Simulator) -> Result {
    route(sim, RadioEvent::Disabled)?;
    // With the HW TIFS armed the DISABLED->TXEN/RXEN shorts are suppressed
    // and a delayed re-enable fires instead (see the TIFS state machine).
    if timings::is_hw_tifs_enabled(&sim.radio.regs) {
        radio::fake_task_trxen_tifs(sim);
    } else {
        short!(sim, DISABLED_TXEN, radio::task_txen(sim));
        short!(sim, DISABLED_RXEN, radio::task_rxen(sim));
    }
    short!(sim, DISABLED_RSSISTOP, radio::task_rssistop(sim));
    Ok(())
}

pub fn signal_devmatch(sim: &mut Simulator) -> Result {
    route(sim, RadioEvent::Devmatch)
}

pub fn signal_devmiss(sim: &mut Simulator) -> Result {
    route(sim, RadioEvent::Devmiss)
}

pub fn signal_rssiend(sim: &mut Simulator) -> Result {
    route(sim, RadioEvent::RssiEnd)
}

pub fn signal_bcmatch(sim: &mut Simulator) -> Result {
    route(sim, RadioEvent::Bcmatch)
}

pub fn signal_crcok(sim: &mut Simulator) -> Result {
    route(sim, RadioEvent::CrcOk)
}

pub fn signal_crcerror(sim: &mut Simulator) -> Result {
    route(sim, RadioEvent::CrcError)
}

pub fn signal_framestart(sim: &mut Simulator) -> Result {
    route(sim, RadioEvent::Framestart)?;
    short!(sim, FRAMESTART_BCSTART, bitcounter::task_bcstart(sim));
    Ok(())
}

pub fn signal_edend(sim: &mut Simulator) -> Result {
    route(sim, RadioEvent::EdEnd)?;
    short!(sim, EDEND_DISABLE, radio::task_disable(sim));
    Ok(())
}

pub fn signal_edstopped(sim: &mut Simulator) -> Result {
    route(sim, RadioEvent::EdStopped)
}

pub fn signal_ccaidle(sim: &mut Simulator) -> Result {
    route(sim, RadioEvent::CcaIdle)?;
    short!(sim, CCAIDLE_STOP, radio::task_stop(sim));
    short!(sim, CCAIDLE_TXEN, radio::task_txen(sim));
    Ok(())
}

pub fn signal_ccabusy(sim: &mut Simulator) -> Result {
    route(sim, RadioEvent::CcaBusy)?;
    short!(sim, CCABUSY_DISABLE, radio::task_disable(sim));
    Ok(())
}

pub fn signal_ccastopped(sim: &mut Simulator) -> Result {
    route(sim, RadioEvent::CcaStopped)
}

pub fn signal_rateboost(sim: &mut Simulator) -> Result {
    route(sim, RadioEvent::Rateboost)
}

pub fn signal_txready(sim: &mut Simulator) -> Result {
    route(sim, RadioEvent::TxReady)?;
    short!(sim, TXREADY_START, radio::task_start(sim));
    Ok(())
}

pub fn signal_rxready(sim: &mut Simulator) -> Result {
    route(sim, RadioEvent::RxReady)?;
    short!(sim, RXREADY_START, radio::task_start(sim));
    short!(sim, RXREADY_CCASTART, radio::task_ccastart(sim));
    Ok(())
}

pub fn signal_sync(sim: &mut Simulator) -> Result {
    route(sim, RadioEvent::Sync)
}

pub fn signal_phyend(sim: &mut Simulator) -> Result {
    route(sim, RadioEvent::PhyEnd)?;
    short!(sim, PHYEND_DISABLE, radio::task_disable(sim));
    short!(sim, PHYEND_START, radio::task_start(sim));
    Ok(())
}
