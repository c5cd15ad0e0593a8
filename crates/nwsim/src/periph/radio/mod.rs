// SPDX-License-Identifier: Apache-2.0 OR MIT

//! RADIO - 2.4 GHz radio.
//!
//! Three cooperating state machines drive the model:
//!
//! * The main machine (ramp-up, Tx/Rx/CCA pipelines, ramp-down), advanced
//!   by the Slot::Radio timer.
//! * The TIFS machine: when SHORTS enables END->DISABLE together with
//!   DISABLED->TXEN/RXEN and the normal ramp-up is selected, the direct
//!   re-enable shortcut is suppressed and a delayed fake TXEN/RXEN fires
//!   so the next packet starts exactly TIFS after the previous END.
//! * The abort machine: when a Tx/Rx/CCA transaction starts, the Phy is
//!   told when to check back whether we want to abort. Those rechecks are
//!   answered from the Slot::RadioAbortReeval timer, which runs after every
//!   other event of the same microsecond - anything that could have fired
//!   a task stopping the transaction already did. A stopping task merely
//!   raises `aborting`; the next recheck converts it into "abort now".
//!
//! Known approximations (kept from the reference silicon measurements this
//! model was calibrated against):
//! * EVENTS_SYNC fires at the sync-word end, only on a full address match.
//! * EVENTS_PHYEND fires in the same microsecond as EVENTS_END.
//! * On a header error the transmitted length field still drives the
//!   timeline; the error surfaces as CRCERROR at the CRC end.
//! * RSSI is sampled at the address end, where RSSIEND is raised.
//! * Register double-buffering is not modelled: changing configuration
//!   registers mid-packet corrupts the ongoing packet.
//! * Only logical address 0 and the default frequency map are supported.

pub mod bitcounter;
pub mod pkt;
pub mod regs;
pub mod signals;
pub mod timings;

pub use regs::offs;

use crate::fabric::RadioTask;
use crate::periph::ccm;
use crate::periph::radio::pkt::MAX_PACKET_SIZE;
use crate::periph::radio::regs::{ccactrl, mode, pcnf0, shorts, RadioRegs};
use crate::phy::{
    power_to_dbm, Abort, CcaRequest, CcaResponse, Power, PhyTime, RxRequest, RxResponse,
    RxStatusCode, TxRequest, TxResponse,
};
use crate::sched::Slot;
use crate::sim::Simulator;
use crate::time::{Instant, NEVER};
use crate::{Result, SimError};

/// Main radio states; the numeric values are what the STATE register shows.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum RadioState {
    Disabled = 0,
    RxRu = 1,
    RxIdle = 2,
    Rx = 3,
    RxDisable = 4,
    TxRu = 9,
    TxIdle = 10,
    TxStarting = 11,
    Tx = 12,
    TxDisable = 13,
    /// CCA and ED procedures. Not a real hardware state: silicon stays in
    /// an Rx state and runs the procedure as a separate machine.
    CcaEd = 14,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SubState {
    Invalid,
    TxWaitAddressEnd,
    TxWaitFec1End,
    TxWaitPayloadEnd,
    TxWaitCrcEnd,
    RxWaitAddressEnd,
    RxWaitFec1End,
    RxWaitPayloadEnd,
    RxWaitCrcEnd,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TifsState {
    Disabled,
    /// Waiting for the rampdown to finish; `timer_tifs` holds the re-enable.
    WaitingForDisable,
    /// The main timer is armed with the TXEN/RXEN firing point.
    TriggeringTrxEn,
}

/// Set to a pending variant exactly while the Phy is blocked waiting for
/// this device's abort decision.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum AbortSt {
    NoPending,
    Tx,
    Rx,
    Cca,
}

/// Pre-computed wall-clock checkpoints and Phy requests of an ongoing Tx.
pub struct TxStatus {
    pub address_end_time: Instant,
    pub fec2_start_time: Instant,
    pub payload_end_time: Instant,
    pub crc_end_time: Instant,
    pub req: TxRequest,
    pub req_fec1: TxRequest,
    pub codedphy: bool,
}

impl Default for TxStatus {
    fn default() -> Self {
        Self {
            address_end_time: NEVER,
            fec2_start_time: NEVER,
            payload_end_time: NEVER,
            crc_end_time: NEVER,
            req: TxRequest::default(),
            req_fec1: TxRequest::default(),
            codedphy: false,
        }
    }
}

/// Checkpoints, Phy requests and progress of an ongoing Rx.
pub struct RxStatus {
    pub address_end_time: Instant,
    pub fec2_start_time: Instant,
    pub payload_end_time: Instant,
    pub crc_end_time: Instant,
    pub crc_duration: Instant,
    pub req: RxRequest,
    pub req_fec1: RxRequest,
    pub status: RxStatusCode,
    pub rx_time_stamp: PhyTime,
    pub rssi: Power,
    pub packet_size: usize,
    pub crc_ok: bool,
    pub packet_rejected: bool,
    pub s1_offset: usize,
    pub codedphy: bool,
    pub ci: u8,
    pub in_fec1: bool,
    pub ci_error: bool,
}

impl Default for RxStatus {
    fn default() -> Self {
        Self {
            address_end_time: NEVER,
            fec2_start_time: NEVER,
            payload_end_time: NEVER,
            crc_end_time: NEVER,
            crc_duration: 0,
            req: RxRequest::default(),
            req_fec1: RxRequest::default(),
            status: RxStatusCode::NoSync,
            rx_time_stamp: 0,
            rssi: 0,
            packet_size: 0,
            crc_ok: false,
            packet_rejected: false,
            s1_offset: 0,
            codedphy: false,
            ci: 0,
            in_fec1: false,
            ci_error: false,
        }
    }
}

/// State of an ongoing CCA or ED procedure.
pub struct CcaStatus {
    pub cca_end_time: Instant,
    pub req: CcaRequest,
    pub rssi_ave: Power,
    pub rssi_max: Power,
    pub mod_found: bool,
    pub rssi_overthreshold: bool,
    pub is_busy: bool,
    pub cca_not_ed: bool,
}

impl Default for CcaStatus {
    fn default() -> Self {
        Self {
            cca_end_time: NEVER,
            req: CcaRequest::default(),
            rssi_ave: 0,
            rssi_max: 0,
            mod_found: false,
            rssi_overthreshold: false,
            is_busy: false,
            cca_not_ed: false,
        }
    }
}

pub struct Radio {
    pub regs: RadioRegs,
    pub inten: u32,
    pub(crate) int_line: bool,
    pub(crate) state: RadioState,
    pub(crate) sub_state: SubState,
    pub(crate) tifs_state: TifsState,
    pub(crate) tifs_to_tx: bool,
    pub(crate) timer_tifs: Instant,
    /// The SW races the HW to clear SHORTS; this remembers that the
    /// ongoing TXEN/RXEN came from the TIFS machine.
    pub(crate) from_hw_tifs: bool,
    pub(crate) abort_st: AbortSt,
    pub(crate) aborting: bool,
    pub(crate) next_recheck_time: Instant,
    pub(crate) tx: TxStatus,
    pub(crate) rx: RxStatus,
    pub(crate) cca: CcaStatus,
    pub(crate) bits_per_us: f64,
    pub(crate) tx_buf: [u8; MAX_PACKET_SIZE],
    pub(crate) rx_buf: Vec<u8>,
    pub(crate) powered: bool,
    pub(crate) rssi_on: bool,
    pub(crate) bc_running: bool,
    pub(crate) bc_started_at: Instant,
}

impl Default for Radio {
    fn default() -> Self {
        Self {
            regs: RadioRegs::reset_values(),
            inten: 0,
            int_line: false,
            state: RadioState::Disabled,
            sub_state: SubState::Invalid,
            tifs_state: TifsState::Disabled,
            tifs_to_tx: false,
            timer_tifs: NEVER,
            from_hw_tifs: false,
            abort_st: AbortSt::NoPending,
            aborting: false,
            next_recheck_time: NEVER,
            tx: TxStatus::default(),
            rx: RxStatus::default(),
            cca: CcaStatus::default(),
            bits_per_us: 1.0,
            tx_buf: [0; MAX_PACKET_SIZE],
            rx_buf: Vec::new(),
            powered: true,
            rssi_on: false,
            bc_running: false,
            bc_started_at: NEVER,
        }
    }
}

impl Radio {
    pub fn state(&self) -> RadioState {
        self.state
    }
}

fn set_timer(sim: &mut Simulator, t: Instant) {
    sim.sched.set(Slot::Radio, t);
}

fn set_abort_reeval_timer(sim: &mut Simulator, t: Instant) {
    sim.sched.set(Slot::RadioAbortReeval, t);
}

fn set_state(sim: &mut Simulator, state: RadioState) {
    sim.radio.state = state;
    sim.radio.regs.state = state as u32;
}

/// Reset the whole block to its datasheet defaults.
pub fn radio_reset(sim: &mut Simulator) {
    sim.radio.regs = RadioRegs::reset_values();
    sim.radio.state = RadioState::Disabled;
    sim.radio.sub_state = SubState::Invalid;
    set_timer(sim, NEVER);
    sim.radio.rssi_on = false;
    sim.radio.tifs_state = TifsState::Disabled;
    sim.radio.tifs_to_tx = false;
    sim.radio.timer_tifs = NEVER;
    sim.radio.inten = 0;
    sim.radio.bc_running = false;
    sim.sched.set(Slot::RadioBitcounter, NEVER);
}

pub fn regw_power(sim: &mut Simulator, value: u32) -> Result {
    sim.radio.regs.power = value & 1;
    if value & 1 == 0 {
        sim.radio.powered = false;
    } else if !sim.radio.powered {
        sim.radio.powered = true;
        abort_if_needed(sim)?;
        radio_reset(sim);
    }
    Ok(())
}

/// Tell the Phy to abort if it is waiting on us, and reject a packet whose
/// acceptance decision is still pending.
fn abort_if_needed(sim: &mut Simulator) -> Result {
    if sim.radio.abort_st != AbortSt::NoPending {
        // The Phy is blocked on an abort reevaluation: flag the abort, the
        // reeval timer converts it into "abort now".
        sim.radio.aborting = true;
    }
    // In Rx we may instead be holding the address-accept answer.
    if sim.radio.sub_state == SubState::RxWaitAddressEnd {
        sim.phy.rx_cont_after_addr(false, None)?;
        sim.radio.sub_state = SubState::Invalid;
    }
    Ok(())
}

pub fn task_txen(sim: &mut Simulator) -> Result {
    if !matches!(
        sim.radio.state,
        RadioState::Disabled | RadioState::TxIdle | RadioState::RxIdle
    ) {
        log::warn!(
            "RADIO: TXEN received while not DISABLED or TX/RXIDLE (state {:?}), ignored; \
             expect problems",
            sim.radio.state
        );
        return Ok(());
    }
    set_state(sim, RadioState::TxRu);
    let ramp = timings::rampup_time(&sim.radio.regs, true, sim.radio.from_hw_tifs);
    let t = sim.sched.now() + ramp;
    set_timer(sim, t);
    Ok(())
}

pub fn task_rxen(sim: &mut Simulator) -> Result {
    if !matches!(
        sim.radio.state,
        RadioState::Disabled | RadioState::TxIdle | RadioState::RxIdle
    ) {
        log::warn!(
            "RADIO: RXEN received while not DISABLED or TX/RXIDLE (state {:?}), ignored; \
             expect problems",
            sim.radio.state
        );
        return Ok(());
    }
    sim.radio.tifs_state = TifsState::Disabled;
    set_state(sim, RadioState::RxRu);
    let ramp = timings::rampup_time(&sim.radio.regs, false, sim.radio.from_hw_tifs);
    let t = sim.sched.now() + ramp;
    set_timer(sim, t);
    Ok(())
}

pub fn task_start(sim: &mut Simulator) -> Result {
    match sim.radio.state {
        RadioState::TxIdle => {
            let t = sim.sched.now() + timings::tx_chain_delay();
            sim.radio.state = RadioState::TxStarting;
            sim.radio.regs.state = RadioState::Tx as u32;
            set_timer(sim, t);
            Ok(())
        }
        RadioState::RxIdle => start_rx(sim),
        _ => {
            log::warn!(
                "RADIO: TASK_START received while not TX/RXIDLE (state {:?}), ignored; \
                 expect problems",
                sim.radio.state
            );
            Ok(())
        }
    }
}

pub fn task_stop(sim: &mut Simulator) -> Result {
    bitcounter::stop_bit_counter(sim);

    match sim.radio.state {
        RadioState::Tx | RadioState::TxStarting => {
            if sim.radio.state == RadioState::Tx {
                abort_if_needed(sim)?;
            }
            set_state(sim, RadioState::TxIdle);
            set_timer(sim, NEVER);
        }
        RadioState::Rx => {
            abort_if_needed(sim)?;
            set_state(sim, RadioState::RxIdle);
            set_timer(sim, NEVER);
        }
        RadioState::CcaEd => {
            // What silicon does with a STOP mid-CCA depends on the CCA
            // mode; the model stops the procedure like an active Rx and
            // raises no CCASTOPPED/EDSTOPPED.
            log::warn!(
                "RADIO: TASK_STOP during a CCA/ED procedure; the model stops it, \
                 real hardware may misbehave"
            );
            abort_if_needed(sim)?;
            set_state(sim, RadioState::RxIdle);
            set_timer(sim, NEVER);
        }
        other => {
            log::warn!("RADIO: TASK_STOP received while not in TX or RX (state {other:?}), ignored");
        }
    }
    Ok(())
}

pub fn task_disable(sim: &mut Simulator) -> Result {
    bitcounter::stop_bit_counter(sim);

    match sim.radio.state {
        RadioState::Tx | RadioState::TxStarting => {
            if sim.radio.state == RadioState::Tx {
                abort_if_needed(sim)?;
            }
            set_state(sim, RadioState::TxIdle); // momentary
        }
        RadioState::Rx => {
            abort_if_needed(sim)?;
            set_state(sim, RadioState::RxIdle); // momentary
        }
        RadioState::CcaEd => {
            // Same undocumented corner as STOP: treated as an active Rx,
            // no CCASTOPPED/EDSTOPPED.
            abort_if_needed(sim)?;
            set_state(sim, RadioState::RxIdle); // momentary
        }
        _ => {}
    }

    if sim.radio.tifs_state != TifsState::Disabled {
        sim.radio.tifs_state = TifsState::Disabled;
        set_timer(sim, NEVER);
        sim.radio.timer_tifs = NEVER;
    }

    match sim.radio.state {
        RadioState::TxRu | RadioState::TxIdle => {
            set_state(sim, RadioState::TxDisable);
            sim.radio.tifs_state = TifsState::Disabled;
            let t = sim.sched.now() + timings::tx_rampdown_time(&sim.radio.regs);
            set_timer(sim, t);
        }
        RadioState::RxRu | RadioState::RxIdle => {
            set_state(sim, RadioState::RxDisable);
            sim.radio.tifs_state = TifsState::Disabled;
            let t = sim.sched.now() + timings::rx_rampdown_time();
            set_timer(sim, t);
        }
        RadioState::Disabled => {
            // Silicon signals a DISABLED event even when already disabled.
            bitcounter::stop_bit_counter(sim);
            signals::signal_disabled(sim)?;
        }
        _ => {}
    }
    Ok(())
}

pub fn task_rssistart(sim: &mut Simulator) -> Result {
    sim.radio.rssi_on = true;
    Ok(())
}

pub fn task_rssistop(sim: &mut Simulator) -> Result {
    sim.radio.rssi_on = false;
    Ok(())
}

pub fn task_ccastart(sim: &mut Simulator) -> Result {
    if sim.radio.state != RadioState::RxIdle {
        log::warn!(
            "RADIO: CCASTART received while not RXIDLE (state {:?}), ignored; expect problems",
            sim.radio.state
        );
        return Ok(());
    }
    start_cca_ed(sim, true)
}

pub fn task_ccastop(sim: &mut Simulator) -> Result {
    if sim.radio.state == RadioState::CcaEd && sim.radio.cca.cca_not_ed {
        abort_if_needed(sim)?;
        set_state(sim, RadioState::RxIdle);
        set_timer(sim, NEVER);
        signals::signal_ccastopped(sim)?;
    } else {
        log::debug!("RADIO: TASK_CCASTOP received with no CCA procedure ongoing, ignored");
    }
    Ok(())
}

pub fn task_edstart(sim: &mut Simulator) -> Result {
    if sim.radio.state != RadioState::RxIdle {
        log::warn!(
            "RADIO: EDSTART received while not RXIDLE (state {:?}), ignored; expect problems",
            sim.radio.state
        );
        return Ok(());
    }
    start_cca_ed(sim, false)
}

pub fn task_edstop(sim: &mut Simulator) -> Result {
    if sim.radio.state == RadioState::CcaEd && !sim.radio.cca.cca_not_ed {
        abort_if_needed(sim)?;
        set_state(sim, RadioState::RxIdle);
        set_timer(sim, NEVER);
        signals::signal_edstopped(sim)?;
    } else {
        log::debug!("RADIO: TASK_EDSTOP received with no ED procedure ongoing, ignored");
    }
    Ok(())
}

pub fn run_task(sim: &mut Simulator, task: RadioTask) -> Result {
    match task {
        RadioTask::TxEn => task_txen(sim),
        RadioTask::RxEn => task_rxen(sim),
        RadioTask::Start => task_start(sim),
        RadioTask::Stop => task_stop(sim),
        RadioTask::Disable => task_disable(sim),
        RadioTask::RssiStart => task_rssistart(sim),
        RadioTask::RssiStop => task_rssistop(sim),
        RadioTask::BcStart => bitcounter::task_bcstart(sim),
        RadioTask::BcStop => bitcounter::task_bcstop(sim),
        RadioTask::EdStart => task_edstart(sim),
        RadioTask::EdStop => task_edstop(sim),
        RadioTask::CcaStart => task_ccastart(sim),
        RadioTask::CcaStop => task_ccastop(sim),
    }
}

/// Fake task arming the TIFS re-enable timer; only meaningful while the
/// TIFS machine is waiting for the rampdown.
pub fn fake_task_trxen_tifs(sim: &mut Simulator) {
    if sim.radio.tifs_state == TifsState::WaitingForDisable {
        sim.radio.tifs_state = TifsState::TriggeringTrxEn;
        let t = sim.radio.timer_tifs;
        set_timer(sim, t);
        if t < sim.sched.now() {
            log::warn!(
                "RADIO: the rampdown into the next Tx/Rx takes longer than the programmed TIFS"
            );
        }
    }
}

/// Arm the TIFS machine at the end of a packet, when the automatic
/// turnaround is enabled. `tx_not_rx`: was the ending activity a Tx?
fn maybe_prepare_tifs(sim: &mut Simulator, tx_not_rx: bool) {
    if !timings::is_hw_tifs_enabled(&sim.radio.regs) {
        sim.radio.tifs_state = TifsState::Disabled;
        return;
    }
    sim.radio.tifs_to_tx = sim.radio.regs.shorts & shorts::DISABLED_TXEN != 0;

    let tifs = i64::from(sim.radio.regs.tifs);
    let delta = if tx_not_rx {
        // Open slightly early for jitter margin.
        tifs + timings::tx_chain_delay() as i64
            - timings::rampup_time(&sim.radio.regs, false, true) as i64
            - 3
    } else {
        tifs - timings::rx_chain_delay(&sim.radio.regs) as i64
            - timings::tx_chain_delay() as i64
            - timings::rampup_time(&sim.radio.regs, true, true) as i64
            + 1
    };
    let now = sim.sched.now();
    sim.radio.timer_tifs = if delta >= 0 {
        now + delta as u64
    } else {
        now.saturating_sub((-delta) as u64)
    };
    sim.radio.tifs_state = TifsState::WaitingForDisable;
}

fn maybe_signal_rateboost(sim: &mut Simulator) -> Result {
    if sim.radio.rx.ci == 1 {
        signals::signal_rateboost(sim)?;
    }
    Ok(())
}

/// Slot::Radio callback: continue whatever activity is ongoing.
pub fn timer_triggered(sim: &mut Simulator) -> Result {
    match sim.radio.state {
        RadioState::TxRu => {
            set_state(sim, RadioState::TxIdle);
            set_timer(sim, NEVER);
            signals::signal_ready(sim)?;
            signals::signal_txready(sim)?;
        }
        RadioState::RxRu => {
            set_state(sim, RadioState::RxIdle);
            set_timer(sim, NEVER);
            signals::signal_ready(sim)?;
            signals::signal_rxready(sim)?;
        }
        RadioState::TxStarting => {
            set_timer(sim, NEVER);
            start_tx(sim)?;
        }
        RadioState::Tx => match sim.radio.sub_state {
            SubState::TxWaitAddressEnd => {
                if sim.radio.tx.codedphy {
                    sim.radio.sub_state = SubState::TxWaitFec1End;
                    let t = sim.radio.tx.fec2_start_time;
                    set_timer(sim, t);
                } else {
                    sim.radio.sub_state = SubState::TxWaitPayloadEnd;
                    let t = sim.radio.tx.payload_end_time;
                    set_timer(sim, t);
                }
                signals::signal_address(sim)?;
                signals::signal_framestart(sim)?;
            }
            SubState::TxWaitFec1End => {
                start_tx_fec2(sim)?;
                sim.radio.sub_state = SubState::TxWaitPayloadEnd;
                let t = sim.radio.tx.payload_end_time;
                set_timer(sim, t);
            }
            SubState::TxWaitPayloadEnd => {
                sim.radio.sub_state = SubState::TxWaitCrcEnd;
                let t = sim.radio.tx.crc_end_time;
                set_timer(sim, t);
                signals::signal_payload(sim)?;
            }
            SubState::TxWaitCrcEnd => {
                sim.radio.sub_state = SubState::Invalid;
                set_state(sim, RadioState::TxIdle);
                set_timer(sim, NEVER);
                bitcounter::stop_bit_counter(sim);
                signals::signal_end(sim)?;
                signals::signal_phyend(sim)?;
                maybe_prepare_tifs(sim, true);
            }
            _ => {
                return Err(SimError::Internal(
                    "RADIO timer fired in TX with an invalid sub-state".into(),
                ))
            }
        },
        RadioState::Rx => match sim.radio.sub_state {
            SubState::RxWaitAddressEnd => {
                signals::signal_sync(sim)?;
                signals::signal_address(sim)?;
                signals::signal_framestart(sim)?;
                set_timer(sim, NEVER); // provisionally, for the continuation
                rx_addr_received(sim)?;
                if sim.radio.rx.codedphy {
                    sim.radio.sub_state = SubState::RxWaitFec1End;
                    // The timer is set once the Phy answers for the FEC1 end.
                } else {
                    sim.radio.sub_state = SubState::RxWaitPayloadEnd;
                    let t = sim.radio.rx.payload_end_time;
                    set_timer(sim, t);
                }
            }
            SubState::RxWaitFec1End => {
                maybe_signal_rateboost(sim)?;
                // The next transition is programmed on the FEC2 Phy answer.
                set_timer(sim, NEVER);
                start_rx_fec2(sim)?;
            }
            SubState::RxWaitPayloadEnd => {
                sim.radio.sub_state = SubState::RxWaitCrcEnd;
                let t = sim.radio.rx.crc_end_time;
                set_timer(sim, t);
                signals::signal_payload(sim)?;
            }
            SubState::RxWaitCrcEnd => {
                let crc_ok = sim.radio.rx.crc_ok;
                ccm::radio_received_packet(sim, !crc_ok)?;
                sim.radio.sub_state = SubState::Invalid;
                set_state(sim, RadioState::RxIdle);
                set_timer(sim, NEVER);
                if crc_ok {
                    signals::signal_crcok(sim)?;
                } else {
                    signals::signal_crcerror(sim)?;
                }
                bitcounter::stop_bit_counter(sim);
                signals::signal_phyend(sim)?;
                signals::signal_end(sim)?;
                maybe_prepare_tifs(sim, false);
            }
            _ => {
                return Err(SimError::Internal(
                    "RADIO timer fired in RX with an invalid sub-state".into(),
                ))
            }
        },
        RadioState::CcaEd => {
            set_state(sim, RadioState::RxIdle);
            set_timer(sim, NEVER);
            if sim.radio.cca.cca_not_ed {
                if sim.radio.cca.is_busy {
                    signals::signal_ccabusy(sim)?;
                } else {
                    signals::signal_ccaidle(sim)?;
                }
            } else {
                signals::signal_edend(sim)?;
            }
        }
        RadioState::TxDisable | RadioState::RxDisable => {
            set_state(sim, RadioState::Disabled);
            set_timer(sim, NEVER);
            bitcounter::stop_bit_counter(sim);
            signals::signal_disabled(sim)?;
        }
        RadioState::Disabled if sim.radio.tifs_state == TifsState::TriggeringTrxEn => {
            if sim.sched.now() != sim.radio.timer_tifs {
                log::warn!("RADIO: TIFS timer misalignment");
            }
            sim.radio.tifs_state = TifsState::Disabled;
            set_timer(sim, NEVER);
            sim.radio.from_hw_tifs = true;
            let r = if sim.radio.tifs_to_tx {
                task_txen(sim)
            } else {
                task_rxen(sim)
            };
            sim.radio.from_hw_tifs = false;
            r?;
        }
        other => {
            return Err(SimError::Internal(format!(
                "RADIO timer fired in an unexpected state ({other:?})"
            )))
        }
    }
    Ok(())
}

/// Slot::RadioAbortReeval callback: everything else at this microsecond has
/// run; answer the waiting Phy with our abort decision.
pub fn abort_reeval_triggered(sim: &mut Simulator) -> Result {
    set_abort_reeval_timer(sim, NEVER);
    match sim.radio.abort_st {
        AbortSt::Tx => {
            sim.radio.abort_st = AbortSt::NoPending;
            tx_abort_eval_respond(sim)
        }
        AbortSt::Rx => {
            sim.radio.abort_st = AbortSt::NoPending;
            rx_abort_eval_respond(sim)
        }
        AbortSt::Cca => {
            sim.radio.abort_st = AbortSt::NoPending;
            cca_abort_eval_respond(sim)
        }
        AbortSt::NoPending => Err(SimError::Internal(
            "the abort reevaluation timer was left running".into(),
        )),
    }
}

/// Fill a fresh abort structure: recheck at the next simulator event (the
/// earliest point anything can decide to stop us), abort now if a task
/// already asked for it.
fn update_abort_struct(sim: &mut Simulator) -> Abort {
    let next = sim.sched.next_event_time();
    sim.radio.next_recheck_time = next;
    let abort_time = if sim.radio.aborting {
        sim.radio.aborting = false;
        sim.xlat.phy_from_dev(sim.sched.now())
    } else {
        NEVER
    };
    Abort {
        abort_time,
        recheck_time: sim.xlat.phy_from_dev(next),
    }
}

fn handle_tx_response(sim: &mut Simulator, resp: TxResponse) -> Result {
    match resp {
        TxResponse::End { end_time } => {
            let end_dev = sim.xlat.dev_from_phy(end_time);
            sim.set_last_phy_sync(end_dev);
            // The main machine was pre-programmed at Tx start.
            Ok(())
        }
        TxResponse::AbortReeval => {
            let t = sim.radio.next_recheck_time;
            sim.set_last_phy_sync(t);
            sim.radio.abort_st = AbortSt::Tx;
            set_abort_reeval_timer(sim, t);
            Ok(())
        }
    }
}

fn tx_abort_eval_respond(sim: &mut Simulator) -> Result {
    let abort = update_abort_struct(sim);
    sim.radio.tx.req.abort = abort;
    let resp = sim.phy.provide_new_tx_abort(abort).map_err(|e| {
        log::error!("RADIO: the Phy disconnected us during a Tx");
        SimError::Phy(e)
    })?;
    handle_tx_response(sim, resp)
}

/// Start the transmission at this microsecond (plus the Tx chain delay in
/// the air). For CodedPhy this starts the FEC1 and pre-fills the FEC2.
fn start_tx(sim: &mut Simulator) -> Result {
    set_state(sim, RadioState::Tx);
    pkt::check_packet_conf(&sim.radio.regs)?;

    let now = sim.sched.now();
    let m = sim.radio.regs.mode;
    let mut ci: u8 = 0;
    let mut main_coding_rate: u8 = 0;
    let (preamble_len, address_len, header_len): (usize, usize, usize);
    sim.radio.tx.codedphy = false;
    match m {
        mode::BLE_1MBIT => {
            (preamble_len, address_len, header_len) = (1, 4, 2);
            sim.radio.bits_per_us = 1.0;
        }
        mode::BLE_2MBIT => {
            (preamble_len, address_len, header_len) = (2, 4, 2);
            sim.radio.bits_per_us = 2.0;
        }
        mode::BLE_LR125KBIT | mode::BLE_LR500KBIT => {
            (preamble_len, address_len, header_len) = (0, 4, 2);
            sim.radio.tx.codedphy = true;
            if m == mode::BLE_LR125KBIT {
                sim.radio.bits_per_us = 0.125;
                ci = 0;
                main_coding_rate = 8;
            } else {
                sim.radio.bits_per_us = 0.5;
                ci = 1;
                main_coding_rate = 2;
            }
        }
        mode::IEEE802154_250KBIT => {
            (preamble_len, address_len, header_len) = (4, 1, 1);
            sim.radio.bits_per_us = 0.25;
        }
        _ => unreachable!("rejected by check_packet_conf"),
    }
    let bpus = sim.radio.bits_per_us;

    let mut buf = [0u8; MAX_PACKET_SIZE];
    let payload_len = pkt::tx_copy_payload(&mut sim.radio.regs, &sim.mem, &mut buf);

    // Only the BLE and 15.4 CRCs are supported; the CRC configuration is
    // deduced from the modulation (CRCPOLY is assumed to match).
    let crc_len = pkt::crc_len(&sim.radio.regs) as usize;
    let crc_init = sim.radio.regs.crcinit & 0x00FF_FFFF;
    if pkt::is_ble_mode(m) {
        crate::crc::append_crc_ble(&mut buf, header_len + payload_len, crc_init);
    } else {
        // 15.4 does not cover the length byte.
        crate::crc::append_crc_154(&mut buf[header_len..], payload_len, crc_init as u16);
    }
    sim.radio.tx_buf = buf;

    let main_packet_size = header_len + payload_len + crc_len;
    let mut packet_duration = if sim.radio.tx.codedphy {
        3.0 // TERM2
    } else {
        ((preamble_len + address_len) * 8) as f64
    };
    packet_duration += ((header_len + payload_len + crc_len) * 8) as f64;
    let packet_duration = (packet_duration / bpus) as Instant;

    let (payload_start_time, main_packet_start_time);
    if sim.radio.tx.codedphy {
        sim.radio.tx.address_end_time = now + 80 + 256 - timings::tx_chain_delay();
        payload_start_time = sim.radio.tx.address_end_time + 16 + 24; // CI + TERM1

        let fec1_duration = 80 + 256 + 16 + 24;
        let fec1_start = sim.xlat.phy_from_dev(now);
        sim.radio.tx.req_fec1 =
            pkt::prep_tx_request(&sim.radio.regs, 1, fec1_duration, fec1_start, 8)?;
        let abort = update_abort_struct(sim);
        sim.radio.tx.req_fec1.abort = abort;
        main_packet_start_time = sim.radio.tx.req_fec1.end_time + 1;
        sim.radio.tx.fec2_start_time = sim.xlat.dev_from_phy(main_packet_start_time);
    } else {
        sim.radio.tx.address_end_time = now
            + (((preamble_len + address_len) * 8) as f64 / bpus) as Instant
            - timings::tx_chain_delay();
        payload_start_time = sim.radio.tx.address_end_time;
        main_packet_start_time = sim.xlat.phy_from_dev(now);
    }
    sim.radio.tx.payload_end_time =
        payload_start_time + ((8 * (header_len + payload_len)) as f64 / bpus) as Instant;
    sim.radio.tx.crc_end_time =
        sim.radio.tx.payload_end_time + ((crc_len * 8) as f64 / bpus) as Instant;

    sim.radio.tx.req = pkt::prep_tx_request(
        &sim.radio.regs,
        main_packet_size,
        packet_duration,
        main_packet_start_time,
        main_coding_rate,
    )?;
    let abort = update_abort_struct(sim);
    sim.radio.tx.req.abort = abort;

    let resp = if sim.radio.tx.codedphy {
        let req = sim.radio.tx.req_fec1.clone();
        sim.phy.req_tx(&req, &[ci]).map_err(|e| {
            log::error!("RADIO: the Phy disconnected us during a Tx");
            SimError::Phy(e)
        })?
    } else {
        let req = sim.radio.tx.req.clone();
        let packet = sim.radio.tx_buf[..main_packet_size].to_vec();
        sim.phy.req_tx(&req, &packet).map_err(|e| {
            log::error!("RADIO: the Phy disconnected us during a Tx");
            SimError::Phy(e)
        })?
    };
    handle_tx_response(sim, resp)?;

    sim.radio.sub_state = SubState::TxWaitAddressEnd;
    let t = sim.radio.tx.address_end_time;
    set_timer(sim, t);
    Ok(())
}

fn start_tx_fec2(sim: &mut Simulator) -> Result {
    let abort = update_abort_struct(sim);
    sim.radio.tx.req.abort = abort;
    sim.radio.tx.req.phy_address = 0; // not a real sync word
    let req = sim.radio.tx.req.clone();
    let packet = sim.radio.tx_buf[..usize::from(req.packet_size)].to_vec();
    let resp = sim.phy.req_tx(&req, &packet).map_err(|e| {
        log::error!("RADIO: the Phy disconnected us during a Tx");
        SimError::Phy(e)
    })?;
    handle_tx_response(sim, resp)
}

fn rx_handle_ci_reception(sim: &mut Simulator) {
    use crate::periph::radio::regs::pdustat;

    let rx = &mut sim.radio.rx;
    rx.ci = sim.radio.rx_buf.first().copied().unwrap_or(0) & 0x3;
    if rx.packet_size < 1 || rx.ci > 1 {
        log::warn!(
            "RADIO: received a CodedPhy FEC1 without CI, or a corrupted CI ({}, {})",
            rx.packet_size,
            rx.ci
        );
    }
    sim.radio.regs.pdustat |=
        (u32::from(rx.ci) << pdustat::CISTAT_POS) & pdustat::CISTAT_MASK;

    if rx.status != RxStatusCode::Ok {
        // A coding error during the CI: we neither know how many bits were
        // hit nor whether the decoder would have recovered, so each CI bit
        // gets an independent 50% draw.
        if fastrand::bool() {
            sim.radio.regs.pdustat ^= 1 << (pdustat::CISTAT_POS + 1); // don't-care bit
        }
        if fastrand::bool() {
            sim.radio.regs.pdustat ^= 1 << pdustat::CISTAT_POS;
            rx.ci ^= 1;
            rx.ci_error = true;
        }
    }
}

fn rx_handle_end_response(sim: &mut Simulator, end_time: Instant) {
    if sim.radio.rx.in_fec1 {
        rx_handle_ci_reception(sim);
        return;
    }
    // Normal packet or FEC2 end.
    if sim.radio.rx.status != RxStatusCode::HeaderError {
        sim.radio.rx.crc_end_time = end_time + timings::rx_chain_delay(&sim.radio.regs);
    }
    // On a header error we cannot know how the silicon reacts to the exact
    // bit errors; the model follows the transmitted length field and
    // reports a CRC error at the CRC end.
    if sim.radio.rx.status == RxStatusCode::Ok {
        sim.radio.regs.rxcrc = pkt::rx_crc_value(
            &sim.radio.regs,
            &sim.radio.rx_buf,
            sim.radio.rx.packet_size,
        );
        sim.radio.rx.crc_ok = true;
        sim.radio.regs.crcstatus = 1;
    }
}

fn rx_handle_address_end_response(sim: &mut Simulator, address_time: Instant) {
    use crate::periph::radio::regs::pdustat;

    let rx_chain = timings::rx_chain_delay(&sim.radio.regs);
    sim.radio.rx.address_end_time = address_time + rx_chain;

    if sim.radio.rx.codedphy && sim.radio.rx.in_fec1 {
        // The FEC1 part is always accepted; real times arrive with its end.
        sim.radio.rx.fec2_start_time = address_time + 16 + 24 + 1;
        sim.radio.rx.packet_rejected = false;
        // Provisional end times in case the transmitter aborts between
        // FEC1 and FEC2 (an empty packet).
        sim.radio.rx.payload_end_time = sim.radio.rx.fec2_start_time
            + (2.0 * 8.0 / sim.radio.bits_per_us) as Instant
            + rx_chain;
        sim.radio.rx.crc_end_time = sim.radio.rx.payload_end_time + sim.radio.rx.crc_duration;
        return;
    }

    let mut length = pkt::payload_length(&sim.radio.regs, &sim.radio.rx_buf);
    let max_length = pkt::maxlen(&sim.radio.regs) as usize;
    if length > max_length {
        log::warn!(
            "RADIO: received a packet longer than the configured MAXLEN ({length}>{max_length}), \
             truncating it"
        );
        length = max_length;
        sim.radio.regs.pdustat |= pdustat::PDUSTAT;
        sim.radio.rx.packet_rejected = true;
    } else {
        sim.radio.rx.packet_rejected = false;
    }
    if sim.radio.rx.ci_error {
        // Continuing past a corrupted CI gives us nothing.
        sim.radio.rx.packet_rejected = true;
    }

    let bpus = sim.radio.bits_per_us;
    let header_len: usize = if pkt::is_ble_mode(sim.radio.regs.mode) { 2 } else { 1 };
    let payload_end_phy = sim.radio.rx.rx_time_stamp
        + (((header_len + length) * 8) as f64 / bpus) as PhyTime;
    sim.radio.rx.payload_end_time = rx_chain + sim.xlat.dev_from_phy(payload_end_phy);

    let term2: Instant = if sim.radio.rx.codedphy {
        if sim.radio.rx.ci == 1 {
            6 // S=2, 3 bits
        } else {
            24 // S=8, 3 bits
        }
    } else {
        0
    };
    // Provisional, assuming the packet is accepted.
    sim.radio.rx.crc_end_time =
        sim.radio.rx.payload_end_time + sim.radio.rx.crc_duration + term2;

    // Copy S0/LEN/S1 and payload (excluding CRC) into the device buffer.
    let s1_off = sim.radio.rx.s1_offset;
    let ptr = sim.radio.regs.packetptr;
    if pkt::is_ble_mode(sim.radio.regs.mode) {
        if sim.radio.rx.packet_size >= 5 {
            let hdr = [sim.radio.rx_buf[0], sim.radio.rx_buf[1]];
            sim.mem.write(ptr, &hdr);
            // The whole payload is copied already at the address end: the
            // AAR looks into advertisement packets after 64 bits.
            let body: Vec<u8> = sim.radio.rx_buf[2..(2 + length).min(sim.radio.rx_buf.len())]
                .to_vec();
            sim.mem.write(ptr + 2 + s1_off as u32, &body);
        }
    } else if sim.radio.regs.mode == mode::IEEE802154_250KBIT && sim.radio.rx.packet_size >= 3 {
        let hdr = [sim.radio.rx_buf[0]];
        sim.mem.write(ptr, &hdr);
        let body: Vec<u8> =
            sim.radio.rx_buf[1..(1 + length).min(sim.radio.rx_buf.len())].to_vec();
        sim.mem.write(ptr + 1 + s1_off as u32, &body);
        // Silicon appends the LQI after the payload in this mode (doing it
        // this early is a model shortcut).
        let lqi = pkt::dbm_to_modem_lqi_format(power_to_dbm(sim.radio.rx.rssi));
        sim.mem
            .write(ptr + (1 + s1_off + length) as u32, &[lqi]);
    }
}

fn handle_rx_response(sim: &mut Simulator, resp: RxResponse) -> Result {
    match resp {
        RxResponse::AbortReeval => {
            let t = sim.radio.next_recheck_time;
            sim.set_last_phy_sync(t);
            sim.radio.abort_st = AbortSt::Rx;
            let arm = t.max(sim.sched.now());
            set_abort_reeval_timer(sim, arm);
            Ok(())
        }
        RxResponse::AddressFound {
            rx_time_stamp,
            rssi,
            packet,
        } => {
            if sim.radio.state != RadioState::Rx {
                return Ok(()); // aborted meanwhile
            }
            // `rx_time_stamp` is the air end of the sync word.
            let address_time = sim.xlat.dev_from_phy(rx_time_stamp);
            sim.set_last_phy_sync(address_time);
            sim.radio.rx.rx_time_stamp = rx_time_stamp;
            sim.radio.rx.rssi = rssi;
            sim.radio.rx.packet_size = packet.len();
            sim.radio.rx_buf = packet;
            rx_handle_address_end_response(sim, address_time);

            if !sim.radio.rx.codedphy || sim.radio.rx.in_fec1 {
                sim.radio.sub_state = SubState::RxWaitAddressEnd;
                let t = sim.radio.rx.address_end_time;
                set_timer(sim, t);
            } else {
                // FEC2: the address events already fired with the FEC1.
                sim.radio.sub_state = SubState::RxWaitPayloadEnd;
                set_timer(sim, NEVER);
                rx_addr_received(sim)?;
                let t = sim.radio.rx.payload_end_time;
                set_timer(sim, t);
            }
            Ok(())
        }
        RxResponse::End { end_time, status } => {
            if sim.radio.state != RadioState::Rx {
                return Ok(()); // aborted meanwhile
            }
            let end_dev = sim.xlat.dev_from_phy(end_time);
            sim.set_last_phy_sync(end_dev);
            sim.radio.rx.status = status;

            // NOSYNC mid-packet cannot happen (the scan time is infinite);
            // it can at the start of a FEC2 whose transmitter aborted
            // between the blocks.
            if status == RxStatusCode::NoSync {
                if !sim.radio.rx.codedphy || sim.radio.rx.in_fec1 {
                    return Err(SimError::Internal(
                        "Phy reported NOSYNC outside a CodedPhy FEC2".into(),
                    ));
                }
                // Run out the provisional payload timeline.
                sim.radio.sub_state = SubState::RxWaitPayloadEnd;
                let t = sim.radio.rx.payload_end_time;
                set_timer(sim, t);
                return Ok(());
            }

            rx_handle_end_response(sim, end_dev);
            if sim.radio.rx.in_fec1 {
                // Start the FEC2 in the next phy microsecond to absorb any
                // rounding in the phy<->device clock translation.
                sim.radio.rx.req.start_time = end_time + 1;
                let t = sim.radio.rx.fec2_start_time;
                set_timer(sim, t);
            }
            Ok(())
        }
    }
}

fn rx_abort_eval_respond(sim: &mut Simulator) -> Result {
    let abort = update_abort_struct(sim);
    sim.radio.rx.req.abort = abort;
    let resp = sim.phy.provide_new_rx_abort(abort).map_err(|e| {
        log::error!("RADIO: the Phy disconnected us during an Rx");
        SimError::Phy(e)
    })?;
    handle_rx_response(sim, resp)
}

/// Start the reception at this microsecond.
fn start_rx(sim: &mut Simulator) -> Result {
    pkt::check_packet_conf(&sim.radio.regs)?;

    set_state(sim, RadioState::Rx);
    sim.radio.regs.crcstatus = 0;
    sim.radio.regs.pdustat = 0;

    sim.radio.rx.s1_offset = usize::from(sim.radio.regs.pcnf0 & pcnf0::S1INCL != 0);
    sim.radio.rx.codedphy = false;
    sim.radio.rx.in_fec1 = false;
    sim.radio.rx.ci_error = false;
    sim.radio.rx.ci = 0;

    match sim.radio.regs.mode {
        mode::BLE_1MBIT => sim.radio.bits_per_us = 1.0,
        mode::BLE_2MBIT => sim.radio.bits_per_us = 2.0,
        mode::BLE_LR125KBIT | mode::BLE_LR500KBIT => {
            sim.radio.bits_per_us = 0.125; // FEC1 part
            sim.radio.rx.codedphy = true;
            sim.radio.rx.in_fec1 = true;
        }
        mode::IEEE802154_250KBIT => sim.radio.bits_per_us = 0.25,
        _ => unreachable!("rejected by check_packet_conf"),
    }
    sim.radio.rx.crc_duration =
        ((pkt::crc_len(&sim.radio.regs) * 8) as f64 / sim.radio.bits_per_us) as Instant;
    sim.radio.rx.crc_ok = false;
    sim.radio.rx.status = RxStatusCode::NoSync;

    let start_phy = sim.xlat.phy_from_dev(sim.sched.now());
    // Only RXADDRESSES == 0x01 is supported.
    let addresses = [pkt::get_address(&sim.radio.regs, 0)];

    if sim.radio.rx.codedphy {
        sim.radio.rx.req_fec1 = pkt::prep_rx_request_fec1(&sim.radio.regs, start_phy)?;
        let abort = update_abort_struct(sim);
        sim.radio.rx.req_fec1.abort = abort;
    }
    sim.radio.rx.req = pkt::prep_rx_request(&sim.radio.regs, start_phy)?;
    let abort = update_abort_struct(sim);
    sim.radio.rx.req.abort = abort;

    let req = if sim.radio.rx.codedphy {
        sim.radio.rx.req_fec1.clone()
    } else {
        sim.radio.rx.req.clone()
    };
    let resp = sim.phy.req_rx(&req, &addresses).map_err(|e| {
        log::error!("RADIO: the Phy disconnected us during an Rx");
        SimError::Phy(e)
    })?;

    sim.radio.sub_state = SubState::Invalid;
    set_timer(sim, NEVER);
    handle_rx_response(sim, resp)
}

/// Start the Rx of a CodedPhy FEC2 in this microsecond.
fn start_rx_fec2(sim: &mut Simulator) -> Result {
    sim.radio.rx.in_fec1 = false;

    if sim.radio.rx.ci == 0 {
        sim.radio.rx.req.coding_rate = 8;
        // error_calc_rate and header_duration already assume S=8.
    } else {
        sim.radio.bits_per_us = 0.5;
        sim.radio.rx.req.coding_rate = 2;
        sim.radio.rx.req.error_calc_rate = 500_000;
        sim.radio.rx.req.header_duration = 2 * 8 * 2; // 2 bytes at 500 kbps
    }
    // start_time was set from the FEC1 end.
    sim.radio.rx.req.pream_and_addr_duration = 0;
    sim.radio.rx.req.scan_duration = 1;
    sim.radio.rx.req.prelocked_tx = true;
    sim.radio.rx.crc_duration =
        ((pkt::crc_len(&sim.radio.regs) * 8) as f64 / sim.radio.bits_per_us) as Instant;

    let abort = update_abort_struct(sim);
    sim.radio.rx.req.abort = abort;
    let req = sim.radio.rx.req.clone();
    let resp = sim.phy.req_rx(&req, &[]).map_err(|e| {
        log::error!("RADIO: the Phy disconnected us during an Rx");
        SimError::Phy(e)
    })?;
    handle_rx_response(sim, resp)
}

/// Called when the packet address would have been fully received (and at
/// the FEC2 start for CodedPhy): sample RSSI, run the device-address
/// match, and answer the waiting Phy whether we take the packet.
fn rx_addr_received(sim: &mut Simulator) -> Result {
    let accept = !sim.radio.rx.packet_rejected;

    if !sim.radio.rx.codedphy || sim.radio.rx.in_fec1 {
        if sim.radio.rssi_on {
            sim.radio.regs.rssisample =
                pkt::rssi_value_to_modem_format(power_to_dbm(sim.radio.rx.rssi));
            signals::signal_rssiend(sim)?;
        }
    }

    if !sim.radio.rx.codedphy || !sim.radio.rx.in_fec1 {
        sim.radio.regs.rxmatch = 0; // only logical address 0 is supported
        if sim.radio.regs.dacnf & 0xFF != 0 {
            // The advertisement address is checked already here, 16+48 bits
            // before the silicon would conclude; delay the event with a
            // dedicated Rx state if this ever becomes a problem.
            device_address_match(sim)?;
        }
    }

    let abort = update_abort_struct(sim);
    sim.radio.rx.req.abort = abort;

    if accept {
        let resp = sim
            .phy
            .rx_cont_after_addr(true, Some(abort))
            .map_err(|e| {
                log::error!("RADIO: the Phy disconnected us during an Rx");
                SimError::Phy(e)
            })?;
        match resp {
            Some(resp) => handle_rx_response(sim, resp),
            None => Err(SimError::Internal(
                "the Phy gave no response to an accepted packet continuation".into(),
            )),
        }
    } else {
        // Rejecting gets no response: close the reception as if the Phy
        // had finished on its own.
        sim.phy.rx_cont_after_addr(false, None).map_err(|e| {
            log::error!("RADIO: the Phy disconnected us during an Rx");
            SimError::Phy(e)
        })?;
        sim.radio.regs.rxcrc = pkt::rx_crc_value(
            &sim.radio.regs,
            &sim.radio.rx_buf,
            sim.radio.rx.packet_size,
        );
        let crc_ok = sim.radio.rx.crc_ok;
        ccm::radio_received_packet(sim, !crc_ok)
    }
}

/// DAP/DAB device-address match over the received (advertisement) packet:
/// the address is the first 48 bits after the 2-byte header, the TxAdd bit
/// is bit 6 of the first header byte.
fn device_address_match(sim: &mut Simulator) -> Result {
    let buf = &sim.radio.rx_buf;
    if buf.len() < 8 {
        return signals::signal_devmiss(sim);
    }
    let rx_addr = u32::from_le_bytes([buf[2], buf[3], buf[4], buf[5]]);
    let rx_prefix = u16::from_le_bytes([buf[6], buf[7]]);
    let tx_add = (buf[0] >> 6) & 1;

    let mut match_found = false;
    for i in 0..8 {
        if (sim.radio.regs.dacnf >> i) & 1 == 0 {
            continue;
        }
        if u32::from(tx_add) != (sim.radio.regs.dacnf >> (i + 8)) & 1 {
            continue;
        }
        if rx_addr != sim.radio.regs.dab[i] {
            continue;
        }
        if u32::from(rx_prefix) != sim.radio.regs.dap[i] & 0xFFFF {
            continue;
        }
        match_found = true;
        sim.radio.regs.dai = i as u32;
        break;
    }
    if match_found {
        signals::signal_devmatch(sim)
    } else {
        signals::signal_devmiss(sim)
    }
}

fn cca_handle_end_response(sim: &mut Simulator) -> Result {
    if sim.radio.cca.cca_not_ed {
        let cca_mode = sim.radio.regs.ccactrl & ccactrl::CCAMODE_MASK;
        sim.radio.cca.is_busy = match cca_mode {
            ccactrl::ED_MODE | ccactrl::ED_MODE_TEST1 => sim.radio.cca.rssi_overthreshold,
            ccactrl::CARRIER_MODE => sim.radio.cca.mod_found,
            ccactrl::CARRIER_AND_ED_MODE => {
                sim.radio.cca.mod_found && sim.radio.cca.rssi_overthreshold
            }
            ccactrl::CARRIER_OR_ED_MODE => {
                sim.radio.cca.mod_found || sim.radio.cca.rssi_overthreshold
            }
            other => {
                return Err(SimError::BadConfig(format!(
                    "RADIO: CCAMODE={other} is not supported"
                )))
            }
        };
    } else {
        let rssi_dbm = power_to_dbm(sim.radio.cca.rssi_max);
        sim.radio.regs.edsample = u32::from(pkt::dbm_to_modem_lqi_format(rssi_dbm));
    }
    Ok(())
}

fn handle_cca_response(sim: &mut Simulator, resp: CcaResponse) -> Result {
    match resp {
        CcaResponse::End {
            end_time,
            rssi_ave,
            rssi_max,
            mod_found,
            rssi_overthreshold,
        } => {
            let end_dev = sim.xlat.dev_from_phy(end_time);
            sim.set_last_phy_sync(end_dev);
            sim.radio.cca.cca_end_time = end_dev;
            sim.radio.cca.rssi_ave = rssi_ave;
            sim.radio.cca.rssi_max = rssi_max;
            sim.radio.cca.mod_found = mod_found;
            sim.radio.cca.rssi_overthreshold = rssi_overthreshold;
            if sim.radio.state == RadioState::CcaEd {
                set_timer(sim, end_dev);
            }
            cca_handle_end_response(sim)
        }
        CcaResponse::AbortReeval => {
            let t = sim.radio.next_recheck_time;
            sim.set_last_phy_sync(t);
            sim.radio.abort_st = AbortSt::Cca;
            set_abort_reeval_timer(sim, t);
            Ok(())
        }
    }
}

fn cca_abort_eval_respond(sim: &mut Simulator) -> Result {
    let abort = update_abort_struct(sim);
    sim.radio.cca.req.abort = abort;
    let resp = sim.phy.provide_new_cca_abort(abort).map_err(|e| {
        log::error!("RADIO: the Phy disconnected us during a CCA procedure");
        SimError::Phy(e)
    })?;
    handle_cca_response(sim, resp)
}

/// Start a CCA (`cca_not_ed`) or ED measurement right now.
fn start_cca_ed(sim: &mut Simulator, cca_not_ed: bool) -> Result {
    sim.radio.state = RadioState::CcaEd;
    sim.radio.cca.cca_not_ed = cca_not_ed;
    sim.radio.cca.is_busy = false;

    let start_phy = sim.xlat.phy_from_dev(sim.sched.now());
    sim.radio.cca.req =
        pkt::prep_cca_request(&sim.radio.regs, start_phy, cca_not_ed, 0.0)?;
    let abort = update_abort_struct(sim);
    sim.radio.cca.req.abort = abort;

    // Expected end; the Phy may finish earlier with detect-and-stop modes.
    sim.radio.cca.cca_end_time =
        sim.sched.now() + Instant::from(sim.radio.cca.req.scan_duration);
    let t = sim.radio.cca.cca_end_time;
    set_timer(sim, t);

    let req = sim.radio.cca.req.clone();
    let resp = sim.phy.req_cca(&req).map_err(|e| {
        log::error!("RADIO: the Phy disconnected us during a CCA procedure");
        SimError::Phy(e)
    })?;
    handle_cca_response(sim, resp)
}
