// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Client half of the 2.4 GHz Phy protocol.
//!
//! On-air activity is not simulated locally: every transmission, reception
//! and CCA/ED measurement is a synchronous transaction with an external Phy
//! process which arbitrates the medium between all connected devices. The
//! device blocks inside each call until the Phy answers; the Phy may answer
//! with the final result or with an abort-reevaluation request (see the
//! RADIO model for the abort handshake).
//!
//! Times crossing this boundary are *phy* microseconds; [`TimeXlat`]
//! applies the device's crystal offset/drift on each crossing.

pub mod fifo;
pub mod wire;

pub use fifo::P2G4FifoLink;

use crate::time::{Instant, NEVER};

/// A point in Phy time, microseconds.
pub type PhyTime = u64;

/// Signal power / RSSI in dBm as an 8.8 fixed-point value.
pub type Power = i16;

pub fn power_from_dbm(dbm: f64) -> Power {
    let v = (dbm * 256.0).round();
    v.clamp(f64::from(i16::MIN), f64::from(i16::MAX)) as i16
}

pub fn power_to_dbm(p: Power) -> f64 {
    f64::from(p) / 256.0
}

/// Errors of the Phy boundary. All of them are fatal for the device.
#[derive(Debug)]
pub enum PhyError {
    /// The Phy closed the connection (or it was never established).
    Disconnected,
    Io(std::io::Error),
    /// The Phy answered something the protocol does not allow here.
    Protocol(String),
    /// Radio activity was attempted while running detached (`nosim`).
    Nosim,
}

impl std::fmt::Display for PhyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PhyError::Disconnected => write!(f, "the Phy disconnected us"),
            PhyError::Io(e) => write!(f, "I/O error on the Phy channel: {e}"),
            PhyError::Protocol(msg) => write!(f, "Phy protocol violation: {msg}"),
            PhyError::Nosim => write!(f, "radio activity attempted with no Phy connected"),
        }
    }
}

impl std::error::Error for PhyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PhyError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for PhyError {
    fn from(e: std::io::Error) -> Self {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            PhyError::Disconnected
        } else {
            PhyError::Io(e)
        }
    }
}

pub type PhyResult<T> = std::result::Result<T, PhyError>;

/// Joint abort bookkeeping of an in-flight transaction, in phy time.
///
/// `recheck_time` is when the device wants to be asked again; `abort_time`
/// is when the transaction must stop (`NEVER` = run to completion).
#[derive(Clone, Copy, Debug)]
pub struct Abort {
    pub abort_time: PhyTime,
    pub recheck_time: PhyTime,
}

impl Default for Abort {
    fn default() -> Self {
        Self {
            abort_time: NEVER,
            recheck_time: NEVER,
        }
    }
}

/// The modulations the Phy arbitrates for this device family.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Modulation {
    Ble1M,
    Ble2M,
    BleCoded,
    Ieee154,
}

/// One transmission request (`txv2`).
#[derive(Clone, Debug)]
pub struct TxRequest {
    pub start_time: PhyTime,
    pub end_time: PhyTime,
    /// The on-air sync word (access address / SFD).
    pub phy_address: u64,
    pub modulation: Modulation,
    /// Channel center frequency as an offset from 2400 MHz.
    pub center_freq: u16,
    pub power_level: Power,
    /// Bytes following preamble+address (header+payload+CRC).
    pub packet_size: u16,
    /// 0 = uncoded, 2/8 = CodedPhy S.
    pub coding_rate: u8,
    pub abort: Abort,
}

impl Default for TxRequest {
    fn default() -> Self {
        Self {
            start_time: 0,
            end_time: 0,
            phy_address: 0,
            modulation: Modulation::Ble1M,
            center_freq: 0,
            power_level: 0,
            packet_size: 0,
            coding_rate: 0,
            abort: Abort::default(),
        }
    }
}

/// One reception request (`rxv2`).
#[derive(Clone, Debug)]
pub struct RxRequest {
    pub start_time: PhyTime,
    pub scan_duration: u32,
    pub modulation: Modulation,
    pub center_freq: u16,
    pub antenna_gain: Power,
    pub pream_and_addr_duration: u32,
    pub header_duration: u32,
    /// Max tolerated bit errors in the header (<=).
    pub header_threshold: u16,
    /// Max tolerated bit errors in preamble+sync (<).
    pub sync_threshold: u16,
    /// How much preamble the modem may lose and still sync, us.
    pub acceptable_pre_truncation: u32,
    /// Bit rate for bit-error statistics, bits/s.
    pub error_calc_rate: u32,
    pub coding_rate: u8,
    pub forced_packet_duration: u32,
    /// Continue a reception already locked to a transmitter (CodedPhy FEC2).
    pub prelocked_tx: bool,
    pub abort: Abort,
}

impl Default for RxRequest {
    fn default() -> Self {
        Self {
            start_time: 0,
            scan_duration: 0,
            modulation: Modulation::Ble1M,
            center_freq: 0,
            antenna_gain: 0,
            pream_and_addr_duration: 0,
            header_duration: 0,
            header_threshold: 0,
            sync_threshold: 0,
            acceptable_pre_truncation: 0,
            error_calc_rate: 0,
            coding_rate: 0,
            forced_packet_duration: 0,
            prelocked_tx: false,
            abort: Abort::default(),
        }
    }
}

/// One CCA/ED measurement request.
#[derive(Clone, Debug)]
pub struct CcaRequest {
    pub start_time: PhyTime,
    pub scan_duration: u32,
    pub scan_period: u32,
    pub modulation: Modulation,
    pub center_freq: u16,
    pub rssi_threshold: Power,
    pub mod_threshold: Power,
    /// 0: measure the whole window; 1: stop at first find; 2: stop at
    /// first find over the RSSI threshold.
    pub stop_when_found: u8,
    pub abort: Abort,
}

impl Default for CcaRequest {
    fn default() -> Self {
        Self {
            start_time: 0,
            scan_duration: 0,
            scan_period: 0,
            modulation: Modulation::Ieee154,
            center_freq: 0,
            rssi_threshold: 0,
            mod_threshold: 0,
            stop_when_found: 0,
            abort: Abort::default(),
        }
    }
}

/// Reception outcome code.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum RxStatusCode {
    Ok,
    CrcError,
    HeaderError,
    NoSync,
}

#[derive(Clone, Debug)]
pub enum TxResponse {
    End { end_time: PhyTime },
    AbortReeval,
}

#[derive(Clone, Debug)]
pub enum RxResponse {
    /// The sync word was found; the packet content (as it will arrive) is
    /// delivered up front so the device can pre-compute its timeline.
    AddressFound {
        rx_time_stamp: PhyTime,
        rssi: Power,
        packet: Vec<u8>,
    },
    End {
        end_time: PhyTime,
        status: RxStatusCode,
    },
    AbortReeval,
}

#[derive(Clone, Debug)]
pub enum CcaResponse {
    End {
        end_time: PhyTime,
        rssi_ave: Power,
        rssi_max: Power,
        mod_found: bool,
        rssi_overthreshold: bool,
    },
    AbortReeval,
}

/// The synchronous device-side Phy operations.
///
/// Implementations: [`P2G4FifoLink`] (the production FIFO client),
/// [`NosimLink`] (detached operation), and test doubles.
pub trait PhyLink {
    fn req_tx(&mut self, req: &TxRequest, packet: &[u8]) -> PhyResult<TxResponse>;
    fn provide_new_tx_abort(&mut self, abort: Abort) -> PhyResult<TxResponse>;

    fn req_rx(&mut self, req: &RxRequest, addresses: &[u64]) -> PhyResult<RxResponse>;
    /// Accept/reject continuation after an AddressFound. A rejection gets
    /// no further response from the Phy.
    fn rx_cont_after_addr(
        &mut self,
        accept: bool,
        abort: Option<Abort>,
    ) -> PhyResult<Option<RxResponse>>;
    fn provide_new_rx_abort(&mut self, abort: Abort) -> PhyResult<RxResponse>;

    fn req_cca(&mut self, req: &CcaRequest) -> PhyResult<CcaResponse>;
    fn provide_new_cca_abort(&mut self, abort: Abort) -> PhyResult<CcaResponse>;

    /// Block until the Phy has reached `end` (phy time).
    fn wait(&mut self, end: PhyTime) -> PhyResult<()>;

    /// Leave the simulation, letting it continue without this device.
    fn disconnect(&mut self) -> PhyResult<()>;
    /// Ask the Phy to end the whole simulation.
    fn terminate(&mut self) -> PhyResult<()>;
}

/// Detached operation: no Phy process. Any radio activity is fatal.
#[derive(Default)]
pub struct NosimLink;

impl NosimLink {
    pub fn new() -> Self {
        Self
    }
}

impl PhyLink for NosimLink {
    fn req_tx(&mut self, _req: &TxRequest, _packet: &[u8]) -> PhyResult<TxResponse> {
        Err(PhyError::Nosim)
    }
    fn provide_new_tx_abort(&mut self, _abort: Abort) -> PhyResult<TxResponse> {
        Err(PhyError::Nosim)
    }
    fn req_rx(&mut self, _req: &RxRequest, _addresses: &[u64]) -> PhyResult<RxResponse> {
        Err(PhyError::Nosim)
    }
    fn rx_cont_after_addr(
        &mut self,
        _accept: bool,
        _abort: Option<Abort>,
    ) -> PhyResult<Option<RxResponse>> {
        Err(PhyError::Nosim)
    }
    fn provide_new_rx_abort(&mut self, _abort: Abort) -> PhyResult<RxResponse> {
        Err(PhyError::Nosim)
    }
    fn req_cca(&mut self, _req: &CcaRequest) -> PhyResult<CcaResponse> {
        Err(PhyError::Nosim)
    }
    fn provide_new_cca_abort(&mut self, _abort: Abort) -> PhyResult<CcaResponse> {
        Err(PhyError::Nosim)
    }
    fn wait(&mut self, _end: PhyTime) -> PhyResult<()> {
        Ok(())
    }
    fn disconnect(&mut self) -> PhyResult<()> {
        Ok(())
    }
    fn terminate(&mut self) -> PhyResult<()> {
        Ok(())
    }
}

/// Linear device-clock model: a start offset plus a drift coefficient,
/// applied on every time value crossing the Phy boundary.
#[derive(Clone, Copy, Debug)]
pub struct TimeXlat {
    offset_us: f64,
    drift: f64,
}

impl TimeXlat {
    pub fn new(start_offset_us: f64, xo_drift: f64) -> Self {
        Self {
            offset_us: start_offset_us,
            drift: xo_drift,
        }
    }

    pub fn phy_from_dev(&self, dev: Instant) -> PhyTime {
        if dev == NEVER {
            return NEVER;
        }
        let t = (dev as f64) * (1.0 + self.drift) + self.offset_us;
        if t <= 0.0 {
            0
        } else {
            t.round() as PhyTime
        }
    }

    pub fn dev_from_phy(&self, phy: PhyTime) -> Instant {
        if phy == NEVER {
            return NEVER;
        }
        let t = ((phy as f64) - self.offset_us) / (1.0 + self.drift);
        if t <= 0.0 {
            0
        } else {
            t.round() as Instant
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn xlat_identity_without_offset_or_drift() {
        let x = TimeXlat::new(0.0, 0.0);
        assert_eq!(x.phy_from_dev(1234), 1234);
        assert_eq!(x.dev_from_phy(1234), 1234);
        assert_eq!(x.phy_from_dev(NEVER), NEVER);
        assert_eq!(x.dev_from_phy(NEVER), NEVER);
    }

    #[test]
    fn xlat_round_trips_with_drift() {
        let x = TimeXlat::new(250.5, -30e-6);
        for t in [0u64, 1, 1_000, 1_000_000, 123_456_789] {
            let phy = x.phy_from_dev(t);
            let back = x.dev_from_phy(phy);
            assert!(back.abs_diff(t) <= 1, "t={t} phy={phy} back={back}");
        }
    }

    #[test]
    fn power_conversion() {
        assert_eq!(power_from_dbm(0.0), 0);
        assert_eq!(power_from_dbm(-42.0), -42 * 256);
        assert!((power_to_dbm(power_from_dbm(-87.5)) - (-87.5)).abs() < 0.01);
    }
}
