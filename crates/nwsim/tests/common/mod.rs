// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Shared test harness: a scripted Phy double and register helpers.

// Not every test binary uses every helper.
#![allow(dead_code)]

use nwsim::config::{DeviceConfig, FabricKind};
use nwsim::phy::{
    Abort, CcaRequest, CcaResponse, PhyLink, PhyResult, PhyTime, RxRequest, RxResponse, TxRequest,
    TxResponse,
};
use nwsim::Simulator;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

/// Everything the device sent to the Phy, in order.
#[derive(Debug)]
pub enum PhyCall {
    Tx(TxRequest, Vec<u8>),
    TxAbort(Abort),
    Rx(RxRequest, Vec<u64>),
    RxCont(bool, Option<Abort>),
    RxAbort(Abort),
    Cca(CcaRequest),
    CcaAbort(Abort),
    Wait(PhyTime),
}

#[derive(Default)]
pub struct Script {
    pub tx_responses: VecDeque<TxResponse>,
    pub rx_responses: VecDeque<RxResponse>,
    pub cca_responses: VecDeque<CcaResponse>,
    pub calls: Vec<PhyCall>,
}

/// A Phy double answering from pre-loaded responses and recording every
/// request. Shared handle so tests can inspect the transcript afterwards.
#[derive(Clone)]
pub struct ScriptedPhy(pub Rc<RefCell<Script>>);

impl ScriptedPhy {
    pub fn new() -> Self {
        Self(Rc::new(RefCell::new(Script::default())))
    }

    pub fn push_tx(&self, r: TxResponse) {
        self.0.borrow_mut().tx_responses.push_back(r);
    }

    pub fn push_rx(&self, r: RxResponse) {
        self.0.borrow_mut().rx_responses.push_back(r);
    }

    pub fn push_cca(&self, r: CcaResponse) {
        self.0.borrow_mut().cca_responses.push_back(r);
    }
}

impl PhyLink for ScriptedPhy {
    fn req_tx(&mut self, req: &TxRequest, packet: &[u8]) -> PhyResult<TxResponse> {
        let mut s = self.0.borrow_mut();
        s.calls.push(PhyCall::Tx(req.clone(), packet.to_vec()));
        Ok(s.tx_responses.pop_front().expect("unscripted Tx request"))
    }

    fn provide_new_tx_abort(&mut self, abort: Abort) -> PhyResult<TxResponse> {
        let mut s = self.0.borrow_mut();
        s.calls.push(PhyCall::TxAbort(abort));
        Ok(s.tx_responses.pop_front().expect("unscripted Tx abort"))
    }

    fn req_rx(&mut self, req: &RxRequest, addresses: &[u64]) -> PhyResult<RxResponse> {
        let mut s = self.0.borrow_mut();
        s.calls.push(PhyCall::Rx(req.clone(), addresses.to_vec()));
        Ok(s.rx_responses.pop_front().expect("unscripted Rx request"))
    }

    fn rx_cont_after_addr(
        &mut self,
        accept: bool,
        abort: Option<Abort>,
    ) -> PhyResult<Option<RxResponse>> {
        let mut s = self.0.borrow_mut();
        s.calls.push(PhyCall::RxCont(accept, abort));
        if accept {
            Ok(Some(
                s.rx_responses.pop_front().expect("unscripted Rx continuation"),
            ))
        } else {
            Ok(None)
        }
    }

    fn provide_new_rx_abort(&mut self, abort: Abort) -> PhyResult<RxResponse> {
        let mut s = self.0.borrow_mut();
        s.calls.push(PhyCall::RxAbort(abort));
        Ok(s.rx_responses.pop_front().expect("unscripted Rx abort"))
    }

    fn req_cca(&mut self, req: &CcaRequest) -> PhyResult<CcaResponse> {
        let mut s = self.0.borrow_mut();
        s.calls.push(PhyCall::Cca(req.clone()));
        Ok(s.cca_responses.pop_front().expect("unscripted CCA request"))
    }

    fn provide_new_cca_abort(&mut self, abort: Abort) -> PhyResult<CcaResponse> {
        let mut s = self.0.borrow_mut();
        s.calls.push(PhyCall::CcaAbort(abort));
        Ok(s.cca_responses.pop_front().expect("unscripted CCA abort"))
    }

    fn wait(&mut self, end: PhyTime) -> PhyResult<()> {
        self.0.borrow_mut().calls.push(PhyCall::Wait(end));
        Ok(())
    }

    fn disconnect(&mut self) -> PhyResult<()> {
        Ok(())
    }

    fn terminate(&mut self) -> PhyResult<()> {
        Ok(())
    }
}

/// A device with a scripted Phy and the given fabric variant.
pub fn device(fabric: FabricKind, real_encryption: bool) -> (Simulator, ScriptedPhy) {
    let phy = ScriptedPhy::new();
    let mut cfg = DeviceConfig::default();
    cfg.fabric = fabric;
    cfg.args.real_encryption = real_encryption;
    let sim = Simulator::new(cfg, Box::new(phy.clone()));
    (sim, phy)
}

pub fn ppi_device() -> (Simulator, ScriptedPhy) {
    device(FabricKind::Ppi, false)
}

/// Configure the RADIO registers for a BLE 1 Mbps advertising packet.
pub fn config_radio_ble_adv(sim: &mut Simulator) {
    use nwsim::bus::RADIO_BASE;
    use nwsim::periph::radio::regs::offs;

    sim.write32(RADIO_BASE + offs::MODE, 0).unwrap(); // Ble_1Mbit
    // LFLEN=8, S0LEN=1, S1LEN=0, PLEN=8bit
    sim.write32(RADIO_BASE + offs::PCNF0, (8 << 0) | (1 << 8)).unwrap();
    // WHITEEN, little endian, BALEN=3, STATLEN=0, MAXLEN=37
    sim.write32(RADIO_BASE + offs::PCNF1, (1 << 25) | (3 << 16) | 37)
        .unwrap();
    sim.write32(RADIO_BASE + offs::BASE0, 0x89BE_D600).unwrap();
    sim.write32(RADIO_BASE + offs::PREFIX0, 0x0000_008E).unwrap();
    sim.write32(RADIO_BASE + offs::TXADDRESS, 0).unwrap();
    sim.write32(RADIO_BASE + offs::RXADDRESSES, 1).unwrap();
    sim.write32(RADIO_BASE + offs::CRCCNF, 3).unwrap(); // 3 bytes, BLE
    sim.write32(RADIO_BASE + offs::CRCPOLY, 0x0000_065B).unwrap();
    sim.write32(RADIO_BASE + offs::CRCINIT, 0x0055_5555).unwrap();
}
