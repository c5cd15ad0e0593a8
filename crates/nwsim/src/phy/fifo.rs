// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Phy transport over a pair of named FIFOs.
//!
//! The rendezvous directory holds one FIFO per direction and device:
//! `2G4.d<nbr>.dtp` (device to phy) and `2G4.d<nbr>.ptd` (phy to device).
//! Both are created if missing; the connect blocks until the Phy opens its
//! end, which is the natural join point at simulation start.

use super::wire::{self, read_frame, write_frame};
use super::{
    Abort, CcaRequest, CcaResponse, PhyError, PhyLink, PhyResult, PhyTime, RxRequest, RxResponse,
    TxRequest, TxResponse,
};
use std::ffi::CString;
use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

pub struct P2G4FifoLink {
    to_phy: BufWriter<File>,
    from_phy: BufReader<File>,
    connected: bool,
}

fn mkfifo(path: &Path) -> std::io::Result<()> {
    let cpath = CString::new(path.as_os_str().as_encoded_bytes())
        .map_err(|_| std::io::Error::from(std::io::ErrorKind::InvalidInput))?;
    let rc = unsafe { libc::mkfifo(cpath.as_ptr(), 0o664) };
    if rc != 0 {
        let err = std::io::Error::last_os_error();
        if err.kind() != std::io::ErrorKind::AlreadyExists {
            return Err(err);
        }
    }
    Ok(())
}

impl P2G4FifoLink {
    /// Create/open the FIFO pair for `device_nbr` under `com_dir` and
    /// block until the Phy is on the other end.
    pub fn connect(com_dir: &Path, device_nbr: u32) -> PhyResult<Self> {
        let dtp: PathBuf = com_dir.join(format!("2G4.d{device_nbr}.dtp"));
        let ptd: PathBuf = com_dir.join(format!("2G4.d{device_nbr}.ptd"));
        std::fs::create_dir_all(com_dir).map_err(PhyError::from)?;
        mkfifo(&dtp).map_err(PhyError::from)?;
        mkfifo(&ptd).map_err(PhyError::from)?;

        log::info!("connecting to the Phy through {}", com_dir.display());
        // Opening for write blocks until the Phy opens the read side.
        let to_phy = OpenOptions::new().write(true).open(&dtp).map_err(PhyError::from)?;
        let from_phy = OpenOptions::new().read(true).open(&ptd).map_err(PhyError::from)?;
        Ok(Self {
            to_phy: BufWriter::new(to_phy),
            from_phy: BufReader::new(from_phy),
            connected: true,
        })
    }

    fn send(&mut self, id: u32, payload: &[u8]) -> PhyResult<()> {
        if !self.connected {
            return Err(PhyError::Disconnected);
        }
        write_frame(&mut self.to_phy, id, payload).map_err(PhyError::from)
    }

    fn recv(&mut self) -> PhyResult<(u32, Vec<u8>)> {
        if !self.connected {
            return Err(PhyError::Disconnected);
        }
        read_frame(&mut self.from_phy).map_err(PhyError::from)
    }

    fn recv_tx_response(&mut self) -> PhyResult<TxResponse> {
        let (id, payload) = self.recv()?;
        match id {
            wire::MSG_TX_END => {
                let f = wire::decode_tx_end(&payload).map_err(PhyError::from)?;
                Ok(TxResponse::End {
                    end_time: f.end_time,
                })
            }
            wire::MSG_ABORT_REEVAL => Ok(TxResponse::AbortReeval),
            other => Err(PhyError::Protocol(format!(
                "unexpected message 0x{other:02x} during a Tx"
            ))),
        }
    }

    fn recv_rx_response(&mut self) -> PhyResult<RxResponse> {
        let (id, payload) = self.recv()?;
        match id {
            wire::MSG_RX_ADDRESSFOUND => {
                let f = wire::decode_rx_addressfound(&payload).map_err(PhyError::from)?;
                Ok(RxResponse::AddressFound {
                    rx_time_stamp: f.rx_time_stamp,
                    rssi: f.rssi,
                    packet: f.packet,
                })
            }
            wire::MSG_RX_END => {
                let f = wire::decode_rx_end(&payload).map_err(PhyError::from)?;
                let status = wire::status_from_wire(f.status).ok_or_else(|| {
                    PhyError::Protocol(format!("unknown Rx status {}", f.status))
                })?;
                Ok(RxResponse::End {
                    end_time: f.end_time,
                    status,
                })
            }
            wire::MSG_ABORT_REEVAL => Ok(RxResponse::AbortReeval),
            other => Err(PhyError::Protocol(format!(
                "unexpected message 0x{other:02x} during an Rx"
            ))),
        }
    }

    fn recv_cca_response(&mut self) -> PhyResult<CcaResponse> {
        let (id, payload) = self.recv()?;
        match id {
            wire::MSG_CCA_END => {
                let f = wire::decode_cca_end(&payload).map_err(PhyError::from)?;
                Ok(CcaResponse::End {
                    end_time: f.end_time,
                    rssi_ave: f.rssi_ave,
                    rssi_max: f.rssi_max,
                    mod_found: f.mod_found,
                    rssi_overthreshold: f.rssi_overthreshold,
                })
            }
            wire::MSG_ABORT_REEVAL => Ok(CcaResponse::AbortReeval),
            other => Err(PhyError::Protocol(format!(
                "unexpected message 0x{other:02x} during a CCA/ED"
            ))),
        }
    }
}

impl PhyLink for P2G4FifoLink {
    fn req_tx(&mut self, req: &TxRequest, packet: &[u8]) -> PhyResult<TxResponse> {
        self.send(wire::MSG_TX, &wire::encode_tx(req, packet))?;
        self.recv_tx_response()
    }

    fn provide_new_tx_abort(&mut self, abort: Abort) -> PhyResult<TxResponse> {
        self.send(wire::MSG_NEW_TX_ABORT, &wire::encode_abort(abort))?;
        self.recv_tx_response()
    }

    fn req_rx(&mut self, req: &RxRequest, addresses: &[u64]) -> PhyResult<RxResponse> {
        self.send(wire::MSG_RX, &wire::encode_rx(req, addresses))?;
        self.recv_rx_response()
    }

    fn rx_cont_after_addr(
        &mut self,
        accept: bool,
        abort: Option<Abort>,
    ) -> PhyResult<Option<RxResponse>> {
        self.send(wire::MSG_RX_CONT, &wire::encode_rx_cont(accept, abort))?;
        if accept {
            Ok(Some(self.recv_rx_response()?))
        } else {
            Ok(None)
        }
    }

    fn provide_new_rx_abort(&mut self, abort: Abort) -> PhyResult<RxResponse> {
        self.send(wire::MSG_NEW_RX_ABORT, &wire::encode_abort(abort))?;
        self.recv_rx_response()
    }

    fn req_cca(&mut self, req: &CcaRequest) -> PhyResult<CcaResponse> {
        self.send(wire::MSG_CCA, &wire::encode_cca(req))?;
        self.recv_cca_response()
    }

    fn provide_new_cca_abort(&mut self, abort: Abort) -> PhyResult<CcaResponse> {
        self.send(wire::MSG_NEW_CCA_ABORT, &wire::encode_abort(abort))?;
        self.recv_cca_response()
    }

    fn wait(&mut self, end: PhyTime) -> PhyResult<()> {
        self.send(wire::MSG_WAIT, &wire::encode_wait(end))?;
        let (id, _) = self.recv()?;
        if id == wire::MSG_WAIT_DONE {
            Ok(())
        } else {
            Err(PhyError::Protocol(format!(
                "unexpected message 0x{id:02x} while waiting"
            )))
        }
    }

    fn disconnect(&mut self) -> PhyResult<()> {
        if self.connected {
            let r = self.send(wire::MSG_DISCONNECT, &[]);
            self.connected = false;
            r?;
        }
        Ok(())
    }

    fn terminate(&mut self) -> PhyResult<()> {
        if self.connected {
            let r = self.send(wire::MSG_TERMINATE, &[]);
            self.connected = false;
            r?;
        }
        Ok(())
    }
}
