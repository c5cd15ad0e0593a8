// SPDX-License-Identifier: Apache-2.0 OR MIT

//! FIFO transport smoke test: a thread plays the Phy end of the pipe pair
//! and answers a wait request; connect/wait/disconnect must round-trip.

use nwsim::phy::wire::{self, read_frame, write_frame};
use nwsim::phy::{P2G4FifoLink, PhyLink};
use std::fs::OpenOptions;
use std::io::{BufReader, BufWriter};
use std::thread;

#[test]
fn connect_wait_disconnect_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let com_dir = dir.path().to_path_buf();

    let phy_side = {
        let com_dir = com_dir.clone();
        thread::spawn(move || {
            let dtp = com_dir.join("2G4.d0.dtp");
            let ptd = com_dir.join("2G4.d0.ptd");
            // The device creates the FIFOs; poll until they exist.
            while !dtp.exists() || !ptd.exists() {
                thread::yield_now();
            }
            let from_dev = OpenOptions::new().read(true).open(&dtp).unwrap();
            let to_dev = OpenOptions::new().write(true).open(&ptd).unwrap();
            let mut from_dev = BufReader::new(from_dev);
            let mut to_dev = BufWriter::new(to_dev);

            let (id, payload) = read_frame(&mut from_dev).unwrap();
            assert_eq!(id, wire::MSG_WAIT);
            assert_eq!(payload.len(), 8);
            assert_eq!(u64::from_le_bytes(payload.try_into().unwrap()), 5_000);
            write_frame(&mut to_dev, wire::MSG_WAIT_DONE, &[]).unwrap();

            let (id, _) = read_frame(&mut from_dev).unwrap();
            assert_eq!(id, wire::MSG_DISCONNECT);
        })
    };

    let mut link = P2G4FifoLink::connect(&com_dir, 0).unwrap();
    link.wait(5_000).unwrap();
    link.disconnect().unwrap();
    // A second disconnect is a no-op, not a protocol violation.
    link.disconnect().unwrap();

    phy_side.join().unwrap();
}
