// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Radio timing tables: ramp-up/down durations and chain delays for the
//! modelled SoC variant.
//!
//! TXEND is produced significantly earlier in 15.4 than the end of the bit
//! in the air (~17us), while for 1/2M BLE it is ~1us. The CodedPhy numbers
//! are mostly rounded versions of the values a real controller measures;
//! the spec does not publish them.

use crate::periph::radio::regs::{modecnf0, mode, shorts, RadioRegs};
use crate::time::Instant;

/// Modulation index: 1Mbps, 2Mbps, Coded S=2, Coded S=8, 15.4.
fn mod_idx(regs: &RadioRegs) -> usize {
    match regs.mode {
        mode::BLE_2MBIT => 1,
        mode::BLE_LR500KBIT => 2,
        mode::BLE_LR125KBIT => 3,
        mode::IEEE802154_250KBIT => 4,
        _ => 0,
    }
}

/// [modulation][fast ramp][normal ramp with HW TIFS].
const TX_RU_TIME: [[[Instant; 2]; 2]; 5] = [
    [[130, 141], [41, 41]],  // BLE 1 Mbps
    [[129, 140], [40, 40]],  // BLE 2 Mbps
    [[132, 132], [42, 42]],  // Coded S=2
    [[132, 122], [42, 42]],  // Coded S=8
    [[129, 130], [40, 40]],  // 15.4
];

const RX_RU_TIME: [[[Instant; 2]; 2]; 5] = [
    [[129, 140], [40, 40]],  // BLE 1 Mbps
    [[129, 140], [40, 40]],  // BLE 2 Mbps
    [[130, 120], [40, 40]],  // Coded (ramps up with S=8)
    [[130, 120], [40, 40]],
    [[129, 130], [40, 40]],  // 15.4
];

/// Time from the START task until bits leave the antenna.
const TX_CHAIN_DELAY: Instant = 1;

/// Time from a bit ending at the antenna until its event is generated.
const RX_CHAIN_DELAY: [Instant; 5] = [9, 5, 30, 30, 22];

const TX_RD_TIME: [Instant; 5] = [6, 6, 10, 10, 21];
const RX_RD_TIME: Instant = 0;

/// Is the automatic hardware TIFS mechanism armed by the current SHORTS
/// and ramp-up configuration?
pub fn is_hw_tifs_enabled(regs: &RadioRegs) -> bool {
    regs.shorts & shorts::END_DISABLE != 0
        && (regs.shorts & shorts::DISABLED_RXEN != 0 || regs.shorts & shorts::DISABLED_TXEN != 0)
        && regs.modecnf0 & modecnf0::RU_FAST == 0
}

/// Ramp-up duration for the configured MODE and MODECNF0.
///
/// `from_hw_tifs` selects the tighter ramp-up the hardware uses while it is
/// auto-switching through its TIFS mechanism.
pub fn rampup_time(regs: &RadioRegs, tx_not_rx: bool, from_hw_tifs: bool) -> Instant {
    let m = mod_idx(regs);
    let fast = regs.modecnf0 & modecnf0::RU_FAST != 0;
    let hw_tifs = if fast {
        false
    } else {
        from_hw_tifs || is_hw_tifs_enabled(regs)
    };
    if tx_not_rx {
        TX_RU_TIME[m][usize::from(fast)][usize::from(hw_tifs)]
    } else {
        RX_RU_TIME[m][usize::from(fast)][usize::from(hw_tifs)]
    }
}

pub fn tx_chain_delay() -> Instant {
    TX_CHAIN_DELAY
}

pub fn rx_chain_delay(regs: &RadioRegs) -> Instant {
    RX_CHAIN_DELAY[mod_idx(regs)]
}

pub fn tx_rampdown_time(regs: &RadioRegs) -> Instant {
    TX_RD_TIME[mod_idx(regs)]
}

pub fn rx_rampdown_time() -> Instant {
    RX_RD_TIME
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::periph::radio::regs::RadioRegs;

    #[test]
    fn normal_ramp_for_1mbit_is_130us() {
        let regs = RadioRegs::reset_values();
        // MODE = BLE 1Mbit, MODECNF0.RU = Default(0)
        assert_eq!(rampup_time(&regs, true, false), 130);
        assert_eq!(rampup_time(&regs, false, false), 129);
    }

    #[test]
    fn hw_tifs_selects_the_longer_ramp() {
        let mut regs = RadioRegs::reset_values();
        regs.shorts = shorts::END_DISABLE | shorts::DISABLED_TXEN;
        assert!(is_hw_tifs_enabled(&regs));
        assert_eq!(rampup_time(&regs, true, false), 141);
    }

    #[test]
    fn fast_ramp_ignores_hw_tifs() {
        let mut regs = RadioRegs::reset_values();
        regs.shorts = shorts::END_DISABLE | shorts::DISABLED_RXEN;
        regs.modecnf0 |= modecnf0::RU_FAST;
        assert_eq!(rampup_time(&regs, true, false), 41);
        assert!(!is_hw_tifs_enabled(&regs));
    }
}
