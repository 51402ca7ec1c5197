//! HDLC deframer.
//!
//! Consumes one NRZI-decoded bit at a time and reassembles frame bytes
//! into the receive queue. The deframer recognises three patterns in
//! its rolling bit window:
//!
//! - the flag `01111110`, which delimits frames and (re)establishes
//!   synchronization,
//! - the reset pattern of seven consecutive ones, which abandons the
//!   current frame,
//! - the stuffed-bit pattern, five ones followed by a zero, whose zero
//!   is discarded.
//!
//! Everything else is a data bit, collected LSB first. A completed byte
//! that happens to equal one of the reserved values is pushed behind a
//! literal [`AX25_ESC`] so the application can tell it apart from a
//! delimiter. A data byte equal to the flag can still be framed: the
//! transmitter's bit stuffing guarantees six consecutive ones never
//! occur inside data, so the flag is only ever matched between frames.

use heapless::Deque;

use crate::consts::{AX25_ESC, HDLC_FLAG, HDLC_RESET};

/// Receive-path error, surfaced to the foreground via the status word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RxError {
    /// The receive queue was full when the deframer had a byte to push.
    /// The frame in progress is abandoned; framing resumes at the next
    /// flag.
    #[error("receive queue overrun")]
    Overrun,
}

/// Bit-level deframer state.
#[derive(Debug, Default)]
pub struct Hdlc {
    /// Rolling window of the last eight demodulated bits, newest in the
    /// least significant position.
    demod_bits: u8,
    /// True between a received flag and the next loss of sync.
    pub(crate) rxstart: bool,
    /// Byte in progress.
    currchar: u8,
    /// Fill count of `currchar`, `0..8`.
    bit_idx: u8,
}

impl Hdlc {
    /// Creates an unsynchronized deframer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Consumes one demodulated bit.
    ///
    /// Pushes completed bytes (and flag delimiters) into `fifo`. On a
    /// full queue the deframer drops synchronization and reports
    /// [`RxError::Overrun`]; it will recover on the next flag.
    pub fn feed<const N: usize>(
        &mut self,
        bit: bool,
        fifo: &mut Deque<u8, N>,
    ) -> Result<(), RxError> {
        let mut ret = Ok(());

        self.demod_bits <<= 1;
        self.demod_bits |= bit as u8;

        // Frame delimiter
        if self.demod_bits == HDLC_FLAG {
            if fifo.push_back(HDLC_FLAG).is_ok() {
                self.rxstart = true;
            } else {
                ret = Err(RxError::Overrun);
                self.rxstart = false;
            }

            self.currchar = 0;
            self.bit_idx = 0;
            return ret;
        }

        // Seven ones: abandon the frame in progress
        if self.demod_bits & HDLC_RESET == HDLC_RESET {
            self.rxstart = false;
            return ret;
        }

        if !self.rxstart {
            return ret;
        }

        // Stuffed bit, inserted by the transmitter after five ones
        if self.demod_bits & 0x3f == 0x3e {
            return ret;
        }

        if self.demod_bits & 0x01 != 0 {
            self.currchar |= 0x80;
        }

        self.bit_idx += 1;
        if self.bit_idx >= 8 {
            if self.currchar == HDLC_FLAG
                || self.currchar == HDLC_RESET
                || self.currchar == AX25_ESC
            {
                if fifo.push_back(AX25_ESC).is_err() {
                    self.rxstart = false;
                    ret = Err(RxError::Overrun);
                }
            }

            if fifo.push_back(self.currchar).is_err() {
                self.rxstart = false;
                ret = Err(RxError::Overrun);
            }

            self.currchar = 0;
            self.bit_idx = 0;
        } else {
            self.currchar >>= 1;
        }

        ret
    }
}
