//! Per-channel reassembly of multi-sentence AIS messages.
//!
//! Each channel is a two-state machine: empty, or accumulating fragments
//! 1..n of one message. Only the next fragment in sequence is accepted; a
//! gap, repeat, restart, or bad index discards whatever the channel holds.
//! A dropped fragment therefore forfeits its whole message, and the next
//! message starting at fragment 1 reassembles cleanly.

use thiserror::Error;

use crate::types::Channel;

/// Why a fragment was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FragmentError {
    #[error("Invalid fragment count {0}")]
    InvalidCount(i32),
    #[error("Invalid fragment number {0}")]
    InvalidNumber(i32),
    #[error("Expecting fragment {expected}, got {got}!")]
    OutOfSequence { expected: i32, got: i32 },
}

/// Result of submitting one fragment.
#[derive(Debug, Clone, PartialEq)]
pub enum Reassembly<T> {
    /// Buffered; more fragments are needed.
    Incomplete,
    /// All fragments, in order. The channel is empty again.
    Complete(Vec<T>),
    /// Refused. The channel is empty again (except for a bad count).
    Rejected(FragmentError),
}

/// Fragment buffers for both channels.
#[derive(Debug)]
pub struct FragmentReassembler<T> {
    buffers: [Vec<T>; 2],
}

impl<T> Default for FragmentReassembler<T> {
    fn default() -> Self {
        FragmentReassembler {
            buffers: [Vec::new(), Vec::new()],
        }
    }
}

impl<T> FragmentReassembler<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Submit fragment `number` of `count` received on `channel`.
    pub fn submit(&mut self, channel: Channel, number: i32, count: i32, fragment: T) -> Reassembly<T> {
        if count < 0 {
            return Reassembly::Rejected(FragmentError::InvalidCount(count));
        }

        let buf = &mut self.buffers[channel.index()];

        if count == 1 {
            buf.clear();
            return Reassembly::Complete(vec![fragment]);
        }

        if number < 0 || number > count {
            buf.clear();
            return Reassembly::Rejected(FragmentError::InvalidNumber(number));
        }

        let expected = buf.len() as i32 + 1;
        if number != expected {
            buf.clear();
            return Reassembly::Rejected(FragmentError::OutOfSequence {
                expected,
                got: number,
            });
        }

        buf.push(fragment);
        if number == count {
            Reassembly::Complete(std::mem::take(buf))
        } else {
            Reassembly::Incomplete
        }
    }

    /// Fragments currently buffered for `channel`.
    pub fn pending(&self, channel: Channel) -> usize {
        self.buffers[channel.index()].len()
    }

    /// Drop any partial message on `channel`.
    pub fn clear(&mut self, channel: Channel) {
        self.buffers[channel.index()].clear();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
