use std::collections::VecDeque;

use crate::buffer::WireBuffer;
use crate::error::ChannelError;
use crate::protocol::{HEADER_SIZE, MAX_DATAGRAM_SIZE, MAX_RELIABLE_PAYLOAD};

/// Bit 31 of the first header word: the datagram carries the reliable payload.
/// Bit 31 of the second header word: the acknowledgement toggle.
pub const FLAG_BIT: u32 = 1 << 31;
pub const SEQUENCE_MASK: u32 = !FLAG_BIT;

const SEQUENCE_HALF_RANGE: u32 = 1 << 30;

/// True when `s1` is newer than `s2` in the 31-bit sequence space.
///
/// The difference is taken modulo 2^31, so the comparison keeps working after
/// the counters wrap from `0x7FFF_FFFF` back to `0`.
#[inline]
pub fn sequence_newer(s1: u32, s2: u32) -> bool {
    let diff = s1.wrapping_sub(s2) & SEQUENCE_MASK;
    diff != 0 && diff < SEQUENCE_HALF_RANGE
}

#[inline]
fn next_sequence(seq: u32) -> u32 {
    seq.wrapping_add(1) & SEQUENCE_MASK
}

/// Sequenced channel to one peer: reliable messages are delivered exactly once
/// and in order, unreliable bytes ride along on a best-effort basis.
///
/// Only one reliable payload is in flight at a time. Loss is detected from the
/// peer's echoed last-seen sequence number and its acknowledgement toggle, so
/// there are no retransmission timers.
#[derive(Debug)]
pub struct ReliableChannel {
    next_outgoing_seq: u32,
    last_incoming_seq: u32,
    last_reliable_seq: u32,
    expected_incoming_ack_bit: u32,
    expected_outgoing_ack_bit: u32,
    resend_in_flight: bool,
    in_flight: Vec<u8>,
    pending: VecDeque<Vec<u8>>,
}

impl Default for ReliableChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl ReliableChannel {
    pub fn new() -> Self {
        Self::with_initial_sequence(1)
    }

    /// Starts outgoing numbering at `seq` (masked to 31 bits).
    pub fn with_initial_sequence(seq: u32) -> Self {
        Self {
            next_outgoing_seq: seq & SEQUENCE_MASK,
            last_incoming_seq: 0,
            last_reliable_seq: 0,
            expected_incoming_ack_bit: 0,
            expected_outgoing_ack_bit: 0,
            resend_in_flight: false,
            in_flight: Vec::new(),
            pending: VecDeque::new(),
        }
    }

    /// Fails when `fragment` could never fit into a datagram.
    pub fn check_fragment(fragment: &[u8]) -> Result<(), ChannelError> {
        if fragment.len() > MAX_RELIABLE_PAYLOAD {
            return Err(ChannelError::FragmentTooLarge {
                len: fragment.len(),
                max: MAX_RELIABLE_PAYLOAD,
            });
        }
        Ok(())
    }

    /// Queues `reliable` fragments and builds the next datagram for the peer.
    ///
    /// Fragments are the unit of cutting: as many whole fragments as fit are
    /// moved from the front of the queue into the in-flight payload. The
    /// unreliable bytes are appended only if room is left, otherwise they are
    /// dropped. An oversized fragment rejects the whole call and leaves the
    /// queue untouched.
    pub fn prepare_outgoing(
        &mut self,
        reliable: Vec<Vec<u8>>,
        unreliable: &[u8],
    ) -> Result<WireBuffer, ChannelError> {
        for fragment in &reliable {
            Self::check_fragment(fragment)?;
        }
        // An empty fragment would flip the toggle without anything in flight.
        self.pending
            .extend(reliable.into_iter().filter(|fragment| !fragment.is_empty()));

        if self.in_flight.is_empty() && !self.pending.is_empty() {
            while let Some(fragment) = self.pending.front() {
                if self.in_flight.len() + fragment.len() > MAX_RELIABLE_PAYLOAD {
                    break;
                }
                if let Some(fragment) = self.pending.pop_front() {
                    self.in_flight.extend_from_slice(&fragment);
                }
            }

            self.resend_in_flight = true;
            self.expected_incoming_ack_bit ^= 1;
        }

        let mut out = WireBuffer::with_capacity(MAX_DATAGRAM_SIZE);
        let reliable_flag = if self.resend_in_flight { FLAG_BIT } else { 0 };
        out.write_u32(self.next_outgoing_seq | reliable_flag);
        out.write_u32(self.last_incoming_seq | (self.expected_outgoing_ack_bit << 31));

        if self.resend_in_flight {
            out.write_bytes(&self.in_flight);
            self.last_reliable_seq = self.next_outgoing_seq;
            self.resend_in_flight = false;
        }

        if out.len() + unreliable.len() <= MAX_DATAGRAM_SIZE {
            out.write_bytes(unreliable);
        } else {
            log::debug!(
                "Dropping {} bytes of unreliable data (datagram already {} bytes)",
                unreliable.len(),
                out.len()
            );
        }

        self.next_outgoing_seq = next_sequence(self.next_outgoing_seq);
        Ok(out)
    }

    /// Evaluates an in-band datagram from the peer.
    ///
    /// Stale, duplicate and truncated datagrams are discarded without touching
    /// any state and yield `None`. Otherwise `on_payload` receives the buffer
    /// positioned at the payload together with the sequence number just
    /// accepted, and the peer's last-seen sequence number is returned.
    pub fn process_incoming<F>(&mut self, buf: &mut WireBuffer, on_payload: F) -> Option<u32>
    where
        F: FnOnce(&mut WireBuffer, u32),
    {
        if buf.remaining() < HEADER_SIZE {
            log::debug!("Dropping truncated datagram ({} bytes)", buf.remaining());
            return None;
        }

        let header_a = buf.read_u32();
        let header_b = buf.read_u32();

        let remote_seq = header_a & SEQUENCE_MASK;
        let remote_carries_reliable = header_a & FLAG_BIT != 0;
        let remote_last_seen = header_b & SEQUENCE_MASK;
        let remote_ack_bit = header_b >> 31;

        if !sequence_newer(remote_seq, self.last_incoming_seq) {
            log::debug!(
                "Dropping stale datagram {} (last seen {})",
                remote_seq,
                self.last_incoming_seq
            );
            return None;
        }

        self.last_incoming_seq = remote_seq;

        if remote_carries_reliable {
            self.expected_outgoing_ack_bit ^= 1;
        }

        // The peer has seen our last reliable transmission (or something
        // newer). A matching toggle means it arrived, a stale toggle means it
        // was lost and must go out again.
        if !sequence_newer(self.last_reliable_seq, remote_last_seen) {
            if self.expected_incoming_ack_bit == remote_ack_bit {
                self.in_flight.clear();
            } else {
                self.resend_in_flight = true;
            }
        }

        on_payload(buf, self.last_incoming_seq);

        Some(remote_last_seen)
    }

    pub fn next_outgoing_sequence(&self) -> u32 {
        self.next_outgoing_seq
    }

    pub fn last_incoming_sequence(&self) -> u32 {
        self.last_incoming_seq
    }

    pub fn last_reliable_sequence(&self) -> u32 {
        self.last_reliable_seq
    }

    /// The reliable payload awaiting acknowledgement, empty when none.
    pub fn in_flight(&self) -> &[u8] {
        &self.in_flight
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn pending(&self) -> impl Iterator<Item = &[u8]> {
        self.pending.iter().map(Vec::as_slice)
    }

    pub fn is_resend_scheduled(&self) -> bool {
        self.resend_in_flight
    }

    /// True when nothing reliable is queued or awaiting acknowledgement.
    pub fn is_settled(&self) -> bool {
        self.in_flight.is_empty() && self.pending.is_empty()
    }
}
