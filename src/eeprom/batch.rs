//! Batched EEPROM writes: one fused round trip per batch of data bytes.
//!
//! Each batch is sent as a single frame that enters binary and I2C mode,
//! writes the batch with one bulk write, and resets the device again.
use crate::bbio::{self, Command, DataPhase, Frame, Peripherals};
use crate::error::Result;

/// Largest batch one bulk write can carry next to the device and word address.
pub const MAX_BATCH: usize = bbio::BULK_WRITE_MAX - 2;

/// How many data bytes go into one batch.
///
/// Either way a batch is also cut at the next page boundary, so it never
/// spans two EEPROM pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BatchPolicy {
    /// At most half a page (8 bytes on a 16-byte page).
    #[default]
    HalfPage,
    /// Up to the rest of the current page, limited by the bulk write size.
    FullPage,
}

impl BatchPolicy {
    pub fn max_len(&self, page_size: usize) -> usize {
        let len = match self {
            BatchPolicy::HalfPage => page_size / 2,
            BatchPolicy::FullPage => page_size,
        };
        len.clamp(1, MAX_BATCH)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Batch<'a> {
    /// EEPROM address of the first byte.
    pub address: usize,
    /// Between one byte and the policy's maximum.
    pub data: &'a [u8],
}

/// Splits a write into batches.
///
/// A terminator byte inside the next window ends the batch just before it;
/// the terminator is never part of a batch and nothing after it is planned.
#[derive(Debug, Clone)]
pub struct Batches<'a> {
    rest: &'a [u8],
    address: usize,
    page_size: usize,
    max_len: usize,
    terminator: Option<u8>,
    terminated: bool,
}

impl<'a> Batches<'a> {
    pub fn new(
        data: &'a [u8],
        start: usize,
        page_size: usize,
        policy: BatchPolicy,
        terminator: Option<u8>,
    ) -> Self {
        let page_size = page_size.max(1);
        Self {
            rest: data,
            address: start,
            page_size,
            max_len: policy.max_len(page_size),
            terminator,
            terminated: false,
        }
    }

    /// Whether planning stopped at a terminator byte.
    pub fn terminated(&self) -> bool {
        self.terminated
    }
}

impl<'a> Iterator for Batches<'a> {
    type Item = Batch<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.terminated {
            return None;
        }
        let page_room = self.page_size - self.address % self.page_size;
        let window = self.max_len.min(page_room).min(self.rest.len());
        let terminator_at = self
            .terminator
            .and_then(|t| self.rest[..window].iter().position(|&b| b == t));
        let len = match terminator_at {
            Some(offset) => {
                self.terminated = true;
                offset
            }
            None => window,
        };
        if len == 0 {
            return None;
        }

        let (data, rest) = self.rest.split_at(len);
        self.rest = rest;
        let batch = Batch {
            address: self.address,
            data,
        };
        self.address += len;
        Some(batch)
    }
}

/// Everything one batch needs, in one frame: handshake, start, bulk write of
/// device address, word address and data, stop, and the way back to user mode.
pub fn fused_frame(
    device_address: u8,
    word_address: u8,
    data: &[u8],
    peripherals: Peripherals,
) -> Result<Frame> {
    let mut frame = Frame::from_iter([
        Command::EnterBinary,
        Command::EnterI2c,
        Command::Peripherals(peripherals),
        Command::Start,
        Command::bulk_write(2 + data.len())?,
        Command::Byte(DataPhase::DeviceAddress, bbio::write_address(device_address)),
        Command::Byte(DataPhase::WordAddress, word_address),
    ]);
    frame.extend(
        data.iter()
            .enumerate()
            .map(|(index, &byte)| Command::Byte(DataPhase::Data(index), byte)),
    );
    frame.extend([Command::Stop, Command::LeaveI2c, Command::Reset]);
    Ok(frame)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn lengths(batches: Batches) -> Vec<usize> {
        batches.map(|b| b.data.len()).collect()
    }

    fn half_page(data: &[u8], start: usize) -> Batches<'_> {
        Batches::new(data, start, 16, BatchPolicy::HalfPage, Some(b'\n'))
    }

    #[test]
    fn batch_count_is_ceil_of_eighths() {
        for n in 1..=64 {
            let data = vec![0x55; n];
            let lens = lengths(half_page(&data, 0));
            assert_eq!(lens.len(), n.div_ceil(8), "{n} bytes");
            assert!(lens.iter().all(|len| (1..=8).contains(len)));
            assert_eq!(lens.iter().sum::<usize>(), n);
        }
    }

    #[test]
    fn nine_bytes_make_eight_then_one() {
        let data = b"ABCDEFGHI";
        let batches: Vec<_> = half_page(data, 0).collect();
        assert_eq!(batches[0].address, 0);
        assert_eq!(batches[0].data, b"ABCDEFGH");
        assert_eq!(batches[1].address, 8);
        assert_eq!(batches[1].data, b"I");
    }

    #[test]
    fn terminator_truncates_the_transfer() {
        let data = b"0123456789\nrest";
        let mut batches = half_page(data, 0);
        assert_eq!(batches.next().unwrap().data, b"01234567");
        assert_eq!(batches.next().unwrap().data, b"89");
        assert!(batches.terminated());
        assert!(batches.next().is_none());
    }

    #[test]
    fn leading_terminator_plans_nothing() {
        let mut batches = half_page(b"\nABC", 0);
        assert!(batches.next().is_none());
        assert!(batches.terminated());
    }

    #[test]
    fn terminator_can_be_disabled() {
        let data = b"\n\n\n";
        let batches = Batches::new(data, 0, 16, BatchPolicy::HalfPage, None);
        assert_eq!(lengths(batches), [3]);
    }

    #[test]
    fn unaligned_start_stops_at_page_boundary() {
        let data = [0u8; 20];
        let batches: Vec<_> = half_page(&data, 12).collect();
        let spans: Vec<_> = batches
            .iter()
            .map(|b| (b.address, b.data.len()))
            .collect();
        assert_eq!(spans, [(12, 4), (16, 8), (24, 8)]);
    }

    #[test]
    fn full_page_policy_fills_pages() {
        let data = [0u8; 40];
        let batches = Batches::new(&data, 0, 16, BatchPolicy::FullPage, None);
        // 14 bytes per bulk write at most, then the page boundary at 16.
        let spans: Vec<_> = batches.map(|b| (b.address, b.data.len())).collect();
        assert_eq!(spans, [(0, 14), (14, 2), (16, 14), (30, 2), (32, 8)]);
    }

    #[test]
    fn fused_frame_for_two_bytes() {
        let frame = fused_frame(0x50, 0x00, b"AB", Peripherals::default()).unwrap();
        let mut expected = vec![0u8; 20];
        expected.extend_from_slice(&[
            0x02, 0x4C, 0x02, 0x13, 0xA0, 0x00, 0x41, 0x42, 0x03, 0x00, 0x0F,
        ]);
        assert_eq!(frame.encode(), expected);
        assert_eq!(frame.response_len(), 21 + 2);
        assert!(frame.is_self_closing());
    }

    #[test]
    fn fused_response_is_cut_relative_to_batch_length() {
        let data = [1u8, 2, 3, 4, 5];
        let frame = fused_frame(0x50, 0x10, &data, Peripherals::default()).unwrap();
        let mut response = b"BBIO1I2C1".to_vec();
        response.extend_from_slice(&[0x01, 0x01, 0x01, 0x00, 0x00]);
        response.extend_from_slice(&[0x00; 5]);
        response.push(0x01);
        response.extend_from_slice(b"BBIO1");
        response.push(0x01);
        assert_eq!(response.len(), frame.response_len());

        let echoes = frame.split(&response).unwrap();
        let (stop, stop_echo) = echoes[7 + data.len()];
        assert_eq!(*stop, Command::Stop);
        assert_eq!(stop_echo, [0x01]);
        let (reset, reset_echo) = echoes[echoes.len() - 1];
        assert_eq!(*reset, Command::Reset);
        assert_eq!(reset_echo, [0x01]);
    }

    #[test]
    fn oversized_batch_is_rejected() {
        assert!(matches!(
            fused_frame(0x50, 0, &[0u8; 15], Peripherals::default()),
            Err(Error::BulkWriteLength(17))
        ));
    }
}
