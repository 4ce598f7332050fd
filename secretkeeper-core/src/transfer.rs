// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Transfer engine: bounded, offset-addressed copies between caller regions
//! and the slot.
//!
//! Authorization happened at open time; nothing here looks at the owner.
//! Every copy is clamped so an offset at or past the end moves zero bytes
//! instead of touching memory outside the slot.

use crate::error::{KeeperError, KeeperResult};
use crate::slot::SecretSlot;
use crate::types::TransferOp;

/// Copy between `regions` and the slot starting at byte `position`.
///
/// Regions are consumed in order, each continuing where the previous one
/// stopped. Writes are clamped to the slot capacity, reads to the content
/// written so far. Returns the total number of bytes moved, which may be
/// less than the regions could hold.
pub fn transfer(
    slot: &mut SecretSlot,
    op: TransferOp,
    position: u64,
    regions: &mut [&mut [u8]],
) -> KeeperResult<usize> {
    if let TransferOp::Unknown(opcode) = op {
        tracing::warn!(opcode, "Unsupported transfer opcode");
        return Err(KeeperError::InvalidOperation { opcode });
    }

    if regions.len() > 1 {
        tracing::debug!(regions = regions.len(), "Vectored transfer");
    }

    // Offsets that do not fit a usize are past any possible end.
    let mut offset = usize::try_from(position).unwrap_or(usize::MAX);
    let mut moved = 0;

    for region in regions.iter_mut() {
        if region.is_empty() {
            continue;
        }
        let n = match op {
            TransferOp::Write => scatter(slot, offset, region),
            TransferOp::Read => gather(slot, offset, region),
            TransferOp::Unknown(_) => 0,
        };
        if n == 0 {
            break;
        }
        offset += n;
        moved += n;
    }

    tracing::debug!(
        op = ?op,
        offset = position,
        bytes = moved,
        "Transfer complete"
    );

    Ok(moved)
}

/// Number of bytes that can move at `offset` given `limit` and a request.
fn clamp(limit: usize, offset: usize, requested: usize) -> usize {
    limit.saturating_sub(offset).min(requested)
}

fn scatter(slot: &mut SecretSlot, offset: usize, src: &[u8]) -> usize {
    let n = clamp(slot.capacity(), offset, src.len());
    if n == 0 {
        return 0;
    }
    slot.buffer_mut()[offset..offset + n].copy_from_slice(&src[..n]);
    slot.extend_content(offset + n);
    n
}

fn gather(slot: &SecretSlot, offset: usize, dst: &mut [u8]) -> usize {
    let n = clamp(slot.content_len(), offset, dst.len());
    if n == 0 {
        return 0;
    }
    dst[..n].copy_from_slice(&slot.bytes()[offset..offset + n]);
    n
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Capacity;

    fn slot(bytes: usize) -> SecretSlot {
        SecretSlot::new(Capacity::new(bytes).unwrap())
    }

    fn write(slot: &mut SecretSlot, position: u64, data: &[u8]) -> usize {
        let mut data = data.to_vec();
        transfer(slot, TransferOp::Write, position, &mut [&mut data[..]]).unwrap()
    }

    #[test]
    fn test_write_then_read() {
        let mut slot = slot(8);
        assert_eq!(write(&mut slot, 0, b"hello"), 5);
        assert_eq!(slot.content_len(), 5);
        assert_eq!(slot.bytes(), b"hello\0\0\0");

        let mut out = [0u8; 8];
        let n = transfer(&mut slot, TransferOp::Read, 0, &mut [&mut out[..]]).unwrap();
        assert_eq!(n, 5);
        assert_eq!(&out[..n], b"hello");
    }

    #[test]
    fn test_write_clamped_to_capacity() {
        let mut slot = slot(4);
        assert_eq!(write(&mut slot, 2, b"abcdef"), 2);
        assert_eq!(slot.bytes(), b"\0\0ab");
        assert_eq!(slot.content_len(), 4);
    }

    #[test]
    fn test_offset_past_end_moves_nothing() {
        let mut slot = slot(4);
        assert_eq!(write(&mut slot, 4, b"x"), 0);
        assert_eq!(write(&mut slot, u64::MAX, b"x"), 0);
        assert!(slot.is_zeroed());

        write(&mut slot, 0, b"ab");
        let mut out = [7u8; 4];
        let n = transfer(&mut slot, TransferOp::Read, 2, &mut [&mut out[..]]).unwrap();
        assert_eq!(n, 0);
        assert_eq!(out, [7u8; 4]);
        assert_eq!(&slot.bytes()[..2], b"ab");
    }

    #[test]
    fn test_partial_reads_at_offsets() {
        let mut slot = slot(16);
        write(&mut slot, 0, b"secret");

        let mut out = [0u8; 3];
        let n = transfer(&mut slot, TransferOp::Read, 3, &mut [&mut out[..]]).unwrap();
        assert_eq!(&out[..n], b"ret");
    }

    #[test]
    fn test_unknown_opcode_rejected() {
        let mut slot = slot(4);
        let mut data = *b"ab";
        let err = transfer(&mut slot, TransferOp::Unknown(7), 0, &mut [&mut data[..]])
            .unwrap_err();
        assert_eq!(err, KeeperError::InvalidOperation { opcode: 7 });
        assert!(slot.is_zeroed());
    }

    #[test]
    fn test_vectored_regions_are_contiguous() {
        let mut slot = slot(8);
        let mut a = *b"abc";
        let mut gap = [0u8; 0];
        let mut b = *b"defgh";
        let mut c = *b"ij";
        let n = transfer(
            &mut slot,
            TransferOp::Write,
            0,
            &mut [&mut a[..], &mut gap[..], &mut b[..], &mut c[..]],
        )
        .unwrap();
        assert_eq!(n, 8);
        assert_eq!(slot.bytes(), b"abcdefgh");

        let mut x = [0u8; 2];
        let mut gap = [0u8; 0];
        let mut y = [0u8; 10];
        let n = transfer(
            &mut slot,
            TransferOp::Read,
            1,
            &mut [&mut x[..], &mut gap[..], &mut y[..]],
        )
        .unwrap();
        assert_eq!(n, 7);
        assert_eq!(&x, b"bc");
        assert_eq!(&y[..5], b"defgh");
    }

    #[test]
    fn test_empty_region_list() {
        let mut slot = slot(4);
        assert_eq!(transfer(&mut slot, TransferOp::Write, 0, &mut []).unwrap(), 0);
    }
}
