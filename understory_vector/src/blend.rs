// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Source-over compositing of premultiplied 32-bit rows.
//!
//! Sources are B, G, R, A bytes with premultiplied alpha. A source pixel
//! with zero alpha leaves the destination pixel untouched.

use crate::paint::{OPA_COVER, mix_opa};

/// Composite one premultiplied pixel over another, both B, G, R, A.
#[inline]
pub fn src_over_pixel(dst: &mut [u8; 4], src: [u8; 4]) {
    match src[3] {
        0 => {}
        OPA_COVER => *dst = src,
        a => {
            let inv = OPA_COVER - a;
            for (d, s) in dst.iter_mut().zip(src) {
                *d = s.saturating_add(mix_opa(*d, inv));
            }
        }
    }
}

/// Composite a premultiplied row over a premultiplied 32-bit row.
///
/// Pixels past the shorter of the two rows are ignored.
pub fn blend_row_to_argb8888(dst: &mut [u8], src: &[u8]) {
    for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
        let mut px = [d[0], d[1], d[2], d[3]];
        src_over_pixel(&mut px, [s[0], s[1], s[2], s[3]]);
        d.copy_from_slice(&px);
    }
}

/// Composite a premultiplied row over a 24-bit B, G, R row.
///
/// The destination is treated as opaque.
pub fn blend_row_to_rgb888(dst: &mut [u8], src: &[u8]) {
    for (d, s) in dst.chunks_exact_mut(3).zip(src.chunks_exact(4)) {
        let mut px = [d[0], d[1], d[2], OPA_COVER];
        src_over_pixel(&mut px, [s[0], s[1], s[2], s[3]]);
        d.copy_from_slice(&px[..3]);
    }
}

/// Composite a premultiplied row over a little-endian RGB565 row.
///
/// The destination is treated as opaque. Channels are widened by bit
/// replication and narrowed by truncation.
pub fn blend_row_to_rgb565(dst: &mut [u8], src: &[u8]) {
    for (d, s) in dst.chunks_exact_mut(2).zip(src.chunks_exact(4)) {
        if s[3] == 0 {
            continue;
        }
        let [b, g, r] = unpack_565(u16::from_le_bytes([d[0], d[1]]));
        let mut px = [b, g, r, OPA_COVER];
        src_over_pixel(&mut px, [s[0], s[1], s[2], s[3]]);
        d.copy_from_slice(&pack_565([px[0], px[1], px[2]]).to_le_bytes());
    }
}

/// Expand RGB565 to 8-bit B, G, R.
#[inline]
#[expect(
    clippy::cast_possible_truncation,
    reason = "each channel is masked to at most 6 bits"
)]
fn unpack_565(v: u16) -> [u8; 3] {
    let r5 = ((v >> 11) & 0x1f) as u8;
    let g6 = ((v >> 5) & 0x3f) as u8;
    let b5 = (v & 0x1f) as u8;
    [(b5 << 3) | (b5 >> 2), (g6 << 2) | (g6 >> 4), (r5 << 3) | (r5 >> 2)]
}

/// Narrow 8-bit B, G, R to RGB565.
#[inline]
fn pack_565([b, g, r]: [u8; 3]) -> u16 {
    (u16::from(r >> 3) << 11) | (u16::from(g >> 2) << 5) | u16::from(b >> 3)
}
