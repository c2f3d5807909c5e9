// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The image decoder seam used by pattern fills.

use alloc::sync::Arc;
use core::fmt;

use thiserror::Error;

use crate::draw_buf::{ColorFormat, DrawBuf};

/// Reference to an image a pattern samples.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ImageSrc {
    /// Image addressed by a path or name the decoder understands.
    File(Arc<str>),
    /// Already-decoded pixels.
    Buffer(Arc<DrawBuf>),
}

/// Options for [`ImageDecoder::open`].
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct DecoderArgs {
    /// Request premultiplied alpha in the decoded pixels.
    pub premultiply: bool,
}

impl DecoderArgs {
    /// Arguments requesting premultiplied output.
    pub const PREMULTIPLIED: Self = Self { premultiply: true };
}

/// Errors from opening or preparing a pattern image.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// The decoder could not open the source.
    #[error("image source could not be opened")]
    Open,
    /// The source opened but has no decoded pixels yet.
    #[error("image is not decoded yet")]
    NotReady,
    /// The decoded pixels are not premultiplied 32-bit.
    #[error("unsupported pattern color format {0:?}")]
    UnsupportedFormat(ColorFormat),
    /// Repacking to the required stride failed.
    #[error("could not adjust stride {stride} to {required}")]
    Stride {
        /// Stride of the decoded image.
        stride: u32,
        /// Stride that was requested.
        required: u32,
    },
    /// The decoded data is shorter than its header claims.
    #[error("decoded image needs {needed} bytes but holds {len}")]
    Truncated {
        /// Bytes required.
        needed: usize,
        /// Bytes available.
        len: usize,
    },
}

/// Decodes images referenced by pattern paints.
///
/// Every successful [`ImageDecoder::open`], including one that returns
/// `Ok(None)`, is paired with exactly one [`ImageDecoder::close`] for the
/// same source.
pub trait ImageDecoder {
    /// Open `src`. `Ok(None)` means the image exists but is not decoded yet.
    fn open(&mut self, src: &ImageSrc, args: &DecoderArgs) -> Result<Option<DrawBuf>, DecodeError>;

    /// Repack `buf` to `stride` bytes per row.
    fn adjust_stride(&mut self, buf: &mut DrawBuf, stride: u32) -> Result<(), DecodeError> {
        let old = buf.stride();
        buf.adjust_stride(stride).map_err(|_| DecodeError::Stride {
            stride: old,
            required: stride,
        })
    }

    /// Release whatever [`ImageDecoder::open`] acquired for `src`.
    fn close(&mut self, src: &ImageSrc);
}

/// An open image. Closes the source when dropped.
pub struct DecoderSession<'a, D: ImageDecoder + ?Sized> {
    decoder: &'a mut D,
    src: &'a ImageSrc,
    decoded: Option<DrawBuf>,
}

impl<'a, D: ImageDecoder + ?Sized> DecoderSession<'a, D> {
    /// Open `src` through `decoder`.
    pub fn open(
        decoder: &'a mut D,
        src: &'a ImageSrc,
        args: &DecoderArgs,
    ) -> Result<Self, DecodeError> {
        let decoded = decoder.open(src, args)?;
        Ok(Self {
            decoder,
            src,
            decoded,
        })
    }

    /// The decoded pixels, if any.
    #[inline]
    pub fn decoded(&self) -> Option<&DrawBuf> {
        self.decoded.as_ref()
    }

    /// Repack the decoded pixels through the decoder.
    pub fn adjust_stride(&mut self, stride: u32) -> Result<(), DecodeError> {
        match self.decoded.as_mut() {
            Some(buf) => self.decoder.adjust_stride(buf, stride),
            None => Err(DecodeError::NotReady),
        }
    }
}

impl<D: ImageDecoder + ?Sized> Drop for DecoderSession<'_, D> {
    fn drop(&mut self) {
        self.decoder.close(self.src);
    }
}

impl<D: ImageDecoder + ?Sized> fmt::Debug for DecoderSession<'_, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecoderSession")
            .field("src", &self.src)
            .field("decoded", &self.decoded.as_ref().map(|b| b.header))
            .finish_non_exhaustive()
    }
}
