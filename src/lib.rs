//! meshlet-prep
//!
//! Turns raw triangle data into a deduplicated, cache-optimized vertex/index buffer pair and partitions it into
//! meshlets with bounding sphere and normal cone data for GPU culling.
//!
//! The individual passes live in their own modules and can be used separately; [pipeline] chains all of them.
//!
//! # Features
//!
//! * `serde`: Derives `Serialize`/`Deserialize` for [pipeline::PipelineConfig] and [cluster::Bounds]

#![allow(clippy::identity_op)]
#![allow(clippy::erasing_op)]

pub mod cluster;
pub mod error;
mod hash;
pub mod index;
pub mod pipeline;
pub mod quantize;
mod util;
pub mod vertex;

use std::ops::Range;

pub use crate::error::{Error, Result};

/// Reserved index value meaning "not assigned yet"; a real vertex index never reaches it.
pub const INVALID_INDEX: u32 = u32::MAX;

/// A stream of value groups which are meant to be used together (e.g. 3 floats representing a vertex position).
pub struct Stream<'a> {
    data: &'a [u8],
    stride: usize,
    subset: Range<usize>,
}

impl<'a> Stream<'a> {
    /// Creates a stream from a slice.
    ///
    /// # Example
    ///
    /// ```
    /// use meshlet_prep::Stream;
    ///
    /// let positions = vec![[1.0f32, 2.0, 3.0], [2.0, 3.0, 4.0], [5.0, 6.0, 7.0]];
    /// let stream = Stream::from_slice(&positions);
    ///
    /// assert_eq!(stream.len(), positions.len());
    /// ```
    pub fn from_slice<T: bytemuck::Pod>(slice: &'a [T]) -> Self {
        let value_size = std::mem::size_of::<T>();

        Self::from_bytes(bytemuck::cast_slice(slice), value_size, 0..value_size)
    }

    /// Creates a stream from a slice with the given byte subset.
    ///
    /// # Arguments
    ///
    /// * `subset`: subset of bytes to use inside a `T`
    ///
    /// # Example
    ///
    /// ```
    /// use meshlet_prep::Stream;
    /// use meshlet_prep::vertex::PackedVertex;
    ///
    /// let vertices = vec![PackedVertex::default(); 2];
    /// let position_stream = Stream::from_slice_with_subset(&vertices, 0..12);
    ///
    /// assert_eq!(position_stream.len(), 2);
    /// ```
    pub fn from_slice_with_subset<T: bytemuck::Pod>(slice: &'a [T], subset: Range<usize>) -> Self {
        let value_size = std::mem::size_of::<T>();

        Self::from_bytes(bytemuck::cast_slice(slice), value_size, subset)
    }

    /// Creates a stream from raw bytes.
    ///
    /// # Arguments
    ///
    /// * `stride`: stride between value groups in bytes
    /// * `subset`: byte subset to use inside a value group
    pub fn from_bytes(data: &'a [u8], stride: usize, subset: Range<usize>) -> Self {
        assert!(stride > 0);
        assert!(subset.start <= subset.end && subset.end <= stride);
        assert_eq!(data.len() % stride, 0);

        Self { data, stride, subset }
    }

    pub(crate) fn get(&self, index: usize) -> &'a [u8] {
        let i = index * self.stride;
        &self.data[i + self.subset.start..i + self.subset.end]
    }

    /// Returns length of the stream in value groups.
    pub fn len(&self) -> usize {
        self.data.len() / self.stride
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_stream_subset() {
        let data: [[u32; 2]; 3] = [[1, 10], [2, 20], [3, 10]];

        let full = Stream::from_slice(&data);
        let second = Stream::from_slice_with_subset(&data, 4..8);

        assert_eq!(full.len(), 3);
        assert_eq!(second.len(), 3);
        assert_eq!(second.get(0), second.get(2));
        assert_ne!(full.get(0), full.get(2));
    }

    #[test]
    #[should_panic]
    fn test_stream_subset_out_of_stride() {
        let data = [0u8; 8];
        Stream::from_bytes(&data, 4, 2..6);
    }
}
