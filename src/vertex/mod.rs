pub mod adjacency;
pub mod cache;
pub mod fetch;

use bytemuck::{Pod, Zeroable};
use static_assertions::const_assert_eq;

use crate::quantize::{dequantize_half, quantize_half, quantize_snorm};

pub use adjacency::{TriangleAdjacency, build_triangle_adjacency};

pub trait Position {
    fn pos(&self) -> [f32; 3];
}

impl Position for [f32; 3] {
    #[inline]
    fn pos(&self) -> [f32; 3] {
        *self
    }
}

/// Vertex record handed to the renderer: full precision position, 8-bit SNORM normal and half precision texture coordinates.
///
/// The fourth normal component is padding and is always zero, so two vertices are equal exactly when their bytes are.
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct PackedVertex {
    pub position: [f32; 3],
    pub normal: [i8; 4],
    pub uv: [u16; 2],
}

const_assert_eq!(std::mem::size_of::<PackedVertex>(), 20);
const_assert_eq!(std::mem::align_of::<PackedVertex>(), 4);

impl PackedVertex {
    pub fn new(position: [f32; 3], normal: [f32; 3], uv: [f32; 2]) -> Self {
        Self {
            position,
            normal: [
                quantize_snorm(normal[0], 8) as i8,
                quantize_snorm(normal[1], 8) as i8,
                quantize_snorm(normal[2], 8) as i8,
                0,
            ],
            uv: [quantize_half(uv[0]), quantize_half(uv[1])],
        }
    }

    /// Decoded normal; not renormalized.
    pub fn normal(&self) -> [f32; 3] {
        [
            self.normal[0] as f32 / 127.0,
            self.normal[1] as f32 / 127.0,
            self.normal[2] as f32 / 127.0,
        ]
    }

    pub fn uv(&self) -> [f32; 2] {
        [dequantize_half(self.uv[0]), dequantize_half(self.uv[1])]
    }
}

impl Position for PackedVertex {
    #[inline]
    fn pos(&self) -> [f32; 3] {
        self.position
    }
}
