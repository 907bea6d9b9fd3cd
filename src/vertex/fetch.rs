//! Vertex fetch analysis and optimization

use crate::INVALID_INDEX;
use crate::index::generator::{remap_index_buffer, remap_vertex_buffer};

/// Size of a memory transaction in the fetch model.
pub const FETCH_LINE: usize = 64;
/// Number of lines in the simulated direct mapped cache (128 KiB).
const FETCH_CACHE_LINES: usize = 2048;

#[derive(Default, Debug, Clone, PartialEq)]
pub struct VertexFetchStatistics {
    /// Vertices referenced at least once
    pub unique_vertices: usize,
    /// Bytes moved from memory, a multiple of [FETCH_LINE]
    pub bytes_fetched: u64,
    /// `bytes_fetched` / bytes of the referenced vertices; 1.0 when every byte is fetched exactly once
    pub overfetch: f32,
}

/// Estimates the memory traffic of fetching vertices in index order through a direct mapped cache of 64 byte lines.
///
/// The model is coarse and only meant for comparing orderings of the same mesh.
pub fn analyze_vertex_fetch(indices: &[u32], vertex_count: usize, vertex_size: usize) -> VertexFetchStatistics {
    assert!(indices.len() % 3 == 0);
    assert!(vertex_size > 0);

    // each slot holds the resident line address + 1, so that 0 means empty
    let mut lines = vec![0u64; FETCH_CACHE_LINES];
    let mut referenced = vec![false; vertex_count];
    let mut missed_lines = 0u64;

    for index in indices {
        let index = *index as usize;
        assert!(index < vertex_count);

        referenced[index] = true;

        let first_line = (index as u64 * vertex_size as u64) / FETCH_LINE as u64;
        let end_line = ((index as u64 + 1) * vertex_size as u64).div_ceil(FETCH_LINE as u64);

        for line in first_line..end_line {
            let slot = &mut lines[(line % FETCH_CACHE_LINES as u64) as usize];

            if *slot != line + 1 {
                *slot = line + 1;
                missed_lines += 1;
            }
        }
    }

    let unique_vertices = referenced.iter().filter(|r| **r).count();
    let bytes_fetched = missed_lines * FETCH_LINE as u64;

    let overfetch = if unique_vertices == 0 {
        0.0
    } else {
        (bytes_fetched as f64 / (unique_vertices as f64 * vertex_size as f64)) as f32
    };

    VertexFetchStatistics {
        unique_vertices,
        bytes_fetched,
        overfetch,
    }
}

/// Generates a remap table that puts vertices in the order in which `indices` first references them.
///
/// Returns the number of referenced vertices; unreferenced ones keep [INVALID_INDEX].
/// Apply the table to every vertex stream with [remap_vertex_buffer] and to the indices with [remap_index_buffer].
///
/// # Arguments
///
/// * `destination`: must contain enough space for the resulting remap table (`vertex_count` elements)
pub fn optimize_vertex_fetch_remap(destination: &mut [u32], indices: &[u32], vertex_count: usize) -> usize {
    assert!(indices.len() % 3 == 0);

    let remap = &mut destination[..vertex_count];
    remap.fill(INVALID_INDEX);

    let mut next_vertex = 0u32;

    for index in indices {
        assert!((*index as usize) < vertex_count);

        let slot = &mut remap[*index as usize];

        if *slot == INVALID_INDEX {
            *slot = next_vertex;
            next_vertex += 1;
        }
    }

    next_vertex as usize
}

/// Reorders a single vertex stream into first-use order and rewrites `indices` to match.
///
/// Returns the number of vertices written to `destination`; unreferenced vertices are dropped.
/// For multiple vertex streams use [optimize_vertex_fetch_remap] and remap each stream.
///
/// # Arguments
///
/// * `destination`: must contain enough space for the resulting vertex buffer (`vertices.len()` elements)
pub fn optimize_vertex_fetch<Vertex>(destination: &mut [Vertex], indices: &mut [u32], vertices: &[Vertex]) -> usize
where
    Vertex: Copy,
{
    let mut remap = vec![INVALID_INDEX; vertices.len()];
    let unique = optimize_vertex_fetch_remap(&mut remap, indices, vertices.len());

    remap_vertex_buffer(&mut destination[..unique], vertices, &remap);
    remap_index_buffer(indices, &remap);

    unique
}
