//! Vertex deduplication and index/vertex buffer remapping

use crate::hash::{HashTable, hash_bytes};
use crate::{INVALID_INDEX, Stream};

/// Generates a vertex remap table from the vertex buffer and an optional index buffer and returns number of unique vertices.
///
/// As a result, all vertices that are binary equivalent map to the same (new) location, with no gaps in the resulting sequence.
/// New locations are handed out in order of first occurrence, so identical input always produces an identical table.
/// Resulting remap table maps old vertices to new vertices and can be used in [remap_vertex_buffer]/[remap_index_buffer].
/// Vertices that are never referenced by `indices` keep [INVALID_INDEX].
///
/// Note that binary equivalence considers all `Stream::subset` bytes, including padding which should be zero-initialized.
///
/// # Arguments
///
/// * `destination`: must contain enough space for the resulting remap table (`vertex_count` elements defined by `vertices`)
/// * `indices`: can be `None` if the input is unindexed
pub fn generate_vertex_remap(destination: &mut [u32], indices: Option<&[u32]>, vertices: &Stream) -> usize {
    let vertex_count = vertices.len();

    let index_count = match indices {
        Some(buffer) => buffer.len(),
        None => vertex_count,
    };
    assert_eq!(index_count % 3, 0);
    assert!(vertex_count < INVALID_INDEX as usize);

    let destination = &mut destination[..vertex_count];
    destination.fill(INVALID_INDEX);

    let mut table = HashTable::with_capacity(vertex_count);

    let mut next_vertex = 0;

    for i in 0..index_count {
        let index = match indices {
            Some(buffer) => buffer[i] as usize,
            None => i,
        };
        assert!(index < vertex_count);

        if destination[index] != INVALID_INDEX {
            continue;
        }

        let vertex = vertices.get(index);

        match table.find_or_insert(index as u32, hash_bytes(vertex), |item| {
            vertices.get(item as usize) == vertex
        }) {
            Some(existing) => {
                let value = destination[existing as usize];
                assert!(value != INVALID_INDEX);

                destination[index] = value;
            }
            None => {
                destination[index] = next_vertex as u32;
                next_vertex += 1;
            }
        }
    }

    assert!(next_vertex <= vertex_count);

    next_vertex
}

/// Generates vertex buffer from the source vertex buffer and remap table generated by [generate_vertex_remap].
///
/// # Arguments
///
/// * `destination`: must contain enough space for the resulting vertex buffer (`unique_vertex_count` elements, returned by [generate_vertex_remap])
/// * `vertices`: should have the initial vertex count and not the value returned by [generate_vertex_remap]
pub fn remap_vertex_buffer<Vertex>(destination: &mut [Vertex], vertices: &[Vertex], remap: &[u32])
where
    Vertex: Copy,
{
    assert_eq!(remap.len(), vertices.len());

    for (src, dst) in remap.iter().enumerate() {
        if *dst != INVALID_INDEX {
            destination[*dst as usize] = vertices[src];
        }
    }
}

/// Remaps indices in-place based on the remap table generated by [generate_vertex_remap].
pub fn remap_index_buffer(indices: &mut [u32], remap: &[u32]) {
    assert_eq!(indices.len() % 3, 0);

    for v in indices {
        let value = remap[*v as usize];
        assert!(value != INVALID_INDEX);

        *v = value;
    }
}

/// Writes `remap[indices[i]]` into `destination[i]` for every index.
///
/// # Arguments
///
/// * `destination`: must contain enough space for the resulting index buffer (`indices.len()` elements)
pub fn remap_index_buffer_into(destination: &mut [u32], indices: &[u32], remap: &[u32]) {
    assert_eq!(indices.len() % 3, 0);
    assert!(destination.len() >= indices.len());

    for (dst, v) in destination.iter_mut().zip(indices) {
        let value = remap[*v as usize];
        assert!(value != INVALID_INDEX);

        *dst = value;
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn test_remap_unindexed() {
        const VB: [[f32; 3]; 6] = [
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, 1.0, 0.0],
            [1.0, 0.0, 0.0],
            [1.0, 1.0, 0.0],
        ];

        let mut remap = [0u32; 6];
        let unique = generate_vertex_remap(&mut remap, None, &Stream::from_slice(&VB));

        assert_eq!(unique, 4);
        assert_eq!(remap, [0, 1, 2, 2, 1, 3]);
    }

    #[test]
    fn test_remap_indexed_skips_unreferenced() {
        const VB: [[f32; 3]; 5] = [
            [9.0, 9.0, 9.0],
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [1.0, 0.0, 0.0],
        ];
        const IB: [u32; 6] = [3, 2, 1, 1, 4, 3];

        let mut remap = [0u32; 5];
        let unique = generate_vertex_remap(&mut remap, Some(&IB[..]), &Stream::from_slice(&VB));

        // compact indices follow the order in which vertices are first referenced
        assert_eq!(unique, 3);
        assert_eq!(remap, [INVALID_INDEX, 2, 1, 0, 1]);
    }

    #[test]
    fn test_remap_subset() {
        // only the first component takes part in the comparison
        let vb: [[u32; 2]; 6] = [[1, 0], [2, 0], [3, 0], [1, 1], [2, 2], [4, 3]];

        let mut remap = [0u32; 6];
        let unique = generate_vertex_remap(&mut remap, None, &Stream::from_slice_with_subset(&vb, 0..4));

        assert_eq!(unique, 4);
        assert_eq!(remap, [0, 1, 2, 0, 1, 3]);
    }

    #[test]
    fn test_remap_empty() {
        let vb: [[f32; 3]; 0] = [];
        let ib: [u32; 0] = [];
        let mut remap: [u32; 0] = [];

        assert_eq!(generate_vertex_remap(&mut remap, None, &Stream::from_slice(&vb)), 0);
        assert_eq!(generate_vertex_remap(&mut remap, Some(&ib[..]), &Stream::from_slice(&vb)), 0);
    }

    #[test]
    #[should_panic]
    fn test_remap_out_of_range() {
        let vb = [[0.0f32; 3]; 3];
        let ib = [0u32, 1, 3];
        let mut remap = [0u32; 3];

        generate_vertex_remap(&mut remap, Some(&ib[..]), &Stream::from_slice(&vb));
    }

    #[test]
    fn test_remap_vertex_buffer() {
        let vb = [10, 20, 30, 40];
        let remap = [1, INVALID_INDEX, 0, 1];

        let mut result = [0; 2];
        remap_vertex_buffer(&mut result, &vb, &remap);

        assert_eq!(result, [30, 40]);
    }

    #[test]
    fn test_remap_index_buffer() {
        let remap = [2, 0, 1, INVALID_INDEX];
        let ib = [0, 1, 2, 2, 1, 0];

        let mut copied = [0u32; 6];
        remap_index_buffer_into(&mut copied, &ib, &remap);

        let mut in_place = ib;
        remap_index_buffer(&mut in_place, &remap);

        assert_eq!(in_place, [2, 0, 1, 1, 0, 2]);
        assert_eq!(copied, in_place);
    }

    #[test]
    #[should_panic]
    fn test_remap_index_buffer_unassigned() {
        let mut ib = [0, 1, 3];
        remap_index_buffer(&mut ib, &[0, 1, 2, INVALID_INDEX]);
    }

    #[test]
    fn test_remap_random_roundtrip() {
        let mut rng = StdRng::seed_from_u64(7);

        // small palette so that plenty of duplicates show up
        let palette: Vec<[f32; 3]> = (0..20).map(|i| [i as f32, (i % 3) as f32, 0.5]).collect();
        let vb: Vec<[f32; 3]> = (0..300).map(|_| palette[rng.gen_range(0..palette.len())]).collect();

        let mut remap = vec![0u32; vb.len()];
        let unique = generate_vertex_remap(&mut remap, None, &Stream::from_slice(&vb));

        let mut compact = vec![[0.0f32; 3]; unique];
        remap_vertex_buffer(&mut compact, &vb, &remap);

        for i in 0..vb.len() {
            for j in 0..vb.len() {
                assert_eq!(vb[i] == vb[j], remap[i] == remap[j]);
            }

            // expanding through the remap table reproduces the original stream
            assert_eq!(compact[remap[i] as usize], vb[i]);
        }

        // first occurrences get increasing slots
        let mut next = 0;
        for slot in &remap {
            assert!(*slot <= next);
            if *slot == next {
                next += 1;
            }
        }
        assert_eq!(next as usize, unique);
    }
}
