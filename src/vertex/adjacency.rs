//! Vertex to triangle adjacency

/// Per-vertex triangle lists in compressed sparse row form.
///
/// Triangles adjacent to vertex `v` are `data[offsets[v]..offsets[v] + counts[v]]`.
/// Consumers may shrink a list by swapping the removed entry with the last one and decrementing `counts[v]`.
#[derive(Default, Debug)]
pub struct TriangleAdjacency {
    pub counts: Vec<u32>,
    pub offsets: Vec<u32>,
    pub data: Vec<u32>,
}

impl TriangleAdjacency {
    /// Triangles currently adjacent to `vertex`.
    #[inline]
    pub fn triangles(&self, vertex: usize) -> &[u32] {
        let offset = self.offsets[vertex] as usize;
        &self.data[offset..offset + self.counts[vertex] as usize]
    }

    /// Removes `triangle` from the list of `vertex`; the order of the remaining entries isn't preserved.
    ///
    /// Returns `false` if the triangle wasn't in the list.
    pub fn remove(&mut self, vertex: usize, triangle: u32) -> bool {
        let offset = self.offsets[vertex] as usize;
        let count = self.counts[vertex] as usize;
        let neighbours = &mut self.data[offset..offset + count];

        match neighbours.iter().position(|t| *t == triangle) {
            Some(i) => {
                neighbours[i] = neighbours[count - 1];
                self.counts[vertex] -= 1;
                true
            }
            None => false,
        }
    }
}

/// Builds triangle adjacency for `indices`.
///
/// Meshes with more vertices than indices take a path that never touches unreferenced vertices.
pub fn build_triangle_adjacency(adjacency: &mut TriangleAdjacency, indices: &[u32], vertex_count: usize) {
    assert!(indices.len() % 3 == 0);
    assert!(indices.iter().all(|i| (*i as usize) < vertex_count));

    if vertex_count > indices.len() {
        build_triangle_adjacency_sparse(adjacency, indices, vertex_count);
    } else {
        build_triangle_adjacency_dense(adjacency, indices, vertex_count);
    }
}

fn build_triangle_adjacency_dense(adjacency: &mut TriangleAdjacency, indices: &[u32], vertex_count: usize) {
    adjacency.counts = vec![0; vertex_count];
    adjacency.offsets = vec![0; vertex_count];
    adjacency.data = vec![0; indices.len()];

    // fill triangle counts
    for index in indices {
        adjacency.counts[*index as usize] += 1;
    }

    // fill offset table
    let mut offset = 0;

    for (o, count) in adjacency.offsets.iter_mut().zip(adjacency.counts.iter()) {
        *o = offset;
        offset += *count;
    }

    assert_eq!(offset as usize, indices.len());

    // fill triangle data
    for (i, abc) in indices.chunks_exact(3).enumerate() {
        for v in abc {
            let o = &mut adjacency.offsets[*v as usize];
            adjacency.data[*o as usize] = i as u32;
            *o += 1;
        }
    }

    // fix offsets that have been disturbed by the previous pass
    for (o, count) in adjacency.offsets.iter_mut().zip(adjacency.counts.iter()) {
        assert!(*o >= *count);
        *o -= *count;
    }
}

fn build_triangle_adjacency_sparse(adjacency: &mut TriangleAdjacency, indices: &[u32], vertex_count: usize) {
    // unused vertices are never visited; the high bit marks vertices whose offset was already assigned
    const SPARSE_SEEN: u32 = 1 << 31;
    assert!(indices.len() < SPARSE_SEEN as usize);

    adjacency.counts = vec![0; vertex_count];
    adjacency.offsets = vec![0; vertex_count];
    adjacency.data = vec![0; indices.len()];

    // fill triangle counts
    for index in indices {
        adjacency.counts[*index as usize] += 1;
    }

    // fill offset table in order of first reference
    let mut offset = 0;

    for index in indices {
        let v = *index as usize;

        if adjacency.counts[v] & SPARSE_SEEN == 0 {
            adjacency.offsets[v] = offset;
            offset += adjacency.counts[v];
            adjacency.counts[v] |= SPARSE_SEEN;
        }
    }

    assert_eq!(offset as usize, indices.len());

    // fill triangle data
    for (i, abc) in indices.chunks_exact(3).enumerate() {
        for v in abc {
            let o = &mut adjacency.offsets[*v as usize];
            adjacency.data[*o as usize] = i as u32;
            *o += 1;
        }
    }

    // fix offsets that have been disturbed by the previous pass
    // also clear the marker bit from the counts of visited vertices
    for index in indices {
        let v = *index as usize;

        if adjacency.counts[v] & SPARSE_SEEN != 0 {
            adjacency.counts[v] &= !SPARSE_SEEN;

            assert!(adjacency.offsets[v] >= adjacency.counts[v]);
            adjacency.offsets[v] -= adjacency.counts[v];
        }
    }
}
