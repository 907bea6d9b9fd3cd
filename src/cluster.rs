//! Meshlet building and cluster bounds generation

use crate::quantize::quantize_snorm;
use crate::util::{dot, normalize, sub};
use crate::vertex::Position;

/// Maximum number of vertices a meshlet can reference.
pub const MESHLET_MAX_VERTICES: usize = Meshlet::VERTICES_COUNT;
/// Default triangle limit per meshlet; the storage capacity of 126 rounded down to a multiple of 4 for packing.
pub const MESHLET_MAX_TRIANGLES: usize = 124;

/// Bounds returned by `compute_cluster/meshlet_bounds`.
///
/// `cone_axis_s8` and `cone_cutoff_s8` are stored in 8-bit SNORM format; decode them using `x/127.0`.
///
/// * Bounding sphere: useful for frustum and occlusion culling
/// * Normal cone: useful for backface culling
///
/// A `cone_cutoff` of 1 (`cone_cutoff_s8` of 127) means the cluster can't be backface culled.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Bounds {
    /// Bounding sphere center
    pub center: [f32; 3],
    /// Bounding sphere radius
    pub radius: f32,
    /// Normal cone apex
    pub cone_apex: [f32; 3],
    /// Normal cone axis
    pub cone_axis: [f32; 3],
    /// Normal cone cutoff
    ///
    /// Can be calculated from angle using `cos(angle/2)`.
    pub cone_cutoff: f32,
    /// Normal cone axis
    pub cone_axis_s8: [i8; 3],
    /// Normal cone cutoff
    pub cone_cutoff_s8: i8,
}

impl Bounds {
    /// Returns `true` if every triangle of the cluster faces away from a perspective camera at `camera_position`.
    ///
    /// Uses `dot(normalize(cone_apex - camera_position), cone_axis) >= cone_cutoff`.
    pub fn cone_culls(&self, camera_position: [f32; 3]) -> bool {
        if self.cone_cutoff >= 1.0 {
            return false;
        }

        let mut view = sub(self.cone_apex, camera_position);

        // a camera at the apex has no view direction
        if normalize(&mut view) == 0.0 {
            return false;
        }

        dot(view, self.cone_axis) >= self.cone_cutoff
    }

    /// Same test as [Bounds::cone_culls], using the 8-bit axis and cutoff.
    ///
    /// Never culls a cluster that [Bounds::cone_culls] keeps.
    pub fn cone_culls_s8(&self, camera_position: [f32; 3]) -> bool {
        if self.cone_cutoff_s8 >= 127 {
            return false;
        }

        let axis = [
            self.cone_axis_s8[0] as f32 / 127.0,
            self.cone_axis_s8[1] as f32 / 127.0,
            self.cone_axis_s8[2] as f32 / 127.0,
        ];

        let mut view = sub(self.cone_apex, camera_position);

        if normalize(&mut view) == 0.0 {
            return false;
        }

        dot(view, axis) >= self.cone_cutoff_s8 as f32 / 127.0
    }

    /// Bounds for a cluster without a single non-degenerate triangle: empty sphere, cone that never culls.
    fn degenerate() -> Self {
        Self {
            cone_cutoff: 1.0,
            cone_cutoff_s8: 127,
            ..Default::default()
        }
    }
}

#[derive(Clone, Debug)]
pub struct Meshlet {
    /// Vertex buffer indices of the vertices used by this meshlet
    pub vertices: [u32; Self::VERTICES_COUNT],
    /// Triangles as indices into `vertices`
    pub indices: [[u8; 3]; Self::TRIANGLES_COUNT],
    pub triangle_count: u8,
    pub vertex_count: u8,
}

impl Meshlet {
    pub const VERTICES_COUNT: usize = 64;
    pub const TRIANGLES_COUNT: usize = 126;

    /// Used part of [Meshlet::vertices].
    pub fn vertices(&self) -> &[u32] {
        &self.vertices[..self.vertex_count as usize]
    }

    /// Used part of [Meshlet::indices].
    pub fn triangles(&self) -> &[[u8; 3]] {
        &self.indices[..self.triangle_count as usize]
    }
}

impl Default for Meshlet {
    fn default() -> Self {
        Meshlet {
            vertices: [0; Self::VERTICES_COUNT],
            indices: [Default::default(); Self::TRIANGLES_COUNT],
            triangle_count: Default::default(),
            vertex_count: Default::default(),
        }
    }
}

/// Computes an approximate bounding sphere of `points`, returned as `[center x, y, z, radius]`.
///
/// Starts from the longest of the three axis-aligned extremum pairs and grows the sphere in a single pass over all points.
pub fn compute_bounding_sphere(points: &[[f32; 3]]) -> [f32; 4] {
    assert!(!points.is_empty());

    // find extremum points along all 3 axes; for each axis we get a pair of points with min/max coordinates
    let mut pmin = [[f32::MAX; 3]; 3];
    let mut pmax = [[f32::MIN; 3]; 3];

    for p in points {
        for axis in 0..3 {
            if p[axis] < pmin[axis][axis] {
                pmin[axis] = *p;
            }
            if p[axis] > pmax[axis][axis] {
                pmax[axis] = *p;
            }
        }
    }

    // find the pair of points with largest distance
    let mut paxisd2 = 0.0;
    let mut paxis = 0;

    for axis in 0..3 {
        let d = sub(pmax[axis], pmin[axis]);
        let d2 = dot(d, d);

        if d2 > paxisd2 {
            paxisd2 = d2;
            paxis = axis;
        }
    }

    // use the longest segment as the initial sphere diameter
    let p1 = pmin[paxis];
    let p2 = pmax[paxis];

    let mut center: [f32; 3] = [(p1[0] + p2[0]) / 2.0, (p1[1] + p2[1]) / 2.0, (p1[2] + p2[2]) / 2.0];
    let mut radius = paxisd2.sqrt() / 2.0;

    // iteratively adjust the sphere up until all points fit
    for p in points {
        let d = sub(*p, center);
        let d2 = dot(d, d);

        if d2 > radius * radius {
            let d = d2.sqrt();
            assert!(d > 0.0);

            let k = 0.5 + (radius / d) / 2.0;

            center[0] = center[0] * k + p[0] * (1.0 - k);
            center[1] = center[1] * k + p[1] * (1.0 - k);
            center[2] = center[2] * k + p[2] * (1.0 - k);
            radius = (radius + d) / 2.0;
        }
    }

    [center[0], center[1], center[2], radius]
}

/// Returns worst case size requirement for [build_meshlets].
pub fn build_meshlets_bound(index_count: usize, max_vertices: usize, max_triangles: usize) -> usize {
    assert!(index_count % 3 == 0);
    assert!(max_vertices >= 3);
    assert!(max_triangles >= 1);

    // meshlet construction is limited by max vertices and max triangles per meshlet
    // the worst case is that the input is an unindexed stream since this equally stresses both limits
    // note that we assume that in the worst case, we leave 2 vertices unpacked in each meshlet - if we have space for 3 we can pack any triangle
    let max_vertices_conservative = max_vertices - 2;
    let meshlet_limit_vertices = index_count.div_ceil(max_vertices_conservative);
    let meshlet_limit_triangles = (index_count / 3).div_ceil(max_triangles);

    meshlet_limit_vertices.max(meshlet_limit_triangles)
}

/// Splits the mesh into a set of meshlets where each meshlet has a micro index buffer indexing into meshlet vertices that refer to the original vertex buffer.
///
/// Triangles are packed greedily in index buffer order; a new meshlet is started whenever the next triangle doesn't fit.
/// The resulting data can be used to render meshes using programmable mesh shading pipelines, or in other cluster-based renderers.
/// For maximum efficiency the index buffer being converted has to be optimized for vertex cache first.
///
/// # Arguments
///
/// * `destination`: must contain enough space for all meshlets, worst case size can be computed with [build_meshlets_bound]
/// * `max_vertices` and `max_triangles`: can't exceed limits statically declared in [Meshlet] (`VERTICES_COUNT` and `TRIANGLES_COUNT`)
pub fn build_meshlets(
    destination: &mut [Meshlet],
    indices: &[u32],
    vertex_count: usize,
    max_vertices: usize,
    max_triangles: usize,
) -> usize {
    assert!(indices.len() % 3 == 0);
    assert!(max_vertices >= 3);
    assert!(max_triangles >= 1);

    assert!(max_vertices <= Meshlet::VERTICES_COUNT);
    assert!(max_triangles <= Meshlet::TRIANGLES_COUNT);

    let mut meshlet = Meshlet::default();

    const UNUSED: u8 = 0xff;

    // index of the vertex in the meshlet, `UNUSED` if the vertex isn't used
    let mut used = vec![UNUSED; vertex_count];

    let mut offset = 0;

    for abc in indices.chunks_exact(3) {
        let [a, b, c] = [abc[0] as usize, abc[1] as usize, abc[2] as usize];

        assert!(a < vertex_count && b < vertex_count && c < vertex_count);

        // a degenerate triangle only needs its distinct vertices
        let used_extra = (used[a] == UNUSED) as usize
            + (b != a && used[b] == UNUSED) as usize
            + (c != a && c != b && used[c] == UNUSED) as usize;

        if meshlet.vertex_count as usize + used_extra > max_vertices || meshlet.triangle_count as usize >= max_triangles {
            for v in meshlet.vertices() {
                used[*v as usize] = UNUSED;
            }

            destination[offset] = std::mem::take(&mut meshlet);
            offset += 1;
        }

        for v in [a, b, c] {
            if used[v] == UNUSED {
                used[v] = meshlet.vertex_count;
                meshlet.vertices[meshlet.vertex_count as usize] = v as u32;
                meshlet.vertex_count += 1;
            }
        }

        meshlet.indices[meshlet.triangle_count as usize] = [used[a], used[b], used[c]];
        meshlet.triangle_count += 1;
    }

    if meshlet.triangle_count > 0 {
        destination[offset] = meshlet;
        offset += 1;
    }

    assert!(offset <= build_meshlets_bound(indices.len(), max_vertices, max_triangles));

    offset
}

/// Creates bounding volumes that can be used for frustum, backface and occlusion culling.
///
/// For backface culling with orthographic projection, use the following formula to reject backfacing clusters:
/// ```glsl
/// dot(view, cone_axis) >= cone_cutoff
/// ```
///
/// For perspective projection, you can the formula that needs cone apex in addition to axis & cutoff:
/// ```glsl
/// dot(normalize(cone_apex - camera_position), cone_axis) >= cone_cutoff
/// ```
///
/// Alternatively, you can use the formula that doesn't need cone apex and uses bounding sphere instead:
/// ```glsl
/// dot(normalize(center - camera_position), cone_axis) >= cone_cutoff + radius / length(center - camera_position)
/// ```
/// or an equivalent formula that doesn't have a singularity at center = camera_position:
/// ```glsl
/// dot(center - camera_position, cone_axis) >= cone_cutoff * length(center - camera_position) + radius
/// ```
///
/// Clusters without a non-degenerate triangle, or with a normal cone of ~168 degrees or wider, get `cone_cutoff = 1`
/// which none of the formulas above can cull.
///
/// # Arguments
///
/// * `indices`: should be smaller than or equal to 256*3 (the function assumes clusters of limited size)
pub fn compute_cluster_bounds<Vertex>(indices: &[u32], vertices: &[Vertex]) -> Bounds
where
    Vertex: Position,
{
    assert!(indices.len() % 3 == 0);
    assert!(indices.len() / 3 <= 256);

    // compute triangle normals and gather triangle corners
    let mut normals: Vec<[f32; 3]> = Vec::with_capacity(indices.len() / 3);
    let mut corners: Vec<[f32; 3]> = Vec::with_capacity(indices.len());

    let vertex_count = vertices.len();

    for abc in indices.chunks_exact(3) {
        let [a, b, c] = [abc[0] as usize, abc[1] as usize, abc[2] as usize];
        assert!(a < vertex_count && b < vertex_count && c < vertex_count);

        let p0 = vertices[a].pos();
        let p1 = vertices[b].pos();
        let p2 = vertices[c].pos();

        let p10 = sub(p1, p0);
        let p20 = sub(p2, p0);

        let mut normal = [
            p10[1] * p20[2] - p10[2] * p20[1],
            p10[2] * p20[0] - p10[0] * p20[2],
            p10[0] * p20[1] - p10[1] * p20[0],
        ];

        let area = normalize(&mut normal);

        // no need to include degenerate triangles - they will be invisible anyway
        if area == 0.0 {
            continue;
        }

        // record triangle normals & corners for future use; normal and corner 0 define a plane equation
        normals.push(normal);
        corners.extend_from_slice(&[p0, p1, p2]);
    }

    // degenerate cluster, no valid triangles => trivial accept
    if normals.is_empty() {
        return Bounds::degenerate();
    }

    // compute cluster bounding sphere; we'll use the center to determine normal cone apex as well
    let psphere = compute_bounding_sphere(&corners);

    let center = [psphere[0], psphere[1], psphere[2]];

    // treating triangle normals as points, find the bounding sphere - the sphere center determines the optimal cone axis
    let nsphere = compute_bounding_sphere(&normals);

    let mut axis = [nsphere[0], nsphere[1], nsphere[2]];
    normalize(&mut axis);

    // compute a tight cone around all normals, mindp = cos(angle/2)
    let mindp = normals.iter().map(|normal| dot(*normal, axis)).fold(1.0f32, f32::min);

    // fill bounding sphere info; note that below we can return bounds without cone information for degenerate cones
    let mut bounds = Bounds::degenerate();
    bounds.center = center;
    bounds.radius = psphere[3];

    // degenerate cluster, normal cone is larger than a hemisphere => trivial accept
    // note that if mindp is positive but close to 0, the triangle intersection code below gets less stable
    // we arbitrarily decide that if a normal cone is ~168 degrees wide or more, the cone isn't useful
    if mindp <= 0.1 {
        return bounds;
    }

    let mut maxt = 0.0f32;

    // we need to find the point on center-t*axis ray that lies in negative half-space of all triangles
    for (normal, corner) in normals.iter().zip(corners.chunks_exact(3)) {
        // dot(center-t*axis-corner, trinormal) = 0
        // dot(center-corner, trinormal) - t * dot(axis, trinormal) = 0
        let dc = dot(sub(center, corner[0]), *normal);
        let dn = dot(axis, *normal);

        // dn should be larger than mindp cutoff above
        assert!(dn > 0.0);
        let t = dc / dn;

        maxt = t.max(maxt);
    }

    // cone apex should be in the negative half-space of all cluster triangles by construction
    bounds.cone_apex = [
        center[0] - axis[0] * maxt,
        center[1] - axis[1] * maxt,
        center[2] - axis[2] * maxt,
    ];

    // note: this axis is the axis of the normal cone, but our test for perspective camera effectively negates the axis
    bounds.cone_axis = axis;

    // cos(a) for normal cone is mindp; we need to add 90 degrees on both sides and invert the cone
    // which gives us -cos(a+90) = -(-sin(a)) = sin(a) = sqrt(1 - cos^2(a))
    bounds.cone_cutoff = (1.0 - mindp * mindp).max(0.0).sqrt();

    // quantize axis & cutoff to 8-bit SNORM format
    bounds.cone_axis_s8 = axis.map(|a| quantize_snorm(a, 8) as i8);

    // for the 8-bit test to be conservative, we need to adjust the cutoff by measuring the max. error
    let axis_error: f32 = (0..3)
        .map(|i| (bounds.cone_axis_s8[i] as f32 / 127.0 - bounds.cone_axis[i]).abs())
        .sum();

    // note that we need to round this up instead of rounding to nearest, hence +1
    let cone_cutoff_s8 = (127.0 * (bounds.cone_cutoff + axis_error) + 1.0) as i32;

    bounds.cone_cutoff_s8 = cone_cutoff_s8.min(127) as i8;

    bounds
}

/// Creates bounding volumes that can be used for frustum, backface and occlusion culling.
///
/// Same as [compute_cluster_bounds] but with meshlets as input.
pub fn compute_meshlet_bounds<Vertex>(meshlet: &Meshlet, vertices: &[Vertex]) -> Bounds
where
    Vertex: Position,
{
    let mut indices = Vec::with_capacity(meshlet.triangle_count as usize * 3);

    for triangle in meshlet.triangles() {
        // note: `compute_cluster_bounds` checks later if the vertices are in range, no need to do it here
        indices.extend(triangle.iter().map(|local| meshlet.vertices[*local as usize]));
    }

    compute_cluster_bounds(&indices, vertices)
}
