//! End-to-end mesh preparation: deduplication, cache and fetch optimization, meshlets and their bounds
//!
//! # Example
//!
//! ```
//! use meshlet_prep::pipeline::{PipelineConfig, process_unindexed};
//! use meshlet_prep::vertex::PackedVertex;
//!
//! let soup = [
//!     PackedVertex::new([0.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 0.0]),
//!     PackedVertex::new([1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [1.0, 0.0]),
//!     PackedVertex::new([0.0, 1.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0]),
//! ];
//!
//! let mesh = process_unindexed(&soup, &PipelineConfig::default()).unwrap();
//!
//! assert_eq!(mesh.vertices.len(), 3);
//! assert_eq!(mesh.meshlets.len(), 1);
//! assert_eq!(mesh.bounds.len(), 1);
//! ```

use bytemuck::Pod;
use log::{Level, debug, log_enabled};

use crate::cluster::{
    Bounds, MESHLET_MAX_TRIANGLES, MESHLET_MAX_VERTICES, Meshlet, build_meshlets, build_meshlets_bound,
    compute_meshlet_bounds,
};
use crate::index::generator::{generate_vertex_remap, remap_index_buffer_into, remap_vertex_buffer};
use crate::vertex::Position;
use crate::vertex::cache::{CACHE_SIZE, analyze_vertex_cache, optimize_vertex_cache};
use crate::vertex::fetch::{analyze_vertex_fetch, optimize_vertex_fetch};
use crate::{Error, INVALID_INDEX, Result, Stream};

/// Settings for [process_indexed] and [process_unindexed].
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PipelineConfig {
    /// Vertex limit per meshlet, at most [MESHLET_MAX_VERTICES]
    pub max_vertices: usize,
    /// Triangle limit per meshlet, a multiple of 4 and at most [Meshlet::TRIANGLES_COUNT]
    pub max_triangles: usize,
    /// Reorder triangles for the post-transform vertex cache
    pub optimize_vertex_cache: bool,
    /// Reorder vertices into first-use order
    pub optimize_vertex_fetch: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_vertices: MESHLET_MAX_VERTICES,
            max_triangles: MESHLET_MAX_TRIANGLES,
            optimize_vertex_cache: true,
            optimize_vertex_fetch: true,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_vertices < 3 || self.max_vertices > MESHLET_MAX_VERTICES {
            return Err(Error::config("max_vertices must be in 3..=64"));
        }

        if self.max_triangles < 1 || self.max_triangles > Meshlet::TRIANGLES_COUNT {
            return Err(Error::config("max_triangles must be in 1..=126"));
        }

        if self.max_triangles % 4 != 0 {
            return Err(Error::config("max_triangles must be a multiple of 4"));
        }

        Ok(())
    }
}

/// Output of the pipeline, ready for upload.
///
/// `bounds[i]` belongs to `meshlets[i]`; meshlet vertex lists index into `vertices`.
#[derive(Clone, Debug, Default)]
pub struct ProcessedMesh<Vertex> {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    pub meshlets: Vec<Meshlet>,
    pub bounds: Vec<Bounds>,
}

/// Runs the pipeline on an unindexed triangle soup, one vertex per corner.
pub fn process_unindexed<Vertex>(vertices: &[Vertex], config: &PipelineConfig) -> Result<ProcessedMesh<Vertex>>
where
    Vertex: Pod + Position,
{
    config.validate()?;

    if vertices.len() % 3 != 0 {
        return Err(Error::IndexCount(vertices.len()));
    }

    check_size(vertices.len())?;

    let mut remap = vec![0; vertices.len()];
    let unique = generate_vertex_remap(&mut remap, None, &Stream::from_slice(vertices));

    debug!("deduplicated {} corners into {} vertices", vertices.len(), unique);

    let mut unique_vertices = vec![Vertex::zeroed(); unique];
    remap_vertex_buffer(&mut unique_vertices, vertices, &remap);

    // for a soup the remap table already is the index buffer
    Ok(process_deduplicated(unique_vertices, remap, config))
}

/// Runs the pipeline on an indexed mesh; vertices that are binary equivalent are merged first.
pub fn process_indexed<Vertex>(
    vertices: &[Vertex],
    indices: &[u32],
    config: &PipelineConfig,
) -> Result<ProcessedMesh<Vertex>>
where
    Vertex: Pod + Position,
{
    config.validate()?;

    if indices.len() % 3 != 0 {
        return Err(Error::IndexCount(indices.len()));
    }

    check_size(vertices.len())?;
    check_size(indices.len())?;

    if let Some((position, index)) = indices
        .iter()
        .enumerate()
        .find(|(_, index)| **index as usize >= vertices.len())
    {
        return Err(Error::IndexOutOfRange {
            position,
            index: *index,
            vertex_count: vertices.len(),
        });
    }

    let mut remap = vec![0; vertices.len()];
    let unique = generate_vertex_remap(&mut remap, Some(indices), &Stream::from_slice(vertices));

    debug!("deduplicated {} vertices into {}", vertices.len(), unique);

    let mut unique_vertices = vec![Vertex::zeroed(); unique];
    remap_vertex_buffer(&mut unique_vertices, vertices, &remap);

    let mut unique_indices = vec![0; indices.len()];
    remap_index_buffer_into(&mut unique_indices, indices, &remap);

    Ok(process_deduplicated(unique_vertices, unique_indices, config))
}

fn check_size(count: usize) -> Result<()> {
    if count >= INVALID_INDEX as usize {
        return Err(Error::TooLarge(count));
    }

    Ok(())
}

fn process_deduplicated<Vertex>(
    mut vertices: Vec<Vertex>,
    mut indices: Vec<u32>,
    config: &PipelineConfig,
) -> ProcessedMesh<Vertex>
where
    Vertex: Pod + Position,
{
    if config.optimize_vertex_cache {
        let mut optimized = vec![0; indices.len()];
        optimize_vertex_cache(&mut optimized, &indices, vertices.len());

        if log_enabled!(Level::Debug) {
            let before = analyze_vertex_cache(&indices, vertices.len(), CACHE_SIZE);
            let after = analyze_vertex_cache(&optimized, vertices.len(), CACHE_SIZE);

            debug!(
                "vertex cache: {} -> {} transforms, ACMR {:.3} -> {:.3}",
                before.vertices_transformed, after.vertices_transformed, before.acmr, after.acmr
            );
        }

        indices = optimized;
    }

    if config.optimize_vertex_fetch {
        let mut optimized = vec![Vertex::zeroed(); vertices.len()];
        let unique = optimize_vertex_fetch(&mut optimized, &mut indices, &vertices);
        optimized.truncate(unique);

        if log_enabled!(Level::Debug) {
            let stats = analyze_vertex_fetch(&indices, unique, std::mem::size_of::<Vertex>());

            debug!(
                "vertex fetch: {} vertices, {} bytes fetched, overfetch {:.3}",
                stats.unique_vertices, stats.bytes_fetched, stats.overfetch
            );
        }

        vertices = optimized;
    }

    let bound = build_meshlets_bound(indices.len(), config.max_vertices, config.max_triangles);
    let mut meshlets = vec![Meshlet::default(); bound];

    let count = build_meshlets(
        &mut meshlets,
        &indices,
        vertices.len(),
        config.max_vertices,
        config.max_triangles,
    );
    meshlets.truncate(count);

    let bounds: Vec<Bounds> = meshlets
        .iter()
        .map(|meshlet| compute_meshlet_bounds(meshlet, &vertices))
        .collect();

    debug!(
        "built {} meshlets for {} triangles ({} without usable cone)",
        meshlets.len(),
        indices.len() / 3,
        bounds.iter().filter(|b| b.cone_cutoff >= 1.0).count()
    );

    ProcessedMesh {
        vertices,
        indices,
        meshlets,
        bounds,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use crate::vertex::PackedVertex;

    fn quad() -> Vec<PackedVertex> {
        let n = [0.0, 0.0, 1.0];

        [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0]]
            .iter()
            .map(|p| PackedVertex::new(*p, n, [p[0], p[1]]))
            .collect()
    }

    #[test]
    fn test_config_validate() {
        assert!(PipelineConfig::default().validate().is_ok());

        let config = |max_vertices, max_triangles| PipelineConfig {
            max_vertices,
            max_triangles,
            ..Default::default()
        };

        assert!(config(64, 124).validate().is_ok());
        assert!(config(3, 4).validate().is_ok());
        assert!(matches!(config(2, 124).validate(), Err(Error::Config(_))));
        assert!(matches!(config(65, 124).validate(), Err(Error::Config(_))));
        assert!(matches!(config(64, 0).validate(), Err(Error::Config(_))));
        assert!(matches!(config(64, 126).validate(), Err(Error::Config(_))));
        assert!(matches!(config(64, 128).validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_rejects_bad_input() {
        let vertices = quad();
        let config = PipelineConfig::default();

        assert!(matches!(
            process_unindexed(&vertices[..5], &config),
            Err(Error::IndexCount(5))
        ));
        assert!(matches!(
            process_indexed(&vertices, &[0, 1], &config),
            Err(Error::IndexCount(2))
        ));
        assert!(matches!(
            process_indexed(&vertices, &[0, 1, 2, 3, 4, 6], &config),
            Err(Error::IndexOutOfRange {
                position: 5,
                index: 6,
                vertex_count: 6
            })
        ));

        let config = PipelineConfig {
            max_triangles: 7,
            ..Default::default()
        };
        assert!(matches!(process_unindexed(&vertices, &config), Err(Error::Config(_))));
    }

    #[test]
    fn test_quad_soup() {
        let mesh = process_unindexed(&quad(), &PipelineConfig::default()).unwrap();

        assert_eq!(mesh.vertices.len(), 4);
        assert_eq!(mesh.indices.len(), 6);
        assert_eq!(mesh.meshlets.len(), 1);
        assert_eq!(mesh.meshlets[0].vertex_count, 4);
        assert_eq!(mesh.meshlets[0].triangle_count, 2);
        assert_eq!(mesh.bounds[0].cone_axis, [0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_passes_disabled() {
        let config = PipelineConfig {
            optimize_vertex_cache: false,
            optimize_vertex_fetch: false,
            ..Default::default()
        };

        let soup = quad();
        let mesh = process_unindexed(&soup, &config).unwrap();

        // without reordering the output is exactly the deduplicated soup
        assert_eq!(mesh.indices, [0, 1, 2, 2, 1, 3]);
        assert_eq!(mesh.vertices, [soup[0], soup[1], soup[2], soup[5]]);
    }

    #[test]
    fn test_empty() {
        let mesh = process_unindexed::<PackedVertex>(&[], &PipelineConfig::default()).unwrap();

        assert!(mesh.vertices.is_empty());
        assert!(mesh.indices.is_empty());
        assert!(mesh.meshlets.is_empty());
        assert!(mesh.bounds.is_empty());
    }
}
