use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};

use bytemuck::{Pod, Zeroable};

use meshlet_prep::Stream;
use meshlet_prep::cluster::{
    MESHLET_MAX_TRIANGLES, MESHLET_MAX_VERTICES, Meshlet, build_meshlets, build_meshlets_bound, compute_meshlet_bounds,
};
use meshlet_prep::index::generator::{generate_vertex_remap, remap_index_buffer, remap_vertex_buffer};
use meshlet_prep::pipeline::{PipelineConfig, process_unindexed};
use meshlet_prep::vertex::Position;
use meshlet_prep::vertex::cache::optimize_vertex_cache;
use meshlet_prep::vertex::fetch::{optimize_vertex_fetch, optimize_vertex_fetch_remap};

use std::fmt::Debug;
use std::path::Path;

#[derive(Clone, Copy, Default, Pod, Zeroable)]
#[repr(C)]
struct Vertex {
    p: [f32; 3],
    n: [f32; 3],
    t: [f32; 2],
}

impl Position for Vertex {
    fn pos(&self) -> [f32; 3] {
        self.p
    }
}

#[derive(Clone, Default)]
struct Mesh {
    /// One vertex per triangle corner, as loaded
    corners: Vec<Vertex>,
    vertices: Vec<Vertex>,
    indices: Vec<u32>,
}

impl Mesh {
    pub fn load<P>(path: P) -> Result<Mesh, tobj::LoadError>
    where
        P: AsRef<Path> + Clone + Debug,
    {
        let (models, _materials) = tobj::load_obj(
            path.clone(),
            &tobj::LoadOptions {
                triangulate: true,
                ..Default::default()
            },
        )?;

        let mut corners = Vec::new();

        for model in models.iter() {
            let mesh = &model.mesh;
            assert!(mesh.positions.len() % 3 == 0);

            corners.reserve(mesh.indices.len());

            for i in 0..mesh.indices.len() {
                let mut vertex = Vertex::default();

                let pi = mesh.indices[i] as usize;
                vertex.p.copy_from_slice(&mesh.positions[3 * pi..3 * (pi + 1)]);

                if !mesh.normals.is_empty() {
                    let ni = mesh.normal_indices[i] as usize;
                    vertex.n.copy_from_slice(&mesh.normals[3 * ni..3 * (ni + 1)]);
                }

                if !mesh.texcoords.is_empty() {
                    let ti = mesh.texcoord_indices[i] as usize;
                    vertex.t.copy_from_slice(&mesh.texcoords[2 * ti..2 * (ti + 1)]);
                }

                corners.push(vertex);
            }
        }

        Ok(Mesh::from_corners(corners))
    }

    /// Wavy `size` x `size` quad grid, so that meshlets get non-trivial normal cones.
    pub fn grid(size: usize) -> Mesh {
        let vertex = |x: usize, y: usize| {
            let (fx, fy) = (x as f32 / size as f32, y as f32 / size as f32);

            Vertex {
                p: [fx, fy, (fx * 12.0).sin() * (fy * 7.0).cos() * 0.05],
                n: [0.0, 0.0, 1.0],
                t: [fx, fy],
            }
        };

        let mut corners = Vec::with_capacity(size * size * 6);

        for y in 0..size {
            for x in 0..size {
                corners.extend_from_slice(&[
                    vertex(x, y),
                    vertex(x + 1, y),
                    vertex(x, y + 1),
                    vertex(x, y + 1),
                    vertex(x + 1, y),
                    vertex(x + 1, y + 1),
                ]);
            }
        }

        Mesh::from_corners(corners)
    }

    fn from_corners(corners: Vec<Vertex>) -> Mesh {
        let mut remap = vec![0; corners.len()];
        let total_vertices = generate_vertex_remap(&mut remap, None, &Stream::from_slice(&corners));

        let mut vertices = vec![Vertex::default(); total_vertices];
        remap_vertex_buffer(&mut vertices, &corners, &remap);

        Mesh {
            corners,
            vertices,
            indices: remap,
        }
    }
}

fn with_input(c: &mut Criterion) {
    let (input_name, mesh) = match std::env::var("MESH_PATH") {
        Ok(path) => {
            let mesh = Mesh::load(Path::new(&path)).unwrap();
            (path, mesh)
        }
        Err(_) => ("grid".to_owned(), Mesh::grid(200)),
    };
    let input_name = input_name.as_str();

    c.bench_with_input(
        BenchmarkId::new("generate_vertex_remap", input_name),
        &mesh,
        |b, mesh| {
            let mut remap = vec![0; mesh.corners.len()];
            let stream = Stream::from_slice(&mesh.corners);

            b.iter(|| generate_vertex_remap(&mut remap, None, &stream));
        },
    );

    c.bench_with_input(
        BenchmarkId::new("optimize_vertex_cache", input_name),
        &mesh,
        |b, mesh| {
            let mut result = mesh.indices.clone();

            b.iter(|| optimize_vertex_cache(&mut result, &mesh.indices, mesh.vertices.len()));
        },
    );

    c.bench_with_input(
        BenchmarkId::new("optimize_vertex_fetch", input_name),
        &mesh,
        |b, mesh| {
            let mut vertex_result = mesh.vertices.clone();

            b.iter(|| {
                let mut index_result = mesh.indices.clone(); // Must copy on every iteration because it's also an input
                optimize_vertex_fetch(&mut vertex_result, &mut index_result, &mesh.vertices);
            });
        },
    );

    c.bench_with_input(
        BenchmarkId::new("optimize_vertex_fetch_remap", input_name),
        &mesh,
        |b, mesh| {
            let mut remap = vec![0; mesh.vertices.len()];
            let mut vertices_result = mesh.vertices.clone();

            b.iter(|| {
                let mut index_result = mesh.indices.clone();
                optimize_vertex_fetch_remap(&mut remap, &mesh.indices, mesh.vertices.len());
                remap_index_buffer(&mut index_result, &remap);
                remap_vertex_buffer(&mut vertices_result, &mesh.vertices, &remap);
            });
        },
    );

    let mut copy = mesh.clone();
    optimize_vertex_cache(&mut copy.indices, &mesh.indices, copy.vertices.len());
    let copy_vertices = copy.vertices.clone();
    optimize_vertex_fetch(&mut copy.vertices, &mut copy.indices, &copy_vertices);

    c.bench_with_input(BenchmarkId::new("build_meshlets", input_name), &copy, |b, mesh| {
        let max_meshlets = build_meshlets_bound(mesh.indices.len(), MESHLET_MAX_VERTICES, MESHLET_MAX_TRIANGLES);
        let mut meshlets = vec![Meshlet::default(); max_meshlets];

        b.iter(|| {
            build_meshlets(
                &mut meshlets,
                &mesh.indices,
                mesh.vertices.len(),
                MESHLET_MAX_VERTICES,
                MESHLET_MAX_TRIANGLES,
            )
        });
    });

    c.bench_with_input(
        BenchmarkId::new("compute_meshlet_bounds", input_name),
        &copy,
        |b, mesh| {
            let max_meshlets = build_meshlets_bound(mesh.indices.len(), MESHLET_MAX_VERTICES, MESHLET_MAX_TRIANGLES);
            let mut meshlets = vec![Meshlet::default(); max_meshlets];

            let count = build_meshlets(
                &mut meshlets,
                &mesh.indices,
                mesh.vertices.len(),
                MESHLET_MAX_VERTICES,
                MESHLET_MAX_TRIANGLES,
            );
            meshlets.truncate(count);

            b.iter(|| {
                for meshlet in &meshlets {
                    compute_meshlet_bounds(meshlet, &mesh.vertices);
                }
            });
        },
    );

    let mut group = c.benchmark_group("pipeline");
    {
        group.throughput(Throughput::Elements((mesh.corners.len() / 3) as u64));
        group.bench_with_input(
            BenchmarkId::new("process_unindexed", input_name),
            &mesh,
            |b, mesh| {
                let config = PipelineConfig::default();

                b.iter(|| process_unindexed(&mesh.corners, &config).unwrap());
            },
        );
    }
    group.finish();
}

criterion_group!(benches, with_input);
criterion_main!(benches);
