//! Mesh files on disk through to a saved frame.

use std::fs;
use std::path::Path;

use image::{Rgb, RgbImage};

use softrender::geom::Model;
use softrender::util::{Vec2, Vec3};
use softrender::{Engine, Error};

const QUAD_OBJ: &str = "\
# unit quad facing +Z
v -0.5 -0.5 0.0
v 0.5 -0.5 0.0
v 0.5 0.5 0.0
v -0.5 0.5 0.0
vt 0.0 0.0
vt 1.0 0.0
vt 1.0 1.0
vt 0.0 1.0
vn 0.0 0.0 1.0
f 1/1/1 2/2/1 3/3/1 4/4/1
";

fn write_quad(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("quad.obj");
    fs::write(&path, QUAD_OBJ).unwrap();
    path
}

#[test]
fn obj_round_trip_keeps_polygons_and_attributes() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_quad(dir.path());

    let model = Model::open(&path).unwrap();
    assert_eq!(model.vertex_count(), 4);
    assert_eq!(model.face_count(), 1);
    assert_eq!(model.face(0).len(), 4);
    assert_eq!(model.triangle_count(), 2);
    assert_eq!(model.vertex(0, 2), Vec3::new(0.5, 0.5, 0.0));
    assert_eq!(model.uv(0, 2), Vec2::new(1.0, 1.0));
    assert_eq!(model.normal(0, 3), Some(Vec3::Z));
    assert_eq!(model.source(), Some(path.as_path()));
    assert!(model.diffuse(Vec2::splat(0.5)).is_none());
}

#[test]
fn sibling_diffuse_texture_is_flipped_into_uv_space() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_quad(dir.path());

    // top row red, bottom row blue
    let mut img = RgbImage::new(2, 2);
    for x in 0..2 {
        img.put_pixel(x, 0, Rgb([255, 0, 0]));
        img.put_pixel(x, 1, Rgb([0, 0, 255]));
    }
    img.save(dir.path().join("quad_diffuse.tga")).unwrap();

    let model = Model::open(&path).unwrap();
    assert_eq!(model.diffuse(Vec2::new(0.5, 0.9)), Some([255, 0, 0]));
    assert_eq!(model.diffuse(Vec2::new(0.5, 0.1)), Some([0, 0, 255]));
}

#[test]
fn broken_files_are_reported() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.obj");
    assert!(matches!(Model::open(&missing), Err(Error::FileNotFound(_))));
    assert!(Model::load(&missing).is_empty());

    let empty = dir.path().join("empty.obj");
    fs::write(&empty, "# nothing here\n").unwrap();
    let mut engine = Engine::new(16, 16);
    assert!(engine.load_model(&empty, None).is_err());
    assert_eq!(engine.scene.mesh_count(), 0);
}

#[test]
fn loaded_mesh_renders_and_captures() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_quad(dir.path());

    let mut engine = Engine::new(48, 48);
    let name = engine.load_model(&path, None).unwrap();
    assert_eq!(name, "quad");
    assert_eq!(engine.scene.selected_node().unwrap().name, "quad");

    // same file again shares the mesh but gets a fresh node name
    let again = engine.load_model(&path, None).unwrap();
    assert_eq!(again, "quad_1");
    assert_eq!(engine.scene.model_count(), 1);

    let stats = engine.render_frame();
    assert_eq!(stats.meshes, 2);
    assert!(stats.fragments > 0);

    let out = dir.path().join("frame.png");
    engine.capture_frame(&out).unwrap();
    let saved = image::open(&out).unwrap().to_rgb8();
    assert_eq!(saved.dimensions(), (48, 48));
    assert!(saved.pixels().any(|p| p.0 != [0, 0, 0]));
}
