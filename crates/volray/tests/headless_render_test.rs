//! Headless rendering integration tests.
//!
//! These need a GPU adapter (real or software fallback). Without one, scene
//! creation fails and the tests return early.

use volray::*;

const WIDTH: u32 = 160;
const HEIGHT: u32 = 120;

fn scene_or_skip() -> Option<Scene> {
    init();
    match Scene::new_headless(WIDTH, HEIGHT) {
        Ok(scene) => Some(scene),
        Err(e) => {
            eprintln!("Skipping headless test: no GPU adapter available ({e})");
            None
        }
    }
}

fn covered_pixels(pixels: &[u8]) -> usize {
    assert_eq!(pixels.len(), (WIDTH * HEIGHT * 4) as usize, "pixel buffer size mismatch");
    let background = &pixels[0..4];
    pixels
        .chunks(4)
        .filter(|px| px[0..3] != [0, 0, 0] && *px != background)
        .count()
}

#[test]
fn headless_empty_scene_is_background() {
    let Some(mut scene) = scene_or_skip() else {
        return;
    };
    assert!(!scene.frame_all());
    let pixels = scene.render_to_image().unwrap();
    let first = &pixels[0..4];
    assert!(pixels.chunks(4).all(|px| px == first));
    assert_eq!(first, &[0, 0, 0, 255]);
}

#[test]
fn headless_volume_renders_surface() {
    let Some(mut scene) = scene_or_skip() else {
        return;
    };
    let handle = scene
        .add_volume_from_options(&VolumeOptions::default(), DMat4::IDENTITY)
        .unwrap();
    assert!(scene.frame_all());

    let pixels = scene.render_to_image().unwrap();
    let covered = covered_pixels(&pixels);
    assert!(covered > 0, "iso-surface produced no pixels");
    assert!(
        covered < (WIDTH * HEIGHT) as usize,
        "volume should not cover the whole frame"
    );

    let volume = scene.volume(handle).unwrap();
    assert_eq!(volume.state(), PrimitiveState::Ready);
    assert!(!volume.has_cpu_density());

    // Second frame reuses the command.
    assert_eq!(scene.render().unwrap(), 1);
    assert_eq!(scene.frame_number(), 2);

    scene.remove_volume(handle).unwrap();
    assert_eq!(scene.volume_count(), 0);
    let pixels = scene.render_to_image().unwrap();
    assert_eq!(covered_pixels(&pixels), 0);
    assert!(matches!(
        scene.remove_volume(handle),
        Err(VolrayError::UnknownVolume(_))
    ));
}

#[test]
fn headless_globe_placed_volume_renders() {
    let Some(mut scene) = scene_or_skip() else {
        return;
    };
    let origin = transforms::cartesian_from_degrees(124.219_366_796_799, 45.851_368_720_983_97, 0.0);
    let model = transforms::east_north_up_to_fixed_frame(origin)
        * DMat4::from_translation(DVec3::new(0.0, 0.0, 80.0));
    scene
        .add_volume_from_options(&VolumeOptions::default(), model)
        .unwrap();
    assert!(scene.frame_all());

    let pixels = scene.render_to_image().unwrap();
    assert!(covered_pixels(&pixels) > 0, "globe-placed volume produced no pixels");
}

#[test]
fn headless_linear_sampler_and_file_output() {
    let Some(mut scene) = scene_or_skip() else {
        return;
    };
    let handle = scene
        .add_volume_from_options(&VolumeOptions::default(), DMat4::IDENTITY)
        .unwrap();
    scene.frame_all();
    scene.render().unwrap();

    scene.set_sampler(handle, SamplerState::LINEAR).unwrap();
    let path = std::env::temp_dir().join("volray_headless_test.png");
    scene.render_to_file(&path).unwrap();
    assert!(path.exists());
    let _ = std::fs::remove_file(&path);

    let texture = scene.volume(handle).unwrap().texture().unwrap();
    assert_eq!(texture.sampler_state(), SamplerState::LINEAR);
}

#[test]
fn headless_volume_from_json_file() {
    let Some(mut scene) = scene_or_skip() else {
        return;
    };
    let path = std::env::temp_dir().join("volray_headless_options.json");
    std::fs::write(&path, r#"{ "box_dimensions": [2.0, 2.0, 2.0], "frequency": 4.0 }"#).unwrap();
    let handle = scene.add_volume_from_json_file(&path, DMat4::IDENTITY);
    let _ = std::fs::remove_file(&path);
    let handle = handle.unwrap();

    let half = scene.volume(handle).unwrap().half_extent().unwrap();
    assert_eq!(half.get(), Vec3::ONE);
    scene.frame_all();
    assert_eq!(scene.render().unwrap(), 1);
}
