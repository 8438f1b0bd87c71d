//! Renders a noise volume placed on the globe and saves it as a PNG.
//!
//! Run with: cargo run --example volume_demo [options.json] [output.png]
//!
//! Without arguments the default options are used and the frame is written to
//! `volume_demo.png`. Set `RUST_LOG=debug` to follow the primitive lifecycle.

use volray::{transforms, DMat4, DVec3, Scene, VolumeOptions};

const WIDTH: u32 = 800;
const HEIGHT: u32 = 600;

const LONGITUDE: f64 = 124.219_366_796_799;
const LATITUDE: f64 = 45.851_368_720_983_97;

/// Height of the box centre above the ellipsoid, in metres.
const HEIGHT_ABOVE_GROUND: f64 = 80.0;

fn main() -> volray::Result<()> {
    volray::init();

    let mut args = std::env::args().skip(1);
    let options = match args.next() {
        Some(path) => VolumeOptions::from_json_file(path)?,
        None => VolumeOptions::default(),
    };
    let output = args.next().unwrap_or_else(|| "volume_demo.png".to_string());

    let origin = transforms::cartesian_from_degrees(LONGITUDE, LATITUDE, 0.0);
    let model_matrix = transforms::east_north_up_to_fixed_frame(origin)
        * DMat4::from_translation(DVec3::new(0.0, 0.0, HEIGHT_ABOVE_GROUND));

    let mut scene = Scene::new_headless(WIDTH, HEIGHT)?;
    scene.add_volume_from_options(&options, model_matrix)?;
    scene.frame_all();
    scene.render_to_file(&output)?;

    println!("wrote {output}");
    drop(scene);
    volray::shutdown();
    Ok(())
}
