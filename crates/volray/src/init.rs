//! Process-level setup.

/// Installs the `env_logger` backend (filter through `RUST_LOG`).
///
/// Safe to call more than once; later calls keep the first logger.
///
/// # Example
///
/// ```no_run
/// volray::init();
/// let mut scene = volray::Scene::new_headless(640, 480)?;
/// # Ok::<(), volray::VolrayError>(())
/// ```
pub fn init() {
    let _ = env_logger::try_init();
    log::info!("volray initialized");
}

/// Flushes buffered log output. Scenes release their own GPU resources on drop.
pub fn shutdown() {
    log::info!("volray shut down");
    log::logger().flush();
}
