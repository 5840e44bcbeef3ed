//! Spinning quad demo
//!
//! Opens a window, uploads one indexed quad and presents it through the
//! `present_engine` frame loop until the window is closed. Resize, minimize
//! and restore the window to exercise swapchain regeneration.

use std::path::Path;
use std::time::Instant;

use ash::vk;
use nalgebra::{Matrix4, Point3, Vector3};
use present_engine::foundation::logging;
use present_engine::prelude::*;
use present_engine::render::vulkan::Buffer;
use thiserror::Error;

const DEFAULT_CONFIG_PATH: &str = "quad_app.toml";

const VERTICES: [Vertex; 4] = [
    Vertex::new([-0.5, -0.5], [1.0, 0.3, 0.3]),
    Vertex::new([0.5, -0.5], [0.3, 1.0, 0.3]),
    Vertex::new([0.5, 0.5], [0.3, 0.3, 1.0]),
    Vertex::new([-0.5, 0.5], [1.0, 1.0, 0.3]),
];

const INDICES: [u16; 6] = [0, 1, 2, 2, 3, 0];

/// Radians per second
const SPIN_RATE: f32 = 1.2;

#[derive(Error, Debug)]
enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Window error: {0}")]
    Window(#[from] WindowError),

    #[error("Vulkan error: {0}")]
    Vulkan(#[from] VulkanError),

    #[error("Regeneration error: {0}")]
    Regen(#[from] RegenError),

    #[error("Presentation error: {0}")]
    Present(#[from] PresentError),
}

fn load_config() -> Result<PresentConfig, AppError> {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let mut config = PresentConfig::load_or_default(&path)?;

    if !Path::new(&config.shaders.vertex_shader_path).exists() {
        config.shaders = ShaderConfig::with_path_resolution("quad.vert.spv", "quad.frag.spv");
    }
    Ok(config)
}

/// Quad rotated by `angle` about the view axis, seen from two units away
fn spin_uniform(angle: f32, extent: vk::Extent2D) -> MvpUniform {
    let aspect = if extent.height == 0 {
        1.0
    } else {
        extent.width as f32 / extent.height as f32
    };

    let model = Matrix4::from_axis_angle(&Vector3::z_axis(), angle);
    let view = Matrix4::look_at_rh(
        &Point3::new(0.0, 0.0, 2.0),
        &Point3::origin(),
        &Vector3::y(),
    );
    let mut proj = Matrix4::new_perspective(aspect, std::f32::consts::FRAC_PI_4, 0.1, 10.0);
    // Vulkan clip space has Y pointing down
    proj[(1, 1)] *= -1.0;

    MvpUniform {
        model: model.into(),
        view: view.into(),
        proj: proj.into(),
    }
}

fn run(config: &PresentConfig) -> Result<FrameStats, AppError> {
    let mut window = Window::new(&config.window)?;
    let context = VulkanContext::new(&mut window, config)?;

    let device = context.device();
    let physical_device = context.physical_device().handle;
    let vertex_buffer = Buffer::with_data(
        device.clone(),
        context.instance(),
        physical_device,
        vk::BufferUsageFlags::VERTEX_BUFFER,
        &VERTICES,
    )?;
    let index_buffer = Buffer::with_data(
        device.clone(),
        context.instance(),
        physical_device,
        vk::BufferUsageFlags::INDEX_BUFFER,
        &INDICES,
    )?;

    let mut chain = SwapchainChain::new(&context, config, window.framebuffer_extent())?;
    log::debug!("Chain nodes: {}", chain.node_labels().join(" -> "));

    let vertex_handle = vertex_buffer.handle();
    let index_handle = index_buffer.handle();
    let index_count = INDICES.len() as u32;
    chain.record(move |ctx: &RecordContext<'_>| unsafe {
        ctx.device.cmd_bind_pipeline(
            ctx.command_buffer,
            vk::PipelineBindPoint::GRAPHICS,
            ctx.pipeline,
        );
        ctx.device
            .cmd_bind_vertex_buffers(ctx.command_buffer, 0, &[vertex_handle], &[0]);
        ctx.device
            .cmd_bind_index_buffer(ctx.command_buffer, index_handle, 0, vk::IndexType::UINT16);
        ctx.device.cmd_bind_descriptor_sets(
            ctx.command_buffer,
            vk::PipelineBindPoint::GRAPHICS,
            ctx.pipeline_layout,
            0,
            &[ctx.descriptor_set],
            &[],
        );
        ctx.device
            .cmd_draw_indexed(ctx.command_buffer, index_count, 1, 0, 0, 0);
    })?;

    let mut driver = PresentationDriver::new(context.queue(), chain, config)?;

    let start = Instant::now();
    driver.set_before_submit(
        move |image_index: u32, chain: &mut SwapchainChain| -> PresentResult<()> {
            let uniform = spin_uniform(start.elapsed().as_secs_f32() * SPIN_RATE, chain.extent());
            chain.write_uniform(image_index, &uniform)?;
            Ok(())
        },
    );

    // Dropped in reverse order: the driver and its chain go before the
    // buffers and the context
    Ok(driver.run_until_closed(&mut window)?)
}

fn main() {
    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            logging::init("info");
            log::error!("{e}");
            std::process::exit(1);
        }
    };
    logging::init(&config.log_level);

    log::info!(
        "Starting {} ({}x{}, {} frame(s) in flight)",
        config.application_name,
        config.window.width,
        config.window.height,
        config.frames_in_flight
    );

    match run(&config) {
        Ok(stats) => log::info!("Exited cleanly: {stats}"),
        Err(e) => {
            log::error!("{e}");
            std::process::exit(1);
        }
    }
}
