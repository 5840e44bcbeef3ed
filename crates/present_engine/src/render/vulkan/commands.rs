//! Command buffer recording
//!
//! Command buffers are prerecorded once per swapchain image. The engine owns
//! the frame around a draw (begin, render pass with clear, dynamic viewport and
//! scissor, end); the application only records what goes inside the pass.

use ash::{vk, Device};

use super::{VulkanError, VulkanResult};

/// Colour every framebuffer is cleared to before the recorder runs
pub const CLEAR_COLOR: [f32; 4] = [0.02, 0.02, 0.05, 1.0];

/// Everything a recorder needs for one swapchain image
pub struct RecordContext<'a> {
    /// Device function table
    pub device: &'a Device,
    /// Buffer being recorded, inside an active render pass
    pub command_buffer: vk::CommandBuffer,
    /// Swapchain image this buffer renders to
    pub image_index: u32,
    /// Current swapchain extent
    pub extent: vk::Extent2D,
    /// Active render pass
    pub render_pass: vk::RenderPass,
    /// Framebuffer of this image
    pub framebuffer: vk::Framebuffer,
    /// Graphics pipeline built for the render pass
    pub pipeline: vk::Pipeline,
    /// Layout of `pipeline`
    pub pipeline_layout: vk::PipelineLayout,
    /// Uniform descriptor set of this image
    pub descriptor_set: vk::DescriptorSet,
}

/// Application callback recording draw commands
///
/// Invoked for every image whenever the command buffers are rebuilt, so it
/// must be repeatable.
pub trait CommandRecorder {
    /// Record draw commands into `ctx.command_buffer`
    fn record(&mut self, ctx: &RecordContext<'_>);
}

impl<F> CommandRecorder for F
where
    F: FnMut(&RecordContext<'_>),
{
    fn record(&mut self, ctx: &RecordContext<'_>) {
        self(ctx);
    }
}

/// Viewport covering the whole extent
pub fn full_viewport(extent: vk::Extent2D) -> vk::Viewport {
    vk::Viewport {
        x: 0.0,
        y: 0.0,
        width: extent.width as f32,
        height: extent.height as f32,
        min_depth: 0.0,
        max_depth: 1.0,
    }
}

/// Record one image's command buffer
///
/// Without a recorder the pass only clears.
pub fn record_command_buffer(
    ctx: &RecordContext<'_>,
    recorder: &mut Option<Box<dyn CommandRecorder>>,
) -> VulkanResult<()> {
    let device = ctx.device;
    let begin_info = vk::CommandBufferBeginInfo::builder();

    unsafe {
        device
            .begin_command_buffer(ctx.command_buffer, &begin_info)
            .map_err(VulkanError::Api)?;
    }

    let clear_values = [vk::ClearValue {
        color: vk::ClearColorValue { float32: CLEAR_COLOR },
    }];
    let render_area = vk::Rect2D {
        offset: vk::Offset2D { x: 0, y: 0 },
        extent: ctx.extent,
    };
    let render_pass_begin = vk::RenderPassBeginInfo::builder()
        .render_pass(ctx.render_pass)
        .framebuffer(ctx.framebuffer)
        .render_area(render_area)
        .clear_values(&clear_values);

    unsafe {
        device.cmd_begin_render_pass(
            ctx.command_buffer,
            &render_pass_begin,
            vk::SubpassContents::INLINE,
        );
        device.cmd_set_viewport(ctx.command_buffer, 0, &[full_viewport(ctx.extent)]);
        device.cmd_set_scissor(ctx.command_buffer, 0, &[render_area]);
    }

    if let Some(recorder) = recorder.as_mut() {
        recorder.record(ctx);
    }

    unsafe {
        device.cmd_end_render_pass(ctx.command_buffer);
        device
            .end_command_buffer(ctx.command_buffer)
            .map_err(VulkanError::Api)
    }
}
