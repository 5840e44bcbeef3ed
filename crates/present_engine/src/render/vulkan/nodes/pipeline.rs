//! Graphics pipeline for the colour render pass

use std::ffi::CStr;

use ash::{vk, Device};

use super::{required, ChainState, PipelineInfo};
use crate::regen::Regenerable;
use crate::render::vulkan::vertex::Vertex;
use crate::render::vulkan::{VulkanError, VulkanResult};

const ENTRY_POINT: &CStr = c"main";

fn create_shader_module(device: &Device, code: &[u32]) -> VulkanResult<vk::ShaderModule> {
    let create_info = vk::ShaderModuleCreateInfo::builder().code(code);
    unsafe {
        device
            .create_shader_module(&create_info, None)
            .map_err(VulkanError::Api)
    }
}

/// Pipeline with dynamic viewport and scissor
///
/// Depends on the render pass only. The extent is set while recording.
#[derive(Debug, Default)]
pub struct PipelineNode {
    pipeline: vk::Pipeline,
    layout: vk::PipelineLayout,
}

impl PipelineNode {
    fn build(
        &mut self,
        device: &Device,
        render_pass: vk::RenderPass,
        set_layout: vk::DescriptorSetLayout,
        vertex_module: vk::ShaderModule,
        fragment_module: vk::ShaderModule,
    ) -> VulkanResult<()> {
        let set_layouts = [set_layout];
        let layout_info = vk::PipelineLayoutCreateInfo::builder().set_layouts(&set_layouts);
        self.layout = unsafe {
            device
                .create_pipeline_layout(&layout_info, None)
                .map_err(VulkanError::Api)?
        };

        let shader_stages = [
            vk::PipelineShaderStageCreateInfo::builder()
                .stage(vk::ShaderStageFlags::VERTEX)
                .module(vertex_module)
                .name(ENTRY_POINT)
                .build(),
            vk::PipelineShaderStageCreateInfo::builder()
                .stage(vk::ShaderStageFlags::FRAGMENT)
                .module(fragment_module)
                .name(ENTRY_POINT)
                .build(),
        ];

        let bindings = [Vertex::binding_description()];
        let attributes = Vertex::attribute_descriptions();
        let vertex_input = vk::PipelineVertexInputStateCreateInfo::builder()
            .vertex_binding_descriptions(&bindings)
            .vertex_attribute_descriptions(&attributes);

        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::builder()
            .topology(vk::PrimitiveTopology::TRIANGLE_LIST)
            .primitive_restart_enable(false);

        // Counts only; the values come from vkCmdSetViewport/Scissor
        let viewport_state = vk::PipelineViewportStateCreateInfo::builder()
            .viewport_count(1)
            .scissor_count(1);

        let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic_state =
            vk::PipelineDynamicStateCreateInfo::builder().dynamic_states(&dynamic_states);

        let rasterizer = vk::PipelineRasterizationStateCreateInfo::builder()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(vk::PolygonMode::FILL)
            .line_width(1.0)
            .cull_mode(vk::CullModeFlags::NONE)
            .front_face(vk::FrontFace::COUNTER_CLOCKWISE)
            .depth_bias_enable(false);

        let multisampling = vk::PipelineMultisampleStateCreateInfo::builder()
            .sample_shading_enable(false)
            .rasterization_samples(vk::SampleCountFlags::TYPE_1);

        let color_blend_attachment = vk::PipelineColorBlendAttachmentState::builder()
            .color_write_mask(vk::ColorComponentFlags::RGBA)
            .blend_enable(false)
            .build();
        let color_blend_attachments = [color_blend_attachment];
        let color_blending = vk::PipelineColorBlendStateCreateInfo::builder()
            .logic_op_enable(false)
            .attachments(&color_blend_attachments);

        let pipeline_info = vk::GraphicsPipelineCreateInfo::builder()
            .stages(&shader_stages)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterizer)
            .multisample_state(&multisampling)
            .color_blend_state(&color_blending)
            .dynamic_state(&dynamic_state)
            .layout(self.layout)
            .render_pass(render_pass)
            .subpass(0)
            .build();

        let pipelines = unsafe {
            device
                .create_graphics_pipelines(vk::PipelineCache::null(), &[pipeline_info], None)
                .map_err(|(_, err)| VulkanError::Api(err))?
        };
        self.pipeline = pipelines.into_iter().next().ok_or_else(|| VulkanError::InvalidOperation {
            reason: "driver returned no pipeline".to_string(),
        })?;
        Ok(())
    }

    fn destroy_handles(&mut self, device: &Device) {
        unsafe {
            if self.pipeline != vk::Pipeline::null() {
                device.destroy_pipeline(self.pipeline, None);
            }
            if self.layout != vk::PipelineLayout::null() {
                device.destroy_pipeline_layout(self.layout, None);
            }
        }
        self.pipeline = vk::Pipeline::null();
        self.layout = vk::PipelineLayout::null();
    }
}

impl Regenerable<ChainState> for PipelineNode {
    fn label(&self) -> &'static str {
        "pipeline"
    }

    fn create(&mut self, ctx: &mut ChainState) -> VulkanResult<()> {
        let render_pass = required(ctx.render_pass, "render pass")?;

        let vertex_module = create_shader_module(&ctx.device, &ctx.vertex_shader)?;
        let fragment_module = match create_shader_module(&ctx.device, &ctx.fragment_shader) {
            Ok(module) => module,
            Err(e) => {
                unsafe { ctx.device.destroy_shader_module(vertex_module, None) };
                return Err(e);
            }
        };

        let result = self.build(
            &ctx.device,
            render_pass,
            ctx.descriptor_set_layout,
            vertex_module,
            fragment_module,
        );

        // Modules are only needed while the pipeline is compiled
        unsafe {
            ctx.device.destroy_shader_module(vertex_module, None);
            ctx.device.destroy_shader_module(fragment_module, None);
        }

        if let Err(e) = result {
            self.destroy_handles(&ctx.device);
            return Err(e);
        }

        ctx.pipeline = Some(PipelineInfo {
            pipeline: self.pipeline,
            layout: self.layout,
        });
        Ok(())
    }

    fn destroy(&mut self, ctx: &mut ChainState) {
        ctx.pipeline = None;
        self.destroy_handles(&ctx.device);
    }
}
