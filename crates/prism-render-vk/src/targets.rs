// SPDX-License-Identifier: CEPL-1.0
//! Size-dependent render targets: one shared depth buffer, a framebuffer per
//! color image and a command buffer per color image. Rebuilt as a unit.

use ash::vk;
use tracing::debug;

use crate::device::{find_memory_type, Device};
use crate::error::{VkError, VkResult};

/// What the target set needs from the GPU. Split out so the rebuild logic can
/// be exercised without a device.
pub trait TargetBackend {
    type Depth;
    type Framebuffer: Copy;
    type CommandBuffer: Copy;
    type Error;

    fn create_depth(&self, extent: vk::Extent2D) -> Result<Self::Depth, Self::Error>;
    fn destroy_depth(&self, depth: Self::Depth);
    fn create_framebuffer(
        &self,
        color: vk::ImageView,
        depth: &Self::Depth,
        extent: vk::Extent2D,
    ) -> Result<Self::Framebuffer, Self::Error>;
    fn destroy_framebuffer(&self, framebuffer: Self::Framebuffer);
    fn allocate_command_buffers(&self, count: u32) -> Result<Vec<Self::CommandBuffer>, Self::Error>;
    fn free_command_buffers(&self, buffers: &[Self::CommandBuffer]);
}

pub struct RenderTargets<B: TargetBackend> {
    depth: Option<B::Depth>,
    framebuffers: Vec<B::Framebuffer>,
    command_buffers: Vec<B::CommandBuffer>,
    extent: vk::Extent2D,
}

impl<B: TargetBackend> RenderTargets<B> {
    pub fn empty() -> Self {
        Self {
            depth: None,
            framebuffers: Vec::new(),
            command_buffers: Vec::new(),
            extent: vk::Extent2D::default(),
        }
    }

    /// Builds the whole set for `color_views` or nothing at all.
    pub fn build(
        backend: &B,
        color_views: &[vk::ImageView],
        extent: vk::Extent2D,
    ) -> Result<Self, B::Error> {
        let mut targets = Self::empty();
        match targets.fill(backend, color_views, extent) {
            Ok(()) => Ok(targets),
            Err(e) => {
                targets.release(backend);
                Err(e)
            }
        }
    }

    /// Releases the current set, then builds a new one. On failure the set
    /// is left empty rather than half built.
    pub fn rebuild(
        &mut self,
        backend: &B,
        color_views: &[vk::ImageView],
        extent: vk::Extent2D,
    ) -> Result<(), B::Error> {
        self.release(backend);
        if let Err(e) = self.fill(backend, color_views, extent) {
            self.release(backend);
            return Err(e);
        }
        debug!(
            "render targets rebuilt: {} x {}x{}",
            color_views.len(),
            extent.width,
            extent.height
        );
        Ok(())
    }

    fn fill(
        &mut self,
        backend: &B,
        color_views: &[vk::ImageView],
        extent: vk::Extent2D,
    ) -> Result<(), B::Error> {
        let depth = self.depth.insert(backend.create_depth(extent)?);
        for &view in color_views {
            let fb = backend.create_framebuffer(view, depth, extent)?;
            self.framebuffers.push(fb);
        }
        self.command_buffers = backend.allocate_command_buffers(color_views.len() as u32)?;
        self.extent = extent;
        Ok(())
    }

    pub fn release(&mut self, backend: &B) {
        if !self.command_buffers.is_empty() {
            backend.free_command_buffers(&self.command_buffers);
            self.command_buffers.clear();
        }
        for fb in self.framebuffers.drain(..) {
            backend.destroy_framebuffer(fb);
        }
        if let Some(depth) = self.depth.take() {
            backend.destroy_depth(depth);
        }
        self.extent = vk::Extent2D::default();
    }

    pub fn is_empty(&self) -> bool {
        self.framebuffers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.framebuffers.len()
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    pub fn framebuffer(&self, image: usize) -> Option<B::Framebuffer> {
        self.framebuffers.get(image).copied()
    }

    pub fn command_buffer(&self, image: usize) -> Option<B::CommandBuffer> {
        self.command_buffers.get(image).copied()
    }

    pub fn depth(&self) -> Option<&B::Depth> {
        self.depth.as_ref()
    }
}

impl<B: TargetBackend> Default for RenderTargets<B> {
    fn default() -> Self {
        Self::empty()
    }
}

/// Single color + depth pass. `final_layout` is PRESENT_SRC_KHR for window
/// images and COLOR_ATTACHMENT_OPTIMAL for compositor images.
pub fn create_render_pass(
    device: &ash::Device,
    color: vk::Format,
    depth: vk::Format,
    final_layout: vk::ImageLayout,
) -> VkResult<vk::RenderPass> {
    let attachments = [
        vk::AttachmentDescription {
            format: color,
            samples: vk::SampleCountFlags::TYPE_1,
            load_op: vk::AttachmentLoadOp::CLEAR,
            store_op: vk::AttachmentStoreOp::STORE,
            stencil_load_op: vk::AttachmentLoadOp::DONT_CARE,
            stencil_store_op: vk::AttachmentStoreOp::DONT_CARE,
            initial_layout: vk::ImageLayout::UNDEFINED,
            final_layout,
            ..Default::default()
        },
        vk::AttachmentDescription {
            format: depth,
            samples: vk::SampleCountFlags::TYPE_1,
            load_op: vk::AttachmentLoadOp::CLEAR,
            store_op: vk::AttachmentStoreOp::DONT_CARE,
            stencil_load_op: vk::AttachmentLoadOp::DONT_CARE,
            stencil_store_op: vk::AttachmentStoreOp::DONT_CARE,
            initial_layout: vk::ImageLayout::UNDEFINED,
            final_layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
            ..Default::default()
        },
    ];
    let color_ref = vk::AttachmentReference {
        attachment: 0,
        layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
    };
    let depth_ref = vk::AttachmentReference {
        attachment: 1,
        layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
    };
    let subpass = vk::SubpassDescription {
        pipeline_bind_point: vk::PipelineBindPoint::GRAPHICS,
        color_attachment_count: 1,
        p_color_attachments: &color_ref,
        p_depth_stencil_attachment: &depth_ref,
        ..Default::default()
    };
    let dependencies = [
        vk::SubpassDependency {
            src_subpass: vk::SUBPASS_EXTERNAL,
            dst_subpass: 0,
            src_stage_mask: vk::PipelineStageFlags::BOTTOM_OF_PIPE,
            dst_stage_mask: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
                | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
            src_access_mask: vk::AccessFlags::MEMORY_READ,
            dst_access_mask: vk::AccessFlags::COLOR_ATTACHMENT_READ
                | vk::AccessFlags::COLOR_ATTACHMENT_WRITE
                | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
            dependency_flags: vk::DependencyFlags::BY_REGION,
        },
        vk::SubpassDependency {
            src_subpass: 0,
            dst_subpass: vk::SUBPASS_EXTERNAL,
            src_stage_mask: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            dst_stage_mask: vk::PipelineStageFlags::BOTTOM_OF_PIPE,
            src_access_mask: vk::AccessFlags::COLOR_ATTACHMENT_READ
                | vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
            dst_access_mask: vk::AccessFlags::MEMORY_READ,
            dependency_flags: vk::DependencyFlags::BY_REGION,
        },
    ];
    let info = vk::RenderPassCreateInfo {
        s_type: vk::StructureType::RENDER_PASS_CREATE_INFO,
        attachment_count: attachments.len() as u32,
        p_attachments: attachments.as_ptr(),
        subpass_count: 1,
        p_subpasses: &subpass,
        dependency_count: dependencies.len() as u32,
        p_dependencies: dependencies.as_ptr(),
        ..Default::default()
    };
    unsafe { device.create_render_pass(&info, None) }.map_err(VkError::call("vkCreateRenderPass"))
}

pub struct DepthBuffer {
    pub image: vk::Image,
    pub memory: vk::DeviceMemory,
    pub view: vk::ImageView,
}

/// Ash-backed [`TargetBackend`] bound to one render pass.
pub struct VkTargets {
    device: ash::Device,
    memory_properties: vk::PhysicalDeviceMemoryProperties,
    command_pool: vk::CommandPool,
    render_pass: vk::RenderPass,
    depth_format: vk::Format,
}

impl VkTargets {
    pub fn new(device: &Device, render_pass: vk::RenderPass, depth_format: vk::Format) -> Self {
        Self {
            device: device.logical().clone(),
            memory_properties: *device.memory_properties(),
            command_pool: device.command_pool(),
            render_pass,
            depth_format,
        }
    }

    pub fn render_pass(&self) -> vk::RenderPass {
        self.render_pass
    }

    pub fn depth_format(&self) -> vk::Format {
        self.depth_format
    }
}

impl TargetBackend for VkTargets {
    type Depth = DepthBuffer;
    type Framebuffer = vk::Framebuffer;
    type CommandBuffer = vk::CommandBuffer;
    type Error = VkError;

    fn create_depth(&self, extent: vk::Extent2D) -> VkResult<DepthBuffer> {
        let d = &self.device;
        let image_info = vk::ImageCreateInfo {
            s_type: vk::StructureType::IMAGE_CREATE_INFO,
            image_type: vk::ImageType::TYPE_2D,
            format: self.depth_format,
            extent: vk::Extent3D {
                width: extent.width,
                height: extent.height,
                depth: 1,
            },
            mip_levels: 1,
            array_layers: 1,
            samples: vk::SampleCountFlags::TYPE_1,
            tiling: vk::ImageTiling::OPTIMAL,
            usage: vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
            sharing_mode: vk::SharingMode::EXCLUSIVE,
            initial_layout: vk::ImageLayout::UNDEFINED,
            ..Default::default()
        };
        let image = unsafe { d.create_image(&image_info, None) }
            .map_err(VkError::call("vkCreateImage"))?;

        let req = unsafe { d.get_image_memory_requirements(image) };
        let flags = vk::MemoryPropertyFlags::DEVICE_LOCAL;
        let Some(type_index) = find_memory_type(&self.memory_properties, req.memory_type_bits, flags)
        else {
            unsafe { d.destroy_image(image, None) };
            return Err(VkError::NoMemoryType {
                type_bits: req.memory_type_bits,
                flags,
            });
        };
        let alloc = vk::MemoryAllocateInfo {
            s_type: vk::StructureType::MEMORY_ALLOCATE_INFO,
            allocation_size: req.size,
            memory_type_index: type_index,
            ..Default::default()
        };
        let memory = match unsafe { d.allocate_memory(&alloc, None) } {
            Ok(m) => m,
            Err(e) => {
                unsafe { d.destroy_image(image, None) };
                return Err(VkError::call("vkAllocateMemory")(e));
            }
        };

        let view = unsafe { d.bind_image_memory(image, memory, 0) }
            .map_err(VkError::call("vkBindImageMemory"))
            .and_then(|()| {
                let aspect = if matches!(
                    self.depth_format,
                    vk::Format::D24_UNORM_S8_UINT | vk::Format::D32_SFLOAT_S8_UINT
                ) {
                    vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
                } else {
                    vk::ImageAspectFlags::DEPTH
                };
                let view_info = vk::ImageViewCreateInfo {
                    s_type: vk::StructureType::IMAGE_VIEW_CREATE_INFO,
                    image,
                    view_type: vk::ImageViewType::TYPE_2D,
                    format: self.depth_format,
                    subresource_range: vk::ImageSubresourceRange {
                        aspect_mask: aspect,
                        base_mip_level: 0,
                        level_count: 1,
                        base_array_layer: 0,
                        layer_count: 1,
                    },
                    ..Default::default()
                };
                unsafe { d.create_image_view(&view_info, None) }
                    .map_err(VkError::call("vkCreateImageView"))
            });
        match view {
            Ok(view) => Ok(DepthBuffer {
                image,
                memory,
                view,
            }),
            Err(e) => {
                unsafe {
                    d.destroy_image(image, None);
                    d.free_memory(memory, None);
                }
                Err(e)
            }
        }
    }

    fn destroy_depth(&self, depth: DepthBuffer) {
        unsafe {
            self.device.destroy_image_view(depth.view, None);
            self.device.destroy_image(depth.image, None);
            self.device.free_memory(depth.memory, None);
        }
    }

    fn create_framebuffer(
        &self,
        color: vk::ImageView,
        depth: &DepthBuffer,
        extent: vk::Extent2D,
    ) -> VkResult<vk::Framebuffer> {
        let attachments = [color, depth.view];
        let info = vk::FramebufferCreateInfo {
            s_type: vk::StructureType::FRAMEBUFFER_CREATE_INFO,
            render_pass: self.render_pass,
            attachment_count: attachments.len() as u32,
            p_attachments: attachments.as_ptr(),
            width: extent.width,
            height: extent.height,
            layers: 1,
            ..Default::default()
        };
        unsafe { self.device.create_framebuffer(&info, None) }
            .map_err(VkError::call("vkCreateFramebuffer"))
    }

    fn destroy_framebuffer(&self, framebuffer: vk::Framebuffer) {
        unsafe { self.device.destroy_framebuffer(framebuffer, None) };
    }

    fn allocate_command_buffers(&self, count: u32) -> VkResult<Vec<vk::CommandBuffer>> {
        if count == 0 {
            return Ok(Vec::new());
        }
        let info = vk::CommandBufferAllocateInfo {
            s_type: vk::StructureType::COMMAND_BUFFER_ALLOCATE_INFO,
            command_pool: self.command_pool,
            level: vk::CommandBufferLevel::PRIMARY,
            command_buffer_count: count,
            ..Default::default()
        };
        unsafe { self.device.allocate_command_buffers(&info) }
            .map_err(VkError::call("vkAllocateCommandBuffers"))
    }

    fn free_command_buffers(&self, buffers: &[vk::CommandBuffer]) {
        unsafe { self.device.free_command_buffers(self.command_pool, buffers) };
    }
}
