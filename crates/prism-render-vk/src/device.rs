// SPDX-License-Identifier: CEPL-1.0
//! Physical-device selection and the logical device that mediates every
//! allocation and one-shot submission.

use std::ffi::{c_char, CStr, CString};

use ash::khr::{surface, swapchain};
use ash::{vk, Instance};
use tracing::{debug, info, warn};

use crate::error::{VkError, VkResult};

/// Fence timeout for one-shot submissions, in nanoseconds.
pub const DEFAULT_FENCE_TIMEOUT: u64 = 100_000_000_000;

const DISCRETE_BONUS: u32 = 1000;

const DEPTH_CANDIDATES: [vk::Format; 5] = [
    vk::Format::D32_SFLOAT_S8_UINT,
    vk::Format::D32_SFLOAT,
    vk::Format::D24_UNORM_S8_UINT,
    vk::Format::D16_UNORM_S8_UINT,
    vk::Format::D16_UNORM,
];

/// What scoring needs to know about one physical device.
#[derive(Clone, Debug, Default)]
pub struct DeviceCandidate {
    pub name: String,
    pub device_type: vk::PhysicalDeviceType,
    pub max_image_dimension_2d: u32,
    pub queue_flags: Vec<vk::QueueFlags>,
    /// Per-family present support; empty when no surface is involved.
    pub present_support: Vec<bool>,
    pub supports_swapchain: bool,
    pub surface_format_count: usize,
    pub present_mode_count: usize,
}

impl DeviceCandidate {
    fn has_graphics_present_family(&self) -> bool {
        self.queue_flags
            .iter()
            .zip(&self.present_support)
            .any(|(flags, &present)| flags.contains(vk::QueueFlags::GRAPHICS) && present)
    }
}

/// Zero means unsuitable.
pub fn score_device(candidate: &DeviceCandidate, surface_required: bool) -> u32 {
    if surface_required
        && (!candidate.has_graphics_present_family()
            || !candidate.supports_swapchain
            || candidate.surface_format_count == 0
            || candidate.present_mode_count == 0)
    {
        return 0;
    }
    let mut score = 0u32;
    if candidate.device_type == vk::PhysicalDeviceType::DISCRETE_GPU {
        score += DISCRETE_BONUS;
    }
    score.saturating_add(candidate.max_image_dimension_2d)
}

/// Index of the best candidate. Ties keep the earliest one.
pub fn select_device(candidates: &[DeviceCandidate], surface_required: bool) -> VkResult<usize> {
    let mut best: Option<(usize, u32)> = None;
    for (i, c) in candidates.iter().enumerate() {
        let score = score_device(c, surface_required);
        debug!("device {i} '{}' scores {score}", c.name);
        if score == 0 {
            continue;
        }
        if best.map_or(true, |(_, s)| score > s) {
            best = Some((i, score));
        }
    }
    best.map(|(i, _)| i).ok_or(VkError::NoSuitableDevice)
}

/// Finds a family for `requested`. Compute prefers a family without graphics,
/// transfer one without graphics or compute, so they can overlap with a
/// graphics queue; otherwise the first family with the capability wins.
pub fn resolve_queue_family(
    families: &[vk::QueueFlags],
    requested: vk::QueueFlags,
) -> VkResult<u32> {
    let dedicated = if requested.contains(vk::QueueFlags::COMPUTE) {
        families.iter().position(|f| {
            f.contains(vk::QueueFlags::COMPUTE) && !f.contains(vk::QueueFlags::GRAPHICS)
        })
    } else if requested.contains(vk::QueueFlags::TRANSFER) {
        families.iter().position(|f| {
            f.contains(vk::QueueFlags::TRANSFER)
                && !f.intersects(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE)
        })
    } else {
        None
    };

    dedicated
        .or_else(|| families.iter().position(|f| f.contains(requested)))
        .map(|i| i as u32)
        .ok_or(VkError::NoQueueFamily(requested))
}

/// First memory type allowed by `type_bits` with all of `flags`.
pub fn find_memory_type(
    props: &vk::PhysicalDeviceMemoryProperties,
    type_bits: u32,
    flags: vk::MemoryPropertyFlags,
) -> Option<u32> {
    let count = (props.memory_type_count as usize).min(props.memory_types.len());
    props.memory_types[..count]
        .iter()
        .enumerate()
        .find(|&(i, ty)| type_bits & (1u32 << i) != 0 && ty.property_flags.contains(flags))
        .map(|(i, _)| i as u32)
}

/// Initial data must fit inside the buffer it fills.
pub fn check_upload_size(len: usize, size: vk::DeviceSize) -> VkResult<()> {
    let len = len as u64;
    if len > size {
        return Err(VkError::DataTooLarge { len, size });
    }
    Ok(())
}

/// Graphics/compute/transfer roles; indices may alias.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    pub graphics: u32,
    pub compute: u32,
    pub transfer: u32,
}

impl QueueFamilyIndices {
    pub fn resolve(
        families: &[vk::QueueFlags],
        requested: vk::QueueFlags,
        graphics_override: Option<u32>,
    ) -> VkResult<Self> {
        let graphics = match graphics_override {
            Some(i) => i,
            None => resolve_queue_family(families, vk::QueueFlags::GRAPHICS)?,
        };
        let compute = if requested.contains(vk::QueueFlags::COMPUTE) {
            resolve_queue_family(families, vk::QueueFlags::COMPUTE)?
        } else {
            graphics
        };
        let transfer = if requested.contains(vk::QueueFlags::TRANSFER) {
            resolve_queue_family(families, vk::QueueFlags::TRANSFER)?
        } else {
            graphics
        };
        Ok(Self {
            graphics,
            compute,
            transfer,
        })
    }

    /// Distinct family indices, graphics first.
    pub fn unique(&self) -> Vec<u32> {
        let mut out = vec![self.graphics];
        for i in [self.compute, self.transfer] {
            if !out.contains(&i) {
                out.push(i);
            }
        }
        out
    }
}

/// Describes each physical device for scoring. With a surface, present
/// support and surface format/mode counts are filled in.
pub fn describe_physical_devices(
    instance: &Instance,
    surface: Option<(&surface::Instance, vk::SurfaceKHR)>,
) -> VkResult<Vec<(vk::PhysicalDevice, DeviceCandidate)>> {
    let physicals = unsafe { instance.enumerate_physical_devices() }
        .map_err(VkError::call("vkEnumeratePhysicalDevices"))?;

    let mut out = Vec::with_capacity(physicals.len());
    for phys in physicals {
        let props = unsafe { instance.get_physical_device_properties(phys) };
        let families = unsafe { instance.get_physical_device_queue_family_properties(phys) };
        let extensions = unsafe { instance.enumerate_device_extension_properties(phys) }
            .map_err(VkError::call("vkEnumerateDeviceExtensionProperties"))?;
        let supports_swapchain = extensions
            .iter()
            .any(|e| e.extension_name_as_c_str().map(|n| n == swapchain::NAME).unwrap_or(false));

        let mut candidate = DeviceCandidate {
            name: props
                .device_name_as_c_str()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            device_type: props.device_type,
            max_image_dimension_2d: props.limits.max_image_dimension2_d,
            queue_flags: families.iter().map(|f| f.queue_flags).collect(),
            supports_swapchain,
            ..Default::default()
        };

        if let Some((loader, surface)) = surface {
            for i in 0..families.len() as u32 {
                let present = unsafe {
                    loader.get_physical_device_surface_support(phys, i, surface)
                }
                .map_err(VkError::call("vkGetPhysicalDeviceSurfaceSupportKHR"))?;
                candidate.present_support.push(present);
            }
            if supports_swapchain {
                candidate.surface_format_count =
                    unsafe { loader.get_physical_device_surface_formats(phys, surface) }
                        .map_err(VkError::call("vkGetPhysicalDeviceSurfaceFormatsKHR"))?
                        .len();
                candidate.present_mode_count =
                    unsafe { loader.get_physical_device_surface_present_modes(phys, surface) }
                        .map_err(VkError::call("vkGetPhysicalDeviceSurfacePresentModesKHR"))?
                        .len();
            }
        }
        out.push((phys, candidate));
    }
    Ok(out)
}

/// Scores every physical device and returns the winner.
pub fn pick_physical_device(
    instance: &Instance,
    surface: Option<(&surface::Instance, vk::SurfaceKHR)>,
) -> VkResult<vk::PhysicalDevice> {
    let described = describe_physical_devices(instance, surface)?;
    let candidates: Vec<DeviceCandidate> = described.iter().map(|(_, c)| c.clone()).collect();
    let index = select_device(&candidates, surface.is_some())?;
    let (phys, chosen) = &described[index];
    info!(
        "selected GPU '{}' ({:?}, score {})",
        chosen.name,
        chosen.device_type,
        score_device(chosen, surface.is_some())
    );
    Ok(*phys)
}

#[derive(Clone, Debug)]
pub struct DeviceRequest {
    pub queues: vk::QueueFlags,
    pub extensions: Vec<CString>,
    /// Forces the graphics family, e.g. to the one that can also present.
    pub graphics_family: Option<u32>,
}

impl Default for DeviceRequest {
    fn default() -> Self {
        Self {
            queues: vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER,
            extensions: vec![swapchain::NAME.to_owned()],
            graphics_family: None,
        }
    }
}

/// A buffer bound to its own allocation.
#[derive(Clone, Copy, Debug)]
pub struct AllocatedBuffer {
    pub buffer: vk::Buffer,
    pub memory: vk::DeviceMemory,
    pub size: vk::DeviceSize,
}

/// Selected GPU plus logical device. Everything allocated through it dies
/// with it, so it is dropped after every presenter.
pub struct Device {
    instance: Instance,
    physical: vk::PhysicalDevice,
    logical: ash::Device,
    properties: vk::PhysicalDeviceProperties,
    memory_properties: vk::PhysicalDeviceMemoryProperties,
    queue_families: QueueFamilyIndices,
    supported_extensions: Vec<String>,
    command_pool: vk::CommandPool,
    graphics_queue: vk::Queue,
}

impl Device {
    pub fn new(
        instance: &Instance,
        physical: vk::PhysicalDevice,
        request: &DeviceRequest,
    ) -> VkResult<Self> {
        Self::create_with(instance, physical, request, |info| {
            unsafe { instance.create_device(physical, info, None) }
                .map_err(VkError::call("vkCreateDevice"))
        })
    }

    /// Builds queue and extension lists for `request`, then lets `create`
    /// produce the logical device.
    pub fn create_with<F>(
        instance: &Instance,
        physical: vk::PhysicalDevice,
        request: &DeviceRequest,
        create: F,
    ) -> VkResult<Self>
    where
        F: FnOnce(&vk::DeviceCreateInfo<'_>) -> VkResult<ash::Device>,
    {
        let properties = unsafe { instance.get_physical_device_properties(physical) };
        let memory_properties = unsafe { instance.get_physical_device_memory_properties(physical) };
        let family_flags: Vec<vk::QueueFlags> =
            unsafe { instance.get_physical_device_queue_family_properties(physical) }
                .iter()
                .map(|f| f.queue_flags)
                .collect();
        let queue_families =
            QueueFamilyIndices::resolve(&family_flags, request.queues, request.graphics_family)?;

        let supported_extensions: Vec<String> =
            unsafe { instance.enumerate_device_extension_properties(physical) }
                .map_err(VkError::call("vkEnumerateDeviceExtensionProperties"))?
                .iter()
                .filter_map(|e| e.extension_name_as_c_str().ok())
                .map(|n| n.to_string_lossy().into_owned())
                .collect();

        let mut extensions = request.extensions.clone();
        let marker = ash::ext::debug_marker::NAME;
        if supported_extensions.iter().any(|e| e.as_bytes() == marker.to_bytes())
            && !extensions.iter().any(|e| e.as_c_str() == marker)
        {
            extensions.push(marker.to_owned());
        }
        for ext in &extensions {
            let name = ext.to_string_lossy();
            if !supported_extensions.iter().any(|e| *e == name) {
                warn!("device extension {name} not reported as supported");
            }
        }
        let ext_ptrs: Vec<*const c_char> = extensions.iter().map(|e| e.as_ptr()).collect();

        let priorities = [1.0_f32];
        let queue_infos: Vec<vk::DeviceQueueCreateInfo<'_>> = queue_families
            .unique()
            .into_iter()
            .map(|family| vk::DeviceQueueCreateInfo {
                s_type: vk::StructureType::DEVICE_QUEUE_CREATE_INFO,
                queue_family_index: family,
                queue_count: 1,
                p_queue_priorities: priorities.as_ptr(),
                ..Default::default()
            })
            .collect();

        let features = vk::PhysicalDeviceFeatures::default();
        let create_info = vk::DeviceCreateInfo {
            s_type: vk::StructureType::DEVICE_CREATE_INFO,
            queue_create_info_count: queue_infos.len() as u32,
            p_queue_create_infos: queue_infos.as_ptr(),
            enabled_extension_count: ext_ptrs.len() as u32,
            pp_enabled_extension_names: ext_ptrs.as_ptr(),
            p_enabled_features: &features,
            ..Default::default()
        };

        let logical = create(&create_info)?;
        let graphics_queue = unsafe { logical.get_device_queue(queue_families.graphics, 0) };

        let pool_info = vk::CommandPoolCreateInfo {
            s_type: vk::StructureType::COMMAND_POOL_CREATE_INFO,
            queue_family_index: queue_families.graphics,
            flags: vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER,
            ..Default::default()
        };
        let command_pool = match unsafe { logical.create_command_pool(&pool_info, None) } {
            Ok(pool) => pool,
            Err(e) => {
                unsafe { logical.destroy_device(None) };
                return Err(VkError::call("vkCreateCommandPool")(e));
            }
        };

        info!(
            "logical device ready: queues g{} c{} t{}, {} extensions",
            queue_families.graphics,
            queue_families.compute,
            queue_families.transfer,
            extensions.len()
        );

        Ok(Self {
            instance: instance.clone(),
            physical,
            logical,
            properties,
            memory_properties,
            queue_families,
            supported_extensions,
            command_pool,
            graphics_queue,
        })
    }

    pub fn physical(&self) -> vk::PhysicalDevice {
        self.physical
    }

    pub fn logical(&self) -> &ash::Device {
        &self.logical
    }

    pub fn instance(&self) -> &Instance {
        &self.instance
    }

    pub fn properties(&self) -> &vk::PhysicalDeviceProperties {
        &self.properties
    }

    pub fn memory_properties(&self) -> &vk::PhysicalDeviceMemoryProperties {
        &self.memory_properties
    }

    pub fn queue_families(&self) -> QueueFamilyIndices {
        self.queue_families
    }

    pub fn graphics_queue(&self) -> vk::Queue {
        self.graphics_queue
    }

    pub fn command_pool(&self) -> vk::CommandPool {
        self.command_pool
    }

    pub fn extension_supported(&self, name: &CStr) -> bool {
        let name = name.to_string_lossy();
        self.supported_extensions.iter().any(|e| *e == name)
    }

    pub fn memory_type(&self, type_bits: u32, flags: vk::MemoryPropertyFlags) -> VkResult<u32> {
        find_memory_type(&self.memory_properties, type_bits, flags)
            .ok_or(VkError::NoMemoryType { type_bits, flags })
    }

    /// First depth format usable as an optimal-tiling attachment.
    pub fn supported_depth_format(&self) -> VkResult<vk::Format> {
        DEPTH_CANDIDATES
            .into_iter()
            .find(|&format| {
                let props = unsafe {
                    self.instance
                        .get_physical_device_format_properties(self.physical, format)
                };
                props
                    .optimal_tiling_features
                    .contains(vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT)
            })
            .ok_or(VkError::NoDepthFormat)
    }

    pub fn wait_idle(&self) -> VkResult<()> {
        unsafe { self.logical.device_wait_idle() }.map_err(VkError::call("vkDeviceWaitIdle"))
    }

    /// Creates a buffer with memory matching `properties` and, when `data`
    /// is given, fills it through a temporary mapping.
    pub fn allocate_buffer(
        &self,
        usage: vk::BufferUsageFlags,
        properties: vk::MemoryPropertyFlags,
        size: vk::DeviceSize,
        data: Option<&[u8]>,
    ) -> VkResult<AllocatedBuffer> {
        if let Some(bytes) = data {
            check_upload_size(bytes.len(), size)?;
        }
        let d = &self.logical;
        let info = vk::BufferCreateInfo {
            s_type: vk::StructureType::BUFFER_CREATE_INFO,
            size,
            usage,
            sharing_mode: vk::SharingMode::EXCLUSIVE,
            ..Default::default()
        };
        let buffer =
            unsafe { d.create_buffer(&info, None) }.map_err(VkError::call("vkCreateBuffer"))?;

        let req = unsafe { d.get_buffer_memory_requirements(buffer) };
        let memory_type_index = match self.memory_type(req.memory_type_bits, properties) {
            Ok(i) => i,
            Err(e) => {
                unsafe { d.destroy_buffer(buffer, None) };
                return Err(e);
            }
        };
        let alloc = vk::MemoryAllocateInfo {
            s_type: vk::StructureType::MEMORY_ALLOCATE_INFO,
            allocation_size: req.size,
            memory_type_index,
            ..Default::default()
        };

        let result = unsafe {
            d.allocate_memory(&alloc, None)
                .map_err(VkError::call("vkAllocateMemory"))
                .and_then(|memory| {
                    let filled = d
                        .bind_buffer_memory(buffer, memory, 0)
                        .map_err(VkError::call("vkBindBufferMemory"))
                        .and_then(|()| match data {
                            Some(bytes) => self.fill_memory(memory, properties, bytes),
                            None => Ok(()),
                        });
                    match filled {
                        Ok(()) => Ok(memory),
                        Err(e) => {
                            d.free_memory(memory, None);
                            Err(e)
                        }
                    }
                })
        };

        match result {
            Ok(memory) => Ok(AllocatedBuffer {
                buffer,
                memory,
                size,
            }),
            Err(e) => {
                unsafe { d.destroy_buffer(buffer, None) };
                Err(e)
            }
        }
    }

    /// [`Device::allocate_buffer`] for a slice of plain-old-data values.
    pub fn allocate_buffer_with<T: bytemuck::Pod>(
        &self,
        usage: vk::BufferUsageFlags,
        properties: vk::MemoryPropertyFlags,
        data: &[T],
    ) -> VkResult<AllocatedBuffer> {
        let bytes: &[u8] = bytemuck::cast_slice(data);
        self.allocate_buffer(usage, properties, bytes.len() as vk::DeviceSize, Some(bytes))
    }

    /// `bytes` must already be checked against the buffer size.
    fn fill_memory(
        &self,
        memory: vk::DeviceMemory,
        properties: vk::MemoryPropertyFlags,
        bytes: &[u8],
    ) -> VkResult<()> {
        let d = &self.logical;
        unsafe {
            let ptr = d
                .map_memory(memory, 0, vk::WHOLE_SIZE, vk::MemoryMapFlags::empty())
                .map_err(VkError::call("vkMapMemory"))?;
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), ptr.cast::<u8>(), bytes.len());
            let flushed = if properties.contains(vk::MemoryPropertyFlags::HOST_COHERENT) {
                Ok(())
            } else {
                let range = vk::MappedMemoryRange {
                    s_type: vk::StructureType::MAPPED_MEMORY_RANGE,
                    memory,
                    offset: 0,
                    size: vk::WHOLE_SIZE,
                    ..Default::default()
                };
                d.flush_mapped_memory_ranges(std::slice::from_ref(&range))
                    .map_err(VkError::call("vkFlushMappedMemoryRanges"))
            };
            d.unmap_memory(memory);
            flushed
        }
    }

    pub fn destroy_buffer(&self, buffer: AllocatedBuffer) {
        unsafe {
            self.logical.destroy_buffer(buffer.buffer, None);
            self.logical.free_memory(buffer.memory, None);
        }
    }

    /// Allocates a primary or secondary buffer from the default pool,
    /// optionally already begun for one-time submission.
    pub fn create_command_buffer(
        &self,
        level: vk::CommandBufferLevel,
        begin: bool,
    ) -> VkResult<vk::CommandBuffer> {
        let info = vk::CommandBufferAllocateInfo {
            s_type: vk::StructureType::COMMAND_BUFFER_ALLOCATE_INFO,
            command_pool: self.command_pool,
            level,
            command_buffer_count: 1,
            ..Default::default()
        };
        let cmd = unsafe { self.logical.allocate_command_buffers(&info) }
            .map_err(VkError::call("vkAllocateCommandBuffers"))?[0];
        if begin {
            let begin_info = vk::CommandBufferBeginInfo {
                s_type: vk::StructureType::COMMAND_BUFFER_BEGIN_INFO,
                flags: vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT,
                ..Default::default()
            };
            if let Err(e) = unsafe { self.logical.begin_command_buffer(cmd, &begin_info) } {
                unsafe {
                    self.logical
                        .free_command_buffers(self.command_pool, std::slice::from_ref(&cmd))
                };
                return Err(VkError::call("vkBeginCommandBuffer")(e));
            }
        }
        Ok(cmd)
    }

    /// Ends `cmd`, submits it to `queue` and blocks on a fence until it has
    /// executed. Load-time only; never call this from the frame loop.
    pub fn flush_command_buffer(
        &self,
        cmd: vk::CommandBuffer,
        queue: vk::Queue,
        free: bool,
    ) -> VkResult<()> {
        let d = &self.logical;
        unsafe {
            d.end_command_buffer(cmd)
                .map_err(VkError::call("vkEndCommandBuffer"))?;

            let fence_info = vk::FenceCreateInfo {
                s_type: vk::StructureType::FENCE_CREATE_INFO,
                ..Default::default()
            };
            let fence = d
                .create_fence(&fence_info, None)
                .map_err(VkError::call("vkCreateFence"))?;

            let submit = vk::SubmitInfo {
                s_type: vk::StructureType::SUBMIT_INFO,
                command_buffer_count: 1,
                p_command_buffers: &cmd,
                ..Default::default()
            };
            let waited = d
                .queue_submit(queue, std::slice::from_ref(&submit), fence)
                .map_err(VkError::call("vkQueueSubmit"))
                .and_then(|()| {
                    d.wait_for_fences(&[fence], true, DEFAULT_FENCE_TIMEOUT)
                        .map_err(VkError::call("vkWaitForFences"))
                });
            d.destroy_fence(fence, None);

            if free {
                d.free_command_buffers(self.command_pool, std::slice::from_ref(&cmd));
            }
            waited
        }
    }

    /// One-shot copy between buffers on the graphics queue.
    pub fn copy_buffer(
        &self,
        src: &AllocatedBuffer,
        dst: &AllocatedBuffer,
        region: Option<vk::BufferCopy>,
    ) -> VkResult<()> {
        let region = region.unwrap_or(vk::BufferCopy {
            src_offset: 0,
            dst_offset: 0,
            size: src.size.min(dst.size),
        });
        let cmd = self.create_command_buffer(vk::CommandBufferLevel::PRIMARY, true)?;
        unsafe {
            self.logical
                .cmd_copy_buffer(cmd, src.buffer, dst.buffer, std::slice::from_ref(&region))
        };
        self.flush_command_buffer(cmd, self.graphics_queue, true)
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        unsafe {
            self.logical.device_wait_idle().ok();
            self.logical.destroy_command_pool(self.command_pool, None);
            self.logical.destroy_device(None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gpu(name: &str, ty: vk::PhysicalDeviceType, max_dim: u32) -> DeviceCandidate {
        DeviceCandidate {
            name: name.into(),
            device_type: ty,
            max_image_dimension_2d: max_dim,
            queue_flags: vec![
                vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER,
            ],
            present_support: vec![true],
            supports_swapchain: true,
            surface_format_count: 2,
            present_mode_count: 1,
        }
    }

    #[test]
    fn discrete_beats_integrated() {
        let integrated = gpu("igpu", vk::PhysicalDeviceType::INTEGRATED_GPU, 4096);
        let discrete = gpu("dgpu", vk::PhysicalDeviceType::DISCRETE_GPU, 8192);
        assert_eq!(score_device(&discrete, true), 1000 + 8192);
        assert_eq!(score_device(&integrated, true), 4096);
        assert_eq!(select_device(&[integrated, discrete], true).unwrap(), 1);
    }

    #[test]
    fn integrated_with_bigger_limits_can_still_lose() {
        let integrated = gpu("igpu", vk::PhysicalDeviceType::INTEGRATED_GPU, 8192);
        let discrete = gpu("dgpu", vk::PhysicalDeviceType::DISCRETE_GPU, 8000);
        assert_eq!(select_device(&[integrated, discrete], true).unwrap(), 1);
    }

    #[test]
    fn ties_keep_first() {
        let a = gpu("a", vk::PhysicalDeviceType::DISCRETE_GPU, 8192);
        let b = gpu("b", vk::PhysicalDeviceType::DISCRETE_GPU, 8192);
        assert_eq!(select_device(&[a, b], true).unwrap(), 0);
    }

    #[test]
    fn no_present_family_scores_zero() {
        let mut c = gpu("headless", vk::PhysicalDeviceType::DISCRETE_GPU, 16384);
        c.present_support = vec![false];
        assert_eq!(score_device(&c, true), 0);
        // Without a surface present support is irrelevant.
        assert_eq!(score_device(&c, false), 1000 + 16384);
    }

    #[test]
    fn graphics_and_present_on_different_families_scores_zero() {
        let mut c = gpu("split", vk::PhysicalDeviceType::DISCRETE_GPU, 8192);
        c.queue_flags = vec![vk::QueueFlags::GRAPHICS, vk::QueueFlags::TRANSFER];
        c.present_support = vec![false, true];
        assert_eq!(score_device(&c, true), 0);
    }

    #[test]
    fn missing_surface_formats_or_modes_scores_zero() {
        let mut c = gpu("x", vk::PhysicalDeviceType::DISCRETE_GPU, 8192);
        c.surface_format_count = 0;
        assert_eq!(score_device(&c, true), 0);
        let mut c = gpu("y", vk::PhysicalDeviceType::DISCRETE_GPU, 8192);
        c.present_mode_count = 0;
        assert_eq!(score_device(&c, true), 0);
        let mut c = gpu("z", vk::PhysicalDeviceType::DISCRETE_GPU, 8192);
        c.supports_swapchain = false;
        assert_eq!(score_device(&c, true), 0);
    }

    #[test]
    fn no_suitable_device() {
        let mut c = gpu("x", vk::PhysicalDeviceType::DISCRETE_GPU, 8192);
        c.present_support = vec![false];
        assert!(matches!(select_device(&[c], true), Err(VkError::NoSuitableDevice)));
        assert!(matches!(select_device(&[], false), Err(VkError::NoSuitableDevice)));
    }

    #[test]
    fn compute_prefers_family_without_graphics() {
        let families = [
            vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER,
            vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER,
            vk::QueueFlags::TRANSFER,
        ];
        assert_eq!(resolve_queue_family(&families, vk::QueueFlags::COMPUTE).unwrap(), 1);
        assert_eq!(resolve_queue_family(&families, vk::QueueFlags::TRANSFER).unwrap(), 2);
        assert_eq!(resolve_queue_family(&families, vk::QueueFlags::GRAPHICS).unwrap(), 0);
    }

    #[test]
    fn falls_back_to_first_capable_family() {
        let families = [
            vk::QueueFlags::TRANSFER,
            vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER,
        ];
        assert_eq!(resolve_queue_family(&families, vk::QueueFlags::COMPUTE).unwrap(), 1);
        // Family 0 is transfer-only, so it is the dedicated pick.
        assert_eq!(resolve_queue_family(&families, vk::QueueFlags::TRANSFER).unwrap(), 0);

        let families = [vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER];
        assert_eq!(resolve_queue_family(&families, vk::QueueFlags::TRANSFER).unwrap(), 0);
    }

    #[test]
    fn missing_capability_is_an_error() {
        let families = [vk::QueueFlags::TRANSFER];
        assert!(matches!(
            resolve_queue_family(&families, vk::QueueFlags::GRAPHICS),
            Err(VkError::NoQueueFamily(f)) if f == vk::QueueFlags::GRAPHICS
        ));
    }

    #[test]
    fn indices_alias_when_not_requested() {
        let families = [
            vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER,
            vk::QueueFlags::COMPUTE,
        ];
        let idx = QueueFamilyIndices::resolve(&families, vk::QueueFlags::GRAPHICS, None).unwrap();
        assert_eq!((idx.graphics, idx.compute, idx.transfer), (0, 0, 0));
        assert_eq!(idx.unique(), vec![0]);

        let idx = QueueFamilyIndices::resolve(
            &families,
            vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER,
            None,
        )
        .unwrap();
        assert_eq!((idx.graphics, idx.compute, idx.transfer), (0, 1, 0));
        assert_eq!(idx.unique(), vec![0, 1]);
    }

    #[test]
    fn graphics_override_wins() {
        let families = [vk::QueueFlags::GRAPHICS, vk::QueueFlags::GRAPHICS];
        let idx = QueueFamilyIndices::resolve(&families, vk::QueueFlags::GRAPHICS, Some(1)).unwrap();
        assert_eq!(idx.graphics, 1);
    }

    fn memory(types: &[vk::MemoryPropertyFlags]) -> vk::PhysicalDeviceMemoryProperties {
        let mut props = vk::PhysicalDeviceMemoryProperties {
            memory_type_count: types.len() as u32,
            ..Default::default()
        };
        for (slot, &flags) in props.memory_types.iter_mut().zip(types) {
            slot.property_flags = flags;
        }
        props
    }

    #[test]
    fn upload_must_fit_buffer() {
        assert!(check_upload_size(16, 16).is_ok());
        assert!(check_upload_size(0, 16).is_ok());
        assert!(matches!(
            check_upload_size(64, 16),
            Err(VkError::DataTooLarge { len: 64, size: 16 })
        ));
    }

    #[test]
    fn memory_type_first_match_wins() {
        let props = memory(&[
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
            vk::MemoryPropertyFlags::HOST_VISIBLE,
        ]);
        assert_eq!(
            find_memory_type(&props, 0b111, vk::MemoryPropertyFlags::HOST_VISIBLE),
            Some(1)
        );
        assert_eq!(
            find_memory_type(&props, 0b100, vk::MemoryPropertyFlags::HOST_VISIBLE),
            Some(2)
        );
        assert_eq!(
            find_memory_type(&props, 0b111, vk::MemoryPropertyFlags::DEVICE_LOCAL),
            Some(0)
        );
    }

    #[test]
    fn memory_type_respects_bits_and_count() {
        let props = memory(&[vk::MemoryPropertyFlags::DEVICE_LOCAL]);
        assert_eq!(
            find_memory_type(&props, 0b10, vk::MemoryPropertyFlags::DEVICE_LOCAL),
            None
        );
        assert_eq!(
            find_memory_type(&props, 0b1, vk::MemoryPropertyFlags::HOST_VISIBLE),
            None
        );
    }
}
