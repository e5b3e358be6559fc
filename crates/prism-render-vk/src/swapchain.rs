// SPDX-License-Identifier: CEPL-1.0
//! Window-surface swapchain.
//!
//! Lifecycle: Uninitialized -> SurfaceBound -> Created <-> Stale -> Destroyed.
//! Recreation keeps the same `Swapchain` value and hands the old handle to the
//! driver so presentation can switch over without a gap.

use ash::khr::{surface, swapchain};
use ash::vk;
use prism_render::RenderSize;
use tracing::{debug, info};

use crate::device::Device;
use crate::error::{VkError, VkResult};
use crate::instance::VkContext;

pub const PREFERRED_FORMAT: vk::Format = vk::Format::B8G8R8A8_UNORM;

const COMPOSITE_ALPHA_PREFERENCE: [vk::CompositeAlphaFlagsKHR; 4] = [
    vk::CompositeAlphaFlagsKHR::OPAQUE,
    vk::CompositeAlphaFlagsKHR::PRE_MULTIPLIED,
    vk::CompositeAlphaFlagsKHR::POST_MULTIPLIED,
    vk::CompositeAlphaFlagsKHR::INHERIT,
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SwapchainState {
    Uninitialized,
    SurfaceBound,
    Created,
    /// Out of date or suboptimal; must be recreated before the next acquire.
    Stale,
    Destroyed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AcquireOutcome {
    Acquired { index: u32, suboptimal: bool },
    OutOfDate,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PresentOutcome {
    Presented,
    Suboptimal,
    OutOfDate,
}

/// Packed BGRA wins wherever it appears. A lone UNDEFINED entry means the
/// surface has no preference. Otherwise the first entry is used.
pub fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> VkResult<vk::SurfaceFormatKHR> {
    let first = *formats.first().ok_or(VkError::NoSurfaceFormats)?;
    if formats.len() == 1 && first.format == vk::Format::UNDEFINED {
        return Ok(vk::SurfaceFormatKHR {
            format: PREFERRED_FORMAT,
            color_space: first.color_space,
        });
    }
    Ok(formats
        .iter()
        .copied()
        .find(|f| f.format == PREFERRED_FORMAT)
        .unwrap_or(first))
}

/// The same preference over a bare format list (XR runtimes report formats
/// without color spaces).
pub fn choose_color_format(formats: &[vk::Format]) -> Option<vk::Format> {
    if formats == [vk::Format::UNDEFINED] {
        return Some(PREFERRED_FORMAT);
    }
    formats
        .iter()
        .copied()
        .find(|&f| f == PREFERRED_FORMAT)
        .or_else(|| formats.first().copied())
}

/// FIFO with vsync. Without it: mailbox, then immediate, then FIFO, which
/// every implementation must support.
pub fn choose_present_mode(modes: &[vk::PresentModeKHR], vsync: bool) -> vk::PresentModeKHR {
    if vsync {
        return vk::PresentModeKHR::FIFO;
    }
    [vk::PresentModeKHR::MAILBOX, vk::PresentModeKHR::IMMEDIATE]
        .into_iter()
        .find(|m| modes.contains(m))
        .unwrap_or(vk::PresentModeKHR::FIFO)
}

/// One more than the minimum, clamped to the maximum when there is one.
pub fn choose_image_count(caps: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let desired = caps.min_image_count + 1;
    if caps.max_image_count > 0 {
        desired.min(caps.max_image_count)
    } else {
        desired
    }
}

/// A current extent of `u32::MAX` lets the swapchain pick its size.
pub fn choose_extent(caps: &vk::SurfaceCapabilitiesKHR, want: RenderSize) -> vk::Extent2D {
    if caps.current_extent.width == u32::MAX {
        vk::Extent2D {
            width: want.width,
            height: want.height,
        }
    } else {
        caps.current_extent
    }
}

pub fn choose_pre_transform(caps: &vk::SurfaceCapabilitiesKHR) -> vk::SurfaceTransformFlagsKHR {
    if caps
        .supported_transforms
        .contains(vk::SurfaceTransformFlagsKHR::IDENTITY)
    {
        vk::SurfaceTransformFlagsKHR::IDENTITY
    } else {
        caps.current_transform
    }
}

pub fn choose_composite_alpha(caps: &vk::SurfaceCapabilitiesKHR) -> vk::CompositeAlphaFlagsKHR {
    COMPOSITE_ALPHA_PREFERENCE
        .into_iter()
        .find(|&a| caps.supported_composite_alpha.contains(a))
        .unwrap_or(vk::CompositeAlphaFlagsKHR::OPAQUE)
}

/// Color attachment, plus transfer source/destination when the surface
/// allows them (screenshots, blits).
pub fn choose_image_usage(caps: &vk::SurfaceCapabilitiesKHR) -> vk::ImageUsageFlags {
    let mut usage = vk::ImageUsageFlags::COLOR_ATTACHMENT;
    for extra in [
        vk::ImageUsageFlags::TRANSFER_SRC,
        vk::ImageUsageFlags::TRANSFER_DST,
    ] {
        if caps.supported_usage_flags.contains(extra) {
            usage |= extra;
        }
    }
    usage
}

/// First family that does both graphics and present. Split families are not
/// supported.
pub fn graphics_present_family(flags: &[vk::QueueFlags], present: &[bool]) -> VkResult<u32> {
    let shared = flags
        .iter()
        .zip(present)
        .position(|(f, &p)| f.contains(vk::QueueFlags::GRAPHICS) && p);
    if let Some(i) = shared {
        return Ok(i as u32);
    }
    let any_graphics = flags.iter().any(|f| f.contains(vk::QueueFlags::GRAPHICS));
    let any_present = present.iter().any(|&p| p);
    if any_graphics && any_present {
        Err(VkError::SplitPresentQueue)
    } else {
        Err(VkError::NoPresentQueue)
    }
}

/// Checks that `graphics`, the family the device already submits on, can also
/// present. Any other shared family would still mean a split queue.
pub fn require_present_on(
    graphics: u32,
    flags: &[vk::QueueFlags],
    present: &[bool],
) -> VkResult<()> {
    let graphics_ok = flags
        .get(graphics as usize)
        .is_some_and(|f| f.contains(vk::QueueFlags::GRAPHICS));
    if graphics_ok && present.get(graphics as usize).copied().unwrap_or(false) {
        return Ok(());
    }
    graphics_present_family(flags, present).and(Err(VkError::SplitPresentQueue))
}

/// Queue flags and surface support for every family of `physical`.
fn surface_support(
    context: &VkContext,
    physical: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
) -> VkResult<(Vec<vk::QueueFlags>, Vec<bool>)> {
    let families = unsafe {
        context
            .instance()
            .get_physical_device_queue_family_properties(physical)
    };
    let flags: Vec<vk::QueueFlags> = families.iter().map(|f| f.queue_flags).collect();
    let mut present = Vec::with_capacity(families.len());
    for i in 0..families.len() as u32 {
        present.push(
            unsafe {
                context
                    .surface_loader()
                    .get_physical_device_surface_support(physical, i, surface)
            }
            .map_err(VkError::call("vkGetPhysicalDeviceSurfaceSupportKHR"))?,
        );
    }
    Ok((flags, present))
}

/// Queries present support per family and applies [`graphics_present_family`].
pub fn surface_queue_family(
    context: &VkContext,
    physical: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
) -> VkResult<u32> {
    let (flags, present) = surface_support(context, physical, surface)?;
    graphics_present_family(&flags, &present)
}

/// 2D color view over a swapchain or compositor image.
pub fn create_color_view(
    device: &ash::Device,
    image: vk::Image,
    format: vk::Format,
) -> VkResult<vk::ImageView> {
    let info = vk::ImageViewCreateInfo {
        s_type: vk::StructureType::IMAGE_VIEW_CREATE_INFO,
        image,
        view_type: vk::ImageViewType::TYPE_2D,
        format,
        components: vk::ComponentMapping {
            r: vk::ComponentSwizzle::R,
            g: vk::ComponentSwizzle::G,
            b: vk::ComponentSwizzle::B,
            a: vk::ComponentSwizzle::A,
        },
        subresource_range: vk::ImageSubresourceRange {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 0,
            layer_count: 1,
        },
        ..Default::default()
    };
    unsafe { device.create_image_view(&info, None) }.map_err(VkError::call("vkCreateImageView"))
}

pub struct Swapchain {
    surface_loader: surface::Instance,
    loader: swapchain::Device,
    device: ash::Device,
    physical: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
    handle: vk::SwapchainKHR,
    queue_family: u32,
    surface_format: vk::SurfaceFormatKHR,
    present_mode: vk::PresentModeKHR,
    extent: vk::Extent2D,
    images: Vec<vk::Image>,
    views: Vec<vk::ImageView>,
    state: SwapchainState,
}

impl Swapchain {
    /// Takes ownership of `surface`, checks that the device's graphics family
    /// can present to it and negotiates the color format.
    pub fn init_surface(
        context: &VkContext,
        device: &Device,
        surface: vk::SurfaceKHR,
    ) -> VkResult<Self> {
        let surface_loader = context.surface_loader().clone();
        let loader = swapchain::Device::new(context.instance(), device.logical());

        let mut swapchain = Self {
            surface_loader,
            loader,
            device: device.logical().clone(),
            physical: device.physical(),
            surface,
            handle: vk::SwapchainKHR::null(),
            queue_family: device.queue_families().graphics,
            surface_format: vk::SurfaceFormatKHR::default(),
            present_mode: vk::PresentModeKHR::FIFO,
            extent: vk::Extent2D::default(),
            images: Vec::new(),
            views: Vec::new(),
            state: SwapchainState::Uninitialized,
        };

        let (flags, present) = surface_support(context, device.physical(), surface)?;
        require_present_on(swapchain.queue_family, &flags, &present)?;

        let formats = unsafe {
            swapchain
                .surface_loader
                .get_physical_device_surface_formats(swapchain.physical, surface)
        }
        .map_err(VkError::call("vkGetPhysicalDeviceSurfaceFormatsKHR"))?;
        swapchain.surface_format = choose_surface_format(&formats)?;
        swapchain.state = SwapchainState::SurfaceBound;
        info!(
            "surface format {:?} / {:?}",
            swapchain.surface_format.format, swapchain.surface_format.color_space
        );
        Ok(swapchain)
    }

    /// Creates the swapchain, or recreates it in place. The previous handle
    /// is retired only after its replacement exists.
    pub fn create(&mut self, want: RenderSize, vsync: bool) -> VkResult<()> {
        if matches!(
            self.state,
            SwapchainState::Uninitialized | SwapchainState::Destroyed
        ) {
            return Err(VkError::InvalidState(self.state));
        }

        let caps = unsafe {
            self.surface_loader
                .get_physical_device_surface_capabilities(self.physical, self.surface)
        }
        .map_err(VkError::call("vkGetPhysicalDeviceSurfaceCapabilitiesKHR"))?;
        let modes = unsafe {
            self.surface_loader
                .get_physical_device_surface_present_modes(self.physical, self.surface)
        }
        .map_err(VkError::call("vkGetPhysicalDeviceSurfacePresentModesKHR"))?;

        let extent = choose_extent(&caps, want);
        let present_mode = choose_present_mode(&modes, vsync);
        let old = self.handle;

        let info = vk::SwapchainCreateInfoKHR {
            s_type: vk::StructureType::SWAPCHAIN_CREATE_INFO_KHR,
            surface: self.surface,
            min_image_count: choose_image_count(&caps),
            image_format: self.surface_format.format,
            image_color_space: self.surface_format.color_space,
            image_extent: extent,
            image_array_layers: 1,
            image_usage: choose_image_usage(&caps),
            image_sharing_mode: vk::SharingMode::EXCLUSIVE,
            pre_transform: choose_pre_transform(&caps),
            composite_alpha: choose_composite_alpha(&caps),
            present_mode,
            clipped: vk::TRUE,
            old_swapchain: old,
            ..Default::default()
        };
        let handle = unsafe { self.loader.create_swapchain(&info, None) }
            .map_err(VkError::call("vkCreateSwapchainKHR"))?;

        self.destroy_views();
        if old != vk::SwapchainKHR::null() {
            unsafe { self.loader.destroy_swapchain(old, None) };
        }
        self.handle = handle;
        self.extent = extent;
        self.present_mode = present_mode;

        self.images = unsafe { self.loader.get_swapchain_images(handle) }
            .map_err(VkError::call("vkGetSwapchainImagesKHR"))?;
        for &image in &self.images {
            let view = create_color_view(&self.device, image, self.surface_format.format)?;
            self.views.push(view);
        }

        self.state = SwapchainState::Created;
        info!(
            "swapchain {}x{}, {} images, {:?}",
            extent.width,
            extent.height,
            self.images.len(),
            present_mode
        );
        Ok(())
    }

    /// Blocks until an image is available. `semaphore` is signaled when the
    /// image can be rendered to.
    pub fn acquire_next_image(&mut self, semaphore: vk::Semaphore) -> VkResult<AcquireOutcome> {
        if self.state != SwapchainState::Created {
            return Err(VkError::InvalidState(self.state));
        }
        let result = unsafe {
            self.loader
                .acquire_next_image(self.handle, u64::MAX, semaphore, vk::Fence::null())
        };
        match result {
            Ok((index, suboptimal)) => {
                if suboptimal {
                    self.state = SwapchainState::Stale;
                }
                Ok(AcquireOutcome::Acquired { index, suboptimal })
            }
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                debug!("acquire: swapchain out of date");
                self.state = SwapchainState::Stale;
                Ok(AcquireOutcome::OutOfDate)
            }
            Err(e) => Err(VkError::call("vkAcquireNextImageKHR")(e)),
        }
    }

    pub fn queue_present(
        &mut self,
        queue: vk::Queue,
        image_index: u32,
        wait: Option<vk::Semaphore>,
    ) -> VkResult<PresentOutcome> {
        let wait_semaphores: &[vk::Semaphore] = match &wait {
            Some(s) => std::slice::from_ref(s),
            None => &[],
        };
        let info = vk::PresentInfoKHR {
            s_type: vk::StructureType::PRESENT_INFO_KHR,
            wait_semaphore_count: wait_semaphores.len() as u32,
            p_wait_semaphores: wait_semaphores.as_ptr(),
            swapchain_count: 1,
            p_swapchains: &self.handle,
            p_image_indices: &image_index,
            ..Default::default()
        };
        match unsafe { self.loader.queue_present(queue, &info) } {
            Ok(false) => Ok(PresentOutcome::Presented),
            Ok(true) => {
                self.state = SwapchainState::Stale;
                Ok(PresentOutcome::Suboptimal)
            }
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                debug!("present: swapchain out of date");
                self.state = SwapchainState::Stale;
                Ok(PresentOutcome::OutOfDate)
            }
            Err(e) => Err(VkError::call("vkQueuePresentKHR")(e)),
        }
    }

    pub fn state(&self) -> SwapchainState {
        self.state
    }

    pub fn format(&self) -> vk::Format {
        self.surface_format.format
    }

    pub fn color_space(&self) -> vk::ColorSpaceKHR {
        self.surface_format.color_space
    }

    pub fn present_mode(&self) -> vk::PresentModeKHR {
        self.present_mode
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    pub fn images(&self) -> &[vk::Image] {
        &self.images
    }

    pub fn views(&self) -> &[vk::ImageView] {
        &self.views
    }

    fn destroy_views(&mut self) {
        for view in self.views.drain(..) {
            unsafe { self.device.destroy_image_view(view, None) };
        }
        self.images.clear();
    }

    /// Releases views, swapchain and surface. The device must be idle.
    pub fn destroy(&mut self) {
        if self.state == SwapchainState::Destroyed {
            return;
        }
        self.destroy_views();
        unsafe {
            if self.handle != vk::SwapchainKHR::null() {
                self.loader.destroy_swapchain(self.handle, None);
                self.handle = vk::SwapchainKHR::null();
            }
            self.surface_loader.destroy_surface(self.surface, None);
        }
        self.state = SwapchainState::Destroyed;
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        self.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sf(format: vk::Format, color_space: vk::ColorSpaceKHR) -> vk::SurfaceFormatKHR {
        vk::SurfaceFormatKHR {
            format,
            color_space,
        }
    }

    #[test]
    fn preferred_format_wins_regardless_of_position() {
        let bgra = sf(PREFERRED_FORMAT, vk::ColorSpaceKHR::EXTENDED_SRGB_LINEAR_EXT);
        let lists = [
            vec![bgra, sf(vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR)],
            vec![
                sf(vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
                sf(vk::Format::A2B10G10R10_UNORM_PACK32, vk::ColorSpaceKHR::SRGB_NONLINEAR),
                bgra,
            ],
        ];
        for list in &lists {
            let chosen = choose_surface_format(list).unwrap();
            assert_eq!(chosen.format, PREFERRED_FORMAT);
            assert_eq!(chosen.color_space, vk::ColorSpaceKHR::EXTENDED_SRGB_LINEAR_EXT);
        }
    }

    #[test]
    fn first_format_without_preferred() {
        let list = [
            sf(vk::Format::R8G8B8A8_SRGB, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            sf(vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
        ];
        assert_eq!(choose_surface_format(&list).unwrap(), list[0]);
    }

    #[test]
    fn lone_undefined_means_no_preference() {
        let list = [sf(vk::Format::UNDEFINED, vk::ColorSpaceKHR::SRGB_NONLINEAR)];
        let chosen = choose_surface_format(&list).unwrap();
        assert_eq!(chosen.format, PREFERRED_FORMAT);
        assert_eq!(chosen.color_space, vk::ColorSpaceKHR::SRGB_NONLINEAR);
    }

    #[test]
    fn empty_format_list_is_an_error() {
        assert!(matches!(choose_surface_format(&[]), Err(VkError::NoSurfaceFormats)));
    }

    #[test]
    fn bare_format_preference() {
        assert_eq!(
            choose_color_format(&[vk::Format::R8G8B8A8_SRGB, PREFERRED_FORMAT]),
            Some(PREFERRED_FORMAT)
        );
        assert_eq!(
            choose_color_format(&[vk::Format::R8G8B8A8_SRGB, vk::Format::R8G8B8A8_UNORM]),
            Some(vk::Format::R8G8B8A8_SRGB)
        );
        assert_eq!(choose_color_format(&[vk::Format::UNDEFINED]), Some(PREFERRED_FORMAT));
        assert_eq!(choose_color_format(&[]), None);
    }

    #[test]
    fn present_mode_preferences() {
        use vk::PresentModeKHR as M;
        assert_eq!(choose_present_mode(&[M::FIFO, M::IMMEDIATE, M::MAILBOX], false), M::MAILBOX);
        assert_eq!(choose_present_mode(&[M::IMMEDIATE, M::FIFO], false), M::IMMEDIATE);
        assert_eq!(choose_present_mode(&[M::FIFO, M::FIFO_RELAXED], false), M::FIFO);
        assert_eq!(choose_present_mode(&[M::MAILBOX, M::IMMEDIATE, M::FIFO], true), M::FIFO);
    }

    fn caps() -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            min_image_count: 2,
            max_image_count: 3,
            current_extent: vk::Extent2D {
                width: 800,
                height: 600,
            },
            supported_transforms: vk::SurfaceTransformFlagsKHR::IDENTITY
                | vk::SurfaceTransformFlagsKHR::ROTATE_90,
            current_transform: vk::SurfaceTransformFlagsKHR::ROTATE_90,
            supported_composite_alpha: vk::CompositeAlphaFlagsKHR::INHERIT
                | vk::CompositeAlphaFlagsKHR::PRE_MULTIPLIED,
            supported_usage_flags: vk::ImageUsageFlags::COLOR_ATTACHMENT
                | vk::ImageUsageFlags::TRANSFER_DST,
            ..Default::default()
        }
    }

    #[test]
    fn image_count_is_clamped() {
        let mut c = caps();
        assert_eq!(choose_image_count(&c), 3);
        c.min_image_count = 3;
        assert_eq!(choose_image_count(&c), 3);
        c.max_image_count = 0;
        assert_eq!(choose_image_count(&c), 4);
    }

    #[test]
    fn extent_follows_surface_unless_unbounded() {
        let mut c = caps();
        assert_eq!(
            choose_extent(&c, RenderSize::new(1920, 1080)),
            vk::Extent2D {
                width: 800,
                height: 600
            }
        );
        c.current_extent = vk::Extent2D {
            width: u32::MAX,
            height: u32::MAX,
        };
        assert_eq!(
            choose_extent(&c, RenderSize::new(1920, 1080)),
            vk::Extent2D {
                width: 1920,
                height: 1080
            }
        );
    }

    #[test]
    fn identity_transform_preferred() {
        let mut c = caps();
        assert_eq!(choose_pre_transform(&c), vk::SurfaceTransformFlagsKHR::IDENTITY);
        c.supported_transforms = vk::SurfaceTransformFlagsKHR::ROTATE_90;
        assert_eq!(choose_pre_transform(&c), vk::SurfaceTransformFlagsKHR::ROTATE_90);
    }

    #[test]
    fn composite_alpha_follows_preference_list() {
        let mut c = caps();
        assert_eq!(choose_composite_alpha(&c), vk::CompositeAlphaFlagsKHR::PRE_MULTIPLIED);
        c.supported_composite_alpha |= vk::CompositeAlphaFlagsKHR::OPAQUE;
        assert_eq!(choose_composite_alpha(&c), vk::CompositeAlphaFlagsKHR::OPAQUE);
        c.supported_composite_alpha = vk::CompositeAlphaFlagsKHR::INHERIT;
        assert_eq!(choose_composite_alpha(&c), vk::CompositeAlphaFlagsKHR::INHERIT);
    }

    #[test]
    fn transfer_usage_only_when_supported() {
        let mut c = caps();
        let usage = choose_image_usage(&c);
        assert!(usage.contains(vk::ImageUsageFlags::COLOR_ATTACHMENT));
        assert!(usage.contains(vk::ImageUsageFlags::TRANSFER_DST));
        assert!(!usage.contains(vk::ImageUsageFlags::TRANSFER_SRC));
        c.supported_usage_flags |= vk::ImageUsageFlags::TRANSFER_SRC;
        assert!(choose_image_usage(&c).contains(vk::ImageUsageFlags::TRANSFER_SRC));
    }

    #[test]
    fn shared_graphics_present_family() {
        let flags = [
            vk::QueueFlags::TRANSFER,
            vk::QueueFlags::GRAPHICS,
            vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE,
        ];
        assert_eq!(graphics_present_family(&flags, &[true, false, true]).unwrap(), 2);
    }

    #[test]
    fn device_graphics_family_is_checked_not_the_first_shared_one() {
        let flags = [
            vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE,
            vk::QueueFlags::GRAPHICS,
        ];
        let present = [true, true];
        assert_eq!(graphics_present_family(&flags, &present).unwrap(), 0);
        assert!(require_present_on(1, &flags, &present).is_ok());
        assert!(require_present_on(0, &flags, &present).is_ok());
    }

    #[test]
    fn graphics_family_without_present_is_split() {
        let flags = [vk::QueueFlags::GRAPHICS, vk::QueueFlags::GRAPHICS];
        assert!(matches!(
            require_present_on(0, &flags, &[false, true]),
            Err(VkError::SplitPresentQueue)
        ));
        assert!(matches!(
            require_present_on(0, &[vk::QueueFlags::GRAPHICS, vk::QueueFlags::TRANSFER], &[false, true]),
            Err(VkError::SplitPresentQueue)
        ));
        assert!(matches!(
            require_present_on(0, &flags, &[false, false]),
            Err(VkError::NoPresentQueue)
        ));
        assert!(matches!(
            require_present_on(7, &flags, &[true, true]),
            Err(VkError::SplitPresentQueue)
        ));
    }

    #[test]
    fn split_families_are_rejected() {
        let flags = [vk::QueueFlags::GRAPHICS, vk::QueueFlags::TRANSFER];
        assert!(matches!(
            graphics_present_family(&flags, &[false, true]),
            Err(VkError::SplitPresentQueue)
        ));
        assert!(matches!(
            graphics_present_family(&flags, &[false, false]),
            Err(VkError::NoPresentQueue)
        ));
    }
}
