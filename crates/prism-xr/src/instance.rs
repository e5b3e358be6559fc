// SPDX-License-Identifier: CEPL-1.0
//! OpenXR instance, system and view enumeration, and the Vulkan objects the
//! runtime wants the session built on.

use std::ffi::CString;

use ash::vk::{self, Handle};
use openxr as xr;
use prism_render_vk::{Device, DeviceRequest, InstanceConfig, VkContext, VkError};
use tracing::{info, warn};

use crate::error::{XrError, XrResult};

pub const VIEW_CONFIGURATION: xr::ViewConfigurationType =
    xr::ViewConfigurationType::PRIMARY_STEREO;
/// Views in [`VIEW_CONFIGURATION`].
pub const STEREO_VIEWS: usize = 2;
pub const BLEND_MODE: xr::EnvironmentBlendMode = xr::EnvironmentBlendMode::OPAQUE;

/// Vulkan version the renderer is written against.
pub const VULKAN_TARGET: xr::Version = xr::Version::new(1, 1, 0);

/// How the Vulkan instance and device are negotiated with the runtime.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum BindingMode {
    /// `XR_KHR_vulkan_enable2`: the runtime creates instance and device.
    #[default]
    Modern,
    /// `XR_KHR_vulkan_enable`: the application creates both with the
    /// extension lists the runtime asks for.
    Legacy,
}

impl BindingMode {
    pub fn extension_name(self) -> &'static str {
        match self {
            BindingMode::Modern => "XR_KHR_vulkan_enable2",
            BindingMode::Legacy => "XR_KHR_vulkan_enable",
        }
    }

    fn offered_by(self, extensions: &xr::ExtensionSet) -> bool {
        match self {
            BindingMode::Modern => extensions.khr_vulkan_enable2,
            BindingMode::Legacy => extensions.khr_vulkan_enable,
        }
    }

    fn enable(self, extensions: &mut xr::ExtensionSet) {
        match self {
            BindingMode::Modern => extensions.khr_vulkan_enable2 = true,
            BindingMode::Legacy => extensions.khr_vulkan_enable = true,
        }
    }
}

#[derive(Clone, Debug)]
pub struct XrOptions {
    pub app_name: String,
    pub binding: BindingMode,
    pub validation: bool,
}

impl Default for XrOptions {
    fn default() -> Self {
        Self {
            app_name: "prism".into(),
            binding: BindingMode::default(),
            validation: false,
        }
    }
}

/// Legacy extension queries return one space-separated string.
pub fn split_extension_list(list: &str) -> Vec<CString> {
    list.split_ascii_whitespace()
        .filter_map(|name| CString::new(name).ok())
        .collect()
}

/// `target` must be at least the runtime's minimum and share a major version
/// no newer than its maximum.
pub fn api_version_supported(target: xr::Version, min: xr::Version, max: xr::Version) -> bool {
    (target.major(), target.minor()) >= (min.major(), min.minor()) && target.major() <= max.major()
}

pub fn require_view_configuration(
    available: &[xr::ViewConfigurationType],
    wanted: xr::ViewConfigurationType,
) -> XrResult<()> {
    if available.contains(&wanted) {
        Ok(())
    } else {
        Err(XrError::MissingViewConfiguration(wanted))
    }
}

/// Views reported for the stereo configuration must match the fixed
/// per-frame layer layout.
pub fn require_stereo_view_count(count: usize) -> XrResult<()> {
    if count == STEREO_VIEWS {
        Ok(())
    } else {
        Err(XrError::Unsupported(format!(
            "{VIEW_CONFIGURATION:?} reports {count} views, expected {STEREO_VIEWS}"
        )))
    }
}

pub struct XrInstance {
    instance: xr::Instance,
    system: xr::SystemId,
    options: XrOptions,
    views: Vec<xr::ViewConfigurationView>,
    // Keeps the loader mapped for as long as the instance lives.
    _entry: xr::Entry,
}

impl XrInstance {
    /// Loads the runtime and walks instance → system → view configuration.
    /// Any failure here means XR is unavailable for this run.
    pub fn create(options: XrOptions) -> XrResult<Self> {
        // SAFETY: the loader stays mapped for the lifetime of `entry`, which
        // is kept alongside the instance.
        let entry = unsafe { xr::Entry::load() }.map_err(|e| XrError::Loader(e.to_string()))?;

        let available = entry
            .enumerate_extensions()
            .map_err(XrError::call("xrEnumerateInstanceExtensionProperties"))?;
        if !options.binding.offered_by(&available) {
            return Err(XrError::MissingExtension(options.binding.extension_name()));
        }
        let mut enabled = xr::ExtensionSet::default();
        options.binding.enable(&mut enabled);

        let instance = entry
            .create_instance(
                &xr::ApplicationInfo {
                    application_name: &options.app_name,
                    application_version: 0,
                    engine_name: "prism",
                    engine_version: 0,
                    api_version: xr::Version::new(1, 0, 0),
                },
                &enabled,
                &[],
            )
            .map_err(XrError::call("xrCreateInstance"))?;

        let props = instance
            .properties()
            .map_err(XrError::call("xrGetInstanceProperties"))?;
        info!(
            "OpenXR runtime {} {}.{}.{}",
            props.runtime_name,
            props.runtime_version.major(),
            props.runtime_version.minor(),
            props.runtime_version.patch()
        );

        let system = instance
            .system(xr::FormFactor::HEAD_MOUNTED_DISPLAY)
            .map_err(XrError::call("xrGetSystem"))?;
        let system_props = instance
            .system_properties(system)
            .map_err(XrError::call("xrGetSystemProperties"))?;
        info!("XR system '{}'", system_props.system_name);

        let configs = instance
            .enumerate_view_configurations(system)
            .map_err(XrError::call("xrEnumerateViewConfigurations"))?;
        require_view_configuration(&configs, VIEW_CONFIGURATION)?;

        let views = instance
            .enumerate_view_configuration_views(system, VIEW_CONFIGURATION)
            .map_err(XrError::call("xrEnumerateViewConfigurationViews"))?;
        require_stereo_view_count(views.len())?;
        for (i, v) in views.iter().enumerate() {
            info!(
                "XR view {i}: {}x{} recommended, {}x{} max",
                v.recommended_image_rect_width,
                v.recommended_image_rect_height,
                v.max_image_rect_width,
                v.max_image_rect_height
            );
        }

        let blend_modes = instance
            .enumerate_environment_blend_modes(system, VIEW_CONFIGURATION)
            .map_err(XrError::call("xrEnumerateEnvironmentBlendModes"))?;
        if !blend_modes.contains(&BLEND_MODE) {
            return Err(XrError::Unsupported(format!(
                "environment blend mode {BLEND_MODE:?} (runtime offers {blend_modes:?})"
            )));
        }

        Ok(Self {
            instance,
            system,
            options,
            views,
            _entry: entry,
        })
    }

    pub fn instance(&self) -> &xr::Instance {
        &self.instance
    }

    pub fn system(&self) -> xr::SystemId {
        self.system
    }

    pub fn binding(&self) -> BindingMode {
        self.options.binding
    }

    pub fn view_configuration_views(&self) -> &[xr::ViewConfigurationView] {
        &self.views
    }

    /// Vulkan instance and device on the GPU the runtime drives.
    pub fn create_vulkan(&self) -> XrResult<(VkContext, Device)> {
        let reqs = self
            .instance
            .graphics_requirements::<xr::Vulkan>(self.system)
            .map_err(XrError::call("xrGetVulkanGraphicsRequirementsKHR"))?;
        if !api_version_supported(
            VULKAN_TARGET,
            reqs.min_api_version_supported,
            reqs.max_api_version_supported,
        ) {
            return Err(XrError::Unsupported(format!(
                "runtime needs Vulkan {}.{}..={}.x",
                reqs.min_api_version_supported.major(),
                reqs.min_api_version_supported.minor(),
                reqs.max_api_version_supported.major()
            )));
        }

        let entry = VkContext::load_entry()?;
        let mut config = InstanceConfig::new(&self.options.app_name);
        config.api_version = vk::make_api_version(
            0,
            u32::from(VULKAN_TARGET.major()),
            u32::from(VULKAN_TARGET.minor()),
            0,
        );
        config.validation = self.options.validation;

        match self.options.binding {
            BindingMode::Legacy => self.create_vulkan_legacy(entry, config),
            BindingMode::Modern => self.create_vulkan_modern(entry, config),
        }
    }

    fn create_vulkan_legacy(
        &self,
        entry: ash::Entry,
        mut config: InstanceConfig,
    ) -> XrResult<(VkContext, Device)> {
        let instance_exts = self
            .instance
            .vulkan_legacy_instance_extensions(self.system)
            .map_err(XrError::call("xrGetVulkanInstanceExtensionsKHR"))?;
        for name in split_extension_list(&instance_exts) {
            config.push_extension(name);
        }
        let context = VkContext::new(entry, config)?;

        // Only XR_KHR_vulkan_enable is enabled, so this takes the legacy
        // xrGetVulkanGraphicsDeviceKHR path.
        // SAFETY: the instance handle is live and owned by `context`.
        let raw = unsafe {
            self.instance
                .vulkan_graphics_device(self.system, context.instance().handle().as_raw() as _)
        }
        .map_err(XrError::call("xrGetVulkanGraphicsDeviceKHR"))?;
        let physical = vk::PhysicalDevice::from_raw(raw as u64);

        let device_exts = self
            .instance
            .vulkan_legacy_device_extensions(self.system)
            .map_err(XrError::call("xrGetVulkanDeviceExtensionsKHR"))?;
        let request = DeviceRequest {
            queues: vk::QueueFlags::GRAPHICS,
            extensions: split_extension_list(&device_exts),
            graphics_family: None,
        };
        let device = Device::new(context.instance(), physical, &request)?;
        Ok((context, device))
    }

    fn create_vulkan_modern(
        &self,
        entry: ash::Entry,
        config: InstanceConfig,
    ) -> XrResult<(VkContext, Device)> {
        let get_instance_proc_addr = entry.static_fn().get_instance_proc_addr;
        let mut runtime_failure = None;

        let context = VkContext::create_with(entry, config, |entry, info| {
            // SAFETY: `info` is a valid create info for the duration of the
            // call and the proc-addr loader outlives the instance.
            let created = unsafe {
                self.instance.create_vulkan_instance(
                    self.system,
                    std::mem::transmute(get_instance_proc_addr),
                    info as *const _ as *const _,
                )
            };
            match created {
                Ok(Ok(raw)) => Ok(unsafe {
                    ash::Instance::load(entry.static_fn(), vk::Instance::from_raw(raw as u64))
                }),
                Ok(Err(code)) => Err(VkError::call("vkCreateInstance")(vk::Result::from_raw(code))),
                Err(e) => {
                    runtime_failure = Some(XrError::call("xrCreateVulkanInstanceKHR")(e));
                    Err(VkError::call("xrCreateVulkanInstanceKHR")(
                        vk::Result::ERROR_INITIALIZATION_FAILED,
                    ))
                }
            }
        });
        let context = match context {
            Ok(c) => c,
            Err(e) => return Err(runtime_failure.unwrap_or(XrError::Vk(e))),
        };

        // SAFETY: the instance handle is live and owned by `context`.
        let raw = unsafe {
            self.instance
                .vulkan_graphics_device(self.system, context.instance().handle().as_raw() as _)
        }
        .map_err(XrError::call("xrGetVulkanGraphicsDevice2KHR"))?;
        let physical = vk::PhysicalDevice::from_raw(raw as u64);

        let request = DeviceRequest {
            queues: vk::QueueFlags::GRAPHICS,
            extensions: Vec::new(),
            graphics_family: None,
        };
        let mut runtime_failure = None;
        let device = Device::create_with(context.instance(), physical, &request, |info| {
            // SAFETY: as above; `physical` was chosen by the runtime for
            // this instance.
            let created = unsafe {
                self.instance.create_vulkan_device(
                    self.system,
                    std::mem::transmute(get_instance_proc_addr),
                    physical.as_raw() as _,
                    info as *const _ as *const _,
                )
            };
            match created {
                Ok(Ok(raw)) => Ok(unsafe {
                    ash::Device::load(context.instance().fp_v1_0(), vk::Device::from_raw(raw as u64))
                }),
                Ok(Err(code)) => Err(VkError::call("vkCreateDevice")(vk::Result::from_raw(code))),
                Err(e) => {
                    runtime_failure = Some(XrError::call("xrCreateVulkanDeviceKHR")(e));
                    Err(VkError::call("xrCreateVulkanDeviceKHR")(
                        vk::Result::ERROR_INITIALIZATION_FAILED,
                    ))
                }
            }
        });
        match device {
            Ok(device) => Ok((context, device)),
            Err(e) => {
                if runtime_failure.is_none() {
                    warn!("runtime-created Vulkan device failed: {e}");
                }
                Err(runtime_failure.unwrap_or(XrError::Vk(e)))
            }
        }
    }
}
