// SPDX-License-Identifier: CEPL-1.0
//! Vulkan instance, validation layer and debug messenger.

use std::ffi::{c_char, c_void, CStr, CString};

use ash::ext::debug_utils;
use ash::khr::surface;
use ash::{vk, Entry, Instance};
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};
use tracing::{debug, error, info, warn};

use crate::error::{VkError, VkResult};

const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

#[derive(Clone, Debug)]
pub struct InstanceConfig {
    pub app_name: CString,
    pub api_version: u32,
    pub extensions: Vec<CString>,
    pub validation: bool,
}

impl InstanceConfig {
    pub fn new(app_name: &str) -> Self {
        Self {
            app_name: CString::new(app_name).unwrap_or_else(|_| CString::from(c"prism")),
            api_version: vk::API_VERSION_1_1,
            extensions: Vec::new(),
            validation: false,
        }
    }

    /// Adds the window-system extensions needed to create a surface.
    pub fn with_surface_extensions(mut self, display: RawDisplayHandle) -> VkResult<Self> {
        let names = ash_window::enumerate_required_extensions(display)
            .map_err(VkError::call("vkEnumerateInstanceExtensionProperties"))?;
        for &name in names {
            // SAFETY: ash-window hands out static NUL-terminated names.
            let name = unsafe { CStr::from_ptr(name) }.to_owned();
            self.push_extension(name);
        }
        Ok(self)
    }

    pub fn push_extension(&mut self, name: CString) {
        if !self.extensions.contains(&name) {
            self.extensions.push(name);
        }
    }
}

/// Owns the instance and, with validation on, the debug messenger.
/// Dropped last: every other Vulkan object must be gone by then.
pub struct VkContext {
    entry: Entry,
    instance: Instance,
    surface_loader: surface::Instance,
    debug: Option<(debug_utils::Instance, vk::DebugUtilsMessengerEXT)>,
}

impl VkContext {
    pub fn load_entry() -> VkResult<Entry> {
        // SAFETY: the loader library stays loaded for as long as `Entry` lives.
        Ok(unsafe { Entry::load()? })
    }

    pub fn new(entry: Entry, config: InstanceConfig) -> VkResult<Self> {
        Self::create_with(entry, config, |entry, info| {
            // SAFETY: `info` and everything it points to outlive this call.
            unsafe { entry.create_instance(info, None) }.map_err(VkError::call("vkCreateInstance"))
        })
    }

    /// Builds the create info from `config` and lets `create` produce the
    /// instance. Runtimes that create the instance on the application's
    /// behalf plug in here.
    pub fn create_with<F>(entry: Entry, mut config: InstanceConfig, create: F) -> VkResult<Self>
    where
        F: FnOnce(&Entry, &vk::InstanceCreateInfo<'_>) -> VkResult<Instance>,
    {
        if config.validation && !layer_available(&entry, VALIDATION_LAYER) {
            warn!("validation requested but VK_LAYER_KHRONOS_validation is not installed");
            config.validation = false;
        }
        if config.validation {
            config.push_extension(debug_utils::NAME.to_owned());
        }

        let app_info = vk::ApplicationInfo {
            s_type: vk::StructureType::APPLICATION_INFO,
            p_application_name: config.app_name.as_ptr(),
            application_version: 0,
            p_engine_name: c"prism".as_ptr(),
            engine_version: 0,
            api_version: config.api_version,
            ..Default::default()
        };

        let ext_ptrs: Vec<*const c_char> = config.extensions.iter().map(|e| e.as_ptr()).collect();
        let layer_ptrs: Vec<*const c_char> = if config.validation {
            vec![VALIDATION_LAYER.as_ptr()]
        } else {
            Vec::new()
        };

        let create_info = vk::InstanceCreateInfo {
            s_type: vk::StructureType::INSTANCE_CREATE_INFO,
            p_application_info: &app_info,
            enabled_extension_count: ext_ptrs.len() as u32,
            pp_enabled_extension_names: ext_ptrs.as_ptr(),
            enabled_layer_count: layer_ptrs.len() as u32,
            pp_enabled_layer_names: layer_ptrs.as_ptr(),
            ..Default::default()
        };

        let instance = create(&entry, &create_info)?;
        info!(
            "vulkan instance ready (extensions: {}, validation: {})",
            config.extensions.len(),
            config.validation
        );

        let debug = if config.validation {
            match create_debug_messenger(&entry, &instance) {
                Ok(pair) => Some(pair),
                Err(e) => {
                    warn!("debug messenger unavailable: {e}");
                    None
                }
            }
        } else {
            None
        };

        let surface_loader = surface::Instance::new(&entry, &instance);
        Ok(Self {
            entry,
            instance,
            surface_loader,
            debug,
        })
    }

    pub fn entry(&self) -> &Entry {
        &self.entry
    }

    pub fn instance(&self) -> &Instance {
        &self.instance
    }

    pub fn surface_loader(&self) -> &surface::Instance {
        &self.surface_loader
    }

    pub fn create_surface(
        &self,
        display: RawDisplayHandle,
        window: RawWindowHandle,
    ) -> VkResult<vk::SurfaceKHR> {
        // SAFETY: handles come from a live window that outlives the surface.
        unsafe { ash_window::create_surface(&self.entry, &self.instance, display, window, None) }
            .map_err(VkError::call("vkCreateSurfaceKHR"))
    }
}

impl Drop for VkContext {
    fn drop(&mut self) {
        unsafe {
            if let Some((loader, messenger)) = self.debug.take() {
                loader.destroy_debug_utils_messenger(messenger, None);
            }
            self.instance.destroy_instance(None);
        }
    }
}

fn layer_available(entry: &Entry, name: &CStr) -> bool {
    // SAFETY: plain enumeration on a loaded entry.
    let layers = unsafe { entry.enumerate_instance_layer_properties() }.unwrap_or_default();
    layers
        .iter()
        .any(|l| l.layer_name_as_c_str().map(|n| n == name).unwrap_or(false))
}

fn create_debug_messenger(
    entry: &Entry,
    instance: &Instance,
) -> VkResult<(debug_utils::Instance, vk::DebugUtilsMessengerEXT)> {
    let loader = debug_utils::Instance::new(entry, instance);
    let info = vk::DebugUtilsMessengerCreateInfoEXT {
        s_type: vk::StructureType::DEBUG_UTILS_MESSENGER_CREATE_INFO_EXT,
        message_severity: vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
            | vk::DebugUtilsMessageSeverityFlagsEXT::INFO
            | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
            | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
        message_type: vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
            | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
            | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        pfn_user_callback: Some(debug_callback),
        ..Default::default()
    };
    let messenger = unsafe { loader.create_debug_utils_messenger(&info, None) }
        .map_err(VkError::call("vkCreateDebugUtilsMessengerEXT"))?;
    Ok((loader, messenger))
}

unsafe extern "system" fn debug_callback(
    severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    _types: vk::DebugUtilsMessageTypeFlagsEXT,
    data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _user: *mut c_void,
) -> vk::Bool32 {
    if data.is_null() {
        return vk::FALSE;
    }
    // SAFETY: the loader passes a valid callback payload for the call's duration.
    let message = unsafe {
        let data = &*data;
        if data.p_message.is_null() {
            return vk::FALSE;
        }
        CStr::from_ptr(data.p_message).to_string_lossy()
    };
    if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        error!("[vulkan] {message}");
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        warn!("[vulkan] {message}");
    } else {
        debug!("[vulkan] {message}");
    }
    vk::FALSE
}
