// SPDX-License-Identifier: CEPL-1.0
//! Live OpenXR session: spaces, input actions and one swapchain per view.

use ash::vk::{self, Handle};
use openxr as xr;
use prism_math::{Fov, Pose, Quat, Vec3};
use prism_render_vk::{choose_color_format, Device, VkContext};
use tracing::info;

use crate::error::{XrError, XrResult};
use crate::instance::{XrInstance, BLEND_MODE, STEREO_VIEWS, VIEW_CONFIGURATION};
use crate::runtime::{FrameTiming, LocatedView, RuntimeEvent, SessionState, XrRuntime};

const SIMPLE_CONTROLLER: &str = "/interaction_profiles/khr/simple_controller";
const HANDS: [&str; 2] = ["/user/hand/left", "/user/hand/right"];

pub fn session_state(state: xr::SessionState) -> SessionState {
    match state {
        xr::SessionState::IDLE => SessionState::Idle,
        xr::SessionState::READY => SessionState::Ready,
        xr::SessionState::SYNCHRONIZED => SessionState::Synchronized,
        xr::SessionState::VISIBLE => SessionState::Visible,
        xr::SessionState::FOCUSED => SessionState::Focused,
        xr::SessionState::STOPPING => SessionState::Stopping,
        xr::SessionState::LOSS_PENDING => SessionState::LossPending,
        xr::SessionState::EXITING => SessionState::Exiting,
        _ => SessionState::Unknown,
    }
}

pub fn pose_from_xr(pose: xr::Posef) -> Pose {
    let o = pose.orientation;
    let p = pose.position;
    Pose {
        orientation: Quat::from_xyzw(o.x, o.y, o.z, o.w),
        position: Vec3::new(p.x, p.y, p.z),
    }
}

pub fn pose_to_xr(pose: Pose) -> xr::Posef {
    let o = pose.orientation;
    let p = pose.position;
    xr::Posef {
        orientation: xr::Quaternionf {
            x: o.x,
            y: o.y,
            z: o.z,
            w: o.w,
        },
        position: xr::Vector3f {
            x: p.x,
            y: p.y,
            z: p.z,
        },
    }
}

pub fn fov_from_xr(fov: xr::Fovf) -> Fov {
    Fov {
        angle_left: fov.angle_left,
        angle_right: fov.angle_right,
        angle_up: fov.angle_up,
        angle_down: fov.angle_down,
    }
}

pub fn fov_to_xr(fov: Fov) -> xr::Fovf {
    xr::Fovf {
        angle_left: fov.angle_left,
        angle_right: fov.angle_right,
        angle_up: fov.angle_up,
        angle_down: fov.angle_down,
    }
}

/// Compositor-owned images for one view.
pub struct XrSwapchain {
    handle: xr::Swapchain<xr::Vulkan>,
    images: Vec<vk::Image>,
    extent: vk::Extent2D,
}

impl XrSwapchain {
    fn create(
        session: &xr::Session<xr::Vulkan>,
        format: vk::Format,
        view: &xr::ViewConfigurationView,
    ) -> XrResult<Self> {
        let extent = vk::Extent2D {
            width: view.recommended_image_rect_width,
            height: view.recommended_image_rect_height,
        };
        let handle = session
            .create_swapchain(&xr::SwapchainCreateInfo {
                create_flags: xr::SwapchainCreateFlags::EMPTY,
                usage_flags: xr::SwapchainUsageFlags::COLOR_ATTACHMENT
                    | xr::SwapchainUsageFlags::SAMPLED,
                format: format.as_raw() as _,
                sample_count: 1,
                width: extent.width,
                height: extent.height,
                face_count: 1,
                array_size: 1,
                mip_count: 1,
            })
            .map_err(XrError::call("xrCreateSwapchain"))?;
        let images = handle
            .enumerate_images()
            .map_err(XrError::call("xrEnumerateSwapchainImages"))?
            .into_iter()
            .map(vk::Image::from_raw)
            .collect();
        Ok(Self {
            handle,
            images,
            extent,
        })
    }

    pub fn images(&self) -> &[vk::Image] {
        &self.images
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }
}

/// [`XrRuntime`] over a real OpenXR session.
pub struct OpenXrRuntime {
    swapchains: Vec<XrSwapchain>,
    format: vk::Format,
    hand_spaces: Vec<xr::Space>,
    hands: [Option<Pose>; 2],
    view_space: xr::Space,
    local: xr::Space,
    action_set: xr::ActionSet,
    _grip: xr::Action<xr::Posef>,
    stream: xr::FrameStream<xr::Vulkan>,
    waiter: xr::FrameWaiter,
    session: xr::Session<xr::Vulkan>,
    instance: xr::Instance,
    events: xr::EventDataBuffer,
}

impl OpenXrRuntime {
    /// Session → spaces → actions → swapchains. `device` must have been
    /// created through [`XrInstance::create_vulkan`].
    pub fn new(xr_instance: &XrInstance, context: &VkContext, device: &Device) -> XrResult<Self> {
        let instance = xr_instance.instance().clone();
        let system = xr_instance.system();

        // SAFETY: all handles are live and were negotiated with this runtime.
        let (session, waiter, stream) = unsafe {
            instance.create_session::<xr::Vulkan>(
                system,
                &xr::vulkan::SessionCreateInfo {
                    instance: context.instance().handle().as_raw() as _,
                    physical_device: device.physical().as_raw() as _,
                    device: device.logical().handle().as_raw() as _,
                    queue_family_index: device.queue_families().graphics,
                    queue_index: 0,
                },
            )
        }
        .map_err(XrError::call("xrCreateSession"))?;

        let spaces = session
            .enumerate_reference_spaces()
            .map_err(XrError::call("xrEnumerateReferenceSpaces"))?;
        if !spaces.contains(&xr::ReferenceSpaceType::LOCAL) {
            return Err(XrError::MissingReferenceSpace(xr::ReferenceSpaceType::LOCAL));
        }
        let local = session
            .create_reference_space(xr::ReferenceSpaceType::LOCAL, xr::Posef::IDENTITY)
            .map_err(XrError::call("xrCreateReferenceSpace"))?;
        let view_space = session
            .create_reference_space(xr::ReferenceSpaceType::VIEW, xr::Posef::IDENTITY)
            .map_err(XrError::call("xrCreateReferenceSpace"))?;

        let action_set = instance
            .create_action_set("prism", "Prism", 0)
            .map_err(XrError::call("xrCreateActionSet"))?;
        let hand_paths = [
            instance
                .string_to_path(HANDS[0])
                .map_err(XrError::call("xrStringToPath"))?,
            instance
                .string_to_path(HANDS[1])
                .map_err(XrError::call("xrStringToPath"))?,
        ];
        let grip = action_set
            .create_action::<xr::Posef>("grip_pose", "Grip Pose", &hand_paths)
            .map_err(XrError::call("xrCreateAction"))?;
        let mut bindings = Vec::with_capacity(HANDS.len());
        for hand in HANDS {
            let path = instance
                .string_to_path(&format!("{hand}/input/grip/pose"))
                .map_err(XrError::call("xrStringToPath"))?;
            bindings.push(xr::Binding::new(&grip, path));
        }
        let profile = instance
            .string_to_path(SIMPLE_CONTROLLER)
            .map_err(XrError::call("xrStringToPath"))?;
        instance
            .suggest_interaction_profile_bindings(profile, &bindings)
            .map_err(XrError::call("xrSuggestInteractionProfileBindings"))?;
        session
            .attach_action_sets(&[&action_set])
            .map_err(XrError::call("xrAttachSessionActionSets"))?;
        let mut hand_spaces = Vec::with_capacity(hand_paths.len());
        for path in hand_paths {
            hand_spaces.push(
                grip.create_space(session.clone(), path, xr::Posef::IDENTITY)
                    .map_err(XrError::call("xrCreateActionSpace"))?,
            );
        }

        let formats: Vec<vk::Format> = session
            .enumerate_swapchain_formats()
            .map_err(XrError::call("xrEnumerateSwapchainFormats"))?
            .into_iter()
            .map(|f| vk::Format::from_raw(f as i32))
            .collect();
        let format = choose_color_format(&formats)
            .ok_or_else(|| XrError::Unsupported("runtime offers no swapchain formats".into()))?;
        info!("XR swapchain format {format:?}");

        let mut swapchains = Vec::new();
        for (i, view) in xr_instance.view_configuration_views().iter().enumerate() {
            let swapchain = XrSwapchain::create(&session, format, view)?;
            info!(
                "XR view {i} swapchain: {}x{}, {} images",
                swapchain.extent.width,
                swapchain.extent.height,
                swapchain.images.len()
            );
            swapchains.push(swapchain);
        }

        Ok(Self {
            swapchains,
            format,
            hand_spaces,
            hands: [None; 2],
            view_space,
            local,
            action_set,
            _grip: grip,
            stream,
            waiter,
            session,
            instance,
            events: xr::EventDataBuffer::new(),
        })
    }

    pub fn color_format(&self) -> vk::Format {
        self.format
    }

    pub fn swapchain(&self, view: usize) -> Option<&XrSwapchain> {
        self.swapchains.get(view)
    }

    /// Grip pose of the left (0) or right (1) controller from the last
    /// rendered frame.
    pub fn hand_pose(&self, hand: usize) -> Option<Pose> {
        self.hands.get(hand).copied().flatten()
    }

    fn swapchain_mut(&mut self, view: usize) -> XrResult<&mut XrSwapchain> {
        let count = self.swapchains.len();
        self.swapchains
            .get_mut(view)
            .ok_or_else(|| XrError::Unsupported(format!("view {view} of {count}")))
    }

    fn locate_in_local(&self, space: &xr::Space, time: xr::Time) -> XrResult<Option<Pose>> {
        let location = space
            .locate(&self.local, time)
            .map_err(XrError::call("xrLocateSpace"))?;
        let valid = xr::SpaceLocationFlags::ORIENTATION_VALID | xr::SpaceLocationFlags::POSITION_VALID;
        Ok(location
            .location_flags
            .contains(valid)
            .then(|| pose_from_xr(location.pose)))
    }
}

impl XrRuntime for OpenXrRuntime {
    fn view_count(&self) -> usize {
        self.swapchains.len()
    }

    fn poll_event(&mut self) -> XrResult<Option<RuntimeEvent>> {
        let event = self
            .instance
            .poll_event(&mut self.events)
            .map_err(XrError::call("xrPollEvent"))?;
        Ok(event.map(|event| match event {
            xr::Event::SessionStateChanged(change) => {
                RuntimeEvent::SessionStateChanged(session_state(change.state()))
            }
            xr::Event::InstanceLossPending(_) => RuntimeEvent::InstanceLossPending,
            _ => RuntimeEvent::Other,
        }))
    }

    fn begin_session(&mut self) -> XrResult<()> {
        self.session
            .begin(VIEW_CONFIGURATION)
            .map_err(XrError::call("xrBeginSession"))?;
        Ok(())
    }

    fn end_session(&mut self) -> XrResult<()> {
        self.session
            .end()
            .map_err(XrError::call("xrEndSession"))?;
        Ok(())
    }

    fn request_exit(&mut self) -> XrResult<()> {
        self.session
            .request_exit()
            .map_err(XrError::call("xrRequestExitSession"))
    }

    fn wait_frame(&mut self) -> XrResult<FrameTiming> {
        let state = self
            .waiter
            .wait()
            .map_err(XrError::call("xrWaitFrame"))?;
        Ok(FrameTiming {
            predicted_display_time: state.predicted_display_time.as_nanos(),
            predicted_display_period: state.predicted_display_period.as_nanos(),
            should_render: state.should_render,
        })
    }

    fn sync_input(&mut self) -> XrResult<()> {
        self.session
            .sync_actions(&[(&self.action_set).into()])
            .map_err(XrError::call("xrSyncActions"))
    }

    fn locate_views(&mut self, display_time: i64, out: &mut [LocatedView]) -> XrResult<()> {
        let (_, views) = self
            .session
            .locate_views(VIEW_CONFIGURATION, xr::Time::from_nanos(display_time), &self.local)
            .map_err(XrError::call("xrLocateViews"))?;
        for (slot, view) in out.iter_mut().zip(&views) {
            *slot = LocatedView {
                pose: pose_from_xr(view.pose),
                fov: fov_from_xr(view.fov),
            };
        }
        Ok(())
    }

    fn locate_head(&mut self, display_time: i64) -> XrResult<Option<Pose>> {
        let time = xr::Time::from_nanos(display_time);
        for hand in 0..self.hand_spaces.len().min(self.hands.len()) {
            let pose = self.locate_in_local(&self.hand_spaces[hand], time)?;
            self.hands[hand] = pose;
        }
        self.locate_in_local(&self.view_space, time)
    }

    fn begin_frame(&mut self) -> XrResult<()> {
        self.stream
            .begin()
            .map_err(XrError::call("xrBeginFrame"))?;
        Ok(())
    }

    fn acquire_image(&mut self, view: usize) -> XrResult<u32> {
        let swapchain = self.swapchain_mut(view)?;
        let index = swapchain
            .handle
            .acquire_image()
            .map_err(XrError::call("xrAcquireSwapchainImage"))?;
        swapchain
            .handle
            .wait_image(xr::Duration::INFINITE)
            .map_err(XrError::call("xrWaitSwapchainImage"))?;
        Ok(index)
    }

    fn release_image(&mut self, view: usize) -> XrResult<()> {
        self.swapchain_mut(view)?
            .handle
            .release_image()
            .map_err(XrError::call("xrReleaseSwapchainImage"))
    }

    fn end_frame(&mut self, display_time: i64, views: Option<&[LocatedView]>) -> XrResult<()> {
        let time = xr::Time::from_nanos(display_time);
        let Some(located) = views else {
            return self
                .stream
                .end(time, BLEND_MODE, &[])
                .map_err(XrError::call("xrEndFrame"));
        };

        if located.len() < STEREO_VIEWS || self.swapchains.len() < STEREO_VIEWS {
            return Err(XrError::Unsupported(format!(
                "{} located views for {} swapchains",
                located.len(),
                self.swapchains.len()
            )));
        }
        let projection_views: [xr::CompositionLayerProjectionView<'_, xr::Vulkan>; STEREO_VIEWS] =
            std::array::from_fn(|i| projection_view(&located[i], &self.swapchains[i]));
        let layer = xr::CompositionLayerProjection::new()
            .space(&self.local)
            .views(&projection_views);
        self.stream
            .end(time, BLEND_MODE, &[&layer])
            .map_err(XrError::call("xrEndFrame"))
    }
}

fn projection_view<'a>(
    view: &LocatedView,
    swapchain: &'a XrSwapchain,
) -> xr::CompositionLayerProjectionView<'a, xr::Vulkan> {
    xr::CompositionLayerProjectionView::new()
        .pose(pose_to_xr(view.pose))
        .fov(fov_to_xr(view.fov))
        .sub_image(
            xr::SwapchainSubImage::new()
                .swapchain(&swapchain.handle)
                .image_array_index(0)
                .image_rect(xr::Rect2Di {
                    offset: xr::Offset2Di { x: 0, y: 0 },
                    extent: xr::Extent2Di {
                        width: swapchain.extent.width as i32,
                        height: swapchain.extent.height as i32,
                    },
                }),
        )
}
