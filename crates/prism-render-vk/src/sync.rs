// SPDX-License-Identifier: CEPL-1.0
//! Frames-in-flight bookkeeping.
//!
//! Slot `frame % N` owns an image-available semaphore, a render-finished
//! semaphore and an in-flight fence. The fence is waited on before the slot
//! is reused and reset right before the next submission that signals it.

use ash::vk;

use crate::error::VkError;

/// Fence and semaphore lifecycle, implemented for `ash::Device`.
pub trait SyncDevice {
    type Semaphore: Copy;
    type Fence: Copy;
    type Error;

    fn create_semaphore(&self) -> Result<Self::Semaphore, Self::Error>;
    fn create_fence(&self, signaled: bool) -> Result<Self::Fence, Self::Error>;
    fn wait_fence(&self, fence: Self::Fence, timeout_ns: u64) -> Result<(), Self::Error>;
    fn reset_fence(&self, fence: Self::Fence) -> Result<(), Self::Error>;
    fn destroy_semaphore(&self, semaphore: Self::Semaphore);
    fn destroy_fence(&self, fence: Self::Fence);
}

impl SyncDevice for ash::Device {
    type Semaphore = vk::Semaphore;
    type Fence = vk::Fence;
    type Error = VkError;

    fn create_semaphore(&self) -> Result<vk::Semaphore, VkError> {
        let info = vk::SemaphoreCreateInfo::default();
        unsafe { ash::Device::create_semaphore(self, &info, None) }
            .map_err(VkError::call("vkCreateSemaphore"))
    }

    fn create_fence(&self, signaled: bool) -> Result<vk::Fence, VkError> {
        let info = vk::FenceCreateInfo {
            s_type: vk::StructureType::FENCE_CREATE_INFO,
            flags: if signaled {
                vk::FenceCreateFlags::SIGNALED
            } else {
                vk::FenceCreateFlags::empty()
            },
            ..Default::default()
        };
        unsafe { ash::Device::create_fence(self, &info, None) }.map_err(VkError::call("vkCreateFence"))
    }

    fn wait_fence(&self, fence: vk::Fence, timeout_ns: u64) -> Result<(), VkError> {
        unsafe { self.wait_for_fences(&[fence], true, timeout_ns) }
            .map_err(VkError::call("vkWaitForFences"))
    }

    fn reset_fence(&self, fence: vk::Fence) -> Result<(), VkError> {
        unsafe { self.reset_fences(&[fence]) }.map_err(VkError::call("vkResetFences"))
    }

    fn destroy_semaphore(&self, semaphore: vk::Semaphore) {
        unsafe { ash::Device::destroy_semaphore(self, semaphore, None) }
    }

    fn destroy_fence(&self, fence: vk::Fence) {
        unsafe { ash::Device::destroy_fence(self, fence, None) }
    }
}

pub struct FrameSlot<D: SyncDevice> {
    pub image_available: D::Semaphore,
    pub render_finished: D::Semaphore,
    pub in_flight: D::Fence,
}

/// Bounded pool of per-frame synchronization primitives.
pub struct FrameSyncSet<D: SyncDevice> {
    slots: Vec<FrameSlot<D>>,
}

impl<D: SyncDevice> FrameSyncSet<D> {
    /// Creates `frames_in_flight` slots (at least one). Fences start signaled
    /// so the first wait on each slot returns immediately.
    pub fn new(device: &D, frames_in_flight: usize) -> Result<Self, D::Error> {
        let mut set = Self {
            slots: Vec::with_capacity(frames_in_flight.max(1)),
        };
        for _ in 0..frames_in_flight.max(1) {
            match Self::create_slot(device) {
                Ok(slot) => set.slots.push(slot),
                Err(e) => {
                    set.destroy(device);
                    return Err(e);
                }
            }
        }
        Ok(set)
    }

    fn create_slot(device: &D) -> Result<FrameSlot<D>, D::Error> {
        let image_available = device.create_semaphore()?;
        let render_finished = match device.create_semaphore() {
            Ok(s) => s,
            Err(e) => {
                device.destroy_semaphore(image_available);
                return Err(e);
            }
        };
        let in_flight = match device.create_fence(true) {
            Ok(f) => f,
            Err(e) => {
                device.destroy_semaphore(image_available);
                device.destroy_semaphore(render_finished);
                return Err(e);
            }
        };
        Ok(FrameSlot {
            image_available,
            render_finished,
            in_flight,
        })
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slot_index(&self, frame: u64) -> usize {
        (frame % self.slots.len().max(1) as u64) as usize
    }

    pub fn slot(&self, index: usize) -> &FrameSlot<D> {
        &self.slots[index]
    }

    /// Returns the slot for `frame` once the GPU has finished the previous
    /// submission that used it.
    pub fn acquire_slot(&self, device: &D, frame: u64) -> Result<&FrameSlot<D>, D::Error> {
        let index = self.slot_index(frame);
        self.wait_slot(device, index)?;
        Ok(&self.slots[index])
    }

    pub fn wait_slot(&self, device: &D, index: usize) -> Result<(), D::Error> {
        device.wait_fence(self.slots[index].in_flight, u64::MAX)
    }

    /// Unsignals the slot's fence ahead of the submission that will signal it.
    pub fn reset_slot(&self, device: &D, index: usize) -> Result<(), D::Error> {
        device.reset_fence(self.slots[index].in_flight)
    }

    /// The device must be idle: no pending submission may reference a slot.
    pub fn destroy(&mut self, device: &D) {
        for slot in self.slots.drain(..) {
            device.destroy_semaphore(slot.image_available);
            device.destroy_semaphore(slot.render_finished);
            device.destroy_fence(slot.in_flight);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};

    #[derive(Clone, Copy, Debug)]
    struct MockFence {
        signaled: bool,
        completes_at: Option<u64>,
        destroyed: bool,
    }

    /// CPU/GPU timeline where submitted work completes `latency` ticks later.
    #[derive(Default)]
    struct MockGpu {
        clock: Cell<u64>,
        latency: u64,
        fences: RefCell<Vec<MockFence>>,
        semaphores: Cell<usize>,
        live_semaphores: Cell<isize>,
        blocking_waits: Cell<usize>,
        violations: Cell<usize>,
        fail_fence_after: Option<usize>,
    }

    impl MockGpu {
        fn with_latency(latency: u64) -> Self {
            Self {
                latency,
                ..Default::default()
            }
        }

        fn retire(&self) {
            let now = self.clock.get();
            for f in self.fences.borrow_mut().iter_mut() {
                if matches!(f.completes_at, Some(t) if t <= now) {
                    f.signaled = true;
                    f.completes_at = None;
                }
            }
        }

        fn submit(&self, fence: usize) {
            self.retire();
            let mut fences = self.fences.borrow_mut();
            let f = &mut fences[fence];
            if f.completes_at.is_some() || f.signaled {
                // Reusing work still in flight, or submitting without reset.
                self.violations.set(self.violations.get() + 1);
            }
            f.signaled = false;
            f.completes_at = Some(self.clock.get() + self.latency);
        }

        fn tick(&self) {
            self.clock.set(self.clock.get() + 1);
            self.retire();
        }

        fn live_fences(&self) -> usize {
            self.fences.borrow().iter().filter(|f| !f.destroyed).count()
        }
    }

    impl SyncDevice for MockGpu {
        type Semaphore = usize;
        type Fence = usize;
        type Error = &'static str;

        fn create_semaphore(&self) -> Result<usize, &'static str> {
            let id = self.semaphores.get();
            self.semaphores.set(id + 1);
            self.live_semaphores.set(self.live_semaphores.get() + 1);
            Ok(id)
        }

        fn create_fence(&self, signaled: bool) -> Result<usize, &'static str> {
            let mut fences = self.fences.borrow_mut();
            if self.fail_fence_after == Some(fences.len()) {
                return Err("out of fences");
            }
            fences.push(MockFence {
                signaled,
                completes_at: None,
                destroyed: false,
            });
            Ok(fences.len() - 1)
        }

        fn wait_fence(&self, fence: usize, _timeout_ns: u64) -> Result<(), &'static str> {
            self.retire();
            let pending = self.fences.borrow()[fence].completes_at;
            if let Some(t) = pending {
                self.blocking_waits.set(self.blocking_waits.get() + 1);
                self.clock.set(t);
                self.retire();
            }
            Ok(())
        }

        fn reset_fence(&self, fence: usize) -> Result<(), &'static str> {
            let mut fences = self.fences.borrow_mut();
            if fences[fence].completes_at.is_some() {
                self.violations.set(self.violations.get() + 1);
            }
            fences[fence].signaled = false;
            Ok(())
        }

        fn destroy_semaphore(&self, _semaphore: usize) {
            self.live_semaphores.set(self.live_semaphores.get() - 1);
        }

        fn destroy_fence(&self, fence: usize) {
            self.fences.borrow_mut()[fence].destroyed = true;
        }
    }

    fn run_frames(gpu: &MockGpu, set: &FrameSyncSet<MockGpu>, frames: u64) {
        for frame in 0..frames {
            let index = set.slot_index(frame);
            let slot = set.acquire_slot(gpu, frame).unwrap();
            let fence = slot.in_flight;
            set.reset_slot(gpu, index).unwrap();
            gpu.submit(fence);
            gpu.tick();
        }
    }

    #[test]
    fn slots_are_never_reused_before_their_fence_signals() {
        let gpu = MockGpu::with_latency(7);
        let set = FrameSyncSet::new(&gpu, 2).unwrap();
        run_frames(&gpu, &set, 3);
        assert_eq!(gpu.violations.get(), 0);
        // GPU is slower than the CPU, so the third frame had to block.
        assert!(gpu.blocking_waits.get() >= 1);
    }

    #[test]
    fn long_run_with_slow_gpu_stays_safe() {
        let gpu = MockGpu::with_latency(5);
        let set = FrameSyncSet::new(&gpu, 3).unwrap();
        run_frames(&gpu, &set, 40);
        assert_eq!(gpu.violations.get(), 0);
    }

    #[test]
    fn first_pass_over_slots_does_not_block() {
        let gpu = MockGpu::with_latency(100);
        let set = FrameSyncSet::new(&gpu, 3).unwrap();
        run_frames(&gpu, &set, 3);
        assert_eq!(gpu.blocking_waits.get(), 0);
        run_frames(&gpu, &set, 1);
        assert_eq!(gpu.blocking_waits.get(), 1);
    }

    #[test]
    fn mock_detects_early_reuse() {
        let gpu = MockGpu::with_latency(4);
        let set = FrameSyncSet::new(&gpu, 2).unwrap();
        for frame in 0..3u64 {
            let slot = set.slot(set.slot_index(frame));
            set.reset_slot(&gpu, set.slot_index(frame)).unwrap();
            gpu.submit(slot.in_flight);
            gpu.tick();
        }
        assert!(gpu.violations.get() > 0);
    }

    #[test]
    fn slot_index_wraps() {
        let gpu = MockGpu::default();
        let set = FrameSyncSet::new(&gpu, 2).unwrap();
        let indices: Vec<usize> = (0..5).map(|f| set.slot_index(f)).collect();
        assert_eq!(indices, vec![0, 1, 0, 1, 0]);
    }

    #[test]
    fn zero_frames_in_flight_still_gets_one_slot() {
        let gpu = MockGpu::default();
        let set = FrameSyncSet::new(&gpu, 0).unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.slot_index(7), 0);
    }

    #[test]
    fn destroy_releases_everything() {
        let gpu = MockGpu::default();
        let mut set = FrameSyncSet::new(&gpu, 3).unwrap();
        assert_eq!(gpu.live_semaphores.get(), 6);
        assert_eq!(gpu.live_fences(), 3);
        set.destroy(&gpu);
        assert!(set.is_empty());
        assert_eq!(gpu.live_semaphores.get(), 0);
        assert_eq!(gpu.live_fences(), 0);
    }

    #[test]
    fn partial_creation_failure_cleans_up() {
        let gpu = MockGpu {
            fail_fence_after: Some(1),
            ..Default::default()
        };
        assert!(FrameSyncSet::new(&gpu, 3).is_err());
        assert_eq!(gpu.live_semaphores.get(), 0);
        assert_eq!(gpu.live_fences(), 0);
    }
}
