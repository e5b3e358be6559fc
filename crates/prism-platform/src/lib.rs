// SPDX-License-Identifier: CEPL-1.0
mod shutdown;

pub use shutdown::{spawn_keyboard_watcher, spawn_watcher, ShutdownSignal};
pub use winit;
