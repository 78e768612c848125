//! Preset persistence: wire codec and reference backends

pub mod in_memory;
pub mod wire;

pub use in_memory::{DEFAULT_PRESET_NAME, InMemoryPresetStore};
pub use wire::{PresetDocument, decode, encode};
