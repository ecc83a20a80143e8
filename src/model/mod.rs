pub mod automation;
pub mod catalog;

pub use automation::{AutomationConfig, ColorMode};
pub use catalog::{Group, GroupKind, Light, LightGroupCatalog};
