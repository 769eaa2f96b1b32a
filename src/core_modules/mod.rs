pub mod background_model;
pub mod calibration;
pub mod layout_editor;
pub mod morphology;
pub mod overlay;
pub mod trigger_engine;
pub mod utils;
pub mod zone;
