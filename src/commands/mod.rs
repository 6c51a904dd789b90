pub mod apply;
pub mod module;
pub mod status;
