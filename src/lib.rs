pub mod app;
pub mod config;
pub mod decide;
pub mod error;
pub mod fs_util;
pub mod lims;
pub mod locator;
pub mod phases;
pub mod registry;
pub mod report;
pub mod selection;
pub mod transfer;
