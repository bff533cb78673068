pub mod ports;
pub mod media;
pub mod catalog_service;
pub mod uniqueness;
pub mod wizard;
pub mod update;
pub mod list_cache;
pub mod storefront;
pub mod enquiry;
