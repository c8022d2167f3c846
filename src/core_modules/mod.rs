pub mod activity;
pub mod blob;
pub mod event;
pub mod filters;
pub mod tracker;
