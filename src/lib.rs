#[macro_use]
extern crate log;
#[macro_use]
extern crate derive_builder;
#[macro_use]
extern crate lazy_static;

pub mod browser_controller;
pub mod enricher;
pub mod extractor;
pub mod fetcher;
pub mod packager;
pub mod runner;
pub mod sitemap;
pub mod types;
pub mod utils;
