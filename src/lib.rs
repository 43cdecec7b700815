pub mod config;
pub mod controller;
pub mod model;
pub mod normalizer;
pub mod parser;
pub mod scraper;

pub use controller::{JobScraper, StopToken};
pub use model::{JobPost, JobResponse, ScraperInput};
