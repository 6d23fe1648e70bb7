// Signal producers polled by scraper tasks

pub mod trains;

pub use trains::TrainRoute;
