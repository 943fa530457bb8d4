pub mod capture;

pub use capture::capture;
