pub mod params;
pub mod registry;

// Re-export the modules here for easy import elsewhere.
pub use params::*;
pub use registry::*;
