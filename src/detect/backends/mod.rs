pub mod stub;

#[cfg(feature = "backend-opencv")]
pub mod cascade;

pub use stub::StubBackend;

#[cfg(feature = "backend-opencv")]
pub use cascade::CascadeBackend;
