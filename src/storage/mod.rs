//! Object storage for uploaded media

mod media;

pub use media::MediaStorage;
