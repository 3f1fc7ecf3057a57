//! Media resource management: downloading a post's media, keeping it on disk
//! under a retention policy and byte ceiling, and decoding videos into frames
//! and audio.

pub mod decode;
pub mod error;
pub mod fetch;
pub mod handle;
pub(crate) mod retry;
pub mod store;

pub use decode::{DecodedVideo, FfmpegDecoder, VideoDecoder};
pub use error::MediaError;
pub use fetch::{HttpMediaFetcher, MediaFetcher};
pub use handle::{FailedAsset, LocalAsset, MediaHandle};
pub use store::{MediaStore, MediaStoreConfig};
