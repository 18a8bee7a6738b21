//! Service layer
//!
//! Business logic separated from HTTP handlers. Services orchestrate the
//! database, media storage, and the external provider.

mod comments;
mod tweets;
mod videos;

pub use comments::{CommentDoc, CommentFeed, CommentService, CommentSource};
pub use tweets::TweetService;
pub use videos::{UploadedFile, VideoService};
