//! External provider integration

mod youtube;

pub use youtube::{
    ExternalComment, ExternalCommentPage, ExternalSearchPage, ExternalVideo,
    ExternalVideoDetails, YouTubeClient,
};
