mod admin;
mod feed;
mod files;
mod session;
mod static_files;

pub use admin::{admin_purge, health};
pub use feed::{feed, teaser, FeedParams, FeedResponse};
pub use files::{
    delete_file, list_files, list_owner_files, update_file, upload_file, UpdateFileRequest,
};
pub use session::current_session;
pub use static_files::serve_static;
