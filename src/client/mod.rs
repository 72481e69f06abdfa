// Video server client - query and download contracts plus the HTTP adapter

pub mod errors;
pub mod http;
pub mod models;
pub mod traits;
pub mod utils;

pub use errors::ClientError;
pub use http::HttpVideoClient;
pub use models::{DownloadProgress, VideoQuery, VideoRecord};
pub use traits::{ProgressEmitter, VideoDownloadClient, VideoQueryClient};
