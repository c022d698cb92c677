pub mod cache;
pub mod config;
pub mod dispatcher;
pub mod exception;
pub mod param;
pub mod request;
pub mod resource;
pub mod response;
pub mod source;
pub mod streamable;
pub mod streamer;
pub mod util;

pub use cache::StreamableCache;
pub use config::Config;
pub use dispatcher::AssetDispatcher;
pub use exception::Exception;
pub use param::{HttpEncoding, HttpRequestMethod, HttpVersion};
pub use request::Request;
pub use resource::{FileResource, Resource};
pub use response::Response;
pub use source::StreamableResourceSource;
pub use streamable::{CompressionStatus, StreamableResource, StreamableResourceProcessing};
pub use streamer::{ResourceStreamer, StreamOption, DEFAULT_OPTIONS};
