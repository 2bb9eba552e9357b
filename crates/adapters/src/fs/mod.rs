mod clock;
mod local;
mod scanner;
mod thumbs;

pub use clock::SystemClock;
pub use local::LocalFileSystem;
pub use scanner::WalkdirFileScanner;
pub use thumbs::CacheThumbnailGenerator;
