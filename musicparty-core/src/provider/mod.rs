pub mod bilibili;
pub mod error;
pub mod netease;
pub mod qqmusic;
pub mod registry;
pub mod traits;

pub use bilibili::BilibiliApi;
pub use error::ProviderError;
pub use netease::NeteaseApi;
pub use qqmusic::QqMusicApi;
pub use registry::ApiRegistry;
pub use traits::{MusicApi, PLAYLIST_PAGE_SIZE};
