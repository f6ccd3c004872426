//! HTTP clients for the upstream music catalogs.
//!
//! Each client speaks one catalog's API and nothing else: no queue, no
//! session state, no capability dispatch. The adapter layer in
//! `musicparty-core` builds the capability surface on top of these.

pub mod bilibili;
pub mod error;
pub mod netease;
pub mod qqmusic;

pub use bilibili::BilibiliClient;
pub use error::{check_response, json_with_limit, ApiClientError, MAX_RESPONSE_SIZE};
pub use netease::NeteaseClient;
pub use qqmusic::QqMusicClient;
