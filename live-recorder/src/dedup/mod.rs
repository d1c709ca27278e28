//! Room deduplication.
//!
//! Answers "is this URL already monitored?" across heterogeneous URL shapes
//! (share links, query strings, short links) with a priority chain of
//! checks, see [`DedupEngine::is_duplicate`].

mod cache;
mod engine;
mod room_id;
mod short_link;

pub use cache::BoundedCache;
pub use engine::{DedupEngine, DedupTarget, DuplicateReason};
pub use room_id::{RoomIdRule, SHORT_LINK_HOSTS, extract_room_id, is_short_link};
pub use short_link::{
    AnchorNameLookup, HttpShortLinkResolver, NoAnchorLookup, ResolverAnchorLookup,
    ShortLinkResolver,
};
