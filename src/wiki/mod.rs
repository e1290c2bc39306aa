mod patch;
mod reddit;
mod venue;

pub use patch::{
    DEFAULT_SEPARATOR, MAX_REASON_CHARS, RELEASE_DATE_FORMAT, edit_reason, patch_table, table_row,
};
pub use reddit::{RedditCredentials, RedditVenue};
pub use venue::{CommentId, DEFAULT_WIKI_PAGE, PostId, VenueOutcome, VenueUpdater, WikiVenue};
