mod comment;
mod issue;
mod simple_entity;
mod transition;
mod user;

pub use comment::{CommentListing, RawComment};
pub use issue::{FetchedFields, IssuePayload};
pub use simple_entity::deserialize_string_field;
pub use transition::{Transition, TransitionDestination, TransitionListing};
pub use user::RawUser;
