//! Member identity as supplied by the caller's auth context.

use super::MemberId;

/// Identity of the member acting on a session.
///
/// Name and email are copied onto each vote so rosters can be displayed
/// without a second lookup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Member {
    pub id: MemberId,
    pub name: String,
    pub email: String,
}

impl Member {
    pub fn new(id: impl Into<String>, name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: MemberId::new(id),
            name: name.into(),
            email: email.into(),
        }
    }
}
