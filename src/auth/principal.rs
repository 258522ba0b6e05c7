use serde::Serialize;

use crate::auth::role::Role;
use crate::db::User;

/// The authenticated identity attached to a request. Built fresh from a
/// verified token plus a store lookup on every request, carried through the
/// pipeline as an explicit value, and discarded at response time.
#[derive(Debug, Clone, Serialize)]
pub struct Principal {
    pub id: i32,

    pub username: String,

    pub role: Role,

    /// Team association scoping a manager's visible data.
    pub team_id: Option<i32>,

    pub team_member_id: Option<i32>,
}

impl From<User> for Principal {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            role: user.role,
            team_id: user.team_id,
            team_member_id: user.team_member_id,
        }
    }
}
