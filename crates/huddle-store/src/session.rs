use huddle_shared::models::User;
use huddle_shared::UserId;

/// The signed-in user's profile, or nothing before sign-in / after logout.
#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    user: Option<User>,
}

impl SessionStore {
    pub fn set_user(&mut self, user: User) {
        self.user = Some(user);
    }

    pub fn clear(&mut self) {
        self.user = None;
    }

    pub fn current(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn user_id(&self) -> Option<&UserId> {
        self.user.as_ref().map(|u| &u.id)
    }

    pub fn is_me(&self, id: &UserId) -> bool {
        self.user_id() == Some(id)
    }
}
