//! Database row types. These map directly to SQLite rows and are kept
//! distinct from the parlor-types models so the DB layer stays independent.

pub struct UserRow {
    pub id: String,
    pub email: String,
    pub name: String,
    pub img_url: String,
    pub password: String,
    pub created_at: String,
}

pub struct ConversationRow {
    pub id: String,
    pub user1_id: String,
    pub user2_id: String,
    pub is_blocked: bool,
    pub blocker_id: String,
    pub created_at: String,
    pub updated_at: String,
}
