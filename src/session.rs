pub const USER_ID: &str = "user_id";
pub const USERNAME: &str = "username";
