use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub full_name: Option<String>,
    pub gender: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

/// Admin request creating a staff (or customer) account.
#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub gender: String,
    pub phone: String,
    pub address: String,
    pub role: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateAccessRequest {
    pub active: Option<bool>,
    pub role: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UserQuery {
    pub role: Option<String>,
}
