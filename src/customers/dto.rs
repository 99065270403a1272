use serde::{Deserialize, Serialize};

use super::repo_types::Customer;

#[derive(Debug, Deserialize)]
pub struct CustomerQuery {
    pub status: Option<String>,
    pub limit: Option<i64>,
    pub page: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct CustomerList {
    pub customers: Vec<Customer>,
    pub count: i64,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCustomerRequest {
    pub status: String,
}
