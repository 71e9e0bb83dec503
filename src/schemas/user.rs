use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::models::user::{self, UserRole};

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct UserResponse {
    pub id: i64,
    pub user_id: String,
    pub email: String,
    pub role: UserRole,
    pub company_id: Option<i64>,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub job_title: Option<String>,
    pub department: Option<String>,
    pub location: Option<String>,
    #[schema(value_type = Option<String>, format = Date)]
    pub date_of_birth: Option<NaiveDate>,
    pub invitation_id: Option<i64>,
    pub profile_completed: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<user::Model> for UserResponse {
    fn from(user: user::Model) -> Self {
        Self {
            id: user.id,
            user_id: user.user_id,
            email: user.email,
            role: user.role,
            company_id: user.company_id,
            first_name: user.first_name,
            last_name: user.last_name,
            phone: user.phone,
            job_title: user.job_title,
            department: user.department,
            location: user.location,
            date_of_birth: user.date_of_birth,
            invitation_id: user.invitation_id,
            profile_completed: user.profile_completed,
            is_active: user.is_active,
            created_at: user.created_at,
        }
    }
}
