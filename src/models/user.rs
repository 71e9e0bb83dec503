use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Subject id issued by the identity provider
    #[sea_orm(unique)]
    pub user_id: String,
    #[sea_orm(unique)]
    pub email: String,
    pub role: UserRole,
    pub company_id: Option<i64>,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub job_title: Option<String>,
    pub department: Option<String>,
    pub location: Option<String>,
    pub date_of_birth: Option<Date>,
    pub invitation_id: Option<i64>,
    pub profile_completed: bool,
    pub is_active: bool,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

impl Model {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::company::Entity",
        from = "Column::CompanyId",
        to = "super::company::Column::Id"
    )]
    Company,
}

impl Related<super::company::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Company.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Platform roles, shared by users and the invitations that create them
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    utoipa::ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    #[sea_orm(string_value = "site_admin")]
    SiteAdmin,
    #[sea_orm(string_value = "company_admin")]
    CompanyAdmin,
    #[sea_orm(string_value = "trainee")]
    Trainee,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::SiteAdmin => "site_admin",
            UserRole::CompanyAdmin => "company_admin",
            UserRole::Trainee => "trainee",
        }
    }

    /// Human readable role name used in emails
    pub fn label(&self) -> &'static str {
        match self {
            UserRole::SiteAdmin => "Site Administrator",
            UserRole::CompanyAdmin => "Company Administrator",
            UserRole::Trainee => "Trainee",
        }
    }

    /// Company-scoped roles must always carry a company id
    pub fn requires_company(&self) -> bool {
        !matches!(self, UserRole::SiteAdmin)
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
