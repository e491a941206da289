use oso::PolarClass;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The caller identity attached to every operation. Session mechanics live
/// in the auth collaborator; by the time a request reaches the engine it
/// carries a resolved id and role set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub roles: Vec<String>,
}

impl User {
    pub fn new(id: Uuid, roles: Vec<String>) -> Self {
        Self { id, roles }
    }

    pub fn new_system_user() -> Self {
        Self {
            id: Uuid::new_v4(),
            roles: vec!["system".into()],
        }
    }

    fn matches_id(&self, optional_id: Option<Uuid>) -> bool {
        optional_id.map_or(false, |id| self.id == id)
    }

    fn has_role(&self, role: String) -> bool {
        self.roles.iter().any(|r| r == &role)
    }
}

impl PolarClass for User {
    fn get_polar_class_builder() -> oso::ClassBuilder<User> {
        oso::Class::builder()
            .name("User")
            .add_attribute_getter("id", |recv: &User| recv.id)
            .add_attribute_getter("roles", |recv: &User| recv.roles.clone())
            .add_method("matches_id", User::matches_id)
            .add_method("has_role", User::has_role)
    }

    fn get_polar_class() -> oso::Class {
        let builder = User::get_polar_class_builder();
        builder.build()
    }
}
