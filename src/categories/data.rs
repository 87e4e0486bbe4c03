use serde::{Deserialize, Serialize};

pub type CategoryID = i64;

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Category {
    pub id: CategoryID,
    pub name: String,
}

#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
pub struct CategoryRequest {
    pub name: String,
}
