use rocket::serde::json::Json;
use rocket::{delete, get, post, put, State};
use tracing::info;

use crate::data::DBConnection;
use crate::internal_error::InternalResult;

use super::data::*;
use super::helpers::*;

#[get("/categories")]
pub fn get_categories(db_connection: &State<DBConnection>) -> InternalResult<Json<Vec<Category>>> {
    let db_connection = db_connection.lock()?;

    Ok(Json(get_categories_from_db(&db_connection)?))
}

#[post("/categories", format = "json", data = "<request>")]
pub fn add_category(
    request: Json<CategoryRequest>,
    db_connection: &State<DBConnection>,
) -> InternalResult<Json<Category>> {
    let db_connection = db_connection.lock()?;

    let category = add_category_to_db(&request.name, &db_connection)?;
    info!(category_id = category.id, name = %category.name, "category added");

    Ok(Json(category))
}

#[put("/categories/<category_id>", format = "json", data = "<request>")]
pub fn rename_category(
    category_id: CategoryID,
    request: Json<CategoryRequest>,
    db_connection: &State<DBConnection>,
) -> InternalResult<Json<Category>> {
    let db_connection = db_connection.lock()?;

    let category = rename_category_in_db(category_id, &request.name, &db_connection)?;
    info!(category_id, name = %category.name, "category renamed");

    Ok(Json(category))
}

#[delete("/categories/<category_id>")]
pub fn delete_category(
    category_id: CategoryID,
    db_connection: &State<DBConnection>,
) -> InternalResult<()> {
    let db_connection = db_connection.lock()?;

    delete_category_from_db(category_id, &db_connection)?;
    info!(category_id, "category deleted");

    Ok(())
}
