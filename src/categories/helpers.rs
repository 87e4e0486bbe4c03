use rusqlite::{params, Connection, ErrorCode};

use crate::internal_error::{InternalError, InternalResult};

use super::data::*;

fn map_duplicate(e: rusqlite::Error, name: &str) -> InternalError {
    match e {
        rusqlite::Error::SqliteFailure(failure, _) if failure.code == ErrorCode::ConstraintViolation => {
            InternalError::Conflict(format!("category \"{}\" already exists", name))
        }
        e => InternalError::from(e),
    }
}

fn validate_name(name: &str) -> InternalResult<&str> {
    let name = name.trim();
    if name.is_empty() {
        return Err(InternalError::BadRequest("category name is empty".to_string()));
    }
    Ok(name)
}

pub fn get_categories_from_db(db_connection: &Connection) -> InternalResult<Vec<Category>> {
    let mut category_statement =
        db_connection.prepare("SELECT id, name FROM categories ORDER BY name")?;

    let category_rows = category_statement.query_map(params![], |row| {
        Ok(Category {
            id: row.get(0)?,
            name: row.get(1)?,
        })
    })?;

    let mut categories = vec![];
    for row_result in category_rows {
        categories.push(row_result?);
    }

    Ok(categories)
}

pub fn add_category_to_db(name: &str, db_connection: &Connection) -> InternalResult<Category> {
    let name = validate_name(name)?;

    db_connection
        .execute("INSERT INTO categories (name) VALUES (?1)", params![name])
        .map_err(|e| map_duplicate(e, name))?;

    Ok(Category {
        id: db_connection.last_insert_rowid(),
        name: name.to_string(),
    })
}

pub fn rename_category_in_db(
    category_id: CategoryID,
    name: &str,
    db_connection: &Connection,
) -> InternalResult<Category> {
    let name = validate_name(name)?;

    let changed = db_connection
        .execute(
            "UPDATE categories SET name = (?1) WHERE id = (?2)",
            params![name, category_id],
        )
        .map_err(|e| map_duplicate(e, name))?;
    if changed == 0 {
        return Err(InternalError::not_found("category", category_id));
    }

    Ok(Category {
        id: category_id,
        name: name.to_string(),
    })
}

pub fn delete_category_from_db(
    category_id: CategoryID,
    db_connection: &Connection,
) -> InternalResult<()> {
    let changed = db_connection.execute(
        "DELETE FROM categories WHERE id = (?1)",
        params![category_id],
    )?;
    if changed == 0 {
        return Err(InternalError::not_found("category", category_id));
    }

    Ok(())
}
