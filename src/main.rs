use rocket::fairing::AdHoc;
use rocket::figment::Figment;
use rocket::fs::FileServer;
use rocket::http::Status;
use rocket::serde::json::{json, Json, Value};
use rocket::{Build, Request, Rocket};
use tracing::{error, info};

use std::error::Error;

mod categories;
mod config;
mod data;
mod goals;
mod history;
mod internal_error;
mod media;
mod rewards;

use config::TrackerConfig;
use data::{close_store, open_store, DBConnection};

#[macro_use]
extern crate rocket;

#[catch(default)]
fn default_catcher(status: Status, _request: &Request) -> Json<Value> {
    Json(json!({
        "error": status.reason_lossy().to_lowercase().replace(' ', "_"),
        "message": status.to_string(),
    }))
}

fn build_rocket(figment: Figment) -> Result<Rocket<Build>, Box<dyn Error>> {
    let config: TrackerConfig = figment.extract()?;

    let connection = open_store(&config.database_path)?;
    std::fs::create_dir_all(&config.media_dir)?;
    info!(media_dir = %config.media_dir.display(), "serving media");

    let rocket = rocket::custom(figment)
        .manage(connection)
        .manage(config.clone())
        .mount(
            "/api",
            routes![
                goals::endpoints::get_goals,
                goals::endpoints::get_goal,
                goals::endpoints::add_goal,
                goals::endpoints::set_goal,
                goals::endpoints::remove_goal,
                goals::endpoints::set_completion,
                goals::endpoints::add_goal_task,
                goals::endpoints::set_goal_task,
                goals::endpoints::remove_goal_task,
                goals::endpoints::start_task,
                goals::endpoints::stop_task,
                goals::endpoints::reset_task,
                rewards::endpoints::get_rewards,
                rewards::endpoints::get_reward,
                rewards::endpoints::add_reward,
                rewards::endpoints::set_reward,
                rewards::endpoints::remove_reward,
                rewards::endpoints::set_goal_of_reward,
                rewards::endpoints::enjoy,
                rewards::endpoints::bind_goal_reward,
                rewards::endpoints::release_goal_reward,
                history::endpoints::get_sessions,
                history::endpoints::get_task_sessions,
                categories::endpoints::get_categories,
                categories::endpoints::add_category,
                categories::endpoints::rename_category,
                categories::endpoints::delete_category,
                media::get_media_list,
            ],
        )
        .mount("/uploads", FileServer::from(&config.media_dir))
        .register("/", catchers![default_catcher])
        .attach(AdHoc::on_shutdown("Close store", |rocket| {
            Box::pin(async move {
                if let Some(connection) = rocket.state::<DBConnection>() {
                    if let Err(e) = close_store(connection) {
                        error!("failed to close store: {}", e);
                    }
                }
            })
        }));

    Ok(rocket)
}

#[rocket::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let rocket = build_rocket(rocket::Config::figment())?;
    rocket.launch().await?;

    Ok(())
}
