use std::sync::Arc;

use anyhow::Result;

use parkscope_api::SnapshotClient;
use parkscope_core::{Config, SessionToken};
use parkscope_dashboard::DashboardSession;
use parkscope_feed::WsFeed;
use parkscope_search::{ConsoleMap, LatLng, NominatimProvider, SearchController};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize core
    parkscope_core::init()?;

    let config = Arc::new(Config::load()?);
    tracing::info!("Parkscope dashboard core started");

    println!("Parkscope - Live Parking Occupancy Core");
    println!("\nConfiguration:");
    println!("  Config directory: {}", config.config_dir.display());
    println!("  Snapshot API:     {}", config.api.base_url);
    println!("  Live feed:        {}", config.feed.url);

    // Bring up a dashboard session if a credential is present.
    match std::env::var("PARKSCOPE_TOKEN") {
        Ok(token) => {
            let api = SnapshotClient::new(&config.api.base_url)?;
            let feed = WsFeed::new(config.feed.url.clone(), config.feed.path.clone());
            let session = DashboardSession::new(Arc::clone(&config), api, feed);

            session.set_token(Some(SessionToken::new(token))).await;

            let summary = session.occupancy();
            println!(
                "\nSpots: {} total, {} free, {} occupied",
                summary.total, summary.free, summary.occupied
            );
            if let Some(forecast) = session.forecast() {
                println!(
                    "Predicted occupied in 1 hour: {:.1} spots",
                    forecast.predicted_occupied
                );
            }
            for spot in session.visible_spots() {
                let position = session.spot_position(spot.spot_id);
                println!(
                    "  Spot {} - {} at ({:.5}, {:.5})",
                    spot.spot_id, spot.status, position.lat, position.lng
                );
            }

            session.shutdown().await;
        }
        Err(_) => {
            println!("\nPARKSCOPE_TOKEN not set; dashboard session not started.");
        }
    }

    // Optional one-shot location search against a headless map surface.
    if let Ok(query) = std::env::var("PARKSCOPE_SEARCH") {
        let provider = NominatimProvider::new()?;
        let map = ConsoleMap::new(
            LatLng::new(config.map.center_lat, config.map.center_lon),
            config.map.zoom,
        );
        let search = SearchController::new(provider, map, config.search.clone());

        search.confirm(&query).await;
        search.teardown();
    }

    Ok(())
}
