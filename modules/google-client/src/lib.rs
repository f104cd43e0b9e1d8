pub mod error;
pub mod geocode;
pub mod search;

pub use error::{GoogleError, Result};
pub use geocode::{AddressComponent, GeocodeResult, GeocodingClient, LatLng};
pub use search::{CustomSearchClient, SearchItem};

use std::time::Duration;

pub(crate) fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .unwrap_or_default()
}
