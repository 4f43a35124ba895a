//! HTTP fetch utilities and catalog persistence for the wallpaper ingester.

mod http;
mod memory;
mod postgres;
mod store;

pub use http::{Fetch, FetchError, HttpClientConfig, HttpFetcher};
pub use memory::MemoryCatalogStore;
pub use postgres::PgCatalogStore;
pub use reqwest::Url;
pub use store::{
    CatalogStore, Counter, SortColumn, SortOrder, StoreError, WallpaperPage, WallpaperQuery,
};

pub const CRATE_NAME: &str = "wpa-storage";
