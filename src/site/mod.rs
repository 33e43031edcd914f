//! Project sites: records, coordinate handling, the directory they come
//! from, and the persisted selection.

pub mod coords;
pub mod directory;
pub mod store;
pub mod types;

pub use coords::{parse_coordinates, try_parse_coordinates, Coordinate};
pub use directory::{
    filter_sites, find_site, DirectoryError, FileSiteDirectory, HttpSiteDirectory, SiteDirectory,
    StaticSiteDirectory,
};
pub use store::{SelectionStore, StoreError, CURRENT_OFFICE_LOCATION_KEY};
pub use types::{has_valid_coordinates, CheckinRadius, SiteLocation};
