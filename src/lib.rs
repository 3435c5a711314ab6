// Export modules for use in tests
pub mod panic_handler;
pub mod pdf;
pub mod placement;
pub mod session;
pub mod settings;
pub mod source;
pub mod store;
pub mod zones;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use placement::{PlacementDispatcher, PlacementError, PlacementTarget};
pub use session::Session;
pub use settings::Settings;
