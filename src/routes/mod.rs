pub mod api;
pub mod relay;

pub use api::{create_admin_router, create_api_router};
pub use relay::create_relay_router;
