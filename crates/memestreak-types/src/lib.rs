pub mod api;
pub mod callback;
pub mod de;
pub mod models;
pub mod session;
pub mod streak;
