pub mod monitoring;
pub mod routes;
