pub mod request_tracking;

pub use request_tracking::RequestTracking;
