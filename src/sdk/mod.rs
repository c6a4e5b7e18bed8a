pub mod animation;
pub mod battery;
pub mod config;
pub mod geo;
pub mod location;
pub mod navigation;
pub mod routing;
pub mod util;
