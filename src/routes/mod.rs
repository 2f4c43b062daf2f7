pub mod health;
pub mod png;
pub mod video;
