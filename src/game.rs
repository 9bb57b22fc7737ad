pub mod constants;
pub mod snake;
pub mod types;
pub mod world;
