pub mod display;
pub mod view_models;

pub use display::render;
pub use view_models::BoardView;
