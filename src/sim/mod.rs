pub mod catalog;
pub mod event;
pub mod grid;
pub mod level;
pub mod step;
