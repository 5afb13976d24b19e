pub mod inspect_state;
pub mod render;
pub mod restore;
