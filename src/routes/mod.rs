pub mod root;
pub mod verify;
