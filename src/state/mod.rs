pub mod verify_state;
