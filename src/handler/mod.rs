pub mod verify_handler;
