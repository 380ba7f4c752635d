pub mod verify_model;
