pub mod verify_service;
