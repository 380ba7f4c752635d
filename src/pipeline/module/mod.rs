pub mod face_embedding;
pub mod face_extraction;
pub mod face_thumbnail;
pub mod reference_database;
