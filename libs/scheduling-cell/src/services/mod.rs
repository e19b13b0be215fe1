pub mod appointments;
pub mod documents;
pub mod queries;
pub mod reservation;
pub mod slots;
