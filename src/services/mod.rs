pub mod calendar_service;
pub mod email_service;
pub mod extraction_service;
pub mod scheduling_service;
pub mod transcript;
