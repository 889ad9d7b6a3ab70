pub mod auth;
pub mod commission_service;
pub mod import_service;
pub mod lead_service;
pub mod report_service;
