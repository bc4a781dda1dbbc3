pub mod message_service;
pub mod profiles;
pub mod realtime;
