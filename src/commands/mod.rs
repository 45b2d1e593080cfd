pub mod db;
pub mod publication;
pub mod ranking;
pub mod settings;
