pub mod health;
pub mod lifecycle;
pub mod policies;
pub mod reports;
pub mod settings;
