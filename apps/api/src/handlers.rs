pub mod audit;
pub mod directory;
pub mod draft;
pub mod health;
pub mod matrix;
