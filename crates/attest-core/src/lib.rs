pub mod assert;
pub mod auth;
pub mod model;
pub mod parse;
pub mod prompt;
pub mod providers;
pub mod text;
