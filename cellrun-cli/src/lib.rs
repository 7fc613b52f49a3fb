pub mod discover;
pub mod manifest;
pub mod prepare;
pub mod run;
