pub mod files;
pub mod pages;
