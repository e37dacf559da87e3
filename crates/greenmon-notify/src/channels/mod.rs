pub mod broadcast;
pub mod webhook;
