mod common;
mod sweep;
