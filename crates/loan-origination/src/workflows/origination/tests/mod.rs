mod common;
mod underwriting;
