mod common;
mod pipeline_tests;
mod reload_tests;
