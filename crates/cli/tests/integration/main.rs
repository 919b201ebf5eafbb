mod check_tests;
mod common;
mod eval_tests;
mod init_tests;
