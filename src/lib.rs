pub mod cli;
pub mod doorman;
