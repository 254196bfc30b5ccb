pub mod aggregate;
pub mod preview;
pub mod run;
