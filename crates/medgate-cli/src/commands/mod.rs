pub mod check;
pub mod decide;
pub mod matrix;
pub mod watch;
