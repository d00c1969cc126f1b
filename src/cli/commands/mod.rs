pub mod append;
pub mod bootstrap;
pub mod describe;
pub mod fields;
pub mod materialize;
