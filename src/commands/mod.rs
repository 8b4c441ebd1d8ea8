pub mod samples;
pub mod search;
pub mod status;
