pub mod bins;
pub mod client_id;
pub mod output;
pub mod samples;
pub mod settings;
pub mod shutdown;
pub mod time;
