pub mod answer;
pub mod convert;
pub mod export;
pub mod extract;
pub mod fetch;
pub mod record;
pub mod store;
