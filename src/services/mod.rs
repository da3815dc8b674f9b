pub mod assignment;
pub mod cache;
pub mod dispatcher;
pub mod filter;
pub mod gitlab;
pub mod observer;
pub mod queue;
pub mod selector;
pub mod slack;
pub mod worker;
