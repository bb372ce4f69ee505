pub mod correlate;
pub mod index;
pub mod info;
pub mod list;
pub mod search;
pub mod view;
pub mod watch;
