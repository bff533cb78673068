pub mod http_client;
pub mod in_process;
pub mod media_host;
pub mod notifier;
pub mod session;
