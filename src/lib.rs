pub mod banner;
pub mod cache;
pub mod config;
pub mod exception;
pub mod htaccess;
pub mod middleware;
pub mod pages;
pub mod param;
pub mod request;
pub mod resolver;
pub mod response;
pub mod script;
pub mod server;
pub mod util;

pub use cache::ResponseCache;
pub use config::Config;
pub use exception::Exception;
pub use htaccess::{Decision, PathMatcher, RuleSet};
pub use middleware::{Handler, Pipeline};
pub use param::{HttpEncoding, HttpVersion};
pub use request::Request;
pub use resolver::{ContentResolver, ResolvedTarget};
pub use response::Response;
pub use script::{PhpExecutor, ScriptExecutor};
pub use server::Server;
pub use util::HtmlBuilder;
