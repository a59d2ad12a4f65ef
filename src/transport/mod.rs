mod http_transport;
mod prepared_upstream;

pub use http_transport::{BufferedResponse, HttpTransport};
pub use prepared_upstream::PreparedUpstream;
