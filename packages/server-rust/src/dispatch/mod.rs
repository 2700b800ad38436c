//! Request dispatch: tower middleware that runs each request inside its
//! tenant's shell.

pub mod layer;
pub mod pipeline;
pub mod response;
pub mod trace;

pub use layer::{Dispatch, DispatchError, TenantContainerLayer, TenantContainerService};
pub use pipeline::build_dispatch_pipeline;
pub use response::{into_http_response, HttpDispatchService};
pub use trace::{DispatchTraceLayer, DispatchTraceService};
