//! Outbound actions: catalog, tag grammar and executor

pub mod executor;
pub mod registry;
pub mod tags;

pub use executor::{
    bind_fields, render_request, ActionExecutor, ExecutionReport, RenderedRequest, TrustMode,
    ACTION_TIMEOUT,
};
pub use registry::{ActionRegistry, ActionSpec, ACTIONS_FILE};
pub use tags::{parse_action_requests, replace_action_tags, strip_action_tags, ActionRequest};
