//! The Igniter request processor: route resolution, context assembly,
//! layered middleware, schema validation, handler invocation, and
//! structured response serialization, plus the self-dispatch path that
//! drives actions by name through the same pipeline.

pub mod dispatch;
pub mod processor;

pub use dispatch::DispatchInput;
pub use processor::{ProcessOutcome, ProcessorBuilder, RequestProcessor};
