//! Core types for the Igniter request processing pipeline: the request and
//! response model, routing, body decoding, cookies, schema validation, and
//! the capability contracts the rest of the workspace implements.

pub mod action;
pub mod body;
pub mod capability;
pub mod config;
pub mod context;
pub mod cookie;
pub mod error;
pub mod json;
pub mod request;
pub mod response;
pub mod router;
pub mod schema;

pub use action::{Action, Controller, Handler, HandlerOutput, Middleware, MiddlewareOutcome};
pub use body::{MultipartValue, ParsedBody, UploadedFile};
pub use capability::{
    HttpSpanTags, JobQueue, NoopTelemetry, PluginActionResult, PluginHandle, ScopedLogger,
    SpanHandle, Store, TelemetryProvider, TraceContext,
};
pub use config::{CoreConfig, LogLevel};
pub use context::{
    Capabilities, ContextBuilder, RESERVED_CONTEXT_KEYS, RequestContext, ScopeSelector,
    UserContextSource,
};
pub use cookie::{CookieJar, CookieOptions, SameSite};
pub use error::{ClassifiedError, ErrorBody, ErrorCode, FrameworkError, ValidationIssue, classify};
pub use request::{RawRequest, RequestEnvelope, WireResponse};
pub use response::{
    FinalizedResponse, ResponseBody, ResponseBuilder, RevalidateDirective, StreamDirective,
    StreamOptions,
};
pub use router::{ResolvedRoute, RouteTable, RouteTableBuilder};
pub use schema::{FnSchema, Schema, TypedSchema};
