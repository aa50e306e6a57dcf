//! HTTP server layer.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         HTTP Layer                              │
//! │      POST /deploy            GET /items/{kind}/{uuid}           │
//! │                                                                 │
//! │  ┌──────────────────────────┐  ┌─────────────────────────────┐  │
//! │  │        handlers          │  │          routes             │  │
//! │  │ (HTTP ⇄ DeployService)   │  │  (router, CORS, tracing)    │  │
//! │  └──────────────────────────┘  └─────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod handlers;
pub mod routes;

pub use handlers::{
    deploy_handler, health_handler, item_handler, root_handler, AppState, ErrorResponse,
    HealthResponse, ItemPathParams, ItemQueryParams, MessageResponse,
};
pub use routes::{create_router, RouterConfig};
