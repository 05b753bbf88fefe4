pub mod dispatch_service;
pub mod limiter_service;
pub mod outbox_service;
pub mod webhook_service;
