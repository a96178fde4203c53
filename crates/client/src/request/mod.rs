//! Request executors: one asynchronous operation wrapped with
//! `{ data, loading, error }` state, plus the paginated, infinite-scroll,
//! polling and REST-verb forms built on top of it.

mod executor;
mod infinite;
mod paginated;
mod polling;
mod state;
mod verbs;

pub use executor::{
    use_api, ErrorCallback, OperationFuture, RequestExecutor, RequestOptions, RetryPolicy,
    SuccessCallback,
};
pub use infinite::{use_infinite_scroll, InfiniteScroll, Sentinel};
pub use paginated::{
    use_paginated_api, PageRequest, PaginatedExecutor, PaginatedOptions, PaginationState,
    DEFAULT_PAGE_SIZE,
};
pub use polling::{use_polling, Poller, PollingOptions, MIN_INTERVAL};
pub use state::RequestState;
pub use verbs::{use_delete, use_endpoint, use_get, use_post, use_put, EndpointExecutor, Payload};
