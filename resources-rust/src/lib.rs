mod errors;
mod fetcher;
mod filter;
pub mod list_view;
mod resource;

pub use errors::FetchError;
pub use fetcher::{
    BulkOutcome, Fetcher, FetcherOptions, FetcherState, LoadOutcome, MutationOutcome, Notice,
    ResponseOrdering,
};
pub use filter::{FilterState, SearchMode, SortDirection, SortState};
pub use list_view::{ListView, Pager, Paging, RenderedPage, Selection};
pub use resource::{merge_update, FieldValue, Operation, Reconcile, Resource};
