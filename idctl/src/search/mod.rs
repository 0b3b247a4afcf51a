//! Stateful, cursor-based search.
//!
//! Searches over admins, users and the audit log are paginated and stateful:
//! a `*SearchBegin` command fixes the parameters and produces page 1, and
//! subsequent `*Next`/`*Previous` commands walk the result pages without
//! re-sending the parameters.
//!
//! # Structure
//!
//! ```text
//!   SearchSession ── one slot per search kind ──► SearchCursor<P>
//!        │                                             │ parameters (immutable)
//!        │                                             │ page_index / page_count
//!        ▼                                             ▼
//!   lives on the login session            drives a SearchQueries<P> store
//! ```
//!
//! A [`SearchCursor`] never holds result rows, only a position; every page is
//! fetched fresh from the store, inside the command's transaction. At the
//! first and last page, `next`/`previous` clamp and re-fetch the boundary page
//! rather than failing.

pub mod cursor;
pub mod page;
pub mod params;
pub mod session;

pub use cursor::SearchCursor;
pub use page::{Page, PagePlan};
pub use params::{
    AdminColumn, AdminSearchByEmailParameters, AdminSearchParameters, AuditSearchParameters, ColumnOrdering, SearchLimit,
    TimeRange, UserColumn, UserSearchByEmailParameters, UserSearchParameters,
};
pub use session::SearchSession;
