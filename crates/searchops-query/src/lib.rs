//! searchops Query — structured search requests and their translation into
//! the engine's scoring tree. Composition is pure: no I/O, no clocks.

pub mod compose;
pub mod request;

pub use compose::{compose_search, compose_suggest};
pub use request::{
    FunctionScoreMode, MultiMatchType, PopularityMode, PopularityTuning, RankingTuning,
    RecencyTuning, SearchRequest, SortMode, SuggestRequest,
};
