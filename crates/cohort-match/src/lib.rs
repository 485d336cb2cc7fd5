//! cohort-match: find comparable scientists
//!
//! Builds a scientist profile as of a reference year, picks comparable
//! search sources from the field-source table, collects candidate authors
//! active in them, and narrows the candidates down round by round until
//! only matches remain.

mod data;
mod error;
mod extract;
pub mod fields;
pub mod filter;
mod inform;
pub mod margin;
mod params;
mod profile;
mod run;
pub mod search_group;

pub use data::{Cited, Session};
pub use error::{MatchError, Result};
pub use fields::{ASJC_2D, FieldSourceTable, MainField, SourceInfo, determine_main_field};
pub use filter::{PubCounts, find_matches};
pub use inform::{InfoField, InfoValue, MatchInfo};
pub use margin::{Margin, MarginBand, margin_band, year_band};
pub use params::{MatchDefaults, MatchParams, SearchMode};
pub use profile::{PeriodStats, ProfileAffiliation, ScientistProfile};
pub use run::MatchRun;
pub use search_group::{Activity, SearchGroup, build_search_group, combine};
