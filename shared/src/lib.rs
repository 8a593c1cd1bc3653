// lib.rs - villa rental admin core

#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::cast_precision_loss)]

pub mod api;
pub mod app;
pub mod bulk;
pub mod capabilities;
pub mod collection;
pub mod config;
pub mod envelope;
pub mod error;
pub mod event;
pub mod model;
pub mod optimistic;
pub mod screens;
pub mod testing;

pub use api::BackendApi;
pub use app::Dashboard;
pub use bulk::{AssignmentPlan, BulkReport};
pub use capabilities::Capabilities;
pub use collection::{CollectionState, PendingSet};
pub use config::{ClientConfig, RollbackPolicy};
pub use error::{AppError, AppResult, ErrorKind};
pub use event::{ConfirmPrompt, Notice};
pub use model::{
    Agent, Booking, BookingStatus, Faq, HasStatus, ItemId, ListItem, ListingType, Property, Review,
    ReviewStatus,
};
pub use optimistic::{MutationError, MutationOutcome, MutationRequest, OptimisticList};
pub use screens::{ListScreen, ListView, LoadStatus, Resource};
